mod audience;
mod campaign;
mod campaign_title;
mod email_address;
mod recipient;

pub use audience::{AudienceSpec, InvalidAudienceSpec};
pub use campaign::{Campaign, CampaignId, CampaignStatus};
pub use campaign_title::CampaignTitle;
pub use email_address::EmailAddress;
pub use recipient::{MemberId, Recipient, TierId};
