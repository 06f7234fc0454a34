mod campaigns;
mod health_check;
mod helpers;

pub use campaigns::{
    CampaignApiError, cancel_campaign, create_campaign, get_campaign, list_campaigns,
    record_engagement, save_campaign, schedule_campaign, send_campaign, send_test_campaign,
};
pub use health_check::health_check;
pub use helpers::error_chain_fmt;
