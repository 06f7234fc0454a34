use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AudienceSpec, Campaign, CampaignStatus, CampaignTitle, EmailAddress};
use crate::lifecycle::CampaignDraft;

#[derive(Deserialize)]
pub struct DraftSchema {
    pub title: String,
    pub subject: String,
    pub body: String,
    pub audience: AudienceSpec,
    pub sender_id: Uuid,
}

impl TryFrom<DraftSchema> for CampaignDraft {
    type Error = String;

    fn try_from(schema: DraftSchema) -> Result<Self, Self::Error> {
        let title = CampaignTitle::parse(schema.title)?;
        Ok(CampaignDraft {
            title,
            subject: schema.subject,
            body: schema.body,
            audience: schema.audience,
            sender_id: schema.sender_id,
        })
    }
}

#[derive(Deserialize)]
pub struct ScheduleSchema {
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct TestSendSchema {
    pub requester_email: String,
}

impl TestSendSchema {
    pub fn requester(self) -> Result<EmailAddress, String> {
        EmailAddress::parse(self.requester_email)
    }
}

#[derive(Deserialize)]
pub struct EngagementSchema {
    pub opens: u32,
    pub clicks: u32,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<CampaignStatus>,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub campaign: Campaign,
    pub sent: usize,
    pub failed: usize,
}
