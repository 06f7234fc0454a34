use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AudienceSpec, CampaignTitle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(Uuid);

impl CampaignId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CampaignId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sent,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sent" => Ok(CampaignStatus::Sent),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(format!("{other} is not a campaign status.")),
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A newsletter send unit: content, audience and lifecycle state.
///
/// Invariants maintained by the lifecycle manager:
/// `scheduled_for` is set iff status is `Scheduled`,
/// `sent_at` is set iff status is `Sent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub title: CampaignTitle,
    pub subject: String,
    pub body: String,
    pub audience: AudienceSpec,
    pub status: CampaignStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub opens: u32,
    pub clicks: u32,
    pub sender_id: Uuid,
}

impl Campaign {
    pub fn draft(
        title: CampaignTitle,
        subject: String,
        body: String,
        audience: AudienceSpec,
        sender_id: Uuid,
    ) -> Self {
        Self {
            id: CampaignId::new(),
            title,
            subject,
            body,
            audience,
            status: CampaignStatus::Draft,
            scheduled_for: None,
            sent_at: None,
            opens: 0,
            clicks: 0,
            sender_id,
        }
    }

    /// Sent and Cancelled accept no further edits or sends.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            CampaignStatus::Sent | CampaignStatus::Cancelled
        )
    }
}
