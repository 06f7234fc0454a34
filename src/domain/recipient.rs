use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::EmailAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierId(String);

impl TierId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for TierId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a member taken at audience-resolution time.
///
/// Rendering works off this snapshot, not a live record, so a campaign's
/// rendered content stays reproducible even if member data changes mid-send.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: MemberId,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    pub tier_id: TierId,
    pub join_date: NaiveDate,
    pub renewal_date: NaiveDate,
}
