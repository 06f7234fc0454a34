use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TierId;

/// Which members a campaign goes out to.
///
/// Serialized as `{"mode": ..., ...}` inside the campaign row; validated once
/// at the boundary and never re-parsed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AudienceSpec {
    All,
    ByTier {
        #[serde(rename = "tierIds")]
        tier_ids: BTreeSet<TierId>,
    },
    ByJoinDateRange {
        #[serde(rename = "joinDateStart", default, skip_serializing_if = "Option::is_none")]
        start: Option<NaiveDate>,
        #[serde(rename = "joinDateEnd", default, skip_serializing_if = "Option::is_none")]
        end: Option<NaiveDate>,
    },
    ByTag { tags: BTreeSet<String> },
}

impl AudienceSpec {
    /// Rejects contradictory segmentation before any send is attempted.
    pub fn validate(&self) -> Result<(), InvalidAudienceSpec> {
        match self {
            AudienceSpec::ByJoinDateRange {
                start: None,
                end: None,
            } => Err(InvalidAudienceSpec(
                "a join-date range needs at least one bound".into(),
            )),
            AudienceSpec::ByJoinDateRange {
                start: Some(start),
                end: Some(end),
            } if start > end => Err(InvalidAudienceSpec(format!(
                "join-date range starts ({start}) after it ends ({end})"
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidAudienceSpec(pub String);
