//! Turns an `AudienceSpec` into a concrete, ordered recipient list.

use crate::domain::{AudienceSpec, InvalidAudienceSpec, Recipient};
use crate::storage::{MemberDirectory, MemberFilter};

#[derive(thiserror::Error, Debug)]
pub enum AudienceError {
    #[error("invalid audience spec: {0}")]
    InvalidSpec(#[from] InvalidAudienceSpec),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Resolves the audience against a directory snapshot.
///
/// Archived members never appear, whichever variant is given. The output is
/// deduplicated and ordered by member id ascending, so identical inputs
/// produce identical lists (and an identical test-mode "first recipient")
/// across runs.
#[tracing::instrument(name = "Resolve audience", skip(directory))]
pub async fn resolve_audience(
    directory: &dyn MemberDirectory,
    spec: &AudienceSpec,
) -> Result<Vec<Recipient>, AudienceError> {
    spec.validate()?;

    let filter = match spec {
        AudienceSpec::All => MemberFilter {
            active_only: true,
            ..MemberFilter::default()
        },
        AudienceSpec::ByTier { tier_ids } => {
            // An empty tier set means nobody, not everybody.
            if tier_ids.is_empty() {
                return Ok(Vec::new());
            }
            MemberFilter {
                tier_ids: Some(tier_ids.clone()),
                ..MemberFilter::default()
            }
        }
        AudienceSpec::ByJoinDateRange { start, end } => MemberFilter {
            join_date_start: *start,
            join_date_end: *end,
            ..MemberFilter::default()
        },
        AudienceSpec::ByTag { tags } => {
            if tags.is_empty() {
                return Ok(Vec::new());
            }
            MemberFilter {
                tags: Some(tags.clone()),
                ..MemberFilter::default()
            }
        }
    };

    let mut recipients = directory.query_members(&filter).await?;
    recipients.sort_by_key(|r| r.id);
    recipients.dedup_by_key(|r| r.id);

    tracing::info!(recipients = recipients.len(), "Audience resolved");
    Ok(recipients)
}
