//! sqlx-backed implementations of the collaborator seams. All queries use the
//! runtime API so the crate builds without a live database.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    AudienceSpec, Campaign, CampaignId, CampaignStatus, CampaignTitle, EmailAddress, MemberId,
    Recipient, TierId,
};

use super::{CampaignStore, MemberDirectory, MemberFilter};

pub struct PgMemberDirectory {
    pool: PgPool,
}

impl PgMemberDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberDirectory for PgMemberDirectory {
    #[tracing::instrument(name = "Query members", skip(self))]
    async fn query_members(&self, filter: &MemberFilter) -> Result<Vec<Recipient>, anyhow::Error> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT id, email, first_name, last_name, tier_id, join_date, renewal_date \
             FROM members WHERE is_archived = FALSE",
        );
        if filter.active_only {
            builder.push(" AND status = 'active'");
        }
        if let Some(tier_ids) = &filter.tier_ids {
            let tier_ids: Vec<String> = tier_ids.iter().map(|t| t.as_ref().to_owned()).collect();
            builder.push(" AND tier_id = ANY(");
            builder.push_bind(tier_ids);
            builder.push(")");
        }
        if let Some(start) = filter.join_date_start {
            builder.push(" AND join_date >= ");
            builder.push_bind(start);
        }
        if let Some(end) = filter.join_date_end {
            builder.push(" AND join_date <= ");
            builder.push_bind(end);
        }
        if let Some(tags) = &filter.tags {
            let tags: Vec<String> = tags.iter().cloned().collect();
            builder.push(" AND tags && ");
            builder.push_bind(tags);
        }
        builder.push(" ORDER BY id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;

        let recipients = rows
            .into_iter()
            .filter_map(|row| match recipient_from_row(&row) {
                Ok(recipient) => Some(recipient),
                Err(err) => {
                    tracing::warn!(
                        err.cause_chain = ?err,
                        "Skipping a member. The stored contact details are invalid."
                    );
                    None
                }
            })
            .collect();

        Ok(recipients)
    }
}

fn recipient_from_row(row: &PgRow) -> Result<Recipient, anyhow::Error> {
    let email: String = row.try_get("email")?;
    let email = EmailAddress::parse(email).map_err(|e| anyhow::anyhow!(e))?;
    Ok(Recipient {
        id: MemberId(row.try_get("id")?),
        email,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        tier_id: TierId::new(row.try_get::<String, _>("tier_id")?),
        join_date: row.try_get("join_date")?,
        renewal_date: row.try_get("renewal_date")?,
    })
}

pub struct PgCampaignStore {
    pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CAMPAIGN_COLUMNS: &str = "id, title, subject, body, audience, status, \
                                scheduled_for, sent_at, opens, clicks, sender_id";

#[async_trait]
impl CampaignStore for PgCampaignStore {
    #[tracing::instrument(name = "Fetch campaign", skip(self))]
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, anyhow::Error> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM newsletter_campaigns WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(campaign_from_row).transpose()
    }

    #[tracing::instrument(name = "List campaigns", skip(self))]
    async fn list(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, anyhow::Error> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM newsletter_campaigns \
                     WHERE status = $1 ORDER BY created_at DESC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM newsletter_campaigns \
                     ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(campaign_from_row).collect()
    }

    #[tracing::instrument(name = "Insert campaign", skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn insert(&self, campaign: &Campaign) -> Result<(), anyhow::Error> {
        sqlx::query(
            "INSERT INTO newsletter_campaigns \
             (id, title, subject, body, audience, status, scheduled_for, sent_at, \
              opens, clicks, sender_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(campaign.id.as_uuid())
        .bind(campaign.title.as_ref())
        .bind(&campaign.subject)
        .bind(&campaign.body)
        .bind(Json(&campaign.audience))
        .bind(campaign.status.as_str())
        .bind(campaign.scheduled_for)
        .bind(campaign.sent_at)
        .bind(campaign.opens as i32)
        .bind(campaign.clicks as i32)
        .bind(campaign.sender_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Update campaign", skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn update(&self, campaign: &Campaign) -> Result<(), anyhow::Error> {
        let result = bind_campaign_update(
            sqlx::query(
                "UPDATE newsletter_campaigns SET \
                 title = $2, subject = $3, body = $4, audience = $5, status = $6, \
                 scheduled_for = $7, sent_at = $8, opens = $9, clicks = $10, \
                 updated_at = now() \
                 WHERE id = $1",
            ),
            campaign,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("campaign {} does not exist", campaign.id);
        }
        Ok(())
    }

    #[tracing::instrument(
        name = "Update campaign if status",
        skip(self, campaign),
        fields(campaign_id = %campaign.id, expected = %expected)
    )]
    async fn update_if_status(
        &self,
        campaign: &Campaign,
        expected: CampaignStatus,
    ) -> Result<bool, anyhow::Error> {
        let result = bind_campaign_update(
            sqlx::query(
                "UPDATE newsletter_campaigns SET \
                 title = $2, subject = $3, body = $4, audience = $5, status = $6, \
                 scheduled_for = $7, sent_at = $8, opens = $9, clicks = $10, \
                 updated_at = now() \
                 WHERE id = $1 AND status = $11",
            ),
            campaign,
        )
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn bind_campaign_update<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    campaign: &'q Campaign,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(campaign.id.as_uuid())
        .bind(campaign.title.as_ref())
        .bind(&campaign.subject)
        .bind(&campaign.body)
        .bind(Json(&campaign.audience))
        .bind(campaign.status.as_str())
        .bind(campaign.scheduled_for)
        .bind(campaign.sent_at)
        .bind(campaign.opens as i32)
        .bind(campaign.clicks as i32)
}

fn campaign_from_row(row: &PgRow) -> Result<Campaign, anyhow::Error> {
    let title: String = row.try_get("title")?;
    let status: String = row.try_get("status")?;
    let Json(audience): Json<AudienceSpec> = row.try_get("audience")?;
    let opens: i32 = row.try_get("opens")?;
    let clicks: i32 = row.try_get("clicks")?;
    Ok(Campaign {
        id: CampaignId::from(row.try_get::<Uuid, _>("id")?),
        title: CampaignTitle::parse(title).map_err(|e| anyhow::anyhow!(e))?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        audience,
        status: status
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Failed to parse stored campaign status")?,
        scheduled_for: row.try_get::<Option<DateTime<Utc>>, _>("scheduled_for")?,
        sent_at: row.try_get::<Option<DateTime<Utc>>, _>("sent_at")?,
        opens: u32::try_from(opens).context("negative opens counter")?,
        clicks: u32::try_from(clicks).context("negative clicks counter")?,
        sender_id: row.try_get("sender_id")?,
    })
}
