//! The campaign state machine: draft, schedule, send, test, cancel.
//!
//! Lifecycle operations against the same campaign id are serialized through a
//! per-campaign lock, so two operators clicking "Send" at once cannot both
//! dispatch. The compare-and-set store writes guard the same invariant across
//! processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audience::{AudienceError, resolve_audience};
use crate::dispatch::{CancelHandle, DispatchError, Dispatcher};
use crate::domain::{
    AudienceSpec, Campaign, CampaignId, CampaignStatus, CampaignTitle, EmailAddress,
};
use crate::storage::{CampaignStore, MemberDirectory};
use crate::template::render_message;

/// Content and audience fields accepted by the draft operations.
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub title: CampaignTitle,
    pub subject: String,
    pub body: String,
    pub audience: AudienceSpec,
    pub sender_id: Uuid,
}

/// What a send operation reports back: the updated campaign plus delivered
/// and failed counts, so partial failures stay diagnosable.
#[derive(Debug)]
pub struct SendReport {
    pub campaign: Campaign,
    pub sent: usize,
    pub failed: usize,
}

#[derive(thiserror::Error)]
pub enum CampaignError {
    #[error("Campaign not found.")]
    NotFound,
    #[error("Invalid audience spec: {0}")]
    InvalidAudienceSpec(String),
    #[error("The scheduled time must be in the future.")]
    InvalidScheduleTime,
    #[error("The operation is not allowed while the campaign is {0}.")]
    InvalidTransition(CampaignStatus),
    #[error("Delivery failed for every recipient ({failed} failed).")]
    DeliverySendFailed { failed: usize },
    #[error("The email provider is unavailable: {0}")]
    ProviderUnavailable(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for CampaignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::routes::error_chain_fmt(self, f)
    }
}

impl From<AudienceError> for CampaignError {
    fn from(err: AudienceError) -> Self {
        match err {
            AudienceError::InvalidSpec(e) => CampaignError::InvalidAudienceSpec(e.to_string()),
            AudienceError::Unexpected(e) => CampaignError::UnexpectedError(e),
        }
    }
}

impl From<DispatchError> for CampaignError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ProviderUnavailable(reason) => {
                CampaignError::ProviderUnavailable(reason)
            }
        }
    }
}

pub struct LifecycleManager {
    store: Arc<dyn CampaignStore>,
    directory: Arc<dyn MemberDirectory>,
    dispatcher: Dispatcher,
    cancel: CancelHandle,
    locks: Mutex<HashMap<CampaignId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        directory: Arc<dyn MemberDirectory>,
        dispatcher: Dispatcher,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            store,
            directory,
            dispatcher,
            cancel,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn campaign_lock(&self, id: CampaignId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .expect("campaign lock registry poisoned")
            .entry(id)
            .or_default()
            .clone()
    }

    async fn fetch(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.store
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)
    }

    #[tracing::instrument(name = "Create campaign draft", skip(self, draft))]
    pub async fn create_draft(&self, draft: CampaignDraft) -> Result<Campaign, CampaignError> {
        draft
            .audience
            .validate()
            .map_err(|e| CampaignError::InvalidAudienceSpec(e.to_string()))?;

        let campaign = Campaign::draft(
            draft.title,
            draft.subject,
            draft.body,
            draft.audience,
            draft.sender_id,
        );
        self.store.insert(&campaign).await?;
        Ok(campaign)
    }

    /// Updates content and audience fields. Idempotent; the status is left
    /// untouched. Rejected once a campaign is Sent or Cancelled.
    #[tracing::instrument(name = "Save campaign draft", skip(self, draft), fields(campaign_id = %id))]
    pub async fn save_draft(
        &self,
        id: CampaignId,
        draft: CampaignDraft,
    ) -> Result<Campaign, CampaignError> {
        let lock = self.campaign_lock(id);
        let _guard = lock.lock().await;

        let mut campaign = self.fetch(id).await?;
        if campaign.is_terminal() {
            return Err(CampaignError::InvalidTransition(campaign.status));
        }
        draft
            .audience
            .validate()
            .map_err(|e| CampaignError::InvalidAudienceSpec(e.to_string()))?;

        campaign.title = draft.title;
        campaign.subject = draft.subject;
        campaign.body = draft.body;
        campaign.audience = draft.audience;
        self.store.update(&campaign).await?;
        Ok(campaign)
    }

    #[tracing::instrument(name = "Schedule campaign", skip(self), fields(campaign_id = %id))]
    pub async fn schedule(
        &self,
        id: CampaignId,
        at: DateTime<Utc>,
    ) -> Result<Campaign, CampaignError> {
        let lock = self.campaign_lock(id);
        let _guard = lock.lock().await;

        let mut campaign = self.fetch(id).await?;
        if campaign.status != CampaignStatus::Draft {
            return Err(CampaignError::InvalidTransition(campaign.status));
        }
        if at <= Utc::now() {
            return Err(CampaignError::InvalidScheduleTime);
        }

        campaign.status = CampaignStatus::Scheduled;
        campaign.scheduled_for = Some(at);
        self.apply_transition(&campaign, CampaignStatus::Draft)
            .await?;
        Ok(campaign)
    }

    /// Resolves the audience, renders one message per recipient and
    /// dispatches the lot. The campaign moves to Sent iff at least one
    /// message was delivered; otherwise its prior state is preserved so the
    /// operator can retry the whole operation.
    #[tracing::instrument(name = "Send campaign", skip(self), fields(campaign_id = %id))]
    pub async fn send_now(&self, id: CampaignId) -> Result<SendReport, CampaignError> {
        let lock = self.campaign_lock(id);
        let _guard = lock.lock().await;

        let campaign = self.fetch(id).await?;
        let prior_status = campaign.status;
        if !matches!(
            prior_status,
            CampaignStatus::Draft | CampaignStatus::Scheduled
        ) {
            return Err(CampaignError::InvalidTransition(prior_status));
        }

        let recipients = resolve_audience(self.directory.as_ref(), &campaign.audience).await?;
        let messages = recipients
            .into_iter()
            .map(|recipient| {
                let message = render_message(&campaign.subject, &campaign.body, &recipient);
                (recipient, message)
            })
            .collect();

        let result = self.dispatcher.dispatch(messages, false, &self.cancel).await?;
        if !result.success() {
            return Err(CampaignError::DeliverySendFailed {
                failed: result.failed,
            });
        }

        let mut sent = campaign;
        sent.status = CampaignStatus::Sent;
        sent.sent_at = Some(Utc::now());
        sent.scheduled_for = None;
        sent.opens = 0;
        sent.clicks = 0;
        self.apply_transition(&sent, prior_status).await?;

        tracing::info!(
            sent = result.sent,
            failed = result.failed,
            "Campaign dispatched"
        );
        Ok(SendReport {
            campaign: sent,
            sent: result.sent,
            failed: result.failed,
        })
    }

    /// Previews delivery without touching campaign state: the message is
    /// rendered for the deterministic first recipient but addressed to the
    /// requesting operator, with the subject prefixed `[TEST]`.
    #[tracing::instrument(name = "Send test campaign", skip(self, requester), fields(campaign_id = %id))]
    pub async fn send_test(
        &self,
        id: CampaignId,
        requester: EmailAddress,
    ) -> Result<SendReport, CampaignError> {
        let lock = self.campaign_lock(id);
        let _guard = lock.lock().await;

        let campaign = self.fetch(id).await?;
        let recipients = resolve_audience(self.directory.as_ref(), &campaign.audience).await?;
        let Some(first) = recipients.into_iter().next() else {
            return Err(CampaignError::DeliverySendFailed { failed: 0 });
        };

        let mut rendered = render_message(&campaign.subject, &campaign.body, &first);
        rendered.subject = format!("[TEST] {}", rendered.subject);

        let mut probe = first;
        probe.email = requester;

        let result = self
            .dispatcher
            .dispatch(vec![(probe, rendered)], true, &self.cancel)
            .await?;
        if !result.success() {
            return Err(CampaignError::DeliverySendFailed {
                failed: result.failed,
            });
        }

        Ok(SendReport {
            campaign,
            sent: result.sent,
            failed: result.failed,
        })
    }

    #[tracing::instrument(name = "Cancel campaign", skip(self), fields(campaign_id = %id))]
    pub async fn cancel(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        let lock = self.campaign_lock(id);
        let _guard = lock.lock().await;

        let mut campaign = self.fetch(id).await?;
        if campaign.status != CampaignStatus::Scheduled {
            return Err(CampaignError::InvalidTransition(campaign.status));
        }

        campaign.status = CampaignStatus::Cancelled;
        campaign.scheduled_for = None;
        self.apply_transition(&campaign, CampaignStatus::Scheduled)
            .await?;
        Ok(campaign)
    }

    /// Stores externally supplied aggregate engagement counters.
    #[tracing::instrument(name = "Record campaign engagement", skip(self), fields(campaign_id = %id))]
    pub async fn record_engagement(
        &self,
        id: CampaignId,
        opens: u32,
        clicks: u32,
    ) -> Result<Campaign, CampaignError> {
        let lock = self.campaign_lock(id);
        let _guard = lock.lock().await;

        let mut campaign = self.fetch(id).await?;
        if campaign.status != CampaignStatus::Sent {
            return Err(CampaignError::InvalidTransition(campaign.status));
        }

        campaign.opens = opens;
        campaign.clicks = clicks;
        self.store.update(&campaign).await?;
        Ok(campaign)
    }

    pub async fn get(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.fetch(id).await
    }

    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, CampaignError> {
        Ok(self.store.list(status).await?)
    }

    async fn apply_transition(
        &self,
        campaign: &Campaign,
        expected: CampaignStatus,
    ) -> Result<(), CampaignError> {
        let applied = self.store.update_if_status(campaign, expected).await?;
        if !applied {
            return Err(CampaignError::UnexpectedError(anyhow::anyhow!(
                "campaign {} was modified concurrently",
                campaign.id
            )));
        }
        Ok(())
    }
}
