mod errors;
mod types;

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::domain::CampaignId;
use crate::lifecycle::{CampaignDraft, LifecycleManager};

pub use errors::CampaignApiError;
use types::{
    DraftSchema, EngagementSchema, ListQuery, ScheduleSchema, SendResponse, TestSendSchema,
};

#[tracing::instrument(name = "Create campaign", skip(manager, schema))]
pub async fn create_campaign(
    schema: web::Json<DraftSchema>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let draft: CampaignDraft = schema
        .into_inner()
        .try_into()
        .map_err(CampaignApiError::Validation)?;
    let campaign = manager.create_draft(draft).await?;
    Ok(HttpResponse::Created().json(campaign))
}

#[tracing::instrument(name = "Save campaign", skip(manager, schema, id), fields(campaign_id = %id))]
pub async fn save_campaign(
    id: web::Path<Uuid>,
    schema: web::Json<DraftSchema>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let draft: CampaignDraft = schema
        .into_inner()
        .try_into()
        .map_err(CampaignApiError::Validation)?;
    let campaign = manager
        .save_draft(CampaignId::from(id.into_inner()), draft)
        .await?;
    Ok(HttpResponse::Ok().json(campaign))
}

#[tracing::instrument(name = "Get campaign", skip(manager, id), fields(campaign_id = %id))]
pub async fn get_campaign(
    id: web::Path<Uuid>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let campaign = manager.get(CampaignId::from(id.into_inner())).await?;
    Ok(HttpResponse::Ok().json(campaign))
}

#[tracing::instrument(name = "List campaigns", skip(manager, query))]
pub async fn list_campaigns(
    query: web::Query<ListQuery>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let campaigns = manager.list(query.status).await?;
    Ok(HttpResponse::Ok().json(campaigns))
}

#[tracing::instrument(name = "Schedule campaign", skip(manager, schema, id), fields(campaign_id = %id))]
pub async fn schedule_campaign(
    id: web::Path<Uuid>,
    schema: web::Json<ScheduleSchema>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let campaign = manager
        .schedule(CampaignId::from(id.into_inner()), schema.scheduled_for)
        .await?;
    Ok(HttpResponse::Ok().json(campaign))
}

#[tracing::instrument(name = "Send campaign", skip(manager, id), fields(campaign_id = %id))]
pub async fn send_campaign(
    id: web::Path<Uuid>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let report = manager.send_now(CampaignId::from(id.into_inner())).await?;
    Ok(HttpResponse::Ok().json(SendResponse {
        campaign: report.campaign,
        sent: report.sent,
        failed: report.failed,
    }))
}

#[tracing::instrument(name = "Send test campaign", skip(manager, schema, id), fields(campaign_id = %id))]
pub async fn send_test_campaign(
    id: web::Path<Uuid>,
    schema: web::Json<TestSendSchema>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let requester = schema
        .into_inner()
        .requester()
        .map_err(CampaignApiError::Validation)?;
    let report = manager
        .send_test(CampaignId::from(id.into_inner()), requester)
        .await?;
    Ok(HttpResponse::Ok().json(SendResponse {
        campaign: report.campaign,
        sent: report.sent,
        failed: report.failed,
    }))
}

#[tracing::instrument(name = "Cancel campaign", skip(manager, id), fields(campaign_id = %id))]
pub async fn cancel_campaign(
    id: web::Path<Uuid>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let campaign = manager.cancel(CampaignId::from(id.into_inner())).await?;
    Ok(HttpResponse::Ok().json(campaign))
}

#[tracing::instrument(name = "Record engagement", skip(manager, schema, id), fields(campaign_id = %id))]
pub async fn record_engagement(
    id: web::Path<Uuid>,
    schema: web::Json<EngagementSchema>,
    manager: web::Data<LifecycleManager>,
) -> Result<HttpResponse, CampaignApiError> {
    let campaign = manager
        .record_engagement(
            CampaignId::from(id.into_inner()),
            schema.opens,
            schema.clicks,
        )
        .await?;
    Ok(HttpResponse::Ok().json(campaign))
}
