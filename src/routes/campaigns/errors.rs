use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use crate::lifecycle::CampaignError;
use crate::routes::helpers::error_chain_fmt;

/// Maps lifecycle errors onto HTTP responses. Validation problems are the
/// caller's fault; delivery and provider problems are upstream's.
#[derive(thiserror::Error)]
pub enum CampaignApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Lifecycle(#[from] CampaignError),
}

impl std::fmt::Debug for CampaignApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for CampaignApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            CampaignApiError::Validation(_) => StatusCode::BAD_REQUEST,
            CampaignApiError::Lifecycle(err) => match err {
                CampaignError::NotFound => StatusCode::NOT_FOUND,
                CampaignError::InvalidAudienceSpec(_)
                | CampaignError::InvalidScheduleTime => StatusCode::BAD_REQUEST,
                CampaignError::InvalidTransition(_) => StatusCode::CONFLICT,
                CampaignError::DeliverySendFailed { .. } => StatusCode::BAD_GATEWAY,
                CampaignError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                CampaignError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "message": self.to_string(),
        }))
    }
}
