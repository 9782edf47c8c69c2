use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use carsellmax_core::domain::offer::OfferStatus;
use carsellmax_core::domain::submission::{SubmissionId, SubmissionStatus};

use super::{api_error, ApiError, AppState};
use crate::services::offers::{OfferChange, PublicOfferView};
use crate::services::submissions::IntakeRequest;

#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
}

/// Customer-facing result of accept/decline; the full offer stays internal.
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub status: OfferStatus,
    pub message: String,
}

impl From<OfferChange> for DecisionResponse {
    fn from(change: OfferChange) -> Self {
        let message = match change.offer.status {
            OfferStatus::Accepted => {
                "Offer accepted. Our team will contact you to arrange inspection and payment."
            }
            _ => "Offer declined. Thank you for considering CarSellMax.",
        };
        Self { success: true, status: change.offer.status, message: message.to_string() }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/submissions", post(create_submission))
        .route("/offer/{token}", get(view_offer))
        .route("/offer/{token}/accept", post(accept_offer))
        .route("/offer/{token}/decline", post(decline_offer))
        .with_state(state)
}

async fn create_submission(
    State(state): State<AppState>,
    Json(body): Json<IntakeRequest>,
) -> Result<(StatusCode, Json<IntakeResponse>), ApiError> {
    let submission = state.services.submissions.intake(body).await.map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(IntakeResponse { submission_id: submission.id, status: submission.status }),
    ))
}

async fn view_offer(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PublicOfferView>, ApiError> {
    state.services.offers.view_by_token(&token).await.map(Json).map_err(api_error)
}

async fn accept_offer(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let change = state.services.offers.accept_by_token(&token).await.map_err(api_error)?;
    Ok(Json(change.into()))
}

async fn decline_offer(
    Path(token): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<DeclineRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let change =
        state.services.offers.decline_by_token(&token, body.reason).await.map_err(api_error)?;
    Ok(Json(change.into()))
}
