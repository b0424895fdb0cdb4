use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use super::domain::ApprovalRequest;
use super::service::{ApprovalService, NewApproval};
use crate::workflows::common::Principal;
use crate::workflows::error::DomainError;

#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    #[serde(default)]
    pub comments: Option<String>,
}

pub fn approval_router(service: Arc<ApprovalService>) -> Router {
    Router::new()
        .route("/approvals", post(raise_handler))
        .route("/approvals/my-pending", get(my_pending_handler))
        .route("/approvals/:id", get(get_handler))
        .route("/approvals/:id/approve", post(approve_handler))
        .route("/approvals/:id/reject", post(reject_handler))
        .route("/approvals/:id/escalate", post(escalate_handler))
        .route("/approvals/:id/cancel", post(cancel_handler))
        .with_state(service)
}

async fn raise_handler(
    State(service): State<Arc<ApprovalService>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewApproval>,
) -> Result<(StatusCode, Json<ApprovalRequest>), DomainError> {
    let stored = service.raise(&principal, request)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn my_pending_handler(
    State(service): State<Arc<ApprovalService>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<ApprovalRequest>>, DomainError> {
    Ok(Json(service.my_pending(&principal)?))
}

async fn get_handler(
    State(service): State<Arc<ApprovalService>>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalRequest>, DomainError> {
    Ok(Json(service.get(&id)?))
}

async fn approve_handler(
    State(service): State<Arc<ApprovalService>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalRequest>, DomainError> {
    let comments = body.and_then(|Json(body)| body.comments);
    Ok(Json(service.approve(&principal, &id, comments)?))
}

async fn reject_handler(
    State(service): State<Arc<ApprovalService>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalRequest>, DomainError> {
    let comments = body.and_then(|Json(body)| body.comments);
    Ok(Json(service.reject(&principal, &id, comments)?))
}

async fn escalate_handler(
    State(service): State<Arc<ApprovalService>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalRequest>, DomainError> {
    let reason = body.and_then(|Json(body)| body.comments);
    Ok(Json(service.escalate(&principal, &id, reason)?))
}

async fn cancel_handler(
    State(service): State<Arc<ApprovalService>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalRequest>, DomainError> {
    let reason = body.and_then(|Json(body)| body.comments);
    Ok(Json(service.cancel(&principal, &id, reason)?))
}
