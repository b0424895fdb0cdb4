use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use super::domain::{LendingPreferences, Nbfc};
use super::matching::MatchCandidate;
use super::service::{LenderService, NbfcResponse, NewNbfc};
use crate::workflows::common::Principal;
use crate::workflows::deals::Case;
use crate::workflows::error::DomainError;

#[derive(Debug, Default, Deserialize)]
pub struct ShareBody {
    #[serde(default)]
    pub nbfc_ids: Option<Vec<String>>,
}

type Shared = State<Arc<LenderService>>;

pub fn lender_router(service: Arc<LenderService>) -> Router {
    Router::new()
        .route("/nbfc", post(register).get(list))
        .route("/nbfc/match/:id", get(match_case))
        .route("/nbfc/share/:id", post(share_case))
        .route("/nbfc/:id", get(get_nbfc))
        .route("/nbfc/:id/preferences", put(update_preferences))
        .route("/nbfc/:id/activate", post(activate))
        .route("/nbfc/:id/deactivate", post(deactivate))
        .route("/nbfc/:id/respond", post(respond))
        .with_state(service)
}

async fn register(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewNbfc>,
) -> Result<(StatusCode, Json<Nbfc>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.register(&principal, request)?)))
}

async fn list(State(service): Shared) -> Result<Json<Vec<Nbfc>>, DomainError> {
    Ok(Json(service.nbfcs()?))
}

async fn get_nbfc(State(service): Shared, Path(id): Path<String>) -> Result<Json<Nbfc>, DomainError> {
    Ok(Json(service.nbfc(&id)?))
}

async fn update_preferences(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(preferences): Json<LendingPreferences>,
) -> Result<Json<Nbfc>, DomainError> {
    Ok(Json(service.update_preferences(&principal, &id, preferences)?))
}

async fn activate(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Nbfc>, DomainError> {
    Ok(Json(service.set_active(&principal, &id, true)?))
}

async fn deactivate(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Nbfc>, DomainError> {
    Ok(Json(service.set_active(&principal, &id, false)?))
}

async fn match_case(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<MatchCandidate>>, DomainError> {
    Ok(Json(service.match_case(&principal, &case_id)?))
}

async fn share_case(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(case_id): Path<String>,
    body: Option<Json<ShareBody>>,
) -> Result<Json<Case>, DomainError> {
    let nbfc_ids = body.and_then(|Json(body)| body.nbfc_ids);
    Ok(Json(service.share_case(&principal, &case_id, nbfc_ids)?))
}

/// Path id is the case; the lender comes from the caller or the body.
async fn respond(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(case_id): Path<String>,
    Json(response): Json<NbfcResponse>,
) -> Result<Json<Case>, DomainError> {
    Ok(Json(service.respond(&principal, &case_id, response)?))
}
