use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use super::blacklist::{BlacklistEntry, Identity};
use super::domain::{Agent, Company, SellerRiskAssessment, SubContractor};
use super::risk::RiskChecklist;
use super::service::{
    BlacklistCheck, BlacklistReport, NewAgent, NewCompany, NewSubContractor, OnboardingService,
};
use crate::workflows::approvals::ApprovalRequest;
use crate::workflows::common::Principal;
use crate::workflows::error::DomainError;

#[derive(Debug, Default, Deserialize)]
pub struct AssessmentBody {
    #[serde(default)]
    pub checklist: Option<RiskChecklist>,
}

#[derive(Debug, Deserialize)]
pub struct ChecklistBody {
    pub items: BTreeMap<String, bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesBody {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    pub reason: String,
}

type Shared = State<Arc<OnboardingService>>;

pub fn onboarding_router(service: Arc<OnboardingService>) -> Router {
    Router::new()
        .route("/sub-contractors", post(create_lead).get(list_sub_contractors))
        .route("/sub-contractors/:id", get(get_sub_contractor))
        .route("/sub-contractors/:id/profile", post(submit_profile))
        .route("/sub-contractors/:id/kyc", post(verify_kyc))
        .route("/sub-contractors/:id/assessment", post(start_assessment))
        .route("/sub-contractors/:id/reactivate", post(reactivate))
        .route("/assessments/:id", get(get_assessment))
        .route("/assessments/:id/checklist", post(update_checklist))
        .route("/assessments/:id/submit", post(submit_assessment))
        .route("/companies", post(register_company))
        .route("/companies/:id/suspend", post(suspend_company))
        .route("/companies/:id/reinstate", post(reinstate_company))
        .route("/agents", post(register_agent))
        .route("/agents/:id/misconduct", post(report_misconduct))
        .route("/blacklist/check", post(check_blacklist))
        .route("/blacklist/report", post(report_blacklist))
        .route("/blacklist/:id/approve", post(approve_blacklist))
        .route("/blacklist/:id/reject", post(reject_blacklist))
        .route("/blacklist/:id/revoke", post(revoke_blacklist))
        .with_state(service)
}

async fn create_lead(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewSubContractor>,
) -> Result<(StatusCode, Json<SubContractor>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.create_lead(&principal, request)?)))
}

async fn list_sub_contractors(State(service): Shared) -> Result<Json<Vec<SubContractor>>, DomainError> {
    Ok(Json(service.sub_contractors()?))
}

async fn get_sub_contractor(
    State(service): Shared,
    Path(id): Path<String>,
) -> Result<Json<SubContractor>, DomainError> {
    Ok(Json(service.sub_contractor(&id)?))
}

async fn submit_profile(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<SubContractor>, DomainError> {
    Ok(Json(service.submit_profile(&principal, &id)?))
}

async fn verify_kyc(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<SubContractor>, DomainError> {
    Ok(Json(service.verify_kyc(&principal, &id)?))
}

async fn start_assessment(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<AssessmentBody>>,
) -> Result<(StatusCode, Json<SellerRiskAssessment>), DomainError> {
    let checklist = body.and_then(|Json(body)| body.checklist);
    let assessment = service.start_assessment(&principal, &id, checklist)?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

async fn reactivate(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<SubContractor>, DomainError> {
    Ok(Json(service.reactivate(&principal, &id)?))
}

async fn get_assessment(
    State(service): Shared,
    Path(id): Path<String>,
) -> Result<Json<SellerRiskAssessment>, DomainError> {
    Ok(Json(service.assessment(&id)?))
}

async fn update_checklist(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ChecklistBody>,
) -> Result<Json<SellerRiskAssessment>, DomainError> {
    Ok(Json(service.update_checklist(&principal, &id, &body.items)?))
}

async fn submit_assessment(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<SellerRiskAssessment>, DomainError> {
    Ok(Json(service.submit_assessment(&principal, &id)?))
}

async fn register_company(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewCompany>,
) -> Result<(StatusCode, Json<Company>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.register_company(&principal, request)?)))
}

async fn suspend_company(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<Company>, DomainError> {
    let notes = body.and_then(|Json(body)| body.notes);
    Ok(Json(service.set_company_suspended(&principal, &id, true, notes)?))
}

async fn reinstate_company(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<Company>, DomainError> {
    let notes = body.and_then(|Json(body)| body.notes);
    Ok(Json(service.set_company_suspended(&principal, &id, false, notes)?))
}

async fn register_agent(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewAgent>,
) -> Result<(StatusCode, Json<Agent>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.register_agent(&principal, request)?)))
}

async fn report_misconduct(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<(StatusCode, Json<ApprovalRequest>), DomainError> {
    let request = service.report_misconduct(&principal, &id, &body.reason)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn check_blacklist(
    State(service): Shared,
    Json(identity): Json<Identity>,
) -> Result<Json<BlacklistCheck>, DomainError> {
    Ok(Json(service.check_blacklist(&identity)?))
}

async fn report_blacklist(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(report): Json<BlacklistReport>,
) -> Result<(StatusCode, Json<BlacklistEntry>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.report_blacklist(&principal, report)?)))
}

async fn approve_blacklist(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<BlacklistEntry>, DomainError> {
    let notes = body.and_then(|Json(body)| body.notes);
    Ok(Json(service.approve_blacklist(&principal, &id, notes)?))
}

async fn reject_blacklist(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<NotesBody>>,
) -> Result<Json<BlacklistEntry>, DomainError> {
    let notes = body.and_then(|Json(body)| body.notes);
    Ok(Json(service.reject_blacklist(&principal, &id, notes)?))
}

async fn revoke_blacklist(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<BlacklistEntry>, DomainError> {
    Ok(Json(service.revoke_blacklist(&principal, &id, &body.reason)?))
}
