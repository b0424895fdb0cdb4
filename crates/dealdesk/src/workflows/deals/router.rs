use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::bid::Bid;
use super::bill::{Bill, CwcRequest};
use super::case::Case;
use super::service::{CounterOffer, DealService, DisbursementStep, NewBid, NewBill, NewCwc};
use super::transaction::{OverdueCheck, Transaction};
use crate::workflows::approvals::RequestType;
use crate::workflows::common::Principal;
use crate::workflows::error::DomainError;

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub verified: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RmtReviewBody {
    pub approved: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CaseBody {
    pub cwc_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionBody {
    pub case_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EscrowBody {
    pub account_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct DisburseBody {
    pub step: DisbursementStep,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepaymentBody {
    pub amount: f64,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OverdueResponse {
    pub transaction: Transaction,
    #[serde(flatten)]
    pub check: OverdueCheck,
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub case_id: String,
    pub missing: Vec<RequestType>,
}

type Shared = State<Arc<DealService>>;

pub fn deal_router(service: Arc<DealService>) -> Router {
    Router::new()
        .route("/bills", post(upload_bill).get(list_bills))
        .route("/bills/:id", get(get_bill))
        .route("/bills/:id/verify", post(verify_bill))
        .route("/cwc", post(submit_cwc))
        .route("/cwc/:id", get(get_cwc))
        .route("/cwc/:id/approve", post(approve_cwc))
        .route("/cwc/:id/reject", post(reject_cwc))
        .route("/cases", post(create_case).get(list_cases))
        .route("/cases/:id", get(get_case))
        .route("/cases/:id/gates", get(case_gates))
        .route("/cases/:id/review", post(review_case))
        .route("/cases/:id/rmt-review", post(rmt_review))
        .route("/bids", post(place_bid))
        .route("/bids/:id", get(get_bid))
        .route("/bids/:id/negotiate", post(negotiate))
        .route("/bids/:id/accept", post(accept_bid))
        .route("/bids/:id/reject", post(reject_bid))
        .route("/bids/:id/lock", post(lock_bid))
        .route("/transactions", post(create_transaction).get(list_transactions))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/escrow", post(setup_escrow))
        .route("/transactions/:id/disburse", post(disburse))
        .route("/transactions/:id/repayment", post(record_repayment))
        .route("/transactions/:id/overdue", post(evaluate_overdue))
        .route("/transactions/:id/default", post(mark_default))
        .with_state(service)
}

/// Invoice metadata travels in the query string, the document in the raw body.
async fn upload_bill(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Query(request): Query<NewBill>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Bill>), DomainError> {
    let mime = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .ok_or_else(|| DomainError::validation("a document Content-Type is required"))?;
    let bill = service.upload_bill(&principal, request, &body, &mime)?;
    Ok((StatusCode::CREATED, Json(bill)))
}

async fn list_bills(State(service): Shared) -> Result<Json<Vec<Bill>>, DomainError> {
    Ok(Json(service.bills()?))
}

async fn get_bill(State(service): Shared, Path(id): Path<String>) -> Result<Json<Bill>, DomainError> {
    Ok(Json(service.bill(&id)?))
}

async fn verify_bill(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<Bill>, DomainError> {
    Ok(Json(service.verify_bill(&principal, &id, body.verified, body.notes)?))
}

async fn submit_cwc(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewCwc>,
) -> Result<(StatusCode, Json<CwcRequest>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.submit_cwc(&principal, request)?)))
}

async fn get_cwc(
    State(service): Shared,
    Path(id): Path<String>,
) -> Result<Json<CwcRequest>, DomainError> {
    Ok(Json(service.cwc_request(&id)?))
}

async fn approve_cwc(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Case>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.create_case(&principal, &id)?)))
}

async fn reject_cwc(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<CwcRequest>, DomainError> {
    let reason = body
        .and_then(|Json(body)| body.reason)
        .unwrap_or_else(|| "rejected by ops".to_string());
    Ok(Json(service.reject_cwc(&principal, &id, &reason)?))
}

async fn create_case(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CaseBody>,
) -> Result<(StatusCode, Json<Case>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.create_case(&principal, &body.cwc_id)?)))
}

async fn list_cases(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Case>>, DomainError> {
    Ok(Json(service.cases(&principal)?))
}

async fn get_case(State(service): Shared, Path(id): Path<String>) -> Result<Json<Case>, DomainError> {
    Ok(Json(service.case(&id)?))
}

async fn case_gates(
    State(service): Shared,
    Path(id): Path<String>,
) -> Result<Json<GateResponse>, DomainError> {
    let case = service.case(&id)?;
    let missing = service.missing_gates(&case)?;
    Ok(Json(GateResponse {
        case_id: case.id,
        missing,
    }))
}

async fn review_case(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<Case>, DomainError> {
    Ok(Json(service.review_case(&principal, &id, body.verified, body.notes)?))
}

async fn rmt_review(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<RmtReviewBody>,
) -> Result<Json<Case>, DomainError> {
    Ok(Json(service.rmt_review(&principal, &id, body.approved, body.notes)?))
}

async fn place_bid(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewBid>,
) -> Result<(StatusCode, Json<Bid>), DomainError> {
    Ok((StatusCode::CREATED, Json(service.place_bid(&principal, request)?)))
}

async fn get_bid(State(service): Shared, Path(id): Path<String>) -> Result<Json<Bid>, DomainError> {
    Ok(Json(service.bid(&id)?))
}

async fn negotiate(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(offer): Json<CounterOffer>,
) -> Result<Json<Bid>, DomainError> {
    Ok(Json(service.negotiate(&principal, &id, offer)?))
}

async fn accept_bid(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Bid>, DomainError> {
    Ok(Json(service.accept_bid(&principal, &id)?))
}

async fn reject_bid(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<Bid>, DomainError> {
    let reason = body.and_then(|Json(body)| body.reason);
    Ok(Json(service.reject_bid(&principal, &id, reason)?))
}

async fn lock_bid(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Case>, DomainError> {
    Ok(Json(service.lock_bid(&principal, &id)?))
}

async fn create_transaction(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Json(body): Json<TransactionBody>,
) -> Result<(StatusCode, Json<Transaction>), DomainError> {
    let txn = service.create_transaction(&principal, &body.case_id)?;
    Ok((StatusCode::CREATED, Json(txn)))
}

async fn list_transactions(State(service): Shared) -> Result<Json<Vec<Transaction>>, DomainError> {
    Ok(Json(service.transactions()?))
}

async fn get_transaction(
    State(service): Shared,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, DomainError> {
    Ok(Json(service.transaction(&id)?))
}

async fn setup_escrow(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<EscrowBody>,
) -> Result<Json<Transaction>, DomainError> {
    Ok(Json(service.setup_escrow(&principal, &id, &body.account_reference)?))
}

async fn disburse(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<DisburseBody>,
) -> Result<Json<Transaction>, DomainError> {
    Ok(Json(service.disburse(
        &principal,
        &id,
        body.step,
        body.reference,
        body.reason,
    )?))
}

async fn record_repayment(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<RepaymentBody>,
) -> Result<Json<Transaction>, DomainError> {
    Ok(Json(service.record_repayment(
        &principal,
        &id,
        body.amount,
        body.reference,
    )?))
}

async fn evaluate_overdue(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<OverdueResponse>, DomainError> {
    let (transaction, check) = service.evaluate_overdue(&principal, &id)?;
    Ok(Json(OverdueResponse { transaction, check }))
}

async fn mark_default(
    State(service): Shared,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<Transaction>, DomainError> {
    let reason = body
        .and_then(|Json(body)| body.reason)
        .unwrap_or_else(|| "declared in default".to_string());
    Ok(Json(service.mark_default(&principal, &id, &reason)?))
}
