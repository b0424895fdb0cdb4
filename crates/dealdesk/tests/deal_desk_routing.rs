//! Routing scenarios for the assembled deal desk.
//!
//! Requests go through `platform_router` exactly as the API binary mounts it, with the caller's
//! principal layered on as an extension, so role checks, error bodies, and the cron surface are
//! exercised without reaching into private modules.

mod common {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        Extension, Router,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use dealdesk::workflows::common::{FixedClock, Principal, Role};
    use dealdesk::workflows::ports::{MemoryDocumentStorage, RecordingNotifier};
    use dealdesk::workflows::{platform_router, Context, Platform, Stores};

    pub(super) fn platform() -> Platform {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        Platform::new(Context::new(
            Stores::in_memory(),
            clock,
            Arc::new(RecordingNotifier::default()),
            Arc::new(MemoryDocumentStorage::default()),
        ))
    }

    pub(super) fn as_user(platform: &Platform, id: &str, role: Role) -> Router {
        platform_router(platform).layer(Extension(Principal::new(id, role)))
    }

    pub(super) async fn send(
        router: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("serialize body"))),
            None => request.body(Body::empty()),
        }
        .expect("request");
        let response = router.oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }
}

use axum::http::StatusCode;
use serde_json::json;

use common::{as_user, platform, send};
use dealdesk::workflows::common::Role;

#[tokio::test]
async fn lender_registration_is_reserved_for_ops_managers() {
    let platform = platform();
    let payload = json!({ "name": "Northwind Capital", "email": "desk@northwind.example" });

    let (status, body) = send(
        as_user(&platform, "ops-1", Role::Ops),
        "POST",
        "/nbfc",
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "authorization");

    let (status, created) = send(
        as_user(&platform, "om-1", Role::OpsManager),
        "POST",
        "/nbfc",
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email"], "desk@northwind.example");

    let (status, listed) = send(as_user(&platform, "ops-1", Role::Ops), "GET", "/nbfc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn seller_leads_require_an_identity() {
    let platform = platform();

    let (status, body) = send(
        as_user(&platform, "sales-1", Role::Sales),
        "POST",
        "/sub-contractors",
        Some(json!({ "name": "Surya Installers" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, lead) = send(
        as_user(&platform, "sales-1", Role::Sales),
        "POST",
        "/sub-contractors",
        Some(json!({ "name": "Surya Installers", "pan": "abcde1234f", "sector": "Solar EPC" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lead["status"], "LEAD_CREATED");
    assert_eq!(lead["identity"]["pan"], "ABCDE1234F");

    let id = lead["id"].as_str().expect("lead id");
    let (status, fetched) = send(
        as_user(&platform, "ops-1", Role::Ops),
        "GET",
        &format!("/sub-contractors/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Surya Installers");
}

#[tokio::test]
async fn unknown_records_surface_as_not_found() {
    let platform = platform();
    let (status, body) = send(
        as_user(&platform, "ops-1", Role::Ops),
        "GET",
        "/cases/case-missing",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
    assert_eq!(body["id"], "case-missing");
}

#[tokio::test]
async fn bill_upload_needs_a_document_type() {
    let platform = platform();
    let (status, body) = send(
        as_user(&platform, "sales-1", Role::Sales),
        "POST",
        "/bills?sub_contractor_id=sc-1&company_id=co-1&invoice_number=INV-7&amount=250000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn strategic_exceptions_climb_from_ops_manager_to_founder() {
    let platform = platform();
    let (status, raised) = send(
        as_user(&platform, "ops-1", Role::Ops),
        "POST",
        "/approvals",
        Some(json!({
            "request_type": "STRATEGIC_EXCEPTION",
            "subject_kind": "case",
            "subject_id": "case-42",
            "reason": "anchor buyer relationship",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(raised["current_level"], 1);
    let id = raised["id"].as_str().expect("approval id").to_string();

    let (_, queue) = send(
        as_user(&platform, "om-1", Role::OpsManager),
        "GET",
        "/approvals/my-pending",
        None,
    )
    .await;
    assert_eq!(queue.as_array().map(Vec::len), Some(1));

    let (status, approved) = send(
        as_user(&platform, "om-1", Role::OpsManager),
        "POST",
        &format!("/approvals/{id}/approve"),
        Some(json!({ "comments": "fine by ops" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["current_level"], 2);

    let (_, queue) = send(
        as_user(&platform, "om-1", Role::OpsManager),
        "GET",
        "/approvals/my-pending",
        None,
    )
    .await;
    assert_eq!(queue.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn cron_runs_every_job_and_reports_status() {
    let platform = platform();

    let (status, body) = send(
        as_user(&platform, "sales-1", Role::Sales),
        "POST",
        "/cron/run/all",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "authorization");

    let (status, body) = send(
        as_user(&platform, "scheduler", Role::System),
        "POST",
        "/cron/run/all",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["reports"].as_array().map(Vec::len), Some(7));

    let (status, body) = send(
        as_user(&platform, "scheduler", Role::System),
        "POST",
        "/cron/run/sla_reminders",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reports"][0]["job"], "sla-reminders");

    let (status, body) = send(
        as_user(&platform, "om-1", Role::OpsManager),
        "GET",
        "/cron/status",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    let jobs = body["jobs"].as_array().expect("jobs");
    assert_eq!(jobs.len(), 7);
    assert!(jobs.iter().all(|job| !job["last_run"].is_null()));
}

#[tokio::test]
async fn unknown_cron_jobs_are_not_found() {
    let platform = platform();
    let (status, body) = send(
        as_user(&platform, "scheduler", Role::System),
        "POST",
        "/cron/run/reticulate-splines",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}
