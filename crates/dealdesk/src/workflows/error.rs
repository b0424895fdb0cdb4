use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use super::approvals::RequestType;
use super::common::Role;
use super::ports::StorageError;
use super::store::RepositoryError;

/// Error surfaced by every workflow operation and rendered verbatim to API callers.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{entity} {id} is {current}; cannot apply {attempted}")]
    StateConflict {
        entity: &'static str,
        id: String,
        current: &'static str,
        attempted: String,
    },
    #[error("{actor} ({role}) may not {action}; requires {required}")]
    Authorization {
        actor: String,
        role: Role,
        required: String,
        action: String,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("identity matches active blacklist entry {entry_id} on {matched_on}")]
    Blacklisted {
        entry_id: String,
        matched_on: &'static str,
    },
    #[error("{request_type} approval required for {entity} {id}")]
    ApprovalRequired {
        request_type: RequestType,
        entity: &'static str,
        id: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::StateConflict { .. } => "state_conflict",
            Self::Authorization { .. } => "authorization",
            Self::NotFound { .. } => "not_found",
            Self::Blacklisted { .. } => "blacklisted",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::Storage(_) => "external_adapter",
            Self::Repository(RepositoryError::StaleRevision { .. }) => "state_conflict",
            Self::Repository(RepositoryError::NotFound { .. }) => "not_found",
            Self::Repository(_) => "repository",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::StateConflict { .. } => StatusCode::CONFLICT,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Blacklisted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ApprovalRequired { .. } => StatusCode::PRECONDITION_FAILED,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(RepositoryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Repository(RepositoryError::Conflict { .. })
            | Self::Repository(RepositoryError::StaleRevision { .. }) => StatusCode::CONFLICT,
            Self::Repository(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        match self {
            Self::StateConflict {
                entity,
                id,
                current,
                attempted,
            } => {
                context.insert("entity".into(), json!(entity));
                context.insert("id".into(), json!(id));
                context.insert("current_status".into(), json!(current));
                context.insert("attempted".into(), json!(attempted));
            }
            Self::NotFound { entity, id } | Self::ApprovalRequired { entity, id, .. } => {
                context.insert("entity".into(), json!(entity));
                context.insert("id".into(), json!(id));
            }
            Self::Authorization { role, required, .. } => {
                context.insert("role".into(), json!(role));
                context.insert("required".into(), json!(required));
            }
            Self::Blacklisted { entry_id, .. } => {
                context.insert("blacklist_entry".into(), json!(entry_id));
            }
            Self::Repository(RepositoryError::StaleRevision { kind, id, .. }) => {
                context.insert("entity".into(), json!(kind));
                context.insert("id".into(), json!(id));
            }
            _ => {}
        }
        context
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let mut body = self.context();
        body.insert("error".into(), json!(self.to_string()));
        body.insert("kind".into(), json!(self.kind()));
        (self.status_code(), Json(Value::Object(body))).into_response()
    }
}
