use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    ApprovalRequest, ApprovalStatus, ApprovalSubject, RequestType, SubjectKind,
};
use super::effects::Effects;
use super::resolver::build_chain;
use crate::workflows::common::{next_id, Principal, Role};
use crate::workflows::context::Context;
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::onboarding::RiskCategory;
use crate::workflows::ports::{dispatch, Notice};
use crate::workflows::sla::SlaService;
use crate::workflows::store::require;

const STAFF: [Role; 5] = [Role::Sales, Role::Ops, Role::OpsManager, Role::Rmt, Role::System];

/// Payload for raising a request, from the API or from another workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApproval {
    pub request_type: RequestType,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub reason: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub risk_category: Option<RiskCategory>,
}

/// Owns approval requests and applies their side effects on terminal decisions.
pub struct ApprovalService {
    ctx: Context,
    sla: Arc<SlaService>,
}

impl ApprovalService {
    pub fn new(ctx: Context, sla: Arc<SlaService>) -> Self {
        Self { ctx, sla }
    }

    fn effects(&self) -> Effects<'_> {
        Effects {
            ctx: &self.ctx,
            sla: &self.sla,
        }
    }

    /// Opens a request, or returns the open one already filed for the same type and subject.
    pub fn raise(
        &self,
        principal: &Principal,
        request: NewApproval,
    ) -> Result<ApprovalRequest, DomainError> {
        principal.require(&STAFF, "raise approval requests")?;
        if request.reason.trim().is_empty() {
            return Err(DomainError::validation("approval reason is required"));
        }
        if request.subject_id.trim().is_empty() {
            return Err(DomainError::validation("approval subject is required"));
        }
        if let Some(expected) = request.request_type.subject_kind() {
            if expected != request.subject_kind {
                return Err(DomainError::validation(format!(
                    "{} requests must reference a {:?} subject",
                    request.request_type, expected
                )));
            }
        }

        if let Some(open) = self.open_for(request.request_type, &request.subject_id)? {
            return Ok(open);
        }

        let now = self.ctx.now();
        let record = ApprovalRequest {
            id: next_id("apr"),
            request_type: request.request_type,
            subject: ApprovalSubject {
                kind: request.subject_kind,
                id: request.subject_id,
            },
            requested_by: principal.id.clone(),
            requester_role: principal.role,
            reason: request.reason,
            amount: request.amount,
            risk_category: request.risk_category,
            approval_chain: build_chain(request.request_type),
            current_level: 1,
            level_entered_at: now,
            reminded_level: None,
            lifecycle: Lifecycle::new(ApprovalStatus::Pending, &principal.id, now, None),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let stored = self.ctx.stores.approvals.insert(record)?;
        info!(
            approval = %stored.id,
            request_type = %stored.request_type,
            subject = %stored.subject.id,
            "approval requested"
        );
        self.notify_approver(&stored);
        Ok(stored)
    }

    pub fn get(&self, id: &str) -> Result<ApprovalRequest, DomainError> {
        require(self.ctx.stores.approvals.as_ref(), id)
    }

    pub fn list(&self) -> Result<Vec<ApprovalRequest>, DomainError> {
        Ok(self.ctx.stores.approvals.list()?)
    }

    /// Open requests whose current level the caller can decide.
    pub fn my_pending(&self, principal: &Principal) -> Result<Vec<ApprovalRequest>, DomainError> {
        Ok(self
            .ctx
            .stores
            .approvals
            .list()?
            .into_iter()
            .filter(|request| request.is_open())
            .filter(|request| {
                principal.role.has_override()
                    || request
                        .current()
                        .is_some_and(|level| level.approver_role == principal.role)
            })
            .collect())
    }

    pub fn open_for(
        &self,
        request_type: RequestType,
        subject_id: &str,
    ) -> Result<Option<ApprovalRequest>, DomainError> {
        Ok(self.ctx.stores.approvals.list()?.into_iter().find(|request| {
            request.is_open()
                && request.request_type == request_type
                && request.subject.id == subject_id
        }))
    }

    pub fn is_approved(
        &self,
        request_type: RequestType,
        subject_id: &str,
    ) -> Result<bool, DomainError> {
        Ok(self.ctx.stores.approvals.list()?.iter().any(|request| {
            request.request_type == request_type
                && request.subject.id == subject_id
                && request.status() == ApprovalStatus::Approved
        }))
    }

    fn authorize_decision(
        &self,
        principal: &Principal,
        request: &ApprovalRequest,
        action: &str,
    ) -> Result<(), DomainError> {
        if !request.is_open() {
            return Err(DomainError::StateConflict {
                entity: "approval_request",
                id: request.id.clone(),
                current: request.status().label(),
                attempted: action.to_string(),
            });
        }
        let level = request
            .current()
            .ok_or_else(|| DomainError::validation(format!("approval {} has no open level", request.id)))?;
        principal.require(
            &[level.approver_role],
            &format!("{action} level {} of {}", level.level, request.id),
        )
    }

    pub fn approve(
        &self,
        principal: &Principal,
        id: &str,
        comments: Option<String>,
    ) -> Result<ApprovalRequest, DomainError> {
        let mut request = self.get(id)?;
        self.authorize_decision(principal, &request, "approve")?;

        let now = self.ctx.now();
        let status = request.approve_level(&principal.id, now, comments)?;
        // Subject effects only run once this decision has won the revision check.
        let stored = self.ctx.stores.approvals.update(request)?;
        if status == ApprovalStatus::Approved {
            self.effects().on_approved(&stored, &principal.id, now)?;
        }

        info!(approval = %stored.id, status = stored.status().label(), "approval level signed off");
        if stored.is_open() {
            self.notify_approver(&stored);
        } else {
            self.notify_requester(&stored);
        }
        Ok(stored)
    }

    pub fn reject(
        &self,
        principal: &Principal,
        id: &str,
        comments: Option<String>,
    ) -> Result<ApprovalRequest, DomainError> {
        let mut request = self.get(id)?;
        self.authorize_decision(principal, &request, "reject")?;

        let now = self.ctx.now();
        request.reject(&principal.id, now, comments)?;
        let stored = self.ctx.stores.approvals.update(request)?;
        self.effects().on_rejected(&stored, &principal.id, now)?;

        info!(approval = %stored.id, "approval rejected");
        self.notify_requester(&stored);
        Ok(stored)
    }

    /// Skips the current level. Open to the requester, the current approver, and the scheduler.
    pub fn escalate(
        &self,
        principal: &Principal,
        id: &str,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, DomainError> {
        let mut request = self.get(id)?;
        if principal.id != request.requested_by {
            let approver = request
                .current()
                .map(|level| level.approver_role)
                .unwrap_or(Role::OpsManager);
            principal.require(&[approver, Role::System], "escalate approval")?;
        }

        let now = self.ctx.now();
        let from_level = request.current_level;
        request.escalate(&principal.id, now, reason)?;
        let stored = self.ctx.stores.approvals.update(request)?;

        info!(
            approval = %stored.id,
            from_level,
            to_level = stored.current_level,
            "approval escalated"
        );
        self.notify_approver(&stored);
        Ok(stored)
    }

    pub fn cancel(
        &self,
        principal: &Principal,
        id: &str,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, DomainError> {
        let mut request = self.get(id)?;
        if principal.id != request.requested_by {
            principal.require(&[Role::Admin], "cancel another user's approval")?;
        }
        request.cancel(&principal.id, self.ctx.now(), reason)?;
        let stored = self.ctx.stores.approvals.update(request)?;
        info!(approval = %stored.id, "approval cancelled");
        Ok(stored)
    }

    /// Nudges the current approver once per level. Returns false when already reminded.
    pub fn remind(&self, id: &str) -> Result<bool, DomainError> {
        let mut request = self.get(id)?;
        if !request.is_open() || request.reminded_level == Some(request.current_level) {
            return Ok(false);
        }
        request.reminded_level = Some(request.current_level);
        request.updated_at = self.ctx.now();
        let stored = self.ctx.stores.approvals.update(request)?;
        if let Some(level) = stored.current() {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("approval_reminder", level.approver_role.label(), &stored.id)
                    .with("request_type", stored.request_type)
                    .with("level", level.level),
            );
        }
        Ok(true)
    }

    fn notify_approver(&self, request: &ApprovalRequest) {
        if let Some(level) = request.current() {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("approval_requested", level.approver_role.label(), &request.id)
                    .with("request_type", request.request_type)
                    .with("subject", &request.subject.id)
                    .with("level", level.level),
            );
        }
    }

    fn notify_requester(&self, request: &ApprovalRequest) {
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("approval_decided", &request.requested_by, &request.id)
                .with("request_type", request.request_type)
                .with("status", request.status().label()),
        );
    }
}
