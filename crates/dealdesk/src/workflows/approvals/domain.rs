use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::common::Role;
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::onboarding::RiskCategory;
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    #[serde(rename = "DEAL_ABOVE_1CR")]
    DealAbove1Cr,
    HighRiskCase,
    AgentMisconduct,
    StrategicException,
    BlacklistEntry,
    SellerRiskApproval,
    SellerRejection,
    CoolingPeriodOverride,
}

impl RequestType {
    pub const ALL: [Self; 8] = [
        Self::DealAbove1Cr,
        Self::HighRiskCase,
        Self::AgentMisconduct,
        Self::StrategicException,
        Self::BlacklistEntry,
        Self::SellerRiskApproval,
        Self::SellerRejection,
        Self::CoolingPeriodOverride,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::DealAbove1Cr => "DEAL_ABOVE_1CR",
            Self::HighRiskCase => "HIGH_RISK_CASE",
            Self::AgentMisconduct => "AGENT_MISCONDUCT",
            Self::StrategicException => "STRATEGIC_EXCEPTION",
            Self::BlacklistEntry => "BLACKLIST_ENTRY",
            Self::SellerRiskApproval => "SELLER_RISK_APPROVAL",
            Self::SellerRejection => "SELLER_REJECTION",
            Self::CoolingPeriodOverride => "COOLING_PERIOD_OVERRIDE",
        }
    }

    /// Kind of record the request is about; `None` accepts any subject.
    pub const fn subject_kind(self) -> Option<SubjectKind> {
        match self {
            Self::DealAbove1Cr | Self::HighRiskCase => Some(SubjectKind::Case),
            Self::AgentMisconduct => Some(SubjectKind::Agent),
            Self::BlacklistEntry => Some(SubjectKind::BlacklistEntry),
            Self::SellerRiskApproval | Self::SellerRejection => Some(SubjectKind::Assessment),
            Self::CoolingPeriodOverride => Some(SubjectKind::SubContractor),
            Self::StrategicException => None,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    SubContractor,
    Assessment,
    BlacklistEntry,
    Agent,
    Company,
    Case,
    Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSubject {
    pub kind: SubjectKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelStatus {
    Pending,
    Approved,
    Rejected,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub level: usize,
    pub approver_role: Role,
    pub status: LevelStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Escalated,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalEvent {
    /// A non-final level signed off.
    AdvanceLevel,
    ApproveFinal,
    Reject,
    Escalate,
    Cancel,
}

impl StateMachine for ApprovalStatus {
    type Event = ApprovalEvent;

    fn next(self, event: ApprovalEvent) -> Option<Self> {
        if self.is_terminal() {
            return None;
        }
        Some(match event {
            ApprovalEvent::AdvanceLevel => Self::Pending,
            ApprovalEvent::ApproveFinal => Self::Approved,
            ApprovalEvent::Reject => Self::Rejected,
            ApprovalEvent::Escalate => Self::Escalated,
            ApprovalEvent::Cancel => Self::Cancelled,
        })
    }

    fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Escalated => "ESCALATED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }
}

/// Escalation record decoupled from the entity it gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub request_type: RequestType,
    pub subject: ApprovalSubject,
    pub requested_by: String,
    pub requester_role: Role,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_category: Option<RiskCategory>,
    pub approval_chain: Vec<ApprovalLevel>,
    /// 1-based index into `approval_chain`.
    pub current_level: usize,
    pub level_entered_at: DateTime<Utc>,
    pub reminded_level: Option<usize>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<ApprovalStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(ApprovalRequest, "approval_request");

impl ApprovalRequest {
    pub fn status(&self) -> ApprovalStatus {
        self.lifecycle.status()
    }

    pub fn is_open(&self) -> bool {
        !self.status().is_terminal()
    }

    pub fn current(&self) -> Option<&ApprovalLevel> {
        self.approval_chain.get(self.current_level.checked_sub(1)?)
    }

    fn current_mut(&mut self) -> Option<&mut ApprovalLevel> {
        let index = self.current_level.checked_sub(1)?;
        self.approval_chain.get_mut(index)
    }

    pub fn is_final_level(&self) -> bool {
        self.current_level >= self.approval_chain.len()
    }

    fn conflict(&self, attempted: String) -> DomainError {
        DomainError::StateConflict {
            entity: "approval_request",
            id: self.id.clone(),
            current: self.status().label(),
            attempted,
        }
    }

    fn decide_current(
        &mut self,
        status: LevelStatus,
        by: &str,
        at: DateTime<Utc>,
        comments: Option<String>,
    ) -> Result<(), DomainError> {
        let id = self.id.clone();
        let level = self
            .current_mut()
            .ok_or_else(|| DomainError::validation(format!("approval {id} has no open level")))?;
        level.status = status;
        level.decided_by = Some(by.to_string());
        level.decided_at = Some(at);
        level.comments = comments;
        Ok(())
    }

    /// Records a sign-off at the current level, returning the request status afterwards.
    pub fn approve_level(
        &mut self,
        by: &str,
        at: DateTime<Utc>,
        comments: Option<String>,
    ) -> Result<ApprovalStatus, DomainError> {
        let event = if self.is_final_level() {
            ApprovalEvent::ApproveFinal
        } else {
            ApprovalEvent::AdvanceLevel
        };
        let level = self.current_level;
        self.lifecycle.advance(
            ("approval_request", &self.id),
            event,
            by,
            at,
            Some(format!("level {level} approved")),
        )?;
        self.decide_current(LevelStatus::Approved, by, at, comments)?;
        if event == ApprovalEvent::AdvanceLevel {
            self.current_level += 1;
            self.level_entered_at = at;
        }
        self.updated_at = at;
        Ok(self.status())
    }

    pub fn reject(
        &mut self,
        by: &str,
        at: DateTime<Utc>,
        comments: Option<String>,
    ) -> Result<(), DomainError> {
        let level = self.current_level;
        self.lifecycle.advance(
            ("approval_request", &self.id),
            ApprovalEvent::Reject,
            by,
            at,
            Some(format!("level {level} rejected")),
        )?;
        self.decide_current(LevelStatus::Rejected, by, at, comments)?;
        self.updated_at = at;
        Ok(())
    }

    /// Skips the current level. Fails at the final level rather than doing nothing.
    pub fn escalate(
        &mut self,
        by: &str,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        if self.is_open() && self.is_final_level() {
            return Err(self.conflict(format!(
                "Escalate beyond final level {}",
                self.approval_chain.len()
            )));
        }
        self.lifecycle.advance(
            ("approval_request", &self.id),
            ApprovalEvent::Escalate,
            by,
            at,
            reason.clone(),
        )?;
        self.decide_current(LevelStatus::Skipped, by, at, reason)?;
        self.current_level += 1;
        self.level_entered_at = at;
        self.updated_at = at;
        Ok(())
    }

    pub fn cancel(
        &mut self,
        by: &str,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        self.lifecycle.advance(
            ("approval_request", &self.id),
            ApprovalEvent::Cancel,
            by,
            at,
            reason,
        )?;
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::approvals::resolver::build_chain;

    fn request(request_type: RequestType) -> ApprovalRequest {
        let at = Utc::now();
        ApprovalRequest {
            id: "apr-1".to_string(),
            request_type,
            subject: ApprovalSubject {
                kind: SubjectKind::Case,
                id: "case-1".to_string(),
            },
            requested_by: "ops-1".to_string(),
            requester_role: Role::Ops,
            reason: "large ticket".to_string(),
            amount: Some(12_000_000.0),
            risk_category: None,
            approval_chain: build_chain(request_type),
            current_level: 1,
            level_entered_at: at,
            reminded_level: None,
            lifecycle: Lifecycle::new(ApprovalStatus::Pending, "ops-1", at, None),
            created_at: at,
            updated_at: at,
            revision: 0,
        }
    }

    #[test]
    fn two_level_chain_needs_both_sign_offs() {
        let at = Utc::now();
        let mut request = request(RequestType::DealAbove1Cr);
        assert_eq!(
            request.approve_level("om-1", at, None).expect("level 1"),
            ApprovalStatus::Pending
        );
        assert_eq!(request.current_level, 2);
        assert_eq!(
            request.approve_level("founder-1", at, None).expect("level 2"),
            ApprovalStatus::Approved
        );
        assert_eq!(request.current_level, 2);
        assert!(request
            .approval_chain
            .iter()
            .all(|level| level.status == LevelStatus::Approved));
    }

    #[test]
    fn escalation_skips_a_level_and_stops_at_the_last() {
        let at = Utc::now();
        let mut request = request(RequestType::HighRiskCase);
        request.escalate("om-1", at, Some("stale".to_string())).expect("escalate");
        assert_eq!(request.status(), ApprovalStatus::Escalated);
        assert_eq!(request.approval_chain[0].status, LevelStatus::Skipped);
        assert_eq!(request.current_level, 2);

        let err = request.escalate("om-1", at, None).expect_err("no level left");
        assert!(matches!(err, DomainError::StateConflict { .. }));
        assert!(request.current_level <= request.approval_chain.len());
    }

    #[test]
    fn terminal_requests_refuse_further_decisions() {
        let at = Utc::now();
        let mut request = request(RequestType::BlacklistEntry);
        request.reject("om-1", at, None).expect("reject");
        assert!(matches!(
            request.approve_level("om-1", at, None),
            Err(DomainError::StateConflict { current: "REJECTED", .. })
        ));
        assert!(request.cancel("ops-1", at, None).is_err());
    }
}
