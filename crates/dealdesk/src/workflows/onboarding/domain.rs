use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::blacklist::Identity;
use super::risk::{Recommendation, RiskCategory, RiskChecklist};
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::policy::{
    COOLING_PERIOD_MONTHS, KYC_EXPIRY_WARNING_DAYS, KYC_VALIDITY_MONTHS,
};
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubContractorStatus {
    LeadCreated,
    ProfileSubmitted,
    KycVerified,
    UnderRiskAssessment,
    Active,
    Dormant,
    CoolingPeriod,
    Blacklisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubContractorEvent {
    SubmitProfile,
    VerifyKyc,
    StartAssessment,
    Activate,
    GoDormant,
    Reactivate,
    StartCooling,
    EndCooling,
    Blacklist,
}

impl StateMachine for SubContractorStatus {
    type Event = SubContractorEvent;

    fn next(self, event: SubContractorEvent) -> Option<Self> {
        use SubContractorEvent as E;
        use SubContractorStatus as S;
        match (self, event) {
            (S::Blacklisted, _) => None,
            (_, E::Blacklist) => Some(S::Blacklisted),
            (S::LeadCreated, E::SubmitProfile) => Some(S::ProfileSubmitted),
            (S::ProfileSubmitted, E::VerifyKyc) => Some(S::KycVerified),
            (S::KycVerified, E::StartAssessment) => Some(S::UnderRiskAssessment),
            (S::UnderRiskAssessment, E::Activate) => Some(S::Active),
            (S::Active, E::GoDormant) => Some(S::Dormant),
            (S::Dormant, E::Reactivate) => Some(S::Active),
            (S::KycVerified | S::UnderRiskAssessment, E::StartCooling) => Some(S::CoolingPeriod),
            (S::CoolingPeriod, E::EndCooling) => Some(S::LeadCreated),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::LeadCreated => "LEAD_CREATED",
            Self::ProfileSubmitted => "PROFILE_SUBMITTED",
            Self::KycVerified => "KYC_VERIFIED",
            Self::UnderRiskAssessment => "UNDER_RISK_ASSESSMENT",
            Self::Active => "ACTIVE",
            Self::Dormant => "DORMANT",
            Self::CoolingPeriod => "COOLING_PERIOD",
            Self::Blacklisted => "BLACKLISTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Blacklisted)
    }
}

/// Last verified KYC and the reminder flags for its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycValidity {
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reminder_sent: bool,
    pub expired_flagged: bool,
}

impl KycValidity {
    pub fn starting(verified_at: DateTime<Utc>) -> Self {
        let expires_at = verified_at
            .checked_add_months(Months::new(KYC_VALIDITY_MONTHS))
            .unwrap_or(verified_at + Duration::days(365));
        Self {
            verified_at,
            expires_at,
            reminder_sent: false,
            expired_flagged: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn in_warning_window(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && now >= self.expires_at - Duration::days(KYC_EXPIRY_WARNING_DAYS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolingPeriod {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl CoolingPeriod {
    pub fn starting(at: DateTime<Utc>) -> Self {
        let ends_at = at
            .checked_add_months(Months::new(COOLING_PERIOD_MONTHS))
            .unwrap_or(at + Duration::days(182));
        Self {
            starts_at: at,
            ends_at,
        }
    }
}

/// Seller profile, created from a sales lead and never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubContractor {
    pub id: String,
    pub name: String,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<SubContractorStatus>,
    pub risk_category: Option<RiskCategory>,
    pub assessment_id: Option<String>,
    pub cooling_period: Option<CoolingPeriod>,
    pub kyc_validity: Option<KycValidity>,
    pub last_activity_date: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(SubContractor, "sub_contractor");

impl SubContractor {
    pub fn status(&self) -> SubContractorStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: SubContractorEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<SubContractorStatus, DomainError> {
        let status = self
            .lifecycle
            .advance(("sub_contractor", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }

    /// Enters the cooling period and stamps the six-month window.
    pub fn start_cooling(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(
            SubContractorEvent::StartCooling,
            by,
            at,
            Some("seller rejected".to_string()),
        )?;
        self.cooling_period = Some(CoolingPeriod::starting(at));
        Ok(())
    }

    pub fn end_cooling(
        &mut self,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<(), DomainError> {
        self.transition(SubContractorEvent::EndCooling, by, at, notes)?;
        self.cooling_period = None;
        self.assessment_id = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    Active,
    Suspended,
    Blacklisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyEvent {
    Suspend,
    Reinstate,
    Blacklist,
}

impl StateMachine for CompanyStatus {
    type Event = CompanyEvent;

    fn next(self, event: CompanyEvent) -> Option<Self> {
        match (self, event) {
            (Self::Active, CompanyEvent::Suspend) => Some(Self::Suspended),
            (Self::Suspended, CompanyEvent::Reinstate) => Some(Self::Active),
            (Self::Active | Self::Suspended, CompanyEvent::Blacklist) => Some(Self::Blacklisted),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Blacklisted => "BLACKLISTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Blacklisted)
    }
}

/// EPC buyer against whom bills are raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<CompanyStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Company, "company");

impl Company {
    pub fn status(&self) -> CompanyStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: CompanyEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<CompanyStatus, DomainError> {
        let status = self
            .lifecycle
            .advance(("company", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    Suspend,
}

impl StateMachine for AgentStatus {
    type Event = AgentEvent;

    fn next(self, event: AgentEvent) -> Option<Self> {
        match (self, event) {
            (Self::Active, AgentEvent::Suspend) => Some(Self::Suspended),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }
}

/// Sales channel partner who brings sellers in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<AgentStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Agent, "agent");

impl Agent {
    pub fn suspend(&mut self, by: &str, at: DateTime<Utc>, notes: Option<String>) -> Result<(), DomainError> {
        self.lifecycle
            .advance(("agent", &self.id), AgentEvent::Suspend, by, at, notes)?;
        self.updated_at = at;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    AwaitingOps,
    AwaitingOpsManager,
    AwaitingFounder,
    UnderApproval,
    Approved,
    Rejected,
}

impl AssessmentStatus {
    /// Draft tier implied by a risk category.
    pub fn tier_for(category: RiskCategory) -> Self {
        match category {
            RiskCategory::Low => Self::AwaitingOps,
            RiskCategory::Medium => Self::AwaitingOpsManager,
            RiskCategory::High => Self::AwaitingFounder,
        }
    }

    pub fn is_draft(self) -> bool {
        matches!(
            self,
            Self::AwaitingOps | Self::AwaitingOpsManager | Self::AwaitingFounder
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentEvent {
    Retier(RiskCategory),
    Submit,
    Approve,
    Reject,
    Reopen(RiskCategory),
}

impl StateMachine for AssessmentStatus {
    type Event = AssessmentEvent;

    fn next(self, event: AssessmentEvent) -> Option<Self> {
        match (self, event) {
            (draft, AssessmentEvent::Retier(category)) if draft.is_draft() => {
                Some(Self::tier_for(category))
            }
            (draft, AssessmentEvent::Submit) if draft.is_draft() => Some(Self::UnderApproval),
            (Self::UnderApproval, AssessmentEvent::Approve) => Some(Self::Approved),
            (Self::UnderApproval, AssessmentEvent::Reject) => Some(Self::Rejected),
            (Self::UnderApproval, AssessmentEvent::Reopen(category)) => {
                Some(Self::tier_for(category))
            }
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::AwaitingOps => "AWAITING_OPS",
            Self::AwaitingOpsManager => "AWAITING_OPS_MANAGER",
            Self::AwaitingFounder => "AWAITING_FOUNDER",
            Self::UnderApproval => "UNDER_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Current risk assessment for a seller. Score, category, recommendation and tier are written
/// together by [`SellerRiskAssessment::record_checklist`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerRiskAssessment {
    pub id: String,
    pub sub_contractor_id: String,
    pub checklist: RiskChecklist,
    pub risk_score: u8,
    pub risk_category: RiskCategory,
    pub recommendation: Recommendation,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<AssessmentStatus>,
    pub approval_id: Option<String>,
    pub assessed_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(SellerRiskAssessment, "seller_risk_assessment");

impl SellerRiskAssessment {
    pub fn open(
        id: String,
        sub_contractor_id: &str,
        checklist: RiskChecklist,
        by: &str,
        at: DateTime<Utc>,
    ) -> Self {
        let outcome = checklist.outcome();
        Self {
            id,
            sub_contractor_id: sub_contractor_id.to_string(),
            checklist,
            risk_score: outcome.score,
            risk_category: outcome.category,
            recommendation: outcome.recommendation,
            lifecycle: Lifecycle::new(AssessmentStatus::tier_for(outcome.category), by, at, None),
            approval_id: None,
            assessed_by: by.to_string(),
            created_at: at,
            updated_at: at,
            revision: 0,
        }
    }

    pub fn status(&self) -> AssessmentStatus {
        self.lifecycle.status()
    }

    /// Replaces the checklist and recomputes the derived fields in the same mutation.
    pub fn record_checklist(
        &mut self,
        checklist: RiskChecklist,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let outcome = checklist.outcome();
        let tier = self
            .lifecycle
            .check(AssessmentEvent::Retier(outcome.category))
            .map_err(|rejected| rejected.conflict("seller_risk_assessment", &self.id))?;
        if tier != self.status() {
            self.lifecycle.advance(
                ("seller_risk_assessment", &self.id),
                AssessmentEvent::Retier(outcome.category),
                by,
                at,
                Some(format!("score {}", outcome.score)),
            )?;
        }
        self.checklist = checklist;
        self.risk_score = outcome.score;
        self.risk_category = outcome.category;
        self.recommendation = outcome.recommendation;
        self.assessed_by = by.to_string();
        self.updated_at = at;
        Ok(())
    }

    pub fn transition(
        &mut self,
        event: AssessmentEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<AssessmentStatus, DomainError> {
        let status =
            self.lifecycle
                .advance(("seller_risk_assessment", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::onboarding::risk::ChecklistItem;

    #[test]
    fn blacklisting_is_reachable_from_every_live_status() {
        use SubContractorStatus as S;
        for status in [
            S::LeadCreated,
            S::ProfileSubmitted,
            S::KycVerified,
            S::UnderRiskAssessment,
            S::Active,
            S::Dormant,
            S::CoolingPeriod,
        ] {
            assert_eq!(status.next(SubContractorEvent::Blacklist), Some(S::Blacklisted));
        }
        assert_eq!(S::Blacklisted.next(SubContractorEvent::Reactivate), None);
    }

    #[test]
    fn kyc_validity_runs_twelve_months_with_warning_window() {
        let verified = DateTime::parse_from_rfc3339("2025-01-15T00:00:00Z")
            .expect("valid")
            .with_timezone(&Utc);
        let kyc = KycValidity::starting(verified);
        assert_eq!(kyc.expires_at.to_rfc3339(), "2026-01-15T00:00:00+00:00");
        assert!(!kyc.in_warning_window(verified + Duration::days(300)));
        assert!(kyc.in_warning_window(verified + Duration::days(340)));
        assert!(kyc.is_expired(kyc.expires_at));
    }

    #[test]
    fn checklist_updates_move_the_tier_with_the_category() {
        let at = Utc::now();
        let mut assessment = SellerRiskAssessment::open(
            "sra-1".to_string(),
            "sc-1",
            RiskChecklist::all_verified(),
            "rmt-1",
            at,
        );
        assert_eq!(assessment.status(), AssessmentStatus::AwaitingOps);

        let mut checklist = assessment.checklist;
        checklist.set(ChecklistItem::BlacklistCheck, false);
        assessment
            .record_checklist(checklist, "rmt-1", at)
            .expect("draft accepts updates");

        assert_eq!(assessment.risk_score, 50);
        assert_eq!(assessment.risk_category, RiskCategory::Medium);
        assert_eq!(assessment.status(), AssessmentStatus::AwaitingOpsManager);
        assert_eq!(assessment.lifecycle.history().len(), 2);
    }

    #[test]
    fn submitted_checklist_is_frozen() {
        let at = Utc::now();
        let mut assessment = SellerRiskAssessment::open(
            "sra-2".to_string(),
            "sc-1",
            RiskChecklist::default(),
            "rmt-1",
            at,
        );
        assessment
            .transition(AssessmentEvent::Submit, "rmt-1", at, None)
            .expect("submit from draft");
        let err = assessment
            .record_checklist(RiskChecklist::all_verified(), "rmt-1", at)
            .expect_err("frozen");
        assert!(matches!(err, DomainError::StateConflict { current: "UNDER_APPROVAL", .. }));
        assert_eq!(assessment.risk_score, 0);
    }
}
