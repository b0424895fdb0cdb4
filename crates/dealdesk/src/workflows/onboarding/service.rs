use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::blacklist::{
    self, BlacklistEntry, BlacklistStatus, Identity, ListedParty, ListedSubject,
};
use super::domain::{
    Agent, AgentStatus, AssessmentEvent, Company, CompanyEvent, CompanyStatus, KycValidity,
    SellerRiskAssessment, SubContractor, SubContractorEvent, SubContractorStatus,
};
use super::risk::{ChecklistItem, Recommendation, RiskChecklist};
use crate::workflows::approvals::{
    ApprovalRequest, ApprovalService, NewApproval, RequestType, SubjectKind,
};
use crate::workflows::common::{next_id, Principal, Role};
use crate::workflows::context::Context;
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::Lifecycle;
use crate::workflows::ports::{dispatch, Notice};
use crate::workflows::sla::{SlaService, SlaSubjectKind};
use crate::workflows::store::require;

const LEAD_OWNERS: [Role; 3] = [Role::Sales, Role::Ops, Role::OpsManager];
const REPORTERS: [Role; 4] = [Role::Sales, Role::Ops, Role::OpsManager, Role::Rmt];

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubContractor {
    pub name: String,
    #[serde(default)]
    pub pan: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub geography: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub pan: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub geography: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlacklistReport {
    #[serde(default)]
    pub pan: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub subject: Option<ListedSubject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlacklistCheck {
    pub blacklisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<BlacklistEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_on: Option<&'static str>,
}

/// Seller admission: leads, KYC, risk assessment, blacklist, plus buyer and agent records.
pub struct OnboardingService {
    ctx: Context,
    approvals: Arc<ApprovalService>,
    sla: Arc<SlaService>,
}

impl OnboardingService {
    pub fn new(ctx: Context, approvals: Arc<ApprovalService>, sla: Arc<SlaService>) -> Self {
        Self {
            ctx,
            approvals,
            sla,
        }
    }

    fn gate(&self, identity: &Identity) -> Result<(), DomainError> {
        blacklist::ensure_clear(self.ctx.stores.blacklist.as_ref(), identity)
    }

    pub fn sub_contractor(&self, id: &str) -> Result<SubContractor, DomainError> {
        require(self.ctx.stores.sub_contractors.as_ref(), id)
    }

    pub fn sub_contractors(&self) -> Result<Vec<SubContractor>, DomainError> {
        Ok(self.ctx.stores.sub_contractors.list()?)
    }

    pub fn assessment(&self, id: &str) -> Result<SellerRiskAssessment, DomainError> {
        require(self.ctx.stores.assessments.as_ref(), id)
    }

    /// Creates a seller lead and starts its onboarding SLA.
    pub fn create_lead(
        &self,
        principal: &Principal,
        request: NewSubContractor,
    ) -> Result<SubContractor, DomainError> {
        principal.require(&LEAD_OWNERS, "create seller leads")?;
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("seller name is required"));
        }
        let identity = Identity::new(
            request.pan.as_deref(),
            request.gstin.as_deref(),
            request.email.as_deref(),
        );
        if identity.is_empty() {
            return Err(DomainError::validation(
                "at least one of pan, gstin or email is required",
            ));
        }
        self.gate(&identity)?;
        if let Some(agent_id) = request.agent_id.as_deref() {
            let agent = require::<Agent>(self.ctx.stores.agents.as_ref(), agent_id)?;
            if agent.lifecycle.status() != AgentStatus::Active {
                return Err(DomainError::validation(format!(
                    "agent {agent_id} is suspended"
                )));
            }
        }

        let now = self.ctx.now();
        let seller = SubContractor {
            id: next_id("sc"),
            name: request.name.trim().to_string(),
            identity,
            geography: request.geography,
            sector: request.sector,
            agent_id: request.agent_id,
            lifecycle: Lifecycle::new(SubContractorStatus::LeadCreated, &principal.id, now, None),
            risk_category: None,
            assessment_id: None,
            cooling_period: None,
            kyc_validity: None,
            last_activity_date: now,
            created_by: principal.id.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let stored = self.ctx.stores.sub_contractors.insert(seller)?;
        self.sla
            .open(SlaSubjectKind::Onboarding, &stored.id, &principal.id)?;
        info!(sub_contractor = %stored.id, "seller lead created");
        Ok(stored)
    }

    pub fn submit_profile(
        &self,
        principal: &Principal,
        id: &str,
    ) -> Result<SubContractor, DomainError> {
        if !(principal.role == Role::SubContractor && principal.id == id) {
            principal.require(&LEAD_OWNERS, "submit seller profiles")?;
        }
        let mut seller = self.sub_contractor(id)?;
        let now = self.ctx.now();
        seller.transition(SubContractorEvent::SubmitProfile, &principal.id, now, None)?;
        seller.last_activity_date = now;
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        self.sla.progress_quietly(&stored.id);
        Ok(stored)
    }

    /// First verification moves the seller forward; later ones renew the validity window.
    pub fn verify_kyc(&self, principal: &Principal, id: &str) -> Result<SubContractor, DomainError> {
        principal.require(&[Role::Ops, Role::OpsManager], "verify KYC")?;
        let mut seller = self.sub_contractor(id)?;
        let now = self.ctx.now();
        let first_verification = seller.status() == SubContractorStatus::ProfileSubmitted;
        match seller.status() {
            SubContractorStatus::ProfileSubmitted => {
                seller.transition(SubContractorEvent::VerifyKyc, &principal.id, now, None)?;
            }
            SubContractorStatus::KycVerified
            | SubContractorStatus::UnderRiskAssessment
            | SubContractorStatus::Active
            | SubContractorStatus::Dormant => {}
            _ => {
                seller
                    .lifecycle
                    .check(SubContractorEvent::VerifyKyc)
                    .map_err(|rejected| rejected.conflict("sub_contractor", &seller.id))?;
            }
        }
        seller.kyc_validity = Some(KycValidity::starting(now));
        seller.updated_at = now;
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        if first_verification {
            self.sla.progress_quietly(&stored.id);
        }
        info!(sub_contractor = %stored.id, renewal = !first_verification, "kyc verified");
        Ok(stored)
    }

    /// Opens the seller's risk assessment. Blacklisted identities never get one.
    pub fn start_assessment(
        &self,
        principal: &Principal,
        sub_contractor_id: &str,
        checklist: Option<RiskChecklist>,
    ) -> Result<SellerRiskAssessment, DomainError> {
        principal.require(&[Role::Rmt], "assess seller risk")?;
        let mut seller = self.sub_contractor(sub_contractor_id)?;
        self.gate(&seller.identity)?;
        seller
            .lifecycle
            .check(SubContractorEvent::StartAssessment)
            .map_err(|rejected| rejected.conflict("sub_contractor", &seller.id))?;
        let now = self.ctx.now();
        if seller
            .kyc_validity
            .as_ref()
            .map_or(true, |kyc| kyc.is_expired(now))
        {
            return Err(DomainError::validation(format!(
                "seller {sub_contractor_id} has no valid KYC"
            )));
        }

        let assessment = SellerRiskAssessment::open(
            next_id("sra"),
            &seller.id,
            checklist.unwrap_or_default(),
            &principal.id,
            now,
        );
        let assessment = self.ctx.stores.assessments.insert(assessment)?;

        seller.transition(
            SubContractorEvent::StartAssessment,
            &principal.id,
            now,
            Some(format!("assessment {}", assessment.id)),
        )?;
        seller.assessment_id = Some(assessment.id.clone());
        seller.risk_category = Some(assessment.risk_category);
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        self.sla.progress_quietly(&stored.id);
        info!(
            sub_contractor = %stored.id,
            assessment = %assessment.id,
            score = assessment.risk_score,
            "risk assessment opened"
        );
        Ok(assessment)
    }

    /// Applies checklist updates by key. Unknown keys reject the whole update.
    pub fn update_checklist(
        &self,
        principal: &Principal,
        assessment_id: &str,
        items: &BTreeMap<String, bool>,
    ) -> Result<SellerRiskAssessment, DomainError> {
        principal.require(&[Role::Rmt], "update risk checklists")?;
        if items.is_empty() {
            return Err(DomainError::validation("no checklist items supplied"));
        }
        let mut assessment = self.assessment(assessment_id)?;
        let mut checklist = assessment.checklist;
        for (key, verified) in items {
            let item = key
                .parse::<ChecklistItem>()
                .map_err(|err| DomainError::validation(err.to_string()))?;
            checklist.set(item, *verified);
        }
        assessment.record_checklist(checklist, &principal.id, self.ctx.now())?;
        let stored = self.ctx.stores.assessments.update(assessment)?;

        let mut seller = self.sub_contractor(&stored.sub_contractor_id)?;
        if seller.risk_category != Some(stored.risk_category) {
            seller.risk_category = Some(stored.risk_category);
            seller.updated_at = stored.updated_at;
            self.ctx.stores.sub_contractors.update(seller)?;
        }
        Ok(stored)
    }

    /// Freezes the checklist and files the approval its recommendation calls for.
    pub fn submit_assessment(
        &self,
        principal: &Principal,
        assessment_id: &str,
    ) -> Result<SellerRiskAssessment, DomainError> {
        principal.require(&[Role::Rmt], "submit risk assessments")?;
        let mut assessment = self.assessment(assessment_id)?;
        assessment
            .lifecycle
            .check(AssessmentEvent::Submit)
            .map_err(|rejected| rejected.conflict("seller_risk_assessment", &assessment.id))?;

        let request_type = match assessment.recommendation {
            Recommendation::Reject => RequestType::SellerRejection,
            Recommendation::Proceed | Recommendation::Review => RequestType::SellerRiskApproval,
        };
        let approval = self.approvals.raise(
            principal,
            NewApproval {
                request_type,
                subject_kind: SubjectKind::Assessment,
                subject_id: assessment.id.clone(),
                reason: format!(
                    "risk score {} ({})",
                    assessment.risk_score, assessment.risk_category
                ),
                amount: None,
                risk_category: Some(assessment.risk_category),
            },
        )?;

        let now = self.ctx.now();
        assessment.transition(
            AssessmentEvent::Submit,
            &principal.id,
            now,
            Some(format!("approval {}", approval.id)),
        )?;
        assessment.approval_id = Some(approval.id);
        Ok(self.ctx.stores.assessments.update(assessment)?)
    }

    /// Reactivates a dormant seller after the blacklist gate.
    pub fn reactivate(&self, principal: &Principal, id: &str) -> Result<SubContractor, DomainError> {
        principal.require(&[Role::Ops, Role::OpsManager, Role::System], "reactivate sellers")?;
        let mut seller = self.sub_contractor(id)?;
        self.gate(&seller.identity)?;
        let now = self.ctx.now();
        seller.transition(SubContractorEvent::Reactivate, &principal.id, now, None)?;
        seller.last_activity_date = now;
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        info!(sub_contractor = %stored.id, "seller reactivated");
        Ok(stored)
    }

    pub fn register_company(
        &self,
        principal: &Principal,
        request: NewCompany,
    ) -> Result<Company, DomainError> {
        principal.require(&LEAD_OWNERS, "onboard companies")?;
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("company name is required"));
        }
        let identity = Identity::new(
            request.pan.as_deref(),
            request.gstin.as_deref(),
            request.email.as_deref(),
        );
        self.gate(&identity)?;
        let now = self.ctx.now();
        let company = Company {
            id: next_id("co"),
            name: request.name.trim().to_string(),
            identity,
            geography: request.geography,
            sector: request.sector,
            lifecycle: Lifecycle::new(CompanyStatus::Active, &principal.id, now, None),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let stored = self.ctx.stores.companies.insert(company)?;
        info!(company = %stored.id, "company onboarded");
        Ok(stored)
    }

    pub fn company(&self, id: &str) -> Result<Company, DomainError> {
        require(self.ctx.stores.companies.as_ref(), id)
    }

    pub fn set_company_suspended(
        &self,
        principal: &Principal,
        id: &str,
        suspended: bool,
        notes: Option<String>,
    ) -> Result<Company, DomainError> {
        principal.require(&[Role::OpsManager], "suspend or reinstate companies")?;
        let mut company = self.company(id)?;
        let event = if suspended {
            CompanyEvent::Suspend
        } else {
            self.gate(&company.identity)?;
            CompanyEvent::Reinstate
        };
        company.transition(event, &principal.id, self.ctx.now(), notes)?;
        Ok(self.ctx.stores.companies.update(company)?)
    }

    pub fn register_agent(&self, principal: &Principal, request: NewAgent) -> Result<Agent, DomainError> {
        principal.require(&[Role::Ops, Role::OpsManager], "register agents")?;
        if request.name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(DomainError::validation("agent name and email are required"));
        }
        let now = self.ctx.now();
        let agent = Agent {
            id: next_id("agent"),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            lifecycle: Lifecycle::new(AgentStatus::Active, &principal.id, now, None),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        Ok(self.ctx.stores.agents.insert(agent)?)
    }

    pub fn report_misconduct(
        &self,
        principal: &Principal,
        agent_id: &str,
        reason: &str,
    ) -> Result<ApprovalRequest, DomainError> {
        require::<Agent>(self.ctx.stores.agents.as_ref(), agent_id)?;
        self.approvals.raise(
            principal,
            NewApproval {
                request_type: RequestType::AgentMisconduct,
                subject_kind: SubjectKind::Agent,
                subject_id: agent_id.to_string(),
                reason: reason.to_string(),
                amount: None,
                risk_category: None,
            },
        )
    }

    pub fn check_blacklist(&self, identity: &Identity) -> Result<BlacklistCheck, DomainError> {
        let found = blacklist::find_active_match(self.ctx.stores.blacklist.as_ref(), identity)?;
        Ok(match found {
            Some((entry, matched_on)) => BlacklistCheck {
                blacklisted: true,
                entry: Some(entry),
                matched_on: Some(matched_on),
            },
            None => BlacklistCheck {
                blacklisted: false,
                entry: None,
                matched_on: None,
            },
        })
    }

    /// Files a pending entry and the approval that would activate it.
    pub fn report_blacklist(
        &self,
        principal: &Principal,
        report: BlacklistReport,
    ) -> Result<BlacklistEntry, DomainError> {
        principal.require(&REPORTERS, "report blacklist entries")?;
        if report.reason.trim().is_empty() {
            return Err(DomainError::validation("blacklist reason is required"));
        }
        let mut identity = Identity::new(
            report.pan.as_deref(),
            report.gstin.as_deref(),
            report.email.as_deref(),
        );
        if let Some(subject) = report.subject.as_ref() {
            let listed = match subject.party {
                ListedParty::SubContractor => self.sub_contractor(&subject.id)?.identity,
                ListedParty::Company => self.company(&subject.id)?.identity,
            };
            identity = Identity {
                pan: identity.pan.or(listed.pan),
                gstin: identity.gstin.or(listed.gstin),
                email: identity.email.or(listed.email),
            };
        }
        if identity.is_empty() {
            return Err(DomainError::validation(
                "a blacklist entry needs a pan, gstin, email or subject",
            ));
        }

        let now = self.ctx.now();
        let entry = BlacklistEntry {
            id: next_id("bl"),
            identity,
            reason: report.reason.trim().to_string(),
            reported_by: principal.id.clone(),
            subject: report.subject,
            approval_id: None,
            lifecycle: Lifecycle::new(BlacklistStatus::PendingApproval, &principal.id, now, None),
            revocation: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let mut entry = self.ctx.stores.blacklist.insert(entry)?;
        let approval = self.approvals.raise(
            principal,
            NewApproval {
                request_type: RequestType::BlacklistEntry,
                subject_kind: SubjectKind::BlacklistEntry,
                subject_id: entry.id.clone(),
                reason: entry.reason.clone(),
                amount: None,
                risk_category: None,
            },
        )?;
        entry.approval_id = Some(approval.id);
        let stored = self.ctx.stores.blacklist.update(entry)?;
        info!(entry = %stored.id, "blacklist entry reported");
        Ok(stored)
    }

    fn blacklist_approval(&self, entry_id: &str) -> Result<(BlacklistEntry, String), DomainError> {
        let entry = require::<BlacklistEntry>(self.ctx.stores.blacklist.as_ref(), entry_id)?;
        let approval_id = match entry.approval_id.clone() {
            Some(id) => id,
            None => self
                .approvals
                .open_for(RequestType::BlacklistEntry, entry_id)?
                .map(|request| request.id)
                .ok_or_else(|| {
                    DomainError::validation(format!("blacklist entry {entry_id} has no approval"))
                })?,
        };
        Ok((entry, approval_id))
    }

    pub fn approve_blacklist(
        &self,
        principal: &Principal,
        entry_id: &str,
        comments: Option<String>,
    ) -> Result<BlacklistEntry, DomainError> {
        let (_, approval_id) = self.blacklist_approval(entry_id)?;
        self.approvals.approve(principal, &approval_id, comments)?;
        require(self.ctx.stores.blacklist.as_ref(), entry_id)
    }

    pub fn reject_blacklist(
        &self,
        principal: &Principal,
        entry_id: &str,
        comments: Option<String>,
    ) -> Result<BlacklistEntry, DomainError> {
        let (_, approval_id) = self.blacklist_approval(entry_id)?;
        self.approvals.reject(principal, &approval_id, comments)?;
        require(self.ctx.stores.blacklist.as_ref(), entry_id)
    }

    /// One-way, audited removal of an active entry. Listed parties keep their status.
    pub fn revoke_blacklist(
        &self,
        principal: &Principal,
        entry_id: &str,
        reason: &str,
    ) -> Result<BlacklistEntry, DomainError> {
        principal.require(&[Role::OpsManager], "revoke blacklist entries")?;
        let mut entry = require::<BlacklistEntry>(self.ctx.stores.blacklist.as_ref(), entry_id)?;
        entry.revoke(&principal.id, self.ctx.now(), reason)?;
        let stored = self.ctx.stores.blacklist.update(entry)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("blacklist_revoked", &stored.reported_by, &stored.id)
                .with("reason", reason),
        );
        info!(entry = %stored.id, "blacklist entry revoked");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::approvals::ApprovalStatus;
    use crate::workflows::onboarding::AssessmentStatus;
    use crate::workflows::tests::{fixture, principal, sample_lead};

    #[test]
    fn lead_walks_through_kyc_into_assessment() {
        let fx = fixture();
        let sales = principal("sales-1", Role::Sales);
        let seller = fx
            .onboarding
            .create_lead(&sales, sample_lead("Acme Fabricators", "AAACA1111A"))
            .expect("lead");
        fx.onboarding.submit_profile(&sales, &seller.id).expect("profile");
        fx.onboarding
            .verify_kyc(&principal("ops-1", Role::Ops), &seller.id)
            .expect("kyc");

        let assessment = fx
            .onboarding
            .start_assessment(&principal("rmt-1", Role::Rmt), &seller.id, None)
            .expect("assessment");
        assert_eq!(assessment.risk_score, 0);
        assert_eq!(assessment.status(), AssessmentStatus::AwaitingFounder);

        let seller = fx.onboarding.sub_contractor(&seller.id).expect("seller");
        assert_eq!(seller.status(), SubContractorStatus::UnderRiskAssessment);
        assert_eq!(seller.assessment_id.as_deref(), Some(assessment.id.as_str()));
        assert_eq!(
            seller.lifecycle.history().last().map(|entry| entry.status),
            Some(seller.status())
        );
    }

    #[test]
    fn unknown_checklist_key_is_rejected_without_changes() {
        let fx = fixture();
        let (_, assessment) = fx.assessed_seller("Birla Works", "AAACB2222B");
        let mut items = BTreeMap::new();
        items.insert("gstin_verified".to_string(), true);
        items.insert("credit_bureau".to_string(), true);
        let err = fx
            .onboarding
            .update_checklist(&principal("rmt-1", Role::Rmt), &assessment.id, &items)
            .expect_err("unknown key");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(
            fx.onboarding.assessment(&assessment.id).expect("assessment").checklist,
            RiskChecklist::default()
        );
    }

    #[test]
    fn approved_assessment_activates_the_seller() {
        let fx = fixture();
        let (seller, assessment) = fx.assessed_seller("Crest Infra", "AAACC3333C");
        let rmt = principal("rmt-1", Role::Rmt);
        let all: BTreeMap<String, bool> = ChecklistItem::ALL
            .into_iter()
            .map(|item| (item.key().to_string(), true))
            .collect();
        fx.onboarding
            .update_checklist(&rmt, &assessment.id, &all)
            .expect("checklist");
        let submitted = fx
            .onboarding
            .submit_assessment(&rmt, &assessment.id)
            .expect("submit");
        assert_eq!(submitted.status(), AssessmentStatus::UnderApproval);

        let approval_id = submitted.approval_id.expect("approval raised");
        let approval = fx
            .approvals
            .approve(&principal("om-1", Role::OpsManager), &approval_id, None)
            .expect("approve");
        assert_eq!(approval.status(), ApprovalStatus::Approved);

        let seller = fx.onboarding.sub_contractor(&seller.id).expect("seller");
        assert_eq!(seller.status(), SubContractorStatus::Active);
        assert_eq!(
            fx.onboarding.assessment(&assessment.id).expect("assessment").status(),
            AssessmentStatus::Approved
        );
    }

    #[test]
    fn rejection_puts_the_seller_in_cooling_period() {
        let fx = fixture();
        let (seller, assessment) = fx.assessed_seller("Delta Civil", "AAACD4444D");
        let rmt = principal("rmt-1", Role::Rmt);
        let submitted = fx
            .onboarding
            .submit_assessment(&rmt, &assessment.id)
            .expect("submit");
        let approval = fx
            .approvals
            .get(submitted.approval_id.as_deref().expect("approval"))
            .expect("approval");
        assert_eq!(approval.request_type, RequestType::SellerRejection);

        fx.approvals
            .approve(&principal("om-1", Role::OpsManager), &approval.id, None)
            .expect("approve rejection");
        let seller = fx.onboarding.sub_contractor(&seller.id).expect("seller");
        assert_eq!(seller.status(), SubContractorStatus::CoolingPeriod);
        let window = seller.cooling_period.expect("window");
        assert!(window.ends_at > window.starts_at + chrono::Duration::days(180));
    }

    #[test]
    fn blacklisted_identity_cannot_be_assessed_or_activated() {
        let fx = fixture();
        let (seller, _) = fx.assessed_seller("Echo Power", "AAACE5555E");
        let ops = principal("ops-1", Role::Ops);
        let entry = fx
            .onboarding
            .report_blacklist(
                &ops,
                BlacklistReport {
                    pan: Some("aaace5555e".to_string()),
                    gstin: None,
                    email: None,
                    reason: "duplicate invoices".to_string(),
                    subject: None,
                },
            )
            .expect("report");
        assert_eq!(entry.status(), BlacklistStatus::PendingApproval);

        let entry = fx
            .onboarding
            .approve_blacklist(&principal("om-1", Role::OpsManager), &entry.id, None)
            .expect("approve");
        assert_eq!(entry.status(), BlacklistStatus::Active);
        let seller = fx.onboarding.sub_contractor(&seller.id).expect("seller");
        assert_eq!(seller.status(), SubContractorStatus::Blacklisted);

        let err = fx
            .onboarding
            .create_lead(&principal("sales-1", Role::Sales), sample_lead("Echo Again", "AAACE5555E"))
            .expect_err("gate");
        assert!(matches!(err, DomainError::Blacklisted { matched_on: "pan", .. }));
    }
}
