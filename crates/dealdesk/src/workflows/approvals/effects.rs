//! What a terminal approval decision does to the records it gates. Every step checks the target
//! status first so a decision can be replayed after a failed write without double-applying.

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{ApprovalRequest, RequestType};
use crate::workflows::context::Context;
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::StateMachine;
use crate::workflows::onboarding::{
    blacklist, AgentStatus, AssessmentEvent, AssessmentStatus, BlacklistEntry, BlacklistEvent,
    BlacklistStatus, CompanyEvent, CompanyStatus, ListedParty, SubContractorEvent,
    SubContractorStatus,
};
use crate::workflows::ports::{dispatch, Notice};
use crate::workflows::sla::SlaService;
use crate::workflows::store::require;

pub(crate) struct Effects<'a> {
    pub ctx: &'a Context,
    pub sla: &'a SlaService,
}

impl Effects<'_> {
    pub fn on_approved(
        &self,
        request: &ApprovalRequest,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let subject = request.subject.id.as_str();
        match request.request_type {
            RequestType::BlacklistEntry => self.activate_blacklist_entry(subject, by, at),
            RequestType::SellerRiskApproval => self.approve_seller(subject, by, at),
            RequestType::SellerRejection => self.reject_seller(subject, by, at),
            RequestType::AgentMisconduct => self.suspend_agent(subject, by, at, &request.reason),
            RequestType::CoolingPeriodOverride => self.lift_cooling_period(subject, by, at),
            RequestType::DealAbove1Cr
            | RequestType::HighRiskCase
            | RequestType::StrategicException => Ok(()),
        }
    }

    pub fn on_rejected(
        &self,
        request: &ApprovalRequest,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let subject = request.subject.id.as_str();
        match request.request_type {
            RequestType::BlacklistEntry => self.reject_blacklist_entry(subject, by, at),
            RequestType::SellerRiskApproval => self.reject_seller(subject, by, at),
            RequestType::SellerRejection => self.reopen_assessment(subject, by, at),
            _ => Ok(()),
        }
    }

    fn activate_blacklist_entry(
        &self,
        entry_id: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut entry = require::<BlacklistEntry>(stores.blacklist.as_ref(), entry_id)?;
        if entry.status() == BlacklistStatus::PendingApproval {
            entry.transition(BlacklistEvent::Approve, by, at, None)?;
            entry = stores.blacklist.update(entry)?;
        }
        if entry.status() != BlacklistStatus::Active {
            return Err(DomainError::StateConflict {
                entity: "blacklist_entry",
                id: entry.id.clone(),
                current: entry.status().label(),
                attempted: "Approve".to_string(),
            });
        }

        let notes = Some(format!("blacklist entry {}", entry.id));
        let linked = |party: ListedParty, id: &str| {
            entry
                .subject
                .as_ref()
                .is_some_and(|subject| subject.party == party && subject.id == id)
        };

        for mut seller in stores.sub_contractors.list()? {
            let listed = linked(ListedParty::SubContractor, &seller.id)
                || seller.identity.overlap(&entry.identity).is_some();
            if listed && seller.status() != SubContractorStatus::Blacklisted {
                seller.transition(SubContractorEvent::Blacklist, by, at, notes.clone())?;
                let seller = stores.sub_contractors.update(seller)?;
                self.sla.close_quietly(&seller.id);
                info!(sub_contractor = %seller.id, entry = %entry.id, "seller blacklisted");
            }
        }

        for mut company in stores.companies.list()? {
            let listed = linked(ListedParty::Company, &company.id)
                || company.identity.overlap(&entry.identity).is_some();
            if listed && company.status() != CompanyStatus::Blacklisted {
                company.transition(CompanyEvent::Blacklist, by, at, notes.clone())?;
                let company = stores.companies.update(company)?;
                info!(company = %company.id, entry = %entry.id, "company blacklisted");
            }
        }
        Ok(())
    }

    fn reject_blacklist_entry(
        &self,
        entry_id: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut entry = require::<BlacklistEntry>(stores.blacklist.as_ref(), entry_id)?;
        if entry.status() != BlacklistStatus::Rejected {
            entry.transition(BlacklistEvent::Reject, by, at, None)?;
            stores.blacklist.update(entry)?;
        }
        Ok(())
    }

    fn approve_seller(
        &self,
        assessment_id: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut assessment = require(stores.assessments.as_ref(), assessment_id)?;
        let mut seller = require(stores.sub_contractors.as_ref(), &assessment.sub_contractor_id)?;

        if seller.status() != SubContractorStatus::Active {
            blacklist::ensure_clear(stores.blacklist.as_ref(), &seller.identity)?;
            seller
                .lifecycle
                .check(SubContractorEvent::Activate)
                .map_err(|rejected| rejected.conflict("sub_contractor", &seller.id))?;
        }

        if assessment.status() != AssessmentStatus::Approved {
            assessment.transition(AssessmentEvent::Approve, by, at, None)?;
            assessment = stores.assessments.update(assessment)?;
        }

        if seller.status() != SubContractorStatus::Active {
            seller.transition(
                SubContractorEvent::Activate,
                by,
                at,
                Some(format!("risk assessment {} approved", assessment.id)),
            )?;
            seller.risk_category = Some(assessment.risk_category);
            seller.last_activity_date = at;
            let seller = stores.sub_contractors.update(seller)?;
            self.sla.close_quietly(&seller.id);
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("seller_activated", &seller.id, &seller.id)
                    .with("risk_category", assessment.risk_category),
            );
            info!(sub_contractor = %seller.id, "seller activated");
        }
        Ok(())
    }

    /// Assessment rejected and the seller parked for six months.
    fn reject_seller(
        &self,
        assessment_id: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut assessment = require(stores.assessments.as_ref(), assessment_id)?;
        if assessment.status() != AssessmentStatus::Rejected {
            assessment.transition(AssessmentEvent::Reject, by, at, None)?;
            assessment = stores.assessments.update(assessment)?;
        }

        let mut seller = require(stores.sub_contractors.as_ref(), &assessment.sub_contractor_id)?;
        if seller.status() != SubContractorStatus::CoolingPeriod {
            seller.start_cooling(by, at)?;
            let seller = stores.sub_contractors.update(seller)?;
            self.sla.close_quietly(&seller.id);
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("seller_rejected", &seller.id, &seller.id).with(
                    "cooling_period_ends",
                    seller
                        .cooling_period
                        .map(|window| window.ends_at.to_rfc3339())
                        .unwrap_or_default(),
                ),
            );
            info!(sub_contractor = %seller.id, "seller entered cooling period");
        }
        Ok(())
    }

    fn reopen_assessment(
        &self,
        assessment_id: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut assessment = require(stores.assessments.as_ref(), assessment_id)?;
        if assessment.status() == AssessmentStatus::UnderApproval {
            let category = assessment.risk_category;
            assessment.transition(
                AssessmentEvent::Reopen(category),
                by,
                at,
                Some("rejection overruled".to_string()),
            )?;
            assessment.approval_id = None;
            stores.assessments.update(assessment)?;
        }
        Ok(())
    }

    fn suspend_agent(
        &self,
        agent_id: &str,
        by: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut agent = require(stores.agents.as_ref(), agent_id)?;
        if agent.lifecycle.status() != AgentStatus::Suspended {
            agent.suspend(by, at, Some(reason.to_string()))?;
            stores.agents.update(agent)?;
        }
        Ok(())
    }

    fn lift_cooling_period(
        &self,
        sub_contractor_id: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stores = &self.ctx.stores;
        let mut seller = require(stores.sub_contractors.as_ref(), sub_contractor_id)?;
        if seller.status() == SubContractorStatus::CoolingPeriod {
            seller.end_cooling(by, at, Some("cooling period override".to_string()))?;
            stores.sub_contractors.update(seller)?;
        }
        Ok(())
    }
}
