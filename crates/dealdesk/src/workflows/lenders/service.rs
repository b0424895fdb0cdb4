use serde::Deserialize;
use tracing::{info, warn};

use super::domain::{LenderMetrics, LendingPreferences, Nbfc, NbfcEvent, NbfcStatus};
use super::matching::{self, DealProfile, MatchCandidate};
use crate::workflows::common::{next_id, Principal, Role};
use crate::workflows::context::Context;
use crate::workflows::deals::{Case, CaseEvent, CaseStatus, NbfcShare, Sanction, ShareResponse};
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::onboarding::SubContractor;
use crate::workflows::ports::{dispatch, Notice};
use crate::workflows::store::require;

const DESK: [Role; 2] = [Role::Ops, Role::OpsManager];

#[derive(Debug, Clone, Deserialize)]
pub struct NewNbfc {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub preferences: LendingPreferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LenderDecision {
    Approve,
    Decline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NbfcResponse {
    /// Required when staff record a response on a lender's behalf.
    #[serde(default)]
    pub nbfc_id: Option<String>,
    pub decision: LenderDecision,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Lender registry, matching, and the case-sharing round.
pub struct LenderService {
    ctx: Context,
}

impl LenderService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn nbfc(&self, id: &str) -> Result<Nbfc, DomainError> {
        require(self.ctx.stores.nbfcs.as_ref(), id)
    }

    pub fn nbfcs(&self) -> Result<Vec<Nbfc>, DomainError> {
        Ok(self.ctx.stores.nbfcs.list()?)
    }

    pub fn register(&self, principal: &Principal, request: NewNbfc) -> Result<Nbfc, DomainError> {
        principal.require(&[Role::OpsManager], "register lenders")?;
        if request.name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(DomainError::validation("lender name and email are required"));
        }
        request.preferences.validate()?;
        let now = self.ctx.now();
        let metrics = LenderMetrics::default();
        let mut nbfc = Nbfc {
            id: next_id("nbfc"),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            preferences: request.preferences.normalized(),
            metrics,
            preference_score: 0.0,
            lifecycle: Lifecycle::new(NbfcStatus::Active, &principal.id, now, None),
            created_by: principal.id.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        nbfc.refresh_preference_score();
        let stored = self.ctx.stores.nbfcs.insert(nbfc)?;
        info!(nbfc = %stored.id, "lender registered");
        Ok(stored)
    }

    /// Replaces the preference sheet. Lenders may edit their own.
    pub fn update_preferences(
        &self,
        principal: &Principal,
        id: &str,
        preferences: LendingPreferences,
    ) -> Result<Nbfc, DomainError> {
        if !(principal.role == Role::Nbfc && principal.id == id) {
            principal.require(&[Role::OpsManager], "edit lender preferences")?;
        }
        preferences.validate()?;
        let mut nbfc = self.nbfc(id)?;
        nbfc.preferences = preferences.normalized();
        nbfc.updated_at = self.ctx.now();
        Ok(self.ctx.stores.nbfcs.update(nbfc)?)
    }

    pub fn set_active(
        &self,
        principal: &Principal,
        id: &str,
        active: bool,
    ) -> Result<Nbfc, DomainError> {
        principal.require(&[Role::OpsManager], "activate or deactivate lenders")?;
        let mut nbfc = self.nbfc(id)?;
        let event = if active {
            NbfcEvent::Activate
        } else {
            NbfcEvent::Deactivate
        };
        nbfc.transition(event, &principal.id, self.ctx.now(), None)?;
        Ok(self.ctx.stores.nbfcs.update(nbfc)?)
    }

    fn deal_profile(&self, case: &Case) -> Result<DealProfile, DomainError> {
        let risk_category = case.risk_category.ok_or_else(|| {
            DomainError::validation(format!("case {} has no risk category", case.id))
        })?;
        let seller = require::<SubContractor>(
            self.ctx.stores.sub_contractors.as_ref(),
            &case.sub_contractor_id,
        )?;
        Ok(DealProfile {
            amount: case.deal_amount(),
            risk_category,
            geography: seller.geography,
            sector: seller.sector,
        })
    }

    fn ready_case(&self, case_id: &str) -> Result<Case, DomainError> {
        let case = require::<Case>(self.ctx.stores.cases.as_ref(), case_id)?;
        if !matches!(
            case.status(),
            CaseStatus::CommercialLocked | CaseStatus::SharedWithNbfc
        ) {
            return Err(DomainError::StateConflict {
                entity: "case",
                id: case.id.clone(),
                current: case.status().label(),
                attempted: "match lenders".to_string(),
            });
        }
        Ok(case)
    }

    /// Eligible lenders for a locked case, best first.
    pub fn match_case(
        &self,
        principal: &Principal,
        case_id: &str,
    ) -> Result<Vec<MatchCandidate>, DomainError> {
        principal.require(&[Role::Ops, Role::OpsManager, Role::Rmt], "match lenders")?;
        let case = self.ready_case(case_id)?;
        let deal = self.deal_profile(&case)?;
        let nbfcs = self.nbfcs()?;
        Ok(matching::rank(&nbfcs, &deal))
    }

    /// Offers a locked case to the named lenders, or to every eligible one.
    pub fn share_case(
        &self,
        principal: &Principal,
        case_id: &str,
        nbfc_ids: Option<Vec<String>>,
    ) -> Result<Case, DomainError> {
        principal.require(&DESK, "share cases with lenders")?;
        let mut case = self.ready_case(case_id)?;
        let deal = self.deal_profile(&case)?;
        let targets = match nbfc_ids {
            Some(ids) if !ids.is_empty() => {
                let mut targets = Vec::with_capacity(ids.len());
                for id in ids {
                    let nbfc = self.nbfc(&id)?;
                    if !matching::is_eligible(&nbfc, &deal) {
                        return Err(DomainError::validation(format!(
                            "lender {id} does not cover case {case_id}"
                        )));
                    }
                    targets.push(nbfc);
                }
                targets
            }
            _ => self
                .nbfcs()?
                .into_iter()
                .filter(|nbfc| matching::is_eligible(nbfc, &deal))
                .collect(),
        };
        if targets.is_empty() {
            return Err(DomainError::validation(format!(
                "no eligible lenders for case {case_id}"
            )));
        }

        let now = self.ctx.now();
        let fresh: Vec<Nbfc> = targets
            .into_iter()
            .filter(|nbfc| case.share_for(&nbfc.id).is_none())
            .collect();
        for nbfc in &fresh {
            case.nbfc_shares.push(NbfcShare {
                nbfc_id: nbfc.id.clone(),
                shared_at: now,
                response: ShareResponse::Pending,
                interest_rate: None,
                responded_at: None,
                notes: None,
            });
        }
        if case.status() == CaseStatus::CommercialLocked {
            case.transition(
                CaseEvent::ShareWithNbfc,
                &principal.id,
                now,
                Some(format!("shared with {} lender(s)", fresh.len())),
            )?;
        }
        case.updated_at = now;
        let stored = self.ctx.stores.cases.update(case)?;

        for nbfc in &fresh {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("case_shared", &nbfc.email, &stored.id)
                    .with("amount", stored.deal_amount()),
            );
        }
        info!(case = %stored.id, shared = fresh.len(), "case shared with lenders");
        Ok(stored)
    }

    /// Records a lender's answer. An approval with a rate sanctions the case.
    pub fn respond(
        &self,
        principal: &Principal,
        case_id: &str,
        response: NbfcResponse,
    ) -> Result<Case, DomainError> {
        let nbfc_id = if principal.role == Role::Nbfc {
            principal.id.clone()
        } else {
            principal.require(&DESK, "record lender responses")?;
            response
                .nbfc_id
                .clone()
                .ok_or_else(|| DomainError::validation("nbfc_id is required"))?
        };
        let mut case = require::<Case>(self.ctx.stores.cases.as_ref(), case_id)?;
        let approved = response.decision == LenderDecision::Approve;
        let rate = match (approved, response.interest_rate) {
            (true, Some(rate)) if rate.is_finite() && rate > 0.0 => Some(rate),
            (true, _) => {
                return Err(DomainError::validation(
                    "an approval needs a positive interest_rate",
                ))
            }
            (false, _) => None,
        };
        if approved {
            case.ensure(CaseEvent::Sanction)?;
        } else if case.status() != CaseStatus::SharedWithNbfc {
            return Err(DomainError::StateConflict {
                entity: "case",
                id: case.id.clone(),
                current: case.status().label(),
                attempted: "lender response".to_string(),
            });
        }

        let now = self.ctx.now();
        let share = case
            .nbfc_shares
            .iter_mut()
            .find(|share| share.nbfc_id == nbfc_id)
            .ok_or_else(|| {
                DomainError::validation(format!("case {case_id} was not shared with {nbfc_id}"))
            })?;
        if share.response != ShareResponse::Pending {
            return Err(DomainError::validation(format!(
                "lender {nbfc_id} already responded on case {case_id}"
            )));
        }
        share.response = if approved {
            ShareResponse::Approved
        } else {
            ShareResponse::Declined
        };
        share.interest_rate = rate;
        share.responded_at = Some(now);
        share.notes = response.notes.clone();
        let processing_days = (now - share.shared_at).num_hours() as f64 / 24.0;

        if let Some(interest_rate) = rate {
            case.sanction = Some(Sanction {
                nbfc_id: nbfc_id.clone(),
                interest_rate,
                sanctioned_at: now,
            });
            case.transition(
                CaseEvent::Sanction,
                &principal.id,
                now,
                Some(format!("sanctioned by {nbfc_id} at {interest_rate}%")),
            )?;
        }
        case.updated_at = now;
        let stored = self.ctx.stores.cases.update(case)?;

        if let Err(err) = self.record_response(&nbfc_id, approved, processing_days) {
            warn!(nbfc = %nbfc_id, error = %err, "lender metrics not updated");
        }
        if approved {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("case_sanctioned", &stored.sub_contractor_id, &stored.id)
                    .with("nbfc", &nbfc_id),
            );
        }
        info!(case = %stored.id, nbfc = %nbfc_id, approved, "lender responded");
        Ok(stored)
    }

    fn record_response(
        &self,
        nbfc_id: &str,
        approved: bool,
        processing_days: f64,
    ) -> Result<Nbfc, DomainError> {
        let mut nbfc = self.nbfc(nbfc_id)?;
        nbfc.metrics.record_response(approved, processing_days);
        nbfc.updated_at = self.ctx.now();
        Ok(self.ctx.stores.nbfcs.update(nbfc)?)
    }

    /// Rolls a settled deal into the lender's metrics and refreshes its preference score.
    pub fn record_closed_deal(
        &self,
        nbfc_id: &str,
        amount: f64,
        interest_rate: f64,
    ) -> Result<Nbfc, DomainError> {
        let mut nbfc = self.nbfc(nbfc_id)?;
        nbfc.metrics.record_closed_deal(amount, interest_rate);
        nbfc.refresh_preference_score();
        nbfc.updated_at = self.ctx.now();
        let stored = self.ctx.stores.nbfcs.update(nbfc)?;
        info!(
            nbfc = %stored.id,
            preference_score = stored.preference_score,
            "lender metrics refreshed"
        );
        Ok(stored)
    }
}
