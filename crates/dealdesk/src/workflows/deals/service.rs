use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::bid::{Bid, BidEvent, BidStatus, Terms};
use super::bill::{Bill, BillEvent, BillStatus, CwcEvent, CwcRequest, CwcStatus};
use super::case::{Case, CaseEvent, CaseStatus, CommercialSnapshot};
use super::transaction::{OverdueCheck, Transaction};
use crate::workflows::approvals::{ApprovalService, NewApproval, RequestType, SubjectKind};
use crate::workflows::common::{next_id, Principal, Role};
use crate::workflows::context::Context;
use crate::workflows::error::DomainError;
use crate::workflows::lenders::LenderService;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::onboarding::{
    blacklist, Company, CompanyStatus, RiskCategory, SubContractor, SubContractorStatus,
};
use crate::workflows::policy::HIGH_VALUE_DEAL_THRESHOLD;
use crate::workflows::ports::{dispatch, Notice};
use crate::workflows::sla::{SlaService, SlaSubjectKind};
use crate::workflows::store::require;

const DESK: [Role; 2] = [Role::Ops, Role::OpsManager];
const OPS_RECIPIENT: &str = "ops";

#[derive(Debug, Clone, Deserialize)]
pub struct NewBill {
    pub sub_contractor_id: String,
    pub company_id: String,
    pub invoice_number: String,
    pub amount: f64,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCwc {
    pub bill_id: String,
    pub amount: f64,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBid {
    pub case_id: String,
    pub amount: f64,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterOffer {
    pub amount: f64,
    pub duration_days: u32,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStep {
    Initiate,
    Complete,
    Fail,
}

/// The deal pipeline from bill upload to settlement or default.
pub struct DealService {
    ctx: Context,
    approvals: Arc<ApprovalService>,
    sla: Arc<SlaService>,
    lenders: Arc<LenderService>,
}

impl DealService {
    pub fn new(
        ctx: Context,
        approvals: Arc<ApprovalService>,
        sla: Arc<SlaService>,
        lenders: Arc<LenderService>,
    ) -> Self {
        Self {
            ctx,
            approvals,
            sla,
            lenders,
        }
    }

    fn seller(&self, id: &str) -> Result<SubContractor, DomainError> {
        require(self.ctx.stores.sub_contractors.as_ref(), id)
    }

    /// The seller must be active and clear of the blacklist to move money.
    fn active_seller(&self, id: &str) -> Result<SubContractor, DomainError> {
        let seller = self.seller(id)?;
        blacklist::ensure_clear(self.ctx.stores.blacklist.as_ref(), &seller.identity)?;
        if seller.status() != SubContractorStatus::Active {
            return Err(DomainError::validation(format!(
                "seller {id} is {}, not ACTIVE",
                seller.status().label()
            )));
        }
        Ok(seller)
    }

    fn active_company(&self, id: &str) -> Result<Company, DomainError> {
        let company = require::<Company>(self.ctx.stores.companies.as_ref(), id)?;
        blacklist::ensure_clear(self.ctx.stores.blacklist.as_ref(), &company.identity)?;
        if company.status() != CompanyStatus::Active {
            return Err(DomainError::validation(format!(
                "company {id} is {}, not ACTIVE",
                company.status().label()
            )));
        }
        Ok(company)
    }

    /// Activity stamp for the dormancy sweep. Never fails the calling operation.
    fn touch_seller(&self, id: &str) {
        let result = self.seller(id).and_then(|mut seller| {
            seller.last_activity_date = self.ctx.now();
            Ok(self.ctx.stores.sub_contractors.update(seller)?)
        });
        if let Err(err) = result {
            warn!(sub_contractor = %id, error = %err, "seller activity not recorded");
        }
    }

    fn acts_for_seller(principal: &Principal, seller_id: &str) -> bool {
        principal.role == Role::SubContractor && principal.id == seller_id
    }

    fn acts_for_company(principal: &Principal, company_id: &str) -> bool {
        principal.role == Role::Epc && principal.id == company_id
    }

    pub fn bill(&self, id: &str) -> Result<Bill, DomainError> {
        require(self.ctx.stores.bills.as_ref(), id)
    }

    pub fn bills(&self) -> Result<Vec<Bill>, DomainError> {
        Ok(self.ctx.stores.bills.list()?)
    }

    /// Stores the invoice document, then the bill. A failed record write removes the document.
    pub fn upload_bill(
        &self,
        principal: &Principal,
        request: NewBill,
        content: &[u8],
        mime: &mime::Mime,
    ) -> Result<Bill, DomainError> {
        if !Self::acts_for_seller(principal, &request.sub_contractor_id) {
            principal.require(&[Role::Sales, Role::Ops, Role::OpsManager], "upload bills")?;
        }
        if request.invoice_number.trim().is_empty() {
            return Err(DomainError::validation("invoice number is required"));
        }
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(DomainError::validation("bill amount must be positive"));
        }
        self.active_seller(&request.sub_contractor_id)?;
        self.active_company(&request.company_id)?;

        let document = self.ctx.storage.upload(content, mime)?;
        let now = self.ctx.now();
        let bill = Bill {
            id: next_id("bill"),
            sub_contractor_id: request.sub_contractor_id,
            company_id: request.company_id,
            invoice_number: request.invoice_number.trim().to_string(),
            amount: request.amount,
            due_date: request.due_date,
            document,
            lifecycle: Lifecycle::new(BillStatus::Uploaded, &principal.id, now, None),
            uploaded_by: principal.id.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let public_id = bill.document.public_id.clone();
        let stored = match self.ctx.stores.bills.insert(bill) {
            Ok(stored) => stored,
            Err(err) => {
                if let Err(cleanup) = self.ctx.storage.delete(&public_id) {
                    warn!(document = %public_id, error = %cleanup, "orphaned bill document");
                }
                return Err(err.into());
            }
        };
        self.sla.open(SlaSubjectKind::Bill, &stored.id, OPS_RECIPIENT)?;
        self.touch_seller(&stored.sub_contractor_id);
        info!(bill = %stored.id, amount = stored.amount, "bill uploaded");
        Ok(stored)
    }

    pub fn verify_bill(
        &self,
        principal: &Principal,
        id: &str,
        verified: bool,
        notes: Option<String>,
    ) -> Result<Bill, DomainError> {
        principal.require(&DESK, "verify bills")?;
        let mut bill = self.bill(id)?;
        let event = if verified {
            BillEvent::Verify
        } else {
            BillEvent::Reject
        };
        bill.transition(event, &principal.id, self.ctx.now(), notes)?;
        let stored = self.ctx.stores.bills.update(bill)?;
        if verified {
            self.sla.progress_quietly(&stored.id);
        } else {
            self.sla.close_quietly(&stored.id);
        }
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("bill_reviewed", &stored.sub_contractor_id, &stored.id)
                .with("status", stored.status().label()),
        );
        Ok(stored)
    }

    pub fn cwc_request(&self, id: &str) -> Result<CwcRequest, DomainError> {
        require(self.ctx.stores.cwc_requests.as_ref(), id)
    }

    pub fn submit_cwc(&self, principal: &Principal, request: NewCwc) -> Result<CwcRequest, DomainError> {
        let bill = self.bill(&request.bill_id)?;
        if !Self::acts_for_seller(principal, &bill.sub_contractor_id) {
            principal.require(&DESK, "submit CWC requests")?;
        }
        if bill.status() != BillStatus::Verified {
            return Err(DomainError::StateConflict {
                entity: "bill",
                id: bill.id.clone(),
                current: bill.status().label(),
                attempted: "submit CWC request".to_string(),
            });
        }
        Terms {
            amount: request.amount,
            duration_days: request.duration_days,
        }
        .validate()?;
        if request.amount > bill.amount {
            return Err(DomainError::validation(format!(
                "requested {} exceeds bill amount {}",
                request.amount, bill.amount
            )));
        }
        let live = self
            .ctx
            .stores
            .cwc_requests
            .list()?
            .into_iter()
            .find(|cwc| cwc.bill_id == bill.id && cwc.status() != CwcStatus::Rejected);
        if let Some(existing) = live {
            return Err(DomainError::validation(format!(
                "bill {} already has CWC request {}",
                bill.id, existing.id
            )));
        }

        let now = self.ctx.now();
        let cwc = CwcRequest {
            id: next_id("cwc"),
            bill_id: bill.id.clone(),
            sub_contractor_id: bill.sub_contractor_id.clone(),
            company_id: bill.company_id.clone(),
            amount: request.amount,
            duration_days: request.duration_days,
            case_id: None,
            lifecycle: Lifecycle::new(CwcStatus::Submitted, &principal.id, now, None),
            requested_by: principal.id.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let stored = self.ctx.stores.cwc_requests.insert(cwc)?;
        self.sla.close_quietly(&bill.id);
        self.sla.open(SlaSubjectKind::Cwc, &stored.id, OPS_RECIPIENT)?;
        self.touch_seller(&stored.sub_contractor_id);
        info!(cwc = %stored.id, bill = %bill.id, "cwc request submitted");
        Ok(stored)
    }

    pub fn reject_cwc(
        &self,
        principal: &Principal,
        id: &str,
        reason: &str,
    ) -> Result<CwcRequest, DomainError> {
        principal.require(&DESK, "reject CWC requests")?;
        let mut cwc = self.cwc_request(id)?;
        cwc.transition(
            CwcEvent::Reject,
            &principal.id,
            self.ctx.now(),
            Some(reason.to_string()),
        )?;
        let stored = self.ctx.stores.cwc_requests.update(cwc)?;
        self.sla.close_quietly(&stored.id);
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("cwc_rejected", &stored.sub_contractor_id, &stored.id)
                .with("reason", reason),
        );
        Ok(stored)
    }

    pub fn case(&self, id: &str) -> Result<Case, DomainError> {
        require(self.ctx.stores.cases.as_ref(), id)
    }

    /// Cases visible to the caller: parties see their own, staff see all.
    pub fn cases(&self, principal: &Principal) -> Result<Vec<Case>, DomainError> {
        let cases = self.ctx.stores.cases.list()?;
        Ok(match principal.role {
            Role::Epc => cases
                .into_iter()
                .filter(|case| case.company_id == principal.id)
                .collect(),
            Role::SubContractor => cases
                .into_iter()
                .filter(|case| case.sub_contractor_id == principal.id)
                .collect(),
            Role::Nbfc => cases
                .into_iter()
                .filter(|case| case.share_for(&principal.id).is_some())
                .collect(),
            _ => cases,
        })
    }

    fn case_for_cwc(&self, cwc_id: &str) -> Result<Option<Case>, DomainError> {
        Ok(self
            .ctx
            .stores
            .cases
            .list()?
            .into_iter()
            .find(|case| case.cwc_id == cwc_id))
    }

    /// Approves a CWC request into a case. Re-running after a partial failure finishes the
    /// same case instead of creating another.
    pub fn create_case(&self, principal: &Principal, cwc_id: &str) -> Result<Case, DomainError> {
        principal.require(&DESK, "approve CWC requests")?;
        let mut cwc = self.cwc_request(cwc_id)?;
        cwc.lifecycle
            .check(CwcEvent::CreateCase)
            .map_err(|rejected| rejected.conflict("cwc_request", &cwc.id))?;
        let seller = self.active_seller(&cwc.sub_contractor_id)?;
        self.active_company(&cwc.company_id)?;

        let now = self.ctx.now();
        let case = match self.case_for_cwc(&cwc.id)? {
            Some(existing) => existing,
            None => {
                let case = Case {
                    id: next_id("case"),
                    cwc_id: cwc.id.clone(),
                    bill_id: cwc.bill_id.clone(),
                    sub_contractor_id: cwc.sub_contractor_id.clone(),
                    company_id: cwc.company_id.clone(),
                    requested_amount: cwc.amount,
                    requested_duration_days: cwc.duration_days,
                    risk_category: seller.risk_category,
                    bid_id: None,
                    commercial_snapshot: None,
                    nbfc_shares: Vec::new(),
                    sanction: None,
                    transaction_id: None,
                    lifecycle: Lifecycle::new(
                        CaseStatus::ReadyForCompanyReview,
                        &principal.id,
                        now,
                        None,
                    ),
                    created_by: principal.id.clone(),
                    created_at: now,
                    updated_at: now,
                    revision: 0,
                };
                self.ctx.stores.cases.insert(case)?
            }
        };

        cwc.transition(
            CwcEvent::CreateCase,
            &principal.id,
            now,
            Some(format!("case {}", case.id)),
        )?;
        cwc.case_id = Some(case.id.clone());
        self.ctx.stores.cwc_requests.update(cwc)?;

        if case.risk_category == Some(RiskCategory::High) {
            self.raise_gate(RequestType::HighRiskCase, &case, "seller risk category is HIGH")?;
        }
        self.sla.close_quietly(cwc_id);
        self.sla.open(SlaSubjectKind::Case, &case.id, &case.company_id)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("case_ready_for_review", &case.company_id, &case.id)
                .with("amount", case.requested_amount),
        );
        info!(case = %case.id, cwc = %cwc_id, "case created");
        Ok(case)
    }

    fn raise_gate(
        &self,
        request_type: RequestType,
        case: &Case,
        reason: &str,
    ) -> Result<(), DomainError> {
        let approval = self.approvals.raise(
            &Principal::system(),
            NewApproval {
                request_type,
                subject_kind: SubjectKind::Case,
                subject_id: case.id.clone(),
                reason: reason.to_string(),
                amount: Some(case.deal_amount()),
                risk_category: case.risk_category,
            },
        )?;
        info!(case = %case.id, approval = %approval.id, %request_type, "funding gate raised");
        Ok(())
    }

    /// Buyer review. Only the buyer named on the case, only from READY_FOR_COMPANY_REVIEW.
    pub fn review_case(
        &self,
        principal: &Principal,
        id: &str,
        verified: bool,
        notes: Option<String>,
    ) -> Result<Case, DomainError> {
        principal.require_exact(&[Role::Epc], "review cases")?;
        let mut case = self.case(id)?;
        if principal.id != case.company_id {
            return Err(DomainError::Authorization {
                actor: principal.id.clone(),
                role: principal.role,
                required: format!("epc {}", case.company_id),
                action: "review this case".to_string(),
            });
        }
        let event = if verified {
            CaseEvent::EpcVerify
        } else {
            CaseEvent::EpcReject
        };
        case.transition(event, &principal.id, self.ctx.now(), notes)?;
        let stored = self.ctx.stores.cases.update(case)?;
        if verified {
            self.sla.progress_quietly(&stored.id);
        } else {
            self.sla.close_quietly(&stored.id);
        }
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("case_reviewed", &stored.sub_contractor_id, &stored.id)
                .with("status", stored.status().label()),
        );
        info!(case = %stored.id, status = stored.status().label(), "case reviewed by buyer");
        Ok(stored)
    }

    pub fn rmt_review(
        &self,
        principal: &Principal,
        id: &str,
        approved: bool,
        notes: Option<String>,
    ) -> Result<Case, DomainError> {
        principal.require(&[Role::Rmt], "risk-review cases")?;
        let mut case = self.case(id)?;
        let event = if approved {
            CaseEvent::RmtApprove
        } else {
            CaseEvent::RmtReject
        };
        case.transition(event, &principal.id, self.ctx.now(), notes)?;
        let stored = self.ctx.stores.cases.update(case)?;
        if !approved {
            self.sla.close_quietly(&stored.id);
        }
        Ok(stored)
    }

    pub fn bid(&self, id: &str) -> Result<Bid, DomainError> {
        require(self.ctx.stores.bids.as_ref(), id)
    }

    /// Buyer's offer. Requires a verified case and moves it to BID_PLACED.
    pub fn place_bid(&self, principal: &Principal, request: NewBid) -> Result<Bid, DomainError> {
        principal.require_exact(&[Role::Epc], "place bids")?;
        let mut case = self.case(&request.case_id)?;
        if principal.id != case.company_id {
            return Err(DomainError::Authorization {
                actor: principal.id.clone(),
                role: principal.role,
                required: format!("epc {}", case.company_id),
                action: "bid on this case".to_string(),
            });
        }
        case.ensure(CaseEvent::PlaceBid)?;
        let offer = Terms {
            amount: request.amount,
            duration_days: request.duration_days,
        };
        offer.validate()?;

        let now = self.ctx.now();
        let pending = self
            .ctx
            .stores
            .bids
            .list()?
            .into_iter()
            .find(|bid| bid.case_id == case.id && bid.status() == BidStatus::Submitted);
        let bid = match pending {
            Some(existing) if existing.offer == offer => existing,
            Some(existing) => {
                return Err(DomainError::validation(format!(
                    "case {} already has pending bid {}",
                    case.id, existing.id
                )))
            }
            None => self.ctx.stores.bids.insert(Bid {
                id: next_id("bid"),
                case_id: case.id.clone(),
                company_id: case.company_id.clone(),
                sub_contractor_id: case.sub_contractor_id.clone(),
                offer,
                negotiations: Vec::new(),
                locked_terms: None,
                lifecycle: Lifecycle::new(BidStatus::Submitted, &principal.id, now, None),
                placed_by: principal.id.clone(),
                created_at: now,
                updated_at: now,
                revision: 0,
            })?,
        };

        case.transition(
            CaseEvent::PlaceBid,
            &principal.id,
            now,
            Some(format!("bid {}", bid.id)),
        )?;
        case.bid_id = Some(bid.id.clone());
        let case = self.ctx.stores.cases.update(case)?;
        self.sla.progress_quietly(&case.id);
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("bid_placed", &bid.sub_contractor_id, &bid.id)
                .with("amount", bid.offer.amount)
                .with("duration_days", bid.offer.duration_days),
        );
        info!(bid = %bid.id, case = %case.id, "bid placed");
        Ok(bid)
    }

    fn party_to(principal: &Principal, bid: &Bid) -> bool {
        Self::acts_for_company(principal, &bid.company_id)
            || Self::acts_for_seller(principal, &bid.sub_contractor_id)
    }

    /// Counter-offer from buyer or seller; case follows the bid into negotiation.
    pub fn negotiate(
        &self,
        principal: &Principal,
        bid_id: &str,
        offer: CounterOffer,
    ) -> Result<Bid, DomainError> {
        let mut bid = self.bid(bid_id)?;
        if !Self::party_to(principal, &bid) {
            return Err(DomainError::Authorization {
                actor: principal.id.clone(),
                role: principal.role,
                required: "epc | sub_contractor party to the bid".to_string(),
                action: "negotiate".to_string(),
            });
        }
        let now = self.ctx.now();
        bid.counter(
            principal,
            Terms {
                amount: offer.amount,
                duration_days: offer.duration_days,
            },
            offer.note,
            now,
        )?;
        let bid = self.ctx.stores.bids.update(bid)?;

        let mut case = self.case(&bid.case_id)?;
        if case.status() == CaseStatus::BidPlaced {
            case.transition(CaseEvent::Negotiate, &principal.id, now, None)?;
            self.ctx.stores.cases.update(case)?;
        }
        let counterparty = if principal.role == Role::Epc {
            &bid.sub_contractor_id
        } else {
            &bid.company_id
        };
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("counter_offer", counterparty, &bid.id)
                .with("amount", bid.standing_terms().amount)
                .with("round", bid.negotiations.len()),
        );
        Ok(bid)
    }

    pub fn accept_bid(&self, principal: &Principal, bid_id: &str) -> Result<Bid, DomainError> {
        let mut bid = self.bid(bid_id)?;
        if !Self::acts_for_seller(principal, &bid.sub_contractor_id) {
            principal.require(&DESK, "accept bids")?;
        }
        bid.transition(BidEvent::Accept, &principal.id, self.ctx.now(), None)?;
        let stored = self.ctx.stores.bids.update(bid)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("bid_accepted", &stored.company_id, &stored.id),
        );
        Ok(stored)
    }

    /// Seller turns the bid down; the case returns to EPC_VERIFIED for a fresh bid.
    pub fn reject_bid(
        &self,
        principal: &Principal,
        bid_id: &str,
        reason: Option<String>,
    ) -> Result<Bid, DomainError> {
        let mut bid = self.bid(bid_id)?;
        if !Self::acts_for_seller(principal, &bid.sub_contractor_id) {
            principal.require(&DESK, "reject bids")?;
        }
        let now = self.ctx.now();
        bid.transition(BidEvent::Reject, &principal.id, now, reason.clone())?;
        let stored = self.ctx.stores.bids.update(bid)?;

        let mut case = self.case(&stored.case_id)?;
        if case.bid_id.as_deref() == Some(stored.id.as_str())
            && case.ensure(CaseEvent::ReopenBidding).is_ok()
        {
            case.transition(CaseEvent::ReopenBidding, &principal.id, now, reason)?;
            case.bid_id = None;
            self.ctx.stores.cases.update(case)?;
        }
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("bid_rejected", &stored.company_id, &stored.id),
        );
        Ok(stored)
    }

    /// Freezes the standing terms on bid and case. Deals above the high-value threshold file
    /// the founder approval the funding gate waits on.
    pub fn lock_bid(&self, principal: &Principal, bid_id: &str) -> Result<Case, DomainError> {
        let mut bid = self.bid(bid_id)?;
        if !Self::party_to(principal, &bid) {
            principal.require(&DESK, "lock commercials")?;
        }
        let mut case = self.case(&bid.case_id)?;
        let now = self.ctx.now();

        let resuming = bid.status() == BidStatus::CommercialLocked
            && case.commercial_snapshot.is_none()
            && case.bid_id.as_deref() == Some(bid.id.as_str());
        let terms = if resuming {
            bid.locked_terms.unwrap_or_else(|| bid.standing_terms())
        } else {
            case.ensure(CaseEvent::Lock)?;
            let terms = bid.lock(&principal.id, now)?;
            bid = self.ctx.stores.bids.update(bid)?;
            terms
        };

        case.lock_commercial(
            CommercialSnapshot {
                bid_id: bid.id.clone(),
                amount: terms.amount,
                duration_days: terms.duration_days,
                locked_at: now,
            },
            &principal.id,
        )?;
        case.bid_id = Some(bid.id.clone());
        let case = self.ctx.stores.cases.update(case)?;

        if terms.amount > HIGH_VALUE_DEAL_THRESHOLD {
            self.raise_gate(RequestType::DealAbove1Cr, &case, "locked amount above ₹1 crore")?;
        }
        self.sla.close_quietly(&case.id);
        for recipient in [&case.sub_contractor_id, &case.company_id] {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("commercial_locked", recipient, &case.id)
                    .with("amount", terms.amount)
                    .with("duration_days", terms.duration_days),
            );
        }
        info!(case = %case.id, bid = %bid.id, amount = terms.amount, "commercials locked");
        Ok(case)
    }

    pub fn transaction(&self, id: &str) -> Result<Transaction, DomainError> {
        require(self.ctx.stores.transactions.as_ref(), id)
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, DomainError> {
        Ok(self.ctx.stores.transactions.list()?)
    }

    /// Approvals the case still needs before it can be funded.
    pub fn missing_gates(&self, case: &Case) -> Result<Vec<RequestType>, DomainError> {
        let mut required = Vec::new();
        if case.deal_amount() > HIGH_VALUE_DEAL_THRESHOLD {
            required.push(RequestType::DealAbove1Cr);
        }
        if case.risk_category == Some(RiskCategory::High) {
            required.push(RequestType::HighRiskCase);
        }
        let mut missing = Vec::new();
        for request_type in required {
            if !self.approvals.is_approved(request_type, &case.id)? {
                missing.push(request_type);
            }
        }
        Ok(missing)
    }

    /// Funds a sanctioned case. Blocked until every gate approval is in.
    pub fn create_transaction(
        &self,
        principal: &Principal,
        case_id: &str,
    ) -> Result<Transaction, DomainError> {
        principal.require(&DESK, "create transactions")?;
        let mut case = self.case(case_id)?;
        case.ensure(CaseEvent::Fund)?;
        if let Some(request_type) = self.missing_gates(&case)?.into_iter().next() {
            return Err(DomainError::ApprovalRequired {
                request_type,
                entity: "case",
                id: case.id.clone(),
            });
        }
        self.active_seller(&case.sub_contractor_id)?;
        let (Some(snapshot), Some(sanction)) =
            (case.commercial_snapshot.clone(), case.sanction.clone())
        else {
            return Err(DomainError::validation(format!(
                "case {case_id} has no locked terms or sanction"
            )));
        };

        let now = self.ctx.now();
        let existing = self
            .ctx
            .stores
            .transactions
            .list()?
            .into_iter()
            .find(|txn| txn.case_id == case.id);
        let txn = match existing {
            Some(existing) => existing,
            None => self.ctx.stores.transactions.insert(Transaction::new(
                next_id("txn"),
                &case.id,
                &snapshot.bid_id,
                &case.sub_contractor_id,
                &case.company_id,
                &sanction.nbfc_id,
                snapshot.amount,
                sanction.interest_rate,
                snapshot.duration_days,
                &principal.id,
                now,
            ))?,
        };

        case.transition(
            CaseEvent::Fund,
            &principal.id,
            now,
            Some(format!("transaction {}", txn.id)),
        )?;
        case.transaction_id = Some(txn.id.clone());
        self.ctx.stores.cases.update(case)?;
        self.touch_seller(&txn.sub_contractor_id);
        info!(transaction = %txn.id, case = %case_id, "transaction created");
        Ok(txn)
    }

    pub fn setup_escrow(
        &self,
        principal: &Principal,
        id: &str,
        account_reference: &str,
    ) -> Result<Transaction, DomainError> {
        principal.require(&DESK, "set up escrow")?;
        let mut txn = self.transaction(id)?;
        txn.setup_escrow(account_reference, &principal.id, self.ctx.now())?;
        let stored = self.ctx.stores.transactions.update(txn)?;
        info!(transaction = %stored.id, "escrow set up");
        Ok(stored)
    }

    pub fn disburse(
        &self,
        principal: &Principal,
        id: &str,
        step: DisbursementStep,
        reference: Option<String>,
        reason: Option<String>,
    ) -> Result<Transaction, DomainError> {
        principal.require(&DESK, "disburse funds")?;
        let mut txn = self.transaction(id)?;
        let now = self.ctx.now();
        match step {
            DisbursementStep::Initiate => txn.initiate_disbursement(reference, &principal.id, now)?,
            DisbursementStep::Complete => txn.complete_disbursement(reference, &principal.id, now)?,
            DisbursementStep::Fail => {
                let reason = reason.unwrap_or_else(|| "disbursement failed".to_string());
                txn.fail_disbursement(&reason, &principal.id, now)?
            }
        }
        let stored = self.ctx.stores.transactions.update(txn)?;
        if step == DisbursementStep::Complete {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("funds_disbursed", &stored.sub_contractor_id, &stored.id)
                    .with("amount", stored.principal_amount),
            );
        }
        info!(transaction = %stored.id, ?step, status = stored.status().label(), "disbursement updated");
        Ok(stored)
    }

    /// Adds a payment; full repayment closes the transaction and the case and feeds the
    /// lender's metrics.
    pub fn record_repayment(
        &self,
        principal: &Principal,
        id: &str,
        amount: f64,
        reference: Option<String>,
    ) -> Result<Transaction, DomainError> {
        let mut txn = self.transaction(id)?;
        if !(principal.role == Role::Nbfc && principal.id == txn.nbfc_id) {
            principal.require(&DESK, "record repayments")?;
        }
        let now = self.ctx.now();
        let settled = txn.record_repayment(amount, reference, &principal.id, now)?;
        let stored = self.ctx.stores.transactions.update(txn)?;
        if settled {
            self.close_case(&stored, CaseEvent::Close, &principal.id)?;
            if let Err(err) = self.lenders.record_closed_deal(
                &stored.nbfc_id,
                stored.principal_amount,
                stored.interest_rate,
            ) {
                warn!(nbfc = %stored.nbfc_id, error = %err, "lender metrics not refreshed");
            }
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("transaction_closed", &stored.sub_contractor_id, &stored.id),
            );
        }
        info!(
            transaction = %stored.id,
            received = stored.repayment.received,
            settled,
            "repayment recorded"
        );
        Ok(stored)
    }

    fn close_case(&self, txn: &Transaction, event: CaseEvent, by: &str) -> Result<(), DomainError> {
        let mut case = self.case(&txn.case_id)?;
        if case.ensure(event).is_ok() {
            case.transition(event, by, self.ctx.now(), Some(format!("transaction {}", txn.id)))?;
            self.ctx.stores.cases.update(case)?;
        }
        Ok(())
    }

    /// Re-evaluates the overdue position of one transaction.
    pub fn evaluate_overdue(
        &self,
        principal: &Principal,
        id: &str,
    ) -> Result<(Transaction, OverdueCheck), DomainError> {
        principal.require(&[Role::Ops, Role::OpsManager, Role::System], "evaluate overdue")?;
        let mut txn = self.transaction(id)?;
        let before = (txn.status(), txn.repayment.overdue_by);
        let check = txn.evaluate_overdue(self.ctx.now(), &principal.id)?;
        let stored = if (txn.status(), txn.repayment.overdue_by) != before || check.recourse_triggered
        {
            self.ctx.stores.transactions.update(txn)?
        } else {
            txn
        };
        if check.recourse_triggered {
            dispatch(
                self.ctx.notifier.as_ref(),
                Notice::new("recourse_triggered", &stored.sub_contractor_id, &stored.id)
                    .with("days_overdue", check.days_overdue),
            );
            warn!(
                transaction = %stored.id,
                days_overdue = check.days_overdue,
                "recourse triggered against seller"
            );
        }
        Ok((stored, check))
    }

    pub fn mark_default(
        &self,
        principal: &Principal,
        id: &str,
        reason: &str,
    ) -> Result<Transaction, DomainError> {
        principal.require(&[Role::OpsManager], "default transactions")?;
        let mut txn = self.transaction(id)?;
        txn.mark_default(reason, &principal.id, self.ctx.now())?;
        let stored = self.ctx.stores.transactions.update(txn)?;
        self.close_case(&stored, CaseEvent::Default, &principal.id)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("transaction_defaulted", &stored.nbfc_id, &stored.id)
                .with("reason", reason),
        );
        warn!(transaction = %stored.id, "transaction defaulted");
        Ok(stored)
    }
}
