//! Shared fixtures: every service wired over in-memory stores, a fixed clock, and a recording
//! notifier.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::approvals::ApprovalService;
use super::common::{next_id, FixedClock, Principal, Role};
use super::context::{Context, Stores};
use super::deals::{DealService, Transaction};
use super::lenders::{LenderService, Nbfc, NewNbfc};
use super::onboarding::{
    ChecklistItem, Company, NewCompany, NewSubContractor, OnboardingService,
    SellerRiskAssessment, SubContractor,
};
use super::platform::Platform;
use super::ports::{MemoryDocumentStorage, RecordingNotifier};
use super::sla::{SlaService, SweepService};


pub(crate) struct Fixture {
    pub ctx: Context,
    pub clock: Arc<FixedClock>,
    pub notifier: RecordingNotifier,
    pub storage: MemoryDocumentStorage,
    pub sla: Arc<SlaService>,
    pub approvals: Arc<ApprovalService>,
    pub onboarding: Arc<OnboardingService>,
    pub lenders: Arc<LenderService>,
    pub deals: Arc<DealService>,
    pub sweeps: Arc<SweepService>,
}

pub(crate) fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn fixture() -> Fixture {
    let clock = Arc::new(FixedClock::new(start_of_day()));
    let notifier = RecordingNotifier::default();
    let storage = MemoryDocumentStorage::default();
    let ctx = Context::new(
        Stores::in_memory(),
        clock.clone(),
        Arc::new(notifier.clone()),
        Arc::new(storage.clone()),
    );
    let platform = Platform::new(ctx);
    Fixture {
        ctx: platform.ctx,
        clock,
        notifier,
        storage,
        sla: platform.sla,
        approvals: platform.approvals,
        onboarding: platform.onboarding,
        lenders: platform.lenders,
        deals: platform.deals,
        sweeps: platform.sweeps,
    }
}

pub(crate) fn principal(id: &str, role: Role) -> Principal {
    Principal::new(id, role)
}

pub(crate) fn sample_lead(name: &str, pan: &str) -> NewSubContractor {
    NewSubContractor {
        name: name.to_string(),
        pan: Some(pan.to_string()),
        gstin: None,
        email: None,
        geography: Some("Maharashtra".to_string()),
        sector: Some("Solar EPC".to_string()),
        agent_id: None,
    }
}

impl Fixture {
    /// Lead taken through KYC into an open risk assessment with an empty checklist.
    pub fn assessed_seller(&self, name: &str, pan: &str) -> (SubContractor, SellerRiskAssessment) {
        let sales = principal("sales-1", Role::Sales);
        let seller = self
            .onboarding
            .create_lead(&sales, sample_lead(name, pan))
            .expect("lead");
        self.onboarding
            .submit_profile(&sales, &seller.id)
            .expect("profile");
        self.onboarding
            .verify_kyc(&principal("ops-1", Role::Ops), &seller.id)
            .expect("kyc");
        let assessment = self
            .onboarding
            .start_assessment(&principal("rmt-1", Role::Rmt), &seller.id, None)
            .expect("assessment");
        let seller = self.onboarding.sub_contractor(&seller.id).expect("seller");
        (seller, assessment)
    }

    /// LOW-risk seller, approved and active.
    pub fn active_seller(&self, name: &str, pan: &str) -> SubContractor {
        let (seller, assessment) = self.assessed_seller(name, pan);
        let rmt = principal("rmt-1", Role::Rmt);
        let all: BTreeMap<String, bool> = ChecklistItem::ALL
            .into_iter()
            .map(|item| (item.key().to_string(), true))
            .collect();
        self.onboarding
            .update_checklist(&rmt, &assessment.id, &all)
            .expect("checklist");
        let submitted = self
            .onboarding
            .submit_assessment(&rmt, &assessment.id)
            .expect("submit");
        self.approvals
            .approve(
                &principal("om-1", Role::OpsManager),
                submitted.approval_id.as_deref().expect("approval"),
                None,
            )
            .expect("approve");
        self.onboarding.sub_contractor(&seller.id).expect("seller")
    }

    /// Seller whose rejection was signed off, now in its cooling period.
    pub fn rejected_seller(&self, name: &str, pan: &str) -> SubContractor {
        let (seller, assessment) = self.assessed_seller(name, pan);
        let submitted = self
            .onboarding
            .submit_assessment(&principal("rmt-1", Role::Rmt), &assessment.id)
            .expect("submit");
        self.approvals
            .approve(
                &principal("om-1", Role::OpsManager),
                submitted.approval_id.as_deref().expect("approval"),
                None,
            )
            .expect("approve rejection");
        self.onboarding.sub_contractor(&seller.id).expect("seller")
    }

    pub fn company(&self, name: &str, pan: &str) -> Company {
        self.onboarding
            .register_company(
                &principal("sales-1", Role::Sales),
                NewCompany {
                    name: name.to_string(),
                    pan: Some(pan.to_string()),
                    gstin: None,
                    email: None,
                    geography: Some("Maharashtra".to_string()),
                    sector: Some("Solar EPC".to_string()),
                },
            )
            .expect("company")
    }

    pub fn lender(&self, name: &str) -> Nbfc {
        self.lenders
            .register(
                &principal("om-1", Role::OpsManager),
                NewNbfc {
                    name: name.to_string(),
                    email: format!("{}@lenders.test", name.to_lowercase().replace(' ', "-")),
                    preferences: Default::default(),
                },
            )
            .expect("lender")
    }

    /// ₹10 lakh at 12% for 30 days, disbursed at `disbursed_at`, written straight to the store.
    pub fn seed_transaction(&self, seller_id: &str, disbursed_at: DateTime<Utc>) -> Transaction {
        let mut txn = Transaction::new(
            next_id("txn"),
            "case-seeded",
            "bid-seeded",
            seller_id,
            "co-seeded",
            "nbfc-seeded",
            1_000_000.0,
            12.0,
            30,
            "ops-1",
            disbursed_at,
        );
        txn.setup_escrow("TRA-SEED", "ops-1", disbursed_at)
            .expect("escrow");
        txn.initiate_disbursement(None, "ops-1", disbursed_at)
            .expect("initiate");
        txn.complete_disbursement(Some("UTR-SEED".to_string()), "ops-1", disbursed_at)
            .expect("complete");
        self.ctx.stores.transactions.insert(txn).expect("insert")
    }
}
