use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::approvals::ApprovalRequest;
use super::common::{Clock, SystemClock};
use super::deals::{Bid, Bill, Case, CwcRequest, Transaction};
use super::lenders::Nbfc;
use super::onboarding::{Agent, BlacklistEntry, Company, SellerRiskAssessment, SubContractor};
use super::ports::{DocumentStorage, MemoryDocumentStorage, Notifier, RecordingNotifier};
use super::sla::{Sla, SlaEscalation};
use super::store::{MemoryRepository, Repository};

/// One repository per document kind.
#[derive(Clone)]
pub struct Stores {
    pub sub_contractors: Arc<dyn Repository<SubContractor>>,
    pub assessments: Arc<dyn Repository<SellerRiskAssessment>>,
    pub blacklist: Arc<dyn Repository<BlacklistEntry>>,
    pub companies: Arc<dyn Repository<Company>>,
    pub agents: Arc<dyn Repository<Agent>>,
    pub bills: Arc<dyn Repository<Bill>>,
    pub cwc_requests: Arc<dyn Repository<CwcRequest>>,
    pub cases: Arc<dyn Repository<Case>>,
    pub bids: Arc<dyn Repository<Bid>>,
    pub transactions: Arc<dyn Repository<Transaction>>,
    pub approvals: Arc<dyn Repository<ApprovalRequest>>,
    pub slas: Arc<dyn Repository<Sla>>,
    pub sla_escalations: Arc<dyn Repository<SlaEscalation>>,
    pub nbfcs: Arc<dyn Repository<Nbfc>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            sub_contractors: Arc::new(MemoryRepository::default()),
            assessments: Arc::new(MemoryRepository::default()),
            blacklist: Arc::new(MemoryRepository::default()),
            companies: Arc::new(MemoryRepository::default()),
            agents: Arc::new(MemoryRepository::default()),
            bills: Arc::new(MemoryRepository::default()),
            cwc_requests: Arc::new(MemoryRepository::default()),
            cases: Arc::new(MemoryRepository::default()),
            bids: Arc::new(MemoryRepository::default()),
            transactions: Arc::new(MemoryRepository::default()),
            approvals: Arc::new(MemoryRepository::default()),
            slas: Arc::new(MemoryRepository::default()),
            sla_escalations: Arc::new(MemoryRepository::default()),
            nbfcs: Arc::new(MemoryRepository::default()),
        }
    }
}

/// Everything a workflow service reaches outside itself for.
#[derive(Clone)]
pub struct Context {
    pub stores: Stores,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub storage: Arc<dyn DocumentStorage>,
}

impl Context {
    pub fn new(
        stores: Stores,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn DocumentStorage>,
    ) -> Self {
        Self {
            stores,
            clock,
            notifier,
            storage,
        }
    }

    /// In-memory stores and adapters on the system clock.
    pub fn in_memory() -> Self {
        Self::new(
            Stores::in_memory(),
            Arc::new(SystemClock),
            Arc::new(RecordingNotifier::default()),
            Arc::new(MemoryDocumentStorage::default()),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
