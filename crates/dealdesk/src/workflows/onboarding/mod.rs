//! Seller admission into the pipeline: leads, KYC, risk scoring, and the blacklist gate.

pub mod blacklist;
pub mod domain;
pub mod risk;
pub mod router;
pub mod service;

pub use blacklist::{
    BlacklistEntry, BlacklistEvent, BlacklistStatus, Identity, ListedParty, ListedSubject,
};
pub use domain::{
    Agent, AgentStatus, AssessmentEvent, AssessmentStatus, Company, CompanyEvent, CompanyStatus,
    CoolingPeriod, KycValidity, SellerRiskAssessment, SubContractor, SubContractorEvent,
    SubContractorStatus,
};
pub use risk::{ChecklistItem, Recommendation, RiskCategory, RiskChecklist};
pub use router::onboarding_router;
pub use service::{
    BlacklistCheck, BlacklistReport, NewAgent, NewCompany, NewSubContractor, OnboardingService,
};
