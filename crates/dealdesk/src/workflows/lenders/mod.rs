//! Lender registry, preference matching, and the sharing round on locked cases.

pub mod domain;
pub mod matching;
pub mod router;
pub mod service;

pub use domain::{
    preference_score, Coverage, LenderMetrics, LendingPreferences, Nbfc, NbfcEvent, NbfcStatus,
    RiskAppetite,
};
pub use matching::{DealProfile, MatchCandidate};
pub use router::lender_router;
pub use service::{LenderDecision, LenderService, NbfcResponse, NewNbfc};
