//! Deal-lifecycle orchestration for invoice financing: seller onboarding, approval escalation,
//! the case/bid/transaction pipeline, lender matching, and SLA sweeps.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
