//! Deal-desk workflows: seller onboarding, approvals, the deal pipeline, lender matching, and
//! SLA sweeps, all sharing one document store and one set of outbound ports.

pub mod approvals;
pub mod common;
pub mod context;
pub mod deals;
mod error;
pub mod lenders;
pub mod lifecycle;
pub mod onboarding;
pub mod platform;
pub mod policy;
pub mod ports;
pub mod sla;
pub mod store;

#[cfg(test)]
mod tests;

pub use context::{Context, Stores};
pub use error::DomainError;
pub use platform::{platform_router, Platform};
