//! Approval escalation: per-type approver chains, level-by-level decisions, and the side
//! effects a terminal decision has on the gated records.

pub mod domain;
pub(crate) mod effects;
pub mod resolver;
pub mod router;
pub mod service;

pub use domain::{
    ApprovalEvent, ApprovalLevel, ApprovalRequest, ApprovalStatus, ApprovalSubject, LevelStatus,
    RequestType, SubjectKind,
};
pub use router::approval_router;
pub use service::{ApprovalService, NewApproval};
