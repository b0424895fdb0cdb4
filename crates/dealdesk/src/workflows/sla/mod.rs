//! Milestone tracking, the time-driven sweeps, and the timer that fires them.

pub mod domain;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod sweeps;

pub use domain::{
    Milestone, MilestoneStatus, Sla, SlaEscalation, SlaStatus, SlaSubject, SlaSubjectKind,
};
pub use router::cron_router;
pub use scheduler::{Scheduler, SchedulerStatus};
pub use service::SlaService;
pub use sweeps::{SweepFailure, SweepJob, SweepReport, SweepService};
