use tracing::{info, warn};

use super::domain::{Sla, SlaSubject, SlaSubjectKind};
use crate::workflows::common::next_id;
use crate::workflows::context::Context;
use crate::workflows::error::DomainError;

const SLA_ACTOR: &str = "sla-tracker";

/// Opens and advances the Sla attached to a pipeline record.
pub struct SlaService {
    ctx: Context,
}

impl SlaService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Result<Vec<Sla>, DomainError> {
        Ok(self.ctx.stores.slas.list()?)
    }

    /// The open Sla tracking `subject_id`, if any.
    pub fn for_subject(&self, subject_id: &str) -> Result<Option<Sla>, DomainError> {
        Ok(self
            .ctx
            .stores
            .slas
            .list()?
            .into_iter()
            .find(|sla| sla.is_open() && sla.subject.id == subject_id))
    }

    /// Starts tracking a subject. Returns the existing open Sla when one is already running.
    pub fn open(
        &self,
        kind: SlaSubjectKind,
        subject_id: &str,
        recipient: &str,
    ) -> Result<Sla, DomainError> {
        if let Some(existing) = self.for_subject(subject_id)? {
            return Ok(existing);
        }
        let sla = Sla::new(
            next_id("sla"),
            SlaSubject {
                kind,
                id: subject_id.to_string(),
            },
            recipient,
            SLA_ACTOR,
            self.ctx.now(),
        );
        let stored = self.ctx.stores.slas.insert(sla)?;
        info!(sla = %stored.id, subject = %subject_id, ?kind, "sla opened");
        Ok(stored)
    }

    pub fn complete_next_milestone(&self, subject_id: &str) -> Result<Option<Sla>, DomainError> {
        let Some(mut sla) = self.for_subject(subject_id)? else {
            return Ok(None);
        };
        if sla.complete_next(self.ctx.now()).is_none() {
            return Ok(Some(sla));
        }
        Ok(Some(self.ctx.stores.slas.update(sla)?))
    }

    pub fn close(&self, subject_id: &str) -> Result<Option<Sla>, DomainError> {
        let Some(mut sla) = self.for_subject(subject_id)? else {
            return Ok(None);
        };
        sla.close(SLA_ACTOR, self.ctx.now())?;
        let stored = self.ctx.stores.slas.update(sla)?;
        info!(sla = %stored.id, subject = %subject_id, "sla closed");
        Ok(Some(stored))
    }

    /// Milestone bookkeeping must not fail the transition that triggered it.
    pub(crate) fn progress_quietly(&self, subject_id: &str) {
        if let Err(err) = self.complete_next_milestone(subject_id) {
            warn!(subject = %subject_id, error = %err, "sla milestone not recorded");
        }
    }

    pub(crate) fn close_quietly(&self, subject_id: &str) {
        if let Err(err) = self.close(subject_id) {
            warn!(subject = %subject_id, error = %err, "sla not closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::sla::domain::{MilestoneStatus, SlaStatus};
    use crate::workflows::tests::fixture;

    #[test]
    fn open_is_idempotent_per_subject() {
        let fx = fixture();
        let first = fx
            .sla
            .open(SlaSubjectKind::Bill, "bill-1", "ops")
            .expect("open");
        let second = fx
            .sla
            .open(SlaSubjectKind::Bill, "bill-1", "ops")
            .expect("open");
        assert_eq!(first.id, second.id);
        assert_eq!(fx.sla.list().expect("list").len(), 1);
    }

    #[test]
    fn progress_then_close() {
        let fx = fixture();
        fx.sla
            .open(SlaSubjectKind::Onboarding, "sc-1", "sales-1")
            .expect("open");
        let progressed = fx
            .sla
            .complete_next_milestone("sc-1")
            .expect("progress")
            .expect("tracked");
        assert_eq!(progressed.milestones[0].status, MilestoneStatus::Completed);

        let closed = fx.sla.close("sc-1").expect("close").expect("tracked");
        assert_eq!(closed.status(), SlaStatus::Completed);
        assert_eq!(closed.milestones[1].status, MilestoneStatus::Completed);
        assert!(fx.sla.for_subject("sc-1").expect("lookup").is_none());
        assert!(fx.sla.close("sc-1").expect("nothing open").is_none());
    }
}
