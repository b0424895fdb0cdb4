//! Time-driven maintenance jobs. Every job is safe to re-run and isolates failures per entity.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::domain::{Sla, SlaEscalation};
use crate::workflows::approvals::{ApprovalRequest, ApprovalService};
use crate::workflows::common::{days_between, Principal};
use crate::workflows::context::Context;
use crate::workflows::deals::{DealService, Transaction};
use crate::workflows::error::DomainError;
use crate::workflows::onboarding::{SubContractor, SubContractorEvent, SubContractorStatus};
use crate::workflows::policy::{
    APPROVAL_STALE_HOURS, CRITICAL_OVERDUE_DAYS, DORMANCY_DAYS, REPAYMENT_REMINDER_DAYS,
};
use crate::workflows::ports::{dispatch, Notice};
use crate::workflows::store::{Record, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepJob {
    Dormant,
    SlaReminders,
    KycExpiry,
    OverdueNotifications,
    ActualOverdue,
    Escalations,
    CoolingPeriod,
}

impl SweepJob {
    pub const ALL: [Self; 7] = [
        Self::Dormant,
        Self::SlaReminders,
        Self::KycExpiry,
        Self::OverdueNotifications,
        Self::ActualOverdue,
        Self::Escalations,
        Self::CoolingPeriod,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Dormant => "dormant",
            Self::SlaReminders => "sla-reminders",
            Self::KycExpiry => "kyc-expiry",
            Self::OverdueNotifications => "overdue-notifications",
            Self::ActualOverdue => "actual-overdue",
            Self::Escalations => "escalations",
            Self::CoolingPeriod => "cooling-period",
        }
    }

    /// How often the in-process scheduler fires the job.
    pub const fn interval(self) -> StdDuration {
        const HOUR: u64 = 60 * 60;
        match self {
            Self::SlaReminders | Self::Escalations => StdDuration::from_secs(HOUR),
            Self::ActualOverdue => StdDuration::from_secs(6 * HOUR),
            Self::Dormant
            | Self::KycExpiry
            | Self::OverdueNotifications
            | Self::CoolingPeriod => StdDuration::from_secs(24 * HOUR),
        }
    }

    pub const fn schedule(self) -> &'static str {
        match self {
            Self::SlaReminders | Self::Escalations => "hourly",
            Self::ActualOverdue => "every 6 hours",
            _ => "daily",
        }
    }
}

impl fmt::Display for SweepJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job '{0}'")]
pub struct UnknownJob(pub String);

impl FromStr for SweepJob {
    type Err = UnknownJob;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|job| job.name() == normalized)
            .ok_or(UnknownJob(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub entity_id: String,
    pub error: String,
}

/// Outcome of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub job: SweepJob,
    pub scanned: usize,
    pub affected: usize,
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(job: SweepJob) -> Self {
        Self {
            job,
            scanned: 0,
            affected: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, entity_id: &str, err: &DomainError) {
        error!(job = %self.job, entity = %entity_id, error = %err, "sweep entity failed");
        self.failures.push(SweepFailure {
            entity_id: entity_id.to_string(),
            error: err.to_string(),
        });
    }
}

/// Runs the maintenance jobs against the shared stores.
pub struct SweepService {
    ctx: Context,
    approvals: Arc<ApprovalService>,
    deals: Arc<DealService>,
}

impl SweepService {
    pub fn new(ctx: Context, approvals: Arc<ApprovalService>, deals: Arc<DealService>) -> Self {
        Self {
            ctx,
            approvals,
            deals,
        }
    }

    pub fn run(&self, job: SweepJob) -> SweepReport {
        let report = match job {
            SweepJob::Dormant => self.sweep(job, self.ctx.stores.sub_contractors.list(), |sc, now| {
                self.mark_dormant(sc, now)
            }),
            SweepJob::SlaReminders => {
                self.sweep(job, self.ctx.stores.slas.list(), |sla, now| self.escalate_sla(sla, now))
            }
            SweepJob::KycExpiry => self.sweep(job, self.ctx.stores.sub_contractors.list(), |sc, now| {
                self.check_kyc(sc, now)
            }),
            SweepJob::OverdueNotifications => {
                self.sweep(job, self.ctx.stores.transactions.list(), |txn, now| {
                    self.notify_repayment(txn, now)
                })
            }
            SweepJob::ActualOverdue => {
                self.sweep(job, self.ctx.stores.transactions.list(), |txn, _| {
                    self.evaluate_overdue(txn)
                })
            }
            SweepJob::Escalations => self.sweep(job, self.ctx.stores.approvals.list(), |req, now| {
                self.escalate_stale(req, now)
            }),
            SweepJob::CoolingPeriod => {
                self.sweep(job, self.ctx.stores.sub_contractors.list(), |sc, now| {
                    self.release_cooling(sc, now)
                })
            }
        };
        info!(
            job = %report.job,
            scanned = report.scanned,
            affected = report.affected,
            skipped = report.skipped,
            failures = report.failures.len(),
            "sweep finished"
        );
        report
    }

    pub fn run_all(&self) -> Vec<SweepReport> {
        SweepJob::ALL.into_iter().map(|job| self.run(job)).collect()
    }

    /// Visits every record; `visit` returns whether it changed anything.
    fn sweep<T: Record>(
        &self,
        job: SweepJob,
        records: Result<Vec<T>, RepositoryError>,
        mut visit: impl FnMut(T, DateTime<Utc>) -> Result<bool, DomainError>,
    ) -> SweepReport {
        let mut report = SweepReport::new(job);
        let records = match records {
            Ok(records) => records,
            Err(err) => {
                report.fail(job.name(), &DomainError::from(err));
                return report;
            }
        };
        let now = self.ctx.now();
        for record in records {
            report.scanned += 1;
            let id = record.id().to_string();
            match visit(record, now) {
                Ok(true) => report.affected += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => report.fail(&id, &err),
            }
        }
        report
    }

    fn has_recent_transaction(&self, seller_id: &str, since: DateTime<Utc>) -> Result<bool, DomainError> {
        Ok(self
            .ctx
            .stores
            .transactions
            .list()?
            .iter()
            .any(|txn| txn.sub_contractor_id == seller_id && txn.created_at >= since))
    }

    fn mark_dormant(&self, mut seller: SubContractor, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let cutoff = now - Duration::days(DORMANCY_DAYS);
        if seller.status() != SubContractorStatus::Active || seller.last_activity_date > cutoff {
            return Ok(false);
        }
        if self.has_recent_transaction(&seller.id, cutoff)? {
            return Ok(false);
        }
        let idle_days = days_between(seller.last_activity_date, now);
        seller.transition(
            SubContractorEvent::GoDormant,
            &Principal::system().id,
            now,
            Some(format!("no activity for {idle_days} days")),
        )?;
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("seller_dormant", &stored.created_by, &stored.id)
                .with("idle_days", idle_days),
        );
        info!(sub_contractor = %stored.id, idle_days, "seller marked dormant");
        Ok(true)
    }

    /// Records one escalation per missed milestone, then climbs the status ladder. The
    /// escalation insert collides on re-runs, so nothing is emitted twice.
    fn escalate_sla(&self, mut sla: Sla, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if !sla.is_open() {
            return Ok(false);
        }
        let missed: Vec<usize> = sla
            .milestones
            .iter()
            .filter(|m| m.is_open() && now > m.deadline)
            .map(|m| m.index)
            .collect();
        let mut emitted = 0;
        for index in &missed {
            let milestone = &sla.milestones[*index];
            let escalation = SlaEscalation {
                id: SlaEscalation::key(&sla.id, *index),
                sla_id: sla.id.clone(),
                subject: sla.subject.clone(),
                milestone_index: *index,
                deadline: milestone.deadline,
                escalated_at: now,
                revision: 0,
            };
            match self.ctx.stores.sla_escalations.insert(escalation) {
                Ok(_) => {
                    emitted += 1;
                    dispatch(
                        self.ctx.notifier.as_ref(),
                        Notice::new("sla_escalation", &sla.recipient, &sla.subject.id)
                            .with("sla", &sla.id)
                            .with("milestone", index + 1)
                            .with("due_in_days", milestone.due_in_days),
                    );
                }
                Err(RepositoryError::Conflict { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let flipped = sla.mark_overdue(now);
        let climbed = sla.climb(&Principal::system().id, now)?;
        if flipped.is_empty() && climbed.is_none() {
            return Ok(emitted > 0);
        }
        let stored = self.ctx.stores.slas.update(sla)?;
        if let Some(status) = climbed {
            info!(sla = %stored.id, status = ?status, "sla climbed");
        }
        Ok(true)
    }

    fn check_kyc(&self, mut seller: SubContractor, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if seller.status() == SubContractorStatus::Blacklisted {
            return Ok(false);
        }
        let Some(kyc) = seller.kyc_validity.as_mut() else {
            return Ok(false);
        };
        let mut template = None;
        if kyc.in_warning_window(now) && !kyc.reminder_sent {
            kyc.reminder_sent = true;
            template = Some("kyc_expiring");
        } else if kyc.is_expired(now) && !kyc.expired_flagged {
            kyc.expired_flagged = true;
            kyc.reminder_sent = true;
            template = Some("kyc_expired");
        }
        let Some(template) = template else {
            return Ok(false);
        };
        let expires_at = kyc.expires_at;
        seller.updated_at = now;
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new(template, &stored.created_by, &stored.id)
                .with("expires_at", expires_at.date_naive()),
        );
        Ok(true)
    }

    fn notify_repayment(&self, mut txn: Transaction, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if !txn.awaiting_repayment() {
            return Ok(false);
        }
        let Some(due) = txn.repayment.due_date else {
            return Ok(false);
        };
        let mut notices = Vec::new();
        if now <= due {
            let days_left = days_between(now, due);
            if days_left <= REPAYMENT_REMINDER_DAYS && !txn.repayment.reminder_sent {
                txn.repayment.reminder_sent = true;
                notices.push(
                    Notice::new("repayment_reminder", &txn.sub_contractor_id, &txn.id)
                        .with("due_date", due.date_naive())
                        .with("outstanding", txn.repayment.outstanding()),
                );
            }
        } else {
            let days = days_between(due, now);
            let today = now.date_naive();
            if txn.repayment.last_overdue_notice != Some(today) {
                txn.repayment.last_overdue_notice = Some(today);
                notices.push(
                    Notice::new("repayment_overdue", &txn.sub_contractor_id, &txn.id)
                        .with("days_overdue", days)
                        .with("outstanding", txn.repayment.outstanding()),
                );
            }
            if days >= CRITICAL_OVERDUE_DAYS && !txn.repayment.critical_notified {
                txn.repayment.critical_notified = true;
                for recipient in ["ops_manager", txn.nbfc_id.as_str()] {
                    notices.push(
                        Notice::new("repayment_critical", recipient, &txn.id)
                            .with("days_overdue", days),
                    );
                }
            }
        }
        if notices.is_empty() {
            return Ok(false);
        }
        txn.updated_at = now;
        self.ctx.stores.transactions.update(txn)?;
        for notice in notices {
            dispatch(self.ctx.notifier.as_ref(), notice);
        }
        Ok(true)
    }

    fn evaluate_overdue(&self, txn: Transaction) -> Result<bool, DomainError> {
        if !txn.awaiting_repayment() {
            return Ok(false);
        }
        let before = (txn.status(), txn.recourse.triggered);
        let (stored, _) = self.deals.evaluate_overdue(&Principal::system(), &txn.id)?;
        Ok((stored.status(), stored.recourse.triggered) != before)
    }

    fn escalate_stale(&self, request: ApprovalRequest, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if !request.is_open() || now - request.level_entered_at <= Duration::hours(APPROVAL_STALE_HOURS) {
            return Ok(false);
        }
        if request.is_final_level() {
            return self.approvals.remind(&request.id);
        }
        self.approvals.escalate(
            &Principal::system(),
            &request.id,
            Some(format!("level {} waited over {APPROVAL_STALE_HOURS}h", request.current_level)),
        )?;
        Ok(true)
    }

    fn release_cooling(&self, mut seller: SubContractor, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if seller.status() != SubContractorStatus::CoolingPeriod {
            return Ok(false);
        }
        match seller.cooling_period {
            Some(window) if window.ends_at <= now => {}
            _ => return Ok(false),
        }
        seller.end_cooling(
            &Principal::system().id,
            now,
            Some("cooling period ended".to_string()),
        )?;
        let stored = self.ctx.stores.sub_contractors.update(seller)?;
        dispatch(
            self.ctx.notifier.as_ref(),
            Notice::new("cooling_period_ended", &stored.created_by, &stored.id),
        );
        info!(sub_contractor = %stored.id, "cooling period released");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::workflows::approvals::{NewApproval, RequestType, SubjectKind};
    use crate::workflows::common::Role;
    use crate::workflows::sla::{SlaStatus, SlaSubjectKind};
    use crate::workflows::store::require;
    use crate::workflows::tests::{fixture, principal};

    #[test]
    fn job_names_parse_back() {
        for job in SweepJob::ALL {
            assert_eq!(job.name().parse::<SweepJob>().expect("parses"), job);
        }
        assert_eq!("SLA_REMINDERS".parse::<SweepJob>().expect("parses"), SweepJob::SlaReminders);
        assert!("weekly".parse::<SweepJob>().is_err());
    }

    #[test]
    fn sla_sweep_emits_each_escalation_once() {
        let fx = fixture();
        let sla = fx
            .sla
            .open(SlaSubjectKind::Bill, "bill-1", "ops")
            .expect("open");
        fx.clock.advance(Duration::days(8));

        let first = fx.sweeps.run(SweepJob::SlaReminders);
        assert_eq!(first.affected, 1);
        assert!(first.is_clean());
        assert_eq!(fx.notifier.count("sla_escalation"), 2);
        let stored = require::<Sla>(fx.ctx.stores.slas.as_ref(), &sla.id).expect("sla");
        assert_eq!(stored.status(), SlaStatus::Reminder2Sent);

        let again = fx.sweeps.run(SweepJob::SlaReminders);
        assert_eq!(again.affected, 0);
        assert_eq!(fx.notifier.count("sla_escalation"), 2);
        assert_eq!(fx.ctx.stores.sla_escalations.list().expect("list").len(), 2);

        fx.clock.advance(Duration::days(7));
        fx.sweeps.run(SweepJob::SlaReminders);
        let stored = require::<Sla>(fx.ctx.stores.slas.as_ref(), &sla.id).expect("sla");
        assert_eq!(stored.status(), SlaStatus::Dormant);
        assert_eq!(fx.notifier.count("sla_escalation"), 4);
    }

    #[test]
    fn dormancy_spares_sellers_with_recent_transactions() {
        let fx = fixture();
        let idle = fx.active_seller("Idle Works", "AAACI1111I");
        let busy = fx.active_seller("Busy Works", "AAACJ2222J");
        fx.clock.advance(Duration::days(100));
        fx.seed_transaction(&busy.id, fx.ctx.now() - Duration::days(30));

        let report = fx.sweeps.run(SweepJob::Dormant);
        assert_eq!(report.affected, 1);
        let idle = fx.onboarding.sub_contractor(&idle.id).expect("seller");
        let busy = fx.onboarding.sub_contractor(&busy.id).expect("seller");
        assert_eq!(idle.status(), SubContractorStatus::Dormant);
        assert_eq!(busy.status(), SubContractorStatus::Active);

        assert_eq!(fx.sweeps.run(SweepJob::Dormant).affected, 0);
    }

    #[test]
    fn dormancy_window_is_inclusive_at_ninety_days() {
        let fx = fixture();
        let seller = fx.active_seller("Edge Works", "AAACL4444L");
        fx.clock.advance(Duration::days(89));
        assert_eq!(fx.sweeps.run(SweepJob::Dormant).affected, 0);
        let status = fx.onboarding.sub_contractor(&seller.id).expect("seller").status();
        assert_eq!(status, SubContractorStatus::Active);

        fx.clock.advance(Duration::days(1));
        assert_eq!(fx.sweeps.run(SweepJob::Dormant).affected, 1);
        let status = fx.onboarding.sub_contractor(&seller.id).expect("seller").status();
        assert_eq!(status, SubContractorStatus::Dormant);
    }

    #[test]
    fn a_transaction_on_the_cutoff_keeps_the_seller_active() {
        let fx = fixture();
        let seller = fx.active_seller("Margin Works", "AAACM5555M");
        fx.clock.advance(Duration::days(100));
        fx.seed_transaction(&seller.id, fx.ctx.now() - Duration::days(DORMANCY_DAYS));

        assert_eq!(fx.sweeps.run(SweepJob::Dormant).affected, 0);
        let status = fx.onboarding.sub_contractor(&seller.id).expect("seller").status();
        assert_eq!(status, SubContractorStatus::Active);
    }

    #[test]
    fn idle_sellers_go_dormant_after_ninety_one_days() {
        let fx = fixture();
        let quiet = fx.active_seller("Quiet Works", "AAACN6666N");
        let trading = fx.active_seller("Trading Works", "AAACP7777P");
        fx.clock.advance(Duration::days(91));
        fx.seed_transaction(&trading.id, fx.ctx.now() - Duration::days(10));

        assert_eq!(fx.sweeps.run(SweepJob::Dormant).affected, 1);
        let quiet = fx.onboarding.sub_contractor(&quiet.id).expect("seller");
        let trading = fx.onboarding.sub_contractor(&trading.id).expect("seller");
        assert_eq!(quiet.status(), SubContractorStatus::Dormant);
        assert_eq!(trading.status(), SubContractorStatus::Active);
    }

    #[test]
    fn kyc_reminders_fire_once_per_window() {
        let fx = fixture();
        let seller = fx.active_seller("Kappa Steel", "AAACK3333K");
        fx.clock.advance(Duration::days(350));

        assert_eq!(fx.sweeps.run(SweepJob::KycExpiry).affected, 1);
        assert_eq!(fx.sweeps.run(SweepJob::KycExpiry).affected, 0);
        assert_eq!(fx.notifier.count("kyc_expiring"), 1);

        fx.clock.advance(Duration::days(30));
        assert_eq!(fx.sweeps.run(SweepJob::KycExpiry).affected, 1);
        assert_eq!(fx.sweeps.run(SweepJob::KycExpiry).affected, 0);
        assert_eq!(fx.notifier.count("kyc_expired"), 1);
        let kyc = fx
            .onboarding
            .sub_contractor(&seller.id)
            .expect("seller")
            .kyc_validity
            .expect("kyc");
        assert!(kyc.expired_flagged);
    }

    #[test]
    fn repayment_notices_respect_their_cadence() {
        let fx = fixture();
        let txn = fx.seed_transaction("sc-77", fx.ctx.now());
        fx.clock.advance(Duration::days(28));
        fx.sweeps.run(SweepJob::OverdueNotifications);
        fx.sweeps.run(SweepJob::OverdueNotifications);
        assert_eq!(fx.notifier.count("repayment_reminder"), 1);

        fx.clock.advance(Duration::days(5));
        fx.sweeps.run(SweepJob::OverdueNotifications);
        fx.sweeps.run(SweepJob::OverdueNotifications);
        assert_eq!(fx.notifier.count("repayment_overdue"), 1);

        fx.clock.advance(Duration::days(1));
        fx.sweeps.run(SweepJob::OverdueNotifications);
        assert_eq!(fx.notifier.count("repayment_overdue"), 2);
        assert_eq!(fx.notifier.count("repayment_critical"), 0);

        fx.clock.advance(Duration::days(30));
        fx.sweeps.run(SweepJob::OverdueNotifications);
        fx.sweeps.run(SweepJob::OverdueNotifications);
        assert_eq!(fx.notifier.count("repayment_critical"), 2);
        let stored = fx.deals.transaction(&txn.id).expect("txn");
        assert!(stored.repayment.critical_notified);
    }

    #[test]
    fn actual_overdue_triggers_recourse_once() {
        let fx = fixture();
        let txn = fx.seed_transaction("sc-78", fx.ctx.now());
        fx.clock.advance(Duration::days(33));
        assert_eq!(fx.sweeps.run(SweepJob::ActualOverdue).affected, 1);
        fx.clock.advance(Duration::days(5));
        let report = fx.sweeps.run(SweepJob::ActualOverdue);
        assert_eq!(report.affected, 1);
        assert_eq!(fx.notifier.count("recourse_triggered"), 1);
        assert_eq!(fx.sweeps.run(SweepJob::ActualOverdue).affected, 0);
        let stored = fx.deals.transaction(&txn.id).expect("txn");
        assert!(stored.recourse.triggered);
    }

    #[test]
    fn stale_approvals_escalate_then_remind() {
        let fx = fixture();
        let request = fx
            .approvals
            .raise(
                &principal("sales-1", Role::Sales),
                NewApproval {
                    request_type: RequestType::StrategicException,
                    subject_kind: SubjectKind::Case,
                    subject_id: "case-5".to_string(),
                    reason: "pricing exception".to_string(),
                    amount: None,
                    risk_category: None,
                },
            )
            .expect("raise");
        fx.clock.advance(Duration::hours(47));
        assert_eq!(fx.sweeps.run(SweepJob::Escalations).affected, 0);

        fx.clock.advance(Duration::hours(2));
        assert_eq!(fx.sweeps.run(SweepJob::Escalations).affected, 1);
        assert_eq!(fx.approvals.get(&request.id).expect("request").current_level, 2);
        assert_eq!(fx.sweeps.run(SweepJob::Escalations).affected, 0);

        fx.clock.advance(Duration::hours(49));
        assert_eq!(fx.sweeps.run(SweepJob::Escalations).affected, 1);
        assert_eq!(fx.sweeps.run(SweepJob::Escalations).affected, 0);
        assert_eq!(fx.notifier.count("approval_reminder"), 1);
        assert!(fx.approvals.get(&request.id).expect("request").is_open());
    }

    #[test]
    fn ended_cooling_period_returns_seller_to_lead() {
        let fx = fixture();
        let seller = fx.rejected_seller("Omega Civil", "AAACO4444O");
        assert_eq!(fx.sweeps.run(SweepJob::CoolingPeriod).affected, 0);

        fx.clock.advance(Duration::days(185));
        assert_eq!(fx.sweeps.run(SweepJob::CoolingPeriod).affected, 1);
        let seller = fx.onboarding.sub_contractor(&seller.id).expect("seller");
        assert_eq!(seller.status(), SubContractorStatus::LeadCreated);
        assert!(seller.cooling_period.is_none());
    }

    #[test]
    fn run_all_reports_every_job() {
        let fx = fixture();
        let reports = fx.sweeps.run_all();
        let jobs: Vec<SweepJob> = reports.iter().map(|r| r.job).collect();
        assert_eq!(jobs, SweepJob::ALL.to_vec());
        assert!(reports.iter().all(SweepReport::is_clean));
    }
}
