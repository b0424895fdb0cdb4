use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::sweeps::{SweepJob, SweepReport, SweepService};
use crate::workflows::common::Clock;

#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub at: DateTime<Utc>,
    pub report: SweepReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job: SweepJob,
    pub schedule: &'static str,
    pub interval_secs: u64,
    pub last_run: Option<LastRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

type LastRuns = Arc<Mutex<BTreeMap<&'static str, LastRun>>>;

/// Fires each sweep on its own interval. Owned by whoever composes the platform.
pub struct Scheduler {
    sweeps: Arc<SweepService>,
    clock: Arc<dyn Clock>,
    tasks: Mutex<Option<Vec<JoinHandle<()>>>>,
    last_runs: LastRuns,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn record(last_runs: &LastRuns, at: DateTime<Utc>, report: &SweepReport) {
    lock(last_runs).insert(
        report.job.name(),
        LastRun {
            at,
            report: report.clone(),
        },
    );
}

impl Scheduler {
    pub fn new(sweeps: Arc<SweepService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sweeps,
            clock,
            tasks: Mutex::new(None),
            last_runs: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Spawns one timer task per job. Returns false when already running. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut tasks = lock(&self.tasks);
        if tasks.is_some() {
            return false;
        }
        let handles = SweepJob::ALL
            .into_iter()
            .map(|job| {
                let sweeps = Arc::clone(&self.sweeps);
                let clock = Arc::clone(&self.clock);
                let last_runs = Arc::clone(&self.last_runs);
                tokio::spawn(async move {
                    let period = job.interval();
                    let mut ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        let sweeps = Arc::clone(&sweeps);
                        match tokio::task::spawn_blocking(move || sweeps.run(job)).await {
                            Ok(report) => record(&last_runs, clock.now(), &report),
                            Err(err) => error!(job = %job, error = %err, "scheduled sweep panicked"),
                        }
                    }
                })
            })
            .collect();
        *tasks = Some(handles);
        info!(jobs = SweepJob::ALL.len(), "scheduler started");
        true
    }

    /// Aborts the timer tasks. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let Some(handles) = lock(&self.tasks).take() else {
            return false;
        };
        for handle in handles {
            handle.abort();
        }
        info!("scheduler stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.tasks).is_some()
    }

    /// Runs a job immediately, outside the timer.
    pub fn run_now(&self, job: SweepJob) -> SweepReport {
        let report = self.sweeps.run(job);
        record(&self.last_runs, self.clock.now(), &report);
        report
    }

    pub fn run_all_now(&self) -> Vec<SweepReport> {
        SweepJob::ALL.into_iter().map(|job| self.run_now(job)).collect()
    }

    pub fn status(&self) -> SchedulerStatus {
        let last_runs = lock(&self.last_runs);
        SchedulerStatus {
            running: self.is_running(),
            jobs: SweepJob::ALL
                .into_iter()
                .map(|job| JobStatus {
                    job,
                    schedule: job.schedule(),
                    interval_secs: job.interval().as_secs(),
                    last_run: last_runs.get(job.name()).cloned(),
                })
                .collect(),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::tests::fixture;

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let fx = fixture();
        let scheduler = Scheduler::new(Arc::clone(&fx.sweeps), fx.clock.clone());
        assert!(!scheduler.stop());
        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());
        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.is_running());
    }

    #[test]
    fn manual_runs_show_up_in_status() {
        let fx = fixture();
        let scheduler = Scheduler::new(Arc::clone(&fx.sweeps), fx.clock.clone());
        let report = scheduler.run_now(SweepJob::Dormant);
        assert_eq!(report.job, SweepJob::Dormant);

        let status = scheduler.status();
        assert!(!status.running);
        assert_eq!(status.jobs.len(), SweepJob::ALL.len());
        let dormant = status
            .jobs
            .iter()
            .find(|job| job.job == SweepJob::Dormant)
            .expect("listed");
        assert_eq!(dormant.last_run.as_ref().map(|run| run.at), Some(fx.ctx.now()));
        assert!(status
            .jobs
            .iter()
            .filter(|job| job.job != SweepJob::Dormant)
            .all(|job| job.last_run.is_none()));
    }
}
