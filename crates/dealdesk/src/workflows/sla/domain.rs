use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::policy::SLA_MILESTONE_DAYS;
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaSubjectKind {
    Onboarding,
    Bill,
    Cwc,
    Case,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSubject {
    pub kind: SlaSubjectKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    Pending,
    Overdue,
    Completed,
    CompletedLate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub index: usize,
    pub due_in_days: i64,
    pub deadline: DateTime<Utc>,
    pub status: MilestoneStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn is_open(&self) -> bool {
        matches!(self.status, MilestoneStatus::Pending | MilestoneStatus::Overdue)
    }

    /// On time or late against the fixed deadline, never against a later "now".
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = if at <= self.deadline {
            MilestoneStatus::Completed
        } else {
            MilestoneStatus::CompletedLate
        };
        self.completed_at = Some(at);
    }
}

/// Ordered so the sweep can only move an Sla up the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaStatus {
    Active,
    #[serde(rename = "REMINDER_1_SENT")]
    Reminder1Sent,
    #[serde(rename = "REMINDER_2_SENT")]
    Reminder2Sent,
    Escalated,
    Dormant,
    Completed,
}

impl SlaStatus {
    /// Ladder rung reached once `overdue` milestones have been missed.
    pub fn for_overdue_count(overdue: usize) -> Self {
        match overdue {
            0 => Self::Active,
            1 => Self::Reminder1Sent,
            2 => Self::Reminder2Sent,
            3 => Self::Escalated,
            _ => Self::Dormant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaEvent {
    Climb(SlaStatus),
    Complete,
}

impl StateMachine for SlaStatus {
    type Event = SlaEvent;

    fn next(self, event: SlaEvent) -> Option<Self> {
        if self.is_terminal() {
            return None;
        }
        match event {
            SlaEvent::Climb(target) if target > self && target != Self::Completed => Some(target),
            SlaEvent::Complete => Some(Self::Completed),
            SlaEvent::Climb(_) => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Reminder1Sent => "REMINDER_1_SENT",
            Self::Reminder2Sent => "REMINDER_2_SENT",
            Self::Escalated => "ESCALATED",
            Self::Dormant => "DORMANT",
            Self::Completed => "COMPLETED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Dormant | Self::Completed)
    }
}

/// Fixed-offset milestone tracker for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sla {
    pub id: String,
    pub subject: SlaSubject,
    pub recipient: String,
    pub milestones: Vec<Milestone>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<SlaStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Sla, "sla");

impl Sla {
    pub fn new(
        id: String,
        subject: SlaSubject,
        recipient: &str,
        by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let milestones = SLA_MILESTONE_DAYS
            .iter()
            .enumerate()
            .map(|(index, days)| Milestone {
                index,
                due_in_days: *days,
                deadline: created_at + Duration::days(*days),
                status: MilestoneStatus::Pending,
                completed_at: None,
            })
            .collect();
        Self {
            id,
            subject,
            recipient: recipient.to_string(),
            milestones,
            lifecycle: Lifecycle::new(SlaStatus::Active, by, created_at, None),
            created_at,
            updated_at: created_at,
            revision: 0,
        }
    }

    pub fn status(&self) -> SlaStatus {
        self.lifecycle.status()
    }

    pub fn is_open(&self) -> bool {
        !self.status().is_terminal()
    }

    /// Flips every pending milestone past its deadline to overdue and returns their indexes.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Vec<usize> {
        let mut flipped = Vec::new();
        for milestone in &mut self.milestones {
            if milestone.status == MilestoneStatus::Pending && now > milestone.deadline {
                milestone.status = MilestoneStatus::Overdue;
                flipped.push(milestone.index);
            }
        }
        if !flipped.is_empty() {
            self.updated_at = now;
        }
        flipped
    }

    pub fn overdue_count(&self) -> usize {
        self.milestones
            .iter()
            .filter(|milestone| {
                matches!(
                    milestone.status,
                    MilestoneStatus::Overdue | MilestoneStatus::CompletedLate
                )
            })
            .count()
    }

    /// Moves the status up to the rung implied by missed milestones. Never moves down.
    pub fn climb(&mut self, by: &str, at: DateTime<Utc>) -> Result<Option<SlaStatus>, DomainError> {
        let overdue = self.overdue_count();
        let target = SlaStatus::for_overdue_count(overdue).max(self.status());
        if target == self.status() || !self.is_open() {
            return Ok(None);
        }
        let status = self.lifecycle.advance(
            ("sla", &self.id),
            SlaEvent::Climb(target),
            by,
            at,
            Some(format!("{overdue} milestone(s) overdue")),
        )?;
        Ok(Some(status))
    }

    /// Completes the earliest open milestone, returning its index.
    pub fn complete_next(&mut self, at: DateTime<Utc>) -> Option<usize> {
        let milestone = self.milestones.iter_mut().find(|milestone| milestone.is_open())?;
        milestone.complete(at);
        self.updated_at = at;
        Some(milestone.index)
    }

    pub fn close(&mut self, by: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.complete_next(at);
        self.lifecycle
            .advance(("sla", &self.id), SlaEvent::Complete, by, at, None)?;
        self.updated_at = at;
        Ok(())
    }
}

/// One record per missed milestone. The id is derived from the Sla and milestone so a re-run
/// sweep collides instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaEscalation {
    pub id: String,
    pub sla_id: String,
    pub subject: SlaSubject,
    pub milestone_index: usize,
    pub deadline: DateTime<Utc>,
    pub escalated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(SlaEscalation, "sla_escalation");

impl SlaEscalation {
    pub fn key(sla_id: &str, milestone_index: usize) -> String {
        format!("{sla_id}-m{milestone_index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sla(at: DateTime<Utc>) -> Sla {
        Sla::new(
            "sla-1".to_string(),
            SlaSubject {
                kind: SlaSubjectKind::Bill,
                id: "bill-1".to_string(),
            },
            "ops",
            "ops-1",
            at,
        )
    }

    #[test]
    fn deadlines_are_fixed_offsets_from_creation() {
        let at = Utc::now();
        let sla = sla(at);
        let offsets: Vec<i64> = sla
            .milestones
            .iter()
            .map(|m| (m.deadline - at).num_days())
            .collect();
        assert_eq!(offsets, vec![3, 7, 10, 14]);
    }

    #[test]
    fn ladder_only_climbs() {
        let at = Utc::now();
        let mut sla = sla(at);
        assert_eq!(sla.mark_overdue(at + Duration::days(8)), vec![0, 1]);
        assert_eq!(
            sla.climb("scheduler", at + Duration::days(8)).expect("climb"),
            Some(SlaStatus::Reminder2Sent)
        );
        assert_eq!(sla.climb("scheduler", at).expect("no-op"), None);
        assert_eq!(
            SlaStatus::Escalated.next(SlaEvent::Climb(SlaStatus::Reminder1Sent)),
            None
        );
    }

    #[test]
    fn completion_compares_against_the_deadline() {
        let at = Utc::now();
        let mut sla = sla(at);
        sla.complete_next(at + Duration::days(3));
        sla.mark_overdue(at + Duration::days(9));
        sla.complete_next(at + Duration::days(9));
        assert_eq!(sla.milestones[0].status, MilestoneStatus::Completed);
        assert_eq!(sla.milestones[1].status, MilestoneStatus::CompletedLate);
        assert_eq!(sla.milestones[2].status, MilestoneStatus::Pending);
    }
}
