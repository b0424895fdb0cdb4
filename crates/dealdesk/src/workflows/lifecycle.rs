//! Status bookkeeping shared by every entity.
//!
//! Each entity status enum implements [`StateMachine`], enumerating its legal edges in a single
//! `next` function. [`Lifecycle`] pairs the current status with its append-only history so the
//! two can never disagree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub trait StateMachine:
    Copy + Eq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Event: Copy + fmt::Debug;

    /// Target status for `event`, or `None` when the edge does not exist.
    fn next(self, event: Self::Event) -> Option<Self>;

    fn label(self) -> &'static str;

    fn is_terminal(self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry<S> {
    pub status: S,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle<S> {
    status: S,
    status_history: Vec<StatusEntry<S>>,
}

/// Refused edge, converted into a [`DomainError::StateConflict`] by the owning entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRejected {
    pub current: &'static str,
    pub attempted: String,
}

impl TransitionRejected {
    pub fn conflict(self, entity: &'static str, id: &str) -> DomainError {
        DomainError::StateConflict {
            entity,
            id: id.to_string(),
            current: self.current,
            attempted: self.attempted,
        }
    }
}

impl<S: StateMachine> Lifecycle<S> {
    pub fn new(initial: S, by: &str, at: DateTime<Utc>, notes: Option<String>) -> Self {
        Self {
            status: initial,
            status_history: vec![StatusEntry {
                status: initial,
                changed_at: at,
                changed_by: by.to_string(),
                notes,
            }],
        }
    }

    pub fn status(&self) -> S {
        self.status
    }

    pub fn history(&self) -> &[StatusEntry<S>] {
        &self.status_history
    }

    /// Validates `event` against the current status without recording anything.
    pub fn check(&self, event: S::Event) -> Result<S, TransitionRejected> {
        self.status.next(event).ok_or_else(|| TransitionRejected {
            current: self.status.label(),
            attempted: format!("{event:?}"),
        })
    }

    pub fn apply(
        &mut self,
        event: S::Event,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<S, TransitionRejected> {
        let next = self.check(event)?;
        self.status = next;
        self.status_history.push(StatusEntry {
            status: next,
            changed_at: at,
            changed_by: by.to_string(),
            notes,
        });
        Ok(next)
    }

    /// [`Lifecycle::apply`] with a refusal reported against the owning record.
    pub fn advance(
        &mut self,
        owner: (&'static str, &str),
        event: S::Event,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<S, DomainError> {
        let (entity, id) = owner;
        self.apply(event, by, at, notes)
            .map_err(|rejected| rejected.conflict(entity, id))
    }

    pub fn last_changed_at(&self) -> Option<DateTime<Utc>> {
        self.status_history.last().map(|entry| entry.changed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    enum Door {
        Open,
        Closed,
    }

    #[derive(Debug, Clone, Copy)]
    enum Push {
        Close,
        Open,
    }

    impl StateMachine for Door {
        type Event = Push;

        fn next(self, event: Push) -> Option<Self> {
            match (self, event) {
                (Door::Open, Push::Close) => Some(Door::Closed),
                (Door::Closed, Push::Open) => Some(Door::Open),
                _ => None,
            }
        }

        fn label(self) -> &'static str {
            match self {
                Door::Open => "OPEN",
                Door::Closed => "CLOSED",
            }
        }
    }

    #[test]
    fn history_is_append_only_and_tracks_status() {
        let at = Utc::now();
        let mut lifecycle = Lifecycle::new(Door::Open, "ops-1", at, None);
        lifecycle
            .apply(Push::Close, "ops-1", at, Some("night".to_string()))
            .expect("open -> closed");

        assert_eq!(lifecycle.status(), Door::Closed);
        assert_eq!(lifecycle.history().len(), 2);
        assert_eq!(
            lifecycle.history().last().map(|entry| entry.status),
            Some(lifecycle.status())
        );
    }

    #[test]
    fn refused_edge_leaves_history_untouched() {
        let at = Utc::now();
        let mut lifecycle = Lifecycle::new(Door::Open, "ops-1", at, None);
        let rejected = lifecycle
            .apply(Push::Open, "ops-1", at, None)
            .expect_err("already open");

        assert_eq!(rejected.current, "OPEN");
        assert_eq!(rejected.attempted, "Open");
        assert_eq!(lifecycle.history().len(), 1);
    }
}
