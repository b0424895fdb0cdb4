use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Actors that can act on the pipeline. External parties and internal staff share one enum so
/// approval chains and route guards can compare roles directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sales,
    Ops,
    OpsManager,
    Rmt,
    Founder,
    Admin,
    Epc,
    SubContractor,
    Nbfc,
    System,
}

impl Role {
    pub const fn ordered() -> [Self; 10] {
        [
            Self::Sales,
            Self::Ops,
            Self::OpsManager,
            Self::Rmt,
            Self::Founder,
            Self::Admin,
            Self::Epc,
            Self::SubContractor,
            Self::Nbfc,
            Self::System,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Ops => "ops",
            Self::OpsManager => "ops_manager",
            Self::Rmt => "rmt",
            Self::Founder => "founder",
            Self::Admin => "admin",
            Self::Epc => "epc",
            Self::SubContractor => "sub_contractor",
            Self::Nbfc => "nbfc",
            Self::System => "system",
        }
    }

    /// Roles allowed to sign off on any approval level.
    pub const fn has_override(self) -> bool {
        matches!(self, Self::Admin | Self::Founder)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|role| role.label() == normalized)
            .ok_or(UnknownRole(normalized))
    }
}

/// Authenticated caller as resolved by the identity adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Identity used by scheduled sweeps.
    pub fn system() -> Self {
        Self::new("scheduler", Role::System)
    }

    /// Passes when the caller holds one of `allowed` or an admin/founder override.
    pub fn require(&self, allowed: &[Role], action: &str) -> Result<(), DomainError> {
        if self.role.has_override() {
            return Ok(());
        }
        self.require_exact(allowed, action)
    }

    /// Like [`Principal::require`] without the override.
    pub fn require_exact(&self, allowed: &[Role], action: &str) -> Result<(), DomainError> {
        if allowed.contains(&self.role) {
            return Ok(());
        }
        Err(DomainError::Authorization {
            actor: self.id.clone(),
            role: self.role,
            required: allowed
                .iter()
                .map(|role| role.label())
                .collect::<Vec<_>>()
                .join(" | "),
            action: action.to_string(),
        })
    }
}

static ENTITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id(prefix: &str) -> String {
    let id = ENTITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Time source so sweeps and deadlines can be exercised deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for demos and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = at,
            Err(poisoned) => *poisoned.into_inner() = at,
        }
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Whole days elapsed from `from` to `to`, truncated toward zero; negative when `to` precedes
/// `from`.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn partial_days_truncate_toward_zero() {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 6, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(days_between(start, start + Duration::hours(36)), 1);
        assert_eq!(days_between(start, start - Duration::hours(36)), -1);
        assert_eq!(days_between(start, start + Duration::hours(23)), 0);
    }

    #[test]
    fn role_labels_round_trip_through_from_str() {
        for role in Role::ordered() {
            assert_eq!(role.label().parse::<Role>().expect("parses"), role);
        }
        assert!("treasurer".parse::<Role>().is_err());
    }

    #[test]
    fn require_honours_override_but_require_exact_does_not() {
        let founder = Principal::new("f-1", Role::Founder);
        assert!(founder.require(&[Role::Ops], "verify bill").is_ok());
        assert!(matches!(
            founder.require_exact(&[Role::Epc], "review case"),
            Err(DomainError::Authorization { .. })
        ));
    }

    #[test]
    fn fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        clock.advance(Duration::days(3));
        assert_eq!(days_between(start, clock.now()), 3);
    }
}
