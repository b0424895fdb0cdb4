//! Lifetime fraud registry keyed by PAN, GSTIN, and email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::store::{record, Repository};

/// Identifiers the gate matches on. Construct through [`Identity::new`] so values are normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn clean(value: Option<&str>, lower: bool) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(if lower {
        trimmed.to_lowercase()
    } else {
        trimmed.to_uppercase()
    })
}

impl Identity {
    pub fn new(pan: Option<&str>, gstin: Option<&str>, email: Option<&str>) -> Self {
        Self {
            pan: clean(pan, false),
            gstin: clean(gstin, false),
            email: clean(email, true),
        }
    }

    pub fn normalized(&self) -> Self {
        Self::new(self.pan.as_deref(), self.gstin.as_deref(), self.email.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.pan.is_none() && self.gstin.is_none() && self.email.is_none()
    }

    /// First identifier shared with `other`, if any.
    pub fn overlap(&self, other: &Identity) -> Option<&'static str> {
        let same = |left: &Option<String>, right: &Option<String>| {
            matches!((left, right), (Some(left), Some(right)) if left == right)
        };
        if same(&self.pan, &other.pan) {
            Some("pan")
        } else if same(&self.gstin, &other.gstin) {
            Some("gstin")
        } else if same(&self.email, &other.email) {
            Some("email")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlacklistStatus {
    PendingApproval,
    Active,
    Revoked,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistEvent {
    Approve,
    Reject,
    Revoke,
}

impl StateMachine for BlacklistStatus {
    type Event = BlacklistEvent;

    fn next(self, event: BlacklistEvent) -> Option<Self> {
        match (self, event) {
            (Self::PendingApproval, BlacklistEvent::Approve) => Some(Self::Active),
            (Self::PendingApproval, BlacklistEvent::Reject) => Some(Self::Rejected),
            (Self::Active, BlacklistEvent::Revoke) => Some(Self::Revoked),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
            Self::Rejected => "REJECTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Revoked | Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListedParty {
    SubContractor,
    Company,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedSubject {
    pub party: ListedParty,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_by: String,
    pub revoked_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: String,
    pub identity: Identity,
    pub reason: String,
    pub reported_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<ListedSubject>,
    pub approval_id: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<BlacklistStatus>,
    pub revocation: Option<Revocation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(BlacklistEntry, "blacklist_entry");

impl BlacklistEntry {
    pub fn status(&self) -> BlacklistStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: BlacklistEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<BlacklistStatus, DomainError> {
        let status = self
            .lifecycle
            .advance(("blacklist_entry", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }

    pub fn revoke(&mut self, by: &str, at: DateTime<Utc>, reason: &str) -> Result<(), DomainError> {
        if reason.trim().is_empty() {
            return Err(DomainError::validation("revocation requires a reason"));
        }
        self.transition(BlacklistEvent::Revoke, by, at, Some(reason.to_string()))?;
        self.revocation = Some(Revocation {
            revoked_by: by.to_string(),
            revoked_at: at,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

/// First active entry sharing any identifier with `identity`.
pub fn find_active_match(
    entries: &dyn Repository<BlacklistEntry>,
    identity: &Identity,
) -> Result<Option<(BlacklistEntry, &'static str)>, DomainError> {
    let probe = identity.normalized();
    if probe.is_empty() {
        return Ok(None);
    }
    Ok(entries
        .list()?
        .into_iter()
        .filter(|entry| entry.status() == BlacklistStatus::Active)
        .find_map(|entry| {
            let matched_on = entry.identity.overlap(&probe)?;
            Some((entry, matched_on))
        }))
}

/// Refuses activation for an identity on the active blacklist.
pub fn ensure_clear(
    entries: &dyn Repository<BlacklistEntry>,
    identity: &Identity,
) -> Result<(), DomainError> {
    match find_active_match(entries, identity)? {
        Some((entry, matched_on)) => Err(DomainError::Blacklisted {
            entry_id: entry.id,
            matched_on,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::store::MemoryRepository;

    fn entry(id: &str, identity: Identity, activate: bool) -> BlacklistEntry {
        let at = Utc::now();
        let mut entry = BlacklistEntry {
            id: id.to_string(),
            identity,
            reason: "forged invoices".to_string(),
            reported_by: "ops-1".to_string(),
            subject: None,
            approval_id: None,
            lifecycle: Lifecycle::new(BlacklistStatus::PendingApproval, "ops-1", at, None),
            revocation: None,
            created_at: at,
            updated_at: at,
            revision: 0,
        };
        if activate {
            entry
                .transition(BlacklistEvent::Approve, "om-1", at, None)
                .expect("pending -> active");
        }
        entry
    }

    #[test]
    fn identifiers_are_normalized() {
        let identity = Identity::new(Some(" abcde1234f "), Some("27aaacr5055k1z5"), Some("Ops@Seller.IN "));
        assert_eq!(identity.pan.as_deref(), Some("ABCDE1234F"));
        assert_eq!(identity.gstin.as_deref(), Some("27AAACR5055K1Z5"));
        assert_eq!(identity.email.as_deref(), Some("ops@seller.in"));
        assert!(Identity::new(Some("  "), None, None).is_empty());
    }

    #[test]
    fn matches_any_identifier_on_active_entries_only() {
        let entries = MemoryRepository::default();
        entries
            .insert(entry("bl-pending", Identity::new(Some("PAN1"), None, None), false))
            .expect("insert");
        entries
            .insert(entry("bl-active", Identity::new(None, None, Some("fraud@x.in")), true))
            .expect("insert");

        let by_pan = Identity::new(Some("pan1"), None, None);
        assert!(find_active_match(&entries, &by_pan).expect("lookup").is_none());

        let by_email = Identity::new(Some("other"), None, Some("FRAUD@x.in"));
        let (found, matched_on) = find_active_match(&entries, &by_email)
            .expect("lookup")
            .expect("match");
        assert_eq!(found.id, "bl-active");
        assert_eq!(matched_on, "email");

        assert!(matches!(
            ensure_clear(&entries, &by_email),
            Err(DomainError::Blacklisted { .. })
        ));
    }

    #[test]
    fn revocation_requires_active_entry_and_reason() {
        let at = Utc::now();
        let mut pending = entry("bl-1", Identity::new(Some("PAN2"), None, None), false);
        assert!(matches!(
            pending.revoke("om-1", at, "cleared"),
            Err(DomainError::StateConflict { .. })
        ));

        let mut active = entry("bl-2", Identity::new(Some("PAN3"), None, None), true);
        assert!(active.revoke("om-1", at, " ").is_err());
        active.revoke("om-1", at, "court order").expect("revoke");
        assert_eq!(active.status(), BlacklistStatus::Revoked);
        assert_eq!(
            active.revocation.as_ref().map(|r| r.revoked_by.as_str()),
            Some("om-1")
        );
    }
}
