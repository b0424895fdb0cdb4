//! Document store seam. Every write is a per-document compare-and-swap on `revision`, which
//! turns lost-update races into explicit conflicts without cross-document transactions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::DomainError;

pub trait Record: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn revision(&self) -> u64;
    fn set_revision(&mut self, revision: u64);
}

/// Storage abstraction so services can be exercised against in-memory or failing stores.
pub trait Repository<T: Record>: Send + Sync {
    fn insert(&self, record: T) -> Result<T, RepositoryError>;
    fn fetch(&self, id: &str) -> Result<Option<T>, RepositoryError>;
    fn list(&self) -> Result<Vec<T>, RepositoryError>;
    /// Writes `record` when the stored revision still equals `record.revision()`, returning the
    /// stored copy with the bumped revision.
    fn update(&self, record: T) -> Result<T, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{kind} {id} already exists")]
    Conflict { kind: &'static str, id: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} {id} changed concurrently (expected revision {expected}, found {found})")]
    StaleRevision {
        kind: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Loads a record or reports it missing.
pub fn require<T: Record>(repository: &dyn Repository<T>, id: &str) -> Result<T, DomainError> {
    repository
        .fetch(id)?
        .ok_or_else(|| DomainError::not_found(T::KIND, id))
}

pub struct MemoryRepository<T> {
    records: Arc<Mutex<BTreeMap<String, T>>>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl<T> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<T> MemoryRepository<T> {
    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<String, T>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl<T: Record> Repository<T> for MemoryRepository<T> {
    fn insert(&self, mut record: T) -> Result<T, RepositoryError> {
        let mut guard = self.guard()?;
        if guard.contains_key(record.id()) {
            return Err(RepositoryError::Conflict {
                kind: T::KIND,
                id: record.id().to_string(),
            });
        }
        record.set_revision(1);
        guard.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &str) -> Result<Option<T>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self.guard()?.values().cloned().collect())
    }

    fn update(&self, mut record: T) -> Result<T, RepositoryError> {
        let mut guard = self.guard()?;
        let stored = guard
            .get(record.id())
            .ok_or_else(|| RepositoryError::NotFound {
                kind: T::KIND,
                id: record.id().to_string(),
            })?;
        if stored.revision() != record.revision() {
            return Err(RepositoryError::StaleRevision {
                kind: T::KIND,
                id: record.id().to_string(),
                expected: record.revision(),
                found: stored.revision(),
            });
        }
        record.set_revision(record.revision() + 1);
        guard.insert(record.id().to_string(), record.clone());
        Ok(record)
    }
}

/// Implements [`Record`] for a struct with `id: String` and `revision: u64` fields.
macro_rules! record {
    ($ty:ty, $kind:literal) => {
        impl $crate::workflows::store::Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn revision(&self) -> u64 {
                self.revision
            }

            fn set_revision(&mut self, revision: u64) {
                self.revision = revision;
            }
        }
    };
}

pub(crate) use record;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        body: String,
        revision: u64,
    }

    record!(Note, "note");

    fn note(body: &str) -> Note {
        Note {
            id: "note-1".to_string(),
            body: body.to_string(),
            revision: 0,
        }
    }

    #[test]
    fn insert_rejects_duplicates() {
        let repository = MemoryRepository::default();
        repository.insert(note("first")).expect("insert");
        assert!(matches!(
            repository.insert(note("again")),
            Err(RepositoryError::Conflict { kind: "note", .. })
        ));
    }

    #[test]
    fn stale_writer_loses_the_race() {
        let repository = MemoryRepository::default();
        repository.insert(note("first")).expect("insert");

        let mut left = repository.fetch("note-1").expect("fetch").expect("present");
        let mut right = left.clone();

        left.body = "left".to_string();
        let stored = repository.update(left).expect("first writer wins");
        assert_eq!(stored.revision, 2);

        right.body = "right".to_string();
        match repository.update(right) {
            Err(RepositoryError::StaleRevision {
                expected, found, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected stale revision, got {other:?}"),
        }
        let current = require::<Note>(&repository, "note-1").expect("present");
        assert_eq!(current.body, "left");
    }

    #[test]
    fn require_reports_missing_records() {
        let repository: MemoryRepository<Note> = MemoryRepository::default();
        assert!(matches!(
            require::<Note>(&repository, "nope"),
            Err(DomainError::NotFound { entity: "note", .. })
        ));
    }
}
