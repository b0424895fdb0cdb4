//! Outbound collaborators: notification delivery, document storage, and identity.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::common::{next_id, Principal};

/// Outbound notification payload (email, SMS, or chat depending on the adapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub template: String,
    pub recipient: String,
    pub subject_id: String,
    pub details: BTreeMap<String, String>,
}

impl Notice {
    pub fn new(template: &str, recipient: &str, subject_id: &str) -> Self {
        Self {
            template: template.to_string(),
            recipient: recipient.to_string(),
            subject_id: subject_id.to_string(),
            details: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

/// At-most-once, best-effort delivery. Callers never roll back on failure.
pub trait Notifier: Send + Sync {
    fn send(&self, notice: Notice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Sends `notice` and swallows delivery failures after logging them.
pub(crate) fn dispatch(notifier: &dyn Notifier, notice: Notice) {
    let template = notice.template.clone();
    let subject = notice.subject_id.clone();
    if let Err(err) = notifier.send(notice) {
        warn!(%template, %subject, error = %err, "notification dropped");
    }
}

/// Keeps every notice in memory; used by the demo command and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, template: &str) -> usize {
        self.notices()
            .iter()
            .filter(|notice| notice.template == template)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notice: Notice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .map_err(|_| NotifyError::Transport("recorder lock poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

/// Reference to a document held by the storage adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub url: String,
    pub public_id: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

pub trait DocumentStorage: Send + Sync {
    fn upload(&self, content: &[u8], mime: &mime::Mime) -> Result<StoredDocument, StorageError>;
    fn delete(&self, public_id: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("document rejected: {0}")]
    Rejected(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Mime types accepted for invoices and supporting documents.
pub fn accepted_document_type(mime: &mime::Mime) -> bool {
    mime.essence_str() == mime::APPLICATION_PDF.essence_str()
        || mime.type_() == mime::IMAGE
        || (mime.type_() == mime::TEXT && mime.subtype() == mime::CSV)
}

/// In-process storage that keeps uploads in a map.
#[derive(Debug, Default, Clone)]
pub struct MemoryDocumentStorage {
    documents: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryDocumentStorage {
    pub fn contains(&self, public_id: &str) -> bool {
        self.documents
            .lock()
            .map(|guard| guard.contains_key(public_id))
            .unwrap_or(false)
    }
}

impl DocumentStorage for MemoryDocumentStorage {
    fn upload(&self, content: &[u8], mime: &mime::Mime) -> Result<StoredDocument, StorageError> {
        if content.is_empty() {
            return Err(StorageError::Rejected("empty document".to_string()));
        }
        if !accepted_document_type(mime) {
            return Err(StorageError::Rejected(format!("unsupported type {mime}")));
        }

        let public_id = next_id("doc");
        self.documents
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))?
            .insert(public_id.clone(), content.to_vec());

        Ok(StoredDocument {
            url: format!("memory://documents/{public_id}"),
            public_id,
            mime_type: mime.essence_str().to_string(),
            size_bytes: content.len(),
        })
    }

    fn delete(&self, public_id: &str) -> Result<(), StorageError> {
        self.documents
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))?
            .remove(public_id);
        Ok(())
    }
}

/// Resolves bearer tokens into principals.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("token not recognised")]
    InvalidToken,
}
