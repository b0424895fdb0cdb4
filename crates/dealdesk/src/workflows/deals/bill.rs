use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::ports::StoredDocument;
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Uploaded,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillEvent {
    Verify,
    Reject,
}

impl StateMachine for BillStatus {
    type Event = BillEvent;

    fn next(self, event: BillEvent) -> Option<Self> {
        match (self, event) {
            (Self::Uploaded, BillEvent::Verify) => Some(Self::Verified),
            (Self::Uploaded, BillEvent::Reject) => Some(Self::Rejected),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Uploaded => "UPLOADED",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Invoice raised by a seller against a buyer, backed by an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub sub_contractor_id: String,
    pub company_id: String,
    pub invoice_number: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub document: StoredDocument,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<BillStatus>,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Bill, "bill");

impl Bill {
    pub fn status(&self) -> BillStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: BillEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<BillStatus, DomainError> {
        let status = self.lifecycle.advance(("bill", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CwcStatus {
    Submitted,
    CaseCreated,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwcEvent {
    CreateCase,
    Reject,
}

impl StateMachine for CwcStatus {
    type Event = CwcEvent;

    fn next(self, event: CwcEvent) -> Option<Self> {
        match (self, event) {
            (Self::Submitted, CwcEvent::CreateCase) => Some(Self::CaseCreated),
            (Self::Submitted, CwcEvent::Reject) => Some(Self::Rejected),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::CaseCreated => "CASE_CREATED",
            Self::Rejected => "REJECTED",
        }
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Submitted)
    }
}

/// Seller's request to discount a verified bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CwcRequest {
    pub id: String,
    pub bill_id: String,
    pub sub_contractor_id: String,
    pub company_id: String,
    pub amount: f64,
    pub duration_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<CwcStatus>,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(CwcRequest, "cwc_request");

impl CwcRequest {
    pub fn status(&self) -> CwcStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: CwcEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<CwcStatus, DomainError> {
        let status = self
            .lifecycle
            .advance(("cwc_request", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_is_decided_once() {
        assert_eq!(BillStatus::Uploaded.next(BillEvent::Verify), Some(BillStatus::Verified));
        assert_eq!(BillStatus::Verified.next(BillEvent::Reject), None);
        assert_eq!(BillStatus::Rejected.next(BillEvent::Verify), None);
    }

    #[test]
    fn cwc_leaves_submitted_exactly_once() {
        assert_eq!(
            CwcStatus::Submitted.next(CwcEvent::CreateCase),
            Some(CwcStatus::CaseCreated)
        );
        assert_eq!(CwcStatus::CaseCreated.next(CwcEvent::Reject), None);
        assert!(CwcStatus::Rejected.is_terminal());
    }
}
