use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::onboarding::RiskCategory;
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    ReadyForCompanyReview,
    EpcVerified,
    EpcRejected,
    RmtApproved,
    RmtRejected,
    BidPlaced,
    NegotiationInProgress,
    CommercialLocked,
    SharedWithNbfc,
    NbfcSanctioned,
    Funded,
    Closed,
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseEvent {
    EpcVerify,
    EpcReject,
    RmtApprove,
    RmtReject,
    PlaceBid,
    Negotiate,
    Lock,
    ReopenBidding,
    ShareWithNbfc,
    Sanction,
    Fund,
    Close,
    Default,
}

impl StateMachine for CaseStatus {
    type Event = CaseEvent;

    fn next(self, event: CaseEvent) -> Option<Self> {
        use CaseEvent as E;
        use CaseStatus as S;
        match (self, event) {
            (S::ReadyForCompanyReview, E::EpcVerify) => Some(S::EpcVerified),
            (S::ReadyForCompanyReview, E::EpcReject) => Some(S::EpcRejected),
            (S::EpcVerified, E::RmtApprove) => Some(S::RmtApproved),
            (S::EpcVerified, E::RmtReject) => Some(S::RmtRejected),
            (S::EpcVerified | S::RmtApproved, E::PlaceBid) => Some(S::BidPlaced),
            (S::BidPlaced, E::Negotiate) => Some(S::NegotiationInProgress),
            (S::BidPlaced | S::NegotiationInProgress, E::Lock) => Some(S::CommercialLocked),
            (S::BidPlaced | S::NegotiationInProgress, E::ReopenBidding) => Some(S::EpcVerified),
            (S::CommercialLocked, E::ShareWithNbfc) => Some(S::SharedWithNbfc),
            (S::SharedWithNbfc, E::Sanction) => Some(S::NbfcSanctioned),
            (S::NbfcSanctioned, E::Fund) => Some(S::Funded),
            (S::Funded, E::Close) => Some(S::Closed),
            (S::Funded, E::Default) => Some(S::Defaulted),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ReadyForCompanyReview => "READY_FOR_COMPANY_REVIEW",
            Self::EpcVerified => "EPC_VERIFIED",
            Self::EpcRejected => "EPC_REJECTED",
            Self::RmtApproved => "RMT_APPROVED",
            Self::RmtRejected => "RMT_REJECTED",
            Self::BidPlaced => "BID_PLACED",
            Self::NegotiationInProgress => "NEGOTIATION_IN_PROGRESS",
            Self::CommercialLocked => "COMMERCIAL_LOCKED",
            Self::SharedWithNbfc => "SHARED_WITH_NBFC",
            Self::NbfcSanctioned => "NBFC_SANCTIONED",
            Self::Funded => "FUNDED",
            Self::Closed => "CLOSED",
            Self::Defaulted => "DEFAULTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::EpcRejected | Self::RmtRejected | Self::Closed | Self::Defaulted
        )
    }
}

/// Terms frozen at commercial lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommercialSnapshot {
    pub bid_id: String,
    pub amount: f64,
    pub duration_days: u32,
    pub locked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareResponse {
    Pending,
    Approved,
    Declined,
}

/// A lender the locked case was offered to, and what it said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NbfcShare {
    pub nbfc_id: String,
    pub shared_at: DateTime<Utc>,
    pub response: ShareResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sanction {
    pub nbfc_id: String,
    pub interest_rate: f64,
    pub sanctioned_at: DateTime<Utc>,
}

/// One bill financed for one seller against one buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub cwc_id: String,
    pub bill_id: String,
    pub sub_contractor_id: String,
    pub company_id: String,
    pub requested_amount: f64,
    pub requested_duration_days: u32,
    pub risk_category: Option<RiskCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_snapshot: Option<CommercialSnapshot>,
    #[serde(default)]
    pub nbfc_shares: Vec<NbfcShare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanction: Option<Sanction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<CaseStatus>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Case, "case");

impl Case {
    pub fn status(&self) -> CaseStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: CaseEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<CaseStatus, DomainError> {
        let status = self.lifecycle.advance(("case", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }

    pub fn ensure(&self, event: CaseEvent) -> Result<CaseStatus, DomainError> {
        self.lifecycle
            .check(event)
            .map_err(|rejected| rejected.conflict("case", &self.id))
    }

    /// Freezes the commercial terms. A snapshot, once written, is never replaced.
    pub fn lock_commercial(
        &mut self,
        snapshot: CommercialSnapshot,
        by: &str,
    ) -> Result<(), DomainError> {
        if self.commercial_snapshot.is_some() {
            return Err(DomainError::StateConflict {
                entity: "case",
                id: self.id.clone(),
                current: self.status().label(),
                attempted: "Lock".to_string(),
            });
        }
        let at = snapshot.locked_at;
        self.transition(
            CaseEvent::Lock,
            by,
            at,
            Some(format!("bid {} locked", snapshot.bid_id)),
        )?;
        self.commercial_snapshot = Some(snapshot);
        Ok(())
    }

    /// Amount the funding gates and lenders look at: the locked amount once there is one.
    pub fn deal_amount(&self) -> f64 {
        self.commercial_snapshot
            .as_ref()
            .map_or(self.requested_amount, |snapshot| snapshot.amount)
    }

    pub fn share_for(&self, nbfc_id: &str) -> Option<&NbfcShare> {
        self.nbfc_shares.iter().find(|share| share.nbfc_id == nbfc_id)
    }
}
