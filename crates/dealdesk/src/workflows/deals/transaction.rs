use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::common::days_between;
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::policy::RECOURSE_THRESHOLD_DAYS;
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Created,
    EscrowReady,
    Disbursing,
    Disbursed,
    PartiallyRepaid,
    Overdue,
    Closed,
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    SetupEscrow,
    InitiateDisbursement,
    CompleteDisbursement,
    FailDisbursement,
    ReceivePartial,
    MarkOverdue,
    Settle,
    Default,
}

impl StateMachine for TransactionStatus {
    type Event = TransactionEvent;

    fn next(self, event: TransactionEvent) -> Option<Self> {
        use TransactionEvent as E;
        use TransactionStatus as S;
        match (self, event) {
            (S::Created, E::SetupEscrow) => Some(S::EscrowReady),
            (S::EscrowReady, E::InitiateDisbursement) => Some(S::Disbursing),
            (S::Disbursing, E::CompleteDisbursement) => Some(S::Disbursed),
            (S::Disbursing, E::FailDisbursement) => Some(S::EscrowReady),
            (S::Disbursed, E::ReceivePartial) => Some(S::PartiallyRepaid),
            (S::Disbursed | S::PartiallyRepaid, E::MarkOverdue) => Some(S::Overdue),
            (S::Disbursed | S::PartiallyRepaid | S::Overdue, E::Settle) => Some(S::Closed),
            (S::Overdue, E::Default) => Some(S::Defaulted),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::EscrowReady => "ESCROW_READY",
            Self::Disbursing => "DISBURSING",
            Self::Disbursed => "DISBURSED",
            Self::PartiallyRepaid => "PARTIALLY_REPAID",
            Self::Overdue => "OVERDUE",
            Self::Closed => "CLOSED",
            Self::Defaulted => "DEFAULTED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Defaulted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Escrow {
    pub tra_setup: bool,
    pub account_reference: Option<String>,
    pub setup_at: Option<DateTime<Utc>>,
    pub setup_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisbursementStatus {
    Pending,
    Initiated,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub status: DisbursementStatus,
    pub reference: Option<String>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentStatus {
    Pending,
    Partial,
    Completed,
    Overdue,
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: f64,
    pub reference: Option<String>,
    pub received_at: DateTime<Utc>,
    pub recorded_by: String,
}

/// Money owed back and the notice bookkeeping the overdue sweeps rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repayment {
    pub status: RepaymentStatus,
    pub total_due: f64,
    pub received: f64,
    pub payments: Vec<Payment>,
    pub due_date: Option<DateTime<Utc>>,
    pub overdue_by: i64,
    pub reminder_sent: bool,
    pub last_overdue_notice: Option<NaiveDate>,
    pub critical_notified: bool,
}

impl Repayment {
    pub fn outstanding(&self) -> f64 {
        (self.total_due - self.received).max(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recourse {
    pub triggered: bool,
    pub against: String,
    pub triggered_at: Option<DateTime<Utc>>,
    pub days_overdue: Option<i64>,
}

/// Principal plus simple interest for the tenor, rounded to the rupee.
pub fn total_due(principal: f64, annual_rate_pct: f64, tenor_days: u32) -> f64 {
    principal + (principal * annual_rate_pct * f64::from(tenor_days) / 36_500.0).round()
}

/// Outcome of one overdue evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverdueCheck {
    pub overdue: bool,
    pub days_overdue: i64,
    pub recourse_triggered: bool,
}

/// The funded instrument tying case, bid, seller, buyer and lender together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub case_id: String,
    pub bid_id: String,
    pub sub_contractor_id: String,
    pub company_id: String,
    pub nbfc_id: String,
    pub principal_amount: f64,
    pub interest_rate: f64,
    pub tenor_days: u32,
    pub escrow: Escrow,
    pub disbursement: Disbursement,
    pub repayment: Repayment,
    pub recourse: Recourse,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<TransactionStatus>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Transaction, "transaction");

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        case_id: &str,
        bid_id: &str,
        sub_contractor_id: &str,
        company_id: &str,
        nbfc_id: &str,
        principal_amount: f64,
        interest_rate: f64,
        tenor_days: u32,
        by: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            case_id: case_id.to_string(),
            bid_id: bid_id.to_string(),
            sub_contractor_id: sub_contractor_id.to_string(),
            company_id: company_id.to_string(),
            nbfc_id: nbfc_id.to_string(),
            principal_amount,
            interest_rate,
            tenor_days,
            escrow: Escrow::default(),
            disbursement: Disbursement {
                status: DisbursementStatus::Pending,
                reference: None,
                initiated_at: None,
                disbursed_at: None,
                failure_reason: None,
            },
            repayment: Repayment {
                status: RepaymentStatus::Pending,
                total_due: total_due(principal_amount, interest_rate, tenor_days),
                received: 0.0,
                payments: Vec::new(),
                due_date: None,
                overdue_by: 0,
                reminder_sent: false,
                last_overdue_notice: None,
                critical_notified: false,
            },
            recourse: Recourse {
                against: sub_contractor_id.to_string(),
                ..Recourse::default()
            },
            lifecycle: Lifecycle::new(TransactionStatus::Created, by, at, None),
            created_by: by.to_string(),
            created_at: at,
            updated_at: at,
            revision: 0,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.lifecycle.status()
    }

    fn transition(
        &mut self,
        event: TransactionEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<TransactionStatus, DomainError> {
        let status = self
            .lifecycle
            .advance(("transaction", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }

    /// Disbursed and not yet settled or written off.
    pub fn awaiting_repayment(&self) -> bool {
        matches!(
            self.status(),
            TransactionStatus::Disbursed
                | TransactionStatus::PartiallyRepaid
                | TransactionStatus::Overdue
        )
    }

    pub fn setup_escrow(
        &mut self,
        account_reference: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if account_reference.trim().is_empty() {
            return Err(DomainError::validation("escrow account reference is required"));
        }
        self.transition(TransactionEvent::SetupEscrow, by, at, None)?;
        self.escrow = Escrow {
            tra_setup: true,
            account_reference: Some(account_reference.trim().to_string()),
            setup_at: Some(at),
            setup_by: Some(by.to_string()),
        };
        Ok(())
    }

    fn require_escrow(&self) -> Result<(), DomainError> {
        if self.escrow.tra_setup {
            return Ok(());
        }
        Err(DomainError::StateConflict {
            entity: "transaction",
            id: self.id.clone(),
            current: self.status().label(),
            attempted: "disbursement without escrow".to_string(),
        })
    }

    pub fn initiate_disbursement(
        &mut self,
        reference: Option<String>,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.require_escrow()?;
        self.transition(TransactionEvent::InitiateDisbursement, by, at, None)?;
        self.disbursement.status = DisbursementStatus::Initiated;
        self.disbursement.reference = reference;
        self.disbursement.initiated_at = Some(at);
        self.disbursement.failure_reason = None;
        Ok(())
    }

    /// Money has left escrow; the repayment clock starts now.
    pub fn complete_disbursement(
        &mut self,
        reference: Option<String>,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.require_escrow()?;
        self.transition(TransactionEvent::CompleteDisbursement, by, at, None)?;
        self.disbursement.status = DisbursementStatus::Completed;
        if reference.is_some() {
            self.disbursement.reference = reference;
        }
        self.disbursement.disbursed_at = Some(at);
        self.repayment.due_date = Some(at + Duration::days(i64::from(self.tenor_days)));
        Ok(())
    }

    pub fn fail_disbursement(
        &mut self,
        reason: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition(
            TransactionEvent::FailDisbursement,
            by,
            at,
            Some(reason.to_string()),
        )?;
        self.disbursement.status = DisbursementStatus::Failed;
        self.disbursement.failure_reason = Some(reason.to_string());
        Ok(())
    }

    /// Adds a payment. Returns true once the cumulative amount covers what is due.
    pub fn record_repayment(
        &mut self,
        amount: f64,
        reference: Option<String>,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DomainError::validation("repayment amount must be positive"));
        }
        if !self.awaiting_repayment() {
            return Err(DomainError::StateConflict {
                entity: "transaction",
                id: self.id.clone(),
                current: self.status().label(),
                attempted: "record repayment".to_string(),
            });
        }
        let received = self.repayment.received + amount;
        let settled = received >= self.repayment.total_due;
        if settled {
            self.transition(
                TransactionEvent::Settle,
                by,
                at,
                Some("repaid in full".to_string()),
            )?;
            self.repayment.status = RepaymentStatus::Completed;
        } else if self.status() == TransactionStatus::Disbursed {
            self.transition(TransactionEvent::ReceivePartial, by, at, None)?;
            self.repayment.status = RepaymentStatus::Partial;
        } else if self.repayment.status == RepaymentStatus::Pending {
            self.repayment.status = RepaymentStatus::Partial;
        }
        self.repayment.received = received;
        self.repayment.payments.push(Payment {
            amount,
            reference,
            received_at: at,
            recorded_by: by.to_string(),
        });
        self.updated_at = at;
        Ok(settled)
    }

    /// Days past the repayment due date, or `None` before disbursement and after settlement.
    pub fn days_overdue(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.awaiting_repayment() {
            return None;
        }
        let due = self.repayment.due_date?;
        (now > due).then(|| days_between(due, now))
    }

    /// Marks the transaction overdue once the tenor has lapsed and triggers recourse against the
    /// seller past the threshold. Recourse, once triggered, stays triggered.
    pub fn evaluate_overdue(
        &mut self,
        now: DateTime<Utc>,
        by: &str,
    ) -> Result<OverdueCheck, DomainError> {
        let Some(days) = self.days_overdue(now) else {
            return Ok(OverdueCheck {
                overdue: false,
                days_overdue: 0,
                recourse_triggered: false,
            });
        };
        if self.status() != TransactionStatus::Overdue {
            self.transition(
                TransactionEvent::MarkOverdue,
                by,
                now,
                Some(format!("{days} day(s) past due")),
            )?;
        }
        self.repayment.status = RepaymentStatus::Overdue;
        self.repayment.overdue_by = days;

        let recourse_triggered = days > RECOURSE_THRESHOLD_DAYS && !self.recourse.triggered;
        if recourse_triggered {
            self.recourse.triggered = true;
            self.recourse.triggered_at = Some(now);
            self.recourse.days_overdue = Some(days);
        }
        self.updated_at = now;
        Ok(OverdueCheck {
            overdue: true,
            days_overdue: days,
            recourse_triggered,
        })
    }

    pub fn mark_default(
        &mut self,
        reason: &str,
        by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition(TransactionEvent::Default, by, at, Some(reason.to_string()))?;
        self.repayment.status = RepaymentStatus::Defaulted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disbursed(days_ago: i64, tenor_days: u32) -> (Transaction, DateTime<Utc>) {
        let now = Utc::now();
        let start = now - Duration::days(days_ago);
        let mut txn = Transaction::new(
            "txn-1".to_string(),
            "case-1",
            "bid-1",
            "sc-1",
            "co-1",
            "nbfc-1",
            1_000_000.0,
            12.0,
            tenor_days,
            "ops-1",
            start,
        );
        txn.setup_escrow("TRA-001", "ops-1", start).expect("escrow");
        txn.initiate_disbursement(None, "ops-1", start).expect("initiate");
        txn.complete_disbursement(Some("UTR-1".to_string()), "ops-1", start)
            .expect("complete");
        (txn, now)
    }

    #[test]
    fn interest_is_simple_and_rounded() {
        assert_eq!(total_due(1_000_000.0, 12.0, 30), 1_009_863.0);
        assert_eq!(total_due(500_000.0, 0.0, 90), 500_000.0);
    }

    #[test]
    fn disbursement_requires_escrow() {
        let mut txn = Transaction::new(
            "txn-2".to_string(),
            "case-1",
            "bid-1",
            "sc-1",
            "co-1",
            "nbfc-1",
            100.0,
            10.0,
            30,
            "ops-1",
            Utc::now(),
        );
        let err = txn
            .complete_disbursement(None, "ops-1", Utc::now())
            .expect_err("no escrow");
        assert!(matches!(err, DomainError::StateConflict { .. }));
        assert_eq!(txn.disbursement.status, DisbursementStatus::Pending);
    }

    #[test]
    fn three_days_overdue_has_no_recourse() {
        let (mut txn, now) = disbursed(10, 7);
        let check = txn.evaluate_overdue(now, "scheduler").expect("evaluate");
        assert_eq!(check.days_overdue, 3);
        assert_eq!(txn.status(), TransactionStatus::Overdue);
        assert!(!txn.recourse.triggered);
    }

    #[test]
    fn fifteen_days_overdue_triggers_recourse_once() {
        let (mut txn, now) = disbursed(22, 7);
        let check = txn.evaluate_overdue(now, "scheduler").expect("evaluate");
        assert_eq!(check.days_overdue, 15);
        assert!(check.recourse_triggered);
        assert!(txn.recourse.triggered);
        assert_eq!(txn.recourse.against, "sc-1");

        let again = txn.evaluate_overdue(now, "scheduler").expect("re-evaluate");
        assert!(!again.recourse_triggered);
        assert_eq!(txn.lifecycle.history().len(), 5);
    }

    #[test]
    fn partial_payments_accumulate_until_settled() {
        let (mut txn, now) = disbursed(1, 30);
        let due = txn.repayment.total_due;
        assert!(!txn
            .record_repayment(due / 2.0, None, "ops-1", now)
            .expect("first half"));
        assert_eq!(txn.status(), TransactionStatus::PartiallyRepaid);
        assert!(txn
            .record_repayment(due / 2.0, None, "ops-1", now)
            .expect("second half"));
        assert_eq!(txn.status(), TransactionStatus::Closed);
        assert_eq!(txn.repayment.status, RepaymentStatus::Completed);
        assert!(txn.record_repayment(1.0, None, "ops-1", now).is_err());
    }
}
