//! The deal pipeline: bill, CWC request, case, bid, and the funded transaction.

pub mod bid;
pub mod bill;
pub mod case;
pub mod router;
pub mod service;
pub mod transaction;

pub use bid::{Bid, BidEvent, BidStatus, Negotiation, Terms};
pub use bill::{Bill, BillEvent, BillStatus, CwcEvent, CwcRequest, CwcStatus};
pub use case::{
    Case, CaseEvent, CaseStatus, CommercialSnapshot, NbfcShare, Sanction, ShareResponse,
};
pub use router::deal_router;
pub use service::{
    CounterOffer, DealService, DisbursementStep, NewBid, NewBill, NewCwc,
};
pub use transaction::{
    total_due, DisbursementStatus, OverdueCheck, RepaymentStatus, Transaction, TransactionEvent,
    TransactionStatus,
};
