use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::common::{Principal, Role};
use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Submitted,
    NegotiationInProgress,
    Accepted,
    Rejected,
    CommercialLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidEvent {
    Counter,
    Accept,
    Reject,
    Lock,
}

impl StateMachine for BidStatus {
    type Event = BidEvent;

    fn next(self, event: BidEvent) -> Option<Self> {
        use BidEvent as E;
        use BidStatus as S;
        match (self, event) {
            (S::Submitted | S::NegotiationInProgress, E::Counter) => Some(S::NegotiationInProgress),
            (S::Submitted | S::NegotiationInProgress, E::Accept) => Some(S::Accepted),
            (S::Submitted | S::NegotiationInProgress, E::Reject) => Some(S::Rejected),
            (S::Submitted | S::NegotiationInProgress | S::Accepted, E::Lock) => {
                Some(S::CommercialLocked)
            }
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::NegotiationInProgress => "NEGOTIATION_IN_PROGRESS",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::CommercialLocked => "COMMERCIAL_LOCKED",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::CommercialLocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    pub amount: f64,
    pub duration_days: u32,
}

impl Terms {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if self.duration_days == 0 {
            return Err(DomainError::validation("duration must be at least one day"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    #[serde(flatten)]
    pub terms: Terms,
    pub proposed_by: String,
    pub proposed_by_role: Role,
    pub proposed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The buyer's funding offer on a case and the counter-offers that followed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub case_id: String,
    pub company_id: String,
    pub sub_contractor_id: String,
    #[serde(flatten)]
    pub offer: Terms,
    #[serde(default)]
    pub negotiations: Vec<Negotiation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_terms: Option<Terms>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<BidStatus>,
    pub placed_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Bid, "bid");

impl Bid {
    pub fn status(&self) -> BidStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: BidEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<BidStatus, DomainError> {
        let status = self.lifecycle.advance(("bid", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }

    /// Role that made the standing offer. The original bid always comes from the buyer.
    pub fn last_proposer(&self) -> Role {
        self.negotiations
            .last()
            .map_or(Role::Epc, |entry| entry.proposed_by_role)
    }

    /// Terms currently on the table.
    pub fn standing_terms(&self) -> Terms {
        self.negotiations
            .last()
            .map_or(self.offer, |entry| entry.terms)
    }

    /// Appends a counter-offer. Buyer and seller take turns.
    pub fn counter(
        &mut self,
        proposer: &Principal,
        terms: Terms,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        terms.validate()?;
        if !matches!(proposer.role, Role::Epc | Role::SubContractor) {
            return Err(DomainError::validation(
                "only the buyer or the seller may counter a bid",
            ));
        }
        if proposer.role == self.last_proposer() {
            return Err(DomainError::validation(format!(
                "waiting on the other party; the last offer came from {}",
                proposer.role
            )));
        }
        self.transition(BidEvent::Counter, &proposer.id, at, note.clone())?;
        self.negotiations.push(Negotiation {
            terms,
            proposed_by: proposer.id.clone(),
            proposed_by_role: proposer.role,
            proposed_at: at,
            note,
        });
        Ok(())
    }

    /// Locks the standing terms. A locked bid refuses a second lock.
    pub fn lock(&mut self, by: &str, at: DateTime<Utc>) -> Result<Terms, DomainError> {
        let terms = self.standing_terms();
        self.transition(BidEvent::Lock, by, at, None)?;
        self.locked_terms = Some(terms);
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(at: DateTime<Utc>) -> Bid {
        Bid {
            id: "bid-1".to_string(),
            case_id: "case-1".to_string(),
            company_id: "co-1".to_string(),
            sub_contractor_id: "sc-1".to_string(),
            offer: Terms {
                amount: 900_000.0,
                duration_days: 90,
            },
            negotiations: Vec::new(),
            locked_terms: None,
            lifecycle: Lifecycle::new(BidStatus::Submitted, "co-1", at, None),
            placed_by: "co-1".to_string(),
            created_at: at,
            updated_at: at,
            revision: 1,
        }
    }

    #[test]
    fn lock_without_negotiation_uses_the_original_offer() {
        let at = Utc::now();
        let mut bid = bid(at);
        let terms = bid.lock("co-1", at).expect("lock");
        assert_eq!(terms, bid.offer);
        assert_eq!(bid.locked_terms, Some(bid.offer));
    }

    #[test]
    fn lock_uses_the_last_counter_and_is_final() {
        let at = Utc::now();
        let mut bid = bid(at);
        let seller = Principal::new("sc-1", Role::SubContractor);
        let buyer = Principal::new("co-1", Role::Epc);
        let first = Terms {
            amount: 950_000.0,
            duration_days: 60,
        };
        let second = Terms {
            amount: 925_000.0,
            duration_days: 75,
        };
        bid.counter(&seller, first, None, at).expect("seller counters");
        bid.counter(&buyer, second, Some("meet halfway".to_string()), at)
            .expect("buyer counters");
        assert_eq!(bid.status(), BidStatus::NegotiationInProgress);

        assert_eq!(bid.lock("co-1", at).expect("lock"), second);
        let err = bid.lock("co-1", at).expect_err("second lock");
        assert!(matches!(err, DomainError::StateConflict { .. }));
        assert_eq!(bid.locked_terms, Some(second));
    }

    #[test]
    fn proposers_must_alternate() {
        let at = Utc::now();
        let mut bid = bid(at);
        let buyer = Principal::new("co-1", Role::Epc);
        let err = bid
            .counter(
                &buyer,
                Terms {
                    amount: 1.0,
                    duration_days: 1,
                },
                None,
                at,
            )
            .expect_err("buyer cannot counter its own bid");
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(bid.negotiations.is_empty());
        assert_eq!(bid.status(), BidStatus::Submitted);
    }
}
