//! Seller risk checklist and the fixed penalty table behind the risk score.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::workflows::policy::{RISK_LOW_MIN_SCORE, RISK_MEDIUM_MIN_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_score(score: u8) -> Self {
        if score >= RISK_LOW_MIN_SCORE {
            Self::Low
        } else if score >= RISK_MEDIUM_MIN_SCORE {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Proceed,
    Review,
    Reject,
}

impl Recommendation {
    pub fn for_category(category: RiskCategory) -> Self {
        match category {
            RiskCategory::Low => Self::Proceed,
            RiskCategory::Medium => Self::Review,
            RiskCategory::High => Self::Reject,
        }
    }
}

/// Grouping used when reporting where penalties came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistCategory {
    CompanyVerification,
    FinancialHealth,
    PastTrackRecord,
    KeyPersonnel,
    Blacklist,
    IndustryClearance,
    Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItem {
    GstinVerified,
    PanVerified,
    IncorporationVerified,
    BankStatementsVerified,
    ItrVerified,
    FinancialsVerified,
    PastProjectsVerified,
    ClientReferencesVerified,
    KeyPersonnelKyc,
    BlacklistCheck,
    IndustryClearance,
    AddressVerified,
}

impl ChecklistItem {
    pub const ALL: [Self; 12] = [
        Self::GstinVerified,
        Self::PanVerified,
        Self::IncorporationVerified,
        Self::BankStatementsVerified,
        Self::ItrVerified,
        Self::FinancialsVerified,
        Self::PastProjectsVerified,
        Self::ClientReferencesVerified,
        Self::KeyPersonnelKyc,
        Self::BlacklistCheck,
        Self::IndustryClearance,
        Self::AddressVerified,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::GstinVerified => "gstin_verified",
            Self::PanVerified => "pan_verified",
            Self::IncorporationVerified => "incorporation_verified",
            Self::BankStatementsVerified => "bank_statements_verified",
            Self::ItrVerified => "itr_verified",
            Self::FinancialsVerified => "financials_verified",
            Self::PastProjectsVerified => "past_projects_verified",
            Self::ClientReferencesVerified => "client_references_verified",
            Self::KeyPersonnelKyc => "key_personnel_kyc",
            Self::BlacklistCheck => "blacklist_check",
            Self::IndustryClearance => "industry_clearance",
            Self::AddressVerified => "address_verified",
        }
    }

    /// Points deducted from 100 while the item is unverified.
    pub const fn penalty(self) -> u8 {
        match self {
            Self::IncorporationVerified => 5,
            Self::KeyPersonnelKyc => 15,
            Self::BlacklistCheck => 50,
            _ => 10,
        }
    }

    pub const fn category(self) -> ChecklistCategory {
        match self {
            Self::GstinVerified | Self::PanVerified | Self::IncorporationVerified => {
                ChecklistCategory::CompanyVerification
            }
            Self::BankStatementsVerified | Self::ItrVerified | Self::FinancialsVerified => {
                ChecklistCategory::FinancialHealth
            }
            Self::PastProjectsVerified | Self::ClientReferencesVerified => {
                ChecklistCategory::PastTrackRecord
            }
            Self::KeyPersonnelKyc => ChecklistCategory::KeyPersonnel,
            Self::BlacklistCheck => ChecklistCategory::Blacklist,
            Self::IndustryClearance => ChecklistCategory::IndustryClearance,
            Self::AddressVerified => ChecklistCategory::Address,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown checklist item '{0}'")]
pub struct UnknownChecklistItem(pub String);

impl FromStr for ChecklistItem {
    type Err = UnknownChecklistItem;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|item| item.key() == normalized)
            .ok_or(UnknownChecklistItem(normalized))
    }
}

/// The twelve verifications an RMT analyst ticks off for a prospective seller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskChecklist {
    pub gstin_verified: bool,
    pub pan_verified: bool,
    pub incorporation_verified: bool,
    pub bank_statements_verified: bool,
    pub itr_verified: bool,
    pub financials_verified: bool,
    pub past_projects_verified: bool,
    pub client_references_verified: bool,
    pub key_personnel_kyc: bool,
    pub blacklist_check: bool,
    pub industry_clearance: bool,
    pub address_verified: bool,
}

impl RiskChecklist {
    pub fn all_verified() -> Self {
        let mut checklist = Self::default();
        for item in ChecklistItem::ALL {
            checklist.set(item, true);
        }
        checklist
    }

    pub fn get(&self, item: ChecklistItem) -> bool {
        match item {
            ChecklistItem::GstinVerified => self.gstin_verified,
            ChecklistItem::PanVerified => self.pan_verified,
            ChecklistItem::IncorporationVerified => self.incorporation_verified,
            ChecklistItem::BankStatementsVerified => self.bank_statements_verified,
            ChecklistItem::ItrVerified => self.itr_verified,
            ChecklistItem::FinancialsVerified => self.financials_verified,
            ChecklistItem::PastProjectsVerified => self.past_projects_verified,
            ChecklistItem::ClientReferencesVerified => self.client_references_verified,
            ChecklistItem::KeyPersonnelKyc => self.key_personnel_kyc,
            ChecklistItem::BlacklistCheck => self.blacklist_check,
            ChecklistItem::IndustryClearance => self.industry_clearance,
            ChecklistItem::AddressVerified => self.address_verified,
        }
    }

    pub fn set(&mut self, item: ChecklistItem, verified: bool) {
        let slot = match item {
            ChecklistItem::GstinVerified => &mut self.gstin_verified,
            ChecklistItem::PanVerified => &mut self.pan_verified,
            ChecklistItem::IncorporationVerified => &mut self.incorporation_verified,
            ChecklistItem::BankStatementsVerified => &mut self.bank_statements_verified,
            ChecklistItem::ItrVerified => &mut self.itr_verified,
            ChecklistItem::FinancialsVerified => &mut self.financials_verified,
            ChecklistItem::PastProjectsVerified => &mut self.past_projects_verified,
            ChecklistItem::ClientReferencesVerified => &mut self.client_references_verified,
            ChecklistItem::KeyPersonnelKyc => &mut self.key_personnel_kyc,
            ChecklistItem::BlacklistCheck => &mut self.blacklist_check,
            ChecklistItem::IndustryClearance => &mut self.industry_clearance,
            ChecklistItem::AddressVerified => &mut self.address_verified,
        };
        *slot = verified;
    }

    pub fn score(&self) -> u8 {
        let penalty: u32 = ChecklistItem::ALL
            .into_iter()
            .filter(|item| !self.get(*item))
            .map(|item| u32::from(item.penalty()))
            .sum();
        100u32.saturating_sub(penalty).min(100) as u8
    }

    pub fn outcome(&self) -> RiskOutcome {
        let score = self.score();
        let category = RiskCategory::from_score(score);
        RiskOutcome {
            score,
            category,
            recommendation: Recommendation::for_category(category),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskOutcome {
    pub score: u8,
    pub category: RiskCategory,
    pub recommendation: Recommendation,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checklist_from_bits(bits: u16) -> RiskChecklist {
        let mut checklist = RiskChecklist::default();
        for (index, item) in ChecklistItem::ALL.into_iter().enumerate() {
            checklist.set(item, bits & (1 << index) != 0);
        }
        checklist
    }

    #[test]
    fn fully_verified_checklist_scores_low_risk() {
        let outcome = RiskChecklist::all_verified().outcome();
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.category, RiskCategory::Low);
        assert_eq!(outcome.recommendation, Recommendation::Proceed);
    }

    #[test]
    fn missing_blacklist_check_lands_on_medium_boundary() {
        let mut checklist = RiskChecklist::all_verified();
        checklist.set(ChecklistItem::BlacklistCheck, false);
        let outcome = checklist.outcome();
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.category, RiskCategory::Medium);
        assert_eq!(outcome.recommendation, Recommendation::Review);
    }

    #[test]
    fn empty_checklist_clamps_to_zero() {
        let outcome = RiskChecklist::default().outcome();
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.category, RiskCategory::High);
    }

    #[test]
    fn category_thresholds_are_exact() {
        assert_eq!(RiskCategory::from_score(80), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(79), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(50), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(49), RiskCategory::High);
    }

    #[test]
    fn unverifying_an_item_never_raises_the_score() {
        for bits in 0u16..(1 << 12) {
            let checklist = checklist_from_bits(bits);
            let before = checklist.score();
            for item in ChecklistItem::ALL {
                let mut flipped = checklist;
                flipped.set(item, false);
                assert!(flipped.score() <= before, "{bits:#b} {item:?}");
            }
        }
    }

    #[test]
    fn parses_known_keys_only() {
        assert_eq!(
            "Key_Personnel_KYC".parse::<ChecklistItem>().expect("known"),
            ChecklistItem::KeyPersonnelKyc
        );
        assert!("credit_bureau".parse::<ChecklistItem>().is_err());
    }
}
