use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::error::DomainError;
use crate::workflows::lifecycle::{Lifecycle, StateMachine};
use crate::workflows::onboarding::RiskCategory;
use crate::workflows::store::record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NbfcStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbfcEvent {
    Activate,
    Deactivate,
}

impl StateMachine for NbfcStatus {
    type Event = NbfcEvent;

    fn next(self, event: NbfcEvent) -> Option<Self> {
        match (self, event) {
            (Self::Inactive, NbfcEvent::Activate) => Some(Self::Active),
            (Self::Active, NbfcEvent::Deactivate) => Some(Self::Inactive),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

/// Where and how much a lender will fund. Empty lists mean "anywhere".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    #[serde(default)]
    pub geographies: Vec<String>,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub min_deal_size: f64,
    #[serde(default)]
    pub max_deal_size: Option<f64>,
}

impl Coverage {
    pub fn admits_amount(&self, amount: f64) -> bool {
        amount >= self.min_deal_size && self.max_deal_size.map_or(true, |max| amount <= max)
    }

    pub fn admits_geography(&self, geography: Option<&str>) -> bool {
        admits(&self.geographies, geography)
    }

    pub fn admits_sector(&self, sector: Option<&str>) -> bool {
        admits(&self.sectors, sector)
    }
}

fn admits(declared: &[String], value: Option<&str>) -> bool {
    match value {
        Some(value) if !declared.is_empty() => declared
            .iter()
            .any(|entry| entry.trim().eq_ignore_ascii_case(value.trim())),
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskAppetite {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskAppetite {
    /// Risk levels a lender with this appetite takes when it has not listed any.
    pub fn default_levels(self) -> Vec<RiskCategory> {
        match self {
            Self::Conservative => vec![RiskCategory::Low],
            Self::Moderate => vec![RiskCategory::Low, RiskCategory::Medium],
            Self::Aggressive => vec![RiskCategory::Low, RiskCategory::Medium, RiskCategory::High],
        }
    }
}

/// Lending preference sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LendingPreferences {
    #[serde(default)]
    pub coverage: Coverage,
    #[serde(default)]
    pub risk_appetite: RiskAppetite,
    #[serde(default)]
    pub accepted_risk_levels: Vec<RiskCategory>,
}

impl LendingPreferences {
    pub fn validate(&self) -> Result<(), DomainError> {
        let coverage = &self.coverage;
        if !coverage.min_deal_size.is_finite() || coverage.min_deal_size < 0.0 {
            return Err(DomainError::validation("min_deal_size must be zero or more"));
        }
        if let Some(max) = coverage.max_deal_size {
            if !max.is_finite() || max < coverage.min_deal_size {
                return Err(DomainError::validation(
                    "max_deal_size must not be below min_deal_size",
                ));
            }
        }
        Ok(())
    }

    /// Fills in accepted levels from the appetite when none were listed.
    pub fn normalized(mut self) -> Self {
        if self.accepted_risk_levels.is_empty() {
            self.accepted_risk_levels = self.risk_appetite.default_levels();
        }
        self.accepted_risk_levels.sort();
        self.accepted_risk_levels.dedup();
        self
    }
}

/// Rolling performance figures, refreshed on lender responses and closed deals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LenderMetrics {
    /// Percentage of shared cases the lender approved.
    pub approval_rate: f64,
    pub avg_interest_rate: f64,
    pub avg_processing_days: f64,
    pub total_disbursed: f64,
    pub responses: u32,
    pub approvals: u32,
    pub deals_closed: u32,
}

impl LenderMetrics {
    pub fn record_response(&mut self, approved: bool, processing_days: f64) {
        let previous = f64::from(self.responses);
        self.responses += 1;
        if approved {
            self.approvals += 1;
        }
        let responses = f64::from(self.responses);
        self.approval_rate = f64::from(self.approvals) / responses * 100.0;
        self.avg_processing_days =
            (self.avg_processing_days * previous + processing_days.max(0.0)) / responses;
    }

    pub fn record_closed_deal(&mut self, amount: f64, interest_rate: f64) {
        let previous = f64::from(self.deals_closed);
        self.deals_closed += 1;
        self.total_disbursed += amount;
        self.avg_interest_rate =
            (self.avg_interest_rate * previous + interest_rate) / f64::from(self.deals_closed);
    }
}

/// 50 baseline, up to 25 for approvals, up to 15 for speed, up to 10 for cheap money.
pub fn preference_score(metrics: &LenderMetrics) -> f64 {
    let score = 50.0
        + (0.25 * metrics.approval_rate).min(25.0)
        + (15.0 - metrics.avg_processing_days).max(0.0)
        + (10.0 - 0.5 * (metrics.avg_interest_rate - 10.0)).max(0.0);
    score.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nbfc {
    pub id: String,
    pub name: String,
    pub email: String,
    pub preferences: LendingPreferences,
    pub metrics: LenderMetrics,
    pub preference_score: f64,
    #[serde(flatten)]
    pub lifecycle: Lifecycle<NbfcStatus>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

record!(Nbfc, "nbfc");

impl Nbfc {
    pub fn status(&self) -> NbfcStatus {
        self.lifecycle.status()
    }

    pub fn transition(
        &mut self,
        event: NbfcEvent,
        by: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<NbfcStatus, DomainError> {
        let status = self.lifecycle.advance(("nbfc", &self.id), event, by, at, notes)?;
        self.updated_at = at;
        Ok(status)
    }

    pub fn refresh_preference_score(&mut self) {
        self.preference_score = preference_score(&self.metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_score_matches_the_formula() {
        let metrics = LenderMetrics {
            approval_rate: 80.0,
            avg_interest_rate: 14.0,
            avg_processing_days: 5.0,
            ..LenderMetrics::default()
        };
        assert_eq!(preference_score(&metrics), 88.0);

        let slow_and_dear = LenderMetrics {
            approval_rate: 0.0,
            avg_interest_rate: 40.0,
            avg_processing_days: 30.0,
            ..LenderMetrics::default()
        };
        assert_eq!(preference_score(&slow_and_dear), 50.0);

        let best = LenderMetrics {
            approval_rate: 100.0,
            avg_interest_rate: 0.0,
            avg_processing_days: 0.0,
            ..LenderMetrics::default()
        };
        assert_eq!(preference_score(&best), 100.0);
    }

    #[test]
    fn responses_roll_into_rates() {
        let mut metrics = LenderMetrics::default();
        metrics.record_response(true, 2.0);
        metrics.record_response(false, 4.0);
        assert_eq!(metrics.approval_rate, 50.0);
        assert_eq!(metrics.avg_processing_days, 3.0);

        metrics.record_closed_deal(1_000.0, 12.0);
        metrics.record_closed_deal(3_000.0, 14.0);
        assert_eq!(metrics.avg_interest_rate, 13.0);
        assert_eq!(metrics.total_disbursed, 4_000.0);
    }

    #[test]
    fn coverage_bounds_are_inclusive_and_open_ended() {
        let coverage = Coverage {
            geographies: vec!["Maharashtra".to_string()],
            sectors: Vec::new(),
            min_deal_size: 100.0,
            max_deal_size: None,
        };
        assert!(coverage.admits_amount(100.0));
        assert!(coverage.admits_amount(1e12));
        assert!(!coverage.admits_amount(99.0));
        assert!(coverage.admits_geography(Some("maharashtra")));
        assert!(!coverage.admits_geography(Some("Goa")));
        assert!(coverage.admits_geography(None));
        assert!(coverage.admits_sector(Some("solar")));
    }
}
