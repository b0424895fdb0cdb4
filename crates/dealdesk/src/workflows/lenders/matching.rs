//! Lender filtering and ranking. Pure functions over lender snapshots.

use std::cmp::Ordering;

use serde::Serialize;

use super::domain::{preference_score, Nbfc, NbfcStatus};
use crate::workflows::onboarding::RiskCategory;

/// What a lender is asked to fund.
#[derive(Debug, Clone, PartialEq)]
pub struct DealProfile {
    pub amount: f64,
    pub risk_category: RiskCategory,
    pub geography: Option<String>,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub nbfc_id: String,
    pub name: String,
    pub score: f64,
    pub preference_score: f64,
    pub approval_rate: f64,
    pub avg_interest_rate: f64,
    pub avg_processing_days: f64,
}

pub fn is_eligible(nbfc: &Nbfc, deal: &DealProfile) -> bool {
    let preferences = &nbfc.preferences;
    nbfc.status() == NbfcStatus::Active
        && preferences
            .accepted_risk_levels
            .contains(&deal.risk_category)
        && preferences.coverage.admits_amount(deal.amount)
        && preferences
            .coverage
            .admits_geography(deal.geography.as_deref())
        && preferences.coverage.admits_sector(deal.sector.as_deref())
}

/// Composite ranking score. The preference component is derived from current metrics so a
/// stale stored score cannot outrank fresher performance.
pub fn match_score(nbfc: &Nbfc) -> (f64, f64) {
    let metrics = &nbfc.metrics;
    let preference = preference_score(metrics);
    let score = preference
        + 0.3 * metrics.approval_rate
        + 2.0 * (20.0 - metrics.avg_interest_rate)
        + (10.0 - metrics.avg_processing_days).max(0.0);
    (score, preference)
}

fn candidate(nbfc: &Nbfc) -> MatchCandidate {
    let (score, preference_score) = match_score(nbfc);
    MatchCandidate {
        nbfc_id: nbfc.id.clone(),
        name: nbfc.name.clone(),
        score,
        preference_score,
        approval_rate: nbfc.metrics.approval_rate,
        avg_interest_rate: nbfc.metrics.avg_interest_rate,
        avg_processing_days: nbfc.metrics.avg_processing_days,
    }
}

/// Score desc, then preference desc, approval rate desc, interest rate asc. Id last so equal
/// candidates keep a stable order.
fn by_rank(left: &MatchCandidate, right: &MatchCandidate) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| right.preference_score.total_cmp(&left.preference_score))
        .then_with(|| right.approval_rate.total_cmp(&left.approval_rate))
        .then_with(|| left.avg_interest_rate.total_cmp(&right.avg_interest_rate))
        .then_with(|| left.nbfc_id.cmp(&right.nbfc_id))
}

pub fn rank<'a>(nbfcs: impl IntoIterator<Item = &'a Nbfc>, deal: &DealProfile) -> Vec<MatchCandidate> {
    let mut candidates: Vec<MatchCandidate> = nbfcs
        .into_iter()
        .filter(|nbfc| is_eligible(nbfc, deal))
        .map(candidate)
        .collect();
    candidates.sort_by(by_rank);
    candidates
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::workflows::lenders::domain::{
        Coverage, LenderMetrics, LendingPreferences, RiskAppetite,
    };
    use crate::workflows::lifecycle::Lifecycle;

    fn nbfc(id: &str, stored_score: f64, metrics: LenderMetrics) -> Nbfc {
        let at = Utc::now();
        Nbfc {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: format!("{id}@lenders.test"),
            preferences: LendingPreferences {
                coverage: Coverage {
                    min_deal_size: 100_000.0,
                    max_deal_size: Some(50_000_000.0),
                    ..Coverage::default()
                },
                risk_appetite: RiskAppetite::Moderate,
                accepted_risk_levels: vec![RiskCategory::Low, RiskCategory::Medium],
            },
            metrics,
            preference_score: stored_score,
            lifecycle: Lifecycle::new(NbfcStatus::Active, "om-1", at, None),
            created_by: "om-1".to_string(),
            created_at: at,
            updated_at: at,
            revision: 1,
        }
    }

    fn deal(amount: f64, risk_category: RiskCategory) -> DealProfile {
        DealProfile {
            amount,
            risk_category,
            geography: None,
            sector: None,
        }
    }

    #[test]
    fn faster_cheaper_lender_outranks_higher_stored_score() {
        let a = nbfc(
            "a",
            70.0,
            LenderMetrics {
                approval_rate: 80.0,
                avg_interest_rate: 14.0,
                avg_processing_days: 5.0,
                ..LenderMetrics::default()
            },
        );
        let b = nbfc(
            "b",
            60.0,
            LenderMetrics {
                approval_rate: 90.0,
                avg_interest_rate: 12.0,
                avg_processing_days: 3.0,
                ..LenderMetrics::default()
            },
        );
        let close = |(score, preference): (f64, f64), expected: (f64, f64)| {
            (score - expected.0).abs() < 1e-9 && (preference - expected.1).abs() < 1e-9
        };
        assert!(close(match_score(&a), (129.0, 88.0)));
        assert!(close(match_score(&b), (143.5, 93.5)));

        let ranked = rank([&a, &b], &deal(2_000_000.0, RiskCategory::Medium));
        let order: Vec<&str> = ranked.iter().map(|c| c.nbfc_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn filter_drops_inactive_out_of_range_and_unaccepted_risk() {
        let metrics = LenderMetrics::default();
        let mut inactive = nbfc("inactive", 50.0, metrics.clone());
        inactive.lifecycle = Lifecycle::new(NbfcStatus::Inactive, "om-1", Utc::now(), None);
        let open = nbfc("open", 50.0, metrics);

        assert!(rank([&inactive, &open], &deal(2_000_000.0, RiskCategory::High)).is_empty());
        assert!(rank([&open], &deal(50_000.0, RiskCategory::Low)).is_empty());
        let ranked = rank([&inactive, &open], &deal(100_000.0, RiskCategory::Low));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].nbfc_id, "open");
    }

    #[test]
    fn ties_fall_back_to_the_declared_order() {
        let left = LenderMetrics {
            approval_rate: 40.0,
            avg_interest_rate: 12.0,
            avg_processing_days: 20.0,
            ..LenderMetrics::default()
        };
        let x = nbfc("x", 0.0, left.clone());
        let y = nbfc("y", 0.0, left);
        let ranked = rank([&y, &x], &deal(1_000_000.0, RiskCategory::Low));
        assert_eq!(ranked[0].nbfc_id, "x");
        assert_eq!(ranked[0].score, ranked[1].score);
    }
}
