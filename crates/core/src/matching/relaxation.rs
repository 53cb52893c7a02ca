use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::filter::Filter;
use crate::domain::money::rupees_from_decimal;
use crate::domain::response::{RelaxationInfo, ScoredProject};
use crate::inventory::InventorySnapshot;
use crate::matching::MatchingEngine;

/// Multiplicative ladder over the max budget: `1 + k * step` for `k >= 1`
/// while the factor stays at or under `ceiling`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaxationPolicy {
    step: Decimal,
    ceiling: Decimal,
}

impl Default for RelaxationPolicy {
    fn default() -> Self {
        Self::new(Decimal::new(1, 1), Decimal::new(2, 0))
    }
}

impl RelaxationPolicy {
    pub fn new(step: Decimal, ceiling: Decimal) -> Self {
        Self { step, ceiling }
    }

    pub fn step(&self) -> Decimal {
        self.step
    }

    pub fn ceiling(&self) -> Decimal {
        self.ceiling
    }

    pub fn factors(&self) -> Vec<Decimal> {
        let mut factors = Vec::new();
        if self.step <= Decimal::ZERO {
            return factors;
        }
        let mut factor = Decimal::ONE + self.step;
        while factor <= self.ceiling {
            factors.push(factor.normalize());
            factor += self.step;
        }
        factors
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelaxationAttempt {
    pub original_max_budget: i64,
    pub factor: Decimal,
    pub relaxed_max_budget: i64,
    pub result_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelaxationOutcome {
    Relaxed {
        attempt: RelaxationAttempt,
        attempts: Vec<RelaxationAttempt>,
        results: Vec<ScoredProject>,
    },
    Exhausted {
        original_max_budget: i64,
        highest_attempted_budget: i64,
        highest_factor: Decimal,
        attempts: Vec<RelaxationAttempt>,
    },
}

impl RelaxationOutcome {
    pub fn info(&self) -> RelaxationInfo {
        match self {
            Self::Relaxed { attempt, .. } => RelaxationInfo::Relaxed {
                original_max_budget: attempt.original_max_budget,
                factor: attempt.factor,
                relaxed_max_budget: attempt.relaxed_max_budget,
                result_count: attempt.result_count,
            },
            Self::Exhausted { original_max_budget, highest_attempted_budget, highest_factor, .. } => {
                RelaxationInfo::Exhausted {
                    original_max_budget: *original_max_budget,
                    highest_factor: *highest_factor,
                    highest_attempted_budget: *highest_attempted_budget,
                }
            }
        }
    }

    pub fn attempts(&self) -> &[RelaxationAttempt] {
        match self {
            Self::Relaxed { attempts, .. } | Self::Exhausted { attempts, .. } => attempts,
        }
    }
}

pub struct BudgetRelaxer<'a> {
    engine: &'a MatchingEngine,
    policy: RelaxationPolicy,
}

impl<'a> BudgetRelaxer<'a> {
    pub fn new(engine: &'a MatchingEngine, policy: RelaxationPolicy) -> Self {
        Self { engine, policy }
    }

    /// Walks the ladder with every filter key except the max budget held fixed.
    /// `None` when the filter has no max budget to relax.
    pub fn run(&self, filter: &Filter, snapshot: &InventorySnapshot) -> Option<RelaxationOutcome> {
        let original_max_budget = filter.max_price?;
        let mut attempts = Vec::new();

        for factor in self.policy.factors() {
            let Some(relaxed_max_budget) = Decimal::from(original_max_budget)
                .checked_mul(factor)
                .and_then(rupees_from_decimal)
            else {
                break;
            };
            let results = self.engine.search(&filter.with_max_price(relaxed_max_budget), snapshot);
            let attempt = RelaxationAttempt {
                original_max_budget,
                factor,
                relaxed_max_budget,
                result_count: results.len(),
            };
            debug!(
                event_name = "relaxation.attempt",
                factor = %factor,
                relaxed_max_budget,
                result_count = results.len(),
                "relaxation rung evaluated"
            );
            attempts.push(attempt.clone());

            if !results.is_empty() {
                info!(
                    event_name = "relaxation.relaxed",
                    original_max_budget,
                    factor = %factor,
                    relaxed_max_budget,
                    rungs = attempts.len(),
                    "budget relaxed"
                );
                return Some(RelaxationOutcome::Relaxed { attempt, attempts, results });
            }
        }

        let (highest_factor, highest_attempted_budget) = attempts
            .last()
            .map(|attempt| (attempt.factor, attempt.relaxed_max_budget))
            .unwrap_or((Decimal::ONE, original_max_budget));

        info!(
            event_name = "relaxation.exhausted",
            original_max_budget,
            highest_factor = %highest_factor,
            highest_attempted_budget,
            "relaxation ladder exhausted"
        );

        Some(RelaxationOutcome::Exhausted {
            original_max_budget,
            highest_attempted_budget,
            highest_factor,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use crate::domain::filter::Filter;
    use crate::inventory::test_support::project;
    use crate::inventory::InventorySnapshot;
    use crate::matching::MatchingEngine;

    use super::{BudgetRelaxer, RelaxationOutcome, RelaxationPolicy};

    fn north_bangalore_70l() -> Filter {
        Filter {
            max_price: Some(7_000_000),
            locality: Some("North Bangalore".to_string()),
            ..Filter::default()
        }
    }

    #[test]
    fn default_ladder_runs_from_1_1_to_2_0() {
        let factors = RelaxationPolicy::default().factors();
        assert_eq!(factors.len(), 10);
        assert_eq!(factors[0], Decimal::new(11, 1));
        assert_eq!(factors[9], Decimal::new(2, 0));
    }

    #[test]
    fn stops_at_first_rung_with_results() {
        let snapshot = InventorySnapshot::new(
            1,
            vec![
                project("p1", "Aster Greens", "Yelahanka", "North Bangalore", &[(2, 9_000_000)]),
                project("p2", "Birch", "Hebbal", "North Bangalore", &[(2, 12_000_000)]),
            ],
        );
        let engine = MatchingEngine::default();

        let outcome = BudgetRelaxer::new(&engine, RelaxationPolicy::default())
            .run(&north_bangalore_70l(), &snapshot)
            .expect("max budget present");

        let RelaxationOutcome::Relaxed { attempt, attempts, results } = outcome else {
            panic!("expected a relaxed outcome");
        };
        assert_eq!(attempt.factor, Decimal::new(13, 1));
        assert_eq!(attempt.relaxed_max_budget, 9_100_000);
        assert_eq!(attempt.result_count, 1);
        assert_eq!(attempts.len(), 3);
        assert_eq!(results[0].name, "Aster Greens");
    }

    #[test]
    fn exhausted_reports_highest_rung_and_keeps_other_keys() {
        let snapshot = InventorySnapshot::new(
            1,
            vec![
                project("p1", "Aster Greens", "Yelahanka", "North Bangalore", &[(3, 9_000_000)]),
                project("p2", "Orchid", "Whitefield", "East Bangalore", &[(2, 9_000_000)]),
            ],
        );
        let filter = Filter { bedrooms: BTreeSet::from([1]), ..north_bangalore_70l() };
        let engine = MatchingEngine::default();

        let outcome = BudgetRelaxer::new(&engine, RelaxationPolicy::default())
            .run(&filter, &snapshot)
            .expect("max budget present");

        match outcome {
            RelaxationOutcome::Exhausted {
                original_max_budget,
                highest_attempted_budget,
                highest_factor,
                attempts,
            } => {
                assert_eq!(original_max_budget, 7_000_000);
                assert_eq!(highest_attempted_budget, 14_000_000);
                assert_eq!(highest_factor, Decimal::new(2, 0));
                assert_eq!(attempts.len(), 10);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn no_max_budget_means_no_relaxation() {
        let snapshot = InventorySnapshot::new(1, Vec::new());
        let filter = Filter { min_price: Some(5_000_000), ..Filter::default() };
        let engine = MatchingEngine::default();
        assert!(BudgetRelaxer::new(&engine, RelaxationPolicy::default()).run(&filter, &snapshot).is_none());
    }

    #[test]
    fn relaxed_budget_rounds_to_whole_rupees() {
        let snapshot = InventorySnapshot::new(
            1,
            vec![project("p1", "Aster", "Yelahanka", "North", &[(2, 1_000_000)])],
        );
        let filter = Filter { max_price: Some(909_091), ..Filter::default() };
        let engine = MatchingEngine::default();

        let outcome = BudgetRelaxer::new(&engine, RelaxationPolicy::default())
            .run(&filter, &snapshot)
            .expect("max budget present");

        assert_eq!(outcome.attempts()[0].relaxed_max_budget, 1_000_000);
    }

    #[test]
    fn unrepresentable_rungs_end_the_ladder_as_exhausted() {
        let snapshot = InventorySnapshot::new(
            1,
            vec![project("p1", "Aster", "Yelahanka", "North", &[(2, 1_000_000)])],
        );
        let filter = Filter {
            bedrooms: BTreeSet::from([4]),
            max_price: Some(i64::MAX),
            ..Filter::default()
        };
        let engine = MatchingEngine::default();

        let outcome = BudgetRelaxer::new(&engine, RelaxationPolicy::default())
            .run(&filter, &snapshot)
            .expect("max budget present");

        match outcome {
            RelaxationOutcome::Exhausted { highest_attempted_budget, attempts, .. } => {
                assert!(attempts.is_empty());
                assert_eq!(highest_attempted_budget, i64::MAX);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
