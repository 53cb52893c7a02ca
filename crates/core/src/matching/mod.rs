//! Deterministic retrieval and ranking over an inventory snapshot.
//!
//! Hard filters decide eligibility; `scoring` turns the surviving matches into
//! integer scores; `relaxation` widens the max budget when nothing survives.

pub mod relaxation;
pub mod scoring;

use std::cmp::Ordering;

use crate::config::MatchingConfig;
use crate::domain::filter::Filter;
use crate::domain::inventory::{Project, ProjectStatus};
use crate::domain::response::ScoredProject;
use crate::inventory::InventorySnapshot;

pub use relaxation::{BudgetRelaxer, RelaxationAttempt, RelaxationOutcome, RelaxationPolicy};
pub use scoring::{ConfigurationFit, LocalityMatch, ScoreCalculator, ScoringWeights};

pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    locality_primary: 100,
    locality_secondary: 50,
    locality_miss: -10,
    zone: 10,
    budget_overlap: 20,
    budget_tolerance: 10,
    tolerance_pct: 10,
    bhk_exact: 30,
    bhk_upgrade: 15,
};

pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone)]
pub struct MatchingEngine {
    calculator: ScoreCalculator,
    max_results: usize,
    include_upgrades: bool,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self {
            calculator: ScoreCalculator::with_weights(DEFAULT_WEIGHTS),
            max_results: DEFAULT_MAX_RESULTS,
            include_upgrades: true,
        }
    }
}

impl MatchingEngine {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            calculator: ScoreCalculator::with_weights(config.weights),
            max_results: config.max_results,
            include_upgrades: config.include_upgrade_configurations,
        }
    }

    /// Ranked matches for `filter`. Same snapshot and filter always yield the
    /// same list.
    pub fn search(&self, filter: &Filter, snapshot: &InventorySnapshot) -> Vec<ScoredProject> {
        let mut results: Vec<ScoredProject> = snapshot
            .projects()
            .iter()
            .filter_map(|project| self.evaluate(filter, project))
            .collect();

        results.sort_by(rank_order);
        results.truncate(self.max_results);
        results
    }

    fn evaluate(&self, filter: &Filter, project: &Project) -> Option<ScoredProject> {
        if !self.passes_hard_filters(filter, project) {
            return None;
        }

        let mut matched: Vec<(ConfigurationFit, _)> = project
            .configurations
            .iter()
            .filter_map(|config| {
                scoring::configuration_fit(filter, config, self.include_upgrades)
                    .map(|fit| (fit, config.clone()))
            })
            .collect();

        let narrowing = filter.has_budget() || !filter.bedrooms.is_empty();
        if narrowing && matched.is_empty() {
            return None;
        }
        if !narrowing {
            matched = project
                .configurations
                .iter()
                .map(|config| (ConfigurationFit::Budget, config.clone()))
                .collect();
        }

        matched.sort_by(|(left_fit, left), (right_fit, right)| {
            left_fit
                .cmp(right_fit)
                .then_with(|| left.price.cmp(&right.price))
                .then_with(|| left.bhk.cmp(&right.bhk))
        });

        let fits: Vec<ConfigurationFit> = matched.iter().map(|(fit, _)| *fit).collect();
        let breakdown = self.calculator.score(filter, project, &fits);
        let configurations = matched.into_iter().map(|(_, config)| config).collect();

        Some(ScoredProject::new(project, breakdown, configurations))
    }

    fn passes_hard_filters(&self, filter: &Filter, project: &Project) -> bool {
        if filter.locality.is_some()
            && self.calculator.locality_match(filter, project) == LocalityMatch::None
        {
            return false;
        }

        if let Some(zone) = filter.zone.as_deref() {
            if !project.in_zone(zone) {
                return false;
            }
        }

        if !filter.status.is_empty() && !filter.status.contains(&project.status) {
            return false;
        }

        if !filter.amenities.iter().all(|amenity| project.has_amenity(amenity)) {
            return false;
        }

        if let Some(deadline) = filter.possession_by {
            let ready = project.status == ProjectStatus::ReadyToMove;
            let on_time = project.possession_date.is_some_and(|date| date <= deadline);
            if !ready && !on_time {
                return false;
            }
        }

        true
    }
}

fn rank_order(left: &ScoredProject, right: &ScoredProject) -> Ordering {
    right
        .score
        .cmp(&left.score)
        .then_with(|| {
            match (left.lowest_matched_price(), right.lowest_matched_price()) {
                (Some(l), Some(r)) => l.cmp(&r),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
        .then_with(|| left.name.cmp(&right.name))
        .then_with(|| left.project_id.cmp(&right.project_id))
}
