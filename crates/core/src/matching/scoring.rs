//! Per-project scoring signals

use crate::domain::filter::Filter;
use crate::domain::inventory::{same_place, Project, UnitConfiguration};
use crate::domain::response::ScoreBreakdown;

/// Points awarded per signal. Integers keep ordering exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    /// Requested locality is the project's own locality (default: 100)
    pub locality_primary: i64,
    /// Requested locality is one of the project's nearby tags (default: 50)
    pub locality_secondary: i64,
    /// Locality requested but only matched through the zone (default: -10)
    pub locality_miss: i64,
    pub zone: i64,
    pub budget_overlap: i64,
    /// Starting price within `tolerance_pct` of the requested max
    pub budget_tolerance: i64,
    pub tolerance_pct: u32,
    pub bhk_exact: i64,
    pub bhk_upgrade: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalityMatch {
    NotRequested,
    Primary,
    Secondary,
    /// The requested locality names the project's zone.
    ZoneOnly,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigurationFit {
    Exact,
    Upgrade,
    /// No BHK requested; matched on budget alone.
    Budget,
}

#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
}

impl ScoreCalculator {
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn locality_match(&self, filter: &Filter, project: &Project) -> LocalityMatch {
        let Some(locality) = filter.locality.as_deref() else {
            return LocalityMatch::NotRequested;
        };
        if project.is_primary_locality(locality) {
            LocalityMatch::Primary
        } else if project.is_nearby_locality(locality) {
            LocalityMatch::Secondary
        } else if project.in_zone(locality) {
            LocalityMatch::ZoneOnly
        } else {
            LocalityMatch::None
        }
    }

    pub fn zone_matches(&self, filter: &Filter, project: &Project) -> bool {
        let zone_requested = filter.zone.as_deref().is_some_and(|zone| project.in_zone(zone));
        let locality_names_zone =
            filter.locality.as_deref().is_some_and(|locality| same_place(&project.zone, locality));
        zone_requested || locality_names_zone
    }

    pub fn score(
        &self,
        filter: &Filter,
        project: &Project,
        fits: &[ConfigurationFit],
    ) -> ScoreBreakdown {
        let weights = &self.weights;

        let locality = match self.locality_match(filter, project) {
            LocalityMatch::Primary => weights.locality_primary,
            LocalityMatch::Secondary => weights.locality_secondary,
            LocalityMatch::ZoneOnly | LocalityMatch::None => weights.locality_miss,
            LocalityMatch::NotRequested => 0,
        };

        let zone = if self.zone_matches(filter, project) { weights.zone } else { 0 };

        let mut budget = 0;
        if filter.has_budget() {
            if let Some((low, high)) = project.price_range() {
                if filter.budget().overlaps(low, high) {
                    budget += weights.budget_overlap;
                }
            }
            if let (Some(max), Some(start)) = (filter.max_price, project.starting_price()) {
                if self.within_tolerance(start, max) {
                    budget += weights.budget_tolerance;
                }
            }
        }

        let mut configuration = 0;
        if fits.contains(&ConfigurationFit::Exact) {
            configuration += weights.bhk_exact;
        }
        if fits.contains(&ConfigurationFit::Upgrade) {
            configuration += weights.bhk_upgrade;
        }

        ScoreBreakdown { locality, zone, budget, configuration }
    }

    fn within_tolerance(&self, price: i64, target: i64) -> bool {
        let distance = i128::from((price - target).abs());
        distance * 100 <= i128::from(target) * i128::from(self.weights.tolerance_pct)
    }
}

/// How a single unit satisfies the filter, if at all.
pub fn configuration_fit(
    filter: &Filter,
    configuration: &UnitConfiguration,
    include_upgrades: bool,
) -> Option<ConfigurationFit> {
    if !filter.budget().contains(configuration.price) {
        return None;
    }
    if filter.bedrooms.is_empty() {
        return Some(ConfigurationFit::Budget);
    }
    if filter.bedrooms.contains(&configuration.bhk) {
        return Some(ConfigurationFit::Exact);
    }
    let upgrade = include_upgrades
        && filter.max_price.is_some()
        && filter.highest_bedroom().map(|bhk| bhk + 1) == Some(configuration.bhk);
    upgrade.then_some(ConfigurationFit::Upgrade)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::domain::filter::Filter;
    use crate::domain::inventory::UnitConfiguration;
    use crate::inventory::test_support::project;

    use super::{configuration_fit, ConfigurationFit, LocalityMatch, ScoreCalculator, ScoringWeights};

    fn calculator() -> ScoreCalculator {
        ScoreCalculator::with_weights(ScoringWeights::default())
    }

    fn unit(bhk: u8, price: i64) -> UnitConfiguration {
        UnitConfiguration { bhk, price, area_sqft: 1_000 }
    }

    #[test]
    fn locality_tiers_follow_primary_secondary_zone() {
        let mut aster = project("p1", "Aster", "Yelahanka", "North Bangalore", &[]);
        aster.nearby_localities = vec!["Jakkur".to_string()];
        let calc = calculator();

        let for_locality = |name: &str| Filter { locality: Some(name.to_string()), ..Filter::default() };

        assert_eq!(calc.locality_match(&for_locality("Yelahanka"), &aster), LocalityMatch::Primary);
        assert_eq!(calc.locality_match(&for_locality("jakkur"), &aster), LocalityMatch::Secondary);
        assert_eq!(
            calc.locality_match(&for_locality("North Bangalore"), &aster),
            LocalityMatch::ZoneOnly
        );
        assert_eq!(calc.locality_match(&Filter::default(), &aster), LocalityMatch::NotRequested);

        let primary = calc.score(&for_locality("Yelahanka"), &aster, &[]);
        let secondary = calc.score(&for_locality("Jakkur"), &aster, &[]);
        let zone_only = calc.score(&for_locality("North Bangalore"), &aster, &[]);
        assert_eq!(primary.total(), 100);
        assert_eq!(secondary.total(), 50);
        assert_eq!(zone_only.total(), 0, "zone-valued locality: -10 locality, +10 zone");
    }

    #[test]
    fn budget_points_require_overlap_and_tolerance_band() {
        let calc = calculator();
        let filter = Filter { max_price: Some(15_000_000), ..Filter::default() };

        let near = project("p1", "Near", "Hebbal", "North", &[(2, 14_000_000)]);
        let cheap = project("p2", "Cheap", "Hebbal", "North", &[(2, 9_000_000)]);

        assert_eq!(calc.score(&filter, &near, &[]).budget, 30);
        assert_eq!(calc.score(&filter, &cheap, &[]).budget, 20);
        assert_eq!(calc.score(&Filter::default(), &near, &[]).budget, 0);
    }

    #[test]
    fn configuration_fit_classifies_exact_and_upgrade_units() {
        let filter = Filter {
            bedrooms: BTreeSet::from([2]),
            max_price: Some(15_000_000),
            ..Filter::default()
        };

        assert_eq!(configuration_fit(&filter, &unit(2, 13_000_000), true), Some(ConfigurationFit::Exact));
        assert_eq!(configuration_fit(&filter, &unit(3, 14_000_000), true), Some(ConfigurationFit::Upgrade));
        assert_eq!(configuration_fit(&filter, &unit(3, 14_000_000), false), None);
        assert_eq!(configuration_fit(&filter, &unit(4, 14_000_000), true), None);
        assert_eq!(configuration_fit(&filter, &unit(2, 16_000_000), true), None);
    }

    #[test]
    fn upgrade_path_needs_a_max_budget() {
        let filter = Filter { bedrooms: BTreeSet::from([2]), ..Filter::default() };
        assert_eq!(configuration_fit(&filter, &unit(3, 14_000_000), true), None);

        let budget_only = Filter { max_price: Some(10_000_000), ..Filter::default() };
        assert_eq!(
            configuration_fit(&budget_only, &unit(3, 9_000_000), true),
            Some(ConfigurationFit::Budget)
        );
    }

    #[test]
    fn exact_and_upgrade_points_stack() {
        let calc = calculator();
        let aster = project("p1", "Aster", "Yelahanka", "North", &[]);
        let breakdown = calc.score(
            &Filter::default(),
            &aster,
            &[ConfigurationFit::Exact, ConfigurationFit::Upgrade],
        );
        assert_eq!(breakdown.configuration, 45);
    }
}
