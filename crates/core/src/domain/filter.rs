use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::inventory::ProjectStatus;
use crate::domain::money::parse_amount;

pub const MIN_BEDROOMS: u8 = 1;
pub const MAX_BEDROOMS: u8 = 6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl BudgetRange {
    /// Drops the lower bound when it exceeds the upper one.
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        match (min, max) {
            (Some(low), Some(high)) if low > high => Self { min: None, max: Some(high) },
            _ => Self { min, max },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, price: i64) -> bool {
        self.min.map_or(true, |low| price >= low) && self.max.map_or(true, |high| price <= high)
    }

    pub fn overlaps(&self, low: i64, high: i64) -> bool {
        self.min.map_or(true, |min| high >= min) && self.max.map_or(true, |max| low <= max)
    }
}

/// Validated search filter for one request. Built by the normalizer, never
/// mutated afterwards; relaxation derives copies with `with_max_price`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub bedrooms: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub status: BTreeSet<ProjectStatus>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub amenities: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possession_by: Option<NaiveDate>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn budget(&self) -> BudgetRange {
        BudgetRange { min: self.min_price, max: self.max_price }
    }

    pub fn has_budget(&self) -> bool {
        !self.budget().is_empty()
    }

    pub fn set_budget(&mut self, budget: BudgetRange) {
        let budget = BudgetRange::new(budget.min, budget.max);
        self.min_price = budget.min;
        self.max_price = budget.max;
    }

    pub fn highest_bedroom(&self) -> Option<u8> {
        self.bedrooms.iter().next_back().copied()
    }

    pub fn with_max_price(&self, max_price: i64) -> Self {
        Self { max_price: Some(max_price), ..self.clone() }
    }

    /// Fills every key absent from `self` with the value from `base`.
    /// The budget pair and the geography pair (locality, zone) each count as one
    /// key: a request that states either half replaces both.
    pub fn overlay(mut self, base: &Filter) -> Self {
        if self.bedrooms.is_empty() {
            self.bedrooms = base.bedrooms.clone();
        }
        if !self.has_budget() {
            self.min_price = base.min_price;
            self.max_price = base.max_price;
        }
        if self.locality.is_none() && self.zone.is_none() {
            self.locality = base.locality.clone();
            self.zone = base.zone.clone();
        }
        if self.status.is_empty() {
            self.status = base.status.clone();
        }
        if self.amenities.is_empty() {
            self.amenities = base.amenities.clone();
        }
        if self.possession_by.is_none() {
            self.possession_by = base.possession_by;
        }
        self
    }
}

pub fn valid_bedrooms(value: i64) -> Option<u8> {
    u8::try_from(value).ok().filter(|bhk| (MIN_BEDROOMS..=MAX_BEDROOMS).contains(bhk))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BudgetValue {
    Whole(i64),
    Fractional(f64),
    Phrase(String),
}

impl BudgetValue {
    pub fn rupees(&self) -> Option<i64> {
        match self {
            Self::Whole(value) => (*value > 0).then_some(*value),
            Self::Fractional(value) if value.is_finite() && *value > 0.0 => {
                Some(value.round() as i64).filter(|rounded| *rounded > 0)
            }
            Self::Fractional(_) => None,
            Self::Phrase(phrase) => parse_amount(phrase),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BedroomsInput {
    One(i64),
    Many(Vec<i64>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusInput {
    One(String),
    Many(Vec<String>),
}

/// Caller-supplied structured filters. Unknown keys are ignored; invalid values
/// are dropped during `validate` rather than failing the request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterInput {
    #[serde(default)]
    pub bedrooms: Option<BedroomsInput>,
    #[serde(default)]
    pub min_price: Option<BudgetValue>,
    #[serde(default, alias = "budget")]
    pub max_price: Option<BudgetValue>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub status: Option<StatusInput>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub possession_by: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatedInput {
    pub filter: Filter,
    pub dropped: Vec<&'static str>,
}

impl FilterInput {
    pub fn validate(&self) -> ValidatedInput {
        let mut validated = ValidatedInput::default();
        let filter = &mut validated.filter;
        let dropped = &mut validated.dropped;

        match &self.bedrooms {
            Some(BedroomsInput::One(value)) => match valid_bedrooms(*value) {
                Some(bhk) => {
                    filter.bedrooms.insert(bhk);
                }
                None => dropped.push("bedrooms"),
            },
            Some(BedroomsInput::Many(values)) => {
                for value in values {
                    match valid_bedrooms(*value) {
                        Some(bhk) => {
                            filter.bedrooms.insert(bhk);
                        }
                        None => dropped.push("bedrooms"),
                    }
                }
            }
            None => {}
        }

        let min = self.min_price.as_ref().and_then(|value| {
            let parsed = value.rupees();
            if parsed.is_none() {
                dropped.push("min_price");
            }
            parsed
        });
        let max = self.max_price.as_ref().and_then(|value| {
            let parsed = value.rupees();
            if parsed.is_none() {
                dropped.push("max_price");
            }
            parsed
        });
        let budget = BudgetRange::new(min, max);
        if min.is_some() && budget.min.is_none() {
            dropped.push("min_price");
        }
        filter.set_budget(budget);

        filter.locality = non_blank(self.locality.as_deref());
        filter.zone = non_blank(self.zone.as_deref());

        let statuses = match &self.status {
            Some(StatusInput::One(value)) => vec![value.as_str()],
            Some(StatusInput::Many(values)) => values.iter().map(String::as_str).collect(),
            None => Vec::new(),
        };
        for raw in statuses {
            match ProjectStatus::parse(raw) {
                Some(status) => {
                    filter.status.insert(status);
                }
                None => dropped.push("status"),
            }
        }

        for amenity in self.amenities.iter().flatten() {
            let amenity = amenity.trim().to_ascii_lowercase();
            if !amenity.is_empty() {
                filter.amenities.insert(amenity);
            }
        }

        if let Some(raw) = self.possession_by.as_deref() {
            match parse_possession_by(raw) {
                Some(date) => filter.possession_by = Some(date),
                None => dropped.push("possession_by"),
            }
        }

        for field in &validated.dropped {
            debug!(event_name = "filter.input_dropped", field = *field, "dropped invalid filter value");
        }

        validated
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

/// Accepts `YYYY-MM-DD` or a bare year, which means the end of that year.
pub fn parse_possession_by(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let year = raw.parse::<i32>().ok().filter(|year| (2000..=2100).contains(year))?;
    NaiveDate::from_ymd_opt(year, 12, 31)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use crate::domain::inventory::ProjectStatus;

    use super::{BudgetRange, Filter, FilterInput};

    #[test]
    fn overlay_prefers_request_keys_and_inherits_the_rest() {
        let context = Filter {
            bedrooms: BTreeSet::from([2]),
            min_price: Some(5_000_000),
            max_price: Some(9_000_000),
            locality: Some("Whitefield".to_string()),
            ..Filter::default()
        };
        let request = Filter { max_price: Some(12_000_000), ..Filter::default() };

        let merged = request.overlay(&context);

        assert_eq!(merged.bedrooms, BTreeSet::from([2]));
        assert_eq!(merged.locality.as_deref(), Some("Whitefield"));
        assert_eq!(merged.budget(), BudgetRange { min: None, max: Some(12_000_000) });
    }

    #[test]
    fn geography_is_replaced_as_a_pair() {
        let context = Filter {
            locality: Some("Yelahanka".to_string()),
            zone: Some("North Bangalore".to_string()),
            ..Filter::default()
        };
        let request = Filter { locality: Some("Whitefield".to_string()), ..Filter::default() };

        let merged = request.overlay(&context);

        assert_eq!(merged.locality.as_deref(), Some("Whitefield"));
        assert_eq!(merged.zone, None);
    }

    #[test]
    fn inverted_budget_drops_lower_bound() {
        assert_eq!(
            BudgetRange::new(Some(9_000_000), Some(7_000_000)),
            BudgetRange { min: None, max: Some(7_000_000) }
        );
    }

    #[test]
    fn explicit_input_ignores_unknown_keys_and_drops_invalid_values() {
        let input: FilterInput = serde_json::from_value(serde_json::json!({
            "bedrooms": [2, 9],
            "max_price": "1.5cr",
            "min_price": -4,
            "locality": "  Yelahanka ",
            "status": "ready to move",
            "possession_by": "2027",
            "furnishing": "semi"
        }))
        .expect("filter input should deserialize");

        let validated = input.validate();

        assert_eq!(validated.filter.bedrooms, BTreeSet::from([2]));
        assert_eq!(validated.filter.max_price, Some(15_000_000));
        assert_eq!(validated.filter.min_price, None);
        assert_eq!(validated.filter.locality.as_deref(), Some("Yelahanka"));
        assert_eq!(validated.filter.status, BTreeSet::from([ProjectStatus::ReadyToMove]));
        assert_eq!(validated.filter.possession_by, NaiveDate::from_ymd_opt(2027, 12, 31));
        assert_eq!(validated.dropped, vec!["bedrooms", "min_price"]);
    }

    #[test]
    fn numeric_budgets_are_whole_rupees() {
        let input: FilterInput =
            serde_json::from_value(serde_json::json!({ "budget": 7000000, "bedrooms": 3 }))
                .expect("filter input should deserialize");

        let validated = input.validate();

        assert_eq!(validated.filter.max_price, Some(7_000_000));
        assert_eq!(validated.filter.bedrooms, BTreeSet::from([3]));
        assert!(validated.dropped.is_empty());
    }
}
