use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    ReadyToMove,
    UnderConstruction,
    NewLaunch,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadyToMove => "ready_to_move",
            Self::UnderConstruction => "under_construction",
            Self::NewLaunch => "new_launch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "ready_to_move" | "ready" | "rtm" => Some(Self::ReadyToMove),
            "under_construction" | "uc" => Some(Self::UnderConstruction),
            "new_launch" | "pre_launch" | "prelaunch" => Some(Self::NewLaunch),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ReadyToMove => "ready to move",
            Self::UnderConstruction => "under construction",
            Self::NewLaunch => "new launch",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfiguration {
    pub bhk: u8,
    /// Whole rupees.
    pub price: i64,
    pub area_sqft: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rera_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub locality: String,
    #[serde(default)]
    pub nearby_localities: Vec<String>,
    pub zone: String,
    pub configurations: Vec<UnitConfiguration>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub amenities: BTreeSet<String>,
    #[serde(default)]
    pub possession_date: Option<NaiveDate>,
    pub developer: Developer,
}

impl Project {
    /// Lowest and highest configuration price, `None` for a project without units.
    pub fn price_range(&self) -> Option<(i64, i64)> {
        let lowest = self.configurations.iter().map(|config| config.price).min()?;
        let highest = self.configurations.iter().map(|config| config.price).max()?;
        Some((lowest, highest))
    }

    pub fn starting_price(&self) -> Option<i64> {
        self.price_range().map(|(lowest, _)| lowest)
    }

    pub fn is_primary_locality(&self, locality: &str) -> bool {
        same_place(&self.locality, locality)
    }

    pub fn is_nearby_locality(&self, locality: &str) -> bool {
        self.nearby_localities.iter().any(|nearby| same_place(nearby, locality))
    }

    pub fn in_zone(&self, zone: &str) -> bool {
        same_place(&self.zone, zone)
    }

    pub fn has_amenity(&self, amenity: &str) -> bool {
        self.amenities.iter().any(|owned| owned.eq_ignore_ascii_case(amenity.trim()))
    }
}

/// Case- and whitespace-insensitive comparison of place names.
pub fn same_place(left: &str, right: &str) -> bool {
    let left = left.split_whitespace();
    let mut right = right.split_whitespace();
    for word in left {
        match right.next() {
            Some(other) if other.eq_ignore_ascii_case(word) => {}
            _ => return false,
        }
    }
    right.next().is_none()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{same_place, Developer, Project, ProjectId, ProjectStatus, UnitConfiguration};

    fn project() -> Project {
        Project {
            id: ProjectId("prj-1".to_string()),
            name: "Aster Greens".to_string(),
            locality: "Yelahanka".to_string(),
            nearby_localities: vec!["Jakkur".to_string()],
            zone: "North Bangalore".to_string(),
            configurations: vec![
                UnitConfiguration { bhk: 3, price: 14_000_000, area_sqft: 1_650 },
                UnitConfiguration { bhk: 2, price: 9_500_000, area_sqft: 1_150 },
            ],
            status: ProjectStatus::UnderConstruction,
            amenities: BTreeSet::from(["pool".to_string()]),
            possession_date: None,
            developer: Developer { name: "Aster Homes".to_string(), rera_id: None },
        }
    }

    #[test]
    fn price_range_spans_all_configurations() {
        assert_eq!(project().price_range(), Some((9_500_000, 14_000_000)));
        assert_eq!(project().starting_price(), Some(9_500_000));
    }

    #[test]
    fn place_names_compare_case_and_spacing_insensitively() {
        let project = project();
        assert!(project.is_primary_locality("yelahanka"));
        assert!(project.is_nearby_locality("JAKKUR"));
        assert!(project.in_zone("north  bangalore"));
        assert!(!same_place("North Bangalore", "North"));
        assert!(project.has_amenity(" Pool"));
    }

    #[test]
    fn status_parses_common_spellings() {
        assert_eq!(ProjectStatus::parse("Ready to move"), Some(ProjectStatus::ReadyToMove));
        assert_eq!(ProjectStatus::parse("pre-launch"), Some(ProjectStatus::NewLaunch));
        assert_eq!(ProjectStatus::parse("sold out"), None);
    }
}
