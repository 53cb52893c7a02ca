//! Read-mostly inventory snapshots and the sources they are built from.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::inventory::{Project, ProjectId};
use crate::errors::InventoryError;

pub mod cache;
pub mod source;

pub use cache::InventoryCache;
pub use source::{JsonFileInventorySource, StaticInventorySource};

#[async_trait]
pub trait InventorySource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self) -> Result<Vec<Project>, InventoryError>;
}

#[derive(Clone, Debug)]
pub struct InventorySnapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    projects: Vec<Project>,
    vocabulary: Vocabulary,
}

impl InventorySnapshot {
    /// Projects are held in id order so iteration is stable across snapshots.
    pub fn new(version: u64, mut projects: Vec<Project>) -> Self {
        projects.sort_by(|left, right| left.id.cmp(&right.id));
        let vocabulary = Vocabulary::from_projects(&projects);
        Self { version, loaded_at: Utc::now(), projects, vocabulary }
    }

    /// Placeholder held before the first successful load.
    pub fn unloaded() -> Self {
        Self {
            version: 0,
            loaded_at: DateTime::<Utc>::MIN_UTC,
            projects: Vec::new(),
            vocabulary: Vocabulary::default(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.version > 0
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// Place and project names the normalizer may recognise in free text.
/// Each list is ordered longest first so greedy matching prefers `North Bangalore`
/// over `Bangalore`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vocabulary {
    localities: Vec<String>,
    zones: Vec<String>,
    amenities: Vec<String>,
    project_names: Vec<(String, ProjectId)>,
}

impl Vocabulary {
    pub fn from_projects(projects: &[Project]) -> Self {
        let mut localities = BTreeMap::new();
        let mut zones = BTreeMap::new();
        let mut amenities = BTreeMap::new();
        let mut project_names = BTreeMap::new();

        for project in projects {
            remember(&mut localities, &project.locality);
            for nearby in &project.nearby_localities {
                remember(&mut localities, nearby);
            }
            remember(&mut zones, &project.zone);
            for amenity in &project.amenities {
                remember(&mut amenities, amenity);
            }
            project_names
                .entry(fold(&project.name))
                .or_insert_with(|| (project.name.trim().to_string(), project.id.clone()));
        }

        Self {
            localities: longest_first(localities.into_values().collect()),
            zones: longest_first(zones.into_values().collect()),
            amenities: longest_first(amenities.into_values().collect()),
            project_names: {
                let mut names: Vec<(String, ProjectId)> = project_names.into_values().collect();
                names.sort_by(|left, right| {
                    right.0.len().cmp(&left.0.len()).then_with(|| left.0.cmp(&right.0))
                });
                names
            },
        }
    }

    pub fn localities(&self) -> &[String] {
        &self.localities
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn amenities(&self) -> &[String] {
        &self.amenities
    }

    pub fn project_names(&self) -> &[(String, ProjectId)] {
        &self.project_names
    }

    pub fn canonical_locality(&self, raw: &str) -> Option<&str> {
        canonical(&self.localities, raw)
    }

    pub fn canonical_zone(&self, raw: &str) -> Option<&str> {
        canonical(&self.zones, raw)
    }
}

fn fold(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn remember(entries: &mut BTreeMap<String, String>, value: &str) {
    let key = fold(value);
    if !key.is_empty() {
        entries.entry(key).or_insert_with(|| value.split_whitespace().collect::<Vec<_>>().join(" "));
    }
}

fn longest_first(mut values: Vec<String>) -> Vec<String> {
    values.sort_by(|left, right| right.len().cmp(&left.len()).then_with(|| left.cmp(right)));
    values
}

fn canonical<'a>(values: &'a [String], raw: &str) -> Option<&'a str> {
    let key = fold(raw);
    values.iter().find(|value| fold(value) == key).map(String::as_str)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeSet;

    use crate::domain::inventory::{
        Developer, Project, ProjectId, ProjectStatus, UnitConfiguration,
    };

    pub fn project(
        id: &str,
        name: &str,
        locality: &str,
        zone: &str,
        configurations: &[(u8, i64)],
    ) -> Project {
        Project {
            id: ProjectId(id.to_string()),
            name: name.to_string(),
            locality: locality.to_string(),
            nearby_localities: Vec::new(),
            zone: zone.to_string(),
            configurations: configurations
                .iter()
                .map(|(bhk, price)| UnitConfiguration {
                    bhk: *bhk,
                    price: *price,
                    area_sqft: 500 + u32::from(*bhk) * 450,
                })
                .collect(),
            status: ProjectStatus::UnderConstruction,
            amenities: BTreeSet::new(),
            possession_date: None,
            developer: Developer { name: format!("{name} Developers"), rera_id: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::inventory::ProjectId;

    use super::test_support::project;
    use super::InventorySnapshot;

    #[test]
    fn snapshot_orders_projects_and_builds_vocabulary() {
        let mut whitefield = project("p2", "Orchid Heights", "Whitefield", "East Bangalore", &[]);
        whitefield.nearby_localities = vec!["Brookefield".to_string()];
        whitefield.amenities.insert("clubhouse".to_string());
        let snapshot = InventorySnapshot::new(
            3,
            vec![whitefield, project("p1", "Aster Greens", "Yelahanka", "North Bangalore", &[])],
        );

        assert_eq!(snapshot.version(), 3);
        assert!(snapshot.is_loaded());
        assert_eq!(snapshot.projects()[0].id, ProjectId("p1".to_string()));
        assert_eq!(snapshot.projects()[1].id, ProjectId("p2".to_string()));

        let vocabulary = snapshot.vocabulary();
        assert_eq!(vocabulary.localities(), ["Brookefield", "Whitefield", "Yelahanka"]);
        assert_eq!(vocabulary.zones(), ["North Bangalore", "East Bangalore"]);
        assert_eq!(vocabulary.canonical_locality("whitefield"), Some("Whitefield"));
        assert_eq!(vocabulary.canonical_zone("north  bangalore"), Some("North Bangalore"));
        assert_eq!(vocabulary.amenities(), ["clubhouse"]);
        assert_eq!(vocabulary.project_names()[0].0, "Orchid Heights");
    }

    #[test]
    fn unloaded_snapshot_is_empty() {
        let snapshot = InventorySnapshot::unloaded();
        assert!(!snapshot.is_loaded());
        assert!(snapshot.projects().is_empty());
    }
}
