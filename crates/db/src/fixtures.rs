use propmatch_core::domain::inventory::Project;
use propmatch_core::inventory::source::parse_projects;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlInventorySource};

/// Bangalore demo inventory used by `propmatch seed --demo` and the scenario tests.
pub struct DemoInventory;

impl DemoInventory {
    pub const JSON: &'static str = include_str!("../../../config/fixtures/demo_inventory.json");

    pub fn projects() -> Result<Vec<Project>, RepositoryError> {
        parse_projects(Self::JSON).map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    /// Loads the demo inventory, replacing whatever the tables held.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let projects = Self::projects()?;
        Self::load_projects(pool, &projects).await
    }

    pub async fn load_projects(
        pool: &DbPool,
        projects: &[Project],
    ) -> Result<SeedResult, RepositoryError> {
        let source = SqlInventorySource::new(pool.clone());
        let projects_seeded = source.replace_all(projects).await?;
        let configurations_seeded =
            projects.iter().map(|project| project.configurations.len()).sum();
        Ok(SeedResult { projects_seeded, configurations_seeded })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub projects_seeded: usize,
    pub configurations_seeded: usize,
}
