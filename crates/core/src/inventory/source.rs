use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::inventory::Project;
use crate::errors::InventoryError;
use crate::inventory::InventorySource;

/// In-memory project list; `replace` lets tests and demos simulate an upstream change.
#[derive(Debug, Default)]
pub struct StaticInventorySource {
    projects: RwLock<Vec<Project>>,
}

impl StaticInventorySource {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects: RwLock::new(projects) }
    }

    pub async fn replace(&self, projects: Vec<Project>) {
        *self.projects.write().await = projects;
    }
}

#[async_trait]
impl InventorySource for StaticInventorySource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<Project>, InventoryError> {
        Ok(self.projects.read().await.clone())
    }
}

/// Reads a JSON array of projects from disk on every fetch.
#[derive(Clone, Debug)]
pub struct JsonFileInventorySource {
    path: PathBuf,
}

impl JsonFileInventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

pub fn parse_projects(raw: &str) -> Result<Vec<Project>, InventoryError> {
    serde_json::from_str(raw)
        .map_err(|error| InventoryError::Source(format!("invalid inventory json: {error}")))
}

#[async_trait]
impl InventorySource for JsonFileInventorySource {
    fn name(&self) -> &'static str {
        "json_file"
    }

    async fn fetch(&self) -> Result<Vec<Project>, InventoryError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|error| {
            InventoryError::Source(format!("could not read `{}`: {error}", self.path.display()))
        })?;
        parse_projects(&raw)
    }
}
