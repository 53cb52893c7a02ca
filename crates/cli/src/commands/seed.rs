use std::fs;
use std::path::{Path, PathBuf};

use propmatch_core::domain::inventory::Project;
use propmatch_core::inventory::source::parse_projects;
use propmatch_db::{DemoInventory, SeedResult};

use crate::commands::{async_runtime, load_config, open_database, CommandResult, StepError};

const EXIT_SOURCE: u8 = 6;
const EXIT_SEED: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    Demo,
    File(PathBuf),
}

impl SeedSource {
    fn label(&self) -> String {
        match self {
            Self::Demo => "demo inventory".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }

    fn projects(&self) -> Result<Vec<Project>, StepError> {
        match self {
            Self::Demo => DemoInventory::projects()
                .map_err(|error| ("seed_source", error.to_string(), EXIT_SOURCE)),
            Self::File(path) => read_projects(path),
        }
    }
}

fn read_projects(path: &Path) -> Result<Vec<Project>, StepError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        ("seed_source", format!("cannot read {}: {error}", path.display()), EXIT_SOURCE)
    })?;
    let projects = parse_projects(&raw).map_err(|error| {
        ("seed_source", format!("{} is not a valid inventory: {error}", path.display()), EXIT_SOURCE)
    })?;
    if projects.is_empty() {
        return Err(("seed_source", format!("{} contains no projects", path.display()), EXIT_SOURCE));
    }
    Ok(projects)
}

/// Replaces the inventory tables with `source`; running it twice is harmless.
pub fn run(source: SeedSource) -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let projects = match source.projects() {
        Ok(projects) => projects,
        Err(step) => return CommandResult::from_step("seed", step),
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let seeded = DemoInventory::load_projects(&pool, &projects)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED));
        pool.close().await;
        seeded
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded, &source.label())),
        Err(step) => CommandResult::from_step("seed", step),
    }
}

fn summary(seeded: &SeedResult, label: &str) -> String {
    format!(
        "seeded {} projects and {} unit configurations from {label}",
        seeded.projects_seeded, seeded.configurations_seeded
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use propmatch_db::SeedResult;

    use super::{read_projects, summary};

    #[test]
    fn summary_names_counts_and_source() {
        let seeded = SeedResult { projects_seeded: 8, configurations_seeded: 16 };
        assert_eq!(
            summary(&seeded, "demo inventory"),
            "seeded 8 projects and 16 unit configurations from demo inventory"
        );
    }

    #[test]
    fn empty_inventory_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[]").expect("write inventory");

        let (error_class, message, exit_code) =
            read_projects(file.path()).expect_err("empty inventory must be rejected");

        assert_eq!(error_class, "seed_source");
        assert!(message.contains("contains no projects"));
        assert_eq!(exit_code, 6);
    }

    #[test]
    fn unreadable_inventory_file_is_reported() {
        let (error_class, message, _) =
            read_projects(std::path::Path::new("does/not/exist.json")).expect_err("missing file");

        assert_eq!(error_class, "seed_source");
        assert!(message.starts_with("cannot read does/not/exist.json"));
    }
}
