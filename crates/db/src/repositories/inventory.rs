use std::collections::BTreeMap;

use chrono::{NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use propmatch_core::domain::inventory::{
    Developer, Project, ProjectId, ProjectStatus, UnitConfiguration,
};
use propmatch_core::errors::InventoryError;
use propmatch_core::inventory::InventorySource;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlInventorySource {
    pool: DbPool,
}

impl SqlInventorySource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn load_projects(&self) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, locality, zone, status, possession_date,
                    developer_name, developer_rera_id
             FROM project
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut projects = BTreeMap::new();
        for row in rows {
            let project = project_from_row(&row)?;
            projects.insert(project.id.0.clone(), project);
        }

        let configurations = sqlx::query(
            "SELECT project_id, bhk, price, area_sqft
             FROM unit_configuration
             ORDER BY project_id, price, bhk",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in configurations {
            let project_id: String = row.try_get("project_id")?;
            let configuration = UnitConfiguration {
                bhk: parse_narrow("bhk", row.try_get("bhk")?)?,
                price: row.try_get("price")?,
                area_sqft: parse_narrow("area_sqft", row.try_get("area_sqft")?)?,
            };
            if let Some(project) = projects.get_mut(&project_id) {
                project.configurations.push(configuration);
            }
        }

        let amenities =
            sqlx::query("SELECT project_id, amenity FROM project_amenity").fetch_all(&self.pool).await?;
        for row in amenities {
            let project_id: String = row.try_get("project_id")?;
            if let Some(project) = projects.get_mut(&project_id) {
                project.amenities.insert(row.try_get("amenity")?);
            }
        }

        let nearby = sqlx::query(
            "SELECT project_id, locality FROM project_nearby_locality ORDER BY project_id, locality",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in nearby {
            let project_id: String = row.try_get("project_id")?;
            if let Some(project) = projects.get_mut(&project_id) {
                project.nearby_localities.push(row.try_get("locality")?);
            }
        }

        Ok(projects.into_values().collect())
    }

    /// Replaces the whole inventory in one transaction.
    pub async fn replace_all(&self, projects: &[Project]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        sqlx::query("DELETE FROM project").execute(&mut *tx).await?;

        for project in projects {
            sqlx::query(
                "INSERT INTO project (
                    id, name, locality, zone, status, possession_date,
                    developer_name, developer_rera_id, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&project.id.0)
            .bind(&project.name)
            .bind(&project.locality)
            .bind(&project.zone)
            .bind(project.status.as_str())
            .bind(project.possession_date.map(|date| date.format("%Y-%m-%d").to_string()))
            .bind(&project.developer.name)
            .bind(project.developer.rera_id.as_deref())
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;

            for configuration in &project.configurations {
                sqlx::query(
                    "INSERT INTO unit_configuration (project_id, bhk, price, area_sqft)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&project.id.0)
                .bind(i64::from(configuration.bhk))
                .bind(configuration.price)
                .bind(i64::from(configuration.area_sqft))
                .execute(&mut *tx)
                .await?;
            }

            for amenity in &project.amenities {
                sqlx::query("INSERT INTO project_amenity (project_id, amenity) VALUES (?, ?)")
                    .bind(&project.id.0)
                    .bind(amenity)
                    .execute(&mut *tx)
                    .await?;
            }

            for locality in &project.nearby_localities {
                sqlx::query(
                    "INSERT OR IGNORE INTO project_nearby_locality (project_id, locality) VALUES (?, ?)",
                )
                .bind(&project.id.0)
                .bind(locality)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(projects.len())
    }
}

#[async_trait::async_trait]
impl InventorySource for SqlInventorySource {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch(&self) -> Result<Vec<Project>, InventoryError> {
        Ok(self.load_projects().await?)
    }
}

fn project_from_row(row: &SqliteRow) -> Result<Project, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = ProjectStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown project status `{status_raw}`")))?;

    let possession_raw: Option<String> = row.try_get("possession_date")?;
    let possession_date = possession_raw
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
                RepositoryError::Decode(format!(
                    "invalid date in `possession_date`: `{value}` ({error})"
                ))
            })
        })
        .transpose()?;

    Ok(Project {
        id: ProjectId(row.try_get("id")?),
        name: row.try_get("name")?,
        locality: row.try_get("locality")?,
        nearby_localities: Vec::new(),
        zone: row.try_get("zone")?,
        configurations: Vec::new(),
        status,
        amenities: Default::default(),
        possession_date,
        developer: Developer {
            name: row.try_get("developer_name")?,
            rera_id: row.try_get("developer_rera_id")?,
        },
    })
}

fn parse_narrow<T: TryFrom<i64>>(column: &str, value: i64) -> Result<T, RepositoryError> {
    T::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!("value out of range for `{column}`: {value}"))
    })
}
