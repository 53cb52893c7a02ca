use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use propmatch_agent::llm::GuardedLlm;
use propmatch_agent::phrasing::PromptError;
use propmatch_agent::AgentRuntime;
use propmatch_core::config::{AppConfig, ConfigError, InventorySourceKind, LoadOptions};
use propmatch_core::errors::CollaboratorError;
use propmatch_core::inventory::source::JsonFileInventorySource;
use propmatch_core::inventory::{InventoryCache, InventorySource};
use propmatch_core::matching::MatchingEngine;
use propmatch_db::{
    connect_with_settings, migrations, DbPool, FallbackContextStore, InMemoryContextStore,
    SqlContextStore, SqlInventorySource,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub inventory: Arc<InventoryCache>,
    pub sql_contexts: Arc<SqlContextStore>,
    pub memory_contexts: Arc<InMemoryContextStore>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client could not be built: {0}")]
    Llm(#[source] CollaboratorError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let source: Arc<dyn InventorySource> = match (config.inventory.source, &config.inventory.file_path) {
        (InventorySourceKind::File, Some(path)) => Arc::new(JsonFileInventorySource::new(path.clone())),
        _ => Arc::new(SqlInventorySource::new(db_pool.clone())),
    };
    let inventory = Arc::new(InventoryCache::new(
        source,
        Duration::from_millis(config.inventory.fetch_timeout_ms),
    ));
    if let Err(error) = inventory.refresh().await {
        // requests retry the load lazily until a refresh succeeds
        warn!(
            event_name = "system.bootstrap.inventory_unavailable",
            correlation_id = "bootstrap",
            error = %error,
            "initial inventory load failed"
        );
    }

    let ttl = config.context.ttl();
    let sql_contexts = Arc::new(SqlContextStore::new(db_pool.clone(), ttl));
    let memory_contexts = Arc::new(InMemoryContextStore::new(ttl));
    let contexts = Arc::new(FallbackContextStore::new(sql_contexts.clone(), memory_contexts.clone()));

    let llm = GuardedLlm::from_config(&config.llm).map_err(BootstrapError::Llm)?;
    info!(
        event_name = "system.bootstrap.llm_configured",
        correlation_id = "bootstrap",
        enabled = llm.is_enabled(),
        provider = ?config.llm.provider,
        "llm collaborator configured"
    );

    let runtime = AgentRuntime::new(inventory.clone(), contexts, llm)?
        .with_engine(MatchingEngine::from_config(&config.matching))
        .with_relaxation(config.relaxation.policy());

    Ok(Application {
        config,
        db_pool,
        inventory,
        sql_contexts,
        memory_contexts,
        runtime: Arc::new(runtime),
    })
}

impl Application {
    /// Inventory refresh and context purge timers. Abort the handles on shutdown.
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        let refresh =
            self.inventory.spawn_refresh(Duration::from_secs(self.config.inventory.refresh_secs));

        let sql_contexts = self.sql_contexts.clone();
        let memory_contexts = self.memory_contexts.clone();
        let every = Duration::from_secs(self.config.context.cleanup_interval_secs.max(1));
        let purge = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                match sql_contexts.purge_expired(now).await {
                    Ok(purged) => {
                        debug!(event_name = "context_store.sqlite.purged", purged, "purged expired contexts")
                    }
                    Err(error) => warn!(
                        event_name = "context_store.sqlite.purge_failed",
                        error = %error,
                        "context purge failed"
                    ),
                }
                memory_contexts.purge_expired(now).await;
            }
        });

        vec![refresh, purge]
    }
}

#[cfg(test)]
mod tests {
    use propmatch_core::config::{ConfigOverrides, InventorySourceKind, LoadOptions};
    use propmatch_db::DemoInventory;

    use crate::bootstrap::bootstrap;

    fn in_memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                inventory_source: Some(InventorySourceKind::Sqlite),
                llm_enabled: Some(false),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_file_source_has_no_path() {
        let mut options = in_memory_options();
        options.overrides.inventory_source = Some(InventorySourceKind::File);

        let message = bootstrap(options).await.err().expect("config must be rejected").to_string();

        assert!(message.contains("inventory.file_path"), "{message}");
    }

    #[tokio::test]
    async fn bootstrapped_runtime_serves_seeded_inventory() {
        let app = bootstrap(in_memory_options()).await.expect("bootstrap with in-memory database");
        assert!(!app.inventory.is_loaded(), "empty tables must not produce a snapshot");

        DemoInventory::load(&app.db_pool).await.expect("seed demo inventory");
        app.inventory.refresh().await.expect("refresh after seeding");

        let response = app
            .runtime
            .handle("bootstrap-smoke", "2BHK in Yelahanka under 1.5 crore", None)
            .await
            .expect("valid request");
        assert_eq!(response.projects[0].name, "Aster Greens");

        let (saved,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversation_context")
            .fetch_one(&app.db_pool)
            .await
            .expect("count context rows");
        assert_eq!(saved, 1);

        app.db_pool.close().await;
    }
}
