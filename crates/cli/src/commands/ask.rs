//! One-shot search turn against the configured database, for operators checking
//! what a conversation would see.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use propmatch_agent::llm::GuardedLlm;
use propmatch_agent::AgentRuntime;
use propmatch_core::config::{AppConfig, InventorySourceKind};
use propmatch_core::domain::filter::FilterInput;
use propmatch_core::inventory::source::JsonFileInventorySource;
use propmatch_core::inventory::{InventoryCache, InventorySource};
use propmatch_core::matching::MatchingEngine;
use propmatch_db::{
    DbPool, FallbackContextStore, InMemoryContextStore, SqlContextStore, SqlInventorySource,
};

use crate::commands::{async_runtime, load_config, open_database, CommandResult, StepError};

const EXIT_BAD_INPUT: u8 = 8;
const EXIT_SETUP: u8 = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskArgs {
    pub conversation_id: String,
    pub query: String,
    pub filters_json: Option<String>,
}

pub fn run(args: AskArgs) -> CommandResult {
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let filters = match parse_filters(args.filters_json.as_deref()) {
        Ok(filters) => filters,
        Err(step) => return CommandResult::from_step("ask", step),
    };
    let runtime = match async_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let answer = ask(&config, pool.clone(), &args, filters.as_ref()).await;
        pool.close().await;
        answer
    });

    match result {
        Ok(data) => CommandResult::success_with_data(
            "ask",
            format!("answered turn for conversation {}", args.conversation_id.trim()),
            Some(data),
        ),
        Err(step) => CommandResult::from_step("ask", step),
    }
}

fn parse_filters(raw: Option<&str>) -> Result<Option<FilterInput>, StepError> {
    raw.map(|raw| {
        serde_json::from_str::<FilterInput>(raw)
            .map_err(|error| ("invalid_filters", format!("--filters is not valid JSON: {error}"), EXIT_BAD_INPUT))
    })
    .transpose()
}

async fn ask(
    config: &AppConfig,
    pool: DbPool,
    args: &AskArgs,
    filters: Option<&FilterInput>,
) -> Result<serde_json::Value, StepError> {
    let runtime = build_runtime(config, pool)
        .map_err(|error| ("runtime_setup", format!("{error:#}"), EXIT_SETUP))?;
    let response = runtime
        .handle(&args.conversation_id, &args.query, filters)
        .await
        .map_err(|error| ("bad_request", error.to_string(), EXIT_BAD_INPUT))?;
    serde_json::to_value(response).map_err(|error| ("serialization", error.to_string(), EXIT_SETUP))
}

fn build_runtime(config: &AppConfig, pool: DbPool) -> anyhow::Result<AgentRuntime> {
    let source: Arc<dyn InventorySource> = match (config.inventory.source, &config.inventory.file_path) {
        (InventorySourceKind::File, Some(path)) => Arc::new(JsonFileInventorySource::new(path.clone())),
        _ => Arc::new(SqlInventorySource::new(pool.clone())),
    };
    let inventory = Arc::new(InventoryCache::new(
        source,
        Duration::from_millis(config.inventory.fetch_timeout_ms),
    ));

    let ttl = config.context.ttl();
    let contexts = Arc::new(FallbackContextStore::new(
        Arc::new(SqlContextStore::new(pool, ttl)),
        Arc::new(InMemoryContextStore::new(ttl)),
    ));

    let llm = GuardedLlm::from_config(&config.llm).context("building llm client")?;
    let runtime = AgentRuntime::new(inventory, contexts, llm)
        .context("compiling prompt templates")?
        .with_engine(MatchingEngine::from_config(&config.matching))
        .with_relaxation(config.relaxation.policy());
    Ok(runtime)
}
