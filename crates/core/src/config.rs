use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matching::relaxation::RelaxationPolicy;
use crate::matching::scoring::ScoringWeights;

/// Thirty days; longer idle conversations are not worth resuming.
pub const MAX_CONTEXT_TTL_SECS: u64 = 2_592_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub inventory: InventoryConfig,
    pub context: ContextConfig,
    pub llm: LlmConfig,
    pub matching: MatchingConfig,
    pub relaxation: RelaxationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct InventoryConfig {
    pub source: InventorySourceKind,
    pub file_path: Option<PathBuf>,
    pub refresh_secs: u64,
    pub fetch_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub total_timeout_secs: u64,
    pub max_retries: u32,
}

/// Score weights are deployment tuning, not business rules.
#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub weights: ScoringWeights,
    pub max_results: usize,
    pub include_upgrade_configurations: bool,
}

#[derive(Clone, Debug)]
pub struct RelaxationConfig {
    pub step_pct: u32,
    pub ceiling_pct: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventorySourceKind {
    Sqlite,
    File,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub inventory_source: Option<InventorySourceKind>,
    pub inventory_file: Option<PathBuf>,
    pub context_ttl_secs: Option<u64>,
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://propmatch.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            inventory: InventoryConfig {
                source: InventorySourceKind::Sqlite,
                file_path: None,
                refresh_secs: 300,
                fetch_timeout_ms: 5_000,
            },
            context: ContextConfig { ttl_secs: 1_800, cleanup_interval_secs: 60 },
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 10,
                total_timeout_secs: 15,
                max_retries: 1,
            },
            matching: MatchingConfig {
                weights: ScoringWeights::default(),
                max_results: 10,
                include_upgrade_configurations: true,
            },
            relaxation: RelaxationConfig { step_pct: 10, ceiling_pct: 200 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl ContextConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.ttl_secs).unwrap_or(MAX_CONTEXT_TTL_SECS as i64))
    }
}

impl RelaxationConfig {
    pub fn policy(&self) -> RelaxationPolicy {
        RelaxationPolicy::new(
            Decimal::new(i64::from(self.step_pct), 2),
            Decimal::new(i64::from(self.ceiling_pct), 2),
        )
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for InventorySourceKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "file" => Ok(Self::File),
            other => Err(ConfigError::Validation(format!(
                "unsupported inventory source `{other}` (expected sqlite|file)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("propmatch.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(inventory) = patch.inventory {
            if let Some(source) = inventory.source {
                self.inventory.source = source;
            }
            if let Some(file_path) = inventory.file_path {
                self.inventory.file_path = Some(file_path);
            }
            if let Some(refresh_secs) = inventory.refresh_secs {
                self.inventory.refresh_secs = refresh_secs;
            }
            if let Some(fetch_timeout_ms) = inventory.fetch_timeout_ms {
                self.inventory.fetch_timeout_ms = fetch_timeout_ms;
            }
        }

        if let Some(context) = patch.context {
            if let Some(ttl_secs) = context.ttl_secs {
                self.context.ttl_secs = ttl_secs;
            }
            if let Some(cleanup_interval_secs) = context.cleanup_interval_secs {
                self.context.cleanup_interval_secs = cleanup_interval_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(total_timeout_secs) = llm.total_timeout_secs {
                self.llm.total_timeout_secs = total_timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(matching) = patch.matching {
            let weights = &mut self.matching.weights;
            if let Some(value) = matching.locality_primary {
                weights.locality_primary = value;
            }
            if let Some(value) = matching.locality_secondary {
                weights.locality_secondary = value;
            }
            if let Some(value) = matching.locality_miss {
                weights.locality_miss = value;
            }
            if let Some(value) = matching.zone {
                weights.zone = value;
            }
            if let Some(value) = matching.budget_overlap {
                weights.budget_overlap = value;
            }
            if let Some(value) = matching.budget_tolerance {
                weights.budget_tolerance = value;
            }
            if let Some(value) = matching.tolerance_pct {
                weights.tolerance_pct = value;
            }
            if let Some(value) = matching.bhk_exact {
                weights.bhk_exact = value;
            }
            if let Some(value) = matching.bhk_upgrade {
                weights.bhk_upgrade = value;
            }
            if let Some(max_results) = matching.max_results {
                self.matching.max_results = max_results;
            }
            if let Some(include) = matching.include_upgrade_configurations {
                self.matching.include_upgrade_configurations = include;
            }
        }

        if let Some(relaxation) = patch.relaxation {
            if let Some(step_pct) = relaxation.step_pct {
                self.relaxation.step_pct = step_pct;
            }
            if let Some(ceiling_pct) = relaxation.ceiling_pct {
                self.relaxation.ceiling_pct = ceiling_pct;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROPMATCH_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PROPMATCH_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("PROPMATCH_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PROPMATCH_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PROPMATCH_INVENTORY_SOURCE") {
            self.inventory.source = value.parse()?;
        }
        if let Some(value) = read_env("PROPMATCH_INVENTORY_FILE") {
            self.inventory.file_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("PROPMATCH_INVENTORY_REFRESH_SECS") {
            self.inventory.refresh_secs = parse_u64("PROPMATCH_INVENTORY_REFRESH_SECS", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_INVENTORY_FETCH_TIMEOUT_MS") {
            self.inventory.fetch_timeout_ms =
                parse_u64("PROPMATCH_INVENTORY_FETCH_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("PROPMATCH_CONTEXT_TTL_SECS") {
            self.context.ttl_secs = parse_u64("PROPMATCH_CONTEXT_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_CONTEXT_CLEANUP_INTERVAL_SECS") {
            self.context.cleanup_interval_secs =
                parse_u64("PROPMATCH_CONTEXT_CLEANUP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("PROPMATCH_LLM_ENABLED") {
            self.llm.enabled = parse_bool("PROPMATCH_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("PROPMATCH_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROPMATCH_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PROPMATCH_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PROPMATCH_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PROPMATCH_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_LLM_TOTAL_TIMEOUT_SECS") {
            self.llm.total_timeout_secs = parse_u64("PROPMATCH_LLM_TOTAL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("PROPMATCH_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PROPMATCH_MATCHING_MAX_RESULTS") {
            self.matching.max_results = parse_u32("PROPMATCH_MATCHING_MAX_RESULTS", &value)?
                as usize;
        }
        if let Some(value) = read_env("PROPMATCH_RELAXATION_STEP_PCT") {
            self.relaxation.step_pct = parse_u32("PROPMATCH_RELAXATION_STEP_PCT", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_RELAXATION_CEILING_PCT") {
            self.relaxation.ceiling_pct = parse_u32("PROPMATCH_RELAXATION_CEILING_PCT", &value)?;
        }

        if let Some(value) = read_env("PROPMATCH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PROPMATCH_SERVER_PORT") {
            self.server.port = parse_u16("PROPMATCH_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PROPMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PROPMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PROPMATCH_LOGGING_LEVEL").or_else(|| read_env("PROPMATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROPMATCH_LOGGING_FORMAT").or_else(|| read_env("PROPMATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(source) = overrides.inventory_source {
            self.inventory.source = source;
        }
        if let Some(inventory_file) = overrides.inventory_file {
            self.inventory.file_path = Some(inventory_file);
        }
        if let Some(ttl_secs) = overrides.context_ttl_secs {
            self.context.ttl_secs = ttl_secs;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_inventory(&self.inventory)?;
        validate_context(&self.context)?;
        validate_llm(&self.llm)?;
        validate_matching(&self.matching)?;
        validate_relaxation(&self.relaxation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("propmatch.toml"), PathBuf::from("config/propmatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_inventory(inventory: &InventoryConfig) -> Result<(), ConfigError> {
    if inventory.source == InventorySourceKind::File && inventory.file_path.is_none() {
        return Err(ConfigError::Validation(
            "inventory.file_path is required when inventory.source = \"file\"".to_string(),
        ));
    }

    if inventory.refresh_secs == 0 {
        return Err(ConfigError::Validation(
            "inventory.refresh_secs must be greater than zero".to_string(),
        ));
    }

    if inventory.fetch_timeout_ms == 0 || inventory.fetch_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "inventory.fetch_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_context(context: &ContextConfig) -> Result<(), ConfigError> {
    if context.ttl_secs == 0 || context.ttl_secs > MAX_CONTEXT_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "context.ttl_secs must be in range 1..={MAX_CONTEXT_TTL_SECS}"
        )));
    }

    if context.cleanup_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "context.cleanup_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.total_timeout_secs < llm.timeout_secs {
        return Err(ConfigError::Validation(
            "llm.total_timeout_secs must be at least llm.timeout_secs".to_string(),
        ));
    }

    if llm.max_retries > 5 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 5".to_string()));
    }

    if !llm.enabled {
        return Ok(());
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.max_results == 0 || matching.max_results > 50 {
        return Err(ConfigError::Validation(
            "matching.max_results must be in range 1..=50".to_string(),
        ));
    }

    if matching.weights.tolerance_pct > 100 {
        return Err(ConfigError::Validation(
            "matching.tolerance_pct must be in range 0..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_relaxation(relaxation: &RelaxationConfig) -> Result<(), ConfigError> {
    if relaxation.step_pct == 0 || relaxation.step_pct > 100 {
        return Err(ConfigError::Validation(
            "relaxation.step_pct must be in range 1..=100".to_string(),
        ));
    }

    if relaxation.ceiling_pct <= 100 || relaxation.ceiling_pct > 500 {
        return Err(ConfigError::Validation(
            "relaxation.ceiling_pct must be in range 101..=500 (200 = 2.0x budget)".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    inventory: Option<InventoryPatch>,
    context: Option<ContextPatch>,
    llm: Option<LlmPatch>,
    matching: Option<MatchingPatch>,
    relaxation: Option<RelaxationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryPatch {
    source: Option<InventorySourceKind>,
    file_path: Option<PathBuf>,
    refresh_secs: Option<u64>,
    fetch_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextPatch {
    ttl_secs: Option<u64>,
    cleanup_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    total_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    locality_primary: Option<i64>,
    locality_secondary: Option<i64>,
    locality_miss: Option<i64>,
    zone: Option<i64>,
    budget_overlap: Option<i64>,
    budget_tolerance: Option<i64>,
    tolerance_pct: Option<u32>,
    bhk_exact: Option<i64>,
    bhk_upgrade: Option<i64>,
    max_results: Option<usize>,
    include_upgrade_configurations: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RelaxationPatch {
    step_pct: Option<u32>,
    ceiling_pct: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
