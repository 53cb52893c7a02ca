use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use propmatch_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// One reported setting: dotted key, rendered value, overriding env var.
struct Field {
    key: &'static str,
    value: String,
    env_key: &'static str,
}

impl Field {
    fn new(key: &'static str, value: impl ToString, env_key: &'static str) -> Self {
        Self { key, value: value.to_string(), env_key }
    }
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = match &config.llm.api_key {
        Some(key) => redact_secret(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Field::new("database.url", &config.database.url, "PROPMATCH_DATABASE_URL"),
        Field::new(
            "database.max_connections",
            config.database.max_connections,
            "PROPMATCH_DATABASE_MAX_CONNECTIONS",
        ),
        Field::new("inventory.source", format!("{:?}", config.inventory.source), "PROPMATCH_INVENTORY_SOURCE"),
        Field::new(
            "inventory.file_path",
            config.inventory.file_path.as_deref().map_or("<unset>".into(), |path| path.display().to_string()),
            "PROPMATCH_INVENTORY_FILE",
        ),
        Field::new("inventory.refresh_secs", config.inventory.refresh_secs, "PROPMATCH_INVENTORY_REFRESH_SECS"),
        Field::new(
            "inventory.fetch_timeout_ms",
            config.inventory.fetch_timeout_ms,
            "PROPMATCH_INVENTORY_FETCH_TIMEOUT_MS",
        ),
        Field::new("context.ttl_secs", config.context.ttl_secs, "PROPMATCH_CONTEXT_TTL_SECS"),
        Field::new("llm.enabled", config.llm.enabled, "PROPMATCH_LLM_ENABLED"),
        Field::new("llm.provider", format!("{:?}", config.llm.provider), "PROPMATCH_LLM_PROVIDER"),
        Field::new("llm.model", &config.llm.model, "PROPMATCH_LLM_MODEL"),
        Field::new(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            "PROPMATCH_LLM_BASE_URL",
        ),
        Field::new("llm.api_key", api_key, "PROPMATCH_LLM_API_KEY"),
        Field::new("llm.timeout_secs", config.llm.timeout_secs, "PROPMATCH_LLM_TIMEOUT_SECS"),
        Field::new("llm.max_retries", config.llm.max_retries, "PROPMATCH_LLM_MAX_RETRIES"),
        Field::new("matching.max_results", config.matching.max_results, "PROPMATCH_MATCHING_MAX_RESULTS"),
        Field::new("relaxation.step_pct", config.relaxation.step_pct, "PROPMATCH_RELAXATION_STEP_PCT"),
        Field::new("relaxation.ceiling_pct", config.relaxation.ceiling_pct, "PROPMATCH_RELAXATION_CEILING_PCT"),
        Field::new("server.bind_address", &config.server.bind_address, "PROPMATCH_SERVER_BIND_ADDRESS"),
        Field::new("server.port", config.server.port, "PROPMATCH_SERVER_PORT"),
        Field::new("logging.level", &config.logging.level, "PROPMATCH_LOGGING_LEVEL"),
        Field::new("logging.format", format!("{:?}", config.logging.format), "PROPMATCH_LOGGING_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("propmatch.toml"), PathBuf::from("config/propmatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a provider prefix such as `sk-` so operators can tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.len() <= 6 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_never_leak_past_their_prefix() {
        assert_eq!(redact_secret("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_secret("plainsecretvalue"), "<redacted>");
        assert_eq!(redact_secret("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_against_nested_tables() {
        let doc: toml::Value = "[llm]\nmodel = \"gpt-4o-mini\"\n".parse().expect("valid toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.base_url"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
