//! Client abstraction for the phrasing/extraction collaborator.
//!
//! `LlmClient` is the seam tests replace; `GuardedLlm` wraps any client with a
//! per-call timeout, a per-request deadline and a bounded retry count.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use propmatch_core::config::{LlmConfig, LlmProvider};
use propmatch_core::errors::CollaboratorError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MAX_OUTPUT_TOKENS: u32 = 800;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, prompt: &LlmPrompt) -> Result<String, CollaboratorError>;
}

/// Stand-in used when `llm.enabled = false`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledLlmClient;

#[async_trait]
impl LlmClient for DisabledLlmClient {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("llm collaborator is disabled".to_string()))
    }
}

/// HTTP client for OpenAI-compatible chat completions (OpenAI, Ollama) and the
/// Anthropic messages API.
pub struct HttpLlmClient {
    provider: LlmProvider,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CollaboratorError::Unavailable(error.to_string()))?;

        let base_url = match (&config.base_url, config.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            (_, LlmProvider::Anthropic) => ANTHROPIC_DEFAULT_BASE_URL.to_string(),
            (_, LlmProvider::OpenAi) => OPENAI_DEFAULT_BASE_URL.to_string(),
            (_, LlmProvider::Ollama) => {
                return Err(CollaboratorError::Unavailable(
                    "ollama provider needs llm.base_url".to_string(),
                ))
            }
        };

        Ok(Self {
            provider: config.provider,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }

    fn chat_completions_url(&self) -> String {
        match self.provider {
            LlmProvider::Ollama if !self.base_url.ends_with("/v1") => {
                format!("{}/v1/chat/completions", self.base_url)
            }
            _ => format!("{}/chat/completions", self.base_url),
        }
    }

    async fn complete_chat(&self, prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": 0,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "stream": false,
        });

        let mut request = self.client.post(self.chat_completions_url()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        let response = request.send().await.map_err(transport_error)?;
        let payload: ChatResponse = decode(response).await?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CollaboratorError::InvalidOutput("no choices in response".to_string()))
    }

    async fn complete_messages(&self, prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CollaboratorError::Unavailable("anthropic api key missing".to_string()))?;
        let body = serde_json::json!({
            "model": self.model,
            "system": prompt.system,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [{ "role": "user", "content": prompt.user }],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let payload: MessagesResponse = decode(response).await?;

        let text: Vec<String> = payload
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(CollaboratorError::InvalidOutput("no text blocks in response".to_string()));
        }
        Ok(text.join("\n"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn name(&self) -> &'static str {
        match self.provider {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }

    async fn complete(&self, prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
        debug!(event_name = "llm.call.sent", provider = self.name(), model = %self.model, "sending completion request");
        match self.provider {
            LlmProvider::Anthropic => self.complete_messages(prompt).await,
            LlmProvider::OpenAi | LlmProvider::Ollama => self.complete_chat(prompt).await,
        }
    }
}

fn transport_error(error: reqwest::Error) -> CollaboratorError {
    if error.is_timeout() {
        CollaboratorError::Timeout { timeout_ms: 0 }
    } else {
        CollaboratorError::Unavailable(error.to_string())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::Unavailable(format!("status {}: {body}", status.as_u16())));
    }
    response
        .json::<T>()
        .await
        .map_err(|error| CollaboratorError::InvalidOutput(format!("undecodable response: {error}")))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallPolicy {
    pub call_timeout: Duration,
    pub total_timeout: Duration,
    pub max_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(15),
            max_retries: 1,
        }
    }
}

impl CallPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.timeout_secs),
            total_timeout: Duration::from_secs(config.total_timeout_secs),
            max_retries: config.max_retries,
        }
    }
}

pub struct GuardedLlm {
    client: Arc<dyn LlmClient>,
    policy: CallPolicy,
    enabled: bool,
}

impl GuardedLlm {
    pub fn new(client: Arc<dyn LlmClient>, policy: CallPolicy) -> Self {
        Self { client, policy, enabled: true }
    }

    pub fn disabled() -> Self {
        Self { client: Arc::new(DisabledLlmClient), policy: CallPolicy::default(), enabled: false }
    }

    /// Builds the configured provider, or the disabled client when `llm.enabled` is off.
    pub fn from_config(config: &LlmConfig) -> Result<Self, CollaboratorError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let client = HttpLlmClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), CallPolicy::from_config(config)))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }

    /// Deadline for all collaborator calls made on behalf of one request.
    pub fn request_deadline(&self) -> Instant {
        Instant::now() + self.policy.total_timeout
    }

    /// Retries timeouts and transport failures; rejected output is returned as is.
    pub async fn complete(
        &self,
        prompt: &LlmPrompt,
        deadline: Instant,
    ) -> Result<String, CollaboratorError> {
        if !self.enabled {
            return Err(CollaboratorError::Unavailable("llm collaborator is disabled".to_string()));
        }

        let mut attempt = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CollaboratorError::Timeout {
                    timeout_ms: millis(self.policy.total_timeout),
                });
            }
            let budget = self.policy.call_timeout.min(remaining);

            let outcome = tokio::time::timeout(budget, self.client.complete(prompt))
                .await
                .unwrap_or(Err(CollaboratorError::Timeout { timeout_ms: millis(budget) }));

            match outcome {
                Ok(text) => return Ok(text),
                Err(error @ CollaboratorError::InvalidOutput(_)) => return Err(error),
                Err(error) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.call.retry",
                        provider = self.client.name(),
                        attempt,
                        error = %error,
                        "collaborator call failed, retrying"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use propmatch_core::errors::CollaboratorError;
    use tokio::time::Instant;

    use super::{CallPolicy, GuardedLlm, LlmClient, LlmPrompt};

    struct FlakyClient {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LlmClient for FlakyClient {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(CollaboratorError::Unavailable("connection reset".to_string()));
            }
            Ok("{}".to_string())
        }
    }

    struct HangingClient;

    #[async_trait::async_trait]
    impl LlmClient for HangingClient {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(String::new())
        }
    }

    struct GarbageClient {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LlmClient for GarbageClient {
        fn name(&self) -> &'static str {
            "garbage"
        }

        async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::InvalidOutput("not json".to_string()))
        }
    }

    fn prompt() -> LlmPrompt {
        LlmPrompt { system: "system".to_string(), user: "user".to_string() }
    }

    fn policy(call_ms: u64, total_ms: u64, max_retries: u32) -> CallPolicy {
        CallPolicy {
            call_timeout: Duration::from_millis(call_ms),
            total_timeout: Duration::from_millis(total_ms),
            max_retries,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_within_bound() {
        let client = Arc::new(FlakyClient { failures_before_success: 1, calls: AtomicU32::new(0) });
        let llm = GuardedLlm::new(client.clone(), policy(500, 1_000, 1));

        let output = llm.complete(&prompt(), llm.request_deadline()).await;

        assert_eq!(output, Ok("{}".to_string()));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_stop_at_the_configured_count() {
        let client = Arc::new(FlakyClient { failures_before_success: 5, calls: AtomicU32::new(0) });
        let llm = GuardedLlm::new(client.clone(), policy(500, 1_000, 2));

        let output = llm.complete(&prompt(), llm.request_deadline()).await;

        assert!(matches!(output, Err(CollaboratorError::Unavailable(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hanging_client_is_bounded_by_total_deadline() {
        let llm = GuardedLlm::new(Arc::new(HangingClient), policy(80, 150, 5));

        let started = Instant::now();
        let output = llm.complete(&prompt(), llm.request_deadline()).await;

        assert!(matches!(output, Err(CollaboratorError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn invalid_output_is_not_retried() {
        let client = Arc::new(GarbageClient { calls: AtomicU32::new(0) });
        let llm = GuardedLlm::new(client.clone(), policy(500, 1_000, 3));

        let output = llm.complete(&prompt(), llm.request_deadline()).await;

        assert!(matches!(output, Err(CollaboratorError::InvalidOutput(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_collaborator_never_calls_out() {
        let llm = GuardedLlm::disabled();
        assert!(!llm.is_enabled());
        assert!(matches!(
            llm.complete(&prompt(), llm.request_deadline()).await,
            Err(CollaboratorError::Unavailable(_))
        ));
    }
}
