use std::sync::Arc;
use std::time::Instant as WallClock;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use propmatch_core::context::ContextStore;
use propmatch_core::domain::context::{
    ConversationContext, ConversationId, ResultSummary, SessionSignal, MAX_CONVERSATION_ID_LEN,
};
use propmatch_core::domain::filter::FilterInput;
use propmatch_core::domain::response::{MatchResponse, ScoredProject};
use propmatch_core::errors::RequestError;
use propmatch_core::inventory::{InventoryCache, InventorySnapshot};
use propmatch_core::matching::{BudgetRelaxer, MatchingEngine, RelaxationOutcome, RelaxationPolicy};

use crate::assembler::{AssemblyInput, ResponseAssembler};
use crate::conversation::{FilterNormalizer, NormalizedRequest};
use crate::llm::GuardedLlm;
use crate::phrasing::{parse_slot_hint, PromptError, PromptRenderer};

pub const MAX_QUERY_CHARS: usize = 2_000;

/// One conversational search turn: normalize, retrieve, relax, phrase, remember.
pub struct AgentRuntime {
    inventory: Arc<InventoryCache>,
    contexts: Arc<dyn ContextStore>,
    llm: Arc<GuardedLlm>,
    prompts: Arc<PromptRenderer>,
    normalizer: FilterNormalizer,
    engine: MatchingEngine,
    relaxation: RelaxationPolicy,
    assembler: ResponseAssembler,
}

impl AgentRuntime {
    pub fn new(
        inventory: Arc<InventoryCache>,
        contexts: Arc<dyn ContextStore>,
        llm: GuardedLlm,
    ) -> Result<Self, PromptError> {
        let llm = Arc::new(llm);
        let prompts = Arc::new(PromptRenderer::new()?);
        Ok(Self {
            inventory,
            contexts,
            assembler: ResponseAssembler::new(llm.clone(), prompts.clone()),
            llm,
            prompts,
            normalizer: FilterNormalizer::new(),
            engine: MatchingEngine::default(),
            relaxation: RelaxationPolicy::default(),
        })
    }

    pub fn with_engine(mut self, engine: MatchingEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_relaxation(mut self, policy: RelaxationPolicy) -> Self {
        self.relaxation = policy;
        self
    }

    pub fn inventory(&self) -> &Arc<InventoryCache> {
        &self.inventory
    }

    pub async fn handle(
        &self,
        conversation_id: &str,
        text: &str,
        explicit: Option<&FilterInput>,
    ) -> Result<MatchResponse, RequestError> {
        let conversation_id = validate_conversation_id(conversation_id)?;
        let query_chars = text.chars().count();
        if query_chars > MAX_QUERY_CHARS {
            return Err(RequestError::QueryTooLong { max: MAX_QUERY_CHARS, actual: query_chars });
        }

        let correlation_id = Uuid::new_v4().to_string();
        let started = WallClock::now();
        info!(
            event_name = "match.request.received",
            correlation_id = %correlation_id,
            conversation_id = %conversation_id,
            query_chars,
            explicit_filters = explicit.is_some(),
            "match request received"
        );

        let mut context = self.load_context(&conversation_id, &correlation_id).await;

        let snapshot = match self.inventory.snapshot_or_load().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    event_name = "match.inventory.unavailable",
                    correlation_id = %correlation_id,
                    error = %error,
                    "inventory unavailable, returning degraded response"
                );
                return Ok(ResponseAssembler::inventory_unavailable());
            }
        };

        let deadline = self.llm.request_deadline();
        let mut request =
            self.normalizer.normalize(text, explicit, &context, snapshot.vocabulary());
        if !request.dropped.is_empty() {
            debug!(
                event_name = "filter.values_dropped",
                correlation_id = %correlation_id,
                dropped = ?request.dropped,
                "unusable filter values dropped"
            );
        }
        if request.unresolved_text && self.llm.is_enabled() {
            self.apply_extraction_hint(text, &mut request, &context, &snapshot, deadline, &correlation_id)
                .await;
        }

        let mut projects = self.engine.search(&request.merged, &snapshot);
        let relaxation = if projects.is_empty() {
            BudgetRelaxer::new(&self.engine, self.relaxation).run(&request.merged, &snapshot)
        } else {
            None
        };
        if let Some(RelaxationOutcome::Relaxed { results, .. }) = &relaxation {
            projects = results.clone();
        }

        let response = self
            .assembler
            .assemble(
                AssemblyInput {
                    filter: &request.merged,
                    projects: &projects,
                    relaxation: relaxation.as_ref(),
                },
                deadline,
            )
            .await;

        remember_turn(&mut context, &request, &projects, relaxation.as_ref());
        if let Err(error) = self.contexts.save(&context).await {
            warn!(
                event_name = "context.save.failed",
                correlation_id = %correlation_id,
                store = self.contexts.name(),
                error = %error,
                "conversation context not saved"
            );
        }

        info!(
            event_name = "match.request.completed",
            correlation_id = %correlation_id,
            conversation_id = %context.conversation_id,
            result_count = response.projects.len(),
            relaxed = relaxation.is_some(),
            turn = context.turn_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "match request completed"
        );
        Ok(response)
    }

    async fn load_context(&self, id: &ConversationId, correlation_id: &str) -> ConversationContext {
        match self.contexts.load(id).await {
            Ok(Some(context)) => context,
            Ok(None) => ConversationContext::new(id.clone()),
            Err(error) => {
                warn!(
                    event_name = "context.load.failed",
                    correlation_id,
                    store = self.contexts.name(),
                    error = %error,
                    "starting from an empty context"
                );
                ConversationContext::new(id.clone())
            }
        }
    }

    async fn apply_extraction_hint(
        &self,
        text: &str,
        request: &mut NormalizedRequest,
        context: &ConversationContext,
        snapshot: &InventorySnapshot,
        deadline: tokio::time::Instant,
        correlation_id: &str,
    ) {
        let prompt = match self.prompts.extraction(text, snapshot.vocabulary()) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(event_name = "llm.extraction.skipped", correlation_id, error = %error, "prompt rendering failed");
                return;
            }
        };
        let hint = match self.llm.complete(&prompt, deadline).await.and_then(|raw| parse_slot_hint(&raw)) {
            Ok(hint) => hint,
            Err(error) => {
                warn!(event_name = "llm.extraction.failed", correlation_id, error = %error, "continuing without hint");
                return;
            }
        };
        if let Err(rejection) =
            self.normalizer.apply_hint(request, &hint, context, snapshot.vocabulary())
        {
            debug!(
                event_name = "llm.extraction.rejected",
                correlation_id,
                reason = %rejection,
                "extraction hint discarded"
            );
        }
    }
}

fn validate_conversation_id(raw: &str) -> Result<ConversationId, RequestError> {
    if raw.trim().is_empty() {
        return Err(RequestError::MissingConversationId);
    }
    ConversationId::parse(raw)
        .ok_or(RequestError::ConversationIdTooLong { max: MAX_CONVERSATION_ID_LEN })
}

fn remember_turn(
    context: &mut ConversationContext,
    request: &NormalizedRequest,
    projects: &[ScoredProject],
    relaxation: Option<&RelaxationOutcome>,
) {
    let previous_bhk = context.last_filters.highest_bedroom();
    let upgrade_by_size = matches!(
        (previous_bhk, request.requested.highest_bedroom()),
        (Some(previous), Some(now)) if now > previous
    );

    context.last_filters = request.merged.clone();
    context.last_budget = request.merged.has_budget().then(|| request.merged.budget());
    context.last_locality = request.merged.locality.clone();
    context.active_project = request.active_project.clone();
    context.last_results = projects
        .iter()
        .map(|project| ResultSummary {
            project_id: project.project_id.clone(),
            name: project.name.clone(),
            lowest_price: project.lowest_matched_price(),
            score: project.score,
        })
        .collect();

    if request.price_sensitive {
        context.raise(SessionSignal::PriceSensitive);
    }
    if matches!(relaxation, Some(RelaxationOutcome::Relaxed { .. })) {
        context.raise(SessionSignal::BudgetRelaxed);
    }
    if request.upgrade_interest || upgrade_by_size {
        context.raise(SessionSignal::UpgradeInterest);
    }

    context.turn_count += 1;
    context.last_access_time = Utc::now();
}
