//! Prompt rendering and output parsing for the collaborator. The payload
//! carries figures already decided by the engine; the model only rewords them.

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

use propmatch_core::errors::CollaboratorError;
use propmatch_core::inventory::Vocabulary;

use crate::conversation::SlotHint;
use crate::llm::LlmPrompt;

const EXTRACTION_TEMPLATE: &str = "extract_slots.tera";
const PHRASING_TEMPLATE: &str = "phrase_response.tera";

const EXTRACTION_SYSTEM: &str = "You extract property search filters from a customer message. \
     Answer with a single JSON object and nothing else. Never guess a value.";
const PHRASING_SYSTEM: &str = "You reword a property search summary for a sales agent. \
     Use only the facts you are given. Answer with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template failed: {0}")]
    Template(#[from] tera::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayloadProject {
    pub name: String,
    pub locality: String,
    pub zone: String,
    pub status: String,
    pub configurations: Vec<String>,
}

/// Budget labels as they must appear in the phrased text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayloadRelaxation {
    pub original: String,
    pub factor: String,
    pub relaxed: Option<String>,
    pub highest: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PhrasingPayload {
    pub search: String,
    pub outcome: &'static str,
    pub projects: Vec<PayloadProject>,
    pub relaxation: Option<PayloadRelaxation>,
    pub draft_bullets: Vec<String>,
    pub required_mentions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PhrasedResponse {
    pub answer_bullets: Vec<String>,
    pub pitch_help: String,
    pub next_suggestion: String,
}

pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (EXTRACTION_TEMPLATE, include_str!("../../../templates/prompts/extract_slots.tera")),
            (PHRASING_TEMPLATE, include_str!("../../../templates/prompts/phrase_response.tera")),
        ])?;
        Ok(Self { tera })
    }

    pub fn extraction(&self, text: &str, vocabulary: &Vocabulary) -> Result<LlmPrompt, PromptError> {
        let mut context = Context::new();
        context.insert("query", text);
        context.insert("localities", vocabulary.localities());
        context.insert("zones", vocabulary.zones());
        Ok(LlmPrompt {
            system: EXTRACTION_SYSTEM.to_string(),
            user: self.tera.render(EXTRACTION_TEMPLATE, &context)?,
        })
    }

    pub fn phrasing(&self, payload: &PhrasingPayload) -> Result<LlmPrompt, PromptError> {
        let context = Context::from_serialize(payload)?;
        Ok(LlmPrompt {
            system: PHRASING_SYSTEM.to_string(),
            user: self.tera.render(PHRASING_TEMPLATE, &context)?,
        })
    }
}

pub fn parse_phrased(raw: &str) -> Result<PhrasedResponse, CollaboratorError> {
    parse_json_object(raw)
}

pub fn parse_slot_hint(raw: &str) -> Result<SlotHint, CollaboratorError> {
    parse_json_object(raw)
}

/// Models wrap JSON in prose or code fences; the outermost object is used.
fn parse_json_object<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, CollaboratorError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let object = match (start, end) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => return Err(CollaboratorError::InvalidOutput("no JSON object in output".to_string())),
    };
    serde_json::from_str(object)
        .map_err(|error| CollaboratorError::InvalidOutput(format!("malformed JSON: {error}")))
}
