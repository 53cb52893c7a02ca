//! Builds the fixed-shape response. Every figure comes from the engine or the
//! relaxation ladder; the collaborator may only reword a draft built here.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use propmatch_core::domain::filter::Filter;
use propmatch_core::domain::inventory::UnitConfiguration;
use propmatch_core::domain::money::format_inr;
use propmatch_core::domain::response::{MatchResponse, ScoredProject};
use propmatch_core::matching::RelaxationOutcome;

use crate::guardrails::{GuardrailDecision, GuardrailPolicy, RequiredFacts};
use crate::llm::GuardedLlm;
use crate::phrasing::{
    parse_phrased, PayloadProject, PayloadRelaxation, PhrasedResponse, PhrasingPayload,
    PromptRenderer,
};

const CONFIGURATIONS_PER_BULLET: usize = 3;

pub struct AssemblyInput<'a> {
    pub filter: &'a Filter,
    pub projects: &'a [ScoredProject],
    pub relaxation: Option<&'a RelaxationOutcome>,
}

/// Deterministic bullets plus the facts any rewording has to preserve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    pub outcome: &'static str,
    pub bullets: Vec<String>,
    pub pitch_help: String,
    pub next_suggestion: String,
    pub facts: RequiredFacts,
}

pub struct ResponseAssembler {
    llm: Arc<GuardedLlm>,
    prompts: Arc<PromptRenderer>,
    guardrails: GuardrailPolicy,
}

impl ResponseAssembler {
    pub fn new(llm: Arc<GuardedLlm>, prompts: Arc<PromptRenderer>) -> Self {
        Self { llm, prompts, guardrails: GuardrailPolicy::default() }
    }

    pub async fn assemble(&self, input: AssemblyInput<'_>, deadline: Instant) -> MatchResponse {
        let draft = draft(&input);
        let phrased = if self.llm.is_enabled() {
            self.phrase(&input, &draft, deadline).await
        } else {
            None
        };

        let (answer_bullets, pitch_help, next_suggestion) = match phrased {
            Some(phrased) => (phrased.answer_bullets, phrased.pitch_help, phrased.next_suggestion),
            None => (draft.bullets, draft.pitch_help, draft.next_suggestion),
        };

        MatchResponse {
            projects: input.projects.to_vec(),
            answer_bullets,
            pitch_help,
            next_suggestion,
            relaxation_info: input.relaxation.map(RelaxationOutcome::info),
        }
    }

    /// Degraded response for a request that never reached the engine.
    pub fn inventory_unavailable() -> MatchResponse {
        MatchResponse {
            projects: Vec::new(),
            answer_bullets: vec![
                "Inventory is temporarily unavailable, so no projects can be listed right now."
                    .to_string(),
                "Please try again in a moment; this search was not saved.".to_string(),
                "No project details are shown until listings reload.".to_string(),
            ],
            pitch_help: "Listings are refreshing and will be back shortly.".to_string(),
            next_suggestion: "Please try again in a moment.".to_string(),
            relaxation_info: None,
        }
    }

    async fn phrase(
        &self,
        input: &AssemblyInput<'_>,
        draft: &Draft,
        deadline: Instant,
    ) -> Option<PhrasedResponse> {
        let prompt = match self.prompts.phrasing(&payload(input, draft)) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(event_name = "llm.phrasing.fallback", reason = %error, "prompt rendering failed");
                return None;
            }
        };

        let phrased = match self.llm.complete(&prompt, deadline).await.and_then(|raw| parse_phrased(&raw)) {
            Ok(phrased) => trimmed(phrased),
            Err(error) => {
                warn!(event_name = "llm.phrasing.fallback", reason = %error, "using templated bullets");
                return None;
            }
        };

        match self.guardrails.evaluate(&phrased, &draft.facts) {
            GuardrailDecision::Allow => {
                debug!(event_name = "llm.phrasing.accepted", outcome = draft.outcome, "phrased response accepted");
                Some(phrased)
            }
            GuardrailDecision::Degrade { reason_code, detail, fallback_path } => {
                warn!(
                    event_name = "llm.phrasing.rejected",
                    reason_code,
                    detail = %detail,
                    fallback_path,
                    "phrased response failed validation"
                );
                None
            }
        }
    }
}

fn trimmed(phrased: PhrasedResponse) -> PhrasedResponse {
    PhrasedResponse {
        answer_bullets: phrased.answer_bullets.iter().map(|bullet| bullet.trim().to_string()).collect(),
        pitch_help: phrased.pitch_help.trim().to_string(),
        next_suggestion: phrased.next_suggestion.trim().to_string(),
    }
}

pub fn draft(input: &AssemblyInput<'_>) -> Draft {
    match input.relaxation {
        Some(RelaxationOutcome::Relaxed { attempt, .. }) => relaxed_draft(
            input,
            attempt.original_max_budget,
            attempt.relaxed_max_budget,
            &attempt.factor.to_string(),
        ),
        Some(RelaxationOutcome::Exhausted {
            original_max_budget,
            highest_attempted_budget,
            highest_factor,
            ..
        }) => exhausted_draft(
            input.filter,
            *original_max_budget,
            *highest_attempted_budget,
            &highest_factor.to_string(),
        ),
        None if input.projects.is_empty() => no_match_draft(input.filter),
        None => matched_draft(input),
    }
}

fn matched_draft(input: &AssemblyInput<'_>) -> Draft {
    let projects = input.projects;
    let search = describe_filter(input.filter);
    let mut bullets = vec![format!("{} match {search}.", count_label(projects.len()))];

    let top = &projects[0];
    bullets.push(format!("{} in {} ranks first with {}.", top.name, top.locality, configurations_label(top)));
    match projects.get(1) {
        Some(second) => bullets.push(format!(
            "{} in {} follows with {}.",
            second.name,
            second.locality,
            configurations_label(second)
        )),
        None => bullets.push("It is the only project that fits every filter.".to_string()),
    }
    if projects.len() > 2 {
        let more = projects.len() - 2;
        bullets.push(format!("{more} more option{} listed below.", if more == 1 { " is" } else { "s are" }));
    }
    if input.filter.has_budget() || !input.filter.bedrooms.is_empty() {
        bullets.push("Only configurations within your budget and BHK choice are shown.".to_string());
    }

    let pitch_help = match top.matched_configurations.first() {
        Some(config) => format!(
            "{} in {} offers {}BHK from {}, a {} project by {}.",
            top.name,
            top.locality,
            config.bhk,
            format_inr(config.price),
            top.status.label(),
            top.developer
        ),
        None => format!("{} in {} is the closest fit for this search.", top.name, top.locality),
    };
    let next_suggestion = match projects.get(1) {
        Some(second) => format!("Shall I compare {} and {} side by side?", top.name, second.name),
        None => format!("Shall I check possession timelines for {} or look at nearby localities?", top.name),
    };

    Draft {
        outcome: "matched",
        bullets,
        pitch_help,
        next_suggestion,
        facts: RequiredFacts {
            amounts: BTreeSet::new(),
            names: vec![top.name.clone()],
            allowed_amounts: allowed_amounts(input.filter, projects, &[]),
            known_names: known_names(input.filter, projects),
        },
    }
}

fn relaxed_draft(input: &AssemblyInput<'_>, original: i64, relaxed: i64, factor: &str) -> Draft {
    let projects = input.projects;
    let lowest = projects.iter().filter_map(ScoredProject::lowest_matched_price).min().unwrap_or(relaxed);
    let mut bullets = vec![
        format!(
            "No match under {}; nearest option up to {} (searched up to {}, {factor}x budget).",
            format_inr(original),
            format_inr(lowest),
            format_inr(relaxed)
        ),
        format!("{} fit once the budget is stretched to {}.", count_label(projects.len()), format_inr(relaxed)),
    ];

    let mut names = Vec::new();
    let mut pitch_help = "Stretching the budget slightly opens these options.".to_string();
    if let Some(top) = projects.first() {
        bullets.push(format!("{} in {} leads with {}.", top.name, top.locality, configurations_label(top)));
        names.push(top.name.clone());
        if let Some(price) = top.lowest_matched_price() {
            let above = price - original;
            pitch_help = if above > 0 {
                format!(
                    "{} is the closest fit at {}, {} above the original budget.",
                    top.name,
                    format_inr(price),
                    format_inr(above)
                )
            } else {
                format!("{} is the closest fit at {}.", top.name, format_inr(price))
            };
        }
    }
    bullets.push("Every other filter was kept as requested.".to_string());

    let next_suggestion = format!(
        "Would a budget of {} work, or should I search other localities at {}?",
        format_inr(relaxed),
        format_inr(original)
    );
    let deltas: Vec<i64> =
        projects.iter().filter_map(ScoredProject::lowest_matched_price).map(|price| price - original).collect();
    let mut extra = vec![original, relaxed];
    extra.extend(deltas);

    Draft {
        outcome: "relaxed",
        bullets,
        pitch_help,
        next_suggestion,
        facts: RequiredFacts {
            amounts: BTreeSet::from([original, relaxed, lowest]),
            names,
            allowed_amounts: allowed_amounts(input.filter, projects, &extra),
            known_names: known_names(input.filter, projects),
        },
    }
}

fn exhausted_draft(filter: &Filter, original: i64, highest: i64, factor: &str) -> Draft {
    let adjustments = adjustments(filter, Some(highest));
    let bullets = vec![
        format!("No project matches {}.", describe_filter(filter)),
        format!(
            "Searched up to {} ({factor}x your {} budget) and still found nothing.",
            format_inr(highest),
            format_inr(original)
        ),
        "No project is suggested outside these filters.".to_string(),
        format!("To see options, {}.", join_choices(&adjustments)),
    ];

    Draft {
        outcome: "exhausted",
        bullets,
        pitch_help: "Nothing fits yet; a wider budget or locality will open options.".to_string(),
        next_suggestion: format!("Shall I {}?", adjustments[0]),
        facts: RequiredFacts {
            amounts: BTreeSet::from([original, highest]),
            names: Vec::new(),
            allowed_amounts: allowed_amounts(filter, &[], &[original, highest]),
            known_names: known_names(filter, &[]),
        },
    }
}

fn no_match_draft(filter: &Filter) -> Draft {
    let adjustments = adjustments(filter, None);
    let reason = if filter.max_price.is_some() {
        "The budget ladder was not needed for this search."
    } else {
        "Budget relaxation did not apply because no maximum budget was set."
    };
    let bullets = vec![
        format!("No project matches {}.", describe_filter(filter)),
        reason.to_string(),
        "No project is suggested outside these filters.".to_string(),
        format!("To see options, {}.", join_choices(&adjustments)),
    ];

    Draft {
        outcome: "no_match",
        bullets,
        pitch_help: "Nothing fits yet; a small change to the filters will open options.".to_string(),
        next_suggestion: format!("Shall I {}?", adjustments[0]),
        facts: RequiredFacts {
            amounts: BTreeSet::new(),
            names: Vec::new(),
            allowed_amounts: allowed_amounts(filter, &[], &[]),
            known_names: known_names(filter, &[]),
        },
    }
}

/// Concrete filter changes, most useful first. Never empty.
fn adjustments(filter: &Filter, highest_budget: Option<i64>) -> Vec<String> {
    let mut adjustments = Vec::new();
    if let Some(highest) = highest_budget {
        adjustments.push(format!("raise the budget above {}", format_inr(highest)));
    }
    if let Some(locality) = filter.locality.as_deref() {
        adjustments.push(format!("search beyond {locality}"));
    } else if let Some(zone) = filter.zone.as_deref() {
        adjustments.push(format!("search outside {zone}"));
    }
    if let Some(highest_bhk) = filter.highest_bedroom() {
        if highest_bhk > 1 {
            adjustments.push(format!("include {}BHK options", highest_bhk - 1));
        } else {
            adjustments.push(format!("include {}BHK options", highest_bhk + 1));
        }
    }
    if !filter.status.is_empty() || !filter.amenities.is_empty() || filter.possession_by.is_some() {
        adjustments.push("drop the status, amenity or possession filters".to_string());
    }
    if adjustments.is_empty() {
        adjustments.push("search the whole inventory".to_string());
    }
    adjustments
}

fn join_choices(choices: &[String]) -> String {
    match choices {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} or {last}", rest.join(", ")),
    }
}

fn count_label(count: usize) -> String {
    if count == 1 {
        "1 project".to_string()
    } else {
        format!("{count} projects")
    }
}

fn configuration_label(config: &UnitConfiguration) -> String {
    format!("{}BHK at {}", config.bhk, format_inr(config.price))
}

fn configurations_label(project: &ScoredProject) -> String {
    let labels: Vec<String> = project
        .matched_configurations
        .iter()
        .take(CONFIGURATIONS_PER_BULLET)
        .map(configuration_label)
        .collect();
    if labels.is_empty() {
        "no listed configurations".to_string()
    } else {
        join_choices_with(&labels, "and")
    }
}

fn join_choices_with(items: &[String], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} {conjunction} {last}", rest.join(", ")),
    }
}

/// Human summary of a filter, e.g. `2BHK homes in Yelahanka up to ₹1.5Cr`.
pub fn describe_filter(filter: &Filter) -> String {
    let mut parts = Vec::new();
    if filter.bedrooms.is_empty() {
        parts.push("homes".to_string());
    } else {
        let bhk: Vec<String> = filter.bedrooms.iter().map(u8::to_string).collect();
        parts.push(format!("{}BHK homes", bhk.join("/")));
    }

    match (filter.locality.as_deref(), filter.zone.as_deref()) {
        (Some(locality), Some(zone)) if locality != zone => parts.push(format!("in {locality}, {zone}")),
        (Some(place), _) | (None, Some(place)) => parts.push(format!("in {place}")),
        (None, None) => {}
    }

    match (filter.min_price, filter.max_price) {
        (Some(min), Some(max)) => parts.push(format!("between {} and {}", format_inr(min), format_inr(max))),
        (None, Some(max)) => parts.push(format!("up to {}", format_inr(max))),
        (Some(min), None) => parts.push(format!("from {}", format_inr(min))),
        (None, None) => {}
    }

    if !filter.status.is_empty() {
        let labels: Vec<&str> = filter.status.iter().map(|status| status.label()).collect();
        parts.push(format!("({})", labels.join(" or ")));
    }
    if !filter.amenities.is_empty() {
        let amenities: Vec<String> = filter.amenities.iter().cloned().collect();
        parts.push(format!("with {}", join_choices_with(&amenities, "and")));
    }
    if let Some(date) = filter.possession_by {
        parts.push(format!("ready by {}", date.format("%b %Y")));
    }

    parts.join(" ")
}

fn allowed_amounts(filter: &Filter, projects: &[ScoredProject], extra: &[i64]) -> BTreeSet<i64> {
    let mut allowed: BTreeSet<i64> = extra.iter().copied().collect();
    allowed.extend(filter.min_price);
    allowed.extend(filter.max_price);
    for project in projects {
        allowed.extend(project.matched_configurations.iter().map(|config| config.price));
    }
    allowed
}

fn known_names(filter: &Filter, projects: &[ScoredProject]) -> Vec<String> {
    let mut names: Vec<String> = filter.locality.iter().chain(&filter.zone).cloned().collect();
    for project in projects {
        names.extend([
            project.name.clone(),
            project.locality.clone(),
            project.zone.clone(),
            project.developer.clone(),
        ]);
    }
    names.sort();
    names.dedup();
    names
}

fn payload(input: &AssemblyInput<'_>, draft: &Draft) -> PhrasingPayload {
    let relaxation = input.relaxation.map(|outcome| match outcome {
        RelaxationOutcome::Relaxed { attempt, .. } => PayloadRelaxation {
            original: format_inr(attempt.original_max_budget),
            factor: attempt.factor.to_string(),
            relaxed: Some(format_inr(attempt.relaxed_max_budget)),
            highest: None,
        },
        RelaxationOutcome::Exhausted {
            original_max_budget,
            highest_attempted_budget,
            highest_factor,
            ..
        } => PayloadRelaxation {
            original: format_inr(*original_max_budget),
            factor: highest_factor.to_string(),
            relaxed: None,
            highest: Some(format_inr(*highest_attempted_budget)),
        },
    });

    let mut required_mentions: Vec<String> = draft.facts.amounts.iter().map(|amount| format_inr(*amount)).collect();
    required_mentions.extend(draft.facts.names.iter().cloned());

    PhrasingPayload {
        search: describe_filter(input.filter),
        outcome: draft.outcome,
        projects: input
            .projects
            .iter()
            .map(|project| PayloadProject {
                name: project.name.clone(),
                locality: project.locality.clone(),
                zone: project.zone.clone(),
                status: project.status.label().to_string(),
                configurations: project.matched_configurations.iter().map(configuration_label).collect(),
            })
            .collect(),
        relaxation,
        draft_bullets: draft.bullets.clone(),
        required_mentions,
    }
}
