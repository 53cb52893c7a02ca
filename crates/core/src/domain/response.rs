use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::inventory::{Project, ProjectId, ProjectStatus, UnitConfiguration};

/// Per-signal contributions behind a project's score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub locality: i64,
    pub zone: i64,
    pub budget: i64,
    pub configuration: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.locality + self.zone + self.budget + self.configuration
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredProject {
    pub project_id: ProjectId,
    pub name: String,
    pub locality: String,
    pub zone: String,
    pub status: ProjectStatus,
    pub developer: String,
    pub score: i64,
    pub matched_configurations: Vec<UnitConfiguration>,
    #[serde(skip)]
    pub breakdown: ScoreBreakdown,
}

impl ScoredProject {
    pub fn new(
        project: &Project,
        breakdown: ScoreBreakdown,
        matched_configurations: Vec<UnitConfiguration>,
    ) -> Self {
        Self {
            project_id: project.id.clone(),
            name: project.name.clone(),
            locality: project.locality.clone(),
            zone: project.zone.clone(),
            status: project.status,
            developer: project.developer.name.clone(),
            score: breakdown.total(),
            matched_configurations,
            breakdown,
        }
    }

    pub fn lowest_matched_price(&self) -> Option<i64> {
        self.matched_configurations.iter().map(|config| config.price).min()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelaxationInfo {
    Relaxed {
        original_max_budget: i64,
        factor: Decimal,
        relaxed_max_budget: i64,
        result_count: usize,
    },
    Exhausted {
        original_max_budget: i64,
        highest_factor: Decimal,
        highest_attempted_budget: i64,
    },
}

/// Wire shape returned for every request, degraded paths included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub projects: Vec<ScoredProject>,
    pub answer_bullets: Vec<String>,
    pub pitch_help: String,
    pub next_suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxation_info: Option<RelaxationInfo>,
}
