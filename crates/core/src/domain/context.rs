use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::filter::{BudgetRange, Filter};
use crate::domain::inventory::ProjectId;

pub const MAX_CONVERSATION_ID_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Trims the raw id; blank ids are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_CONVERSATION_ID_LEN {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSignal {
    PriceSensitive,
    BudgetRelaxed,
    UpgradeInterest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest_price: Option<i64>,
    pub score: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub active_project: Option<ProjectId>,
    #[serde(default)]
    pub last_budget: Option<BudgetRange>,
    #[serde(default)]
    pub last_locality: Option<String>,
    #[serde(default)]
    pub last_filters: Filter,
    #[serde(default)]
    pub last_results: Vec<ResultSummary>,
    #[serde(default)]
    pub signals: BTreeMap<SessionSignal, bool>,
    #[serde(default)]
    pub turn_count: u32,
    pub last_access_time: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self::started_at(conversation_id, Utc::now())
    }

    pub fn started_at(conversation_id: ConversationId, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            active_project: None,
            last_budget: None,
            last_locality: None,
            last_filters: Filter::default(),
            last_results: Vec::new(),
            signals: BTreeMap::new(),
            turn_count: 0,
            last_access_time: now,
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_access_time > ttl
    }

    pub fn signal(&self, signal: SessionSignal) -> bool {
        self.signals.get(&signal).copied().unwrap_or(false)
    }

    pub fn raise(&mut self, signal: SessionSignal) {
        self.signals.insert(signal, true);
    }
}
