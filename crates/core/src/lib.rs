pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod inventory;
pub mod matching;

pub use context::ContextStore;
pub use domain::context::{ConversationContext, ConversationId, ResultSummary, SessionSignal};
pub use domain::filter::{BudgetRange, Filter, FilterInput};
pub use domain::inventory::{Developer, Project, ProjectId, ProjectStatus, UnitConfiguration};
pub use domain::response::{MatchResponse, RelaxationInfo, ScoredProject};
pub use errors::{
    CollaboratorError, ContextStoreError, InterfaceError, InventoryError, RequestError,
};
pub use inventory::{InventoryCache, InventorySnapshot, InventorySource};
pub use matching::{MatchingEngine, RelaxationOutcome, RelaxationPolicy};
