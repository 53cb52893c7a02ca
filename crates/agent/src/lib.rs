//! Agent runtime for conversational property search.
//!
//! Turns a free-text message, optional explicit filters and the stored
//! conversation context into a fixed-shape `MatchResponse`:
//! 1. **Normalization** (`conversation`) - text and explicit input become a `Filter`
//! 2. **Retrieval** - the deterministic engine in `propmatch-core` scores the snapshot
//! 3. **Relaxation** - the max budget ladder runs when nothing matches
//! 4. **Assembly** (`assembler`) - templated bullets, optionally reworded by the LLM
//!    and checked by `guardrails`
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It NEVER decides which projects match,
//! their prices, scores or the relaxation outcome. When it is disabled, slow or
//! wrong, the deterministic draft is returned unchanged.

pub mod assembler;
pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod phrasing;
pub mod runtime;

pub use assembler::ResponseAssembler;
pub use llm::{CallPolicy, GuardedLlm, LlmClient, LlmPrompt};
pub use runtime::{AgentRuntime, MAX_QUERY_CHARS};
