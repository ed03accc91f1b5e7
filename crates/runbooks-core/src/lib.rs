//! Shared core for the runbook federation engine: the canonical data model,
//! the unified error taxonomy and a small event-listener facility used by
//! the resilience crates (`runbooks-ratelimiter`, `runbooks-circuitbreaker`,
//! `runbooks-cache`) to report state transitions without depending on each
//! other.

pub mod error;
pub mod events;
pub mod model;

pub use error::{CoreError, CoreResult};
pub use model::{
    clamp_confidence, sort_results, AdapterMetadata, DecisionBranch, DecisionTree, Document,
    Filters, Health, Procedure, Runbook, RunbookMetadata, SearchResult, SourceType,
};
