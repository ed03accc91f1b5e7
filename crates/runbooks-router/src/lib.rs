//! Adapter registry and federated router (spec §4.C8).

pub mod registry;

pub use registry::{
    AdapterKind, AdapterRegistry, RunbookSearchOutcome, SourceRegistration,
    DEFAULT_MAX_CONCURRENT_REQUESTS,
};
