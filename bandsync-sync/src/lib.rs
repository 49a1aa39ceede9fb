//! # BandSync Sync Engine
//!
//! Turns remote band records into canonical local entities and keeps views
//! fresh as remote changes arrive:
//! - [`normalizer`]: loose remote rows to canonical entities
//! - [`coordinator`]: debounced, filtered resync on change notifications
//! - [`audit`] and [`replay`]: audit-log entries applied to a [`store::LocalStore`]
//! - [`item_name`]: display names for changed records

pub mod audit;
pub mod coordinator;
pub mod item_name;
pub mod normalizer;
pub mod replay;
pub mod store;

pub use audit::{parse_audit_log, AuditLogEntry};
pub use coordinator::{CoordinatorOptions, CoordinatorState, RefreshCallback, Rejection, ResyncCoordinator};
pub use item_name::extract_item_name;
pub use normalizer::normalize;
pub use replay::{AuditReplayer, ReplayOutcome, ReplaySummary, SkipReason};
pub use store::{LocalStore, MemoryStore};
