//! Solver store — persistent repository of offers, deals, decisions and
//! results
//!
//! One logical table per entity kind, each backed by an in-memory map
//! plus an append-only JSONL log whose every line is the full post-image
//! of a write. Startup replays each log left-to-right (last line wins),
//! so the log doubles as journal and snapshot; compaction is a non-goal.

pub mod jsonl;
pub mod store;

pub use jsonl::{Durability, JsonlWriter};
pub use store::{DealQuery, JobOfferQuery, ResourceOfferQuery, SolverStore, StoreConfig};
