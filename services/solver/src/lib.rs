//! The solver service
//!
//! Glues store, matcher, settlement and escrow into the marketplace
//! orchestrator: offers come in, the matcher pairs them, deals advance
//! through the lifecycle as confirmed chain events arrive, timeouts fire
//! from a single ticker, and every change is persisted and republished
//! to subscribers. Per deal, events are processed strictly in arrival
//! order; across deals, in parallel.

pub mod agents;
pub mod cli;
pub mod config;
pub mod controller;
pub mod events;
pub mod gateway;

pub use config::{ControllerConfig, TimeoutWindows};
pub use controller::Controller;
pub use events::{SolverEvent, SolverEventPayload};
pub use gateway::LocalGateway;

/// Current time as Unix seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
