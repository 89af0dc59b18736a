//! Settlement — transitions and deterministic collateral flows
//!
//! Every deal lifecycle advance is one of a fixed set of transitions.
//! For each transition the flow table computes the exact collateral
//! movements as payment events; the engine submits the transition
//! through the chain client and relies on confirmed events, never on
//! submission success, to advance state.

pub mod engine;
pub mod flows;
pub mod transition;

pub use engine::{ChainClient, ChainEvent, RetryPolicy, SettlementEngine, SettlementError};
pub use flows::compute_flows;
pub use transition::{DealTerms, Party, Transition};
