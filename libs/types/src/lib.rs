//! Shared domain types for the gridmatch marketplace
//!
//! Ids, token amounts, offers, deals, agreement states, results, match
//! decisions, payment events, and the shared error taxonomy. Everything
//! here is a plain value type; all state lives in the store.

pub mod deal;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod numeric;
pub mod offer;
pub mod payment;
pub mod result;
pub mod state;
