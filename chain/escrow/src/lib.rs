//! Escrow contract model
//!
//! An in-Rust model of the on-chain escrow/payments contract: a fungible
//! token ledger, per-deal escrow accounts, owner-only entry points
//! mirroring the transition table, and payment-event emission.
//! `LocalChain` wraps the contract behind the settlement engine's
//! `ChainClient`, serving as the in-process chain for tests and dev mode.

pub mod chain;
pub mod errors;
pub mod escrow;
pub mod token;

pub use chain::LocalChain;
pub use errors::EscrowError;
pub use escrow::EscrowContract;
pub use token::TokenLedger;
