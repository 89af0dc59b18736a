//! Escrow contract errors

use thiserror::Error;

/// Reverts raised by the escrow contract's entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EscrowError {
    #[error("unauthorized caller: {caller}")]
    Unauthorized { caller: String },

    #[error("wrong acting party: expected {expected}, got {got}")]
    WrongParty { expected: String, got: String },

    #[error("unknown deal: {deal_id}")]
    UnknownDeal { deal_id: String },

    #[error("deal already registered: {deal_id}")]
    DealExists { deal_id: String },

    #[error("deal {deal_id} is in state {got}, transition requires {expected}")]
    InvalidState {
        deal_id: String,
        expected: String,
        got: String,
    },

    #[error("party {party} already agreed")]
    AlreadyAgreed { party: String },

    #[error("no mediator assigned to deal {deal_id}")]
    NoMediator { deal_id: String },

    #[error("insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: String,
        required: String,
        available: String,
    },

    #[error(
        "escrow holds {available} of {required} required for deal {deal_id}; pay-out refused"
    )]
    InsufficientEscrow {
        deal_id: String,
        required: String,
        available: String,
    },

    #[error("invalid amount")]
    InvalidAmount,

    #[error("instruction count must be positive")]
    InvalidInstructionCount,

    #[error("balance overflow")]
    Overflow,
}
