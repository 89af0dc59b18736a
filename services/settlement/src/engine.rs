//! Settlement engine — the chain boundary
//!
//! Submits transition calls through a `ChainClient` and treats confirmed
//! chain events, not submission success, as the authority for advancing
//! state. Transient submission failures retry with bounded exponential
//! backoff; a reverted call is a hard failure and the deal stays in its
//! pre-transition state.

use crate::transition::{DealTerms, Transition};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, warn};
use types::ids::{Address, TxHash};
use types::payment::PaymentEvent;
use types::state::AgreementState;

/// Errors at the chain boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    /// The call reverted on chain. Hard failure; never retried.
    #[error("chain rejected {transition} for deal {deal_id}: {reason}")]
    Rejected {
        deal_id: String,
        transition: String,
        reason: String,
    },

    /// RPC-level failure; retried with backoff.
    #[error("transient chain error: {0}")]
    Transient(String),

    /// Backoff budget spent without a successful submission.
    #[error("gave up on {transition} for deal {deal_id} after {attempts} attempts: {last}")]
    Exhausted {
        deal_id: String,
        transition: String,
        attempts: u32,
        last: String,
    },
}

/// A confirmed transition, as observed from the chain.
///
/// These events are the authoritative input to the deal state machine;
/// nothing advances on submission alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEvent {
    pub deal_id: types::ids::DealId,
    pub transition: Transition,
    pub caller: Address,
    pub tx: TxHash,
    /// The state the contract moved the deal to.
    pub new_state: AgreementState,
    pub payments: Vec<PaymentEvent>,
}

/// The surface the settlement engine needs from any chain backend:
/// submit a signed call, observe confirmed events.
pub trait ChainClient: Send + Sync {
    /// Register a new deal's terms with the escrow contract.
    fn register_deal(&self, terms: &DealTerms) -> Result<TxHash, SettlementError>;

    /// Submit one transition call on behalf of `caller`.
    ///
    /// A returned tx hash means accepted for inclusion, not confirmed;
    /// confirmation arrives on the event stream.
    fn submit(
        &self,
        terms: &DealTerms,
        transition: &Transition,
        caller: &Address,
    ) -> Result<TxHash, SettlementError>;

    /// Subscribe to confirmed transition events.
    fn events(&self) -> broadcast::Receiver<ChainEvent>;
}

// Callers keep their own handle on the backing chain (funding dev
// accounts, inspecting balances) and hand the engine a shared one.
impl<T: ChainClient> ChainClient for std::sync::Arc<T> {
    fn register_deal(&self, terms: &DealTerms) -> Result<TxHash, SettlementError> {
        (**self).register_deal(terms)
    }

    fn submit(
        &self,
        terms: &DealTerms,
        transition: &Transition,
        caller: &Address,
    ) -> Result<TxHash, SettlementError> {
        (**self).submit(terms, transition, caller)
    }

    fn events(&self) -> broadcast::Receiver<ChainEvent> {
        (**self).events()
    }
}

/// Bounded exponential backoff for transient submission failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Wraps a chain client with retry and logging.
pub struct SettlementEngine<C: ChainClient> {
    chain: C,
    retry: RetryPolicy,
}

impl<C: ChainClient> SettlementEngine<C> {
    pub fn new(chain: C, retry: RetryPolicy) -> Self {
        Self { chain, retry }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Subscribe to the confirmed-event stream.
    pub fn events(&self) -> broadcast::Receiver<ChainEvent> {
        self.chain.events()
    }

    /// Register a deal, retrying transient failures.
    pub async fn register_deal(&self, terms: &DealTerms) -> Result<TxHash, SettlementError> {
        self.with_retry(terms, "registerDeal", |chain| chain.register_deal(terms))
            .await
    }

    /// Submit a transition, retrying transient failures.
    ///
    /// On `Rejected` the error propagates immediately: the transition is
    /// not recorded and the state machine stays put.
    pub async fn submit(
        &self,
        terms: &DealTerms,
        transition: &Transition,
        caller: &Address,
    ) -> Result<TxHash, SettlementError> {
        self.with_retry(terms, transition.name(), |chain| {
            chain.submit(terms, transition, caller)
        })
        .await
    }

    async fn with_retry(
        &self,
        terms: &DealTerms,
        label: &str,
        call: impl Fn(&C) -> Result<TxHash, SettlementError>,
    ) -> Result<TxHash, SettlementError> {
        let mut last = String::new();
        for attempt in 0..self.retry.max_attempts {
            match call(&self.chain) {
                Ok(tx) => return Ok(tx),
                Err(SettlementError::Transient(reason)) => {
                    warn!(
                        deal_id = %terms.deal_id,
                        transition = label,
                        attempt,
                        reason = %reason,
                        "transient chain error, backing off"
                    );
                    last = reason;
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                Err(e) => {
                    error!(
                        deal_id = %terms.deal_id,
                        transition = label,
                        error = %e,
                        "chain call failed hard"
                    );
                    return Err(e);
                }
            }
        }
        Err(SettlementError::Exhausted {
            deal_id: terms.deal_id.to_string(),
            transition: label.to_string(),
            attempts: self.retry.max_attempts,
            last,
        })
    }
}
