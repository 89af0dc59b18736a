//! In-process chain backed by the escrow contract
//!
//! Implements the settlement engine's `ChainClient` against the local
//! contract model: a submitted call executes synchronously, gets a
//! derived tx hash, and is immediately "confirmed" by broadcasting the
//! resulting chain event. Used by tests and dev mode; a real RPC client
//! implements the same trait out of tree.

use crate::errors::EscrowError;
use crate::escrow::EscrowContract;
use parking_lot::Mutex;
use settlement::{ChainClient, ChainEvent, DealTerms, SettlementError, Transition};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;
use types::ids::{Address, TxHash};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A local, single-node "chain": the escrow contract plus a confirmed-
/// event feed.
pub struct LocalChain {
    contract: Mutex<EscrowContract>,
    events_tx: broadcast::Sender<ChainEvent>,
    nonce: AtomicU64,
}

impl LocalChain {
    pub fn new(contract: EscrowContract) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            contract: Mutex::new(contract),
            events_tx,
            nonce: AtomicU64::new(0),
        }
    }

    /// Run a closure against the contract (funding accounts, inspecting
    /// balances).
    pub fn with_contract<R>(&self, f: impl FnOnce(&mut EscrowContract) -> R) -> R {
        f(&mut self.contract.lock())
    }

    fn tx_hash(&self, label: &str, terms: &DealTerms) -> TxHash {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(terms.deal_id.as_str().as_bytes());
        hasher.update(label.as_bytes());
        hasher.update(nonce.to_le_bytes());
        TxHash::new(hex::encode(hasher.finalize()))
    }
}

fn reject(terms: &DealTerms, transition_name: &str, err: EscrowError) -> SettlementError {
    SettlementError::Rejected {
        deal_id: terms.deal_id.to_string(),
        transition: transition_name.to_string(),
        reason: err.to_string(),
    }
}

impl ChainClient for LocalChain {
    fn register_deal(&self, terms: &DealTerms) -> Result<TxHash, SettlementError> {
        let mut contract = self.contract.lock();
        let owner = contract.owner().clone();
        contract
            .register_deal(&owner, terms.clone())
            .map_err(|e| reject(terms, "registerDeal", e))?;
        Ok(self.tx_hash("registerDeal", terms))
    }

    fn submit(
        &self,
        terms: &DealTerms,
        transition: &Transition,
        caller: &Address,
    ) -> Result<TxHash, SettlementError> {
        let (payments, new_state) = {
            let mut contract = self.contract.lock();
            let owner = contract.owner().clone();
            let payments = contract
                .execute(&owner, caller, &terms.deal_id, transition)
                .map_err(|e| reject(terms, transition.name(), e))?;
            let new_state = contract
                .deal_state(&terms.deal_id)
                .ok_or_else(|| reject(terms, transition.name(), EscrowError::UnknownDeal {
                    deal_id: terms.deal_id.to_string(),
                }))?;
            (payments, new_state)
        };

        let tx = self.tx_hash(transition.name(), terms);
        debug!(
            deal_id = %terms.deal_id,
            transition = transition.name(),
            tx = %tx,
            new_state = %new_state,
            "transition confirmed"
        );
        // nobody listening yet is fine; send only errors on zero receivers
        let _ = self.events_tx.send(ChainEvent {
            deal_id: terms.deal_id.clone(),
            transition: transition.clone(),
            caller: caller.clone(),
            tx: tx.clone(),
            new_state,
            payments,
        });
        Ok(tx)
    }

    fn events(&self) -> broadcast::Receiver<ChainEvent> {
        self.events_tx.subscribe()
    }
}
