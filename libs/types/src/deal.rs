//! Deals: a committed pairing of one job offer with one resource offer
//!
//! The deal record is the authority on lifecycle state, collateral
//! amounts, and which on-chain calls each party has made. Offers are
//! referenced by id only; lookups go through the store.

use crate::ids::{Address, DealId, TxHash};
use crate::numeric::TokenAmount;
use crate::offer::{JobOffer, ResourceOffer};
use crate::state::AgreementState;
use serde::{Deserialize, Serialize};

/// The four collateral amounts governing a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaterals {
    /// Posted by the JC on agree; the job cost is paid out of it.
    pub payment: TokenAmount,
    /// Posted by the RP with the result; slashed on mediation reject.
    pub results: TokenAmount,
    /// Posted by both parties on agree; slashed on their own timeout.
    pub timeout: TokenAmount,
    /// Posted by the JC on challenge; paid to the mediator.
    pub mediation_fee: TokenAmount,
}

/// Tx hashes for the calls the resource provider has made.
///
/// On merge, `None` means "no change" — only present hashes overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceProviderTxs {
    pub agree: Option<TxHash>,
    pub add_result: Option<TxHash>,
    pub timeout_agree: Option<TxHash>,
    pub timeout_judge_results: Option<TxHash>,
    pub timeout_mediate_result: Option<TxHash>,
}

impl ResourceProviderTxs {
    pub fn merge(&mut self, update: ResourceProviderTxs) {
        if update.agree.is_some() {
            self.agree = update.agree;
        }
        if update.add_result.is_some() {
            self.add_result = update.add_result;
        }
        if update.timeout_agree.is_some() {
            self.timeout_agree = update.timeout_agree;
        }
        if update.timeout_judge_results.is_some() {
            self.timeout_judge_results = update.timeout_judge_results;
        }
        if update.timeout_mediate_result.is_some() {
            self.timeout_mediate_result = update.timeout_mediate_result;
        }
    }
}

/// Tx hashes for the calls the job creator has made.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobCreatorTxs {
    pub agree: Option<TxHash>,
    pub accept_result: Option<TxHash>,
    pub challenge_result: Option<TxHash>,
    pub timeout_agree: Option<TxHash>,
    pub timeout_submit_results: Option<TxHash>,
    pub timeout_mediate_result: Option<TxHash>,
}

impl JobCreatorTxs {
    pub fn merge(&mut self, update: JobCreatorTxs) {
        if update.agree.is_some() {
            self.agree = update.agree;
        }
        if update.accept_result.is_some() {
            self.accept_result = update.accept_result;
        }
        if update.challenge_result.is_some() {
            self.challenge_result = update.challenge_result;
        }
        if update.timeout_agree.is_some() {
            self.timeout_agree = update.timeout_agree;
        }
        if update.timeout_submit_results.is_some() {
            self.timeout_submit_results = update.timeout_submit_results;
        }
        if update.timeout_mediate_result.is_some() {
            self.timeout_mediate_result = update.timeout_mediate_result;
        }
    }
}

/// Tx hashes for the calls the mediator has made.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediatorTxs {
    pub mediation_accept_result: Option<TxHash>,
    pub mediation_reject_result: Option<TxHash>,
}

impl MediatorTxs {
    pub fn merge(&mut self, update: MediatorTxs) {
        if update.mediation_accept_result.is_some() {
            self.mediation_accept_result = update.mediation_accept_result;
        }
        if update.mediation_reject_result.is_some() {
            self.mediation_reject_result = update.mediation_reject_result;
        }
    }
}

/// All recorded on-chain calls, grouped by acting party.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DealTransactions {
    pub resource_provider: ResourceProviderTxs,
    pub job_creator: JobCreatorTxs,
    pub mediator: MediatorTxs,
}

/// A committed pairing of one job offer with one resource offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub job_creator: Address,
    pub resource_provider: Address,
    /// Assigned only once the result is challenged.
    pub mediator: Option<Address>,
    pub job_offer: crate::ids::OfferId,
    pub resource_offer: crate::ids::OfferId,
    /// Price per instruction, fixed at match time.
    pub unit_price: TokenAmount,
    /// Zero until a result is submitted.
    pub instruction_count: u64,
    /// `unit_price * instruction_count`, evaluated once at result submission.
    pub job_cost: TokenAmount,
    pub collaterals: Collaterals,
    pub state: AgreementState,
    /// Unix seconds when `state` was entered; timeout deadlines count from here.
    pub state_entered_at: i64,
    pub transactions: DealTransactions,
    pub created_at: i64,
}

impl Deal {
    /// Build the deal for a matched offer pair.
    ///
    /// Payment and timeout collaterals come from the job offer, results
    /// collateral from the resource offer; the matcher has already
    /// required the two timeout declarations to agree. The mediation fee
    /// is solver policy, supplied by the caller.
    pub fn from_offers(
        job_offer: &JobOffer,
        resource_offer: &ResourceOffer,
        mediation_fee: TokenAmount,
        now: i64,
    ) -> Self {
        Self {
            id: DealId::derive(&resource_offer.id, &job_offer.id),
            job_creator: job_offer.job_creator.clone(),
            resource_provider: resource_offer.resource_provider.clone(),
            mediator: None,
            job_offer: job_offer.id.clone(),
            resource_offer: resource_offer.id.clone(),
            unit_price: resource_offer.unit_price,
            instruction_count: 0,
            job_cost: TokenAmount::zero(),
            collaterals: Collaterals {
                payment: job_offer.collateral.payment,
                results: resource_offer.collateral.results,
                timeout: job_offer.collateral.timeout,
                mediation_fee,
            },
            state: AgreementState::DealNegotiating,
            state_entered_at: now,
            transactions: DealTransactions::default(),
            created_at: now,
        }
    }

    /// Agreement is reached only once both agree calls are recorded.
    pub fn both_parties_agreed(&self) -> bool {
        self.transactions.resource_provider.agree.is_some()
            && self.transactions.job_creator.agree.is_some()
    }
}

/// Per-provider count of successfully completed deals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub resource_provider: Address,
    pub job_count: u64,
}
