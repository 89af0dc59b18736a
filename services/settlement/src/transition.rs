//! The deal transition catalog
//!
//! A tagged variant over every lifecycle advance a deal can make. Each
//! transition knows its name (the idempotence key together with the deal
//! id), the state it fires from, the state it lands in, and the party
//! whose address must sign the call.

use serde::{Deserialize, Serialize};
use std::fmt;
use types::deal::Deal;
use types::ids::{Address, DealId};
use types::numeric::TokenAmount;
use types::state::AgreementState;

/// Everything the flow tables need to know about one deal.
///
/// A snapshot of the deal's parties, collateral amounts and agreement
/// progress; both the settlement engine and the escrow contract keep one
/// per deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealTerms {
    pub deal_id: DealId,
    pub job_creator: Address,
    pub resource_provider: Address,
    pub mediator: Option<Address>,
    pub unit_price: TokenAmount,
    /// JC's payment collateral (P).
    pub payment: TokenAmount,
    /// RP's results collateral (R).
    pub results: TokenAmount,
    /// Timeout collateral staked by each party (T).
    pub timeout: TokenAmount,
    /// Mediation fee (M).
    pub mediation_fee: TokenAmount,
    /// Job cost (C); zero until a result fixes the instruction count.
    pub job_cost: TokenAmount,
    /// Whether the resource provider's agree call is confirmed.
    pub resource_provider_agreed: bool,
    /// Whether the job creator's agree call is confirmed.
    pub job_creator_agreed: bool,
}

impl DealTerms {
    pub fn from_deal(deal: &Deal) -> Self {
        Self {
            deal_id: deal.id.clone(),
            job_creator: deal.job_creator.clone(),
            resource_provider: deal.resource_provider.clone(),
            mediator: deal.mediator.clone(),
            unit_price: deal.unit_price,
            payment: deal.collaterals.payment,
            results: deal.collaterals.results,
            timeout: deal.collaterals.timeout,
            mediation_fee: deal.collaterals.mediation_fee,
            job_cost: deal.job_cost,
            resource_provider_agreed: deal.transactions.resource_provider.agree.is_some(),
            job_creator_agreed: deal.transactions.job_creator.agree.is_some(),
        }
    }
}

/// Who must be behind a transition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    JobCreator,
    ResourceProvider,
    Mediator,
    /// The solver itself (timeouts, mediator assignment).
    Controller,
}

/// One lifecycle advance of a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    AgreeResourceProvider,
    AgreeJobCreator,
    AddResult {
        instruction_count: u64,
        /// Opaque content address of the result artifact.
        data_ref: String,
    },
    AcceptResult,
    ChallengeResult,
    AssignMediator { mediator: Address },
    MediationAcceptResult,
    MediationRejectResult,
    TimeoutAgree,
    TimeoutSubmitResults,
    TimeoutJudgeResults,
    TimeoutMediateResult,
}

impl Transition {
    /// Stable name; `(deal_id, name)` keys idempotence.
    pub fn name(&self) -> &'static str {
        match self {
            Transition::AgreeResourceProvider => "agreeResourceProvider",
            Transition::AgreeJobCreator => "agreeJobCreator",
            Transition::AddResult { .. } => "addResult",
            Transition::AcceptResult => "acceptResult",
            Transition::ChallengeResult => "challengeResult",
            Transition::AssignMediator { .. } => "assignMediator",
            Transition::MediationAcceptResult => "mediationAcceptResult",
            Transition::MediationRejectResult => "mediationRejectResult",
            Transition::TimeoutAgree => "timeoutAgree",
            Transition::TimeoutSubmitResults => "timeoutSubmitResults",
            Transition::TimeoutJudgeResults => "timeoutJudgeResults",
            Transition::TimeoutMediateResult => "timeoutMediateResult",
        }
    }

    /// The state a deal must be in for this transition to fire.
    pub fn required_state(&self) -> AgreementState {
        match self {
            Transition::AgreeResourceProvider
            | Transition::AgreeJobCreator
            | Transition::TimeoutAgree => AgreementState::DealNegotiating,
            Transition::AddResult { .. } | Transition::TimeoutSubmitResults => {
                AgreementState::DealAgreed
            }
            Transition::AcceptResult
            | Transition::ChallengeResult
            | Transition::TimeoutJudgeResults => AgreementState::ResultsSubmitted,
            Transition::AssignMediator { .. } => AgreementState::ResultsChallenged,
            Transition::MediationAcceptResult
            | Transition::MediationRejectResult
            | Transition::TimeoutMediateResult => AgreementState::Mediating,
        }
    }

    /// The state a deal lands in once this transition is confirmed.
    ///
    /// The agree transitions only advance the deal once *both* parties
    /// have agreed; a lone agree leaves the deal negotiating.
    pub fn target_state(&self, terms: &DealTerms) -> AgreementState {
        match self {
            Transition::AgreeResourceProvider => {
                if terms.job_creator_agreed {
                    AgreementState::DealAgreed
                } else {
                    AgreementState::DealNegotiating
                }
            }
            Transition::AgreeJobCreator => {
                if terms.resource_provider_agreed {
                    AgreementState::DealAgreed
                } else {
                    AgreementState::DealNegotiating
                }
            }
            Transition::AddResult { .. } => AgreementState::ResultsSubmitted,
            Transition::AcceptResult => AgreementState::ResultsAccepted,
            Transition::ChallengeResult => AgreementState::ResultsChallenged,
            Transition::AssignMediator { .. } => AgreementState::Mediating,
            Transition::MediationAcceptResult => AgreementState::MediationAccepted,
            Transition::MediationRejectResult => AgreementState::MediationRejected,
            Transition::TimeoutAgree => AgreementState::TimeoutAgree,
            Transition::TimeoutSubmitResults => AgreementState::TimeoutSubmitResults,
            Transition::TimeoutJudgeResults => AgreementState::TimeoutJudgeResults,
            Transition::TimeoutMediateResult => AgreementState::TimeoutMediateResult,
        }
    }

    /// Whose address must be behind the call.
    pub fn acting_party(&self) -> Party {
        match self {
            Transition::AgreeResourceProvider | Transition::AddResult { .. } => {
                Party::ResourceProvider
            }
            Transition::AgreeJobCreator
            | Transition::AcceptResult
            | Transition::ChallengeResult => Party::JobCreator,
            Transition::MediationAcceptResult | Transition::MediationRejectResult => {
                Party::Mediator
            }
            Transition::AssignMediator { .. }
            | Transition::TimeoutAgree
            | Transition::TimeoutSubmitResults
            | Transition::TimeoutJudgeResults
            | Transition::TimeoutMediateResult => Party::Controller,
        }
    }

    /// Whether this is one of the four timer-fired transitions.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Transition::TimeoutAgree
                | Transition::TimeoutSubmitResults
                | Transition::TimeoutJudgeResults
                | Transition::TimeoutMediateResult
        )
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
