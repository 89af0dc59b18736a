//! The escrow contract
//!
//! One entry point per transition, each protected three ways: only the
//! owner (the solver controller) may call write paths, the acting
//! party's address must match the deal's record of that party, and the
//! deal must be in the transition's required state. Every accepted call
//! applies the transition's flow table to the token ledger and emits the
//! corresponding payment events.
//!
//! Escrow accounting is per deal and per (poster, reason): a pay-out or
//! refund may only debit what was previously credited for that deal
//! under that reason. The check is against the escrow's own recorded
//! balance, never any party's.

use crate::errors::EscrowError;
use crate::token::TokenLedger;
use settlement::{compute_flows, DealTerms, Party, Transition};
use std::collections::HashMap;
use types::ids::{Address, DealId};
use types::numeric::TokenAmount;
use types::payment::{PaymentDirection, PaymentEvent, PaymentReason};
use types::state::AgreementState;

type CreditKey = (Address, PaymentReason);

/// Per-deal escrow account: terms, lifecycle state, and what each party
/// has locked under each reason.
#[derive(Debug, Clone)]
struct EscrowAccount {
    terms: DealTerms,
    state: AgreementState,
    credits: HashMap<CreditKey, TokenAmount>,
}

/// The escrow/payments contract.
#[derive(Debug)]
pub struct EscrowContract {
    owner: Address,
    escrow_address: Address,
    burn_address: Address,
    ledger: TokenLedger,
    deals: HashMap<DealId, EscrowAccount>,
    events: Vec<PaymentEvent>,
}

impl EscrowContract {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            escrow_address: Address::new("escrow"),
            burn_address: Address::new("burn"),
            ledger: TokenLedger::new(),
            deals: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Mint tokens to an account. Owner-only (dev / test faucet).
    pub fn fund(
        &mut self,
        caller: &Address,
        account: &Address,
        amount: TokenAmount,
    ) -> Result<(), EscrowError> {
        self.check_owner(caller)?;
        self.ledger.mint(account, amount)
    }

    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.ledger.balance_of(account)
    }

    /// Total collateral currently locked.
    pub fn escrow_balance(&self) -> TokenAmount {
        self.ledger.balance_of(&self.escrow_address)
    }

    /// Register a new deal's terms. Owner-only; a deal id registers once.
    pub fn register_deal(&mut self, caller: &Address, terms: DealTerms) -> Result<(), EscrowError> {
        self.check_owner(caller)?;
        if self.deals.contains_key(&terms.deal_id) {
            return Err(EscrowError::DealExists {
                deal_id: terms.deal_id.to_string(),
            });
        }
        let deal_id = terms.deal_id.clone();
        self.deals.insert(
            deal_id,
            EscrowAccount {
                terms,
                state: AgreementState::DealNegotiating,
                credits: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn deal_state(&self, deal_id: &DealId) -> Option<AgreementState> {
        self.deals.get(deal_id).map(|a| a.state)
    }

    pub fn deal_terms(&self, deal_id: &DealId) -> Option<&DealTerms> {
        self.deals.get(deal_id).map(|a| &a.terms)
    }

    /// Execute one transition call.
    ///
    /// `party` is the address the call was signed by; for timeouts and
    /// mediator assignment that is the owner itself. The deal's state,
    /// the acting party, and every flow's feasibility are all checked
    /// before any token moves, so a revert leaves nothing half-applied.
    pub fn execute(
        &mut self,
        caller: &Address,
        party: &Address,
        deal_id: &DealId,
        transition: &Transition,
    ) -> Result<Vec<PaymentEvent>, EscrowError> {
        self.check_owner(caller)?;

        let account = self
            .deals
            .get_mut(deal_id)
            .ok_or_else(|| EscrowError::UnknownDeal {
                deal_id: deal_id.to_string(),
            })?;

        if account.state != transition.required_state() {
            return Err(EscrowError::InvalidState {
                deal_id: deal_id.to_string(),
                expected: transition.required_state().to_string(),
                got: account.state.to_string(),
            });
        }

        let expected_party = match transition.acting_party() {
            Party::JobCreator => account.terms.job_creator.clone(),
            Party::ResourceProvider => account.terms.resource_provider.clone(),
            Party::Mediator => {
                account
                    .terms
                    .mediator
                    .clone()
                    .ok_or_else(|| EscrowError::NoMediator {
                        deal_id: deal_id.to_string(),
                    })?
            }
            Party::Controller => self.owner.clone(),
        };
        if party != &expected_party {
            return Err(EscrowError::WrongParty {
                expected: expected_party.to_string(),
                got: party.to_string(),
            });
        }

        // stage term updates on a copy; a revert must leave the account
        // exactly as it was
        let mut new_terms = account.terms.clone();
        match transition {
            Transition::AgreeResourceProvider if new_terms.resource_provider_agreed => {
                return Err(EscrowError::AlreadyAgreed {
                    party: party.to_string(),
                });
            }
            Transition::AgreeJobCreator if new_terms.job_creator_agreed => {
                return Err(EscrowError::AlreadyAgreed {
                    party: party.to_string(),
                });
            }
            Transition::AddResult { instruction_count, .. } => {
                if *instruction_count == 0 {
                    return Err(EscrowError::InvalidInstructionCount);
                }
                new_terms.job_cost = new_terms.unit_price.times(*instruction_count);
            }
            Transition::AssignMediator { mediator } => {
                new_terms.mediator = Some(mediator.clone());
            }
            _ => {}
        }

        let flows = compute_flows(&new_terms, transition);

        // dry-run against scratch copies; only a clean pass mutates
        {
            let mut ledger = self.ledger.clone();
            let mut credits = account.credits.clone();
            apply_flows(
                &mut ledger,
                &mut credits,
                &self.escrow_address,
                &self.burn_address,
                &new_terms,
                &flows,
            )?;
        }
        apply_flows(
            &mut self.ledger,
            &mut account.credits,
            &self.escrow_address,
            &self.burn_address,
            &new_terms,
            &flows,
        )?;

        match transition {
            Transition::AgreeResourceProvider => new_terms.resource_provider_agreed = true,
            Transition::AgreeJobCreator => new_terms.job_creator_agreed = true,
            _ => {}
        }
        account.state = transition.target_state(&new_terms);
        account.terms = new_terms;

        self.events.extend(flows.iter().cloned());
        Ok(flows)
    }

    /// All payment events emitted so far.
    pub fn events(&self) -> &[PaymentEvent] {
        &self.events
    }

    /// Consume and clear the emitted events.
    pub fn drain_events(&mut self) -> Vec<PaymentEvent> {
        std::mem::take(&mut self.events)
    }

    fn check_owner(&self, caller: &Address) -> Result<(), EscrowError> {
        if caller != &self.owner {
            return Err(EscrowError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }
}

/// Apply one transition's flows to a ledger and a deal's credit book.
///
/// PaidOut debits the credit that funds it (job payment from the JC's
/// payment collateral, mediation fee from the JC's fee deposit); refunds
/// and slashes debit the poster's own credit. Any shortfall in a credit
/// is a refused pay-out, not a partial one.
fn apply_flows(
    ledger: &mut TokenLedger,
    credits: &mut HashMap<CreditKey, TokenAmount>,
    escrow_address: &Address,
    burn_address: &Address,
    terms: &DealTerms,
    flows: &[PaymentEvent],
) -> Result<(), EscrowError> {
    for event in flows {
        match event.direction {
            PaymentDirection::PaidIn => {
                ledger.transfer(&event.payee, escrow_address, event.amount)?;
                let credit = credits
                    .entry((event.payee.clone(), event.reason))
                    .or_insert_with(TokenAmount::zero);
                *credit = credit
                    .checked_add(event.amount)
                    .ok_or(EscrowError::Overflow)?;
            }
            PaymentDirection::Refunded => {
                debit_credit(
                    credits,
                    &terms.deal_id,
                    (event.payee.clone(), event.reason),
                    event.amount,
                )?;
                ledger.transfer(escrow_address, &event.payee, event.amount)?;
            }
            PaymentDirection::PaidOut => {
                let source = match event.reason {
                    PaymentReason::JobPayment => {
                        (terms.job_creator.clone(), PaymentReason::PaymentCollateral)
                    }
                    PaymentReason::MediationFee => {
                        (terms.job_creator.clone(), PaymentReason::MediationFee)
                    }
                    _ => (event.payee.clone(), event.reason),
                };
                debit_credit(credits, &terms.deal_id, source, event.amount)?;
                ledger.transfer(escrow_address, &event.payee, event.amount)?;
            }
            PaymentDirection::Slashed => {
                debit_credit(
                    credits,
                    &terms.deal_id,
                    (event.payee.clone(), event.reason),
                    event.amount,
                )?;
                ledger.transfer(escrow_address, burn_address, event.amount)?;
            }
        }
    }
    Ok(())
}

fn debit_credit(
    credits: &mut HashMap<CreditKey, TokenAmount>,
    deal_id: &DealId,
    key: CreditKey,
    amount: TokenAmount,
) -> Result<(), EscrowError> {
    let available = credits.get(&key).copied().unwrap_or_else(TokenAmount::zero);
    if available < amount {
        return Err(EscrowError::InsufficientEscrow {
            deal_id: deal_id.to_string(),
            required: amount.to_string(),
            available: available.to_string(),
        });
    }
    credits.insert(key, available.saturating_sub(amount));
    Ok(())
}
