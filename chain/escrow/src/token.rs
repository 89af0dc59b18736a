//! Fungible token ledger
//!
//! The ERC-20-shaped balance book the escrow settles against. Credits
//! and debits are checked; the escrow address holds all in-flight
//! collateral, and slashed collateral moves to the burn address.

use crate::errors::EscrowError;
use std::collections::HashMap;
use types::ids::Address;
use types::numeric::TokenAmount;

/// Balances per address, with checked transfers.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: HashMap<Address, TokenAmount>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly minted tokens to an account.
    pub fn mint(&mut self, to: &Address, amount: TokenAmount) -> Result<(), EscrowError> {
        let balance = self.balances.entry(to.clone()).or_insert_with(TokenAmount::zero);
        *balance = balance.checked_add(amount).ok_or(EscrowError::Overflow)?;
        Ok(())
    }

    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.balances
            .get(account)
            .copied()
            .unwrap_or_else(TokenAmount::zero)
    }

    /// Move tokens between accounts; fails if `from` cannot cover it.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<(), EscrowError> {
        if amount.is_zero() {
            return Ok(());
        }
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(EscrowError::InsufficientBalance {
                account: from.to_string(),
                required: amount.to_string(),
                available: from_balance.to_string(),
            });
        }
        self.balances
            .insert(from.clone(), from_balance.saturating_sub(amount));
        let to_balance = self.balances.entry(to.clone()).or_insert_with(TokenAmount::zero);
        *to_balance = to_balance.checked_add(amount).ok_or(EscrowError::Overflow)?;
        Ok(())
    }
}
