//! Payment events
//!
//! Every collateral movement the escrow performs is emitted as one
//! `PaymentEvent`. For a deal that reaches a terminal state the multiset
//! of its events balances: every PaidIn is matched by a Refunded,
//! PaidOut, or Slashed of equal amount.

use crate::ids::{Address, DealId};
use crate::numeric::TokenAmount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why tokens moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentReason {
    /// The job creator's payment collateral.
    PaymentCollateral,
    /// The resource provider's results collateral.
    ResultsCollateral,
    /// Either party's timeout collateral.
    TimeoutCollateral,
    /// Payment for the job itself (`unit_price * instruction_count`).
    JobPayment,
    /// The fee paid to the mediator on a challenge.
    MediationFee,
}

/// Which way tokens moved relative to the escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentDirection {
    /// Locked into escrow.
    PaidIn,
    /// Paid out of escrow to a counterparty.
    PaidOut,
    /// Locked collateral released back to its original poster.
    Refunded,
    /// Locked collateral forfeited by its poster.
    Slashed,
}

/// One collateral movement, as emitted by the escrow contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub deal_id: DealId,
    /// The party whose balance the movement concerns.
    pub payee: Address,
    pub amount: TokenAmount,
    pub reason: PaymentReason,
    pub direction: PaymentDirection,
}

impl PaymentEvent {
    pub fn new(
        deal_id: DealId,
        payee: Address,
        amount: TokenAmount,
        reason: PaymentReason,
        direction: PaymentDirection,
    ) -> Self {
        Self {
            deal_id,
            payee,
            amount,
            reason,
            direction,
        }
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:?} {} -> {} (deal {})",
            self.direction, self.reason, self.amount, self.payee, self.deal_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_round_trip() {
        let event = PaymentEvent::new(
            DealId::from_hex("d1"),
            Address::new("0xrp"),
            TokenAmount::from_u64(30),
            PaymentReason::ResultsCollateral,
            PaymentDirection::PaidIn,
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: PaymentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
