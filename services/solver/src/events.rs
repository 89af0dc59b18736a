//! The subscription surface
//!
//! Every store-visible change the controller makes is republished as a
//! `SolverEvent` on a broadcast channel. External collaborators (the
//! HTTP/WebSocket tail, role agents) subscribe and filter; slow
//! subscribers lag and miss, they never block the controller.

use serde::Serialize;
use types::deal::Deal;
use types::decision::MatchDecision;
use types::offer::{JobOffer, ResourceOffer};
use types::payment::PaymentEvent;
use uuid::Uuid;

/// One published state change.
#[derive(Debug, Clone, Serialize)]
pub struct SolverEvent {
    /// Unique event id (UUID v7, time-sortable).
    pub event_id: Uuid,
    /// Unix seconds at publication.
    pub emitted_at: i64,
    pub payload: SolverEventPayload,
}

/// What changed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type")]
pub enum SolverEventPayload {
    JobOfferAdded(JobOffer),
    ResourceOfferAdded(ResourceOffer),
    DecisionRecorded(MatchDecision),
    DealCreated(Deal),
    DealUpdated(Deal),
    Payment(PaymentEvent),
}

impl SolverEvent {
    pub fn new(payload: SolverEventPayload, now: i64) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            emitted_at: now,
            payload,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match &self.payload {
            SolverEventPayload::JobOfferAdded(_) => "JobOfferAdded",
            SolverEventPayload::ResourceOfferAdded(_) => "ResourceOfferAdded",
            SolverEventPayload::DecisionRecorded(_) => "DecisionRecorded",
            SolverEventPayload::DealCreated(_) => "DealCreated",
            SolverEventPayload::DealUpdated(_) => "DealUpdated",
            SolverEventPayload::Payment(_) => "Payment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{Address, DealId};
    use types::numeric::TokenAmount;
    use types::payment::{PaymentDirection, PaymentReason};

    #[test]
    fn test_event_label() {
        let event = SolverEvent::new(
            SolverEventPayload::Payment(PaymentEvent::new(
                DealId::from_hex("d1"),
                Address::new("0xrp"),
                TokenAmount::from_u64(5),
                PaymentReason::TimeoutCollateral,
                PaymentDirection::PaidIn,
            )),
            1_700_000_000,
        );
        assert_eq!(event.label(), "Payment");
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = SolverEvent::new(
            SolverEventPayload::Payment(PaymentEvent::new(
                DealId::from_hex("d1"),
                Address::new("0xrp"),
                TokenAmount::from_u64(5),
                PaymentReason::TimeoutCollateral,
                PaymentDirection::PaidIn,
            )),
            0,
        );
        let b = SolverEvent::new(a.payload.clone(), 0);
        assert_ne!(a.event_id, b.event_id);
    }
}
