//! Match decisions
//!
//! One record per (resource offer, job offer) pair ever considered by the
//! matcher, accepted or not. The composite key is write-once: a second
//! decision for the same pair is a conflict. Rejected decisions keep the
//! matcher from re-evaluating a pair on every pass and double as an
//! audit trail.

use crate::ids::{DealId, OfferId};
use serde::{Deserialize, Serialize};

/// The matcher's verdict on one offer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub resource_offer: OfferId,
    pub job_offer: OfferId,
    /// Present only when `accepted`.
    pub deal_id: Option<DealId>,
    pub accepted: bool,
    /// Unix seconds.
    pub created_at: i64,
}

impl MatchDecision {
    /// Composite key used by the decisions table.
    pub fn key_for(resource_offer: &OfferId, job_offer: &OfferId) -> String {
        format!("{}-{}", resource_offer, job_offer)
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.resource_offer, &self.job_offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_pair_dependent() {
        let ro = OfferId::from_content(b"ro");
        let jo = OfferId::from_content(b"jo");
        assert_eq!(
            MatchDecision::key_for(&ro, &jo),
            format!("{}-{}", ro, jo)
        );
        assert_ne!(
            MatchDecision::key_for(&ro, &jo),
            MatchDecision::key_for(&jo, &ro)
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let decision = MatchDecision {
            resource_offer: OfferId::from_content(b"ro"),
            job_offer: OfferId::from_content(b"jo"),
            deal_id: None,
            accepted: false,
            created_at: 1_700_000_000,
        };
        let json = serde_json::to_string(&decision).unwrap();
        let back: MatchDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, back);
    }
}
