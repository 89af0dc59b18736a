//! Matching policy
//!
//! Stateless: each pass takes the current unmatched offer sets plus a
//! prior-decision lookup and returns accepted proposals and rejected
//! pairs. Offers are evaluated in a deterministic order, so replaying
//! the same inputs always produces the same pairings.

pub mod policy;

pub use policy::{match_offers, MatchOutcome, MatchProposal, RejectedPair};
