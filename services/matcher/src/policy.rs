//! Pairing policy for unmatched offers
//!
//! Compatibility requires the provider's capacity to cover the job's
//! demand, the creator's price ceiling to cover the unit price, the two
//! timeout-collateral declarations to agree (both parties stake the same
//! amount), and no prior decision for the pair. The first compatible
//! resource offer wins for each job offer; each offer pairs at most once
//! per pass. Tie-break is by `(created_at, id)` on both sides, which
//! keeps replay deterministic.

use std::collections::HashSet;
use tracing::debug;
use types::ids::OfferId;
use types::offer::{JobOffer, ResourceOffer};

/// An accepted pairing, ready to become a deal.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchProposal {
    pub job_offer: JobOffer,
    pub resource_offer: ResourceOffer,
}

/// A pair that was evaluated and found incompatible.
///
/// Recorded as a rejected decision so the pair is never re-evaluated:
/// offers are content-addressed and immutable, so incompatibility is
/// permanent.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPair {
    pub resource_offer: OfferId,
    pub job_offer: OfferId,
}

/// Result of one matching pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub proposals: Vec<MatchProposal>,
    pub rejections: Vec<RejectedPair>,
}

/// Check every compatibility predicate for one pair.
pub fn compatible(job_offer: &JobOffer, resource_offer: &ResourceOffer) -> bool {
    resource_offer.capacity.covers(&job_offer.demand)
        && job_offer.max_price >= resource_offer.unit_price
        && job_offer.collateral.timeout == resource_offer.collateral.timeout
}

/// Run one matching pass over the unmatched offer sets.
///
/// `decided` reports whether a decision already exists for a
/// `(resource offer, job offer)` pair; such pairs are skipped entirely
/// (neither proposed nor re-rejected).
pub fn match_offers(
    job_offers: &[JobOffer],
    resource_offers: &[ResourceOffer],
    decided: impl Fn(&OfferId, &OfferId) -> bool,
) -> MatchOutcome {
    let mut jobs: Vec<&JobOffer> = job_offers.iter().filter(|o| !o.is_matched()).collect();
    jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

    let mut resources: Vec<&ResourceOffer> =
        resource_offers.iter().filter(|o| !o.is_matched()).collect();
    resources.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

    let mut outcome = MatchOutcome::default();
    let mut taken: HashSet<&OfferId> = HashSet::new();

    for job in jobs {
        for resource in &resources {
            if taken.contains(&resource.id) || decided(&resource.id, &job.id) {
                continue;
            }
            if compatible(job, resource) {
                debug!(
                    job_offer = %job.id,
                    resource_offer = %resource.id,
                    "offers matched"
                );
                taken.insert(&resource.id);
                outcome.proposals.push(MatchProposal {
                    job_offer: job.clone(),
                    resource_offer: (*resource).clone(),
                });
                break;
            }
            outcome.rejections.push(RejectedPair {
                resource_offer: resource.id.clone(),
                job_offer: job.id.clone(),
            });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::Address;
    use types::numeric::TokenAmount;
    use types::offer::{Capacity, JobCollateral, ResourceCollateral};

    fn job(creator: &str, max_price: u64, created_at: i64) -> JobOffer {
        JobOffer::new(
            Address::new(creator),
            "wasm:fib",
            Capacity {
                cpu_millis: 1000,
                memory_mb: 512,
                gpu_count: 0,
            },
            TokenAmount::from_u64(max_price),
            JobCollateral {
                payment: TokenAmount::from_u64(100),
                timeout: TokenAmount::from_u64(5),
            },
            created_at,
        )
    }

    fn resource(provider: &str, unit_price: u64, created_at: i64) -> ResourceOffer {
        ResourceOffer::new(
            Address::new(provider),
            Capacity {
                cpu_millis: 4000,
                memory_mb: 8192,
                gpu_count: 0,
            },
            TokenAmount::from_u64(unit_price),
            ResourceCollateral {
                results: TokenAmount::from_u64(30),
                timeout: TokenAmount::from_u64(5),
            },
            created_at,
        )
    }

    fn no_decisions(_: &OfferId, _: &OfferId) -> bool {
        false
    }

    #[test]
    fn test_compatible_pair_matches() {
        let outcome = match_offers(&[job("0xjc", 10, 1)], &[resource("0xrp", 2, 2)], no_decisions);
        assert_eq!(outcome.proposals.len(), 1);
        assert!(outcome.rejections.is_empty());
    }

    #[test]
    fn test_price_ceiling_respected() {
        // unit price 20 > max price 10: incompatible, recorded as rejection
        let outcome = match_offers(&[job("0xjc", 10, 1)], &[resource("0xrp", 20, 2)], no_decisions);
        assert!(outcome.proposals.is_empty());
        assert_eq!(outcome.rejections.len(), 1);
    }

    #[test]
    fn test_capacity_must_cover_demand() {
        let mut small = resource("0xrp", 2, 2);
        small.capacity = Capacity {
            cpu_millis: 100,
            memory_mb: 64,
            gpu_count: 0,
        };
        let outcome = match_offers(&[job("0xjc", 10, 1)], &[small], no_decisions);
        assert!(outcome.proposals.is_empty());
    }

    #[test]
    fn test_timeout_stakes_must_align() {
        let mut mismatched = resource("0xrp", 2, 2);
        mismatched.collateral.timeout = TokenAmount::from_u64(9);
        let outcome = match_offers(&[job("0xjc", 10, 1)], &[mismatched], no_decisions);
        assert!(outcome.proposals.is_empty());
        assert_eq!(outcome.rejections.len(), 1);
    }

    #[test]
    fn test_matched_offers_are_skipped() {
        let mut matched = job("0xjc", 10, 1);
        matched.deal_id = Some(types::ids::DealId::from_hex("d1"));
        let outcome = match_offers(&[matched], &[resource("0xrp", 2, 2)], no_decisions);
        assert!(outcome.proposals.is_empty());
        assert!(outcome.rejections.is_empty());
    }

    #[test]
    fn test_prior_decision_skips_pair() {
        let j = job("0xjc", 10, 1);
        let r = resource("0xrp", 2, 2);
        let r_id = r.id.clone();
        let j_id = j.id.clone();
        let outcome = match_offers(&[j], &[r], |ro, jo| ro == &r_id && jo == &j_id);
        assert!(outcome.proposals.is_empty());
        assert!(outcome.rejections.is_empty());
    }

    #[test]
    fn test_one_resource_pairs_at_most_once() {
        let outcome = match_offers(
            &[job("0xjc1", 10, 1), job("0xjc2", 10, 2)],
            &[resource("0xrp", 2, 3)],
            no_decisions,
        );
        assert_eq!(outcome.proposals.len(), 1);
        assert_eq!(
            outcome.proposals[0].job_offer.job_creator,
            Address::new("0xjc1")
        );
    }

    #[test]
    fn test_oldest_job_offer_wins() {
        let outcome = match_offers(
            &[job("0xlate", 10, 50), job("0xearly", 10, 10)],
            &[resource("0xrp", 2, 1)],
            no_decisions,
        );
        assert_eq!(outcome.proposals.len(), 1);
        assert_eq!(
            outcome.proposals[0].job_offer.job_creator,
            Address::new("0xearly")
        );
    }

    #[test]
    fn test_pass_is_deterministic() {
        let jobs = vec![job("0xa", 10, 1), job("0xb", 10, 1), job("0xc", 10, 2)];
        let resources = vec![resource("0xr1", 2, 1), resource("0xr2", 3, 1)];
        let first = match_offers(&jobs, &resources, no_decisions);
        let second = match_offers(&jobs, &resources, no_decisions);
        assert_eq!(first, second);
    }
}
