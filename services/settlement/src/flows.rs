//! Collateral flow tables
//!
//! One deterministic list of payment events per transition. Conventions:
//!
//! - `P` payment collateral, `R` results collateral, `T` timeout
//!   collateral, `M` mediation fee, `C` job cost.
//! - Differences are taken with `saturating_sub` on both directions, so
//!   the absolute difference moves and nothing negative reaches the
//!   ledger.
//! - The JC is never refunded more than `P`: the job payment is capped
//!   at `min(C, P)` and the RP absorbs any shortfall.
//! - Zero-amount events are omitted.
//!
//! For every path that ends in a terminal state the emitted events
//! balance: each PaidIn is matched by Refunded, PaidOut, or Slashed of
//! equal total.

use crate::transition::{DealTerms, Transition};
use types::ids::Address;
use types::numeric::TokenAmount;
use types::payment::{PaymentDirection, PaymentEvent, PaymentReason};

struct FlowList<'a> {
    terms: &'a DealTerms,
    events: Vec<PaymentEvent>,
}

impl<'a> FlowList<'a> {
    fn new(terms: &'a DealTerms) -> Self {
        Self {
            terms,
            events: Vec::new(),
        }
    }

    fn push(
        &mut self,
        payee: &Address,
        amount: TokenAmount,
        reason: PaymentReason,
        direction: PaymentDirection,
    ) {
        if amount.is_zero() {
            return;
        }
        self.events.push(PaymentEvent::new(
            self.terms.deal_id.clone(),
            payee.clone(),
            amount,
            reason,
            direction,
        ));
    }
}

/// Compute the payment events for one transition of one deal.
///
/// Pure: same terms and transition always yield the same events, in the
/// same order. `AddResult` evaluates the job cost from its instruction
/// count; every later transition reads the cost already fixed in `terms`.
pub fn compute_flows(terms: &DealTerms, transition: &Transition) -> Vec<PaymentEvent> {
    use PaymentDirection::*;
    use PaymentReason::*;

    let jc = &terms.job_creator;
    let rp = &terms.resource_provider;
    let mut flows = FlowList::new(terms);

    match transition {
        Transition::AgreeResourceProvider => {
            flows.push(rp, terms.timeout, TimeoutCollateral, PaidIn);
        }

        Transition::AgreeJobCreator => {
            flows.push(jc, terms.payment, PaymentCollateral, PaidIn);
            flows.push(jc, terms.timeout, TimeoutCollateral, PaidIn);
        }

        Transition::AddResult { .. } => {
            // the RP's timeout stake converts into the results stake;
            // only the absolute difference moves on chain
            flows.push(rp, terms.timeout, TimeoutCollateral, Refunded);
            flows.push(rp, terms.results, ResultsCollateral, PaidIn);
        }

        Transition::AcceptResult => {
            let paid = terms.job_cost.min(terms.payment);
            flows.push(jc, terms.payment.saturating_sub(paid), PaymentCollateral, Refunded);
            flows.push(jc, terms.timeout, TimeoutCollateral, Refunded);
            flows.push(rp, terms.results, ResultsCollateral, Refunded);
            flows.push(rp, paid, JobPayment, PaidOut);
        }

        Transition::ChallengeResult => {
            flows.push(jc, terms.timeout, TimeoutCollateral, Refunded);
            flows.push(jc, terms.mediation_fee, MediationFee, PaidIn);
        }

        Transition::AssignMediator { .. } => {}

        Transition::MediationAcceptResult => {
            let paid = terms.job_cost.min(terms.payment);
            flows.push(jc, terms.payment.saturating_sub(paid), PaymentCollateral, Refunded);
            flows.push(rp, terms.results, ResultsCollateral, Refunded);
            flows.push(rp, paid, JobPayment, PaidOut);
            if let Some(mediator) = &terms.mediator {
                flows.push(mediator, terms.mediation_fee, MediationFee, PaidOut);
            }
        }

        Transition::MediationRejectResult => {
            flows.push(jc, terms.payment, PaymentCollateral, Refunded);
            if let Some(mediator) = &terms.mediator {
                flows.push(mediator, terms.mediation_fee, MediationFee, PaidOut);
            }
            flows.push(rp, terms.results, ResultsCollateral, Slashed);
        }

        Transition::TimeoutAgree => {
            // refund whatever was actually posted; nobody is slashed
            if terms.resource_provider_agreed {
                flows.push(rp, terms.timeout, TimeoutCollateral, Refunded);
            }
            if terms.job_creator_agreed {
                flows.push(jc, terms.payment, PaymentCollateral, Refunded);
                flows.push(jc, terms.timeout, TimeoutCollateral, Refunded);
            }
        }

        Transition::TimeoutSubmitResults => {
            flows.push(jc, terms.payment, PaymentCollateral, Refunded);
            flows.push(jc, terms.timeout, TimeoutCollateral, Refunded);
            flows.push(rp, terms.timeout, TimeoutCollateral, Slashed);
        }

        Transition::TimeoutJudgeResults => {
            flows.push(rp, terms.results, ResultsCollateral, Refunded);
            flows.push(jc, terms.payment, PaymentCollateral, Refunded);
            flows.push(jc, terms.timeout, TimeoutCollateral, Slashed);
        }

        Transition::TimeoutMediateResult => {
            // the mediator failed: everything goes back, nobody is slashed
            flows.push(rp, terms.results, ResultsCollateral, Refunded);
            flows.push(jc, terms.payment, PaymentCollateral, Refunded);
            flows.push(jc, terms.mediation_fee, MediationFee, Refunded);
        }
    }

    flows.events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use types::ids::DealId;

    fn terms() -> DealTerms {
        DealTerms {
            deal_id: DealId::from_hex("d1"),
            job_creator: Address::new("0xjc"),
            resource_provider: Address::new("0xrp"),
            mediator: Some(Address::new("0xmed")),
            unit_price: TokenAmount::from_u64(2),
            payment: TokenAmount::from_u64(100),
            results: TokenAmount::from_u64(30),
            timeout: TokenAmount::from_u64(5),
            mediation_fee: TokenAmount::from_u64(8),
            job_cost: TokenAmount::from_u64(20),
            resource_provider_agreed: true,
            job_creator_agreed: true,
        }
    }

    fn find(
        events: &[PaymentEvent],
        payee: &str,
        reason: PaymentReason,
        direction: PaymentDirection,
    ) -> TokenAmount {
        events
            .iter()
            .find(|e| {
                e.payee == Address::new(payee) && e.reason == reason && e.direction == direction
            })
            .map(|e| e.amount)
            .unwrap_or_else(TokenAmount::zero)
    }

    #[test]
    fn test_agree_flows() {
        let t = terms();
        let rp_flows = compute_flows(&t, &Transition::AgreeResourceProvider);
        assert_eq!(rp_flows.len(), 1);
        assert_eq!(
            find(
                &rp_flows,
                "0xrp",
                PaymentReason::TimeoutCollateral,
                PaymentDirection::PaidIn
            ),
            TokenAmount::from_u64(5)
        );

        let jc_flows = compute_flows(&t, &Transition::AgreeJobCreator);
        assert_eq!(jc_flows.len(), 2);
        assert_eq!(
            find(
                &jc_flows,
                "0xjc",
                PaymentReason::PaymentCollateral,
                PaymentDirection::PaidIn
            ),
            TokenAmount::from_u64(100)
        );
    }

    #[test]
    fn test_add_result_swaps_timeout_for_results_stake() {
        let flows = compute_flows(
            &terms(),
            &Transition::AddResult {
                instruction_count: 10,
                data_ref: "bafy-result".to_string(),
            },
        );
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::TimeoutCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(5)
        );
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::ResultsCollateral,
                PaymentDirection::PaidIn
            ),
            TokenAmount::from_u64(30)
        );
    }

    #[test]
    fn test_accept_result_flows_happy_path() {
        // P=100, C=20: JC gets 80 + T back, RP gets R back plus 20 payment
        let flows = compute_flows(&terms(), &Transition::AcceptResult);
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::PaymentCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(80)
        );
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::TimeoutCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(5)
        );
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::ResultsCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(30)
        );
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::JobPayment,
                PaymentDirection::PaidOut
            ),
            TokenAmount::from_u64(20)
        );
    }

    #[test]
    fn test_job_payment_capped_at_payment_collateral() {
        // C=120 > P=100: refund floor is 0, RP absorbs the shortfall
        let mut t = terms();
        t.job_cost = TokenAmount::from_u64(120);
        let flows = compute_flows(&t, &Transition::AcceptResult);
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::JobPayment,
                PaymentDirection::PaidOut
            ),
            TokenAmount::from_u64(100)
        );
        // no residual refund event at all
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::PaymentCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::zero()
        );
    }

    #[test]
    fn test_challenge_flows_use_absolute_difference() {
        // T=5 refunded, M=8 paid in: net 3 in, but events carry full amounts
        let flows = compute_flows(&terms(), &Transition::ChallengeResult);
        assert_eq!(flows.len(), 2);
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::TimeoutCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(5)
        );
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::MediationFee,
                PaymentDirection::PaidIn
            ),
            TokenAmount::from_u64(8)
        );
    }

    #[test]
    fn test_mediation_reject_slashes_results_collateral() {
        let flows = compute_flows(&terms(), &Transition::MediationRejectResult);
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::PaymentCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(100)
        );
        assert_eq!(
            find(
                &flows,
                "0xmed",
                PaymentReason::MediationFee,
                PaymentDirection::PaidOut
            ),
            TokenAmount::from_u64(8)
        );
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::ResultsCollateral,
                PaymentDirection::Slashed
            ),
            TokenAmount::from_u64(30)
        );
    }

    #[test]
    fn test_timeout_agree_refunds_only_what_was_posted() {
        let mut t = terms();
        t.resource_provider_agreed = false;
        t.job_creator_agreed = true;
        let flows = compute_flows(&t, &Transition::TimeoutAgree);
        // JC posted P and T; RP posted nothing
        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|e| e.payee == Address::new("0xjc")));

        t.job_creator_agreed = false;
        assert!(compute_flows(&t, &Transition::TimeoutAgree).is_empty());
    }

    #[test]
    fn test_timeout_submit_results_slashes_provider_stake() {
        let flows = compute_flows(&terms(), &Transition::TimeoutSubmitResults);
        assert_eq!(
            find(
                &flows,
                "0xrp",
                PaymentReason::TimeoutCollateral,
                PaymentDirection::Slashed
            ),
            TokenAmount::from_u64(5)
        );
        assert_eq!(
            find(
                &flows,
                "0xjc",
                PaymentReason::PaymentCollateral,
                PaymentDirection::Refunded
            ),
            TokenAmount::from_u64(100)
        );
    }

    #[test]
    fn test_timeout_mediate_slashes_nobody() {
        let flows = compute_flows(&terms(), &Transition::TimeoutMediateResult);
        assert!(flows
            .iter()
            .all(|e| e.direction != PaymentDirection::Slashed));
    }

    #[test]
    fn test_every_terminal_path_balances() {
        use Transition::*;
        let agree = [AgreeResourceProvider, AgreeJobCreator];
        let to_submitted = [
            AgreeResourceProvider,
            AgreeJobCreator,
            AddResult {
                instruction_count: 10,
                data_ref: "bafy-result".to_string(),
            },
        ];
        let to_mediating = [
            AgreeResourceProvider,
            AgreeJobCreator,
            AddResult {
                instruction_count: 10,
                data_ref: "bafy-result".to_string(),
            },
            ChallengeResult,
            AssignMediator {
                mediator: Address::new("0xmed"),
            },
        ];

        let mut paths: Vec<Vec<Transition>> = Vec::new();
        paths.push([&to_submitted[..], &[AcceptResult]].concat());
        paths.push([&to_mediating[..], &[MediationAcceptResult]].concat());
        paths.push([&to_mediating[..], &[MediationRejectResult]].concat());
        paths.push([&to_mediating[..], &[TimeoutMediateResult]].concat());
        paths.push([&to_submitted[..], &[TimeoutJudgeResults]].concat());
        paths.push([&agree[..], &[TimeoutSubmitResults]].concat());
        paths.push(vec![AgreeJobCreator, TimeoutAgree]);
        paths.push(vec![AgreeResourceProvider, TimeoutAgree]);
        paths.push(vec![TimeoutAgree]);

        for path in &paths {
            // flows for agree-dependent transitions read the agreed flags,
            // so walk the path updating them as the deal would
            let mut t = terms();
            t.job_cost = TokenAmount::zero();
            t.resource_provider_agreed = false;
            t.job_creator_agreed = false;
            let mut paid_in = TokenAmount::zero();
            let mut paid_back = TokenAmount::zero();
            for transition in path {
                if let AddResult { instruction_count, .. } = transition {
                    t.job_cost = t.unit_price.times(*instruction_count);
                }
                for event in compute_flows(&t, transition) {
                    match event.direction {
                        PaymentDirection::PaidIn => {
                            paid_in = paid_in.checked_add(event.amount).unwrap()
                        }
                        _ => paid_back = paid_back.checked_add(event.amount).unwrap(),
                    }
                }
                match transition {
                    AgreeResourceProvider => t.resource_provider_agreed = true,
                    AgreeJobCreator => t.job_creator_agreed = true,
                    _ => {}
                }
            }
            assert_eq!(paid_in, paid_back, "path {:?} does not balance", path);
        }
    }

    #[test]
    fn test_challenge_scenario_net_positions() {
        // challenge then mediation accept: JC nets -(C + M), RP nets +C,
        // mediator nets +M
        use Transition::*;
        let mut t = terms();
        t.resource_provider_agreed = false;
        t.job_creator_agreed = false;
        t.job_cost = TokenAmount::zero();

        let path = [
            AgreeResourceProvider,
            AgreeJobCreator,
            AddResult {
                instruction_count: 10,
                data_ref: "bafy-result".to_string(),
            },
            ChallengeResult,
            AssignMediator {
                mediator: Address::new("0xmed"),
            },
            MediationAcceptResult,
        ];

        // net per address: outflows from escrow count positive
        let mut net: HashMap<Address, i64> = HashMap::new();
        for transition in &path {
            if let AddResult { instruction_count, .. } = transition {
                t.job_cost = t.unit_price.times(*instruction_count);
            }
            for event in compute_flows(&t, transition) {
                let amount: i64 = event.amount.to_string().parse().unwrap();
                let entry = net.entry(event.payee.clone()).or_insert(0);
                match event.direction {
                    PaymentDirection::PaidIn => *entry -= amount,
                    PaymentDirection::Refunded | PaymentDirection::PaidOut => *entry += amount,
                    PaymentDirection::Slashed => {}
                }
            }
            match transition {
                AgreeResourceProvider => t.resource_provider_agreed = true,
                AgreeJobCreator => t.job_creator_agreed = true,
                _ => {}
            }
        }

        assert_eq!(net[&Address::new("0xjc")], -28); // -C(20) - M(8)
        assert_eq!(net[&Address::new("0xrp")], 20); // +C
        assert_eq!(net[&Address::new("0xmed")], 8); // +M
    }

    #[test]
    fn test_flows_are_deterministic() {
        let t = terms();
        assert_eq!(
            compute_flows(&t, &Transition::AcceptResult),
            compute_flows(&t, &Transition::AcceptResult)
        );
    }
}
