//! Controller configuration

use types::ids::Address;
use types::numeric::TokenAmount;
use types::state::AgreementState;

/// Per-state timeout windows, in seconds from state entry.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutWindows {
    pub agree_secs: i64,
    pub submit_secs: i64,
    pub judge_secs: i64,
    pub mediate_secs: i64,
}

impl Default for TimeoutWindows {
    fn default() -> Self {
        Self {
            agree_secs: 120,
            submit_secs: 600,
            judge_secs: 300,
            mediate_secs: 600,
        }
    }
}

impl TimeoutWindows {
    /// The deadline window for a state, if it has one.
    pub fn window_for(&self, state: AgreementState) -> Option<i64> {
        match state {
            AgreementState::DealNegotiating => Some(self.agree_secs),
            AgreementState::DealAgreed => Some(self.submit_secs),
            AgreementState::ResultsSubmitted => Some(self.judge_secs),
            AgreementState::Mediating => Some(self.mediate_secs),
            _ => None,
        }
    }
}

/// Everything the controller needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// The solver's own chain address; owner of the escrow contract.
    pub solver_address: Address,
    /// Mediator assigned when a result is challenged.
    pub mediator: Address,
    /// Fee charged into escrow on challenge and paid to the mediator.
    pub mediation_fee: TokenAmount,
    pub timeouts: TimeoutWindows,
    /// How often the timeout ticker scans active deals.
    pub tick_interval_ms: u64,
}

impl ControllerConfig {
    pub fn new(solver_address: Address, mediator: Address) -> Self {
        Self {
            solver_address,
            mediator,
            mediation_fee: TokenAmount::from_u64(8),
            timeouts: TimeoutWindows::default(),
            tick_interval_ms: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_waiting_states_have_windows() {
        let windows = TimeoutWindows::default();
        assert!(windows.window_for(AgreementState::DealNegotiating).is_some());
        assert!(windows.window_for(AgreementState::Mediating).is_some());
        assert!(windows.window_for(AgreementState::ResultsAccepted).is_none());
        assert!(windows.window_for(AgreementState::TimeoutAgree).is_none());
        // mediator assignment is immediate, no window needed
        assert!(windows
            .window_for(AgreementState::ResultsChallenged)
            .is_none());
    }
}
