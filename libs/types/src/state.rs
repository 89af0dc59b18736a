//! Deal agreement states
//!
//! The lifecycle of a deal from negotiation to a terminal state. The
//! numeric ids are frozen: the escrow contract uses the same ordinals, so
//! renumbering would break chain equivalence. States only ever advance;
//! `can_advance_to` encodes the full transition relation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a deal (and of its two offers, which track it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgreementState {
    /// State 0: deal created, waiting for both parties to agree.
    DealNegotiating,
    /// State 1: both agree transactions confirmed.
    DealAgreed,
    /// State 2: the resource provider posted a result.
    ResultsSubmitted,
    /// State 3: the job creator accepted the result (terminal, success).
    ResultsAccepted,
    /// State 4: the job creator challenged the result.
    ResultsChallenged,
    /// State 5: a mediator was assigned and is ruling.
    Mediating,
    /// State 6: the mediator upheld the result (terminal, success).
    MediationAccepted,
    /// State 7: the mediator rejected the result (terminal, failure).
    MediationRejected,
    /// State 8: agreement window elapsed (terminal, failure).
    TimeoutAgree,
    /// State 9: result-submission window elapsed (terminal, failure).
    TimeoutSubmitResults,
    /// State 10: judge window elapsed (terminal, failure).
    TimeoutJudgeResults,
    /// State 11: mediation window elapsed (terminal, failure).
    TimeoutMediateResult,
}

impl AgreementState {
    /// Frozen numeric id shared with the escrow contract.
    pub fn state_id(&self) -> u8 {
        match self {
            AgreementState::DealNegotiating => 0,
            AgreementState::DealAgreed => 1,
            AgreementState::ResultsSubmitted => 2,
            AgreementState::ResultsAccepted => 3,
            AgreementState::ResultsChallenged => 4,
            AgreementState::Mediating => 5,
            AgreementState::MediationAccepted => 6,
            AgreementState::MediationRejected => 7,
            AgreementState::TimeoutAgree => 8,
            AgreementState::TimeoutSubmitResults => 9,
            AgreementState::TimeoutJudgeResults => 10,
            AgreementState::TimeoutMediateResult => 11,
        }
    }

    /// Reverse of `state_id`.
    pub fn from_state_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => AgreementState::DealNegotiating,
            1 => AgreementState::DealAgreed,
            2 => AgreementState::ResultsSubmitted,
            3 => AgreementState::ResultsAccepted,
            4 => AgreementState::ResultsChallenged,
            5 => AgreementState::Mediating,
            6 => AgreementState::MediationAccepted,
            7 => AgreementState::MediationRejected,
            8 => AgreementState::TimeoutAgree,
            9 => AgreementState::TimeoutSubmitResults,
            10 => AgreementState::TimeoutJudgeResults,
            11 => AgreementState::TimeoutMediateResult,
            _ => return None,
        })
    }

    /// Parse a state name as used in list-query filters.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "DealNegotiating" => AgreementState::DealNegotiating,
            "DealAgreed" => AgreementState::DealAgreed,
            "ResultsSubmitted" => AgreementState::ResultsSubmitted,
            "ResultsAccepted" => AgreementState::ResultsAccepted,
            "ResultsChallenged" => AgreementState::ResultsChallenged,
            "Mediating" => AgreementState::Mediating,
            "MediationAccepted" => AgreementState::MediationAccepted,
            "MediationRejected" => AgreementState::MediationRejected,
            "TimeoutAgree" => AgreementState::TimeoutAgree,
            "TimeoutSubmitResults" => AgreementState::TimeoutSubmitResults,
            "TimeoutJudgeResults" => AgreementState::TimeoutJudgeResults,
            "TimeoutMediateResult" => AgreementState::TimeoutMediateResult,
            _ => return None,
        })
    }

    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgreementState::ResultsAccepted
                | AgreementState::MediationAccepted
                | AgreementState::MediationRejected
                | AgreementState::TimeoutAgree
                | AgreementState::TimeoutSubmitResults
                | AgreementState::TimeoutJudgeResults
                | AgreementState::TimeoutMediateResult
        )
    }

    /// Check if the deal ended with the job paid for.
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            AgreementState::ResultsAccepted | AgreementState::MediationAccepted
        )
    }

    /// Check if the state still ties up the resource offer.
    ///
    /// Any non-terminal state and both success terminals count as active;
    /// only failure terminals release the offer.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() || self.is_successful()
    }

    /// Check whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: AgreementState) -> bool {
        use AgreementState::*;
        matches!(
            (self, next),
            (DealNegotiating, DealAgreed)
                | (DealNegotiating, TimeoutAgree)
                | (DealAgreed, ResultsSubmitted)
                | (DealAgreed, TimeoutSubmitResults)
                | (ResultsSubmitted, ResultsAccepted)
                | (ResultsSubmitted, ResultsChallenged)
                | (ResultsSubmitted, TimeoutJudgeResults)
                | (ResultsChallenged, Mediating)
                | (Mediating, MediationAccepted)
                | (Mediating, MediationRejected)
                | (Mediating, TimeoutMediateResult)
        )
    }
}

impl fmt::Display for AgreementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgreementState::DealNegotiating => "DealNegotiating",
            AgreementState::DealAgreed => "DealAgreed",
            AgreementState::ResultsSubmitted => "ResultsSubmitted",
            AgreementState::ResultsAccepted => "ResultsAccepted",
            AgreementState::ResultsChallenged => "ResultsChallenged",
            AgreementState::Mediating => "Mediating",
            AgreementState::MediationAccepted => "MediationAccepted",
            AgreementState::MediationRejected => "MediationRejected",
            AgreementState::TimeoutAgree => "TimeoutAgree",
            AgreementState::TimeoutSubmitResults => "TimeoutSubmitResults",
            AgreementState::TimeoutJudgeResults => "TimeoutJudgeResults",
            AgreementState::TimeoutMediateResult => "TimeoutMediateResult",
        };
        write!(f, "{}", name)
    }
}

// States persist and cross the chain boundary as their frozen numeric id.
impl Serialize for AgreementState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.state_id())
    }
}

impl<'de> Deserialize<'de> for AgreementState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = u8::deserialize(deserializer)?;
        AgreementState::from_state_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown agreement state id {}", id)))
    }
}
