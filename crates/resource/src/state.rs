//! Participant protocol state machine

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vote returned by `prepare`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    /// Durable intent recorded, waiting for the outcome
    Prepared,
    /// No durable work, drop from further protocol steps
    ReadOnly,
    /// The whole transaction must roll back
    Abort,
}

/// How a participant completed on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeuristicOutcome {
    Commit,
    Rollback,
    /// Some work committed and some rolled back
    Mixed,
    /// Outcome of the work is unknown
    Hazard,
}

impl fmt::Display for HeuristicOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeuristicOutcome::Commit => write!(f, "heuristic commit"),
            HeuristicOutcome::Rollback => write!(f, "heuristic rollback"),
            HeuristicOutcome::Mixed => write!(f, "heuristic mixed"),
            HeuristicOutcome::Hazard => write!(f, "heuristic hazard"),
        }
    }
}

/// Direction of a unilateral completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeuristicDecision {
    Commit,
    Rollback,
}

/// State of one participant's involvement in one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantState {
    Active,
    Preparing,
    Prepared,
    ReadOnly,
    Aborted,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    Forgotten,
}

/// Protocol event moving a participant between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BeginPrepare,
    VotePrepared,
    VoteReadOnly,
    VoteAbort,
    BeginCommit,
    BeginOnePhase,
    /// One-phase commit refused, work left untouched
    OnePhaseFailed,
    FinishCommit,
    BeginRollback,
    FinishRollback,
    Forget,
}

impl Transition {
    /// Operation the transition belongs to, for error reports
    pub fn operation(&self) -> &'static str {
        match self {
            Transition::BeginPrepare
            | Transition::VotePrepared
            | Transition::VoteReadOnly
            | Transition::VoteAbort => "prepare",
            Transition::BeginCommit | Transition::FinishCommit => "commit",
            Transition::BeginOnePhase | Transition::OnePhaseFailed => "commit_one_phase",
            Transition::BeginRollback | Transition::FinishRollback => "rollback",
            Transition::Forget => "forget",
        }
    }
}

impl ParticipantState {
    /// Next state after `transition`, or a protocol violation
    pub fn apply(self, transition: Transition) -> Result<ParticipantState, ResourceError> {
        use ParticipantState::*;
        use Transition::*;

        let next = match (self, transition) {
            (Active, BeginPrepare) => Preparing,
            (Preparing, VotePrepared) => Prepared,
            (Preparing, VoteReadOnly) => ReadOnly,
            (Preparing, VoteAbort) => Aborted,

            (Prepared, BeginCommit) => Committing,
            (Active, BeginOnePhase) => Committing,
            (Committing, OnePhaseFailed) => Active,
            (Committing, FinishCommit) => Committed,

            (Active | Prepared | Aborted, BeginRollback) => RollingBack,
            (RollingBack, FinishRollback) => RolledBack,

            (Committed | RolledBack | ReadOnly | Aborted, Forget) => Forgotten,

            _ => {
                return Err(ResourceError::ProtocolViolation {
                    state: self,
                    operation: transition.operation().to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Whether the outcome of the branch is settled
    ///
    /// Only `forget` is still accepted from these states.
    pub fn is_complete(&self) -> bool {
        use ParticipantState::*;
        matches!(self, Committed | RolledBack | ReadOnly | Aborted | Forgotten)
    }

    /// Whether the participant waits for the coordinator's decision
    pub fn is_in_doubt(&self) -> bool {
        matches!(self, ParticipantState::Prepared)
    }
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParticipantState::Active => "ACTIVE",
            ParticipantState::Preparing => "PREPARING",
            ParticipantState::Prepared => "PREPARED",
            ParticipantState::ReadOnly => "READ_ONLY",
            ParticipantState::Aborted => "ABORTED",
            ParticipantState::Committing => "COMMITTING",
            ParticipantState::Committed => "COMMITTED",
            ParticipantState::RollingBack => "ROLLING_BACK",
            ParticipantState::RolledBack => "ROLLED_BACK",
            ParticipantState::Forgotten => "FORGOTTEN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ParticipantState::*;
    use super::Transition::*;
    use super::*;

    const ALL_STATES: [ParticipantState; 10] = [
        Active,
        Preparing,
        Prepared,
        ReadOnly,
        Aborted,
        Committing,
        Committed,
        RollingBack,
        RolledBack,
        Forgotten,
    ];

    #[test]
    fn test_two_phase_path() {
        let state = Active
            .apply(BeginPrepare)
            .and_then(|s| s.apply(VotePrepared))
            .and_then(|s| s.apply(BeginCommit))
            .and_then(|s| s.apply(FinishCommit))
            .and_then(|s| s.apply(Forget))
            .unwrap();

        assert_eq!(state, Forgotten);
    }

    #[test]
    fn test_commit_requires_prepare() {
        for state in ALL_STATES {
            let result = state.apply(BeginCommit);
            if state == Prepared {
                assert_eq!(result, Ok(Committing));
            } else {
                assert!(
                    matches!(result, Err(ResourceError::ProtocolViolation { .. })),
                    "commit allowed from {}",
                    state
                );
            }
        }
    }

    #[test]
    fn test_rollback_sources() {
        for state in ALL_STATES {
            let allowed = matches!(state, Active | Prepared | Aborted);
            assert_eq!(state.apply(BeginRollback).is_ok(), allowed, "{}", state);
        }
    }

    #[test]
    fn test_forget_sources() {
        for state in ALL_STATES {
            let allowed = matches!(state, Committed | RolledBack | ReadOnly | Aborted);
            assert_eq!(state.apply(Forget).is_ok(), allowed, "{}", state);
        }
    }

    #[test]
    fn test_complete_states_only_forget() {
        for state in ALL_STATES.into_iter().filter(ParticipantState::is_complete) {
            for transition in [BeginPrepare, BeginCommit, BeginOnePhase, FinishCommit] {
                let result = state.apply(transition);
                assert!(result.is_err(), "{} after {}", transition.operation(), state);
            }
        }
        assert!(!Prepared.is_complete());
        assert!(!Committing.is_complete());
    }

    #[test]
    fn test_read_only_only_forgets() {
        for transition in [BeginPrepare, BeginCommit, BeginOnePhase, BeginRollback] {
            assert!(ReadOnly.apply(transition).is_err());
        }
        assert_eq!(ReadOnly.apply(Forget), Ok(Forgotten));
    }

    #[test]
    fn test_one_phase_failure_restores_active() {
        let state = Active.apply(BeginOnePhase).unwrap();
        assert_eq!(state.apply(OnePhaseFailed), Ok(Active));
    }

    #[test]
    fn test_violation_names_operation() {
        let err = Forgotten.apply(BeginRollback).unwrap_err();
        assert_eq!(
            err,
            ResourceError::ProtocolViolation {
                state: Forgotten,
                operation: "rollback".to_string()
            }
        );
        assert_eq!(err.to_string(), "rollback not permitted in state FORGOTTEN");
    }
}
