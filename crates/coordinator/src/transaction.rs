//! Transaction records and completion outcomes

use proven_protocol::Ior;
use proven_resource::{HeuristicOutcome, Participant};

/// Transaction state in the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting participants
    Active,
    /// Prepare phase has started
    Preparing,
    /// Every remaining participant voted prepared
    Prepared,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    /// Sole participant unreachable during one-phase commit
    InDoubt,
}

impl TransactionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed
                | TransactionStatus::RolledBack
                | TransactionStatus::InDoubt
        )
    }
}

/// How the transaction completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Committed,
    RolledBack,
    /// Outcome unknown until recovery reaches the participant
    InDoubt,
}

/// Result of `commit` or `rollback`
///
/// The decision is reported separately from the participants that completed
/// heuristically and from those that could not be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub completion: Completion,
    /// Participants that completed on their own, by reference
    pub heuristics: Vec<(String, HeuristicOutcome)>,
    /// Participants that need recovery, by reference
    pub unreachable: Vec<String>,
}

impl Outcome {
    pub(crate) fn new(completion: Completion) -> Self {
        Self {
            completion,
            heuristics: Vec::new(),
            unreachable: Vec::new(),
        }
    }

    /// Completed with no heuristic and every participant reached
    pub fn is_clean(&self) -> bool {
        self.heuristics.is_empty() && self.unreachable.is_empty()
    }
}

/// A participant registered with a transaction
#[derive(Clone)]
pub(crate) struct Enlisted {
    pub ior: Ior,
    pub participant: Participant,
}

impl Enlisted {
    pub fn new(participant: Participant) -> Self {
        let ior = participant.clone().this().ior().clone();
        Self { ior, participant }
    }

    pub fn name(&self) -> String {
        self.ior.to_string()
    }
}

pub(crate) struct Transaction {
    pub status: TransactionStatus,
    pub participants: Vec<Enlisted>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            status: TransactionStatus::Active,
            participants: Vec::new(),
        }
    }
}
