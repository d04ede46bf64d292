//! Two-phase-commit coordinator

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::transaction::{Completion, Enlisted, Outcome, Transaction, TransactionStatus};
use futures::future::join_all;
use parking_lot::Mutex;
use proven_engine::MockClient;
use proven_orb::{BrokerTransport, Transport};
use proven_protocol::{Envelope, Xid};
use proven_resource::{HeuristicOutcome, Participant, ResourceError, Vote, helper};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Which second-phase operation to fan out
#[derive(Debug, Clone, Copy)]
enum Phase {
    Commit,
    Rollback,
}

/// Distributed transaction coordinator
///
/// Participants arrive as envelopes or already narrowed. Every call to a
/// participant is bounded by `CoordinatorConfig::call_timeout`, and calls of
/// one phase are issued together and awaited together.
pub struct Coordinator {
    config: CoordinatorConfig,

    /// Transport references extracted from envelopes are bound to
    transport: Arc<dyn Transport>,

    transactions: Mutex<HashMap<Xid, Transaction>>,
}

impl Coordinator {
    /// Coordinator reaching participants over the broker
    pub fn new(client: MockClient, config: CoordinatorConfig) -> Self {
        let transport = Arc::new(BrokerTransport::new(client).with_timeout(config.call_timeout));
        Self::with_transport(transport, config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: CoordinatorConfig) -> Self {
        Self {
            config,
            transport,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new distributed transaction
    pub fn begin(&self) -> Xid {
        let xid = Xid::new();
        self.transactions.lock().insert(xid, Transaction::new());
        tracing::debug!("Began transaction {}", xid);
        xid
    }

    pub fn status(&self, xid: &Xid) -> Option<TransactionStatus> {
        self.transactions.lock().get(xid).map(|t| t.status)
    }

    /// Participants still held for `xid`
    ///
    /// After completion only participants awaiting recovery are kept.
    pub fn participant_count(&self, xid: &Xid) -> Option<usize> {
        self.transactions.lock().get(xid).map(|t| t.participants.len())
    }

    /// Drop finished transactions that hold no participant awaiting recovery
    pub fn prune(&self) -> usize {
        let mut transactions = self.transactions.lock();
        let before = transactions.len();
        transactions.retain(|_, t| !(t.status.is_finished() && t.participants.is_empty()));

        let pruned = before - transactions.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} finished transactions", pruned);
        }
        pruned
    }

    /// Register the participant carried by an envelope
    ///
    /// The reference is always decoded and narrowed again. An envelope
    /// holding no participant registers nothing.
    pub async fn register_resource(&self, xid: &Xid, envelope: &Envelope) -> Result<()> {
        self.ensure_active(xid)?;

        match helper::extract(envelope, self.transport.clone()).await? {
            Some(participant) => self.register_participant(xid, participant),
            None => {
                tracing::debug!("Envelope for {} holds no participant", xid);
                Ok(())
            }
        }
    }

    /// Register an already narrowed participant
    ///
    /// Registering the same remote object twice is a no-op.
    pub fn register_participant(&self, xid: &Xid, participant: Participant) -> Result<()> {
        let enlisted = Enlisted::new(participant);

        let mut transactions = self.transactions.lock();
        let txn = Self::active_mut(&mut transactions, xid)?;

        if txn.participants.iter().any(|e| e.ior.same_object(&enlisted.ior)) {
            tracing::debug!("{} already registered with {}", enlisted.ior, xid);
            return Ok(());
        }

        tracing::debug!("Registered {} with {}", enlisted.ior, xid);
        txn.participants.push(enlisted);
        Ok(())
    }

    /// Commit the transaction
    ///
    /// A sole participant is committed in one phase. Otherwise every
    /// participant is prepared; read-only voters drop out, and any abort
    /// vote, protocol violation or unreachable participant rolls the
    /// prepared ones back.
    pub async fn commit(&self, xid: &Xid) -> Result<Outcome> {
        let participants = self.transition(xid, TransactionStatus::Preparing)?;

        let outcome = match participants.as_slice() {
            [] => Outcome::new(Completion::Committed),
            [sole] if self.config.one_phase_optimization => {
                self.commit_one_phase(xid, sole).await
            }
            _ => self.commit_two_phase(xid, &participants).await,
        };

        self.finish(xid, &outcome);
        Ok(outcome)
    }

    /// Roll back an active transaction
    pub async fn rollback(&self, xid: &Xid) -> Result<Outcome> {
        let participants = self.transition(xid, TransactionStatus::RollingBack)?;

        let mut outcome = Outcome::new(Completion::RolledBack);
        self.complete(Phase::Rollback, &participants, &mut outcome).await;

        self.finish(xid, &outcome);
        Ok(outcome)
    }

    async fn commit_one_phase(&self, xid: &Xid, sole: &Enlisted) -> Outcome {
        self.set_status(xid, TransactionStatus::Committing);

        match self.call(sole.participant.commit_one_phase()).await {
            Ok(()) => Outcome::new(Completion::Committed),
            Err(ResourceError::OnePhaseFailed(reason)) => {
                tracing::info!("One-phase commit of {} refused: {}", xid, reason);
                let mut outcome = Outcome::new(Completion::RolledBack);
                self.complete(Phase::Rollback, std::slice::from_ref(sole), &mut outcome)
                    .await;
                outcome
            }
            Err(ResourceError::Heuristic(heuristic)) => {
                let completion = match heuristic {
                    HeuristicOutcome::Commit => Completion::Committed,
                    HeuristicOutcome::Rollback => Completion::RolledBack,
                    HeuristicOutcome::Mixed | HeuristicOutcome::Hazard => Completion::InDoubt,
                };
                let mut outcome = Outcome::new(completion);
                self.report_heuristic(sole, heuristic, &mut outcome).await;
                outcome
            }
            Err(e) if e.is_unreachable() => {
                tracing::warn!("Sole participant of {} unreachable: {}", xid, e);
                let mut outcome = Outcome::new(Completion::InDoubt);
                outcome.unreachable.push(sole.name());
                outcome
            }
            Err(e) => {
                tracing::warn!("One-phase commit of {} failed: {}", xid, e);
                let mut outcome = Outcome::new(Completion::RolledBack);
                self.complete(Phase::Rollback, std::slice::from_ref(sole), &mut outcome)
                    .await;
                outcome
            }
        }
    }

    async fn commit_two_phase(&self, xid: &Xid, participants: &[Enlisted]) -> Outcome {
        let votes = join_all(
            participants
                .iter()
                .map(|e| self.call(e.participant.prepare())),
        )
        .await;

        let mut prepared = Vec::new();
        let mut abort = false;
        let mut outcome = Outcome::new(Completion::RolledBack);

        for (enlisted, vote) in participants.iter().zip(votes) {
            match vote {
                Ok(Vote::Prepared) => prepared.push(enlisted.clone()),
                Ok(Vote::ReadOnly) => {
                    tracing::debug!("{} is read-only in {}", enlisted.ior, xid);
                }
                Ok(Vote::Abort) => {
                    tracing::info!("{} voted to abort {}", enlisted.ior, xid);
                    abort = true;
                }
                Err(ResourceError::Heuristic(heuristic)) => {
                    self.report_heuristic(enlisted, heuristic, &mut outcome).await;
                    abort = true;
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!(
                        "{} unreachable during prepare of {}: {}",
                        enlisted.ior,
                        xid,
                        e
                    );
                    outcome.unreachable.push(enlisted.name());
                    abort = true;
                }
                Err(e) => {
                    tracing::warn!("{} failed to prepare {}: {}", enlisted.ior, xid, e);
                    abort = true;
                }
            }
        }

        if abort {
            self.set_status(xid, TransactionStatus::RollingBack);
            self.complete(Phase::Rollback, &prepared, &mut outcome).await;
            return outcome;
        }

        self.set_status(xid, TransactionStatus::Prepared);
        self.set_status(xid, TransactionStatus::Committing);

        outcome.completion = Completion::Committed;
        self.complete(Phase::Commit, &prepared, &mut outcome).await;
        outcome
    }

    /// Fan out the decision and record what comes back
    async fn complete(&self, phase: Phase, participants: &[Enlisted], outcome: &mut Outcome) {
        let results = join_all(participants.iter().map(|e| match phase {
            Phase::Commit => self.call(e.participant.commit()),
            Phase::Rollback => self.call(e.participant.rollback()),
        }))
        .await;

        for (enlisted, result) in participants.iter().zip(results) {
            match result {
                Ok(()) => {}
                Err(ResourceError::Heuristic(heuristic)) => {
                    self.report_heuristic(enlisted, heuristic, outcome).await;
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!("{} unreachable during {:?}: {}", enlisted.ior, phase, e);
                    outcome.unreachable.push(enlisted.name());
                }
                Err(e) => {
                    tracing::error!("{} failed {:?}: {}", enlisted.ior, phase, e);
                    outcome
                        .heuristics
                        .push((enlisted.name(), HeuristicOutcome::Hazard));
                }
            }
        }
    }

    /// Record a heuristic report and let the participant forget it
    async fn report_heuristic(
        &self,
        enlisted: &Enlisted,
        heuristic: HeuristicOutcome,
        outcome: &mut Outcome,
    ) {
        tracing::warn!("{} reported {}", enlisted.ior, heuristic);
        outcome.heuristics.push((enlisted.name(), heuristic));

        if let Err(e) = self.call(enlisted.participant.forget()).await {
            tracing::warn!("{} did not forget {}: {}", enlisted.ior, heuristic, e);
            if e.is_unreachable() {
                outcome.unreachable.push(enlisted.name());
            }
        }
    }

    async fn call<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, ResourceError>>,
    ) -> std::result::Result<T, ResourceError> {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ResourceError::RemoteUnreachable(format!(
                "No answer within {:?}",
                self.config.call_timeout
            ))),
        }
    }

    fn active_mut<'a>(
        transactions: &'a mut HashMap<Xid, Transaction>,
        xid: &Xid,
    ) -> Result<&'a mut Transaction> {
        let txn = transactions
            .get_mut(xid)
            .ok_or_else(|| CoordinatorError::TransactionNotFound(xid.to_string()))?;

        if txn.status != TransactionStatus::Active {
            return Err(CoordinatorError::InvalidState(format!(
                "Transaction {} is {:?}",
                xid, txn.status
            )));
        }
        Ok(txn)
    }

    fn ensure_active(&self, xid: &Xid) -> Result<()> {
        let mut transactions = self.transactions.lock();
        Self::active_mut(&mut transactions, xid).map(|_| ())
    }

    /// Leave `Active` and hand out the participants to drive
    fn transition(&self, xid: &Xid, status: TransactionStatus) -> Result<Vec<Enlisted>> {
        let mut transactions = self.transactions.lock();
        let txn = Self::active_mut(&mut transactions, xid)?;
        txn.status = status;
        Ok(txn.participants.clone())
    }

    fn set_status(&self, xid: &Xid, status: TransactionStatus) {
        if let Some(txn) = self.transactions.lock().get_mut(xid) {
            txn.status = status;
        }
    }

    /// Record the final status and release participants that need no recovery
    fn finish(&self, xid: &Xid, outcome: &Outcome) {
        let status = match outcome.completion {
            Completion::Committed => TransactionStatus::Committed,
            Completion::RolledBack => TransactionStatus::RolledBack,
            Completion::InDoubt => TransactionStatus::InDoubt,
        };

        if let Some(txn) = self.transactions.lock().get_mut(xid) {
            txn.status = status;
            txn.participants.retain(|e| outcome.unreachable.contains(&e.name()));
        }

        if outcome.is_clean() {
            tracing::debug!("Transaction {} {:?}", xid, outcome.completion);
        } else {
            tracing::warn!(
                "Transaction {} {:?} with {} heuristic reports, {} unreachable",
                xid,
                outcome.completion,
                outcome.heuristics.len(),
                outcome.unreachable.len()
            );
        }
    }
}
