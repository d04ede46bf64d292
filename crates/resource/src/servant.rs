//! Server side of a participant
//!
//! A `ResourceServant` owns the protocol state of one transaction branch and
//! drives its resource manager. It is exported through an object adapter and
//! also called directly by co-located participants.

use crate::error::{ResourceError, Result};
use crate::helper;
use crate::manager::ResourceManager;
use crate::participant::{COMMIT, COMMIT_ONE_PHASE, FORGET, PREPARE, ROLLBACK};
use crate::state::{HeuristicDecision, HeuristicOutcome, ParticipantState, Transition, Vote};
use async_trait::async_trait;
use parking_lot::Mutex;
use proven_orb::{OrbError, Reply, Servant};
use proven_protocol::{RepositoryId, Xid};
use serde::Serialize;
use std::time::{Duration, Instant};

struct Branch {
    state: ParticipantState,
    /// Recorded answer to `prepare`, returned again on redelivery
    vote: Option<Vote>,
    /// Reported on every operation until `forget`
    heuristic: Option<HeuristicOutcome>,
    prepared_at: Option<Instant>,
    manager: Box<dyn ResourceManager>,
}

impl Branch {
    fn step(&mut self, transition: Transition) -> Result<()> {
        self.state = self.state.apply(transition)?;
        Ok(())
    }

    fn check_heuristic(&self) -> Result<()> {
        match self.heuristic {
            Some(outcome) => Err(ResourceError::Heuristic(outcome)),
            None => Ok(()),
        }
    }
}

pub struct ResourceServant {
    xid: Xid,
    branch: Mutex<Branch>,
}

impl ResourceServant {
    pub fn new(xid: Xid, manager: Box<dyn ResourceManager>) -> Self {
        Self {
            xid,
            branch: Mutex::new(Branch {
                state: ParticipantState::Active,
                vote: None,
                heuristic: None,
                prepared_at: None,
                manager,
            }),
        }
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    pub fn state(&self) -> ParticipantState {
        self.branch.lock().state
    }

    /// Unforgotten heuristic outcome, if any
    pub fn heuristic(&self) -> Option<HeuristicOutcome> {
        self.branch.lock().heuristic
    }

    /// How long the branch has been waiting for a decision
    pub fn in_doubt_for(&self) -> Option<Duration> {
        let branch = self.branch.lock();
        if !branch.state.is_in_doubt() {
            return None;
        }
        branch.prepared_at.map(|at| at.elapsed())
    }

    pub fn prepare(&self) -> Result<Vote> {
        let mut branch = self.branch.lock();
        branch.check_heuristic()?;

        if let Some(vote) = branch.vote
            && matches!(
                branch.state,
                ParticipantState::Prepared | ParticipantState::ReadOnly | ParticipantState::Aborted
            )
        {
            tracing::debug!("Branch {} already voted {:?}", self.xid, vote);
            return Ok(vote);
        }

        branch.step(Transition::BeginPrepare)?;

        let vote = branch.manager.prepare(&self.xid).unwrap_or_else(|e| {
            tracing::warn!("Branch {} failed to prepare: {}", self.xid, e);
            Vote::Abort
        });

        match vote {
            Vote::Prepared => {
                branch.step(Transition::VotePrepared)?;
                branch.prepared_at = Some(Instant::now());
            }
            Vote::ReadOnly => branch.step(Transition::VoteReadOnly)?,
            Vote::Abort => {
                if let Err(e) = branch.manager.rollback(&self.xid) {
                    tracing::warn!("Branch {} failed to discard aborted work: {}", self.xid, e);
                }
                branch.step(Transition::VoteAbort)?;
            }
        }

        branch.vote = Some(vote);
        tracing::debug!(
            "Branch {} ({}) voted {:?}",
            self.xid,
            branch.manager.name(),
            vote
        );
        Ok(vote)
    }

    pub fn commit(&self) -> Result<()> {
        let mut branch = self.branch.lock();
        branch.check_heuristic()?;

        if branch.state == ParticipantState::Committed {
            return Ok(());
        }

        branch.step(Transition::BeginCommit)?;
        let result = branch.manager.commit(&self.xid, false);
        branch.step(Transition::FinishCommit)?;

        if let Err(e) = result {
            tracing::error!("Branch {} failed to commit after prepare: {}", self.xid, e);
            branch.heuristic = Some(HeuristicOutcome::Hazard);
            return Err(ResourceError::Heuristic(HeuristicOutcome::Hazard));
        }

        tracing::debug!("Branch {} committed", self.xid);
        Ok(())
    }

    pub fn commit_one_phase(&self) -> Result<()> {
        let mut branch = self.branch.lock();
        branch.check_heuristic()?;

        branch.step(Transition::BeginOnePhase)?;
        match branch.manager.commit(&self.xid, true) {
            Ok(()) => {
                branch.step(Transition::FinishCommit)?;
                tracing::debug!("Branch {} committed in one phase", self.xid);
                Ok(())
            }
            Err(e) => {
                branch.step(Transition::OnePhaseFailed)?;
                tracing::warn!("Branch {} refused one-phase commit: {}", self.xid, e);
                Err(ResourceError::OnePhaseFailed(e))
            }
        }
    }

    pub fn rollback(&self) -> Result<()> {
        let mut branch = self.branch.lock();
        branch.check_heuristic()?;

        if branch.state == ParticipantState::RolledBack {
            return Ok(());
        }

        let from = branch.state;
        branch.step(Transition::BeginRollback)?;

        // Aborted work was discarded when the vote was cast
        let result = if from == ParticipantState::Aborted {
            Ok(())
        } else {
            branch.manager.rollback(&self.xid)
        };
        branch.step(Transition::FinishRollback)?;

        if let Err(e) = result {
            if from == ParticipantState::Prepared {
                tracing::error!("Branch {} failed to roll back after prepare: {}", self.xid, e);
                branch.heuristic = Some(HeuristicOutcome::Hazard);
                return Err(ResourceError::Heuristic(HeuristicOutcome::Hazard));
            }
            tracing::warn!("Branch {} failed to discard unprepared work: {}", self.xid, e);
        }

        tracing::debug!("Branch {} rolled back", self.xid);
        Ok(())
    }

    pub fn forget(&self) -> Result<()> {
        let mut branch = self.branch.lock();

        if branch.state == ParticipantState::Forgotten {
            return Ok(());
        }

        branch.step(Transition::Forget)?;
        branch.manager.forget(&self.xid);

        if let Some(outcome) = branch.heuristic.take() {
            tracing::info!("Branch {} forgot {}", self.xid, outcome);
        }
        Ok(())
    }

    /// Complete a prepared branch without waiting for the coordinator
    ///
    /// The outcome is reported on every later operation until `forget`.
    pub fn heuristic_complete(&self, decision: HeuristicDecision) -> Result<HeuristicOutcome> {
        let mut branch = self.branch.lock();

        if branch.state != ParticipantState::Prepared {
            return Err(ResourceError::ProtocolViolation {
                state: branch.state,
                operation: "heuristic_complete".to_string(),
            });
        }

        let (outcome, result) = match decision {
            HeuristicDecision::Commit => {
                branch.step(Transition::BeginCommit)?;
                let result = branch.manager.commit(&self.xid, false);
                branch.step(Transition::FinishCommit)?;
                (HeuristicOutcome::Commit, result)
            }
            HeuristicDecision::Rollback => {
                branch.step(Transition::BeginRollback)?;
                let result = branch.manager.rollback(&self.xid);
                branch.step(Transition::FinishRollback)?;
                (HeuristicOutcome::Rollback, result)
            }
        };

        let outcome = match result {
            Ok(()) => outcome,
            Err(e) => {
                tracing::error!("Branch {} failed heuristic completion: {}", self.xid, e);
                HeuristicOutcome::Hazard
            }
        };

        tracing::warn!("Branch {} completed with {}", self.xid, outcome);
        branch.heuristic = Some(outcome);
        Ok(outcome)
    }
}

fn to_body<T: Serialize>(value: &T) -> proven_orb::Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| OrbError::Marshal(e.to_string()))
}

#[async_trait]
impl Servant for ResourceServant {
    fn repository_ids(&self) -> Vec<RepositoryId> {
        vec![helper::id().clone()]
    }

    async fn dispatch(&self, operation: &str, _body: &[u8]) -> proven_orb::Result<Reply> {
        let result = match operation {
            PREPARE => self.prepare().map(|vote| to_body(&vote)),
            COMMIT => self.commit().map(|()| to_body(&())),
            ROLLBACK => self.rollback().map(|()| to_body(&())),
            COMMIT_ONE_PHASE => self.commit_one_phase().map(|()| to_body(&())),
            FORGET => self.forget().map(|()| to_body(&())),
            other => {
                return Err(OrbError::System(format!(
                    "OTSResource has no operation {}",
                    other
                )));
            }
        };

        match result {
            Ok(body) => Ok(Reply::Ok(body?)),
            Err(e) => Ok(Reply::UserException(to_body(&e)?)),
        }
    }
}
