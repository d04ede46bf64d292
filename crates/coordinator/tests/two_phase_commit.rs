//! Coordinator driving remote participants through two-phase commit

use async_trait::async_trait;
use proven_config::ServiceConfiguration;
use proven_coordinator::{
    Completion, Coordinator, CoordinatorConfig, CoordinatorError, TransactionStatus,
};
use proven_engine::{MockClient, MockEngine};
use proven_orb::{BrokerTransport, Delegate, ObjectAdapter, ObjectRef, Reply, Servant};
use proven_protocol::{Envelope, Ior, ObjectKey, RepositoryId, Xid};
use proven_resource::{
    Fault, HeuristicOutcome, MemoryResource, MemoryStore, OtsResource, Participant,
    ParticipantState, ResourceError, ResourceService, Vote, helper,
};
use std::sync::Arc;
use std::time::Duration;

struct Cluster {
    engine: Arc<MockEngine>,
    coordinator: Coordinator,
    store: MemoryStore,
}

impl Cluster {
    fn new() -> Self {
        Self::with_config(CoordinatorConfig::for_testing())
    }

    fn with_config(config: CoordinatorConfig) -> Self {
        let engine = Arc::new(MockEngine::new());
        let client = MockClient::new("coordinator".to_string(), engine.clone());
        Self {
            coordinator: Coordinator::new(client, config),
            engine,
            store: MemoryStore::new(),
        }
    }

    fn node(&self, id: &str) -> ResourceService {
        let client = MockClient::new(id.to_string(), self.engine.clone());
        ResourceService::start(client, &ServiceConfiguration::for_testing()).unwrap()
    }

    fn writer(&self, key: &str) -> MemoryResource {
        MemoryResource::new(key, self.store.clone()).with_write(key, "committed")
    }

    /// Export a branch on `node` and register it the way a remote caller would
    async fn enlist(
        &self,
        xid: &Xid,
        node: &ResourceService,
        bqual: u32,
        resource: MemoryResource,
    ) -> Xid {
        let branch = xid.branch(bqual);
        let object = node.export(branch, Box::new(resource)).unwrap();
        let envelope = helper::encode_any(Some(&object)).unwrap();

        self.coordinator
            .register_resource(xid, &envelope)
            .await
            .unwrap();
        branch
    }
}

fn state(node: &ResourceService, branch: &Xid) -> ParticipantState {
    node.servant(branch).unwrap().state()
}

#[tokio::test]
async fn test_two_participants_commit() {
    let cluster = Cluster::new();
    let node1 = cluster.node("node-1");
    let node2 = cluster.node("node-2");

    let xid = cluster.coordinator.begin();
    let b1 = cluster.enlist(&xid, &node1, 1, cluster.writer("a")).await;
    let b2 = cluster.enlist(&xid, &node2, 2, cluster.writer("b")).await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::Committed);
    assert!(outcome.is_clean());
    assert_eq!(
        cluster.coordinator.status(&xid),
        Some(TransactionStatus::Committed)
    );
    assert_eq!(state(&node1, &b1), ParticipantState::Committed);
    assert_eq!(state(&node2, &b2), ParticipantState::Committed);
    assert_eq!(cluster.store.get("a").as_deref(), Some("committed"));
    assert_eq!(cluster.store.get("b").as_deref(), Some("committed"));
}

#[tokio::test]
async fn test_read_only_voter_dropped() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let reader = cluster
        .enlist(&xid, &node, 1, MemoryResource::new("reader", cluster.store.clone()))
        .await;
    let writer = cluster.enlist(&xid, &node, 2, cluster.writer("a")).await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::Committed);
    assert_eq!(state(&node, &reader), ParticipantState::ReadOnly);
    assert_eq!(state(&node, &writer), ParticipantState::Committed);
}

#[tokio::test]
async fn test_abort_vote_rolls_back_prepared() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let good = cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;
    let bad = cluster
        .enlist(&xid, &node, 2, cluster.writer("b").with_fault(Fault::VoteAbort))
        .await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::RolledBack);
    assert!(outcome.is_clean());
    assert_eq!(state(&node, &good), ParticipantState::RolledBack);
    assert_eq!(state(&node, &bad), ParticipantState::Aborted);

    // Both outcomes are settled, nothing left to recover
    assert_eq!(node.prune(), 2);
    assert_eq!(node.branch_count(), 0);
    assert_eq!(cluster.store.committed_len(), 0);
}

#[tokio::test]
async fn test_sole_participant_one_phase() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let branch = cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::Committed);
    assert_eq!(state(&node, &branch), ParticipantState::Committed);
    assert_eq!(cluster.store.prepare_calls(&branch), 0);
    assert_eq!(cluster.store.get("a").as_deref(), Some("committed"));
}

#[tokio::test]
async fn test_refused_one_phase_rolls_back() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let branch = cluster
        .enlist(&xid, &node, 1, cluster.writer("a").with_fault(Fault::FailOnePhase))
        .await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::RolledBack);
    assert_eq!(state(&node, &branch), ParticipantState::RolledBack);
    assert_eq!(cluster.store.committed_len(), 0);
}

#[tokio::test]
async fn test_one_phase_disabled_uses_prepare() {
    let cluster =
        Cluster::with_config(CoordinatorConfig::for_testing().with_one_phase_optimization(false));
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let branch = cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;

    cluster.coordinator.commit(&xid).await.unwrap();
    assert_eq!(cluster.store.prepare_calls(&branch), 1);
    assert_eq!(state(&node, &branch), ParticipantState::Committed);
}

#[tokio::test]
async fn test_unreachable_is_not_abort_vote() {
    let cluster = Cluster::new();
    let node1 = cluster.node("node-1");
    let node2 = cluster.node("node-2");

    let xid = cluster.coordinator.begin();
    let reachable = cluster.enlist(&xid, &node1, 1, cluster.writer("a")).await;
    cluster.enlist(&xid, &node2, 2, cluster.writer("b")).await;
    node2.shutdown();

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::RolledBack);
    assert_eq!(outcome.unreachable.len(), 1);
    assert!(outcome.unreachable[0].contains("ots.node-2"));
    assert!(outcome.heuristics.is_empty());
    assert_eq!(state(&node1, &reachable), ParticipantState::RolledBack);

    // The unreachable participant is kept for recovery
    assert_eq!(cluster.coordinator.participant_count(&xid), Some(1));
    assert_eq!(cluster.coordinator.prune(), 0);
    assert_eq!(
        cluster.coordinator.status(&xid),
        Some(TransactionStatus::RolledBack)
    );
}

#[tokio::test]
async fn test_completed_branches_pruned() {
    let cluster = Cluster::new();
    let node1 = cluster.node("node-1");
    let node2 = cluster.node("node-2");

    let xid = cluster.coordinator.begin();
    let writer = cluster.enlist(&xid, &node1, 1, cluster.writer("a")).await;
    let reader = cluster
        .enlist(&xid, &node2, 2, MemoryResource::new("reader", cluster.store.clone()))
        .await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();
    assert!(outcome.is_clean());
    assert_eq!(state(&node1, &writer), ParticipantState::Committed);
    assert_eq!(state(&node2, &reader), ParticipantState::ReadOnly);
    assert!(node1.in_doubt().is_empty());

    assert_eq!(node1.prune(), 1);
    assert_eq!(node2.prune(), 1);
    assert_eq!(node1.branch_count(), 0);
    assert_eq!(node2.branch_count(), 0);
    assert!(node1.servant(&writer).is_none());
    assert_eq!(cluster.store.get("a").as_deref(), Some("committed"));
}

#[tokio::test]
async fn test_finished_transaction_released() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let active = cluster.coordinator.begin();
    let xid = cluster.coordinator.begin();
    cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;
    cluster.enlist(&xid, &node, 2, cluster.writer("b")).await;
    assert_eq!(cluster.coordinator.participant_count(&xid), Some(2));

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();
    assert!(outcome.is_clean());
    assert_eq!(cluster.coordinator.participant_count(&xid), Some(0));

    assert_eq!(cluster.coordinator.prune(), 1);
    assert_eq!(cluster.coordinator.status(&xid), None);
    assert!(matches!(
        cluster.coordinator.commit(&xid).await,
        Err(CoordinatorError::TransactionNotFound(_))
    ));

    // Still running, not pruned
    assert_eq!(
        cluster.coordinator.status(&active),
        Some(TransactionStatus::Active)
    );
}

#[tokio::test]
async fn test_failed_commit_reported_and_forgotten() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let good = cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;
    let hazard = cluster
        .enlist(&xid, &node, 2, cluster.writer("b").with_fault(Fault::FailCommit))
        .await;

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::Committed);
    assert_eq!(outcome.heuristics.len(), 1);
    assert_eq!(outcome.heuristics[0].1, HeuristicOutcome::Hazard);
    assert!(outcome.unreachable.is_empty());

    assert_eq!(state(&node, &good), ParticipantState::Committed);
    assert_eq!(state(&node, &hazard), ParticipantState::Forgotten);
    assert!(node.in_doubt().is_empty());
}

#[tokio::test]
async fn test_rollback_active_transaction() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let b1 = cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;
    let b2 = cluster.enlist(&xid, &node, 2, cluster.writer("b")).await;

    let outcome = cluster.coordinator.rollback(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::RolledBack);
    assert_eq!(state(&node, &b1), ParticipantState::RolledBack);
    assert_eq!(state(&node, &b2), ParticipantState::RolledBack);
    assert_eq!(
        cluster.coordinator.status(&xid),
        Some(TransactionStatus::RolledBack)
    );
}

#[tokio::test]
async fn test_null_envelope_registers_nothing() {
    let cluster = Cluster::new();

    let xid = cluster.coordinator.begin();
    let envelope = helper::encode_any(None).unwrap();
    cluster
        .coordinator
        .register_resource(&xid, &envelope)
        .await
        .unwrap();

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();
    assert_eq!(outcome.completion, Completion::Committed);
}

#[tokio::test]
async fn test_duplicate_registration_ignored() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let branch = xid.branch(1);
    let object = node.export(branch, Box::new(cluster.writer("a"))).unwrap();
    let envelope = helper::encode_any(Some(&object)).unwrap();

    for _ in 0..2 {
        cluster
            .coordinator
            .register_resource(&xid, &envelope)
            .await
            .unwrap();
    }

    // Still a sole participant
    cluster.coordinator.commit(&xid).await.unwrap();
    assert_eq!(cluster.store.prepare_calls(&branch), 0);
}

struct Ledger;

#[async_trait]
impl Servant for Ledger {
    fn repository_ids(&self) -> Vec<RepositoryId> {
        vec![RepositoryId::from_static("IDL:example/Ledger:1.0")]
    }

    async fn dispatch(&self, _operation: &str, _body: &[u8]) -> proven_orb::Result<Reply> {
        panic!("participant operation sent to a ledger");
    }
}

#[tokio::test]
async fn test_register_rejects_other_interface() {
    let cluster = Cluster::new();
    let client = MockClient::new("ledger-node".to_string(), cluster.engine.clone());
    let adapter = ObjectAdapter::new(client, "ledger.node");
    adapter.start();

    let ledger = adapter.activate(Arc::new(Ledger)).unwrap();
    let envelope = helper::encode_any(Some(&ledger)).unwrap();

    let xid = cluster.coordinator.begin();
    let err = cluster
        .coordinator
        .register_resource(&xid, &envelope)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Enlistment(ResourceError::CapabilityMismatch { .. })
    ));
}

#[tokio::test]
async fn test_malformed_envelope_rejected() {
    let cluster = Cluster::new();
    let xid = cluster.coordinator.begin();

    let envelope = Envelope::new(helper::descriptor().clone(), vec![1, 2, 3]);
    let err = cluster
        .coordinator
        .register_resource(&xid, &envelope)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Enlistment(ResourceError::MalformedEnvelope(_))
    ));
}

#[tokio::test]
async fn test_invalid_states() {
    let cluster = Cluster::new();

    let unknown = Xid::new();
    assert!(matches!(
        cluster.coordinator.commit(&unknown).await,
        Err(CoordinatorError::TransactionNotFound(_))
    ));

    let xid = cluster.coordinator.begin();
    cluster.coordinator.commit(&xid).await.unwrap();
    assert!(matches!(
        cluster.coordinator.commit(&xid).await,
        Err(CoordinatorError::InvalidState(_))
    ));
    assert!(matches!(
        cluster.coordinator.rollback(&xid).await,
        Err(CoordinatorError::InvalidState(_))
    ));
}

/// Participant that never answers prepare in time
struct Stalled {
    delegate: Delegate,
}

#[async_trait]
impl OtsResource for Stalled {
    fn this(self: Arc<Self>) -> ObjectRef {
        let delegate = self.delegate.clone();
        ObjectRef::local(delegate, self as Participant)
    }

    async fn prepare(&self) -> proven_resource::Result<Vote> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vote::Prepared)
    }

    async fn commit(&self) -> proven_resource::Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> proven_resource::Result<()> {
        Ok(())
    }

    async fn commit_one_phase(&self) -> proven_resource::Result<()> {
        Ok(())
    }

    async fn forget(&self) -> proven_resource::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_call_timeout_counts_as_unreachable() {
    let cluster = Cluster::new();
    let node = cluster.node("node-1");

    let xid = cluster.coordinator.begin();
    let good = cluster.enlist(&xid, &node, 1, cluster.writer("a")).await;

    let client = MockClient::new("stalled".to_string(), cluster.engine.clone());
    let ior = Ior::new(helper::id().clone(), "ots.stalled.1", ObjectKey::new());
    let stalled: Participant = Arc::new(Stalled {
        delegate: Delegate::new(ior, Arc::new(BrokerTransport::new(client))),
    });
    cluster
        .coordinator
        .register_participant(&xid, stalled)
        .unwrap();

    let outcome = cluster.coordinator.commit(&xid).await.unwrap();

    assert_eq!(outcome.completion, Completion::RolledBack);
    assert_eq!(outcome.unreachable.len(), 1);
    assert!(outcome.unreachable[0].contains("ots.stalled.1"));
    assert_eq!(state(&node, &good), ParticipantState::RolledBack);
}
