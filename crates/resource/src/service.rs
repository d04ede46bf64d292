//! Participant service hosting the branches of one node

use crate::error::{ResourceError, Result};
use crate::manager::ResourceManager;
use crate::participant::Participant;
use crate::servant::ResourceServant;
use crate::state::{HeuristicDecision, HeuristicOutcome};
use crate::stub::ColocatedResource;
use parking_lot::RwLock;
use proven_config::ServiceConfiguration;
use proven_engine::MockClient;
use proven_orb::{BrokerTransport, ObjectAdapter, ObjectRef, Servant, Transport};
use proven_protocol::{ObjectKey, Xid};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct Enlisted {
    key: ObjectKey,
    servant: Arc<ResourceServant>,
}

/// Exports one servant per transaction branch on the node's endpoint
pub struct ResourceService {
    adapter: ObjectAdapter,
    branches: RwLock<HashMap<Xid, Enlisted>>,
}

/// Broker subject the service of `node_id` listens on
pub fn endpoint(node_id: &str, port: u16) -> String {
    format!("ots.{}.{}", node_id, port)
}

impl ResourceService {
    /// Start listening as configured
    ///
    /// A disabled configuration is refused.
    pub fn start(client: MockClient, config: &ServiceConfiguration) -> Result<Self> {
        let transport = Arc::new(BrokerTransport::new(client.clone()));
        Self::start_with_transport(client, config, transport)
    }

    pub fn start_with_transport(
        client: MockClient,
        config: &ServiceConfiguration,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if !config.enabled {
            tracing::info!("Resource service on {} is disabled", client.node_id());
            return Err(ResourceError::ServiceDisabled);
        }

        let endpoint = endpoint(client.node_id(), config.port);
        let adapter = ObjectAdapter::with_transport(client, endpoint, transport);
        adapter.start();

        Ok(Self {
            adapter,
            branches: RwLock::new(HashMap::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.adapter.endpoint()
    }

    /// Transport references read on this node are bound to
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.adapter.transport().clone()
    }

    fn activate(
        &self,
        xid: Xid,
        manager: Box<dyn ResourceManager>,
    ) -> Result<(ObjectRef, Arc<ResourceServant>)> {
        let mut branches = self.branches.write();
        if branches.contains_key(&xid) {
            return Err(ResourceError::DuplicateBranch(xid.to_string()));
        }

        let servant = Arc::new(ResourceServant::new(xid, manager));
        let object = self.adapter.activate(servant.clone() as Arc<dyn Servant>)?;

        branches.insert(
            xid,
            Enlisted {
                key: object.ior().object_key,
                servant: servant.clone(),
            },
        );
        tracing::debug!("Enlisted branch {} as {}", xid, object.ior());
        Ok((object, servant))
    }

    /// Enlist a branch and return a participant for in-process use
    pub fn enlist(&self, xid: Xid, manager: Box<dyn ResourceManager>) -> Result<Participant> {
        let (object, servant) = self.activate(xid, manager)?;
        Ok(Arc::new(ColocatedResource::new(object.delegate().clone(), servant)))
    }

    /// Enlist a branch and return only its remote reference
    pub fn export(&self, xid: Xid, manager: Box<dyn ResourceManager>) -> Result<ObjectRef> {
        self.activate(xid, manager).map(|(object, _)| object)
    }

    pub fn servant(&self, xid: &Xid) -> Option<Arc<ResourceServant>> {
        self.branches.read().get(xid).map(|e| e.servant.clone())
    }

    /// Branches a recovering coordinator still has to resolve
    ///
    /// Prepared branches and branches carrying an unforgotten heuristic.
    pub fn in_doubt(&self) -> Vec<Xid> {
        let mut xids: Vec<Xid> = self
            .branches
            .read()
            .iter()
            .filter(|(_, e)| e.servant.state().is_in_doubt() || e.servant.heuristic().is_some())
            .map(|(xid, _)| *xid)
            .collect();
        xids.sort();
        xids
    }

    /// Heuristically complete branches prepared for longer than `after`
    pub fn expire_in_doubt(
        &self,
        after: Duration,
        decision: HeuristicDecision,
    ) -> Vec<(Xid, HeuristicOutcome)> {
        let servants: Vec<Arc<ResourceServant>> = self
            .branches
            .read()
            .values()
            .filter(|e| e.servant.in_doubt_for().is_some_and(|d| d >= after))
            .map(|e| e.servant.clone())
            .collect();

        servants
            .into_iter()
            .filter_map(|servant| match servant.heuristic_complete(decision) {
                Ok(outcome) => Some((*servant.xid(), outcome)),
                Err(e) => {
                    // Decided by the coordinator in the meantime
                    tracing::debug!("Branch {} not expired: {}", servant.xid(), e);
                    None
                }
            })
            .collect()
    }

    /// Drop completed branches and deactivate their servants
    ///
    /// A branch carrying a heuristic outcome is kept until it is forgotten.
    pub fn prune(&self) -> usize {
        let mut branches = self.branches.write();
        let completed: Vec<Xid> = branches
            .iter()
            .filter(|(_, e)| e.servant.state().is_complete() && e.servant.heuristic().is_none())
            .map(|(xid, _)| *xid)
            .collect();

        for xid in &completed {
            if let Some(enlisted) = branches.remove(xid) {
                self.adapter.deactivate(&enlisted.key);
            }
        }

        if !completed.is_empty() {
            tracing::debug!("Pruned {} completed branches", completed.len());
        }
        completed.len()
    }

    pub fn branch_count(&self) -> usize {
        self.branches.read().len()
    }

    /// Stop listening; references to this service become unreachable
    pub fn shutdown(&self) {
        self.adapter.shutdown();
    }
}
