//! Local work guarded by a participant

use crate::state::Vote;
use parking_lot::Mutex;
use proven_protocol::Xid;
use std::collections::HashMap;
use std::sync::Arc;

/// Resource manager a participant drives through two-phase commit
///
/// Methods are synchronous: a participant serializes every protocol step on
/// its branch, so the manager sees at most one call at a time.
pub trait ResourceManager: Send {
    /// Name for logging and debugging
    fn name(&self) -> &str;

    /// Durably record the intent to commit the branch
    ///
    /// `Err` is treated as a vote to abort.
    fn prepare(&mut self, xid: &Xid) -> Result<Vote, String>;

    /// Make the branch's work durable and visible
    ///
    /// With `one_phase` the branch was never prepared and must be prepared
    /// and committed atomically, or left untouched on `Err`.
    fn commit(&mut self, xid: &Xid, one_phase: bool) -> Result<(), String>;

    /// Discard the branch's work
    fn rollback(&mut self, xid: &Xid) -> Result<(), String>;

    /// Release recovery bookkeeping for a completed branch
    fn forget(&mut self, _xid: &Xid) {}
}

/// Failure injected into a `MemoryResource`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `prepare` votes abort
    VoteAbort,
    /// `commit` with `one_phase` refuses
    FailOnePhase,
    /// `commit` after prepare fails
    FailCommit,
    /// `rollback` fails
    FailRollback,
}

#[derive(Debug, Default)]
struct StoreInner {
    committed: HashMap<String, String>,
    prepared: HashMap<Xid, Vec<(String, String)>>,
    prepare_calls: HashMap<Xid, usize>,
}

/// Shared key-value state written by memory resources
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed value of `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().committed.get(key).cloned()
    }

    /// Whether the branch holds prepared but undecided writes
    pub fn is_prepared(&self, xid: &Xid) -> bool {
        self.inner.lock().prepared.contains_key(xid)
    }

    /// How many times `prepare` ran for the branch
    pub fn prepare_calls(&self, xid: &Xid) -> usize {
        self.inner.lock().prepare_calls.get(xid).copied().unwrap_or(0)
    }

    pub fn committed_len(&self) -> usize {
        self.inner.lock().committed.len()
    }
}

/// In-memory resource manager staging writes into a `MemoryStore`
pub struct MemoryResource {
    name: String,
    store: MemoryStore,
    writes: Vec<(String, String)>,
    fault: Option<Fault>,
}

impl MemoryResource {
    pub fn new(name: impl Into<String>, store: MemoryStore) -> Self {
        Self {
            name: name.into(),
            store,
            writes: Vec::new(),
            fault: None,
        }
    }

    /// Stage a write applied on commit
    pub fn with_write(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.writes.push((key.into(), value.into()));
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }
}

impl ResourceManager for MemoryResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, xid: &Xid) -> Result<Vote, String> {
        let mut inner = self.store.inner.lock();
        *inner.prepare_calls.entry(*xid).or_default() += 1;

        if self.fault == Some(Fault::VoteAbort) {
            return Ok(Vote::Abort);
        }
        if self.writes.is_empty() {
            return Ok(Vote::ReadOnly);
        }

        inner.prepared.insert(*xid, std::mem::take(&mut self.writes));
        Ok(Vote::Prepared)
    }

    fn commit(&mut self, xid: &Xid, one_phase: bool) -> Result<(), String> {
        if one_phase && self.fault == Some(Fault::FailOnePhase) {
            return Err(format!("{} cannot commit {} in one phase", self.name, xid));
        }
        if !one_phase && self.fault == Some(Fault::FailCommit) {
            return Err(format!("{} lost its log while committing {}", self.name, xid));
        }

        let mut inner = self.store.inner.lock();
        let writes = if one_phase {
            std::mem::take(&mut self.writes)
        } else {
            inner
                .prepared
                .remove(xid)
                .ok_or_else(|| format!("{} has no prepared work for {}", self.name, xid))?
        };

        inner.committed.extend(writes);
        Ok(())
    }

    fn rollback(&mut self, xid: &Xid) -> Result<(), String> {
        if self.fault == Some(Fault::FailRollback) {
            return Err(format!("{} failed to roll back {}", self.name, xid));
        }

        self.writes.clear();
        self.store.inner.lock().prepared.remove(xid);
        Ok(())
    }

    fn forget(&mut self, xid: &Xid) {
        self.store.inner.lock().prepare_calls.remove(xid);
    }
}
