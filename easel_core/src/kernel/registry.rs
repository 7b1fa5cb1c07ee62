use super::capability::Capability;
use super::error::EditorError;
use super::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Mount state of a registered capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityState {
    /// Wired into the container; `mounted` has not completed yet.
    Registered,
    Mounted,
    Failed(String),
}

struct Entry {
    capability: Arc<dyn Capability>,
    state: CapabilityState,
}

/// Name-keyed capability store preserving registration order, with
/// pending waiters for capabilities that have not mounted yet.
pub struct CapabilityRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    order: RwLock<Vec<String>>,
    waiters: Mutex<HashMap<String, Vec<oneshot::Sender<Arc<dyn Capability>>>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap().contains_key(name)
    }

    pub fn insert(&self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        self.entries.write().unwrap().insert(
            name.clone(),
            Entry {
                capability,
                state: CapabilityState::Registered,
            },
        );
        self.order.write().unwrap().push(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.entries
            .read()
            .unwrap()
            .get(name)
            .map(|entry| entry.capability.clone())
    }

    pub fn state(&self, name: &str) -> Option<CapabilityState> {
        self.entries
            .read()
            .unwrap()
            .get(name)
            .map(|entry| entry.state.clone())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark a capability mounted and wake every pending waiter.
    pub fn mark_mounted(&self, name: &str) {
        let capability = {
            let mut entries = self.entries.write().unwrap();
            match entries.get_mut(name) {
                Some(entry) => {
                    entry.state = CapabilityState::Mounted;
                    entry.capability.clone()
                }
                None => return,
            }
        };
        debug!("Capability {} is mounted", name);
        if let Some(senders) = self.waiters.lock().unwrap().remove(name) {
            for sender in senders {
                let _ = sender.send(capability.clone());
            }
        }
    }

    /// Record a mount failure. Pending waiters stay pending; the failure
    /// surfaces through `state` and the caller's timeout, if any.
    pub fn mark_failed(&self, name: &str, reason: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(name) {
            entry.state = CapabilityState::Failed(reason.to_string());
        }
    }

    /// Resolve once the named capability has mounted. A `None` timeout
    /// waits indefinitely, as the original dispatcher did.
    pub async fn await_mounted(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Arc<dyn Capability>> {
        let rx = {
            // Register the waiter while holding the entries lock so a
            // concurrent mark_mounted cannot slip between check and wait.
            let entries = self.entries.read().unwrap();
            if let Some(entry) = entries.get(name) {
                if entry.state == CapabilityState::Mounted {
                    return Ok(entry.capability.clone());
                }
            }
            let (tx, rx) = oneshot::channel();
            self.waiters
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_default()
                .push(tx);
            rx
        };

        match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(Ok(capability)) => Ok(capability),
                Ok(Err(_)) => Err(EditorError::Detached),
                Err(_) => Err(EditorError::LookupTimeout(name.to_string())),
            },
            None => rx.await.map_err(|_| EditorError::Detached),
        }
    }

    /// Drop every entry and waiter. Dropped waiter senders wake pending
    /// lookups with a detached error.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
        self.order.write().unwrap().clear();
        self.waiters.lock().unwrap().clear();
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
