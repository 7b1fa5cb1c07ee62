use super::capability::Capability;
use super::error::EditorError;
use super::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// The four fixed lifecycle extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    ImportBefore,
    ImportAfter,
    SaveBefore,
    SaveAfter,
}

impl HookPoint {
    pub const ALL: [HookPoint; 4] = [
        HookPoint::ImportBefore,
        HookPoint::ImportAfter,
        HookPoint::SaveBefore,
        HookPoint::SaveAfter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::ImportBefore => "import:before",
            HookPoint::ImportAfter => "import:after",
            HookPoint::SaveBefore => "save:before",
            HookPoint::SaveAfter => "save:after",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct HookEntry {
    owner: String,
    capability: Arc<dyn Capability>,
}

/// Ordered async chains, one per extension point. Chain order equals
/// capability registration order; a failing handler aborts the rest of
/// the chain for that invocation.
pub struct HookBus {
    chains: Mutex<HashMap<HookPoint, Vec<HookEntry>>>,
}

impl HookBus {
    pub fn new() -> Self {
        let mut chains = HashMap::new();
        for point in HookPoint::ALL {
            chains.insert(point, Vec::new());
        }
        Self {
            chains: Mutex::new(chains),
        }
    }

    pub fn tap(&self, point: HookPoint, owner: &str, capability: Arc<dyn Capability>) {
        debug!("Tapping {} hook for {}", point, owner);
        let mut chains = self.chains.lock().unwrap();
        chains.entry(point).or_default().push(HookEntry {
            owner: owner.to_string(),
            capability,
        });
    }

    pub fn untap_owner(&self, owner: &str) {
        let mut chains = self.chains.lock().unwrap();
        for chain in chains.values_mut() {
            chain.retain(|entry| entry.owner != owner);
        }
    }

    pub fn chain_owners(&self, point: HookPoint) -> Vec<String> {
        let chains = self.chains.lock().unwrap();
        chains
            .get(&point)
            .map(|chain| chain.iter().map(|entry| entry.owner.clone()).collect())
            .unwrap_or_default()
    }

    pub fn chain_len(&self, point: HookPoint) -> usize {
        let chains = self.chains.lock().unwrap();
        chains.get(&point).map(|chain| chain.len()).unwrap_or(0)
    }

    /// Empty every chain; the extension points themselves remain.
    pub fn clear(&self) {
        let mut chains = self.chains.lock().unwrap();
        for chain in chains.values_mut() {
            chain.clear();
        }
    }

    /// Run the chain for one point, awaiting each handler in registration
    /// order and threading the payload through. Handlers registered while
    /// an invocation is in flight are not observed by it.
    pub async fn run(&self, point: HookPoint, payload: Value) -> Result<Value> {
        let chain: Vec<(String, Arc<dyn Capability>)> = {
            let chains = self.chains.lock().unwrap();
            chains
                .get(&point)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| (entry.owner.clone(), entry.capability.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut payload = payload;
        for (owner, capability) in chain {
            debug!("Running {} hook for {}", point, owner);
            match capability.on_hook(point, payload).await {
                Ok(next) => payload = next,
                Err(e) => {
                    error!("{} hook failed in {}: {}", point, owner, e);
                    return Err(EditorError::HookFailed {
                        point,
                        capability: owner,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(payload)
    }
}

impl Default for HookBus {
    fn default() -> Self {
        Self::new()
    }
}
