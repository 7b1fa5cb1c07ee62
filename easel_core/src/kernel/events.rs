use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

const BUS_CAPACITY: usize = 256;

/// A single event on the editor bus.
#[derive(Debug, Clone)]
pub struct EditorEvent {
    pub name: String,
    pub payload: Value,
}

/// Broadcast bus the container, its capabilities and the host communicate
/// over. Custom event names are reserved per capability at registration;
/// the bus itself does not police them.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, name: &str, payload: Value) {
        debug!("Emitting event: {}", name);
        let _ = self.tx.send(EditorEvent {
            name: name.to_string(),
            payload,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.tx.subscribe()
    }

    /// Wait for the next event with the given name. Returns `None` only
    /// if the bus shuts down first.
    pub async fn once(&self, name: &str) -> Option<EditorEvent> {
        let mut rx = self.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) if event.name == name => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
