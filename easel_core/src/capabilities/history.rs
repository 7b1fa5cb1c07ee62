use super::parse_options;
use crate::kernel::{
    Capability, CapabilityDescriptor, EditorHandle, HookPoint, Hotkey, KeyEvent, KeyPhase, Result,
};
use crate::object::Document;
use crate::scene::{Scene, SceneEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryOptions {
    pub history_size: usize,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self { history_size: 100 }
    }
}

struct HistoryStacks {
    undo: Mutex<Vec<Document>>,
    redo: Mutex<Vec<Document>>,
    // Snapshots are suppressed while a snapshot is being applied.
    muted: AtomicBool,
}

impl HistoryStacks {
    fn new() -> Self {
        Self {
            undo: Mutex::new(Vec::new()),
            redo: Mutex::new(Vec::new()),
            muted: AtomicBool::new(false),
        }
    }

    fn record(&self, document: Document, limit: usize) {
        if self.muted.load(Ordering::SeqCst) {
            return;
        }
        let mut undo = self.undo.lock().unwrap();
        if undo.len() >= limit {
            undo.remove(0);
        }
        undo.push(document);
        self.redo.lock().unwrap().clear();
    }
}

/// Bounded undo/redo over serialized snapshots of the scene. Snapshots
/// are taken on object changes once the workspace exists; selection-only
/// events are ignored.
pub struct HistoryCapability {
    scene: Arc<dyn Scene>,
    editor: EditorHandle,
    options: HistoryOptions,
    stacks: Arc<HistoryStacks>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryCapability {
    pub const NAME: &'static str = "history";
    pub const CHANGE_EVENT: &'static str = "historyChange";

    pub fn descriptor(options: Value) -> CapabilityDescriptor {
        CapabilityDescriptor::new(options, |scene, editor, options| {
            Ok(Self {
                scene,
                editor,
                options: parse_options(options)?,
                stacks: Arc::new(HistoryStacks::new()),
                listener: Mutex::new(None),
            })
        })
    }

    pub fn undo_depth(&self) -> usize {
        self.stacks.undo.lock().unwrap().len()
    }

    pub fn redo_depth(&self) -> usize {
        self.stacks.redo.lock().unwrap().len()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_depth() > 1
    }

    pub fn can_redo(&self) -> bool {
        self.redo_depth() > 0
    }

    /// Step back to the previous snapshot. Returns false when there is
    /// nothing earlier to restore.
    pub fn undo(&self) -> bool {
        let previous = {
            let mut undo = self.stacks.undo.lock().unwrap();
            if undo.len() < 2 {
                return false;
            }
            let Some(current) = undo.pop() else {
                return false;
            };
            self.stacks.redo.lock().unwrap().push(current);
            undo.last().cloned()
        };
        let Some(document) = previous else {
            return false;
        };
        debug!("Undo");
        self.apply(document);
        true
    }

    /// Step forward again after an undo.
    pub fn redo(&self) -> bool {
        let document = {
            let mut redo = self.stacks.redo.lock().unwrap();
            match redo.pop() {
                Some(document) => document,
                None => return false,
            }
        };
        self.stacks.undo.lock().unwrap().push(document.clone());
        debug!("Redo");
        self.apply(document);
        true
    }

    /// Drop all history and start over from the current scene. Runs after
    /// every import, since the imported document is a new baseline.
    pub fn reset(&self) {
        self.stacks.undo.lock().unwrap().clear();
        self.stacks.redo.lock().unwrap().clear();
        self.stacks
            .undo
            .lock()
            .unwrap()
            .push(self.scene.to_document());
        self.editor.emit(Self::CHANGE_EVENT, Value::Null);
    }

    fn apply(&self, document: Document) {
        self.stacks.muted.store(true, Ordering::SeqCst);
        self.scene.load_document(document);
        self.scene.request_redraw();
        self.stacks.muted.store(false, Ordering::SeqCst);
        self.editor.emit(Self::CHANGE_EVENT, Value::Null);
    }
}

#[async_trait]
impl Capability for HistoryCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn events(&self) -> Vec<String> {
        vec![Self::CHANGE_EVENT.to_string()]
    }

    fn hotkeys(&self) -> Vec<String> {
        vec![
            "ctrl+z".to_string(),
            "ctrl+shift+z".to_string(),
            "meta+z".to_string(),
            "meta+shift+z".to_string(),
        ]
    }

    fn hook_points(&self) -> Vec<HookPoint> {
        vec![HookPoint::ImportAfter]
    }

    async fn on_hook(&self, _point: HookPoint, payload: Value) -> Result<Value> {
        self.reset();
        Ok(payload)
    }

    async fn mounted(&self) -> Result<()> {
        let scene = self.scene.clone();
        let editor = self.editor.clone();
        let stacks = self.stacks.clone();
        let limit = self.options.history_size;
        let mut events = self.scene.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match event {
                    SceneEvent::ObjectAdded { .. }
                    | SceneEvent::ObjectModified { .. }
                    | SceneEvent::ObjectRemoved { .. } => {}
                    _ => continue,
                }
                // No snapshots until the workspace exists.
                if !scene.objects().iter().any(|object| object.is_workspace()) {
                    continue;
                }
                stacks.record(scene.to_document(), limit);
                editor.emit(HistoryCapability::CHANGE_EVENT, Value::Null);
            }
        });
        *self.listener.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn destroyed(&self) -> Result<()> {
        if let Some(listener) = self.listener.lock().unwrap().take() {
            listener.abort();
        }
        Ok(())
    }

    fn hotkey_event(&self, hotkey: &Hotkey, event: &KeyEvent) {
        if event.phase != KeyPhase::Down {
            return;
        }
        if hotkey.shift {
            self.redo();
        } else {
            self.undo();
        }
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
