use crate::kernel::{Capability, CapabilityDescriptor, Hotkey, KeyEvent, KeyPhase};
use crate::scene::Scene;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// Removes the active selection on backspace/delete keydown. Objects
/// flagged non-removable (the workspace) survive.
pub struct DeleteHotkeyCapability {
    scene: Arc<dyn Scene>,
}

impl DeleteHotkeyCapability {
    pub const NAME: &'static str = "delete-hotkey";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Value::Null, |scene, _, _| Ok(Self { scene }))
    }

    pub fn delete_active(&self) {
        let active = self.scene.active();
        if active.is_empty() {
            return;
        }
        let mut removed = 0usize;
        for id in active {
            let Some(object) = self.scene.get(id) else {
                continue;
            };
            if !object.can_remove {
                continue;
            }
            self.scene.remove(id);
            removed += 1;
        }
        if removed > 0 {
            debug!("Deleted {} active objects", removed);
            self.scene.discard_active();
            self.scene.request_redraw();
        }
    }
}

#[async_trait]
impl Capability for DeleteHotkeyCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hotkeys(&self) -> Vec<String> {
        vec!["backspace".to_string(), "delete".to_string()]
    }

    fn hotkey_event(&self, _hotkey: &Hotkey, event: &KeyEvent) {
        if event.phase == KeyPhase::Down {
            self.delete_active();
        }
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
