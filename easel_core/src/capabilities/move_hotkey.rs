use super::parse_options;
use crate::kernel::{Capability, CapabilityDescriptor, Hotkey, KeyEvent, KeyPhase};
use crate::scene::Scene;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveOptions {
    pub step: f64,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self { step: 1.0 }
    }
}

/// Arrow-key nudging of the active object.
pub struct MoveHotkeyCapability {
    scene: Arc<dyn Scene>,
    options: MoveOptions,
}

impl MoveHotkeyCapability {
    pub const NAME: &'static str = "move-hotkey";

    pub fn descriptor(options: Value) -> CapabilityDescriptor {
        CapabilityDescriptor::new(options, |scene, _, options| {
            Ok(Self {
                scene,
                options: parse_options(options)?,
            })
        })
    }

    fn nudge(&self, key: &str) {
        let Some(id) = self.scene.active().first().copied() else {
            return;
        };
        let Some(mut object) = self.scene.get(id) else {
            return;
        };
        let step = self.options.step;
        match key {
            "left" => object.left -= step,
            "right" => object.left += step,
            "up" => object.top -= step,
            "down" => object.top += step,
            _ => return,
        }
        self.scene.replace(object);
        self.scene.request_redraw();
    }
}

#[async_trait]
impl Capability for MoveHotkeyCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hotkeys(&self) -> Vec<String> {
        vec![
            "left".to_string(),
            "right".to_string(),
            "up".to_string(),
            "down".to_string(),
        ]
    }

    fn hotkey_event(&self, hotkey: &Hotkey, event: &KeyEvent) {
        if event.phase == KeyPhase::Down {
            self.nudge(&hotkey.key);
        }
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
