use super::parse_options;
use crate::kernel::{
    Capability, CapabilityDescriptor, EditorHandle, HookPoint, Result, READY_EVENT,
};
use crate::object::{CustomData, ObjectId, SceneObject, WORKSPACE_KIND};
use crate::scene::Scene;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceOptions {
    pub width: f64,
    pub height: f64,
    pub fill: String,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 1200.0,
            fill: "#ffffff".to_string(),
        }
    }
}

/// Owns the distinguished workspace object: the document's canvas bounds,
/// kept non-selectable and non-removable. Announces "ready" once the
/// workspace exists; the editor counts as initialized only from then on.
pub struct WorkspaceCapability {
    scene: Arc<dyn Scene>,
    editor: EditorHandle,
    options: WorkspaceOptions,
    workspace_id: Mutex<Option<ObjectId>>,
}

impl WorkspaceCapability {
    pub const NAME: &'static str = "workspace";
    pub const SIZE_CHANGE_EVENT: &'static str = "sizeChange";

    pub fn descriptor(options: Value) -> CapabilityDescriptor {
        CapabilityDescriptor::new(options, |scene, editor, options| {
            Ok(Self {
                scene,
                editor,
                options: parse_options(options)?,
                workspace_id: Mutex::new(None),
            })
        })
    }

    pub fn workspace_id(&self) -> Option<ObjectId> {
        *self.workspace_id.lock().unwrap()
    }

    fn build_workspace(&self) -> SceneObject {
        let mut object = SceneObject::new(WORKSPACE_KIND);
        object.width = self.options.width;
        object.height = self.options.height;
        object.fill = Some(self.options.fill.clone());
        object.selectable = false;
        object.can_remove = false;
        object.custom = Some(CustomData::of_kind(WORKSPACE_KIND));
        object
    }

    /// Resize the workspace and announce the change.
    pub fn set_size(&self, width: f64, height: f64) {
        let Some(id) = self.workspace_id() else { return };
        let Some(mut object) = self.scene.get(id) else {
            return;
        };
        object.width = width;
        object.height = height;
        self.scene.replace(object);
        self.scene.request_redraw();
        self.editor.emit(
            Self::SIZE_CHANGE_EVENT,
            json!({ "width": width, "height": height }),
        );
    }

    /// An import replaces the object list wholesale; find the imported
    /// workspace object, re-lock it and adopt it as ours.
    fn adopt_imported(&self) {
        let imported = self
            .scene
            .objects()
            .into_iter()
            .find(|object| object.is_workspace());
        if let Some(mut object) = imported {
            object.selectable = false;
            object.can_remove = false;
            let id = object.id;
            self.scene.replace(object);
            *self.workspace_id.lock().unwrap() = Some(id);
            debug!("Adopted imported workspace object: {}", id);
        }
    }
}

#[async_trait]
impl Capability for WorkspaceCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn events(&self) -> Vec<String> {
        vec![Self::SIZE_CHANGE_EVENT.to_string()]
    }

    fn hook_points(&self) -> Vec<HookPoint> {
        vec![HookPoint::ImportAfter]
    }

    async fn mounted(&self) -> Result<()> {
        let object = self.build_workspace();
        let id = object.id;
        self.scene.add(object);
        *self.workspace_id.lock().unwrap() = Some(id);
        self.scene.request_redraw();
        debug!("Workspace object created: {}", id);
        self.editor.emit(READY_EVENT, Value::Null);
        Ok(())
    }

    async fn on_hook(&self, _point: HookPoint, payload: Value) -> Result<Value> {
        self.adopt_imported();
        Ok(payload)
    }

    async fn destroyed(&self) -> Result<()> {
        *self.workspace_id.lock().unwrap() = None;
        Ok(())
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
