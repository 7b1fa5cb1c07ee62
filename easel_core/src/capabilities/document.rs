use crate::kernel::{Capability, CapabilityDescriptor, EditorHandle, HookPoint, Result, StatusPatch};
use crate::object::{Document, SceneObject};
use crate::scene::Scene;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info};

/// Import/export driver: wraps the scene's serialize/deserialize between
/// the lifecycle hook chains. The kernel never inspects the payload; this
/// capability is the one place the document format is interpreted.
pub struct DocumentCapability {
    scene: Arc<dyn Scene>,
    editor: EditorHandle,
}

impl DocumentCapability {
    pub const NAME: &'static str = "document";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Value::Null, |scene, editor, _| Ok(Self { scene, editor }))
    }

    /// Replace the scene contents with a serialized document, running the
    /// import hook chains around the swap. A failing chain leaves the
    /// scene as it was.
    pub async fn load_json(&self, json: &str) -> Result<()> {
        let payload: Value = serde_json::from_str(json)?;
        self.load_value(payload).await
    }

    pub async fn load_value(&self, payload: Value) -> Result<()> {
        let payload = self.editor.run_hook(HookPoint::ImportBefore, payload).await?;
        let document: Document = serde_json::from_value(payload.clone())?;
        info!("Importing document with {} objects", document.objects.len());

        let previous = self.scene.to_document();
        self.scene.load_document(document);
        if let Err(e) = self.editor.run_hook(HookPoint::ImportAfter, payload).await {
            debug!("Import aborted by hook, restoring previous scene");
            self.scene.load_document(previous);
            return Err(e);
        }

        self.scene.request_redraw();
        self.editor.update_status(StatusPatch::change(false));
        Ok(())
    }

    /// Serialize the scene, running the save hook chains around it. The
    /// after-save chain sees the serialized payload and may transform it.
    pub async fn save(&self) -> Result<Document> {
        self.editor
            .run_hook(HookPoint::SaveBefore, Value::Null)
            .await?;
        let document = self.scene.to_document();
        info!("Exporting document with {} objects", document.objects.len());

        let payload = serde_json::to_value(&document)?;
        let payload = self.editor.run_hook(HookPoint::SaveAfter, payload).await?;
        let document = serde_json::from_value(payload)?;

        self.editor.update_status(StatusPatch::change(false));
        Ok(document)
    }

    pub async fn to_json(&self) -> Result<String> {
        let document = self.save().await?;
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Add one object and make it the active selection.
    pub fn insert_object(&self, object: SceneObject) {
        let id = object.id;
        self.scene.add(object);
        self.scene.set_active(id);
        self.scene.request_redraw();
        self.editor.update_status(StatusPatch::change(true));
    }
}

#[async_trait]
impl Capability for DocumentCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Editor, EditorError};
    use crate::scene::MemoryScene;
    use serde_json::json;
    use std::time::Duration;

    async fn mounted_document() -> (Editor, Arc<MemoryScene>, Arc<DocumentCapability>) {
        let editor = Editor::new();
        let scene = Arc::new(MemoryScene::new());
        editor.init(scene.clone());
        editor
            .register(vec![DocumentCapability::descriptor()])
            .unwrap();
        editor
            .await_mounted(DocumentCapability::NAME, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        let document = editor
            .lookup_as::<DocumentCapability>(DocumentCapability::NAME)
            .unwrap();
        (editor, scene, document)
    }

    #[tokio::test]
    async fn test_import_export_round_trip() {
        let (_editor, scene, document) = mounted_document().await;

        let raw = json!({
            "objects": [
                { "type": "rect", "width": 10.0, "height": 20.0 },
                { "type": "text" }
            ]
        })
        .to_string();

        document.load_json(&raw).await.unwrap();
        assert_eq!(scene.len(), 2);

        let exported = document.save().await.unwrap();
        assert_eq!(exported.objects.len(), 2);
        assert_eq!(exported.objects[0].kind, "rect");
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let (_editor, scene, document) = mounted_document().await;
        let result = document.load_json("not json at all").await;
        assert!(matches!(result, Err(EditorError::Serde(_))));
        assert!(scene.is_empty());
    }

    #[tokio::test]
    async fn test_failing_import_hook_restores_scene() {
        use crate::kernel::CapabilityDescriptor;
        use std::any::Any;

        struct Vetoer;

        #[async_trait]
        impl Capability for Vetoer {
            fn name(&self) -> &str {
                "vetoer"
            }

            fn hook_points(&self) -> Vec<HookPoint> {
                vec![HookPoint::ImportAfter]
            }

            async fn on_hook(&self, _point: HookPoint, _payload: Value) -> Result<Value> {
                Err(EditorError::Runtime("rejected".to_string()))
            }

            fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
                self
            }
        }

        let (editor, scene, document) = mounted_document().await;
        scene.add(SceneObject::new("rect"));

        editor
            .register(vec![CapabilityDescriptor::new(Value::Null, |_, _, _| {
                Ok(Vetoer)
            })])
            .unwrap();

        let raw = json!({ "objects": [ { "type": "text" }, { "type": "text" } ] }).to_string();
        let result = document.load_json(&raw).await;
        assert!(matches!(result, Err(EditorError::HookFailed { .. })));

        // The pre-import scene is back.
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.objects()[0].kind, "rect");
    }

    #[tokio::test]
    async fn test_insert_object_selects_it() {
        let (editor, scene, document) = mounted_document().await;

        let object = SceneObject::new("rect");
        let id = object.id;
        document.insert_object(object);

        assert_eq!(scene.active(), vec![id]);
        assert!(editor.status().change);
    }
}
