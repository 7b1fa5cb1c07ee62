use crate::kernel::{
    Capability, CapabilityDescriptor, ContextMenuHandler, EditorHandle, Result,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Where the menu is currently open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuState {
    pub x: f64,
    pub y: f64,
}

/// Owns the context-menu role; the editor routes secondary-button pointer
/// events here. Rendering is the host's concern — this capability only
/// tracks the menu state and announces it.
pub struct ContextMenuCapability {
    editor: EditorHandle,
    open_at: Mutex<Option<MenuState>>,
}

impl ContextMenuCapability {
    pub const NAME: &'static str = "context-menu";
    pub const SHOW_EVENT: &'static str = "contextMenuShow";
    pub const HIDE_EVENT: &'static str = "contextMenuHide";

    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new(Value::Null, |_, editor, _| {
            Ok(Self {
                editor,
                open_at: Mutex::new(None),
            })
        })
    }

    pub fn open_at(&self) -> Option<MenuState> {
        *self.open_at.lock().unwrap()
    }
}

#[async_trait]
impl Capability for ContextMenuCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn events(&self) -> Vec<String> {
        vec![Self::SHOW_EVENT.to_string(), Self::HIDE_EVENT.to_string()]
    }

    fn as_context_menu(&self) -> Option<&dyn ContextMenuHandler> {
        Some(self)
    }

    async fn destroyed(&self) -> Result<()> {
        *self.open_at.lock().unwrap() = None;
        Ok(())
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ContextMenuHandler for ContextMenuCapability {
    fn show_menu(&self, x: f64, y: f64) {
        debug!("Showing context menu at ({}, {})", x, y);
        *self.open_at.lock().unwrap() = Some(MenuState { x, y });
        self.editor.emit(Self::SHOW_EVENT, json!({ "x": x, "y": y }));
    }

    fn hide_menu(&self) {
        if self.open_at.lock().unwrap().take().is_some() {
            self.editor.emit(Self::HIDE_EVENT, Value::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Editor;
    use crate::scene::{MemoryScene, PointerButton};
    use std::time::Duration;

    #[tokio::test]
    async fn test_secondary_click_opens_menu() {
        let editor = Editor::new();
        let scene = Arc::new(MemoryScene::new());
        editor.init(scene.clone());
        editor
            .register(vec![ContextMenuCapability::descriptor()])
            .unwrap();
        editor
            .await_mounted(ContextMenuCapability::NAME, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        let menu = editor
            .lookup_as::<ContextMenuCapability>(ContextMenuCapability::NAME)
            .unwrap();

        scene.pointer_down(PointerButton::Secondary, 7.0, 9.0);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while menu.open_at() != Some(MenuState { x: 7.0, y: 9.0 }) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "menu never opened"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        menu.hide_menu();
        assert_eq!(menu.open_at(), None);
    }
}
