use super::editor::EditorHandle;
use super::hooks::HookPoint;
use super::hotkeys::{Hotkey, KeyEvent};
use super::Result;
use crate::scene::Scene;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// A named, independently authored unit of editor behavior.
///
/// The lifecycle is strictly linear: constructed and validated by the
/// editor, wired into the registry/hook bus/dispatcher, `mounted` exactly
/// once after wiring succeeds, `destroyed` exactly once during teardown.
/// There is no re-mount; after `destroyed` the capability is never
/// invoked again.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Unique name, immutable for the capability's life.
    fn name(&self) -> &str;

    /// Custom event names this capability owns on the editor bus. Checked
    /// for collisions against every other registered capability.
    fn events(&self) -> Vec<String> {
        Vec::new()
    }

    /// Key combinations this capability reacts to.
    fn hotkeys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Extension points this capability handles. Declared up front and
    /// checked at registration; `on_hook` is only called for points
    /// listed here.
    fn hook_points(&self) -> Vec<HookPoint> {
        Vec::new()
    }

    /// Handle one lifecycle hook invocation, returning the (possibly
    /// transformed) payload for the next handler in the chain.
    async fn on_hook(&self, _point: HookPoint, payload: Value) -> Result<Value> {
        Ok(payload)
    }

    /// Called exactly once after registration succeeds.
    async fn mounted(&self) -> Result<()> {
        Ok(())
    }

    /// Called exactly once during editor teardown. Releases any listeners
    /// the capability attached to the scene or elsewhere.
    async fn destroyed(&self) -> Result<()> {
        Ok(())
    }

    /// Hotkey callback. Fired for both key phases; the implementation
    /// decides which phases it cares about.
    fn hotkey_event(&self, _hotkey: &Hotkey, _event: &KeyEvent) {}

    /// Typed access to the context-menu role, for the capability that
    /// owns it.
    fn as_context_menu(&self) -> Option<&dyn ContextMenuHandler> {
        None
    }

    /// Upcast for typed lookups through the container.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Role of the capability the editor routes secondary-button pointer
/// events to.
pub trait ContextMenuHandler: Send + Sync {
    fn show_menu(&self, x: f64, y: f64);
    fn hide_menu(&self);
}

type BuildFn =
    Box<dyn FnOnce(Arc<dyn Scene>, EditorHandle, Value) -> Result<Arc<dyn Capability>> + Send>;

/// Registration input: a capability constructor paired with the options
/// bag passed verbatim to it.
pub struct CapabilityDescriptor {
    build: BuildFn,
    options: Value,
}

impl CapabilityDescriptor {
    pub fn new<C, F>(options: Value, build: F) -> Self
    where
        C: Capability + 'static,
        F: FnOnce(Arc<dyn Scene>, EditorHandle, Value) -> Result<C> + Send + 'static,
    {
        Self {
            build: Box::new(move |scene, editor, options| {
                Ok(Arc::new(build(scene, editor, options)?) as Arc<dyn Capability>)
            }),
            options,
        }
    }

    pub(crate) fn construct(
        self,
        scene: Arc<dyn Scene>,
        editor: EditorHandle,
    ) -> Result<Arc<dyn Capability>> {
        (self.build)(scene, editor, self.options)
    }
}
