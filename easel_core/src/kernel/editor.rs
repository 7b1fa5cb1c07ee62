use super::capability::{Capability, CapabilityDescriptor};
use super::events::{EditorEvent, EventBus};
use super::hooks::{HookBus, HookPoint};
use super::hotkeys::{Hotkey, HotkeyDispatcher, KeyEvent};
use super::registry::{CapabilityRegistry, CapabilityState};
use super::error::EditorError;
use super::{Result, READY_EVENT};
use crate::object::ObjectId;
use crate::scene::{PointerButton, Scene, SceneEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Editor-wide options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub debug: bool,
}

/// Document-status record. Mutated via merge, never replaced wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorStatus {
    pub ready: bool,
    pub preview: bool,
    pub change: bool,
    pub can_edit: bool,
}

/// Partial status update; unset fields leave the record untouched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPatch {
    pub ready: Option<bool>,
    pub preview: Option<bool>,
    pub change: Option<bool>,
    pub can_edit: Option<bool>,
}

impl StatusPatch {
    pub fn ready(value: bool) -> Self {
        Self {
            ready: Some(value),
            ..Self::default()
        }
    }

    pub fn preview(value: bool) -> Self {
        Self {
            preview: Some(value),
            ..Self::default()
        }
    }

    pub fn change(value: bool) -> Self {
        Self {
            change: Some(value),
            ..Self::default()
        }
    }

    pub fn can_edit(value: bool) -> Self {
        Self {
            can_edit: Some(value),
            ..Self::default()
        }
    }
}

pub(crate) struct EditorInner {
    scene: RwLock<Option<Arc<dyn Scene>>>,
    status: RwLock<EditorStatus>,
    registry: CapabilityRegistry,
    custom_events: RwLock<Vec<String>>,
    hooks: HookBus,
    hotkeys: HotkeyDispatcher,
    bus: EventBus,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    options: EditorOptions,
}

impl EditorInner {
    fn scene(&self) -> Result<Arc<dyn Scene>> {
        self.scene
            .read()
            .unwrap()
            .clone()
            .ok_or(EditorError::NotInitialized)
    }

    fn update_status(&self, patch: StatusPatch) {
        let mut status = self.status.write().unwrap();
        if let Some(ready) = patch.ready {
            status.ready = ready;
        }
        if let Some(preview) = patch.preview {
            status.preview = preview;
        }
        if let Some(change) = patch.change {
            status.change = change;
        }
        if let Some(can_edit) = patch.can_edit {
            status.can_edit = can_edit;
        }
    }

    /// First registered, mounted capability exposing the context-menu
    /// role, in registration order.
    fn route_context_menu(&self, x: f64, y: f64) {
        for name in self.registry.names() {
            if self.registry.state(&name) != Some(CapabilityState::Mounted) {
                continue;
            }
            let Some(capability) = self.registry.get(&name) else {
                continue;
            };
            if let Some(menu) = capability.as_context_menu() {
                menu.show_menu(x, y);
                return;
            }
        }
    }
}

/// The capability container: owns the scene reference, the registry, the
/// hook bus and the hotkey dispatcher, and orchestrates registration,
/// mount and teardown of capabilities.
///
/// `init` and `register` spawn tasks and must run inside a Tokio runtime.
#[derive(Clone)]
pub struct Editor {
    inner: Arc<EditorInner>,
}

/// Weak back-reference capabilities hold; the container outlives all of
/// its capabilities.
#[derive(Clone)]
pub struct EditorHandle {
    inner: Weak<EditorInner>,
}

impl Editor {
    pub fn new() -> Self {
        Self::with_options(EditorOptions::default())
    }

    pub fn with_options(options: EditorOptions) -> Self {
        debug!("Creating editor");
        Self {
            inner: Arc::new(EditorInner {
                scene: RwLock::new(None),
                status: RwLock::new(EditorStatus::default()),
                registry: CapabilityRegistry::new(),
                custom_events: RwLock::new(Vec::new()),
                hooks: HookBus::new(),
                hotkeys: HotkeyDispatcher::new(),
                bus: EventBus::new(),
                listeners: Mutex::new(Vec::new()),
                options,
            }),
        }
    }

    pub fn options(&self) -> &EditorOptions {
        &self.inner.options
    }

    pub fn handle(&self) -> EditorHandle {
        EditorHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Bind the scene and install the baseline listeners: context-menu
    /// routing and the one-time "ready" status flip. The scene reference
    /// is set once; calling `init` again is a no-op.
    pub fn init(&self, scene: Arc<dyn Scene>) {
        {
            let mut slot = self.inner.scene.write().unwrap();
            if slot.is_some() {
                warn!("Editor is already initialized");
                return;
            }
            *slot = Some(scene.clone());
        }
        info!("Initializing editor");
        self.spawn_context_menu_router(scene);
        self.spawn_ready_listener();
    }

    fn spawn_context_menu_router(&self, scene: Arc<dyn Scene>) {
        let weak = Arc::downgrade(&self.inner);
        let mut events = scene.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let SceneEvent::PointerDown {
                    button: PointerButton::Secondary,
                    x,
                    y,
                } = event
                else {
                    continue;
                };
                let Some(inner) = weak.upgrade() else { break };
                inner.route_context_menu(x, y);
            }
        });
        self.inner.listeners.lock().unwrap().push(handle);
    }

    fn spawn_ready_listener(&self) {
        let weak = Arc::downgrade(&self.inner);
        // Subscribe now so a "ready" emitted right after init is not lost.
        let mut events = self.inner.bus.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.name == READY_EVENT => {
                        if let Some(inner) = weak.upgrade() {
                            inner.update_status(StatusPatch::ready(true));
                            debug!("Editor status set to ready");
                        }
                        break;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.inner.listeners.lock().unwrap().push(handle);
    }

    /// Register descriptors in list order, sequentially. Each capability
    /// is fully wired or not installed at all; the first failure aborts
    /// the remaining descriptors.
    pub fn register(&self, descriptors: Vec<CapabilityDescriptor>) -> Result<()> {
        for descriptor in descriptors {
            self.register_one(descriptor)?;
        }
        Ok(())
    }

    /// Construct, validate and wire one capability, then kick off its
    /// `mounted` off the registration path. Readiness is observed through
    /// `await_mounted`.
    pub fn register_one(&self, descriptor: CapabilityDescriptor) -> Result<()> {
        let scene = self.inner.scene()?;
        let capability = descriptor.construct(scene, self.handle())?;
        let name = capability.name().to_string();
        info!("Registering capability: {}", name);

        // Validation happens before any wiring so a rejected capability
        // leaves no trace in the registry, hook chains or dispatcher.
        if self.inner.registry.contains(&name) {
            return Err(EditorError::DuplicateCapability(name));
        }
        let events = capability.events();
        {
            let registered = self.inner.custom_events.read().unwrap();
            for (index, event) in events.iter().enumerate() {
                if registered.contains(event) || events[..index].contains(event) {
                    return Err(EditorError::DuplicateEvent {
                        capability: name,
                        event: event.clone(),
                    });
                }
            }
        }
        let mut hotkeys = Vec::new();
        for combination in capability.hotkeys() {
            hotkeys.push(combination.parse::<Hotkey>()?);
        }

        self.inner.registry.insert(capability.clone());
        self.inner.custom_events.write().unwrap().extend(events);
        for point in capability.hook_points() {
            self.inner.hooks.tap(point, &name, capability.clone());
        }
        for hotkey in hotkeys {
            self.inner.hotkeys.bind(hotkey, &name, capability.clone());
        }

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            match capability.mounted().await {
                Ok(()) => {
                    let Some(inner) = weak.upgrade() else { return };
                    inner.registry.mark_mounted(&name);
                    inner.bus.emit(&format!("{}:mounted", name), Value::Null);
                }
                Err(e) => {
                    error!("Capability {} failed to mount: {}", name, e);
                    if let Some(inner) = weak.upgrade() {
                        inner.registry.mark_failed(&name, &e.to_string());
                    }
                }
            }
        });
        Ok(())
    }

    /// Synchronous lookup; an absent capability is `None`, never an error.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.inner.registry.get(name)
    }

    /// Typed synchronous lookup.
    pub fn lookup_as<T: Capability + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.lookup(name)
            .and_then(|capability| capability.as_any_arc().downcast::<T>().ok())
    }

    /// Resolve once the named capability has mounted; immediate if it
    /// already did. `None` waits without limit.
    pub async fn await_mounted(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Arc<dyn Capability>> {
        self.inner.registry.await_mounted(name, timeout).await
    }

    pub fn capability_state(&self, name: &str) -> Option<CapabilityState> {
        self.inner.registry.state(name)
    }

    /// Names of registered capabilities in registration order.
    pub fn capability_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Invoke one hook chain in registration order.
    pub async fn run_hook(&self, point: HookPoint, payload: Value) -> Result<Value> {
        self.inner.hooks.run(point, payload).await
    }

    /// Handlers tapped into a hook chain, in invocation order.
    pub fn hook_owners(&self, point: HookPoint) -> Vec<String> {
        self.inner.hooks.chain_owners(point)
    }

    /// Hotkey combinations bound by the named capability.
    pub fn hotkeys_of(&self, owner: &str) -> Vec<Hotkey> {
        self.inner.hotkeys.bindings_for(owner)
    }

    /// Custom event names reserved so far, in registration order.
    pub fn custom_events(&self) -> Vec<String> {
        self.inner.custom_events.read().unwrap().clone()
    }

    /// Route a physical key event through the dispatcher. Returns the
    /// number of callbacks invoked.
    pub fn dispatch_key(&self, event: &KeyEvent) -> usize {
        self.inner.hotkeys.dispatch(event)
    }

    /// Make the object with the given id the sole active object and
    /// request a redraw. Unknown ids are a silent no-op.
    pub fn set_active(&self, id: ObjectId) {
        let Ok(scene) = self.inner.scene() else { return };
        if scene.set_active(id) {
            scene.request_redraw();
        }
    }

    pub fn update_status(&self, patch: StatusPatch) {
        self.inner.update_status(patch);
    }

    pub fn status(&self) -> EditorStatus {
        *self.inner.status.read().unwrap()
    }

    pub fn emit(&self, name: &str, payload: Value) {
        self.inner.bus.emit(name, payload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.inner.bus.subscribe()
    }

    /// Unwind every capability in registration order, then clear the
    /// registry, the custom-event set, every hook chain and the baseline
    /// listeners. One capability's teardown failure never blocks the
    /// others. After teardown the editor needs `init` again before use.
    pub async fn teardown(&self) {
        info!("Tearing down editor");
        for name in self.inner.registry.names() {
            let Some(capability) = self.inner.registry.get(&name) else {
                continue;
            };
            self.inner.hotkeys.unbind_owner(&name);
            if let Err(e) = capability.destroyed().await {
                error!("Capability {} failed to tear down: {}", name, e);
            }
        }
        self.inner.custom_events.write().unwrap().clear();
        self.inner.registry.clear();
        self.inner.hooks.clear();
        self.inner.hotkeys.clear();
        for listener in self.inner.listeners.lock().unwrap().drain(..) {
            listener.abort();
        }
        *self.inner.scene.write().unwrap() = None;
        *self.inner.status.write().unwrap() = EditorStatus::default();
        debug!("Editor teardown complete");
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorHandle {
    fn upgrade(&self) -> Result<Arc<EditorInner>> {
        self.inner.upgrade().ok_or(EditorError::Detached)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.registry.get(name))
    }

    pub fn lookup_as<T: Capability + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.lookup(name)
            .and_then(|capability| capability.as_any_arc().downcast::<T>().ok())
    }

    pub async fn await_mounted(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Arc<dyn Capability>> {
        let inner = self.upgrade()?;
        inner.registry.await_mounted(name, timeout).await
    }

    pub async fn run_hook(&self, point: HookPoint, payload: Value) -> Result<Value> {
        let inner = self.upgrade()?;
        inner.hooks.run(point, payload).await
    }

    pub fn emit(&self, name: &str, payload: Value) {
        if let Ok(inner) = self.upgrade() {
            inner.bus.emit(name, payload);
        }
    }

    pub fn update_status(&self, patch: StatusPatch) {
        if let Ok(inner) = self.upgrade() {
            inner.update_status(patch);
        }
    }

    pub fn status(&self) -> Option<EditorStatus> {
        self.inner
            .upgrade()
            .map(|inner| *inner.status.read().unwrap())
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<EditorEvent>> {
        self.inner.upgrade().map(|inner| inner.bus.subscribe())
    }
}
