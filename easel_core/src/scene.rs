use crate::object::{Document, ObjectId, SceneObject};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

const SCENE_EVENT_CAPACITY: usize = 128;

/// Which pointer button produced an interaction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// Primitive interaction events the scene fires at the kernel and at
/// capabilities that subscribe directly.
#[derive(Debug, Clone)]
pub enum SceneEvent {
    PointerDown { button: PointerButton, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { button: PointerButton, x: f64, y: f64 },
    SelectionChanged { ids: Vec<ObjectId> },
    ObjectAdded { id: ObjectId },
    ObjectModified { id: ObjectId },
    ObjectRemoved { id: ObjectId },
}

/// The external collaborator the kernel and capabilities operate on: a
/// retained object graph with a selection set, a redraw request line and
/// a stream of interaction events.
pub trait Scene: Send + Sync {
    fn add(&self, object: SceneObject);
    fn remove(&self, id: ObjectId) -> Option<SceneObject>;
    fn get(&self, id: ObjectId) -> Option<SceneObject>;
    fn objects(&self) -> Vec<SceneObject>;

    /// Replace the object with the same id. Returns false if absent.
    fn replace(&self, object: SceneObject) -> bool;

    /// Make the object the sole active selection. Returns false if absent.
    fn set_active(&self, id: ObjectId) -> bool;
    fn discard_active(&self);
    fn active(&self) -> Vec<ObjectId>;

    fn request_redraw(&self);

    fn to_document(&self) -> Document;
    fn load_document(&self, document: Document);

    fn subscribe(&self) -> broadcast::Receiver<SceneEvent>;
}

/// In-process reference scene used by tests and the headless CLI.
pub struct MemoryScene {
    objects: Mutex<Vec<SceneObject>>,
    active: Mutex<Vec<ObjectId>>,
    redraws: AtomicU64,
    events: broadcast::Sender<SceneEvent>,
}

impl MemoryScene {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SCENE_EVENT_CAPACITY);
        Self {
            objects: Mutex::new(Vec::new()),
            active: Mutex::new(Vec::new()),
            redraws: AtomicU64::new(0),
            events,
        }
    }

    /// Number of redraws requested so far.
    pub fn redraw_count(&self) -> u64 {
        self.redraws.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fire(&self, event: SceneEvent) {
        let _ = self.events.send(event);
    }

    /// Host-side injection of a pointer-down interaction.
    pub fn pointer_down(&self, button: PointerButton, x: f64, y: f64) {
        self.fire(SceneEvent::PointerDown { button, x, y });
    }

    pub fn pointer_up(&self, button: PointerButton, x: f64, y: f64) {
        self.fire(SceneEvent::PointerUp { button, x, y });
    }

    pub fn pointer_move(&self, x: f64, y: f64) {
        self.fire(SceneEvent::PointerMove { x, y });
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for MemoryScene {
    fn add(&self, object: SceneObject) {
        let id = object.id;
        self.objects.lock().unwrap().push(object);
        self.fire(SceneEvent::ObjectAdded { id });
    }

    fn remove(&self, id: ObjectId) -> Option<SceneObject> {
        let removed = {
            let mut objects = self.objects.lock().unwrap();
            let index = objects.iter().position(|object| object.id == id)?;
            objects.remove(index)
        };
        self.active.lock().unwrap().retain(|active| *active != id);
        self.fire(SceneEvent::ObjectRemoved { id });
        Some(removed)
    }

    fn get(&self, id: ObjectId) -> Option<SceneObject> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|object| object.id == id)
            .cloned()
    }

    fn objects(&self) -> Vec<SceneObject> {
        self.objects.lock().unwrap().clone()
    }

    fn replace(&self, object: SceneObject) -> bool {
        let id = object.id;
        {
            let mut objects = self.objects.lock().unwrap();
            let Some(slot) = objects.iter_mut().find(|existing| existing.id == id) else {
                return false;
            };
            *slot = object;
        }
        self.fire(SceneEvent::ObjectModified { id });
        true
    }

    fn set_active(&self, id: ObjectId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        *self.active.lock().unwrap() = vec![id];
        self.fire(SceneEvent::SelectionChanged { ids: vec![id] });
        true
    }

    fn discard_active(&self) {
        let mut active = self.active.lock().unwrap();
        if active.is_empty() {
            return;
        }
        active.clear();
        drop(active);
        self.fire(SceneEvent::SelectionChanged { ids: Vec::new() });
    }

    fn active(&self) -> Vec<ObjectId> {
        self.active.lock().unwrap().clone()
    }

    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::SeqCst);
    }

    fn to_document(&self) -> Document {
        Document::new(self.objects())
    }

    fn load_document(&self, document: Document) {
        *self.objects.lock().unwrap() = document.objects;
        self.active.lock().unwrap().clear();
    }

    fn subscribe(&self) -> broadcast::Receiver<SceneEvent> {
        self.events.subscribe()
    }
}
