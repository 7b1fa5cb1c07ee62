pub mod capabilities;
pub mod kernel;
pub mod object;
pub mod scene;

pub use capabilities::{
    ContextMenuCapability, DeleteHotkeyCapability, DocumentCapability, HistoryCapability,
    MoveHotkeyCapability, WorkspaceCapability,
};
pub use kernel::{
    Capability, CapabilityDescriptor, CapabilityState, ContextMenuHandler, Editor, EditorError,
    EditorEvent, EditorHandle, EditorOptions, EditorStatus, HookPoint, Hotkey, KeyEvent, KeyPhase,
    StatusPatch, READY_EVENT,
};
pub use object::{CustomData, Document, ObjectId, SceneObject};
pub use scene::{MemoryScene, PointerButton, Scene, SceneEvent};
