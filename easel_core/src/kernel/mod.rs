mod capability;
mod editor;
mod error;
mod events;
mod hooks;
mod hotkeys;
mod registry;

#[cfg(test)]
mod tests;

pub use capability::{Capability, CapabilityDescriptor, ContextMenuHandler};
pub use editor::{Editor, EditorHandle, EditorOptions, EditorStatus, StatusPatch};
pub use error::EditorError;
pub use events::{EditorEvent, EventBus};
pub use hooks::{HookBus, HookPoint};
pub use hotkeys::{Hotkey, HotkeyDispatcher, KeyEvent, KeyPhase};
pub use registry::{CapabilityRegistry, CapabilityState};

// Re-export common types that consumers will need
pub type Result<T> = std::result::Result<T, EditorError>;

// Constants
/// Announced on the bus once the workspace capability finishes setup.
pub const READY_EVENT: &str = "ready";
