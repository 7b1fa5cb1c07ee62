mod context_menu;
mod delete_hotkey;
mod document;
mod history;
mod move_hotkey;
mod workspace;

pub use context_menu::{ContextMenuCapability, MenuState};
pub use delete_hotkey::DeleteHotkeyCapability;
pub use document::DocumentCapability;
pub use history::{HistoryCapability, HistoryOptions};
pub use move_hotkey::{MoveHotkeyCapability, MoveOptions};
pub use workspace::{WorkspaceCapability, WorkspaceOptions};

use crate::kernel::{CapabilityDescriptor, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize an options bag, treating an absent (null) bag as defaults.
pub(crate) fn parse_options<T>(options: Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if options.is_null() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_value(options)?)
    }
}

/// Descriptors for the built-in capability set, in registration order.
pub fn default_set() -> Vec<CapabilityDescriptor> {
    vec![
        WorkspaceCapability::descriptor(Value::Null),
        DocumentCapability::descriptor(),
        HistoryCapability::descriptor(Value::Null),
        ContextMenuCapability::descriptor(),
        DeleteHotkeyCapability::descriptor(),
        MoveHotkeyCapability::descriptor(Value::Null),
    ]
}
