use super::capability::Capability;
use super::error::EditorError;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Physical key event phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Down,
    Up,
}

/// A physical key event routed through the dispatcher.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub phase: KeyPhase,
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn from_hotkey(hotkey: &Hotkey, phase: KeyPhase) -> Self {
        Self {
            phase,
            key: hotkey.key.clone(),
            ctrl: hotkey.ctrl,
            shift: hotkey.shift,
            alt: hotkey.alt,
            meta: hotkey.meta,
        }
    }

    pub fn down(hotkey: &Hotkey) -> Self {
        Self::from_hotkey(hotkey, KeyPhase::Down)
    }

    pub fn up(hotkey: &Hotkey) -> Self {
        Self::from_hotkey(hotkey, KeyPhase::Up)
    }
}

/// A normalized key combination, e.g. `ctrl+shift+z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub key: String,
}

impl Hotkey {
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.ctrl == event.ctrl
            && self.shift == event.shift
            && self.alt == event.alt
            && self.meta == event.meta
            && self.key == event.key.to_ascii_lowercase()
    }
}

impl FromStr for Hotkey {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hotkey = Hotkey {
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            key: String::new(),
        };
        for part in s.split('+') {
            let part = part.trim().to_ascii_lowercase();
            match part.as_str() {
                "ctrl" | "control" => hotkey.ctrl = true,
                "shift" => hotkey.shift = true,
                "alt" | "option" => hotkey.alt = true,
                "meta" | "cmd" | "⌘" => hotkey.meta = true,
                "" => return Err(EditorError::InvalidHotkey(s.to_string())),
                key => {
                    if !hotkey.key.is_empty() {
                        return Err(EditorError::InvalidHotkey(s.to_string()));
                    }
                    hotkey.key = key.to_string();
                }
            }
        }
        if hotkey.key.is_empty() {
            return Err(EditorError::InvalidHotkey(s.to_string()));
        }
        Ok(hotkey)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        if self.meta {
            write!(f, "meta+")?;
        }
        write!(f, "{}", self.key)
    }
}

struct Binding {
    hotkey: Hotkey,
    owner: String,
    capability: Arc<dyn Capability>,
}

/// Global key-combination router. Bindings fan out in bind order; each
/// callback decides for itself whether the event phase is relevant.
pub struct HotkeyDispatcher {
    bindings: Mutex<Vec<Binding>>,
}

impl HotkeyDispatcher {
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(Vec::new()),
        }
    }

    pub fn bind(&self, hotkey: Hotkey, owner: &str, capability: Arc<dyn Capability>) {
        debug!("Binding hotkey {} for {}", hotkey, owner);
        self.bindings.lock().unwrap().push(Binding {
            hotkey,
            owner: owner.to_string(),
            capability,
        });
    }

    /// Remove every binding the named capability registered, leaving other
    /// owners' bindings to the same combinations untouched.
    pub fn unbind_owner(&self, owner: &str) {
        self.bindings
            .lock()
            .unwrap()
            .retain(|binding| binding.owner != owner);
    }

    pub fn bindings_for(&self, owner: &str) -> Vec<Hotkey> {
        self.bindings
            .lock()
            .unwrap()
            .iter()
            .filter(|binding| binding.owner == owner)
            .map(|binding| binding.hotkey.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.bindings.lock().unwrap().clear();
    }

    /// Route one key event to every binding matching its combination, in
    /// bind order. Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &KeyEvent) -> usize {
        // Snapshot first so a callback may bind/unbind without deadlock.
        let matched: Vec<(Hotkey, Arc<dyn Capability>)> = self
            .bindings
            .lock()
            .unwrap()
            .iter()
            .filter(|binding| binding.hotkey.matches(event))
            .map(|binding| (binding.hotkey.clone(), binding.capability.clone()))
            .collect();

        for (hotkey, capability) in &matched {
            capability.hotkey_event(hotkey, event);
        }
        matched.len()
    }
}

impl Default for HotkeyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
