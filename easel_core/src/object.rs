use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// The custom-data kind marking the distinguished workspace object.
pub const WORKSPACE_KIND: &str = "workspace";

/// Identity of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Custom-data bag higher-level capabilities use to recognize and
/// regenerate composite objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemes: Option<Vec<Value>>,
}

impl CustomData {
    pub fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            data: None,
            schemes: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A drawable object in the scene's object graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    #[serde(default)]
    pub id: ObjectId,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub angle: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,

    #[serde(default = "default_true")]
    pub selectable: bool,

    #[serde(default = "default_true")]
    pub can_remove: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomData>,
}

impl SceneObject {
    pub fn new(kind: &str) -> Self {
        Self {
            id: ObjectId::new(),
            kind: kind.to_string(),
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            fill: None,
            selectable: true,
            can_remove: true,
            custom: None,
        }
    }

    /// Whether this is the distinguished workspace object.
    pub fn is_workspace(&self) -> bool {
        self.custom
            .as_ref()
            .map(|custom| custom.kind == WORKSPACE_KIND)
            .unwrap_or(false)
    }
}

fn default_version() -> String {
    Document::FORMAT_VERSION.to_string()
}

/// Serialized form of a scene. The kernel passes this through the
/// import/save hook chains as an opaque payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,

    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

impl Document {
    pub const FORMAT_VERSION: &'static str = "1.0.0";

    pub fn new(objects: Vec<SceneObject>) -> Self {
        Self {
            version: Self::FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            objects,
        }
    }
}
