//! Chat Message Model
//!
//! Information Hiding:
//! - Role tags used in stored documents are hidden behind the `Role` enum
//! - Unknown tags survive a read/write cycle untouched

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Who produced a conversational turn.
///
/// Equality and hashing go by stored tag, so `Role::Other("ai")` and
/// `Role::Ai` are the same role.
#[derive(Debug, Clone)]
pub enum Role {
    Human,
    Ai,
    System,
    Generic,
    Tool,
    Function,
    /// A tag this crate does not know, kept verbatim
    Other(String),
}

impl Role {
    /// Stable tag written to storage
    pub fn as_tag(&self) -> &str {
        match self {
            Role::Human => "human",
            Role::Ai => "ai",
            Role::System => "system",
            Role::Generic => "generic",
            Role::Tool => "tool",
            Role::Function => "function",
            Role::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "human" => Role::Human,
            "ai" => Role::Ai,
            "system" => Role::System,
            "generic" => Role::Generic,
            "tool" => Role::Tool,
            "function" => Role::Function,
            other => Role::Other(other.to_string()),
        }
    }

    /// Role for an arbitrary tag; known tags map to their own variant
    pub fn custom(tag: impl AsRef<str>) -> Self {
        Role::from_tag(tag.as_ref())
    }

    /// Same role with `Other` collapsed onto a known variant where possible
    pub fn normalized(self) -> Self {
        match self {
            Role::Other(tag) => Role::from_tag(&tag),
            known => known,
        }
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.as_tag() == other.as_tag()
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_tag().hash(state);
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Role::from_tag(&tag))
    }
}

/// One conversational turn. Ordering is positional only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Speaker name for generic messages, function name or tool call id otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.normalized(),
            content: content.into(),
            name: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn generic(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Generic, content).with_name(name)
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content).with_name(call_id)
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Function, content).with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
