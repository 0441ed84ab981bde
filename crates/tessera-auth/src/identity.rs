//! Identity shapes and role values.
//!
//! An identity is either a JSON document (what session stores and most
//! authentication layers hand over) or a typed subject implementing
//! [`RoleSource`]. Role lookup follows a dotted path through the document.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Session key holding the authenticated identity.
pub const SESSION_AUTH_KEY: &str = "Auth";

/// Role(s) carried by an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleValue {
    /// A single role.
    Single(String),
    /// Several roles; any one of them may grant access.
    Many(Vec<String>),
}

impl RoleValue {
    /// Whether any held role appears in `allowed`.
    #[must_use]
    pub fn intersects(&self, allowed: &[String]) -> bool {
        match self {
            Self::Single(role) => allowed.iter().any(|entry| entry == role),
            Self::Many(roles) => roles
                .iter()
                .any(|role| allowed.iter().any(|entry| entry == role)),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self::Many(
                items.iter().filter_map(scalar_role).collect(),
            )),
            other => scalar_role(other).map(Self::Single),
        }
    }
}

// Numeric and boolean roles compare by their string form.
fn scalar_role(value: &Value) -> Option<String> {
    match value {
        Value::String(role) => Some(role.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Typed identity that knows how to report its own role.
pub trait RoleSource: Send + Sync {
    /// Role found under the dotted `attribute` path, if any.
    fn role(&self, attribute: &str) -> Option<RoleValue>;
}

/// An authenticated principal.
#[derive(Clone)]
pub enum Identity {
    /// JSON document; roles are looked up by dotted path.
    Document(Value),
    /// Typed subject answering role lookups itself.
    Subject(Arc<dyn RoleSource>),
}

impl Identity {
    /// Identity wrapping a typed subject.
    pub fn subject(source: impl RoleSource + 'static) -> Self {
        Self::Subject(Arc::new(source))
    }

    /// Role under the dotted `attribute` path.
    #[must_use]
    pub fn role(&self, attribute: &str) -> Option<RoleValue> {
        match self {
            Self::Document(document) => {
                lookup_path(document, attribute).and_then(RoleValue::from_json)
            }
            Self::Subject(source) => source.role(attribute),
        }
    }
}

impl From<Value> for Identity {
    fn from(value: Value) -> Self {
        Self::Document(value)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(document) => f.debug_tuple("Document").field(document).finish(),
            Self::Subject(_) => f.write_str("Subject(..)"),
        }
    }
}

fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(document, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Session storage attached to a request by the host's session layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    values: HashMap<String, Value>,
}

impl SessionData {
    /// Empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session holding `identity` under [`SESSION_AUTH_KEY`].
    #[must_use]
    pub fn authenticated(identity: Value) -> Self {
        let mut session = Self::new();
        session.insert(SESSION_AUTH_KEY, identity);
        session
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store `value` under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}
