//! Allow/block rules for configuration keys.
//!
//! The blocklist is consulted first, so no allowlist entry can re-admit a
//! blocked key. Anything matching neither list is denied.

use std::sync::Arc;

/// Keys (and key prefixes) that may never be stored or applied.
pub const DEFAULT_BLOCKED: &[&str] = &[
    "Security.",
    "Datasources.",
    "EmailTransport.default.password",
    "EmailTransport.default.username",
    "debug",
    "Error.",
    "Session.",
];

/// Key prefixes that may be stored and applied.
pub const DEFAULT_ALLOWED: &[&str] = &[
    "App.",
    "Mail.",
    "EmailTransport.default.host",
    "EmailTransport.default.port",
    "EmailTransport.default.tls",
    "EmailTransport.default.timeout",
    "Cache.",
    "Log.",
    "Asset.",
    "Custom.",
];

/// Immutable key gate shared by validation, persistence and reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    blocked: Arc<[String]>,
    allowed: Arc<[String]>,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED.iter().copied(), DEFAULT_ALLOWED.iter().copied())
    }
}

impl KeyPolicy {
    /// Build a policy from explicit block and allow prefixes.
    pub fn new<B, A>(blocked: B, allowed: A) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            blocked: blocked.into_iter().map(Into::into).collect(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` may be stored and published.
    #[must_use]
    pub fn is_allowed(&self, key: &str) -> bool {
        if key.is_empty() || self.is_blocked(key) {
            return false;
        }
        self.allowed.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Whether `key` equals or starts with a blocked entry.
    #[must_use]
    pub fn is_blocked(&self, key: &str) -> bool {
        self.blocked
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Blocked prefixes in declaration order.
    #[must_use]
    pub fn blocked_prefixes(&self) -> &[String] {
        &self.blocked
    }

    /// Allowed prefixes in declaration order.
    #[must_use]
    pub fn allowed_prefixes(&self) -> &[String] {
        &self.allowed
    }
}
