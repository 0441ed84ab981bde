//! Permission configuration with built-in defaults and host overrides.
//!
//! Overrides merge field by field: a host that only sets `viewRoles` keeps
//! the default update roles, bypass roles and login URL.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::resolver::RequestContext;

/// What happens when a request carries no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnauthenticatedAction {
    /// Send the client to the login URL.
    #[default]
    Redirect,
    /// Answer 401.
    Deny,
    /// Serve the page read-only.
    Allow,
}

/// Login target for unauthenticated redirects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LoginUrl {
    /// Literal path or absolute URL.
    Path(String),
    /// Controller/action route, rendered as `/{plugin}/{controller}/{action}`.
    Route {
        /// Controller segment.
        controller: String,
        /// Action segment.
        action: String,
        /// Optional plugin prefix.
        #[serde(default)]
        plugin: Option<String>,
    },
}

impl Default for LoginUrl {
    fn default() -> Self {
        Self::Route {
            controller: "Users".into(),
            action: "login".into(),
            plugin: None,
        }
    }
}

impl LoginUrl {
    /// Location header value for this target.
    #[must_use]
    pub fn to_path(&self) -> String {
        match self {
            Self::Path(path) => path.clone(),
            Self::Route {
                controller,
                action,
                plugin,
            } => {
                let mut path = String::new();
                if let Some(plugin) = plugin.as_deref().filter(|p| !p.is_empty()) {
                    path.push('/');
                    path.push_str(&plugin.to_ascii_lowercase());
                }
                path.push('/');
                path.push_str(&controller.to_ascii_lowercase());
                path.push('/');
                path.push_str(action);
                path
            }
        }
    }
}

type CustomResolver = Arc<dyn Fn(&RequestContext<'_>) -> Option<Identity> + Send + Sync>;

/// Where the current identity is read from.
#[derive(Clone, Default)]
pub enum IdentityResolver {
    /// An [`Identity`] request extension set by the host's auth layer.
    #[default]
    Attribute,
    /// The `Auth` entry of a [`SessionData`](crate::SessionData) extension.
    Session,
    /// Host-supplied lookup.
    Custom(CustomResolver),
}

impl IdentityResolver {
    /// Resolver backed by a host function.
    pub fn custom<F>(resolve: F) -> Self
    where
        F: Fn(&RequestContext<'_>) -> Option<Identity> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(resolve))
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => f.write_str("Attribute"),
            Self::Session => f.write_str("Session"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for IdentityResolver {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "attribute" => Ok(Self::Attribute),
            "session" => Ok(Self::Session),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["attribute", "session"],
            )),
        }
    }
}

/// Effective authorization settings.
#[derive(Debug, Clone)]
pub struct PermissionConfig {
    /// Dotted path to the role inside the identity.
    pub role_attribute: String,
    /// Roles allowed to list and view settings.
    pub view_roles: Vec<String>,
    /// Roles allowed to create, edit and delete settings.
    pub update_roles: Vec<String>,
    /// Roles that pass every check.
    pub bypass_roles: Vec<String>,
    /// Behaviour for requests without an identity.
    pub unauthenticated_action: UnauthenticatedAction,
    /// Redirect target for [`UnauthenticatedAction::Redirect`].
    pub login_url: LoginUrl,
    /// Identity lookup strategy.
    pub identity_resolver: IdentityResolver,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            role_attribute: "role".into(),
            view_roles: roles(&["admin", "super_admin"]),
            update_roles: roles(&["admin", "super_admin"]),
            bypass_roles: roles(&["super_admin"]),
            unauthenticated_action: UnauthenticatedAction::Redirect,
            login_url: LoginUrl::default(),
            identity_resolver: IdentityResolver::Attribute,
        }
    }
}

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Partial configuration supplied by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionOverrides {
    /// See [`PermissionConfig::role_attribute`].
    pub role_attribute: Option<String>,
    /// See [`PermissionConfig::view_roles`].
    pub view_roles: Option<Vec<String>>,
    /// See [`PermissionConfig::update_roles`].
    pub update_roles: Option<Vec<String>>,
    /// See [`PermissionConfig::bypass_roles`].
    pub bypass_roles: Option<Vec<String>>,
    /// See [`PermissionConfig::unauthenticated_action`].
    pub unauthenticated_action: Option<UnauthenticatedAction>,
    /// See [`PermissionConfig::login_url`].
    pub login_url: Option<LoginUrl>,
    /// See [`PermissionConfig::identity_resolver`].
    pub identity_resolver: Option<IdentityResolver>,
}

impl PermissionConfig {
    /// Defaults with `overrides` applied field by field.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSetting`] when the role attribute is blank.
    pub fn merged(overrides: PermissionOverrides) -> AuthResult<Self> {
        let defaults = Self::default();
        let role_attribute = overrides
            .role_attribute
            .unwrap_or(defaults.role_attribute);
        if role_attribute.trim().is_empty() {
            return Err(AuthError::InvalidSetting {
                field: "roleAttribute",
                reason: "must not be empty",
            });
        }
        Ok(Self {
            role_attribute,
            view_roles: overrides.view_roles.unwrap_or(defaults.view_roles),
            update_roles: overrides.update_roles.unwrap_or(defaults.update_roles),
            bypass_roles: overrides.bypass_roles.unwrap_or(defaults.bypass_roles),
            unauthenticated_action: overrides
                .unauthenticated_action
                .unwrap_or(defaults.unauthenticated_action),
            login_url: overrides.login_url.unwrap_or(defaults.login_url),
            identity_resolver: overrides
                .identity_resolver
                .unwrap_or(defaults.identity_resolver),
        })
    }

    /// Parse YAML overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Yaml`] on malformed input.
    pub fn from_yaml_str(raw: &str) -> AuthResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let overrides = serde_yaml::from_str(raw).map_err(|source| AuthError::Yaml { source })?;
        Self::merged(overrides)
    }

    /// Parse JSON overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Json`] on malformed input.
    pub fn from_json_str(raw: &str) -> AuthResult<Self> {
        let overrides = serde_json::from_str(raw).map_err(|source| AuthError::Json { source })?;
        Self::merged(overrides)
    }

    /// Load overrides from `path`; `.json` files parse as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] when the file cannot be read, or a parse error.
    pub fn load(path: &Path) -> AuthResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_yaml_str(&raw)
        }
    }
}
