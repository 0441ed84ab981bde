//! Permission resolution for the settings surface.
//!
//! # Design
//! - Identity lookup is pluggable: request attribute, session entry or a host closure.
//! - Bypass roles are checked before the per-permission lists; `*` admits any role.
//! - [`PermissionResolver::evaluate`] folds the unauthenticated action and the
//!   view/update checks into one [`AccessDecision`] for the HTTP gate.

use std::sync::Arc;

use http::{Extensions, HeaderMap, Method, Request, Uri, request::Parts};
use tracing::debug;

use crate::config::{IdentityResolver, PermissionConfig, UnauthenticatedAction};
use crate::identity::{Identity, RoleValue, SESSION_AUTH_KEY, SessionData};

/// Borrowed view of the request being authorized.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// HTTP method.
    pub method: &'a Method,
    /// Request target.
    pub uri: &'a Uri,
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Extensions populated by upstream middleware.
    pub extensions: &'a Extensions,
}

impl<'a> RequestContext<'a> {
    /// Context over a full request.
    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self {
            method: request.method(),
            uri: request.uri(),
            headers: request.headers(),
            extensions: request.extensions(),
        }
    }

    /// Context over request parts.
    #[must_use]
    pub fn from_parts(parts: &'a Parts) -> Self {
        Self {
            method: &parts.method,
            uri: &parts.uri,
            headers: &parts.headers,
            extensions: &parts.extensions,
        }
    }

    /// Whether the method writes state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            *self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }
}

/// Capability being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// List and view settings.
    View,
    /// Create, edit and delete settings.
    Update,
}

/// Settings actions mapped onto permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    /// Listing.
    Index,
    /// Single record view.
    View,
    /// Edit form.
    Edit,
    /// Persisting a change.
    Update,
}

impl SettingsAction {
    /// Permission the action requires.
    #[must_use]
    pub const fn permission(self) -> Permission {
        match self {
            Self::Index | Self::View => Permission::View,
            Self::Edit | Self::Update => Permission::Update,
        }
    }
}

/// Resolved behaviour for a request without identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthenticatedBehavior {
    /// Redirect to the given location.
    Redirect(String),
    /// Answer 401.
    Deny,
    /// Serve read-only.
    Allow,
}

/// Outcome of evaluating a request against the settings surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Send the client to `location`.
    Redirect {
        /// Login URL.
        location: String,
    },
    /// No identity and the surface denies anonymous access.
    Unauthorized,
    /// Identity present but lacking the view permission.
    Forbidden,
    /// Access granted; `can_update` says whether edit controls are shown.
    Granted {
        /// Whether the caller holds the update permission.
        can_update: bool,
    },
}

/// Evaluates identities against a [`PermissionConfig`].
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    config: Arc<PermissionConfig>,
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self::new(Arc::new(PermissionConfig::default()))
    }
}

impl PermissionResolver {
    /// Resolver over a shared configuration.
    #[must_use]
    pub const fn new(config: Arc<PermissionConfig>) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PermissionConfig {
        &self.config
    }

    /// Identity attached to the request, per the configured resolver.
    #[must_use]
    pub fn resolve_identity(&self, ctx: &RequestContext<'_>) -> Option<Identity> {
        match &self.config.identity_resolver {
            IdentityResolver::Attribute => ctx.extensions.get::<Identity>().cloned(),
            IdentityResolver::Session => ctx
                .extensions
                .get::<SessionData>()
                .and_then(|session| session.get(SESSION_AUTH_KEY))
                .filter(|value| !value.is_null())
                .cloned()
                .map(Identity::Document),
            IdentityResolver::Custom(resolve) => resolve(ctx),
        }
    }

    /// Whether the request carries an identity.
    #[must_use]
    pub fn is_authenticated(&self, ctx: &RequestContext<'_>) -> bool {
        self.resolve_identity(ctx).is_some()
    }

    /// Role of `identity` under the configured attribute.
    #[must_use]
    pub fn extract_role(&self, identity: Option<&Identity>) -> Option<RoleValue> {
        identity.and_then(|identity| identity.role(&self.config.role_attribute))
    }

    /// Whether `identity` holds `permission`.
    ///
    /// Bypass roles are checked first, then a `*` entry grants any identity
    /// that carries a role.
    #[must_use]
    pub fn authorize(&self, identity: Option<&Identity>, permission: Permission) -> bool {
        let Some(role) = self.extract_role(identity) else {
            return false;
        };
        if role.intersects(&self.config.bypass_roles) {
            return true;
        }
        let allowed = match permission {
            Permission::View => &self.config.view_roles,
            Permission::Update => &self.config.update_roles,
        };
        if allowed.iter().any(|entry| entry == "*") {
            return true;
        }
        role.intersects(allowed)
    }

    /// Whether the request's identity holds `permission`.
    #[must_use]
    pub fn has_permission(&self, ctx: &RequestContext<'_>, permission: Permission) -> bool {
        self.authorize(self.resolve_identity(ctx).as_ref(), permission)
    }

    /// Whether the request may list and view settings.
    #[must_use]
    pub fn can_view(&self, ctx: &RequestContext<'_>) -> bool {
        self.has_permission(ctx, Permission::View)
    }

    /// Whether the request may change settings.
    #[must_use]
    pub fn can_update(&self, ctx: &RequestContext<'_>) -> bool {
        self.has_permission(ctx, Permission::Update)
    }

    /// Whether `identity` may perform `action`.
    #[must_use]
    pub fn authorize_action(&self, identity: Option<&Identity>, action: SettingsAction) -> bool {
        self.authorize(identity, action.permission())
    }

    /// Configured behaviour for requests without identity.
    #[must_use]
    pub fn unauthenticated_behavior(&self) -> UnauthenticatedBehavior {
        match self.config.unauthenticated_action {
            UnauthenticatedAction::Redirect => {
                UnauthenticatedBehavior::Redirect(self.config.login_url.to_path())
            }
            UnauthenticatedAction::Deny => UnauthenticatedBehavior::Deny,
            UnauthenticatedAction::Allow => UnauthenticatedBehavior::Allow,
        }
    }

    /// Decide how the settings surface answers this request.
    #[must_use]
    pub fn evaluate(&self, ctx: &RequestContext<'_>) -> AccessDecision {
        let Some(identity) = self.resolve_identity(ctx) else {
            debug!(path = %ctx.uri.path(), "settings request without identity");
            return match self.unauthenticated_behavior() {
                UnauthenticatedBehavior::Redirect(location) => {
                    AccessDecision::Redirect { location }
                }
                UnauthenticatedBehavior::Deny => AccessDecision::Unauthorized,
                UnauthenticatedBehavior::Allow => AccessDecision::Granted { can_update: false },
            };
        };
        if !self.authorize(Some(&identity), Permission::View) {
            debug!(path = %ctx.uri.path(), "settings view permission denied");
            return AccessDecision::Forbidden;
        }
        AccessDecision::Granted {
            can_update: self.authorize(Some(&identity), Permission::Update),
        }
    }
}
