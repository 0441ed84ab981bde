#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Authorization for the settings surface, independent of how the host authenticates.
//!
//! Layout: `config.rs` (`PermissionConfig` and overrides), `identity.rs`
//! (identity shapes and role values), `resolver.rs` (`PermissionResolver`
//! and access decisions), `error.rs`.

pub mod config;
pub mod error;
pub mod identity;
pub mod resolver;

pub use config::{
    IdentityResolver, LoginUrl, PermissionConfig, PermissionOverrides, UnauthenticatedAction,
};
pub use error::{AuthError, AuthResult};
pub use identity::{Identity, RoleSource, RoleValue, SESSION_AUTH_KEY, SessionData};
pub use resolver::{
    AccessDecision, Permission, PermissionResolver, RequestContext, SettingsAction,
    UnauthenticatedBehavior,
};
