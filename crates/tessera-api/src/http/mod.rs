//! HTTP surface modules.

/// Access gate middleware.
pub mod access;
/// Shared header names, problem URIs and notices.
pub mod constants;
/// Problem response helpers.
pub mod errors;
/// Redirect-with-notice responses.
pub mod flash;
/// Router construction and server host.
pub mod router;
/// Settings handlers.
pub mod settings;
