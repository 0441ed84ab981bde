#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! HTTP surface over the settings store.
//!
//! Every route sits behind the access gate in [`http::access`]: requests
//! without identity are redirected, denied or let through read-only per the
//! permission configuration, and writes additionally need the update role.

pub mod error;
pub mod http;
pub mod models;
pub mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{ProblemDetails, ProblemInvalidParam, SettingView, SettingsListResponse};
pub use state::ApiState;
