#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Telemetry primitives shared across the Tessera workspace.
//!
//! Centralises subscriber installation and the request-id layers so the API
//! and the host binary log the same way.

pub mod error;
pub mod init;
pub mod layers;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{
    REQUEST_ID_HEADER, propagate_request_id_layer, set_request_id_layer,
};
