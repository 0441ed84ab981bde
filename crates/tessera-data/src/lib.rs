#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Shared data access layer for Tessera: migrations and the `app_settings`
//! stored procedures.

pub mod error;
pub mod settings;

pub use error::{DataError, Result as DataResult};
pub use settings::{NewSettingRow, SettingRow};
