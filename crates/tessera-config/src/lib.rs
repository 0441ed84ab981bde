#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Runtime settings store: key gating, value codec, persistence and the live registry.
//!
//! Layout: `policy.rs` (key allow/block rules), `codec.rs` (casting and
//! encryption), `model.rs` (records and inputs), `repository.rs` (storage
//! backends), `registry.rs` (atomically swapped snapshot and post-reload hooks),
//! `service.rs` (`ConfigStore` write path), `loader.rs` (host environment).
//!
//! # Design
//! - Writes go through [`ConfigStore`]; readers only ever see [`ConfigRegistry`] snapshots.
//! - The key policy runs at validation, at the persistence boundary and again
//!   on every reload.
//! - Storage is behind [`SettingsRepository`] so the store runs on Postgres or in memory.

pub mod codec;
pub mod error;
pub mod loader;
pub mod model;
pub mod policy;
pub mod registry;
pub mod repository;
pub mod service;

pub use codec::{DecryptFailure, EncryptionKey, ValueCodec, cast_tagged, cast_value};
pub use error::{ConfigError, ConfigResult, DecodeError};
pub use loader::HostSettings;
pub use model::{
    MASKED_VALUE, NewSetting, SettingInput, SettingRecord, SettingType, SettingsFilter,
    SettingsPage, TypedValue, UpdateOutcome,
};
pub use policy::KeyPolicy;
pub use registry::{
    AppEnvironment, AppliedEnvironment, ConfigRegistry, ConfigRegistryBuilder, EnvironmentHook,
    RegistryDraft, RegistrySnapshot, ReloadReport, RequestOrigin, SkipReason, SkippedSetting,
};
pub use repository::{MemorySettingsRepository, PgSettingsRepository, SettingsRepository};
pub use service::ConfigStore;
