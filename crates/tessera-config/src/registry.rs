//! Live, process-wide configuration state.
//!
//! A reload reads every stored record, re-applies the key policy, decrypts and
//! casts values, runs the environment hooks and then swaps the result in as a
//! new immutable snapshot. Readers never observe a partially rebuilt registry.
//!
//! # Design
//! - A bad record (blocked key, undecryptable or uncastable value) is skipped
//!   and reported in [`ReloadReport`]; only a storage read failure aborts.
//! - The revision moves only when the published values or environment change.
//! - Reloads are serialised; reads are lock-free through `ArcSwap`.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::codec::{DecryptFailure, ValueCodec, cast_value};
use crate::error::ConfigResult;
use crate::model::TypedValue;
use crate::policy::KeyPolicy;
use crate::repository::SettingsRepository;

/// Cache entries shortened while the host runs in debug mode.
pub const DEBUG_CACHE_KEYS: &[&str] = &[
    "Cache._cake_model_.duration",
    "Cache._cake_translations_.duration",
];

/// Duration published for [`DEBUG_CACHE_KEYS`] in debug mode.
pub const DEBUG_CACHE_DURATION: &str = "+2 minutes";

static TIMEZONE_NAME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(UTC|GMT|[A-Za-z][A-Za-z_\-]*(/[A-Za-z0-9][A-Za-z0-9_+\-]*){1,2})$").ok()
});

/// Environment values derived after each reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEnvironment {
    /// IANA timezone name.
    pub timezone: String,
    /// Character encoding.
    pub encoding: String,
    /// Default locale.
    pub locale: String,
    /// Absolute base URL, when configured or derivable.
    pub full_base_url: Option<String>,
    /// Whether debug cache durations were applied.
    pub debug_cache: bool,
}

impl Default for AppliedEnvironment {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            encoding: "UTF-8".to_string(),
            locale: "en_US".to_string(),
            full_base_url: None,
            debug_cache: false,
        }
    }
}

/// Host and scheme of the request currently served by the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    /// `Host` header value.
    pub host: String,
    /// Whether the connection itself is TLS.
    pub tls: bool,
    /// `X-Forwarded-Proto` header value, if present.
    pub forwarded_proto: Option<String>,
}

impl RequestOrigin {
    /// Scheme for this origin; forwarded headers count only when trusted.
    #[must_use]
    pub fn scheme(&self, trust_proxy: bool) -> &'static str {
        let forwarded_https = trust_proxy
            && self
                .forwarded_proto
                .as_deref()
                .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        if self.tls || forwarded_https {
            "https"
        } else {
            "http"
        }
    }
}

/// Mutable view handed to environment hooks before publication.
#[derive(Debug)]
pub struct RegistryDraft {
    values: BTreeMap<String, TypedValue>,
    environment: AppliedEnvironment,
    origin: Option<Arc<RequestOrigin>>,
}

impl RegistryDraft {
    fn new(base: BTreeMap<String, TypedValue>, origin: Option<Arc<RequestOrigin>>) -> Self {
        Self {
            values: base,
            environment: AppliedEnvironment::default(),
            origin,
        }
    }

    /// Current value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.values.get(key)
    }

    /// Non-empty string value for `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(TypedValue::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Boolean value for `key`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(TypedValue::as_bool)
    }

    /// Publish `value` under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: TypedValue) {
        self.values.insert(key.into(), value);
    }

    /// Origin of the most recently observed request.
    #[must_use]
    pub fn origin(&self) -> Option<&RequestOrigin> {
        self.origin.as_deref()
    }

    /// Environment values to publish with the snapshot.
    pub fn environment_mut(&mut self) -> &mut AppliedEnvironment {
        &mut self.environment
    }
}

/// Post-reload step that derives environment state from published values.
pub trait EnvironmentHook: Send + Sync {
    /// Identifier for logs.
    fn name(&self) -> &'static str;
    /// Adjust the draft before it is published.
    fn apply(&self, draft: &mut RegistryDraft);
}

/// Default hook: timezone, encoding, locale, base URL and debug cache tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppEnvironment {
    trust_proxy: bool,
}

impl AppEnvironment {
    /// Hook honouring `X-Forwarded-Proto` only when `trust_proxy` is set.
    #[must_use]
    pub const fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }
}

fn is_timezone_name(value: &str) -> bool {
    TIMEZONE_NAME
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

impl EnvironmentHook for AppEnvironment {
    fn name(&self) -> &'static str {
        "app_environment"
    }

    fn apply(&self, draft: &mut RegistryDraft) {
        let debug_cache = draft.get_bool("debug").unwrap_or(false);
        if debug_cache {
            for key in DEBUG_CACHE_KEYS {
                draft.set(*key, TypedValue::from(DEBUG_CACHE_DURATION));
            }
        }

        let timezone = match draft.get_str("App.defaultTimezone") {
            Some(name) if is_timezone_name(name) => name.to_string(),
            Some(name) => {
                warn!(timezone = %name, "ignoring invalid timezone; using UTC");
                "UTC".to_string()
            }
            None => "UTC".to_string(),
        };
        let encoding = draft.get_str("App.encoding").unwrap_or("UTF-8").to_string();
        let locale = draft.get_str("App.defaultLocale").unwrap_or("en_US").to_string();

        let full_base_url = match draft.get_str("App.fullBaseUrl") {
            Some(url) => Some(url.to_string()),
            None => draft
                .origin()
                .filter(|origin| !origin.host.is_empty())
                .map(|origin| format!("{}://{}", origin.scheme(self.trust_proxy), origin.host)),
        };
        if let Some(url) = &full_base_url {
            draft.set("App.fullBaseUrl", TypedValue::String(url.clone()));
        }

        *draft.environment_mut() = AppliedEnvironment {
            timezone,
            encoding,
            locale,
            full_base_url,
            debug_cache,
        };
    }
}

/// Immutable view of the registry at one revision.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegistrySnapshot {
    revision: u64,
    values: BTreeMap<String, TypedValue>,
    environment: AppliedEnvironment,
}

impl RegistrySnapshot {
    /// Revision, bumped whenever a reload publishes different state.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Value for a dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.values.get(key)
    }

    /// Every published value keyed by dotted key.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, TypedValue> {
        &self.values
    }

    /// Environment derived by the post-reload hooks.
    #[must_use]
    pub const fn environment(&self) -> &AppliedEnvironment {
        &self.environment
    }

    /// Nested JSON object for every key under `prefix`.
    ///
    /// An empty prefix yields the whole tree; an exact key yields its value.
    #[must_use]
    pub fn subtree(&self, prefix: &str) -> Option<Value> {
        if let Some(value) = self.values.get(prefix) {
            return Some(value.to_json());
        }
        let scope = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}.")
        };
        let mut root = Map::new();
        for (key, value) in self.values.range(scope.clone()..) {
            let Some(rest) = key.strip_prefix(&scope) else {
                break;
            };
            insert_path(&mut root, rest, value.to_json());
        }
        (!root.is_empty()).then_some(Value::Object(root))
    }

    fn same_state(&self, values: &BTreeMap<String, TypedValue>, env: &AppliedEnvironment) -> bool {
        &self.values == values && &self.environment == env
    }
}

fn insert_path(node: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            node.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

/// Why a stored record was left out of a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Key rejected by the key policy.
    KeyNotAllowed,
    /// Ciphertext could not be decrypted.
    Decrypt(DecryptFailure),
    /// Value did not cast to its declared type.
    Cast {
        /// Declared type tag.
        setting_type: String,
    },
}

/// A record left out of a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSetting {
    /// Key of the skipped record.
    pub key: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    /// Revision after the reload.
    pub revision: u64,
    /// Whether a new snapshot was published.
    pub changed: bool,
    /// Records published.
    pub applied: usize,
    /// Records left out.
    pub skipped: Vec<SkippedSetting>,
}

/// Process-wide configuration registry.
pub struct ConfigRegistry {
    repository: Arc<dyn SettingsRepository>,
    codec: ValueCodec,
    policy: KeyPolicy,
    base: BTreeMap<String, TypedValue>,
    hooks: Vec<Arc<dyn EnvironmentHook>>,
    snapshot: ArcSwap<RegistrySnapshot>,
    origin: ArcSwapOption<RequestOrigin>,
    reload_lock: Mutex<()>,
}

impl std::fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("revision", &self.revision())
            .field("policy", &self.policy)
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ConfigRegistry {
    /// Start building a registry over `repository`.
    #[must_use]
    pub fn builder(repository: Arc<dyn SettingsRepository>) -> ConfigRegistryBuilder {
        ConfigRegistryBuilder {
            repository,
            codec: ValueCodec::from_secret(None),
            policy: KeyPolicy::default(),
            base: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }

    /// Backing repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn SettingsRepository> {
        &self.repository
    }

    /// Value codec.
    #[must_use]
    pub const fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Key policy.
    #[must_use]
    pub const fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    /// Record the origin of the request being served; used by later reloads.
    pub fn observe_origin(&self, origin: RequestOrigin) {
        let unchanged = self
            .origin
            .load()
            .as_deref()
            .is_some_and(|current| current == &origin);
        if !unchanged {
            self.origin.store(Some(Arc::new(origin)));
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Current revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.snapshot.load().revision
    }

    /// Value for a dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<TypedValue> {
        self.snapshot.load().get(key).cloned()
    }

    /// String value for a dotted key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.snapshot
            .load()
            .get(key)
            .and_then(TypedValue::as_str)
            .map(str::to_string)
    }

    /// Integer value for a dotted key.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.snapshot.load().get(key).and_then(TypedValue::as_i64)
    }

    /// Float value for a dotted key.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.snapshot.load().get(key).and_then(TypedValue::as_f64)
    }

    /// Boolean value for a dotted key.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.snapshot.load().get(key).and_then(TypedValue::as_bool)
    }

    /// Nested JSON for every key under `prefix`.
    #[must_use]
    pub fn subtree(&self, prefix: &str) -> Option<Value> {
        self.snapshot.load().subtree(prefix)
    }

    /// Environment derived by the last publication.
    #[must_use]
    pub fn environment(&self) -> AppliedEnvironment {
        self.snapshot.load().environment.clone()
    }

    /// Rebuild the registry from storage and publish it.
    ///
    /// Records with a disallowed key, undecryptable ciphertext or an
    /// uncastable value are skipped and logged; the rest are published.
    ///
    /// # Errors
    ///
    /// Returns an error when storage cannot be read. Nothing is published then.
    /// A missing encryption key only skips the encrypted records.
    #[instrument(name = "config_registry.reload", skip(self))]
    pub async fn reload(&self) -> ConfigResult<ReloadReport> {
        let _guard = self.reload_lock.lock().await;
        let records = self.repository.fetch_all().await?;

        let mut draft = RegistryDraft::new(self.base.clone(), self.origin.load_full());
        let mut applied = 0;
        let mut skipped = Vec::new();

        for record in records {
            if !self.policy.is_allowed(&record.key) {
                warn!(
                    security = true,
                    key = %record.key,
                    "skipping stored setting with disallowed key"
                );
                skipped.push(SkippedSetting {
                    key: record.key,
                    reason: SkipReason::KeyNotAllowed,
                });
                continue;
            }

            let cast = if record.setting_type.is_encrypted() {
                match self.codec.decrypt(&record.raw_value) {
                    Ok(plaintext) => cast_value(&plaintext, &record.setting_type),
                    Err(failure) => {
                        warn!(
                            key = %record.key,
                            failure = %failure,
                            "skipping undecryptable setting"
                        );
                        skipped.push(SkippedSetting {
                            key: record.key,
                            reason: SkipReason::Decrypt(failure),
                        });
                        continue;
                    }
                }
            } else {
                cast_value(&record.raw_value, &record.setting_type)
            };

            match cast {
                Ok(value) => {
                    draft.set(record.key, value);
                    applied += 1;
                }
                Err(err) => {
                    warn!(key = %record.key, error = %err, "skipping setting that failed to cast");
                    skipped.push(SkippedSetting {
                        key: record.key,
                        reason: SkipReason::Cast {
                            setting_type: record.setting_type.to_string(),
                        },
                    });
                }
            }
        }

        let (revision, changed) = self.publish(draft);
        if changed {
            info!(revision, applied, skipped = skipped.len(), "configuration reloaded");
        } else {
            debug!(revision, applied, "configuration unchanged after reload");
        }
        Ok(ReloadReport {
            revision,
            changed,
            applied,
            skipped,
        })
    }

    fn publish(&self, mut draft: RegistryDraft) -> (u64, bool) {
        for hook in &self.hooks {
            hook.apply(&mut draft);
        }
        let current = self.snapshot.load();
        if current.same_state(&draft.values, &draft.environment) {
            return (current.revision, false);
        }
        let revision = current.revision + 1;
        self.snapshot.store(Arc::new(RegistrySnapshot {
            revision,
            values: draft.values,
            environment: draft.environment,
        }));
        (revision, true)
    }
}

/// Builder for [`ConfigRegistry`].
pub struct ConfigRegistryBuilder {
    repository: Arc<dyn SettingsRepository>,
    codec: ValueCodec,
    policy: KeyPolicy,
    base: BTreeMap<String, TypedValue>,
    hooks: Vec<Arc<dyn EnvironmentHook>>,
}

impl ConfigRegistryBuilder {
    /// Codec used for encryption and decryption.
    #[must_use]
    pub fn codec(mut self, codec: ValueCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Key policy applied on write and reload.
    #[must_use]
    pub fn policy(mut self, policy: KeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Host value published underneath stored values.
    #[must_use]
    pub fn base_value(mut self, key: impl Into<String>, value: TypedValue) -> Self {
        self.base.insert(key.into(), value);
        self
    }

    /// Host values published underneath stored values.
    #[must_use]
    pub fn base_values<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, TypedValue)>,
        K: Into<String>,
    {
        self.base
            .extend(values.into_iter().map(|(key, value)| (key.into(), value)));
        self
    }

    /// Append a post-reload hook; hooks run in registration order.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn EnvironmentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Build the registry; its initial snapshot holds the base values only.
    #[must_use]
    pub fn build(self) -> ConfigRegistry {
        let registry = ConfigRegistry {
            repository: self.repository,
            codec: self.codec,
            policy: self.policy,
            base: self.base,
            hooks: self.hooks,
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
            origin: ArcSwapOption::empty(),
            reload_lock: Mutex::new(()),
        };
        let mut draft = RegistryDraft::new(registry.base.clone(), None);
        for hook in &registry.hooks {
            hook.apply(&mut draft);
        }
        registry.snapshot.store(Arc::new(RegistrySnapshot {
            revision: 0,
            values: draft.values,
            environment: draft.environment,
        }));
        registry
    }
}
