//! Settings fixtures shared by unit and integration suites.

/// Encryption secret long enough to pass key validation.
pub const TEST_ENCRYPTION_KEY: &str = "tessera-test-encryption-key-0123456789abcdef";

/// A second valid secret used to exercise key rotation failures.
pub const ALTERNATE_ENCRYPTION_KEY: &str = "tessera-alternate-encryption-key-fedcba9876543210";

/// A stored settings record in fixture form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingFixture {
    /// UI grouping label.
    pub module: &'static str,
    /// Dotted configuration key.
    pub key: &'static str,
    /// Stored value.
    pub value: &'static str,
    /// Type tag.
    pub setting_type: &'static str,
}

/// Baseline records mirroring a freshly provisioned installation.
pub const APP_SETTINGS: &[SettingFixture] = &[
    SettingFixture {
        module: "App",
        key: "App.defaultTimezone",
        value: "UTC",
        setting_type: "string",
    },
    SettingFixture {
        module: "App",
        key: "App.defaultLocale",
        value: "en_US",
        setting_type: "string",
    },
    SettingFixture {
        module: "App",
        key: "Cache.default.duration",
        value: "3600",
        setting_type: "integer",
    },
];

/// Records that the key policy must never let through.
pub const BLOCKED_SETTINGS: &[SettingFixture] = &[
    SettingFixture {
        module: "App",
        key: "Security.salt",
        value: "leaked",
        setting_type: "string",
    },
    SettingFixture {
        module: "App",
        key: "Datasources.default.password",
        value: "hunter2",
        setting_type: "string",
    },
];
