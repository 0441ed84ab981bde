//! Type casting and at-rest encryption of setting values.
//!
//! Ciphertext is stored as standard base64 of `nonce || ciphertext || tag`
//! under AES-256-GCM with a fresh 96-bit nonce per call.

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{ConfigError, ConfigResult, DecodeError};
use crate::model::{SettingType, TypedValue};

/// Shortest accepted encryption secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Cast a plaintext value to its declared type.
///
/// # Errors
///
/// Returns [`ConfigError::Decode`] when an integer, float or JSON value does
/// not parse. Booleans never fail: anything other than a recognised truthy
/// token is `false`.
pub fn cast_value(raw: &str, setting_type: &SettingType) -> ConfigResult<TypedValue> {
    let decode = |source: DecodeError| ConfigError::Decode {
        setting_type: setting_type.to_string(),
        source,
    };
    match setting_type {
        SettingType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(TypedValue::Integer)
            .map_err(|err| decode(err.into())),
        SettingType::Float => {
            let value = raw
                .trim()
                .parse::<f64>()
                .map_err(|err| decode(err.into()))?;
            if value.is_finite() {
                Ok(TypedValue::Float(value))
            } else {
                Err(decode(DecodeError::NonFiniteFloat))
            }
        }
        SettingType::Boolean => Ok(TypedValue::Boolean(is_truthy(raw))),
        SettingType::Json => serde_json::from_str(raw)
            .map(TypedValue::Json)
            .map_err(|err| decode(err.into())),
        SettingType::String | SettingType::Encrypted | SettingType::Other(_) => {
            Ok(TypedValue::String(raw.to_string()))
        }
    }
}

/// Cast using a raw type tag.
///
/// # Errors
///
/// See [`cast_value`].
pub fn cast_tagged(raw: &str, tag: &str) -> ConfigResult<TypedValue> {
    cast_value(raw, &SettingType::parse(tag))
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Why a stored value could not be decrypted.
///
/// Reload skips the affected record and continues with the rest, including
/// for [`DecryptFailure::KeyUnavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptFailure {
    /// Stored value was empty.
    Empty,
    /// Stored value was not valid base64.
    InvalidEncoding,
    /// Decoded payload is too short to hold a nonce and tag.
    Truncated,
    /// Integrity check failed: corrupted data or a different key.
    Authentication,
    /// Plaintext is not UTF-8.
    InvalidUtf8,
    /// No usable encryption key is configured.
    KeyUnavailable,
}

impl DecryptFailure {
    /// Stable identifier for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::InvalidEncoding => "invalid_encoding",
            Self::Truncated => "truncated",
            Self::Authentication => "authentication",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::KeyUnavailable => "key_unavailable",
        }
    }
}

impl fmt::Display for DecryptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 256-bit AES key derived from the host secret.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; 32]>);

impl EncryptionKey {
    /// Derive a key from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEncryptionKey`] for an empty secret and
    /// [`ConfigError::WeakEncryptionKey`] for one shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn derive(secret: &str) -> ConfigResult<Self> {
        if secret.is_empty() {
            return Err(ConfigError::MissingEncryptionKey);
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakEncryptionKey {
                min_len: MIN_SECRET_LEN,
                actual_len: secret.len(),
            });
        }
        let digest = Sha256::digest(secret.as_bytes());
        let mut bytes = Zeroizing::new([0_u8; 32]);
        bytes.copy_from_slice(&digest);
        Ok(Self(bytes))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.as_slice()))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
enum KeyState {
    Ready(Arc<EncryptionKey>),
    Missing,
    Weak { actual_len: usize },
}

/// Encrypts values for storage and decrypts them for publication.
///
/// A codec can be built without a usable key; operations that need the key
/// then fail instead of falling back to plaintext.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    key: KeyState,
}

impl ValueCodec {
    /// Build a codec from an optional host secret.
    #[must_use]
    pub fn from_secret(secret: Option<&str>) -> Self {
        let key = match secret.map(EncryptionKey::derive) {
            Some(Ok(key)) => KeyState::Ready(Arc::new(key)),
            Some(Err(ConfigError::WeakEncryptionKey { actual_len, .. })) => {
                KeyState::Weak { actual_len }
            }
            Some(Err(_)) | None => KeyState::Missing,
        };
        Self { key }
    }

    /// Build a codec around an already derived key.
    #[must_use]
    pub fn with_key(key: EncryptionKey) -> Self {
        Self {
            key: KeyState::Ready(Arc::new(key)),
        }
    }

    /// Resolve the process-wide key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEncryptionKey`] or
    /// [`ConfigError::WeakEncryptionKey`] when no usable key is configured.
    pub fn encryption_key(&self) -> ConfigResult<&EncryptionKey> {
        match &self.key {
            KeyState::Ready(key) => Ok(key),
            KeyState::Missing => Err(ConfigError::MissingEncryptionKey),
            KeyState::Weak { actual_len } => Err(ConfigError::WeakEncryptionKey {
                min_len: MIN_SECRET_LEN,
                actual_len: *actual_len,
            }),
        }
    }

    /// Whether a usable key is configured.
    #[must_use]
    pub const fn has_key(&self) -> bool {
        matches!(self.key, KeyState::Ready(_))
    }

    /// Encrypt a plaintext value into its stored text form.
    ///
    /// # Errors
    ///
    /// Returns a key error when no usable key is configured, or
    /// [`ConfigError::Encryption`] when the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &str) -> ConfigResult<String> {
        let cipher = self.encryption_key()?.cipher();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| ConfigError::Encryption)?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    /// Decrypt a stored value.
    ///
    /// # Errors
    ///
    /// Returns a [`DecryptFailure`] describing why the value is unusable.
    /// Malformed input never panics.
    pub fn decrypt(&self, stored: &str) -> Result<Zeroizing<String>, DecryptFailure> {
        if stored.is_empty() {
            return Err(DecryptFailure::Empty);
        }
        let payload = Zeroizing::new(
            STANDARD
                .decode(stored.trim())
                .map_err(|_| DecryptFailure::InvalidEncoding)?,
        );
        if payload.len() < NONCE_SIZE + TAG_SIZE {
            return Err(DecryptFailure::Truncated);
        }
        let KeyState::Ready(key) = &self.key else {
            return Err(DecryptFailure::KeyUnavailable);
        };

        let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);
        let plaintext = key
            .cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptFailure::Authentication)?;
        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|_| DecryptFailure::InvalidUtf8)
    }
}
