// # Secret Store
//
// At-rest protection for the DuckDNS update token.
//
// ## Wire shape
//
// A wrapped token is `base64(iv(12) ‖ ciphertext ‖ tag(16))` with no line
// wrapping. The IV is freshly randomised on every wrap, so wrapping the
// same token twice yields different ciphertexts.
//
// ## Key material
//
// The wrapping key is never persisted. [`KeyProvider`] supplies 32 bytes
// of key material; the default [`PassphraseKeyProvider`] derives them
// from an operator passphrase. The key handle is created once per process
// and reused across ticks.
//
// ## Legacy tokens
//
// Installations that stored the token in plain text before wrapping was
// introduced are detected by [`is_duckdns_token_shape`]: DuckDNS tokens
// are UUIDs, wrapped tokens are base64 blobs that never match the shape.
// The engine re-wraps such tokens on first read.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// AEAD nonce length in bytes
const NONCE_LEN: usize = 12;

/// Domain-separation prefix for passphrase key derivation
const KEY_DERIVATION_SALT: &[u8] = b"duckdns-agent.token-wrap.v1";

/// Source of the 32-byte token-wrapping key
///
/// Implementations must not persist the key. The daemon constructs one
/// provider at startup and shares the resulting [`TokenVault`] process-wide.
pub trait KeyProvider: Send + Sync {
    /// Produce the wrapping key material
    fn key_material(&self) -> [u8; 32];
}

/// Key provider deriving the wrapping key from an operator passphrase
///
/// SHA-256 over a fixed application salt and the passphrase. This is the
/// portable fallback for hosts without an OS key store; an OS-bound
/// provider can be supplied behind the same trait.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PassphraseKeyProvider {
    key: [u8; 32],
}

impl PassphraseKeyProvider {
    /// Derive key material from `passphrase`
    pub fn new(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DERIVATION_SALT);
        hasher.update(passphrase.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }
}

impl KeyProvider for PassphraseKeyProvider {
    fn key_material(&self) -> [u8; 32] {
        self.key
    }
}

/// Key provider with fixed key bytes
///
/// For tests and embedders that manage key material themselves.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct StaticKeyProvider {
    key: [u8; 32],
}

impl StaticKeyProvider {
    /// Use `key` as-is
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn key_material(&self) -> [u8; 32] {
        self.key
    }
}

/// AEAD wrapper for the update token
///
/// AES-256-GCM with a 12-byte randomised IV and 128-bit tag. One vault is
/// created per process and reused; the underlying key handle never leaves it.
pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault").finish_non_exhaustive()
    }
}

impl TokenVault {
    /// Create a vault from a key provider
    pub fn new(provider: &dyn KeyProvider) -> Self {
        let mut key = provider.key_material();
        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte AES-256-GCM key");
        key.zeroize();
        Self { cipher }
    }

    /// Wrap a plaintext token for durable storage
    ///
    /// Returns `base64(iv ‖ ciphertext ‖ tag)`. A fresh IV is drawn per call.
    pub fn wrap(&self, plaintext: &str) -> Result<String> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| Error::corrupt_secret("encryption failed"))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Unwrap a stored token
    ///
    /// Fails with [`Error::CorruptSecret`] when the input is not base64,
    /// shorter than one IV, or fails authentication.
    pub fn unwrap(&self, encoded: &str) -> Result<String> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| Error::corrupt_secret(format!("invalid base64: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(Error::corrupt_secret(format!(
                "ciphertext too short: {} bytes",
                combined.len()
            )));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::corrupt_secret("authentication failed"))?;

        String::from_utf8(plaintext).map_err(|_| Error::corrupt_secret("plaintext is not UTF-8"))
    }
}

/// Check whether `token` matches the DuckDNS UUID token shape
///
/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, hex digits only. Used to decide
/// whether a value that failed to unwrap is a legacy plaintext token.
pub fn is_duckdns_token_shape(token: &str) -> bool {
    let groups: Vec<&str> = token.split('-').collect();
    if groups.len() != 5 {
        return false;
    }
    let expected_lens = [8, 4, 4, 4, 12];
    groups
        .iter()
        .zip(expected_lens)
        .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}
