//! Salted, iterated password hashing.
//!
//! Stored hashes are the standard base64 encoding of `salt || key`, where the
//! salt is 16 random bytes and the key is 32 bytes of PBKDF2-HMAC-SHA256
//! output. The iteration count is not part of the encoding, so a hash can only
//! be verified by a hasher configured with the count it was created with.

use base64::{Engine, engine::general_purpose::STANDARD};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{
    Error,
    config::DEFAULT_PBKDF2_ITERATIONS,
    crypto::{constant_time_compare, fill_random},
    error::ValidationError,
};

/// Length of the random salt in bytes.
pub const SALT_LEN: usize = 16;

/// Length of the derived key in bytes.
pub const KEY_LEN: usize = 32;

const ENCODED_LEN: usize = SALT_LEN + KEY_LEN;

/// Characters used by [`PasswordHasher::generate_random_password`].
const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+[]{}";

/// Hashes and verifies passwords with PBKDF2-HMAC-SHA256.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with a custom iteration count.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidField`] if `iterations` is zero.
    pub fn with_iterations(iterations: u32) -> Result<Self, ValidationError> {
        if iterations == 0 {
            return Err(ValidationError::InvalidField(
                "PBKDF2 iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a password with a freshly generated salt.
    ///
    /// Two calls with the same password yield different strings, both of which
    /// verify against it.
    ///
    /// # Errors
    ///
    /// Fails only if the OS random source is unavailable.
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        let mut encoded = [0u8; ENCODED_LEN];
        let (salt, key) = encoded.split_at_mut(SALT_LEN);
        fill_random(salt)?;
        key.copy_from_slice(&self.derive_key(password, salt));

        Ok(STANDARD.encode(encoded))
    }

    /// Check a candidate password against a stored hash.
    ///
    /// The key comparison is constant-time. A hash that cannot be decoded or
    /// has the wrong length yields `false`.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let bytes = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Stored password hash is not valid base64");
                return false;
            }
        };
        if bytes.len() != ENCODED_LEN {
            tracing::debug!(
                length = bytes.len(),
                expected = ENCODED_LEN,
                "Stored password hash has unexpected length"
            );
            return false;
        }

        let (salt, stored_key) = bytes.split_at(SALT_LEN);
        let candidate = self.derive_key(password, salt);
        constant_time_compare(&candidate, stored_key)
    }

    /// Generate a random password of `length` characters.
    ///
    /// Characters are drawn uniformly from letters, digits and common symbols
    /// using the OS random source.
    ///
    /// # Errors
    ///
    /// Fails only if the OS random source is unavailable.
    pub fn generate_random_password(length: usize) -> Result<String, Error> {
        let alphabet_len = PASSWORD_ALPHABET.len();
        // Largest multiple of the alphabet size that fits in a byte; bytes at or
        // above it are rejected so every character is equally likely.
        let limit = 256 - (256 % alphabet_len);

        let mut password = String::with_capacity(length);
        let mut buf = [0u8; 64];
        while password.len() < length {
            fill_random(&mut buf)?;
            for &byte in buf.iter().filter(|&&b| usize::from(b) < limit) {
                if password.len() == length {
                    break;
                }
                password.push(char::from(PASSWORD_ALPHABET[usize::from(byte) % alphabet_len]));
            }
        }

        Ok(password)
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut key);
        key
    }
}
