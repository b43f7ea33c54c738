//! Cryptographic primitives shared by the password hasher
//!
//! # Security
//!
//! Comparing secrets with `==` may exit early on the first mismatching byte,
//! which leaks through response timing how much of a guess was right. All
//! comparisons of derived keys go through [`constant_time_compare`], backed by
//! the `subtle` crate.
//!
//! See: <https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html>

use rand::{TryRngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

/// Fill `buf` with bytes from the operating system's CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::RandomSource`] if the OS entropy source fails.
pub fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::RandomSource(e.to_string()))
}

/// Perform constant-time comparison of two byte slices.
///
/// Runs in time independent of where (or whether) the slices differ.
/// Slices of unequal length compare unequal; the length itself is not secret.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
