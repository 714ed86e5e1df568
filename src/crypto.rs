//! Cryptographic helpers shared by the pipeline
//!
//! - **Constant-Time Comparison**: CSRF token checks must not leak how many
//!   leading bytes matched
//! - **Random Tokens**: URL-safe random strings for CSRF cookies

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Performs constant-time comparison of two byte slices.
///
/// The comparison takes the same amount of time regardless of where (or if)
/// the inputs differ. Slices of different length compare unequal.
///
/// ```rust
/// use flashcard_gate::constant_time_eq;
///
/// assert!(constant_time_eq(b"abc123", b"abc123"));
/// assert!(!constant_time_eq(b"abc123", b"abc124"));
/// ```
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// String wrapper around [`constant_time_eq`].
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Generate `len` random bytes from the thread-local CSPRNG, encoded as
/// URL-safe base64 without padding.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}
