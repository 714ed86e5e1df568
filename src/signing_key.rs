//! Token signing key
//!
//! The process holds exactly one HMAC key. It is loaded once at startup,
//! checked against a strength policy chosen by deployment environment, and
//! never changes afterwards. The bytes are zeroed when the key is dropped and
//! never appear in `Debug` output.
//!
//! # Secret formats
//!
//! - raw text: `AUTH_JWT_SECRET=Zq4...` is validated for length, weak
//!   patterns and Shannon entropy
//! - base64: `AUTH_JWT_SECRET=base64:3q2+7w...` is decoded and must carry at
//!   least 32 bytes (the HS256 block size)
//!
//! ```
//! use flashcard_gate::signing_key::{SecretPolicy, SigningKey};
//!
//! let policy = SecretPolicy::for_environment("development");
//! assert!(SigningKey::from_secret("short", &policy).is_err());
//!
//! let key = SigningKey::generate();
//! assert_eq!(key.len(), 64);
//! ```

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

/// Smallest accepted key, in bytes
pub const MIN_KEY_BYTES: usize = 32;

/// Prefix marking a base64-encoded secret
pub const BASE64_PREFIX: &str = "base64:";

/// Error type for signing secret validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SecretError {
    /// Secret is too short for the required environment
    #[error("secret length ({actual}) is below minimum ({minimum}) for {context}")]
    TooShort {
        actual: usize,
        minimum: usize,
        context: String,
    },

    /// Secret contains a weak/common pattern
    #[error("secret contains weak pattern: '{pattern}'")]
    WeakPattern { pattern: String },

    /// Secret has insufficient entropy
    #[error("secret entropy ({actual:.1} bits) is below minimum ({minimum:.1} bits) for {context}")]
    LowEntropy {
        actual: f64,
        minimum: f64,
        context: String,
    },

    /// `base64:` secret did not decode
    #[error("secret is not valid base64: {0}")]
    InvalidEncoding(String),
}

/// Strength requirements for a text secret.
#[derive(Debug, Clone)]
pub struct SecretPolicy {
    /// Minimum secret length in characters
    pub min_length: usize,
    /// Minimum Shannon entropy in bits
    pub min_entropy: f64,
    /// Whether to check for weak patterns
    pub check_weak_patterns: bool,
    /// Context string for error messages
    pub context: String,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self::for_environment("development")
    }
}

impl SecretPolicy {
    /// Create a policy for a specific environment.
    ///
    /// - `production`: 64 char min, 128-bit entropy
    /// - `staging`: 48 char min, 96-bit entropy
    /// - anything else: 32 char min, 64-bit entropy
    pub fn for_environment(environment: &str) -> Self {
        match environment.to_lowercase().as_str() {
            "production" | "prod" => Self {
                min_length: 64,
                min_entropy: 128.0,
                check_weak_patterns: true,
                context: "production environment".to_string(),
            },
            "staging" | "stage" => Self {
                min_length: 48,
                min_entropy: 96.0,
                check_weak_patterns: true,
                context: "staging environment".to_string(),
            },
            _ => Self {
                min_length: MIN_KEY_BYTES,
                min_entropy: 64.0,
                check_weak_patterns: true,
                context: "development environment".to_string(),
            },
        }
    }

    /// Validate a text secret against this policy.
    pub fn validate(&self, secret: &str) -> Result<(), SecretError> {
        if secret.len() < self.min_length {
            return Err(SecretError::TooShort {
                actual: secret.len(),
                minimum: self.min_length,
                context: self.context.clone(),
            });
        }

        if self.check_weak_patterns {
            if let Some(pattern) = find_weak_pattern(secret) {
                return Err(SecretError::WeakPattern {
                    pattern: pattern.to_string(),
                });
            }
        }

        let entropy = shannon_entropy(secret);
        if entropy < self.min_entropy {
            return Err(SecretError::LowEntropy {
                actual: entropy,
                minimum: self.min_entropy,
                context: self.context.clone(),
            });
        }

        Ok(())
    }
}

fn find_weak_pattern(secret: &str) -> Option<&'static str> {
    const WEAK_PATTERNS: &[&str] = &[
        "secret", "password", "admin", "123456", "qwerty", "default", "example",
        "changeme", "letmein", "welcome", "jwt",
    ];

    let secret_lower = secret.to_lowercase();
    WEAK_PATTERNS
        .iter()
        .copied()
        .find(|pattern| secret_lower.contains(pattern))
}

/// Total Shannon entropy of a string in bits (per-char entropy times length).
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut char_counts: HashMap<char, usize> = HashMap::new();
    let total = s.chars().count() as f64;
    for c in s.chars() {
        *char_counts.entry(c).or_insert(0) += 1;
    }

    let per_char: f64 = char_counts
        .values()
        .map(|count| {
            let p = *count as f64 / total;
            -p * p.log2()
        })
        .sum();

    per_char * total
}

/// HMAC key used to sign and verify bearer tokens.
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Build a key from configuration text, validating it against `policy`.
    ///
    /// Text prefixed with `base64:` is decoded and only its byte length is
    /// checked.
    pub fn from_secret(secret: &str, policy: &SecretPolicy) -> Result<Self, SecretError> {
        if let Some(encoded) = secret.strip_prefix(BASE64_PREFIX) {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|e| SecretError::InvalidEncoding(e.to_string()))?;
            return Self::from_bytes(bytes);
        }

        policy.validate(secret)?;
        Ok(Self {
            bytes: secret.as_bytes().to_vec(),
        })
    }

    /// Build a key from raw bytes. At least [`MIN_KEY_BYTES`] are required.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SecretError> {
        if bytes.len() < MIN_KEY_BYTES {
            return Err(SecretError::TooShort {
                actual: bytes.len(),
                minimum: MIN_KEY_BYTES,
                context: "raw key bytes".to_string(),
            });
        }
        Ok(Self { bytes })
    }

    /// Generate a random 64-byte key.
    ///
    /// Tokens signed with a generated key do not survive a restart.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 64];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Key bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a constructed key
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for SigningKey {
    fn drop(&mut self) {
        for byte in &mut self.bytes {
            *byte = 0;
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRONG: &str = "Zq4#vN8r!Lw2@pK7$tY1%hB5^mC9&xF3*dG6(jS0)uE";

    #[test]
    fn test_policy_rejects_short_secret() {
        let policy = SecretPolicy::for_environment("development");
        let err = policy.validate("tooshort").unwrap_err();
        assert!(matches!(err, SecretError::TooShort { minimum: 32, .. }));
    }

    #[test]
    fn test_policy_rejects_weak_pattern() {
        let policy = SecretPolicy::for_environment("development");
        let err = policy
            .validate("my-jwt-secret-value-for-the-flashcard-app")
            .unwrap_err();
        assert!(matches!(err, SecretError::WeakPattern { .. }));
    }

    #[test]
    fn test_policy_rejects_low_entropy() {
        let policy = SecretPolicy::for_environment("development");
        let err = policy.validate(&"ab".repeat(20)).unwrap_err();
        assert!(matches!(err, SecretError::LowEntropy { .. }));
    }

    #[test]
    fn test_production_needs_longer_secret() {
        let policy = SecretPolicy::for_environment("production");
        assert!(policy.validate(STRONG).is_err());
        assert!(SecretPolicy::for_environment("dev").validate(STRONG).is_ok());
    }

    #[test]
    fn test_base64_secret() {
        let encoded = format!("{BASE64_PREFIX}{}", STANDARD.encode([42u8; 48]));
        let key = SigningKey::from_secret(&encoded, &SecretPolicy::default()).unwrap();
        assert_eq!(key.as_bytes(), &[42u8; 48][..]);

        let short = format!("{BASE64_PREFIX}{}", STANDARD.encode([42u8; 8]));
        assert!(SigningKey::from_secret(&short, &SecretPolicy::default()).is_err());

        let garbage = format!("{BASE64_PREFIX}not base64!");
        assert!(matches!(
            SigningKey::from_secret(&garbage, &SecretPolicy::default()),
            Err(SecretError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SigningKey::from_secret(STRONG, &SecretPolicy::default()).unwrap();
        let printed = format!("{key:?}");
        assert!(printed.contains("len"));
        assert!(!printed.contains("Zq4"));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(SigningKey::generate().as_bytes(), SigningKey::generate().as_bytes());
    }
}
