//! Bearer token codec
//!
//! Tokens are compact JWTs signed with HS256 over the process [`SigningKey`].
//! The claim set is deliberately small:
//!
//! | Claim | Meaning |
//! |-------|---------|
//! | `sub` | login of the principal |
//! | `iat` | issue time, seconds since the Unix epoch |
//! | `exp` | expiry, seconds since the Unix epoch |
//!
//! Parsing checks the signature and structure only. Expiry is checked against
//! a caller-supplied `now` so the pipeline can run on an injected clock; the
//! signature is always verified before any claim is looked at.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::signing_key::SigningKey;

/// Default token lifetime
pub const DEFAULT_TTL: Duration = Duration::hours(1);

/// Token failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Malformed token, wrong algorithm, bad signature or missing claims
    #[error("token rejected: {0}")]
    Invalid(String),

    /// Signature valid but `exp` has passed
    #[error("token expired")]
    Expired,

    /// Signing failed
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal login
    pub sub: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expires at (seconds since epoch)
    pub exp: i64,
}

impl Claims {
    /// True once `now` has reached `exp`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    /// `exp - now`; negative once expired
    pub fn remaining_validity(&self, now: DateTime<Utc>) -> Duration {
        let exp_millis = self.exp.saturating_mul(1000);
        Duration::milliseconds(exp_millis.saturating_sub(now.timestamp_millis()))
    }

    /// Expiry as a timestamp, if representable
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Issues and parses bearer tokens.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec that issues tokens valid for `ttl`.
    pub fn new(key: &SigningKey, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Self {
            encoding: EncodingKey::from_secret(key.as_bytes()),
            decoding: DecodingKey::from_secret(key.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Lifetime of newly issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `login`, valid from `now` until `now + ttl`.
    pub fn issue(&self, login: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: login.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl.num_seconds()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Check signature and structure and return the claims.
    ///
    /// Does not look at the clock; see [`TokenCodec::verify`].
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(TokenError::Invalid("empty subject".to_string()));
        }
        Ok(data.claims)
    }

    /// [`parse`](Self::parse) followed by the expiry check.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.parse(token)?;
        if claims.is_expired(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Whether `claims` has expired at `now`
    pub fn is_expired(&self, claims: &Claims, now: DateTime<Utc>) -> bool {
        claims.is_expired(now)
    }

    /// Time left before `claims` expires (negative once expired)
    pub fn remaining_validity(&self, claims: &Claims, now: DateTime<Utc>) -> Duration {
        claims.remaining_validity(now)
    }

    /// Issue a fresh token for the subject of `claims`.
    pub fn refresh(&self, claims: &Claims, now: DateTime<Utc>) -> Result<String, TokenError> {
        self.issue(&claims.sub, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::TimeZone;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SigningKey::from_bytes(vec![7u8; 32]).unwrap(), DEFAULT_TTL)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_then_parse() {
        let codec = codec();
        let token = codec.issue("ivan", t0()).unwrap();
        let claims = codec.parse(&token).unwrap();

        assert_eq!(claims.sub, "ivan");
        assert_eq!(claims.iat, t0().timestamp());
        assert_eq!(claims.exp, t0().timestamp() + 3600);
        assert_eq!(codec.remaining_validity(&claims, t0()), Duration::hours(1));
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec();
        let claims = codec.parse(&codec.issue("ivan", t0()).unwrap()).unwrap();

        let just_before = t0() + Duration::hours(1) - Duration::seconds(1);
        assert!(!codec.is_expired(&claims, just_before));
        assert!(codec.is_expired(&claims, t0() + Duration::hours(1)));
        assert!(codec.remaining_validity(&claims, t0() + Duration::hours(2)) < Duration::zero());
    }

    #[test]
    fn test_verify_rejects_expired() {
        let codec = codec();
        let token = codec.issue("ivan", t0()).unwrap();
        assert!(codec.verify(&token, t0() + Duration::minutes(59)).is_ok());
        assert_eq!(
            codec.verify(&token, t0() + Duration::hours(2)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other = TokenCodec::new(&SigningKey::from_bytes(vec![9u8; 32]).unwrap(), DEFAULT_TTL);
        let token = other.issue("ivan", t0()).unwrap();
        assert!(matches!(codec().parse(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = codec();
        let token = codec.issue("ivan", t0()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: "admin".into(),
                iat: t0().timestamp(),
                exp: t0().timestamp() + 3600,
            })
            .unwrap(),
        );
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(matches!(codec.parse(&tampered), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = codec();
        assert!(codec.parse("").is_err());
        assert!(codec.parse("not-a-token").is_err());
        assert!(codec.parse("a.b.c").is_err());
    }

    #[test]
    fn test_missing_claim_rejected() {
        #[derive(Serialize)]
        struct NoIat {
            sub: String,
            exp: i64,
        }

        let key = SigningKey::from_bytes(vec![7u8; 32]).unwrap();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoIat {
                sub: "ivan".into(),
                exp: t0().timestamp() + 3600,
            },
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec().parse(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_refresh_moves_expiry() {
        let codec = codec();
        let claims = codec.parse(&codec.issue("ivan", t0()).unwrap()).unwrap();
        let later = t0() + Duration::minutes(50);

        let refreshed = codec.parse(&codec.refresh(&claims, later).unwrap()).unwrap();
        assert_eq!(refreshed.sub, "ivan");
        assert_eq!(refreshed.exp, later.timestamp() + 3600);
    }
}
