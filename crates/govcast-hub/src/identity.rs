//! Connection identity from an optional HS256 bearer token.
//!
//! Tokens are HS256 JWTs signed by the portal backend with the shared
//! `auth.jwt_secret`. Verification is local: signature, `exp` when present,
//! then the subject address.

use govcast_core::{config::AuthConfig, GovcastError};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const ANONYMOUS: &str = "anonymous";

/// Resolved identity of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Wallet address of the token subject; `None` for anonymous connections.
    pub address: Option<String>,
    pub role: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.address.is_some()
    }

    /// Address, or `"anonymous"`.
    pub fn label(&self) -> &str {
        self.address.as_deref().unwrap_or(ANONYMOUS)
    }
}

/// Result of checking a handshake credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    /// No credential was presented.
    Anonymous,
    /// A credential was presented and failed verification.
    Rejected(String),
}

/// Token claims. `address` wins over `sub` when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    secret: Option<Vec<u8>>,
    validation: Validation,
    reject_invalid: bool,
}

impl IdentityResolver {
    pub fn new(cfg: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional; when present it is enforced without leeway
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        Self {
            secret: cfg
                .jwt_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
            validation,
            reject_invalid: cfg.reject_invalid_tokens,
        }
    }

    pub fn resolve(&self, credential: Option<&str>) -> AuthOutcome {
        let Some(token) = credential.map(str::trim).filter(|t| !t.is_empty()) else {
            return AuthOutcome::Anonymous;
        };
        match self.verify(token) {
            Ok(identity) => AuthOutcome::Authenticated(identity),
            Err(reason) => AuthOutcome::Rejected(reason),
        }
    }

    /// Apply the deployment policy to an outcome.
    ///
    /// With `reject_invalid_tokens` off, `Rejected` downgrades to anonymous;
    /// with it on, the handshake fails.
    pub fn admit(&self, outcome: AuthOutcome) -> Result<Identity, GovcastError> {
        match outcome {
            AuthOutcome::Authenticated(identity) => {
                debug!(address = identity.label(), "token verified");
                Ok(identity)
            }
            AuthOutcome::Anonymous => Ok(Identity::anonymous()),
            AuthOutcome::Rejected(reason) if self.reject_invalid => {
                warn!(%reason, "rejecting handshake with invalid token");
                Err(GovcastError::AuthFailed(reason))
            }
            AuthOutcome::Rejected(reason) => {
                warn!(%reason, "invalid token, continuing as anonymous");
                Ok(Identity::anonymous())
            }
        }
    }

    fn verify(&self, token: &str) -> Result<Identity, String> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| "token verification is not configured".to_string())?;

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret), &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => "token expired".to_string(),
                ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                _ => format!("invalid token: {e}"),
            })?;

        let address = claims
            .address
            .or(claims.sub)
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| "token has no subject address".to_string())?;

        Ok(Identity {
            address: Some(address),
            role: claims.role,
        })
    }
}

/// Mint an HS256 token for `claims`. The portal backend issues these; the
/// hub only verifies them.
pub fn issue_token(secret: &[u8], claims: &Claims) -> Result<String, GovcastError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| GovcastError::Internal(format!("token encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn resolver(reject_invalid: bool) -> IdentityResolver {
        IdentityResolver::new(&AuthConfig {
            jwt_secret: Some(SECRET.into()),
            reject_invalid_tokens: reject_invalid,
        })
    }

    fn token(claims: Claims) -> String {
        issue_token(SECRET.as_bytes(), &claims).unwrap()
    }

    #[test]
    fn missing_credential_is_anonymous() {
        let r = resolver(true);
        assert_eq!(r.resolve(None), AuthOutcome::Anonymous);
        assert_eq!(r.resolve(Some("  ")), AuthOutcome::Anonymous);
        let id = r.admit(AuthOutcome::Anonymous).unwrap();
        assert_eq!(id.label(), "anonymous");
        assert!(!id.is_authenticated());
    }

    #[test]
    fn valid_token_yields_address_and_role() {
        let t = token(Claims {
            address: Some("0xABC".into()),
            role: Some("treasurer".into()),
            exp: Some(chrono::Utc::now().timestamp() + 3600),
            ..Default::default()
        });
        match resolver(false).resolve(Some(&t)) {
            AuthOutcome::Authenticated(id) => {
                assert_eq!(id.address.as_deref(), Some("0xabc"));
                assert_eq!(id.role.as_deref(), Some("treasurer"));
            }
            other => panic!("expected authenticated, got {other:?}"),
        }
    }

    #[test]
    fn sub_is_used_when_address_missing() {
        let t = token(Claims {
            sub: Some("0x1".into()),
            ..Default::default()
        });
        let id = resolver(false).admit(resolver(false).resolve(Some(&t))).unwrap();
        assert_eq!(id.label(), "0x1");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let t = token(Claims {
            address: Some("0x1".into()),
            ..Default::default()
        });
        let other = token(Claims {
            address: Some("0x2".into()),
            ..Default::default()
        });
        let mut parts: Vec<&str> = t.split('.').collect();
        parts[1] = other.split('.').nth(1).unwrap();
        let forged = parts.join(".");

        assert!(matches!(
            resolver(false).resolve(Some(&forged)),
            AuthOutcome::Rejected(_)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let t = token(Claims {
            address: Some("0x1".into()),
            exp: Some(chrono::Utc::now().timestamp() - 10),
            ..Default::default()
        });
        assert_eq!(
            resolver(false).resolve(Some(&t)),
            AuthOutcome::Rejected("token expired".into())
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let t = issue_token(
            b"other-secret",
            &Claims {
                address: Some("0x1".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(resolver(false).resolve(Some(&t)), AuthOutcome::Rejected(_)));
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let t = encode(
            &Header::new(Algorithm::HS512),
            &Claims {
                address: Some("0x1".into()),
                ..Default::default()
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(resolver(false).resolve(Some(&t)), AuthOutcome::Rejected(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        for bad in ["abc", "a.b", "a.b.c.d", "!!.??.##"] {
            assert!(matches!(resolver(false).resolve(Some(bad)), AuthOutcome::Rejected(_)));
        }
    }

    #[test]
    fn no_secret_rejects_every_token() {
        let r = IdentityResolver::new(&AuthConfig::default());
        let t = token(Claims {
            address: Some("0x1".into()),
            ..Default::default()
        });
        assert!(matches!(r.resolve(Some(&t)), AuthOutcome::Rejected(_)));
    }

    #[test]
    fn policy_fail_open_vs_fail_closed() {
        let outcome = AuthOutcome::Rejected("signature mismatch".into());

        let open = resolver(false).admit(outcome.clone()).unwrap();
        assert_eq!(open, Identity::anonymous());

        let closed = resolver(true).admit(outcome);
        assert!(matches!(closed, Err(GovcastError::AuthFailed(_))));
    }
}
