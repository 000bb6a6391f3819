use crate::{AuthClaims, Error, Result, Signer};
use anyhow::Context;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

#[derive(Clone)]
pub struct Hs256AuthConfig {
    pub secret: String,
    pub ttl: Duration,
}

impl std::fmt::Debug for Hs256AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256AuthConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// HS256 bearer-token signer for the `/api/auth` and `/api/tasks` HTTP surface.
#[derive(Clone)]
pub struct AuthSigner {
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for AuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSigner")
            .field("ttl", &self.ttl)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

impl AuthSigner {
    pub fn from_config(cfg: Hs256AuthConfig) -> Result<Self> {
        if cfg.secret.is_empty() {
            return Err(Error::msg("jwt secret must not be empty"));
        }
        let secret = cfg.secret.as_bytes();
        Ok(Self {
            ttl: cfg.ttl,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }
}

impl Signer for AuthSigner {
    fn issue(&self, user_id: i64) -> Result<String> {
        let now = Utc::now().timestamp();
        let iat: usize = now.try_into().unwrap_or(0);
        let exp: usize = (now + self.ttl.as_secs().try_into().unwrap_or(i64::MAX))
            .try_into()
            .unwrap_or(usize::MAX);

        let claims = AuthClaims { user_id, iat, exp };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("encode auth token")
            .map_err(Error::from)
    }

    fn verify(&self, token: &str) -> Result<AuthClaims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AuthClaims>(token, &self.decoding_key, &validation)
            .context("verify auth token")
            .map_err(Error::from)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_token() {
        let signer = AuthSigner::from_config(Hs256AuthConfig {
            secret: "test-secret".to_string(),
            ttl: Duration::from_secs(86_400),
        })
        .unwrap();

        let token = signer.issue(42).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(AuthSigner::from_config(Hs256AuthConfig {
            secret: String::new(),
            ttl: Duration::from_secs(1),
        })
        .is_err());
    }
}
