use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use jwt::{Claims, Header, RegisteredClaims, SignWithKey, Token, VerifyWithKey};
use sha2::Sha256;

use crate::config::JwtConfig;

/// Clock skew tolerated when validating token timestamps, in seconds.
const LEEWAY_SECONDS: i64 = 60;

/// A verified bearer token from the identity provider.
///
/// The provider signs tokens with a shared secret and an agreed issuer; the
/// subject is the provider's opaque string user id, which doubles as the
/// `users` primary key.
pub struct IdentityToken {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expiration: Option<DateTime<Utc>>,
}

impl IdentityToken {
    pub fn verify(config: &JwtConfig, token: &str) -> Option<Self> {
        let key = Hmac::<Sha256>::new_from_slice(config.secret.as_bytes()).ok()?;
        let token: Token<Header, Claims, _> = token.verify_with_key(&key).ok()?;

        let claims = token.claims();

        if claims.registered.issuer.as_ref() != Some(&config.issuer) {
            return None;
        }

        let subject = claims.registered.subject.clone()?;

        let now = Utc::now();

        let iat = claims
            .registered
            .issued_at
            .and_then(|x| Utc.timestamp_opt(x as i64, 0).single());
        if let Some(iat) = iat {
            if iat > now + Duration::seconds(LEEWAY_SECONDS) {
                return None;
            }
        }

        let nbf = claims
            .registered
            .not_before
            .and_then(|x| Utc.timestamp_opt(x as i64, 0).single());
        if let Some(nbf) = nbf {
            if nbf > now + Duration::seconds(LEEWAY_SECONDS) {
                return None;
            }
        }

        let exp = claims
            .registered
            .expiration
            .and_then(|x| Utc.timestamp_opt(x as i64, 0).single());
        if let Some(exp) = exp {
            if exp < now - Duration::seconds(LEEWAY_SECONDS) {
                return None;
            }
        }

        let email = claims
            .private
            .get("email")
            .and_then(|v| v.as_str())
            .map(ToOwned::to_owned);
        let name = claims
            .private
            .get("name")
            .and_then(|v| v.as_str())
            .map(ToOwned::to_owned);

        Some(Self {
            subject,
            email,
            name,
            issued_at: iat,
            expiration: exp,
        })
    }

    /// Signs this token the way the identity provider would. The server never
    /// issues tokens in production, this exists for test traffic.
    pub fn sign(&self, config: &JwtConfig) -> Option<String> {
        let key = Hmac::<Sha256>::new_from_slice(config.secret.as_bytes()).ok()?;

        let mut claims = Claims::new(RegisteredClaims {
            issuer: Some(config.issuer.clone()),
            subject: Some(self.subject.clone()),
            audience: None,
            expiration: self.expiration.map(|x| x.timestamp() as u64),
            not_before: None,
            issued_at: Some(
                self.issued_at
                    .unwrap_or_else(Utc::now)
                    .timestamp() as u64,
            ),
            json_web_token_id: None,
        });

        if let Some(email) = &self.email {
            claims
                .private
                .insert("email".to_string(), serde_json::Value::from(email.clone()));
        }
        if let Some(name) = &self.name {
            claims
                .private
                .insert("name".to_string(), serde_json::Value::from(name.clone()));
        }

        claims.sign_with_key(&key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            issuer: "test-issuer".to_string(),
        }
    }

    fn token(subject: &str) -> IdentityToken {
        IdentityToken {
            subject: subject.to_string(),
            email: Some("ansel@example.com".to_string()),
            name: Some("Ansel".to_string()),
            issued_at: Some(Utc::now()),
            expiration: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[test]
    fn test_roundtrip() {
        let config = config();
        let signed = token("user_123").sign(&config).expect("failed to sign");

        let verified = IdentityToken::verify(&config, &signed).expect("failed to verify");
        assert_eq!(verified.subject, "user_123");
        assert_eq!(verified.email.as_deref(), Some("ansel@example.com"));
        assert_eq!(verified.name.as_deref(), Some("Ansel"));
    }

    #[test]
    fn test_rejects_wrong_issuer() {
        let signed = token("user_123")
            .sign(&JwtConfig {
                secret: "test-secret".to_string(),
                issuer: "somebody-else".to_string(),
            })
            .unwrap();

        assert!(IdentityToken::verify(&config(), &signed).is_none());
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let signed = token("user_123")
            .sign(&JwtConfig {
                secret: "other-secret".to_string(),
                issuer: "test-issuer".to_string(),
            })
            .unwrap();

        assert!(IdentityToken::verify(&config(), &signed).is_none());
    }

    #[test]
    fn test_rejects_expired() {
        let config = config();
        let mut expired = token("user_123");
        expired.issued_at = Some(Utc::now() - Duration::hours(2));
        expired.expiration = Some(Utc::now() - Duration::hours(1));

        let signed = expired.sign(&config).unwrap();
        assert!(IdentityToken::verify(&config, &signed).is_none());
    }

    #[test]
    fn test_allows_clock_skew() {
        let config = config();
        let mut skewed = token("user_123");
        skewed.issued_at = Some(Utc::now() + Duration::seconds(30));

        let signed = skewed.sign(&config).unwrap();
        assert!(IdentityToken::verify(&config, &signed).is_some());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(IdentityToken::verify(&config(), "not-a-token").is_none());
    }
}
