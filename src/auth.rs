use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Longest token lifetime accepted, ten years.
pub const MAX_TOKEN_TTL: std::time::Duration =
    std::time::Duration::from_secs(10 * 365 * 24 * 3600);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication credentials required")]
    MissingCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token is missing")]
    MissingToken,

    #[error("Invalid token")]
    MalformedToken,

    #[error("Invalid token")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken | AuthError::InvalidSignature => "invalid_token",
            AuthError::Expired => "token_expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Checks the configured credential and signs HS256 bearer tokens.
pub struct TokenIssuer {
    username: String,
    password: String,
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        secret: impl AsRef<[u8]>,
        ttl: std::time::Duration,
    ) -> Self {
        TokenIssuer {
            username: username.into(),
            password: password.into(),
            secret: secret.as_ref().to_vec(),
            // clamped, so the conversion always fits
            ttl: Duration::from_std(ttl.min(MAX_TOKEN_TTL))
                .unwrap_or_else(|_| Duration::hours(24)),
        }
    }

    pub fn issue(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        self.issue_at(username, password, Utc::now())
    }

    pub fn issue_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if username != self.username || password != self.password {
            return Err(AuthError::InvalidCredentials);
        }

        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::MalformedToken)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));

        Ok(IssuedToken {
            access_token: format!("{signing_input}.{signature}"),
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        let header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| AuthError::MalformedToken)?;
        let header: serde_json::Value =
            serde_json::from_slice(&header).map_err(|_| AuthError::MalformedToken)?;
        if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return Err(AuthError::MalformedToken);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::MalformedToken)?;
        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::MalformedToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Splits an `Authorization: Basic` value into username and password.
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Extracts the token from an `Authorization: Bearer` value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "admin",
            "password123",
            "test-secret",
            std::time::Duration::from_secs(24 * 3600),
        )
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let token = issuer.issue("admin", "password123").unwrap();
        let claims = issuer.verify(&token.access_token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp, token.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_long_ttl_is_clamped() {
        let issuer = TokenIssuer::new(
            "admin",
            "password123",
            "test-secret",
            std::time::Duration::from_secs(u64::MAX),
        );
        let now = Utc::now();
        let token = issuer.issue_at("admin", "password123", now).unwrap();
        assert_eq!(
            token.expires_at.timestamp() - now.timestamp(),
            MAX_TOKEN_TTL.as_secs() as i64
        );
        assert!(issuer.verify_at(&token.access_token, now).is_ok());

        // expiry saturates instead of overflowing the calendar
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let token = issuer.issue_at("admin", "password123", late).unwrap();
        assert_eq!(token.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_wrong_credentials() {
        let issuer = issuer();
        assert_eq!(
            issuer.issue("admin", "nope").unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            issuer.issue("root", "password123").unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer();
        let issued_at = Utc::now() - Duration::hours(25);
        let token = issuer.issue_at("admin", "password123", issued_at).unwrap();
        assert_eq!(
            issuer.verify(&token.access_token).unwrap_err(),
            AuthError::Expired
        );
        // still valid just before expiry
        let just_before = token.expires_at - Duration::seconds(1);
        assert!(issuer.verify_at(&token.access_token, just_before).is_ok());
    }

    #[test]
    fn test_tampered_token() {
        let issuer = issuer();
        let token = issuer.issue("admin", "password123").unwrap().access_token;

        let forged_claims = Claims {
            sub: "admin".to_string(),
            iat: 0,
            exp: i64::MAX,
        };
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap()),
            parts[2]
        );
        assert_eq!(
            issuer.verify(&forged).unwrap_err(),
            AuthError::InvalidSignature
        );

        let other = TokenIssuer::new(
            "admin",
            "password123",
            "another-secret",
            std::time::Duration::from_secs(60),
        );
        assert_eq!(
            other.verify(&token).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_malformed_token() {
        let issuer = issuer();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(
                issuer.verify(token).unwrap_err(),
                AuthError::MalformedToken,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_header_parsing() {
        // admin:password123
        let header = "Basic YWRtaW46cGFzc3dvcmQxMjM=";
        assert_eq!(
            parse_basic_credentials(header),
            Some(("admin".to_string(), "password123".to_string()))
        );
        assert_eq!(parse_basic_credentials("Bearer xyz"), None);

        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Token abc"), None);
    }
}
