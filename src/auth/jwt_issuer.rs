//! Access token issuance.
//!
//! Short-lived HS256 access tokens handed out next to a rotated refresh
//! token. The refresh manager talks to this module through the
//! [`AccessTokenIssuer`] trait so applications can plug in their own signer.
//!
//! # Example
//!
//! ```rust,ignore
//! use authguard::auth::{JwtIssuer, JwtIssuerConfig, TokenSubject};
//!
//! let issuer = JwtIssuer::new(
//!     JwtIssuerConfig::with_secret("your-secret-key", "my-app")
//! )?;
//!
//! let subject = TokenSubject::new("user-123").with_email("user@example.com");
//! let issued = issuer.issue_access_token(&subject, chrono::Utc::now())?;
//! println!("Access token: {}", issued.token);
//! ```

use crate::error::{AuthGuardError, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Configuration for access token issuance.
#[derive(Clone)]
pub struct JwtIssuerConfig {
    secret: Vec<u8>,
    /// Token issuer (iss claim)
    pub issuer: String,
    /// Token audience (aud claim)
    pub audience: Option<String>,
    /// Access token expiry (default: 15 minutes)
    pub access_token_ttl: Duration,
}

impl JwtIssuerConfig {
    /// Create config with an HS256 symmetric key.
    pub fn with_secret(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
            issuer: issuer.into(),
            audience: None,
            access_token_ttl: Duration::from_secs(15 * 60), // 15 min
        }
    }

    /// Set the token audience.
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.audience = Some(aud.into());
        self
    }

    /// Set access token TTL.
    pub fn access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (unix timestamp)
    pub exp: i64,
    /// Issued at (unix timestamp)
    pub iat: i64,
    /// JWT ID (unique identifier)
    pub jti: String,
    /// Always "access"
    pub token_type: String,
    /// User's email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// User's name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// User info needed for token issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    /// User ID (becomes sub claim)
    pub user_id: String,
    /// User email (optional)
    pub email: Option<String>,
    /// User name (optional)
    pub name: Option<String>,
}

impl TokenSubject {
    /// Create a new token subject with a user ID.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
        }
    }

    /// Set the user's email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the user's name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// An encoded access token and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAccessToken {
    pub token: String,
    /// Seconds until expiry
    pub expires_in: u64,
}

/// Produces access tokens for a subject.
pub trait AccessTokenIssuer: Send + Sync {
    /// Issue an access token valid from `now`.
    fn issue_access_token(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken>;
}

/// HS256 access token issuer.
#[derive(Clone)]
pub struct JwtIssuer {
    config: JwtIssuerConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtIssuer {
    /// Create a new issuer with the given configuration.
    pub fn new(config: JwtIssuerConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(AuthGuardError::configuration(
                "JWT signing secret must not be empty",
            ));
        }
        let encoding_key = EncodingKey::from_secret(&config.secret);
        let decoding_key = DecodingKey::from_secret(&config.secret);

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Decode and verify an access token issued by this issuer.
    ///
    /// Expiry is checked against `now` instead of the system clock.
    pub fn verify_access_token(&self, token: &str, now: DateTime<Utc>) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        validation.validate_exp = false;
        match self.config.audience {
            Some(ref aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(
                    target: "auth.token.invalid",
                    error = %e,
                    "Access token failed verification"
                );
                AuthGuardError::InvalidToken
            })?
            .claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthGuardError::InvalidToken);
        }
        if claims.exp < now.timestamp() {
            return Err(AuthGuardError::ExpiredToken);
        }
        Ok(claims)
    }
}

impl AccessTokenIssuer for JwtIssuer {
    fn issue_access_token(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken> {
        let ttl = self.config.access_token_ttl.as_secs();
        let iat = now.timestamp();

        let claims = AccessTokenClaims {
            sub: subject.user_id.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: iat.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX)),
            iat,
            jti: Uuid::new_v4().to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            email: subject.email.clone(),
            name: subject.name.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthGuardError::internal(format!("Failed to encode access token: {}", e)))?;

        Ok(IssuedAccessToken {
            token,
            expires_in: ttl,
        })
    }
}
