use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use uuid::Uuid;

use crate::jwt::AccessClaims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::jwt::RefreshClaims;

/// Signing configuration for both token classes.
#[derive(Debug, Clone)]
pub struct TokenIssuerConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// Identity a token pair is minted for.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub id: &'a str,
    pub roles: &'a [String],
    pub organization: Option<&'a str>,
}

/// Freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_jti: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Mints and verifies access and refresh tokens.
///
/// Each token class has its own signing key, so leaking the access secret
/// does not allow refresh tokens to be forged (and vice versa).
pub struct TokenIssuer {
    access: JwtHandler,
    refresh: JwtHandler,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Create a new issuer.
    ///
    /// # Errors
    /// * `WeakSecret` - Either secret is shorter than 32 bytes
    /// * `SharedSecret` - Both token classes were given the same secret
    pub fn new(config: TokenIssuerConfig) -> Result<Self, JwtError> {
        if config.access_secret == config.refresh_secret {
            return Err(JwtError::SharedSecret);
        }

        Ok(Self {
            access: JwtHandler::new(&config.access_secret)?,
            refresh: JwtHandler::new(&config.refresh_secret)?,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access/refresh pair for `subject`.
    ///
    /// # Errors
    /// * `EncodingFailed` - Signing either token failed
    pub fn issue(
        &self,
        subject: TokenSubject<'_>,
        now: DateTime<Utc>,
    ) -> Result<IssuedTokens, JwtError> {
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let access_claims = AccessClaims {
            sub: subject.id.to_string(),
            roles: subject.roles.to_vec(),
            org: subject.organization.map(str::to_string),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
        };

        let refresh_jti = Uuid::new_v4().to_string();
        let refresh_claims = RefreshClaims {
            sub: subject.id.to_string(),
            jti: refresh_jti.clone(),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
        };

        Ok(IssuedTokens {
            access_token: self.access.encode(&access_claims)?,
            access_expires_at,
            refresh_token: self.refresh.encode(&refresh_claims)?,
            refresh_jti,
            refresh_expires_at,
        })
    }

    /// Verify an access token's signature and expiry.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.access.decode(token)
    }

    /// Verify a refresh token's signature and expiry.
    ///
    /// Only proves the token was minted here; the caller must still check
    /// that it has not been revoked.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        self.refresh.decode(token)
    }
}
