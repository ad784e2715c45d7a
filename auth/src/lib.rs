//! Authentication utilities library
//!
//! Provides reusable authentication infrastructure for services:
//! - Password hashing (Argon2id)
//! - JWT encoding and validation (HS256)
//! - Access/refresh token issuance with per-class signing secrets
//! - Opaque random tokens and their storage digests
//!
//! Services define their own account model and map their identities onto
//! [`TokenSubject`]; nothing in here knows about accounts or storage.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! let is_valid = hasher.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Token Pair
//! ```
//! use auth::{TokenIssuer, TokenIssuerConfig, TokenSubject};
//! use chrono::{Duration, Utc};
//!
//! let issuer = TokenIssuer::new(TokenIssuerConfig {
//!     access_secret: b"access_secret_at_least_32_bytes_long!".to_vec(),
//!     refresh_secret: b"refresh_secret_at_least_32_bytes_long".to_vec(),
//!     access_ttl: Duration::minutes(15),
//!     refresh_ttl: Duration::days(7),
//! })
//! .unwrap();
//!
//! let roles = vec!["user".to_string()];
//! let tokens = issuer
//!     .issue(
//!         TokenSubject { id: "user123", roles: &roles, organization: None },
//!         Utc::now(),
//!     )
//!     .unwrap();
//!
//! let claims = issuer.verify_access(&tokens.access_token).unwrap();
//! assert_eq!(claims.sub, "user123");
//! ```

pub mod issuer;
pub mod jwt;
pub mod opaque;
pub mod password;

// Re-export commonly used items
pub use issuer::IssuedTokens;
pub use issuer::TokenIssuer;
pub use issuer::TokenIssuerConfig;
pub use issuer::TokenSubject;
pub use jwt::AccessClaims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::RefreshClaims;
pub use password::PasswordError;
pub use password::PasswordHasher;
