use serde::Deserialize;
use serde::Serialize;

/// Claims carried by a short-lived access token.
///
/// Self-contained: verifying the signature is enough to trust `roles` and
/// `org` until `exp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (account identifier)
    pub sub: String,

    /// Role names granted to the subject
    #[serde(default)]
    pub roles: Vec<String>,

    /// Organization (tenant) identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    /// Unique token identifier
    pub jti: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Claims carried by a long-lived refresh token.
///
/// Carries no roles; they are re-read from the account on refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(exp: i64) -> AccessClaims {
        AccessClaims {
            sub: "user123".to_string(),
            roles: vec!["user".to_string()],
            org: None,
            jti: "jti".to_string(),
            iat: 0,
            exp,
        }
    }

    #[test]
    fn test_org_omitted_when_absent() {
        let json = serde_json::to_value(access(1000)).unwrap();
        assert!(json.get("org").is_none());
        assert_eq!(json["roles"][0], "user");
    }

    #[test]
    fn test_roles_default_to_empty() {
        let claims: AccessClaims = serde_json::from_value(serde_json::json!({
            "sub": "abc",
            "jti": "j",
            "iat": 1,
            "exp": 2
        }))
        .unwrap();
        assert!(claims.roles.is_empty());
        assert!(claims.org.is_none());
    }
}
