//! Refresh-token cookie handling and the security headers sent with it.

use axum::http::header;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use chrono::Duration;

pub const REFRESH_COOKIE: &str = "refreshToken";
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth/refresh-token";

fn cookie_header(value: &str, max_age_secs: i64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path={}; Max-Age={}",
        REFRESH_COOKIE, value, REFRESH_COOKIE_PATH, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// Headers for a response that hands out a refresh token.
pub fn with_refresh_cookie(token: &str, max_age: Duration, secure: bool) -> HeaderMap {
    let mut headers = security_headers();
    if let Some(cookie) = cookie_header(token, max_age.num_seconds().max(0), secure) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    headers
}

/// Headers that expire the refresh cookie on the client.
pub fn clearing_refresh_cookie(secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = cookie_header("", 0, secure) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    headers
}

fn security_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers
}

/// The refresh token sent in the `Cookie` header(s), if any.
pub fn refresh_token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
