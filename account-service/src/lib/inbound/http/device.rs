use std::convert::Infallible;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::domain::session::models::DeviceDescriptor;

/// Longest user agent kept on a session record.
const MAX_USER_AGENT_LEN: usize = 512;

/// Request-derived description of the calling client.
///
/// The client-supplied device id is not part of the request head; handlers
/// that accept one set it on the inner descriptor.
#[derive(Debug, Clone, Default)]
pub struct ClientDevice(pub DeviceDescriptor);

#[async_trait]
impl<S> FromRequestParts<S> for ClientDevice
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect::<String>())
            .filter(|ua| !ua.is_empty());

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientDevice(DeviceDescriptor {
            user_agent,
            ip,
            device_id: None,
        }))
    }
}

impl ClientDevice {
    pub fn with_device_id(self, device_id: Option<String>) -> DeviceDescriptor {
        DeviceDescriptor {
            device_id: device_id.filter(|id| !id.trim().is_empty()),
            ..self.0
        }
    }
}
