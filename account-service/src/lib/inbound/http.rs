pub mod cookies;
pub mod device;
pub mod handlers;
pub mod middleware;
pub mod router;
