pub mod account;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod session;
pub mod validation;
