pub mod application;
pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
