pub mod cache;
pub mod notifier;
pub mod repositories;
