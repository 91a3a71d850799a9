/// Shared modules for the market dashboard
pub mod client;
pub mod composer;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod panel;
pub mod scheduler;
pub mod selection;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
