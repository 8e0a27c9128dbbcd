//! Bus client and connection management.

mod client;
mod config;

pub use client::BusClient;
pub use config::{BusConfig, BusCredentials};
