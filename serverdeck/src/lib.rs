//! Typed client for a small fleet of servers exposing REST dashboards:
//! server list, per-server stats and logs, fleet services and alerts, and a
//! password-gated restart command.

pub mod client;
pub mod decode;
pub mod display;
pub mod error;
pub mod hosts;
pub mod routes;
pub mod transport;
pub mod types;

pub use client::{cancellable, ClientConfig, FleetClient, Freshness, Sequenced};
pub use error::{Error, Result};
pub use routes::{Capability, HostTable};
