//! Telemetry exporter for networked mining devices.
//!
//! On every scrape the service reads the target list, polls each device's
//! `/api/system/info` document and translates it into one Influx line
//! protocol record for Telegraf.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Target Store   │────>│     Poller      │────>│   HTTP Server   │
//! │  (ips.txt)      │     │  (translate)    │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! miner-manager --config miner-manager.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ManagerConfig`] for configuration options.

pub mod config;
pub mod difficulty;
pub mod http;
pub mod poller;
pub mod status;
pub mod targets;
pub mod translate;

pub use config::ManagerConfig;
pub use http::HttpServer;
pub use poller::{PollError, Poller, ScrapeReport, SharedPoller};
pub use status::RawStatus;
pub use targets::{SharedTargetStore, TargetStore};
pub use translate::translate;
