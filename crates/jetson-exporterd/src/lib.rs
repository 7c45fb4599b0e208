//! jetson-exporterd — scrape endpoint and wiring for the Jetson exporter.
//!
//! The binary in `main.rs` assembles the pieces exposed here:
//!
//! ```text
//! ExporterConfig (TOML + CLI overrides)
//!   ├── TegrastatsSource ──► HardwareSession ──► Poller::run   (spawn_blocking)
//!   │                                               │
//!   │                                               ▼
//!   │                                      Arc<MetricRegistry>
//!   │                                               │
//!   └── build_router ──► GET /metrics ◄─────────────┘
//!                        GET /healthz
//! ```

pub mod config;
pub mod server;

pub use config::{ExporterConfig, Overrides};
pub use server::{ServerState, build_router};
