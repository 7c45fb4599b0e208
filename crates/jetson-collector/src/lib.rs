//! jetson-collector — hardware telemetry collection for the Jetson exporter.
//!
//! Reads device state from a [`HardwareInterface`], resolves a stable board
//! identity from a chain of best-effort sources, and writes normalized
//! readings into a shared [`MetricRegistry`](jetson_metrics::MetricRegistry).
//!
//! # Architecture
//!
//! ```text
//! Poller::run(HardwareSession, shutdown)
//!   ├── BoardResolver::resolve() → BoardIdentity → jetson_board info (once)
//!   └── loop while hardware.ok()
//!       ├── hardware.stats() → StatsSnapshot
//!       ├── poll_once(): uptime, cpu, gpu, ram, fan, temperatures, power
//!       └── DiskProbe::usage("/") → jetson_usage_disk
//! ```
//!
//! The only fatal condition is the hardware interface reporting it is no
//! longer usable; every other bad reading is dropped for that metric and
//! that cycle only.

pub mod board;
pub mod disk;
pub mod error;
pub mod hardware;
pub mod poller;
pub mod snapshot;
pub mod tegrastats;

pub use board::{
    BoardHints, BoardIdentity, BoardInfoStyle, BoardResolver, DescriptorParser, ReleaseFamilyTable,
    SystemFiles,
};
pub use disk::{DiskProbe, DiskUsage, StatvfsProbe};
pub use error::{CollectorError, CollectorResult};
pub use hardware::{HardwareInterface, HardwareSession};
pub use poller::{CycleReport, PollSummary, Poller, PollerConfig};
pub use snapshot::{StatValue, StatsSnapshot};
pub use tegrastats::{TegrastatsConfig, TegrastatsSource};
