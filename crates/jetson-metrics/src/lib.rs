//! jetson-metrics — the process-wide metric registry for the Jetson exporter.
//!
//! Holds the current value of every gauge the collector publishes and the
//! static board info record, and renders them in the Prometheus text
//! exposition format for the `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! MetricRegistry
//!   ├── register_gauge() / set()          ← telemetry poller, once per cycle
//!   ├── register_info() / publish_info()  ← board identity resolver
//!   └── render() → text/plain for /metrics
//! ```
//!
//! Series are never expired: a label value that stops appearing keeps its
//! last published value until the process exits.

pub mod error;
pub mod prometheus;
pub mod registry;

pub use error::{MetricsError, MetricsResult};
pub use prometheus::{CONTENT_TYPE, render_prometheus};
pub use registry::{FamilySnapshot, MetricKind, MetricRegistry, Sample};
