//! Telemetry poller — snapshot → gauges, once per hardware cycle.
//!
//! The poller owns the hardware session for its whole life. It publishes
//! board identity once, then loops while the interface reports it is
//! usable. Cadence comes entirely from the interface blocking in `ok()`.
//!
//! Each reading is published independently: a missing, non-numeric or
//! sentinel value affects only its own gauge for that cycle. Series are
//! never cleared, so a sensor that drops out keeps its last value.

use std::path::PathBuf;
use std::sync::Arc;

use jetson_metrics::MetricRegistry;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::board::{BoardInfoStyle, BoardResolver};
use crate::disk::DiskProbe;
use crate::error::CollectorResult;
use crate::hardware::{HardwareInterface, HardwareSession};
use crate::snapshot::{StatValue, StatsSnapshot};

pub const UPTIME: &str = "jetson_uptime";
pub const USAGE_CPU: &str = "jetson_usage_cpu";
pub const USAGE_GPU: &str = "jetson_usage_gpu";
pub const USAGE_RAM: &str = "jetson_usage_ram";
pub const USAGE_FAN: &str = "jetson_usage_fan";
pub const USAGE_DISK: &str = "jetson_usage_disk";
pub const TEMPERATURES: &str = "jetson_temperatures";
pub const USAGE_POWER: &str = "jetson_usage_power";

/// Reading reported by a thermal zone that has no valid value.
pub const TEMPERATURE_INVALID: f64 = -256.0;

const UPTIME_KEY: &str = "uptime";
const GPU_KEY: &str = "GPU";
const RAM_KEY: &str = "RAM";
const FAN_KEY: &str = "Fan pwmfan0";
const CPU_PREFIX: &str = "CPU";
const TEMP_PREFIX: &str = "Temp ";
const POWER_PREFIX: &str = "Power ";

/// Poller settings fixed at startup.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Filesystem whose space is published under `jetson_usage_disk`.
    pub disk_path: PathBuf,
    pub board_style: BoardInfoStyle,
    /// Re-resolve and re-publish board info every N cycles. 0 disables.
    pub republish_every: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            disk_path: PathBuf::from("/"),
            board_style: BoardInfoStyle::default(),
            republish_every: 0,
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Gauge updates written to the registry.
    pub published: usize,
    /// Readings equal to the invalid sentinel.
    pub dropped: usize,
    /// Readings skipped because they were not numeric or the update failed.
    pub skipped: usize,
}

/// Outcome of a whole [`Poller::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub published: u64,
    pub dropped: u64,
    /// True when the loop ended because the interface was exhausted.
    pub exhausted: bool,
}

/// Translates hardware snapshots into registry updates.
pub struct Poller<D> {
    registry: Arc<MetricRegistry>,
    resolver: BoardResolver,
    disk: D,
    config: PollerConfig,
}

impl<D: DiskProbe> Poller<D> {
    /// Register every metric the poller writes.
    pub fn new(
        registry: Arc<MetricRegistry>,
        resolver: BoardResolver,
        disk: D,
        config: PollerConfig,
    ) -> CollectorResult<Self> {
        config.board_style.register(&registry)?;
        registry.register_gauge(UPTIME, "System Uptime in seconds", &[])?;
        registry.register_gauge(USAGE_GPU, "GPU Usage (%)", &[])?;
        registry.register_gauge(USAGE_CPU, "CPU Usage (%)", &["core"])?;
        registry.register_gauge(USAGE_RAM, "RAM Used (%)", &[])?;
        registry.register_gauge(USAGE_FAN, "Fan Speed (%)", &[])?;
        registry.register_gauge(USAGE_DISK, "Disk Space (MB)", &["type"])?;
        registry.register_gauge(TEMPERATURES, "Sensor Temperatures (°C)", &["sensor"])?;
        registry.register_gauge(USAGE_POWER, "Power Consumption (mW)", &["component"])?;

        Ok(Self {
            registry,
            resolver,
            disk,
            config,
        })
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Run until the interface is exhausted or shutdown is signalled.
    ///
    /// The session is dropped, and the interface released, before returning.
    pub fn run<H: HardwareInterface>(
        &self,
        mut session: HardwareSession<H>,
        shutdown: watch::Receiver<bool>,
    ) -> PollSummary {
        let hints = session.board_hints();
        self.resolver
            .publish(&self.registry, self.config.board_style, hints.as_ref());

        info!(disk = %self.config.disk_path.display(), "telemetry poller started");
        let mut summary = PollSummary::default();

        loop {
            if *shutdown.borrow() {
                info!("telemetry poller shutting down");
                break;
            }
            if !session.ok() {
                info!("hardware interface exhausted");
                summary.exhausted = true;
                break;
            }

            let report = self.poll_once(&session.stats());
            summary.cycles += 1;
            summary.published += report.published as u64;
            summary.dropped += report.dropped as u64;

            let every = self.config.republish_every;
            if every > 0 && summary.cycles % every == 0 {
                let hints = session.board_hints();
                self.resolver
                    .publish(&self.registry, self.config.board_style, hints.as_ref());
            }
        }

        info!(
            cycles = summary.cycles,
            published = summary.published,
            dropped = summary.dropped,
            "telemetry poller stopped"
        );
        summary
    }

    /// Publish everything one snapshot (plus the disk probe) provides.
    pub fn poll_once(&self, snapshot: &StatsSnapshot) -> CycleReport {
        let mut report = CycleReport::default();

        match snapshot.duration(UPTIME_KEY) {
            Some(uptime) => self.set(&mut report, UPTIME, &[], uptime.as_secs_f64()),
            None => self.set_scaled(&mut report, snapshot, UPTIME_KEY, UPTIME, 1.0),
        }

        for (index, value) in snapshot.with_prefix(CPU_PREFIX) {
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let core = format!("cpu{index}");
            self.set_value(&mut report, USAGE_CPU, &[core.as_str()], value);
        }

        self.set_scaled(&mut report, snapshot, GPU_KEY, USAGE_GPU, 1.0);
        self.set_scaled(&mut report, snapshot, RAM_KEY, USAGE_RAM, 100.0);
        self.set_scaled(&mut report, snapshot, FAN_KEY, USAGE_FAN, 1.0);

        match self.disk.usage(&self.config.disk_path) {
            Ok(usage) => {
                self.set(&mut report, USAGE_DISK, &["available"], usage.free_mb() as f64);
                self.set(&mut report, USAGE_DISK, &["used"], usage.used_mb() as f64);
            }
            Err(e) => {
                warn!(path = %self.config.disk_path.display(), error = %e, "disk usage unavailable");
                report.skipped += 1;
            }
        }

        for (sensor, value) in snapshot.with_prefix(TEMP_PREFIX) {
            let sensor = sensor.to_lowercase();
            if value.as_number() == Some(TEMPERATURE_INVALID) {
                debug!(%sensor, "invalid temperature reading dropped");
                report.dropped += 1;
                continue;
            }
            self.set_value(&mut report, TEMPERATURES, &[sensor.as_str()], value);
        }

        for (component, value) in snapshot.with_prefix(POWER_PREFIX) {
            let component = component.to_lowercase();
            self.set_value(&mut report, USAGE_POWER, &[component.as_str()], value);
        }

        report
    }

    /// Publish `key` multiplied by `scale`, if the snapshot carries it.
    fn set_scaled(
        &self,
        report: &mut CycleReport,
        snapshot: &StatsSnapshot,
        key: &str,
        metric: &str,
        scale: f64,
    ) {
        if !snapshot.contains(key) {
            return;
        }
        match snapshot.number(key) {
            Some(v) => self.set(report, metric, &[], v * scale),
            None => self.skip(report, metric),
        }
    }

    fn set_value(&self, report: &mut CycleReport, metric: &str, labels: &[&str], value: &StatValue) {
        match value.as_number() {
            Some(v) => self.set(report, metric, labels, v),
            None => self.skip(report, metric),
        }
    }

    fn set(&self, report: &mut CycleReport, metric: &str, labels: &[&str], value: f64) {
        match self.registry.set(metric, labels, value) {
            Ok(()) => report.published += 1,
            Err(e) => {
                warn!(%metric, error = %e, "gauge update failed");
                report.skipped += 1;
            }
        }
    }

    fn skip(&self, report: &mut CycleReport, metric: &str) {
        debug!(%metric, "non-numeric reading skipped");
        report.skipped += 1;
    }
}
