//! [`HardwareInterface`] over NVIDIA's `tegrastats` utility.
//!
//! `tegrastats --interval <ms>` prints one status line per interval, so
//! blocking on the next line paces the poller. Each line is parsed into a
//! [`StatsSnapshot`] using the key convention the poller expects:
//!
//! | tegrastats | snapshot key | value |
//! |---|---|---|
//! | `CPU [3%@729,off,...]` | `CPU1`, `CPU2`, ... | percent, or `Text("OFF")` |
//! | `GR3D_FREQ 12%` | `GPU` | percent |
//! | `EMC_FREQ 4%` | `EMC` | percent |
//! | `RAM 2448/7620MB` | `RAM` | used fraction |
//! | `SWAP 0/3810MB` | `SWAP` | used fraction |
//! | `gpu@46.06C` | `Temp gpu` | °C, `-256` when the zone is broken |
//! | `VDD_IN 4382mW/4390mW` | `Power VDD_IN` | instantaneous mW |
//!
//! Uptime and fan duty are not printed by tegrastats and are read from
//! `/proc/uptime` and the hwmon PWM fan under the configured root.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{CollectorError, CollectorResult};
use crate::hardware::HardwareInterface;
use crate::snapshot::{StatValue, StatsSnapshot};

const PWM_MAX: f64 = 255.0;

/// Where and how to run tegrastats.
#[derive(Debug, Clone)]
pub struct TegrastatsConfig {
    pub program: PathBuf,
    pub interval: Duration,
    /// Root under which `proc/uptime` and `sys/class/hwmon` are read.
    pub root: PathBuf,
}

impl Default for TegrastatsConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/tegrastats"),
            interval: Duration::from_millis(1000),
            root: PathBuf::from("/"),
        }
    }
}

/// Compiled patterns for one tegrastats line.
#[derive(Debug, Clone)]
pub struct TegrastatsParser {
    ram: Regex,
    swap: Regex,
    cpu: Regex,
    gpu: Regex,
    emc: Regex,
    temp: Regex,
    power: Regex,
}

impl TegrastatsParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            ram: Regex::new(r"\bRAM (\d+)/(\d+)MB")?,
            swap: Regex::new(r"\bSWAP (\d+)/(\d+)MB")?,
            cpu: Regex::new(r"\bCPU \[([^\]]*)\]")?,
            gpu: Regex::new(r"\bGR3D_FREQ (\d+)%")?,
            emc: Regex::new(r"\bEMC_FREQ (\d+)%")?,
            temp: Regex::new(r"\b([A-Za-z][\w-]*)@(-?\d+(?:\.\d+)?)C\b")?,
            power: Regex::new(r"\b([A-Z][A-Z0-9_]+) (\d+)(?:mW)?/(\d+)(?:mW)?\b")?,
        })
    }

    /// Parse one line. Fields that are absent or malformed are left out.
    pub fn parse(&self, line: &str) -> StatsSnapshot {
        let mut snapshot = StatsSnapshot::new();

        if let Some(fraction) = self.used_fraction(&self.ram, line) {
            snapshot.insert("RAM", fraction);
        }
        if let Some(fraction) = self.used_fraction(&self.swap, line) {
            snapshot.insert("SWAP", fraction);
        }

        if let Some(caps) = self.cpu.captures(line) {
            for (i, core) in caps[1].split(',').enumerate() {
                let key = format!("CPU{}", i + 1);
                let core = core.trim();
                if core.eq_ignore_ascii_case("off") {
                    snapshot.insert(key, StatValue::Text("OFF".to_string()));
                } else if let Some(load) = core.split('%').next().and_then(|p| p.parse::<f64>().ok()) {
                    snapshot.insert(key, load);
                }
            }
        }

        if let Some(load) = percent(&self.gpu, line) {
            snapshot.insert("GPU", load);
        }
        if let Some(load) = percent(&self.emc, line) {
            snapshot.insert("EMC", load);
        }

        for caps in self.temp.captures_iter(line) {
            if let Ok(celsius) = caps[2].parse::<f64>() {
                snapshot.insert(format!("Temp {}", &caps[1]), celsius);
            }
        }

        for caps in self.power.captures_iter(line) {
            if let Ok(milliwatts) = caps[2].parse::<f64>() {
                snapshot.insert(format!("Power {}", &caps[1]), milliwatts);
            }
        }

        snapshot
    }

    fn used_fraction(&self, re: &Regex, line: &str) -> Option<f64> {
        let caps = re.captures(line)?;
        let used: f64 = caps[1].parse().ok()?;
        let total: f64 = caps[2].parse().ok()?;
        (total > 0.0).then(|| used / total)
    }
}

fn percent(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line)?[1].parse().ok()
}

/// Live tegrastats process, one snapshot per printed line.
pub struct TegrastatsSource {
    child: Option<Child>,
    reader: Option<Box<dyn BufRead + Send>>,
    parser: TegrastatsParser,
    root: PathBuf,
    latest: StatsSnapshot,
}

impl TegrastatsSource {
    /// Start tegrastats and take ownership of its output.
    pub fn spawn(config: &TegrastatsConfig) -> CollectorResult<Self> {
        let interval_ms = config.interval.as_millis().max(1);
        let mut child = Command::new(&config.program)
            .arg("--interval")
            .arg(interval_ms.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CollectorError::Spawn {
                path: config.program.clone(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CollectorError::MissingStdout);
        };

        info!(
            program = %config.program.display(),
            interval_ms = interval_ms as u64,
            pid = child.id(),
            "tegrastats started"
        );

        let mut source = Self::from_reader(BufReader::new(stdout), &config.root)?;
        source.child = Some(child);
        Ok(source)
    }

    /// Read tegrastats-formatted lines from an arbitrary reader.
    pub fn from_reader(reader: impl BufRead + Send + 'static, root: impl AsRef<Path>) -> CollectorResult<Self> {
        Ok(Self {
            child: None,
            reader: Some(Box::new(reader)),
            parser: TegrastatsParser::new()?,
            root: root.as_ref().to_path_buf(),
            latest: StatsSnapshot::new(),
        })
    }

    fn next_line(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    info!("tegrastats output ended");
                    break;
                }
                Ok(_) if line.trim().is_empty() => continue,
                Ok(_) => return Some(line),
                Err(e) => {
                    warn!(error = %e, "tegrastats read failed");
                    break;
                }
            }
        }
        self.reader = None;
        None
    }

    fn read_uptime(&self) -> Option<Duration> {
        let raw = std::fs::read_to_string(self.root.join("proc/uptime")).ok()?;
        let secs: f64 = raw.split_whitespace().next()?.parse().ok()?;
        Duration::try_from_secs_f64(secs).ok()
    }

    /// Duty cycle of every PWM fan, as `Fan pwmfan<i>` percentages.
    fn read_fans(&self) -> Vec<(String, f64)> {
        let Ok(entries) = std::fs::read_dir(self.root.join("sys/class/hwmon")) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        dirs.sort();

        let mut fans = Vec::new();
        for dir in dirs {
            let name = std::fs::read_to_string(dir.join("name")).unwrap_or_default();
            if !matches!(name.trim(), "pwmfan" | "pwm-fan") {
                continue;
            }
            let duty = std::fs::read_to_string(dir.join("pwm1"))
                .ok()
                .and_then(|raw| raw.trim().parse::<f64>().ok());
            match duty {
                Some(duty) => fans.push((format!("Fan pwmfan{}", fans.len()), duty / PWM_MAX * 100.0)),
                None => debug!(path = %dir.display(), "fan duty unreadable"),
            }
        }
        fans
    }
}

impl HardwareInterface for TegrastatsSource {
    fn ok(&mut self) -> bool {
        let Some(line) = self.next_line() else {
            return false;
        };
        let mut snapshot = self.parser.parse(&line);
        if let Some(uptime) = self.read_uptime() {
            snapshot.insert("uptime", uptime);
        }
        for (key, duty) in self.read_fans() {
            snapshot.insert(key, duty);
        }
        self.latest = snapshot;
        true
    }

    fn stats(&self) -> StatsSnapshot {
        self.latest.clone()
    }

    fn close(&mut self) {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "tegrastats already exited");
            }
            let _ = child.wait();
            info!("tegrastats stopped");
        }
    }
}

impl Drop for TegrastatsSource {
    fn drop(&mut self) {
        self.close();
    }
}
