//! exporter.toml configuration.
//!
//! Every field has a default, so the file is optional. Command-line flags
//! ([`Overrides`]) are applied on top of whatever the file provides.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use jetson_collector::{BoardInfoStyle, PollerConfig, ReleaseFamilyTable, TegrastatsConfig};
use serde::Deserialize;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Address the scrape endpoint binds to.
    pub listen: SocketAddr,
    /// Filesystem root the board descriptors and sysfs readings live under.
    pub root: PathBuf,
    /// Filesystem reported under `jetson_usage_disk`.
    pub disk_path: PathBuf,
    pub board_info_style: BoardInfoStyle,
    /// Re-publish board info every N poll cycles; 0 publishes once.
    pub republish_every: u64,
    pub tegrastats: TegrastatsSection,
    /// Extra L4T release → JetPack entries, merged over the built-in table.
    pub release_families: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TegrastatsSection {
    pub program: PathBuf,
    pub interval_ms: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            root: PathBuf::from("/"),
            disk_path: PathBuf::from("/"),
            board_info_style: BoardInfoStyle::default(),
            republish_every: 0,
            tegrastats: TegrastatsSection::default(),
            release_families: BTreeMap::new(),
        }
    }
}

impl Default for TegrastatsSection {
    fn default() -> Self {
        let defaults = TegrastatsConfig::default();
        Self {
            program: defaults.program,
            interval_ms: defaults.interval.as_millis() as u64,
        }
    }
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ExporterConfig =
            toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load the file if given, then apply command-line overrides.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tegrastats.interval_ms == 0 {
            bail!("tegrastats interval must be at least 1 ms");
        }
        if self.release_families.keys().any(|k| k.trim().is_empty()) {
            bail!("release family keys must not be empty");
        }
        Ok(())
    }

    pub fn tegrastats_config(&self) -> TegrastatsConfig {
        TegrastatsConfig {
            program: self.tegrastats.program.clone(),
            interval: Duration::from_millis(self.tegrastats.interval_ms),
            root: self.root.clone(),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            disk_path: self.disk_path.clone(),
            board_style: self.board_info_style,
            republish_every: self.republish_every,
        }
    }

    /// Built-in release families with the configured entries merged in.
    pub fn release_table(&self) -> ReleaseFamilyTable {
        let mut table = ReleaseFamilyTable::default();
        table.extend(self.release_families.clone());
        table
    }
}

/// Command-line flags that take precedence over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Address to serve /metrics on.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Filesystem root for board descriptors and sysfs.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Filesystem whose space is exported.
    #[arg(long)]
    pub disk_path: Option<PathBuf>,

    /// Path to the tegrastats binary.
    #[arg(long)]
    pub tegrastats: Option<PathBuf>,

    /// Sampling interval passed to tegrastats, in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Board info exposition: `info` or `gauge`.
    #[arg(long)]
    pub board_info_style: Option<BoardInfoStyle>,

    /// Re-publish board info every N cycles (0 disables).
    #[arg(long)]
    pub republish_every: Option<u64>,

    /// Extra release family entry, e.g. `R35.5=JetPack 5.1.3`. Repeatable.
    #[arg(long = "release-family", value_parser = parse_release_family)]
    pub release_families: Vec<(String, String)>,
}

impl Overrides {
    pub fn apply(&self, config: &mut ExporterConfig) {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(disk_path) = &self.disk_path {
            config.disk_path = disk_path.clone();
        }
        if let Some(program) = &self.tegrastats {
            config.tegrastats.program = program.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.tegrastats.interval_ms = interval_ms;
        }
        if let Some(style) = self.board_info_style {
            config.board_info_style = style;
        }
        if let Some(every) = self.republish_every {
            config.republish_every = every;
        }
        config
            .release_families
            .extend(self.release_families.iter().cloned());
    }
}

fn parse_release_family(raw: &str) -> Result<(String, String), String> {
    let (release, family) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected RELEASE=FAMILY, got `{raw}`"))?;
    let (release, family) = (release.trim(), family.trim());
    if release.is_empty() || family.is_empty() {
        return Err(format!("expected RELEASE=FAMILY, got `{raw}`"));
    }
    Ok((release.to_string(), family.to_string()))
}
