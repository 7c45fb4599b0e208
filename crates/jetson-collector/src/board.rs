//! Board identity resolution.
//!
//! Static board metadata comes from several imperfect sources: structured
//! fields on the live hardware handle, device-tree nodes, `/proc/cpuinfo`,
//! the L4T release file and `/etc/os-release`. Each field is resolved by an
//! ordered chain of sources where the first present value wins. A source
//! that is missing, unreadable or malformed yields nothing and the chain
//! moves on; resolution itself never fails.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jetson_metrics::{MetricRegistry, MetricsResult};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::CollectorResult;

/// Value published for any field no source could resolve.
pub const UNKNOWN: &str = "unknown";

/// Final fallback for the OS name. Deliberately not [`UNKNOWN`].
pub const DEFAULT_OS_NAME: &str = "Linux";

/// Name of the board info metric.
pub const BOARD_METRIC: &str = "jetson_board";

const BOARD_HELP: &str = "Jetson static board info";

/// Label names of the board record, in exposition order for the gauge style.
pub const BOARD_LABELS: [&str; 6] = ["model", "module", "soc", "l4t", "jetpack", "os"];

const DEVICE_TREE_MODEL: &str = "proc/device-tree/model";
const DEVICE_TREE_COMPATIBLE: &str = "proc/device-tree/compatible";
const CPUINFO: &str = "proc/cpuinfo";
const TEGRA_RELEASE: &str = "etc/nv_tegra_release";
const OS_RELEASE: &str = "etc/os-release";

/// Model substrings mapped to module names, most specific first.
///
/// "AGX Orin" must be tried before the bare "Orin" family fragment, and
/// "Orin Nano" before "Nano".
const MODULE_FRAGMENTS: &[(&str, &str)] = &[
    ("agx orin", "AGX Orin"),
    ("orin nano", "Orin Nano"),
    ("orin nx", "Orin NX"),
    ("xavier nx", "Xavier NX"),
    ("agx xavier", "AGX Xavier"),
    ("tx2", "TX2"),
    ("nano", "Nano"),
    ("orin", "Orin"),
    ("xavier", "Xavier"),
];

/// Board fields exposed directly by a hardware handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardHints {
    pub model: Option<String>,
    pub module: Option<String>,
    pub soc: Option<String>,
}

/// Fully resolved board metadata. Every field is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardIdentity {
    pub model: String,
    pub module: String,
    pub soc: String,
    /// L4T release, e.g. `R35.3.1`.
    pub firmware_release: String,
    /// JetPack label mapped from the L4T release.
    pub release_family: String,
    pub os_name: String,
}

impl BoardIdentity {
    /// Label values in [`BOARD_LABELS`] order.
    pub fn label_values(&self) -> [&str; 6] {
        [
            self.model.as_str(),
            self.module.as_str(),
            self.soc.as_str(),
            self.firmware_release.as_str(),
            self.release_family.as_str(),
            self.os_name.as_str(),
        ]
    }

    /// The record as a field map keyed by [`BOARD_LABELS`].
    pub fn fields(&self) -> BTreeMap<String, String> {
        BOARD_LABELS
            .iter()
            .zip(self.label_values())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// How the board record is exposed. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardInfoStyle {
    /// A structured info record, rendered as `jetson_board_info{...} 1`.
    #[default]
    Info,
    /// A label-only gauge `jetson_board{...}` fixed at 1.
    Gauge,
}

impl BoardInfoStyle {
    /// Register the board metric in this style.
    pub fn register(self, registry: &MetricRegistry) -> MetricsResult<()> {
        match self {
            BoardInfoStyle::Info => registry.register_info(BOARD_METRIC, BOARD_HELP),
            BoardInfoStyle::Gauge => registry.register_gauge(BOARD_METRIC, BOARD_HELP, &BOARD_LABELS),
        }
    }

    /// Publish a resolved identity in this style.
    pub fn publish(self, registry: &MetricRegistry, identity: &BoardIdentity) -> MetricsResult<()> {
        match self {
            BoardInfoStyle::Info => registry.publish_info(BOARD_METRIC, &identity.fields()),
            BoardInfoStyle::Gauge => registry.replace(BOARD_METRIC, &identity.label_values(), 1.0),
        }
    }
}

impl FromStr for BoardInfoStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(BoardInfoStyle::Info),
            "gauge" => Ok(BoardInfoStyle::Gauge),
            other => Err(format!("unknown board info style `{other}` (expected `info` or `gauge`)")),
        }
    }
}

/// L4T release → JetPack label table.
///
/// Lookup tries an exact key first, then the longest key the release
/// extends by whole components: `R35.4` covers `R35.4.1` but not `R35.40`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFamilyTable {
    entries: Vec<(String, String)>,
}

impl Default for ReleaseFamilyTable {
    fn default() -> Self {
        Self::new([
            ("R32", "JetPack 4.x"),
            ("R35.1", "JetPack 5.0.2"),
            ("R35.2", "JetPack 5.1"),
            ("R35.3.1", "JetPack 5.1.1"),
            ("R35.4", "JetPack 5.1.2"),
            ("R36", "JetPack 6.x"),
            ("R36.3", "JetPack 6.0"),
            ("R36.4", "JetPack 6.1"),
        ])
    }
}

impl ReleaseFamilyTable {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self { entries: Vec::new() };
        table.extend(entries);
        table
    }

    /// Add entries, replacing the label of any key already present.
    pub fn extend<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, family) in entries {
            let key = key.into();
            let family = family.into();
            match self.entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = family,
                None => self.entries.push((key, family)),
            }
        }
    }

    pub fn lookup(&self, release: &str) -> Option<&str> {
        if let Some((_, family)) = self.entries.iter().find(|(k, _)| k == release) {
            return Some(family.as_str());
        }
        self.entries
            .iter()
            .filter(|(k, _)| covers(k, release))
            .max_by_key(|(k, _)| k.len())
            .map(|(_, family)| family.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn covers(key: &str, release: &str) -> bool {
    release
        .strip_prefix(key)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Read-only access to the local descriptor files under a filesystem root.
#[derive(Debug, Clone)]
pub struct SystemFiles {
    root: PathBuf,
}

impl SystemFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Files of the running host.
    pub fn host() -> Self {
        Self::new("/")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file relative to the root. Any failure yields `None`.
    pub fn read_bytes(&self, relative: &str) -> Option<Vec<u8>> {
        let path = self.root.join(relative);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "descriptor unavailable");
                None
            }
        }
    }

    /// Read a UTF-8 file relative to the root. Any failure yields `None`.
    pub fn read_string(&self, relative: &str) -> Option<String> {
        let bytes = self.read_bytes(relative)?;
        match String::from_utf8(bytes) {
            Ok(s) => Some(s),
            Err(_) => {
                debug!(file = relative, "descriptor is not valid UTF-8");
                None
            }
        }
    }
}

/// Resolves [`BoardIdentity`] from hints and local files.
#[derive(Debug, Clone)]
pub struct BoardResolver {
    files: SystemFiles,
    families: ReleaseFamilyTable,
    parser: DescriptorParser,
}

impl BoardResolver {
    pub fn new(files: SystemFiles, families: ReleaseFamilyTable) -> CollectorResult<Self> {
        Ok(Self {
            files,
            families,
            parser: DescriptorParser::new()?,
        })
    }

    /// Resolve every field, highest-priority source first.
    pub fn resolve(&self, hints: Option<&BoardHints>) -> BoardIdentity {
        let hints = hints.cloned().unwrap_or_default();

        let model = first_present(&[&|| present(&hints.model), &|| self.device_tree_model()])
            .unwrap_or_else(|| UNKNOWN.to_string());

        let soc = first_present(&[
            &|| present(&hints.soc),
            &|| self.compatible_soc(),
            &|| self.cpuinfo_soc(),
        ])
        .unwrap_or_else(|| UNKNOWN.to_string());

        let module = first_present(&[
            &|| present(&hints.module),
            &|| derive_module(&model).map(str::to_string),
        ])
        .unwrap_or_else(|| UNKNOWN.to_string());

        let firmware_release = self.tegra_release();
        let release_family = firmware_release
            .as_deref()
            .and_then(|release| self.families.lookup(release))
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN.to_string());
        let firmware_release = firmware_release.unwrap_or_else(|| UNKNOWN.to_string());

        let os_name = self
            .os_name()
            .unwrap_or_else(|| DEFAULT_OS_NAME.to_string());

        BoardIdentity {
            model,
            module,
            soc,
            firmware_release,
            release_family,
            os_name,
        }
    }

    /// Resolve and publish the identity. Registry errors are logged, not returned.
    pub fn publish(
        &self,
        registry: &MetricRegistry,
        style: BoardInfoStyle,
        hints: Option<&BoardHints>,
    ) -> BoardIdentity {
        let identity = self.resolve(hints);
        if let Err(e) = style.publish(registry, &identity) {
            warn!(error = %e, "failed to publish board info");
        } else {
            info!(
                model = %identity.model,
                module = %identity.module,
                soc = %identity.soc,
                l4t = %identity.firmware_release,
                jetpack = %identity.release_family,
                os = %identity.os_name,
                "board info published"
            );
        }
        identity
    }

    fn device_tree_model(&self) -> Option<String> {
        parse_device_tree_model(&self.files.read_string(DEVICE_TREE_MODEL)?)
    }

    fn compatible_soc(&self) -> Option<String> {
        self.parser.compatible_soc(&self.files.read_bytes(DEVICE_TREE_COMPATIBLE)?)
    }

    fn cpuinfo_soc(&self) -> Option<String> {
        parse_cpuinfo_soc(&self.files.read_string(CPUINFO)?)
    }

    fn tegra_release(&self) -> Option<String> {
        self.parser.tegra_release(&self.files.read_string(TEGRA_RELEASE)?)
    }

    fn os_name(&self) -> Option<String> {
        parse_os_release(&self.files.read_string(OS_RELEASE)?)
    }
}

/// First value produced by an ordered chain of sources.
fn first_present(chain: &[&dyn Fn() -> Option<String>]) -> Option<String> {
    chain.iter().find_map(|source| source())
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Map a model string to a module name by substring match.
pub fn derive_module(model: &str) -> Option<&'static str> {
    let model = model.to_lowercase();
    MODULE_FRAGMENTS
        .iter()
        .find(|(fragment, _)| model.contains(fragment))
        .map(|(_, module)| *module)
}

/// Device-tree strings are NUL-terminated.
pub fn parse_device_tree_model(raw: &str) -> Option<String> {
    let model = raw.trim_matches(|c: char| c == '\0' || c == '\r' || c == '\n');
    (!model.is_empty()).then(|| model.to_string())
}

/// First cpuinfo line naming the vendor or SoC family, value part only.
pub fn parse_cpuinfo_soc(raw: &str) -> Option<String> {
    let line = raw
        .lines()
        .find(|line| line.contains("NVIDIA") || line.contains("Tegra"))?;
    let value = match line.split_once(':') {
        Some((_, value)) => value.trim(),
        None => line.trim(),
    };
    (!value.is_empty()).then(|| value.to_string())
}

/// Compiled patterns for the descriptors that need them.
#[derive(Debug, Clone)]
pub struct DescriptorParser {
    tegra: Regex,
    release: Regex,
    revision: Regex,
}

impl DescriptorParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tegra: Regex::new(r"(?i)tegra([^,]+)")?,
            release: Regex::new(r"R(\d+)")?,
            revision: Regex::new(r"REVISION:\s*([\d.]+)")?,
        })
    }

    /// Find the `tegra<id>` entry in a NUL-separated compatible list.
    pub fn compatible_soc(&self, raw: &[u8]) -> Option<String> {
        let joined: Vec<u8> = raw.iter().map(|&b| if b == 0 { b',' } else { b }).collect();
        let text = String::from_utf8_lossy(&joined);
        let caps = self.tegra.captures(&text)?;
        Some(format!("Tegra{}", &caps[1]))
    }

    /// Parse `/etc/nv_tegra_release`, e.g.
    /// `# R35 (release), REVISION: 3.1, GCID: ..., BOARD: t186ref, ...` → `R35.3.1`.
    pub fn tegra_release(&self, raw: &str) -> Option<String> {
        let release = self.release.captures(raw)?;
        let mut l4t = format!("R{}", &release[1]);
        if let Some(revision) = self.revision.captures(raw) {
            l4t.push('.');
            l4t.push_str(revision[1].trim_end_matches('.'));
        }
        Some(l4t)
    }
}

/// `PRETTY_NAME` if set, otherwise `NAME`.
pub fn parse_os_release(raw: &str) -> Option<String> {
    let mut kv = BTreeMap::new();
    for line in raw.lines() {
        if let Some((key, value)) = line.trim_end().split_once('=') {
            kv.insert(key.trim(), value.trim_matches('"'));
        }
    }
    ["PRETTY_NAME", "NAME"]
        .iter()
        .filter_map(|key| kv.get(key))
        .find(|value| !value.is_empty())
        .map(|value| value.to_string())
}
