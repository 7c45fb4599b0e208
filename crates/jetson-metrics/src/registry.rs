//! Metric registry — named gauge families and info records.
//!
//! A single `RwLock` guards the family map. Updates are whole-value sets,
//! so writers hold the lock only long enough to overwrite one series, and
//! scrapes take a read lock to copy out the current state.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{MetricsError, MetricsResult};
use crate::prometheus::render_prometheus;

/// What a family holds.
enum Family {
    Gauge {
        help: String,
        label_names: Vec<String>,
        /// Label values → current value. Entries are never removed.
        series: BTreeMap<Vec<String>, f64>,
    },
    Info {
        help: String,
        fields: Option<BTreeMap<String, String>>,
    },
}

/// Kind of a family as seen by the exposition layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Info,
}

/// One exposed series: label pairs plus the current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// Point-in-time copy of one family, detached from the registry lock.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

/// Process-wide store of current metric values.
///
/// Constructed once at startup and shared as `Arc<MetricRegistry>` between
/// the collector (writer) and the HTTP endpoint (reader).
#[derive(Default)]
pub struct MetricRegistry {
    families: RwLock<BTreeMap<String, Family>>,
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge family with the given label names.
    ///
    /// Pass an empty slice for a scalar gauge.
    pub fn register_gauge(&self, name: &str, help: &str, label_names: &[&str]) -> MetricsResult<()> {
        validate_metric_name(name)?;
        for label in label_names {
            validate_label_name(label)?;
        }

        let mut families = self.write();
        if families.contains_key(name) {
            return Err(MetricsError::AlreadyRegistered(name.to_string()));
        }
        families.insert(
            name.to_string(),
            Family::Gauge {
                help: help.to_string(),
                label_names: label_names.iter().map(|l| l.to_string()).collect(),
                series: BTreeMap::new(),
            },
        );
        debug!(metric = %name, labels = label_names.len(), "gauge registered");
        Ok(())
    }

    /// Overwrite the value of one series. Creates the series on first use.
    pub fn set(&self, name: &str, label_values: &[&str], value: f64) -> MetricsResult<()> {
        self.update(name, label_values, value, false)
    }

    /// Make `label_values` the only series of a gauge family.
    ///
    /// Used for label-only records, where a changed label set must not leave
    /// the previous series behind.
    pub fn replace(&self, name: &str, label_values: &[&str], value: f64) -> MetricsResult<()> {
        self.update(name, label_values, value, true)
    }

    fn update(&self, name: &str, label_values: &[&str], value: f64, exclusive: bool) -> MetricsResult<()> {
        let mut families = self.write();
        match families.get_mut(name) {
            Some(Family::Gauge {
                label_names,
                series,
                ..
            }) => {
                if label_names.len() != label_values.len() {
                    return Err(MetricsError::LabelMismatch {
                        name: name.to_string(),
                        expected: label_names.len(),
                        got: label_values.len(),
                    });
                }
                let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
                if exclusive {
                    series.clear();
                }
                series.insert(key, value);
                Ok(())
            }
            Some(Family::Info { .. }) => Err(MetricsError::WrongKind {
                name: name.to_string(),
                expected: "gauge",
            }),
            None => Err(MetricsError::UnknownMetric(name.to_string())),
        }
    }

    /// Register an info family. It exposes nothing until a record is published.
    pub fn register_info(&self, name: &str, help: &str) -> MetricsResult<()> {
        validate_metric_name(name)?;

        let mut families = self.write();
        if families.contains_key(name) {
            return Err(MetricsError::AlreadyRegistered(name.to_string()));
        }
        families.insert(
            name.to_string(),
            Family::Info {
                help: help.to_string(),
                fields: None,
            },
        );
        debug!(metric = %name, "info registered");
        Ok(())
    }

    /// Replace the record held by an info family.
    pub fn publish_info(&self, name: &str, fields: &BTreeMap<String, String>) -> MetricsResult<()> {
        for key in fields.keys() {
            validate_label_name(key)?;
        }

        let mut families = self.write();
        match families.get_mut(name) {
            Some(Family::Info { fields: current, .. }) => {
                *current = Some(fields.clone());
                Ok(())
            }
            Some(Family::Gauge { .. }) => Err(MetricsError::WrongKind {
                name: name.to_string(),
                expected: "info",
            }),
            None => Err(MetricsError::UnknownMetric(name.to_string())),
        }
    }

    /// Current value of one gauge series, if it has ever been set.
    pub fn get(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        let families = self.read();
        match families.get(name)? {
            Family::Gauge { series, .. } => {
                let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
                series.get(&key).copied()
            }
            Family::Info { .. } => None,
        }
    }

    /// Current record of an info family.
    pub fn info(&self, name: &str) -> Option<BTreeMap<String, String>> {
        let families = self.read();
        match families.get(name)? {
            Family::Info { fields, .. } => fields.clone(),
            Family::Gauge { .. } => None,
        }
    }

    /// Number of series currently held by a gauge family.
    pub fn series_count(&self, name: &str) -> usize {
        let families = self.read();
        match families.get(name) {
            Some(Family::Gauge { series, .. }) => series.len(),
            _ => 0,
        }
    }

    /// Copy out every family, sorted by name.
    pub fn snapshot(&self) -> Vec<FamilySnapshot> {
        let families = self.read();
        families
            .iter()
            .map(|(name, family)| match family {
                Family::Gauge {
                    help,
                    label_names,
                    series,
                } => FamilySnapshot {
                    name: name.clone(),
                    help: help.clone(),
                    kind: MetricKind::Gauge,
                    samples: series
                        .iter()
                        .map(|(values, value)| Sample {
                            labels: label_names.iter().cloned().zip(values.iter().cloned()).collect(),
                            value: *value,
                        })
                        .collect(),
                },
                Family::Info { help, fields } => FamilySnapshot {
                    name: name.clone(),
                    help: help.clone(),
                    kind: MetricKind::Info,
                    samples: fields
                        .iter()
                        .map(|f| Sample {
                            labels: f.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                            value: 1.0,
                        })
                        .collect(),
                },
            })
            .collect()
    }

    /// Render the whole registry in Prometheus text format.
    pub fn render(&self) -> String {
        render_prometheus(&self.snapshot())
    }

    // A panic while holding the lock cannot leave a family half-written,
    // so a poisoned lock is safe to keep using.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Family>> {
        self.families.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Family>> {
        self.families.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_metric_name(name: &str) -> MetricsResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MetricsError::InvalidName(name.to_string()))
    }
}

fn validate_label_name(name: &str) -> MetricsResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid && !name.starts_with("__") {
        Ok(())
    } else {
        Err(MetricsError::InvalidName(name.to_string()))
    }
}
