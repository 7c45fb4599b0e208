//! One cycle's worth of hardware readings.
//!
//! The key set is not fixed: hardware revisions add and remove cores,
//! thermal zones and power rails. Keys follow a naming convention that
//! encodes the dimension (`CPU3`, `Temp gpu`, `Power VDD_IN`), and the
//! poller discovers them by pattern each cycle.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

/// A single reading.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Number(f64),
    Duration(Duration),
    /// Non-numeric reading, e.g. `"OFF"` for a parked CPU core.
    Text(String),
}

impl StatValue {
    /// The numeric value, if this reading is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StatValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// The duration, if this reading is a duration.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            StatValue::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Number(v)
    }
}

impl From<Duration> for StatValue {
    fn from(d: Duration) -> Self {
        StatValue::Duration(d)
    }
}

/// Sparse map of named readings for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    values: BTreeMap<String, StatValue>,
}

impl StatsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a reading.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StatValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StatValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.values.get(key)
    }

    /// Numeric reading under `key`, if present and numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(StatValue::as_number)
    }

    pub fn duration(&self, key: &str) -> Option<Duration> {
        self.get(key).and_then(StatValue::as_duration)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All readings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Readings whose key starts with `prefix`, yielded with the prefix stripped.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a StatValue)> {
        self.values
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(move |(k, v)| (&k[prefix.len()..], v))
    }
}

impl<K: Into<String>, V: Into<StatValue>> FromIterator<(K, V)> for StatsSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = StatsSnapshot::new();
        for (k, v) in iter {
            snapshot.insert(k, v);
        }
        snapshot
    }
}
