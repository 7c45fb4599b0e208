//! Prometheus text exposition format.
//!
//! Renders registry snapshots into the Prometheus text exposition format
//! (version 0.0.4) for scraping by a Prometheus server or compatible agent.

use std::fmt::Write;

use crate::registry::{FamilySnapshot, MetricKind};

/// Content type served alongside [`render_prometheus`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render family snapshots into Prometheus text format.
///
/// Gauges keep their registered name. Info families are exposed as a gauge
/// named `<name>_info` whose labels carry the record and whose value is 1.
pub fn render_prometheus(families: &[FamilySnapshot]) -> String {
    let mut out = String::new();

    for family in families {
        let name = match family.kind {
            MetricKind::Gauge => family.name.clone(),
            MetricKind::Info => format!("{}_info", family.name),
        };

        let _ = writeln!(out, "# HELP {name} {}", escape_help(&family.help));
        let _ = writeln!(out, "# TYPE {name} gauge");

        for sample in &family.samples {
            out.push_str(&name);
            if !sample.labels.is_empty() {
                out.push('{');
                for (i, (label, value)) in sample.labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{label}=\"{}\"", escape_label_value(value));
                }
                out.push('}');
            }
            let _ = writeln!(out, " {}", format_value(sample.value));
        }
    }

    out
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Sample;

    fn gauge(name: &str, samples: Vec<Sample>) -> FamilySnapshot {
        FamilySnapshot {
            name: name.to_string(),
            help: format!("{name} help"),
            kind: MetricKind::Gauge,
            samples,
        }
    }

    fn sample(labels: &[(&str, &str)], value: f64) -> Sample {
        Sample {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }

    #[test]
    fn render_empty() {
        assert_eq!(render_prometheus(&[]), "");
    }

    #[test]
    fn render_registered_family_without_samples() {
        let output = render_prometheus(&[gauge("jetson_usage_gpu", vec![])]);
        assert!(output.contains("# HELP jetson_usage_gpu jetson_usage_gpu help"));
        assert!(output.contains("# TYPE jetson_usage_gpu gauge"));
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn render_scalar_and_labeled() {
        let output = render_prometheus(&[
            gauge("jetson_uptime", vec![sample(&[], 3600.5)]),
            gauge(
                "jetson_usage_cpu",
                vec![sample(&[("core", "cpu1")], 12.0), sample(&[("core", "cpu2")], 7.25)],
            ),
        ]);

        assert!(output.contains("\njetson_uptime 3600.5\n"));
        assert!(output.contains("jetson_usage_cpu{core=\"cpu1\"} 12\n"));
        assert!(output.contains("jetson_usage_cpu{core=\"cpu2\"} 7.25\n"));
    }

    #[test]
    fn render_info_as_gauge_with_suffix() {
        let info = FamilySnapshot {
            name: "jetson_board".to_string(),
            help: "Jetson static board info".to_string(),
            kind: MetricKind::Info,
            samples: vec![sample(&[("model", "Orin"), ("os", "Ubuntu 22.04")], 1.0)],
        };
        let output = render_prometheus(&[info]);

        assert!(output.contains("# TYPE jetson_board_info gauge"));
        assert!(output.contains("jetson_board_info{model=\"Orin\",os=\"Ubuntu 22.04\"} 1\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        let output = render_prometheus(&[gauge(
            "jetson_board",
            vec![sample(&[("model", "a \"quoted\"\\path\nnext")], 1.0)],
        )]);
        assert!(output.contains(r#"model="a \"quoted\"\\path\nnext""#));
    }

    #[test]
    fn special_values_use_prometheus_spelling() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(-256.0), "-256");
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let output = render_prometheus(&[gauge(
            "jetson_usage_disk",
            vec![sample(&[("type", "used")], 1024.0), sample(&[("type", "available")], 2048.0)],
        )]);

        // Every non-comment line: metric_name{labels} value
        for line in output.lines() {
            if line.starts_with('#') {
                continue;
            }
            let (series, value) = line.rsplit_once(' ').expect("series and value");
            assert!(series.starts_with("jetson_usage_disk{"), "line: {line}");
            assert!(value.parse::<f64>().is_ok(), "line: {line}");
        }
    }
}
