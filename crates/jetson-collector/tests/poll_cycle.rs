//! End-to-end: tegrastats output → poller → Prometheus exposition.

use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;

use jetson_collector::poller::{TEMPERATURES, USAGE_CPU, USAGE_DISK, USAGE_POWER, USAGE_RAM};
use jetson_collector::{
    BoardResolver, DiskProbe, DiskUsage, HardwareSession, Poller, PollerConfig, ReleaseFamilyTable,
    SystemFiles, TegrastatsSource,
};
use jetson_metrics::MetricRegistry;
use tokio::sync::watch;

const LINES: &str = "\
RAM 2000/8000MB (lfb 1x2MB) SWAP 0/4000MB (cached 0MB) CPU [10%@729,20%@729] EMC_FREQ 0% GR3D_FREQ 5% cpu@45C gpu@41C VDD_IN 4000mW/4000mW
RAM 4000/8000MB (lfb 1x2MB) SWAP 0/4000MB (cached 0MB) CPU [30%@729,off] EMC_FREQ 0% GR3D_FREQ 7% cpu@46C gpu@-256C VDD_IN 4100mW/4050mW
RAM 6000/8000MB (lfb 1x2MB) SWAP 0/4000MB (cached 0MB) CPU [40%@729,off] EMC_FREQ 0% GR3D_FREQ 9% cpu@47C VDD_IN 4200mW/4100mW
";

struct FixedDisk;

impl DiskProbe for FixedDisk {
    fn usage(&self, _path: &Path) -> io::Result<DiskUsage> {
        Ok(DiskUsage {
            total: 32 * 1_048_576 * 1024,
            used: 12 * 1_048_576 * 1024,
            free: 20 * 1_048_576 * 1024,
        })
    }
}

#[test]
fn tegrastats_stream_publishes_last_known_values() {
    let root = tempfile::tempdir().unwrap();
    let registry = Arc::new(MetricRegistry::new());
    let resolver = BoardResolver::new(SystemFiles::new(root.path()), ReleaseFamilyTable::default()).unwrap();
    let poller = Poller::new(registry.clone(), resolver, FixedDisk, PollerConfig::default()).unwrap();

    let source = TegrastatsSource::from_reader(Cursor::new(LINES), root.path()).unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = poller.run(HardwareSession::new(source), rx);

    assert_eq!(summary.cycles, 3);
    assert!(summary.exhausted);
    assert_eq!(summary.dropped, 1);

    assert_eq!(registry.get(USAGE_RAM, &[]), Some(75.0));
    assert_eq!(registry.get(USAGE_CPU, &["cpu1"]), Some(40.0));
    // Core 2 went offline after the first line; its last value stays exposed.
    assert_eq!(registry.get(USAGE_CPU, &["cpu2"]), Some(20.0));
    assert_eq!(registry.get(TEMPERATURES, &["cpu"]), Some(47.0));
    // Invalid on line two, absent on line three.
    assert_eq!(registry.get(TEMPERATURES, &["gpu"]), Some(41.0));
    assert_eq!(registry.get(USAGE_POWER, &["vdd_in"]), Some(4200.0));
    assert_eq!(registry.get(USAGE_DISK, &["used"]), Some(12288.0));
    assert_eq!(registry.get(USAGE_DISK, &["available"]), Some(20480.0));

    let body = registry.render();
    assert!(body.contains("# TYPE jetson_usage_cpu gauge"));
    assert!(body.contains("jetson_temperatures{sensor=\"gpu\"} 41\n"));
    assert!(body.contains("jetson_board_info{"));
    assert!(body.contains("os=\"Linux\""));
}
