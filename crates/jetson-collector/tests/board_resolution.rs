//! Board identity resolution against fake filesystem roots.

use std::fs;
use std::path::Path;

use jetson_collector::board::{BOARD_METRIC, DEFAULT_OS_NAME, UNKNOWN};
use jetson_collector::{BoardHints, BoardInfoStyle, BoardResolver, ReleaseFamilyTable, SystemFiles};
use jetson_metrics::MetricRegistry;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn orin_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "proc/device-tree/model", b"NVIDIA Jetson AGX Orin Developer Kit\0");
    write(
        root.path(),
        "proc/device-tree/compatible",
        b"nvidia,p3737-0000+p3701-0005\0nvidia,p3701-0005\0nvidia,tegra234\0",
    );
    write(
        root.path(),
        "etc/nv_tegra_release",
        b"# R35 (release), REVISION: 3.1, GCID: 32827747, BOARD: t186ref, EABI: aarch64, DATE: Sun Mar 19 15:19:21 UTC 2023\n",
    );
    write(
        root.path(),
        "etc/os-release",
        b"NAME=\"Ubuntu\"\nVERSION=\"20.04.6 LTS (Focal Fossa)\"\nPRETTY_NAME=\"Ubuntu 20.04.6 LTS\"\n",
    );
    root
}

fn resolver(root: &Path) -> BoardResolver {
    BoardResolver::new(SystemFiles::new(root), ReleaseFamilyTable::default()).unwrap()
}

#[test]
fn empty_root_resolves_everything_to_unknown_except_os() {
    let root = tempfile::tempdir().unwrap();
    let identity = resolver(root.path()).resolve(None);

    assert_eq!(identity.model, UNKNOWN);
    assert_eq!(identity.module, UNKNOWN);
    assert_eq!(identity.soc, UNKNOWN);
    assert_eq!(identity.firmware_release, UNKNOWN);
    assert_eq!(identity.release_family, UNKNOWN);
    assert_eq!(identity.os_name, DEFAULT_OS_NAME);
}

#[test]
fn full_root_resolves_every_field_from_files() {
    let root = orin_root();
    let identity = resolver(root.path()).resolve(None);

    assert_eq!(identity.model, "NVIDIA Jetson AGX Orin Developer Kit");
    assert_eq!(identity.module, "AGX Orin");
    assert_eq!(identity.soc, "Tegra234");
    assert_eq!(identity.firmware_release, "R35.3.1");
    assert_eq!(identity.release_family, "JetPack 5.1.1");
    assert_eq!(identity.os_name, "Ubuntu 20.04.6 LTS");
}

#[test]
fn malformed_release_file_only_affects_release_fields() {
    let root = orin_root();
    write(root.path(), "etc/nv_tegra_release", b"\xff\xfe not a release line");

    let identity = resolver(root.path()).resolve(None);

    assert_eq!(identity.firmware_release, UNKNOWN);
    assert_eq!(identity.release_family, UNKNOWN);
    assert_eq!(identity.model, "NVIDIA Jetson AGX Orin Developer Kit");
    assert_eq!(identity.soc, "Tegra234");
    assert_eq!(identity.os_name, "Ubuntu 20.04.6 LTS");
}

#[test]
fn release_without_family_entry_keeps_release() {
    let root = orin_root();
    write(root.path(), "etc/nv_tegra_release", b"# R28 (release), REVISION: 2.1\n");

    let identity = resolver(root.path()).resolve(None);

    assert_eq!(identity.firmware_release, "R28.2.1");
    assert_eq!(identity.release_family, UNKNOWN);
}

#[test]
fn soc_falls_back_to_cpuinfo() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "proc/device-tree/compatible", b"nvidia,p3450-0000\0");
    write(
        root.path(),
        "proc/cpuinfo",
        b"processor\t: 0\nmodel name\t: ARMv8 Processor rev 1 (v8l)\nHardware\t: NVIDIA Jetson Nano Developer Kit\n",
    );

    let identity = resolver(root.path()).resolve(None);
    assert_eq!(identity.soc, "NVIDIA Jetson Nano Developer Kit");
}

#[test]
fn hints_override_files() {
    let root = orin_root();
    let hints = BoardHints {
        model: Some("Custom Carrier".into()),
        module: Some("Orin NX".into()),
        soc: Some("Tegra234-custom".into()),
    };

    let identity = resolver(root.path()).resolve(Some(&hints));

    assert_eq!(identity.model, "Custom Carrier");
    assert_eq!(identity.module, "Orin NX");
    assert_eq!(identity.soc, "Tegra234-custom");
    // Release and OS never come from hints.
    assert_eq!(identity.firmware_release, "R35.3.1");
}

#[test]
fn configured_families_extend_defaults() {
    let root = orin_root();
    write(root.path(), "etc/nv_tegra_release", b"# R35 (release), REVISION: 5.0\n");

    let mut table = ReleaseFamilyTable::default();
    table.extend([("R35.5", "JetPack 5.1.3")]);
    let identity = BoardResolver::new(SystemFiles::new(root.path()), table)
        .unwrap()
        .resolve(None);

    assert_eq!(identity.release_family, "JetPack 5.1.3");
}

#[test]
fn unreadable_descriptor_is_skipped() {
    let root = orin_root();
    // A directory where a file is expected fails to read.
    fs::remove_file(root.path().join("proc/device-tree/model")).unwrap();
    fs::create_dir_all(root.path().join("proc/device-tree/model")).unwrap();

    let identity = resolver(root.path()).resolve(None);

    assert_eq!(identity.model, UNKNOWN);
    assert_eq!(identity.module, UNKNOWN);
    assert_eq!(identity.soc, "Tegra234");
}

#[test]
fn gauge_republish_after_os_upgrade_keeps_one_series() {
    let root = orin_root();
    let resolver = resolver(root.path());
    let registry = MetricRegistry::new();
    BoardInfoStyle::Gauge.register(&registry).unwrap();

    let before = resolver.publish(&registry, BoardInfoStyle::Gauge, None);
    assert_eq!(before.os_name, "Ubuntu 20.04.6 LTS");

    write(root.path(), "etc/os-release", b"NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 22.04.4 LTS\"\n");
    let after = resolver.publish(&registry, BoardInfoStyle::Gauge, None);
    assert_eq!(after.os_name, "Ubuntu 22.04.4 LTS");

    assert_eq!(registry.series_count(BOARD_METRIC), 1);
    assert_eq!(registry.get(BOARD_METRIC, &after.label_values()), Some(1.0));
    assert_eq!(registry.get(BOARD_METRIC, &before.label_values()), None);

    let body = registry.render();
    assert_eq!(body.matches("jetson_board{").count(), 1);
    assert!(!body.contains("Ubuntu 20.04.6 LTS"));
}

#[test]
fn info_republish_after_os_upgrade_replaces_record() {
    let root = orin_root();
    let resolver = resolver(root.path());
    let registry = MetricRegistry::new();
    BoardInfoStyle::Info.register(&registry).unwrap();

    resolver.publish(&registry, BoardInfoStyle::Info, None);
    write(root.path(), "etc/os-release", b"PRETTY_NAME=\"Ubuntu 22.04.4 LTS\"\n");
    resolver.publish(&registry, BoardInfoStyle::Info, None);

    let record = registry.info(BOARD_METRIC).unwrap();
    assert_eq!(record["os"], "Ubuntu 22.04.4 LTS");
    assert_eq!(registry.render().matches("jetson_board_info{").count(), 1);
}
