use markerdrive::io::{ConfigIoError, DriveConfig};
use markerdrive::markers::{CornerSelection, Role};

#[test]
fn default_config_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drive.json");

    let mut cfg = DriveConfig::default();
    cfg.controller.cycle_delay_ms = 250;
    cfg.controller.max_startup_polls = Some(300);
    cfg.gate.min_command_interval_ms = 50;
    cfg.write_json(&path).unwrap();

    let back = DriveConfig::load_json(&path).unwrap();
    assert_eq!(back, cfg);
    assert!(back.build_pipeline().is_ok());
}

#[test]
fn custom_bindings_are_loaded_and_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bindings.json");
    std::fs::write(
        &path,
        r#"{
            "resolver": {
                "bindings": [
                    { "marker_id": 1, "role": "top_left", "selection": "centroid" },
                    { "marker_id": 2, "role": "top_right", "selection": { "corner": 3 } },
                    { "marker_id": 3, "role": "bottom_left", "selection": { "corner": 1 } },
                    { "marker_id": 4, "role": "bottom_right", "selection": { "corner": 0 } }
                ]
            },
            "rectifier": { "width": 320, "height": 240 }
        }"#,
    )
    .unwrap();

    let cfg = DriveConfig::load_json(&path).unwrap();
    let bindings = &cfg.resolver.bindings;
    assert_eq!(bindings.binding(Role::TopLeft).marker_id, 1);
    assert_eq!(
        bindings.binding(Role::TopLeft).selection,
        CornerSelection::Centroid
    );
    assert_eq!(bindings.for_marker(4).map(|b| b.role), Some(Role::BottomRight));
    assert_eq!(cfg.resolver.min_markers, 3);

    let pipeline = cfg.build_pipeline().unwrap();
    assert_eq!(pipeline.rectifier().params().width, 320);
    assert_eq!(pipeline.rectifier().params().height, 240);
}

#[test]
fn duplicate_marker_ids_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{
            "resolver": {
                "bindings": [
                    { "marker_id": 1, "role": "top_left", "selection": "centroid" },
                    { "marker_id": 1, "role": "top_right", "selection": "centroid" },
                    { "marker_id": 3, "role": "bottom_left", "selection": "centroid" },
                    { "marker_id": 4, "role": "bottom_right", "selection": "centroid" }
                ]
            }
        }"#,
    )
    .unwrap();

    let err = DriveConfig::load_json(&path).unwrap_err();
    assert!(matches!(err, ConfigIoError::Json(_)));
    assert!(err.to_string().contains("more than once"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DriveConfig::load_json(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigIoError::Io(_)));
}
