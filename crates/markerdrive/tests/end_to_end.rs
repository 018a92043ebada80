use approx::assert_abs_diff_eq;
use async_trait::async_trait;
use markerdrive::channel::LineChannel;
use markerdrive::controller::{FrameSource, GeometryOutcome, LoopController, LoopState};
use markerdrive::core::{Raster, RasterView};
use markerdrive::io::DriveConfig;
use markerdrive::markers::{Marker, MarkerDetector};
use nalgebra::Point2;
use std::time::Duration;

const RED: [u8; 3] = [255, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

/// Marker square with corners clockwise from its top-left.
fn square(id: u32, x: f32, y: f32, s: f32) -> Marker {
    Marker::new(
        id,
        [
            Point2::new(x, y),
            Point2::new(x + s, y),
            Point2::new(x + s, y + s),
            Point2::new(x, y + s),
        ],
    )
}

/// Inner corners land on (20, 20), (120, 20), (20, 100) and (120, 100).
fn screen_markers() -> Vec<Marker> {
    vec![
        square(819, 10.0, 10.0, 10.0),
        square(273, 120.0, 10.0, 10.0),
        square(61, 10.0, 100.0, 10.0),
        square(922, 120.0, 100.0, 10.0),
    ]
}

/// Left of x = 70 is red, the rest blue.
fn split_frame() -> Raster {
    let (w, h) = (160, 130);
    let mut data = Vec::with_capacity(w * h * 3);
    for _y in 0..h {
        for x in 0..w {
            data.extend_from_slice(if x < 70 { &RED } else { &BLUE });
        }
    }
    Raster::from_raw(w, h, 3, data).unwrap()
}

#[test]
fn four_markers_rectify_to_the_default_square() {
    let pipeline = DriveConfig::default().build_pipeline().unwrap();
    let frame = split_frame();
    let geometry = pipeline.process(&frame.view(), &screen_markers());

    assert_eq!(geometry.outcome, GeometryOutcome::Rectified);
    assert!(geometry.outcome.diagnostic().is_none());
    let rectified = geometry.rectified.expect("rectified");
    assert_eq!(
        (rectified.image.width, rectified.image.height, rectified.image.channels),
        (700, 700, 3)
    );

    let h = rectified.h_rect_from_img;
    let expected = [
        (Point2::new(20.0, 20.0), Point2::new(0.0, 0.0)),
        (Point2::new(120.0, 20.0), Point2::new(700.0, 0.0)),
        (Point2::new(20.0, 100.0), Point2::new(0.0, 700.0)),
        (Point2::new(120.0, 100.0), Point2::new(700.0, 700.0)),
    ];
    for (src, dst) in expected {
        let p = h.apply(src);
        assert_abs_diff_eq!(p.x, dst.x, epsilon = 0.5);
        assert_abs_diff_eq!(p.y, dst.y, epsilon = 0.5);
    }

    // x = 70 in the frame maps to column 350
    assert_eq!(rectified.image.pixel(100, 350), Some(&RED[..]));
    assert_eq!(rectified.image.pixel(600, 350), Some(&BLUE[..]));
    assert_eq!(rectified.image.pixel(600, 10), Some(&BLUE[..]));

    let outline = geometry.outline.expect("outline");
    assert_eq!(outline[0], Point2::new(20.0, 20.0));
    assert_eq!(outline[2], Point2::new(120.0, 100.0));
    assert_eq!(geometry.markers[0].label_anchor, Point2::new(10.0, 10.0));
}

#[test]
fn centroid_selection_uses_marker_centres() {
    let cfg: DriveConfig = serde_json::from_str(r#"{ "corner_selection": "centroid" }"#).unwrap();
    let pipeline = cfg.build_pipeline().unwrap();
    let frame = split_frame();
    let geometry = pipeline.process(&frame.view(), &screen_markers());
    let outline = geometry.outline.expect("outline");
    assert_eq!(outline[0], Point2::new(15.0, 15.0));
    assert_eq!(outline[2], Point2::new(125.0, 105.0));
}

#[test]
fn unbound_ids_do_not_count_as_corners() {
    let pipeline = DriveConfig::default().build_pipeline().unwrap();
    let frame = split_frame();
    let mut markers = screen_markers();
    markers[3].id = 5;
    let geometry = pipeline.process(&frame.view(), &markers);
    match geometry.outcome {
        GeometryOutcome::InsufficientMarkers { detected, missing } => {
            assert_eq!(detected, 4);
            assert_eq!(missing, vec![markerdrive::Role::BottomRight]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(geometry.rectified.is_none());
}

#[test]
fn collapsed_markers_are_reported_as_degenerate() {
    let pipeline = DriveConfig::default().build_pipeline().unwrap();
    let frame = split_frame();
    let markers: Vec<Marker> = [819, 273, 61, 922]
        .into_iter()
        .map(|id| Marker::new(id, [Point2::new(50.0, 50.0); 4]))
        .collect();
    let geometry = pipeline.process(&frame.view(), &markers);
    assert!(matches!(geometry.outcome, GeometryOutcome::Degenerate { .. }));
    assert!(geometry.outcome.diagnostic().is_some());
}

struct StillCamera(Raster);

#[async_trait]
impl FrameSource for StillCamera {
    async fn current_frame(&mut self) -> Option<Raster> {
        Some(self.0.clone())
    }
}

struct Replay(Vec<Marker>);

impl MarkerDetector for Replay {
    fn detect(&mut self, _image: &RasterView<'_>) -> Vec<Marker> {
        self.0.clone()
    }
}

#[tokio::test(start_paused = true)]
async fn controller_streams_braking_commands_as_lines() {
    let mut cfg = DriveConfig::default();
    cfg.rectifier.width = 64;
    cfg.rectifier.height = 64;
    let pipeline = cfg.build_pipeline().unwrap();
    let (ctl, handle) = LoopController::new(
        cfg.controller.clone(),
        pipeline,
        StillCamera(split_frame()),
        Replay(screen_markers()),
        LineChannel::new(Vec::new()),
    );
    let task = tokio::spawn(ctl.run());

    handle.connection_opened().unwrap();
    handle.inbound(r#"{"speed": 3}"#).unwrap();
    handle.start_detection().unwrap();
    // cycles at 0, 500 and 1000 ms
    tokio::time::sleep(Duration::from_millis(1200)).await;
    handle.shutdown().unwrap();
    let ctl = task.await.unwrap();

    assert_eq!(ctl.state(), LoopState::Stopped);
    assert_eq!(ctl.cycles(), 3);
    let text = String::from_utf8(ctl.channel().get_ref().clone()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Mobile phone connected.");
    for line in &lines[1..] {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_abs_diff_eq!(v["steering"].as_f64().unwrap(), 0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(v["throttle"].as_f64().unwrap(), -0.1, epsilon = 1e-6);
    }
    let report = handle.latest_report().unwrap();
    assert_eq!(report.cycle, 3);
    assert_eq!(report.frame_size, (160, 130));
}
