use markerdrive_control::{Command, Derivation, GateOutcome};
use markerdrive_core::{Raster, Rectified};
use markerdrive_markers::{Marker, Role};
use nalgebra::Point2;
use serde::Serialize;
use std::sync::Arc;

/// Shown instead of the rectified image when the markers are not all visible.
pub const INSUFFICIENT_MARKERS_HINT: &str = "Make sure the camera reads all Aruco markers!";

/// Overlay data for one detected marker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerOverlay {
    pub id: u32,
    pub corners: [Point2<f32>; 4],
    /// Where the id label is drawn.
    pub label_anchor: Point2<f32>,
}

impl From<&Marker> for MarkerOverlay {
    fn from(m: &Marker) -> Self {
        Self {
            id: m.id,
            corners: m.corners,
            label_anchor: m.label_anchor(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryOutcome {
    Rectified,
    InsufficientMarkers { detected: usize, missing: Vec<Role> },
    Degenerate { reason: String },
}

impl GeometryOutcome {
    /// Operator-facing hint, if the frame could not be rectified.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            GeometryOutcome::Rectified => None,
            GeometryOutcome::InsufficientMarkers { .. } => {
                Some(INSUFFICIENT_MARKERS_HINT.to_owned())
            }
            GeometryOutcome::Degenerate { reason } => {
                Some(format!("{INSUFFICIENT_MARKERS_HINT} ({reason})"))
            }
        }
    }
}

/// Marker resolution and rectification for a single frame.
#[derive(Clone, Debug)]
pub struct FrameGeometry {
    pub markers: Vec<MarkerOverlay>,
    /// Quad outline TL -> TR -> BR -> BL, when every role resolved.
    pub outline: Option<[Point2<f32>; 4]>,
    pub outcome: GeometryOutcome,
    pub rectified: Option<Rectified>,
}

/// Everything a front end needs to render one cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// 1-based cycle counter since the controller was created.
    pub cycle: u64,
    pub frame_size: (usize, usize),
    pub markers: Vec<MarkerOverlay>,
    pub outline: Option<[Point2<f32>; 4]>,
    pub outcome: GeometryOutcome,
    /// Present only when rectification succeeded and the view is enabled.
    pub rectified: Option<Arc<Raster>>,
    pub derivation: Option<Derivation>,
    /// Why derivation was skipped, if it was.
    pub derive_error: Option<String>,
    pub transmission: Option<GateOutcome>,
}

impl CycleReport {
    pub fn diagnostic(&self) -> Option<String> {
        self.outcome.diagnostic()
    }

    pub fn command(&self) -> Option<Command> {
        self.derivation.as_ref().and_then(Derivation::command)
    }
}
