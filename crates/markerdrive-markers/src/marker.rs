use markerdrive_core::RasterView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One detected fiducial marker.
///
/// `corners` follow the detector's fixed winding order; the resolver refers
/// to them by index, so detectors must not reorder them between frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u32,
    pub corners: [Point2<f32>; 4],
}

impl Marker {
    pub fn new(id: u32, corners: [Point2<f32>; 4]) -> Self {
        Self { id, corners }
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0_f32, 0.0_f32), |(sx, sy), c| (sx + c.x, sy + c.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Top-left of the corner bounding box; where overlays anchor the id label.
    pub fn label_anchor(&self) -> Point2<f32> {
        let (x, y) = self
            .corners
            .iter()
            .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
                (x.min(c.x), y.min(c.y))
            });
        Point2::new(x, y)
    }
}

/// Produces the markers visible in a frame.
///
/// Marker decoding itself lives outside this workspace; implementations wrap
/// whatever detector the host provides.
pub trait MarkerDetector {
    fn detect(&mut self, frame: &RasterView<'_>) -> Vec<Marker>;
}

impl<F> MarkerDetector for F
where
    F: FnMut(&RasterView<'_>) -> Vec<Marker>,
{
    fn detect(&mut self, frame: &RasterView<'_>) -> Vec<Marker> {
        self(frame)
    }
}
