//! Per-frame assignment of detected markers to corner roles.

use crate::{BindingTable, CornerSelection, Marker, Role};
use markerdrive_core::Quad;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Placeholder point for a role whose marker was not seen this frame.
pub const UNRESOLVED: Point2<f32> = Point2::new(0.0, 0.0);

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("insufficient markers: detected {detected}, missing roles {missing:?}")]
    InsufficientMarkers { detected: usize, missing: Vec<Role> },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverParams {
    pub bindings: BindingTable,
    /// The frame must contain strictly more markers than this.
    pub min_markers: usize,
}

impl Default for ResolverParams {
    fn default() -> Self {
        Self {
            bindings: BindingTable::default(),
            min_markers: 3,
        }
    }
}

/// Result of resolving one frame's markers.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Role points in [`Role::ALL`] order; [`UNRESOLVED`] where no marker matched.
    pub points: [Point2<f32>; 4],
    /// Index into the input marker slice that supplied each role.
    pub sources: [Option<usize>; 4],
    pub detected: usize,
    pub all_resolved: bool,
}

impl Resolution {
    #[inline]
    pub fn point(&self, role: Role) -> Point2<f32> {
        self.points[role.index()]
    }

    pub fn missing_roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|r| self.sources[r.index()].is_none())
            .collect()
    }

    /// Rectifier input (TL, TR, BL, BR), available only when fully resolved.
    pub fn quad(&self) -> Result<Quad, ResolveError> {
        if self.all_resolved {
            Ok(self.points)
        } else {
            Err(ResolveError::InsufficientMarkers {
                detected: self.detected,
                missing: self.missing_roles(),
            })
        }
    }

    /// Closed outline TL -> TR -> BR -> BL for overlays.
    pub fn outline(&self) -> [Point2<f32>; 4] {
        [
            self.point(Role::TopLeft),
            self.point(Role::TopRight),
            self.point(Role::BottomRight),
            self.point(Role::BottomLeft),
        ]
    }
}

#[derive(Clone, Debug, Default)]
pub struct CornerResolver {
    params: ResolverParams,
}

impl CornerResolver {
    pub fn new(params: ResolverParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &ResolverParams {
        &self.params
    }

    /// Map markers to roles. When two markers report the same bound id, the
    /// first one in `markers` wins.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, markers), fields(detected = markers.len()))
    )]
    pub fn resolve(&self, markers: &[Marker]) -> Resolution {
        let mut points = [UNRESOLVED; 4];
        let mut sources = [None; 4];

        for (i, marker) in markers.iter().enumerate() {
            let Some(binding) = self.params.bindings.for_marker(marker.id) else {
                continue;
            };
            let slot = binding.role.index();
            if sources[slot].is_some() {
                log::debug!(
                    "marker {} seen again at index {i}; keeping first for {}",
                    marker.id,
                    binding.role
                );
                continue;
            }
            points[slot] = match binding.selection {
                CornerSelection::Corner(k) => marker.corners[k as usize],
                CornerSelection::Centroid => marker.centroid(),
            };
            sources[slot] = Some(i);
        }

        let detected = markers.len();
        let all_resolved =
            detected > self.params.min_markers && sources.iter().all(Option::is_some);

        Resolution {
            points,
            sources,
            detected,
            all_resolved,
        }
    }
}
