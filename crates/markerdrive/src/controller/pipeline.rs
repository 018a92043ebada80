use super::report::{CycleReport, FrameGeometry, GeometryOutcome, MarkerOverlay};
use markerdrive_control::{
    CommandDeriver, DeriveInput, OutboundChannel, Session, SteeringModel,
    TransmissionGate,
};
use markerdrive_core::{RasterView, Rectifier};
use markerdrive_markers::{CornerResolver, Marker, MarkerDetector, ResolveError};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// The per-frame stages, run strictly in order: detect, resolve, rectify,
/// derive, transmit.
#[derive(Clone, Debug)]
pub struct Pipeline {
    resolver: CornerResolver,
    rectifier: Rectifier,
    deriver: CommandDeriver,
    gate: TransmissionGate,
}

impl Pipeline {
    pub fn new(
        resolver: CornerResolver,
        rectifier: Rectifier,
        deriver: CommandDeriver,
        gate: TransmissionGate,
    ) -> Self {
        Self {
            resolver,
            rectifier,
            deriver,
            gate,
        }
    }

    pub fn resolver(&self) -> &CornerResolver {
        &self.resolver
    }

    pub fn rectifier(&self) -> &Rectifier {
        &self.rectifier
    }

    pub fn deriver(&self) -> &CommandDeriver {
        &self.deriver
    }

    pub fn gate(&self) -> &TransmissionGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut TransmissionGate {
        &mut self.gate
    }

    /// Resolve `markers` against the binding table and, if every role is
    /// present, rectify `frame`.
    pub fn process(&self, frame: &RasterView<'_>, markers: &[Marker]) -> FrameGeometry {
        let overlays = markers.iter().map(MarkerOverlay::from).collect();
        let resolution = self.resolver.resolve(markers);

        let quad = match resolution.quad() {
            Ok(quad) => quad,
            Err(ResolveError::InsufficientMarkers { detected, missing }) => {
                log::debug!("skipping rectification: {detected} markers, missing {missing:?}");
                return FrameGeometry {
                    markers: overlays,
                    outline: None,
                    outcome: GeometryOutcome::InsufficientMarkers { detected, missing },
                    rectified: None,
                };
            }
        };

        let outline = Some(resolution.outline());
        match self.rectifier.rectify(frame, &quad) {
            Ok(rectified) => FrameGeometry {
                markers: overlays,
                outline,
                outcome: GeometryOutcome::Rectified,
                rectified: Some(rectified),
            },
            Err(err) => {
                log::warn!("rectification failed: {err}");
                FrameGeometry {
                    markers: overlays,
                    outline,
                    outcome: GeometryOutcome::Degenerate {
                        reason: err.to_string(),
                    },
                    rectified: None,
                }
            }
        }
    }

    /// Run one full cycle on `frame`.
    ///
    /// Derivation only runs when the frame was rectified; otherwise the
    /// report carries the diagnostic and nothing is transmitted.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(cycle = cycle, w = frame.width, h = frame.height))
    )]
    pub fn run_cycle<D, C>(
        &mut self,
        cycle: u64,
        frame: &RasterView<'_>,
        detector: &mut D,
        session: &mut Session,
        channel: &mut C,
        now: Instant,
    ) -> CycleReport
    where
        D: MarkerDetector + ?Sized,
        C: OutboundChannel + ?Sized,
    {
        let markers = detector.detect(frame);
        let geometry = self.process(frame, &markers);

        let mut derivation = None;
        let mut derive_error = None;
        let mut transmission = None;

        if let Some(rectified) = geometry.rectified.as_ref() {
            let auto_drive = session.state.auto_drive;
            let speed = session.telemetry.speed();
            let model: Option<&mut dyn SteeringModel> = match session.model_mut() {
                Some(m) => Some(m),
                None => None,
            };
            let input = DeriveInput {
                auto_drive,
                speed,
                rectified: Some(rectified.image.view()),
                model,
            };
            match self.deriver.derive(input) {
                Ok(d) => {
                    if let Some(cmd) = d.command() {
                        transmission = Some(self.gate.send_command(channel, cmd, now));
                    }
                    derivation = Some(d);
                }
                Err(err) => {
                    log::warn!("{err}");
                    derive_error = Some(err.to_string());
                }
            }
        }

        let rectified = if session.state.show_rectified {
            geometry.rectified.map(|r| Arc::new(r.image))
        } else {
            None
        };

        log::debug!(
            "cycle {cycle}: {} markers, {:?}, {:?}",
            markers.len(),
            derivation,
            transmission
        );

        CycleReport {
            cycle,
            frame_size: (frame.width, frame.height),
            markers: geometry.markers,
            outline: geometry.outline,
            outcome: geometry.outcome,
            rectified,
            derivation,
            derive_error,
            transmission,
        }
    }
}
