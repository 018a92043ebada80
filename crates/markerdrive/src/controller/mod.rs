//! The frame loop: start/stop, cycle scheduling, operator events.
//!
//! A [`LoopController`] owns every collaborator and runs on a single task.
//! Front ends talk to it through a cloneable [`SessionHandle`]; events are
//! applied between cycles and each finished cycle publishes a
//! [`CycleReport`].
//!
//! ```text
//! Stopped --start--> Starting --first frame--> Running
//!    ^                   |                        |
//!    +-------stop--------+----------stop----------+
//! ```

mod error;
mod handle;
mod params;
mod pipeline;
mod report;
mod runner;

use async_trait::async_trait;
use markerdrive_core::Raster;
use std::fmt;

pub use error::ControllerError;
pub use handle::{ControlEvent, LoopStatus, SessionHandle};
pub use params::ControllerParams;
pub use pipeline::Pipeline;
pub use report::{
    CycleReport, FrameGeometry, GeometryOutcome, MarkerOverlay, INSUFFICIENT_MARKERS_HINT,
};
pub use runner::LoopController;

/// Camera side of the loop.
#[async_trait]
pub trait FrameSource: Send {
    /// The most recent frame, or `None` while the camera is not ready.
    async fn current_frame(&mut self) -> Option<Raster>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoopState {
    #[default]
    Stopped,
    /// Waiting for the first frame (and the model, if required).
    Starting,
    Running,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopState::Stopped => "stopped",
            LoopState::Starting => "starting",
            LoopState::Running => "running",
        })
    }
}
