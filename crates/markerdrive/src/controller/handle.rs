use super::{ControllerError, CycleReport, LoopState};
use markerdrive_control::{ManualCommand, ModelSource, SessionState, SteeringModel};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Operator and transport events, applied between cycles in arrival order.
pub enum ControlEvent {
    StartDetection,
    StopDetection,
    ToggleDetection,
    SetAutoDrive(bool),
    ToggleAutoDrive,
    ToggleRectifiedView,
    ToggleManualControls,
    /// Forwarded immediately, whatever the loop state.
    Manual(ManualCommand),
    LoadModel(ModelSource),
    InstallModel(Box<dyn SteeringModel>),
    ConnectionOpened,
    ConnectionClosed,
    /// Raw text received from the peer.
    Inbound(String),
    Shutdown,
}

impl ControlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::StartDetection => "start-detection",
            ControlEvent::StopDetection => "stop-detection",
            ControlEvent::ToggleDetection => "toggle-detection",
            ControlEvent::SetAutoDrive(_) => "set-auto-drive",
            ControlEvent::ToggleAutoDrive => "toggle-auto-drive",
            ControlEvent::ToggleRectifiedView => "toggle-rectified-view",
            ControlEvent::ToggleManualControls => "toggle-manual-controls",
            ControlEvent::Manual(_) => "manual",
            ControlEvent::LoadModel(_) => "load-model",
            ControlEvent::InstallModel(_) => "install-model",
            ControlEvent::ConnectionOpened => "connection-opened",
            ControlEvent::ConnectionClosed => "connection-closed",
            ControlEvent::Inbound(_) => "inbound",
            ControlEvent::Shutdown => "shutdown",
        }
    }
}

impl fmt::Debug for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEvent::SetAutoDrive(on) => write!(f, "SetAutoDrive({on})"),
            ControlEvent::Manual(cmd) => write!(f, "Manual({cmd})"),
            ControlEvent::LoadModel(src) => write!(f, "LoadModel({src})"),
            ControlEvent::Inbound(raw) => write!(f, "Inbound({raw:?})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Snapshot of the controller published after every event and cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopStatus {
    pub state: LoopState,
    pub session: SessionState,
    pub speed: f32,
    pub has_model: bool,
    /// Completed cycles since the controller was created.
    pub cycles: u64,
    pub last_error: Option<ControllerError>,
}

/// Cloneable front-end handle to a running [`super::LoopController`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<ControlEvent>,
    status: watch::Receiver<LoopStatus>,
    reports: watch::Receiver<Option<Arc<CycleReport>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<ControlEvent>,
        status: watch::Receiver<LoopStatus>,
        reports: watch::Receiver<Option<Arc<CycleReport>>>,
    ) -> Self {
        Self {
            events,
            status,
            reports,
        }
    }

    pub fn send(&self, event: ControlEvent) -> Result<(), ControllerError> {
        self.events
            .send(event)
            .map_err(|_| ControllerError::Disconnected)
    }

    pub fn start_detection(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::StartDetection)
    }

    pub fn stop_detection(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::StopDetection)
    }

    pub fn toggle_detection(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::ToggleDetection)
    }

    pub fn set_auto_drive(&self, on: bool) -> Result<(), ControllerError> {
        self.send(ControlEvent::SetAutoDrive(on))
    }

    pub fn toggle_auto_drive(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::ToggleAutoDrive)
    }

    pub fn manual(&self, command: ManualCommand) -> Result<(), ControllerError> {
        self.send(ControlEvent::Manual(command))
    }

    pub fn load_model(&self, source: ModelSource) -> Result<(), ControllerError> {
        self.send(ControlEvent::LoadModel(source))
    }

    pub fn install_model(&self, model: Box<dyn SteeringModel>) -> Result<(), ControllerError> {
        self.send(ControlEvent::InstallModel(model))
    }

    pub fn connection_opened(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::ConnectionOpened)
    }

    pub fn connection_closed(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::ConnectionClosed)
    }

    pub fn inbound(&self, raw: impl Into<String>) -> Result<(), ControllerError> {
        self.send(ControlEvent::Inbound(raw.into()))
    }

    pub fn toggle_rectified_view(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::ToggleRectifiedView)
    }

    pub fn toggle_manual_controls(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::ToggleManualControls)
    }

    pub fn shutdown(&self) -> Result<(), ControllerError> {
        self.send(ControlEvent::Shutdown)
    }

    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> LoopState {
        self.status.borrow().state
    }

    pub fn latest_report(&self) -> Option<Arc<CycleReport>> {
        self.reports.borrow().clone()
    }

    /// Receiver that wakes on every published cycle report.
    pub fn reports(&self) -> watch::Receiver<Option<Arc<CycleReport>>> {
        self.reports.clone()
    }
}
