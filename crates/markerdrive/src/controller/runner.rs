use super::{
    ControlEvent, ControllerError, ControllerParams, CycleReport, FrameSource, LoopState,
    LoopStatus, Pipeline, SessionHandle,
};
use markerdrive_control::{ModelLoader, ModelSource, OutboundChannel, Session};
use markerdrive_core::Raster;
use markerdrive_markers::MarkerDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

/// Single-task owner of the frame loop.
///
/// Cycles never overlap: the next one is scheduled only after the previous
/// one (including any frame decode it awaited) has finished. Stopping takes
/// effect at the next scheduling point, so an in-flight cycle always
/// completes. Manual tokens, the connect handshake and telemetry are served
/// even while a frame decode is pending.
pub struct LoopController<S, D, C> {
    params: ControllerParams,
    pipeline: Pipeline,
    frames: S,
    detector: D,
    channel: C,
    loader: Option<Box<dyn ModelLoader>>,
    session: Session,
    /// Intermediate frame buffer, redrawn every cycle and resized on demand.
    scratch: Raster,
    /// Frame obtained while starting, consumed by the first cycle.
    pending: Option<Raster>,
    state: LoopState,
    startup_polls: u32,
    cycles: u64,
    last_error: Option<ControllerError>,
    events: mpsc::UnboundedReceiver<ControlEvent>,
    status: watch::Sender<LoopStatus>,
    reports: watch::Sender<Option<Arc<CycleReport>>>,
}

impl<S, D, C> LoopController<S, D, C>
where
    S: FrameSource,
    D: MarkerDetector + Send,
    C: OutboundChannel + Send,
{
    pub fn new(
        params: ControllerParams,
        pipeline: Pipeline,
        frames: S,
        detector: D,
        channel: C,
    ) -> (Self, SessionHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LoopStatus::default());
        let (report_tx, report_rx) = watch::channel(None);
        let controller = Self {
            params,
            pipeline,
            frames,
            detector,
            channel,
            loader: None,
            session: Session::default(),
            scratch: Raster::default(),
            pending: None,
            state: LoopState::Stopped,
            startup_polls: 0,
            cycles: 0,
            last_error: None,
            events: event_rx,
            status: status_tx,
            reports: report_tx,
        };
        controller.publish_status();
        (
            controller,
            SessionHandle::new(event_tx, status_rx, report_rx),
        )
    }

    pub fn with_model_loader(mut self, loader: Box<dyn ModelLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replace the initial session (toggles, telemetry, model).
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self.session.state.detection_running = false;
        self.publish_status();
        self
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Drive the loop until [`ControlEvent::Shutdown`] or until every
    /// [`SessionHandle`] is dropped. Returns the controller for inspection.
    pub async fn run(mut self) -> Self {
        log::info!("controller ready");
        loop {
            let keep_going = match self.state {
                LoopState::Stopped => match self.events.recv().await {
                    Some(event) => self.handle_event(event),
                    None => false,
                },
                LoopState::Starting => self.poll_startup().await,
                LoopState::Running => self.cycle_once().await,
            };
            if !keep_going {
                break;
            }
        }
        self.state = LoopState::Stopped;
        self.session.state.detection_running = false;
        self.publish_status();
        log::info!("controller exited after {} cycles", self.cycles);
        self
    }

    async fn poll_startup(&mut self) -> bool {
        let model_ready = !self.params.require_model || self.session.has_model();
        if model_ready {
            let (frame, deferred) = self.acquire_frame().await;
            if let Some(frame) = frame {
                log::info!(
                    "first frame {}x{} after {} polls; detection running",
                    frame.width,
                    frame.height,
                    self.startup_polls
                );
                self.pending = Some(frame);
                self.state = LoopState::Running;
                self.publish_status();
                return self.apply_deferred(deferred);
            }
            if !self.apply_deferred(deferred) {
                return false;
            }
            if self.state != LoopState::Starting {
                return true;
            }
        }

        self.startup_polls += 1;
        if let Some(max) = self.params.max_startup_polls {
            if self.startup_polls >= max {
                let err = ControllerError::StartupTimedOut {
                    polls: self.startup_polls,
                };
                log::warn!("{err}");
                self.last_error = Some(err);
                self.stop();
                self.publish_status();
                return true;
            }
        }
        let poll = self.params.startup_poll();
        self.pause(poll).await
    }

    async fn cycle_once(&mut self) -> bool {
        let (frame, deferred) = match self.pending.take() {
            Some(frame) => (Some(frame), Vec::new()),
            None => self.acquire_frame().await,
        };
        match frame {
            Some(frame) => self.run_cycle(&frame),
            None => log::debug!("no frame available; cycle skipped"),
        }
        if !self.apply_deferred(deferred) {
            return false;
        }
        if self.state != LoopState::Running {
            return true;
        }
        let delay = self.params.cycle_delay();
        self.pause(delay).await
    }

    /// Await the next frame while still serving the peer link.
    ///
    /// Manual tokens, connection changes and telemetry are applied as they
    /// arrive. Every other event is handed back, in order, to be applied once
    /// the cycle that needed the frame has finished.
    async fn acquire_frame(&mut self) -> (Option<Raster>, Vec<ControlEvent>) {
        let mut deferred = Vec::new();
        let mut events_open = true;
        let mut decode = self.frames.current_frame();
        let frame = loop {
            tokio::select! {
                frame = &mut decode => break frame,
                event = self.events.recv(), if events_open => {
                    let Some(event) = event else {
                        events_open = false;
                        continue;
                    };
                    let rest = apply_link_event(
                        event,
                        &mut self.pipeline,
                        &mut self.channel,
                        &mut self.session,
                        &self.params.handshake,
                    );
                    match rest {
                        Some(event) => {
                            log::debug!("event {event:?} deferred until the frame arrives");
                            deferred.push(event);
                        }
                        None => {
                            self.status.send_replace(loop_status(
                                self.state,
                                &self.session,
                                self.cycles,
                                &self.last_error,
                            ));
                        }
                    }
                }
            }
        };
        (frame, deferred)
    }

    /// Returns `false` if one of the events ends the loop.
    fn apply_deferred(&mut self, deferred: Vec<ControlEvent>) -> bool {
        for event in deferred {
            if !self.handle_event(event) {
                return false;
            }
        }
        true
    }

    fn run_cycle(&mut self, frame: &Raster) {
        if self.scratch.redraw_from(&frame.view()) {
            log::info!("frame size is now {}x{}", frame.width, frame.height);
        }
        self.cycles += 1;
        let now = Instant::now().into_std();
        let report = self.pipeline.run_cycle(
            self.cycles,
            &self.scratch.view(),
            &mut self.detector,
            &mut self.session,
            &mut self.channel,
            now,
        );
        self.reports.send_replace(Some(Arc::new(report)));
        self.publish_status();
    }

    /// Sleep for `delay`, applying events as they arrive. Returns early if an
    /// event changes the loop state; returns `false` on shutdown.
    async fn pause(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let entered = self.state;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                event = self.events.recv() => {
                    let Some(event) = event else {
                        log::info!("all session handles dropped");
                        return false;
                    };
                    if !self.handle_event(event) {
                        return false;
                    }
                    if self.state != entered {
                        return true;
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: ControlEvent) -> bool {
        log::debug!("event {event:?} while {}", self.state);
        let Some(event) = apply_link_event(
            event,
            &mut self.pipeline,
            &mut self.channel,
            &mut self.session,
            &self.params.handshake,
        ) else {
            self.publish_status();
            return true;
        };
        match event {
            ControlEvent::StartDetection => self.start(),
            ControlEvent::StopDetection => self.stop(),
            ControlEvent::ToggleDetection => {
                if self.state == LoopState::Stopped {
                    self.start();
                } else {
                    self.stop();
                }
            }
            ControlEvent::SetAutoDrive(on) => self.set_auto_drive(on),
            ControlEvent::ToggleAutoDrive => self.set_auto_drive(!self.session.state.auto_drive),
            ControlEvent::ToggleRectifiedView => {
                self.session.state.show_rectified = !self.session.state.show_rectified;
            }
            ControlEvent::ToggleManualControls => {
                self.session.state.show_manual_controls = !self.session.state.show_manual_controls;
            }
            ControlEvent::LoadModel(source) => self.load_model(&source),
            ControlEvent::InstallModel(model) => self.session.install_model(model),
            // peer link events never reach this match
            ControlEvent::Manual(_)
            | ControlEvent::ConnectionOpened
            | ControlEvent::ConnectionClosed
            | ControlEvent::Inbound(_) => {}
            ControlEvent::Shutdown => {
                log::info!("shutdown requested");
                self.stop();
                return false;
            }
        }
        self.publish_status();
        true
    }

    fn start(&mut self) {
        if self.state != LoopState::Stopped {
            log::debug!("start ignored; already {}", self.state);
            return;
        }
        log::info!("detection starting");
        self.state = LoopState::Starting;
        self.session.state.detection_running = true;
        self.startup_polls = 0;
        self.last_error = None;
    }

    fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        log::info!("detection stopped after {} cycles", self.cycles);
        self.state = LoopState::Stopped;
        self.session.state.detection_running = false;
        self.pending = None;
    }

    fn set_auto_drive(&mut self, on: bool) {
        if on && !self.session.has_model() {
            log::warn!("auto-drive enabled without a steering model; cycles will skip derivation");
        }
        self.session.state.auto_drive = on;
        log::info!("auto-drive {}", if on { "on" } else { "off" });
    }

    fn load_model(&mut self, source: &ModelSource) {
        let Some(loader) = self.loader.as_ref() else {
            log::warn!("cannot load model from {source}: no model loader configured");
            return;
        };
        match loader.load(source) {
            Ok(model) => self.session.install_model(model),
            Err(err) => log::warn!("{err}"),
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(loop_status(
            self.state,
            &self.session,
            self.cycles,
            &self.last_error,
        ));
    }
}

/// Apply an event that only concerns the peer link: manual tokens, the
/// connect handshake and inbound telemetry. Any other event is returned.
fn apply_link_event<C: OutboundChannel + ?Sized>(
    event: ControlEvent,
    pipeline: &mut Pipeline,
    channel: &mut C,
    session: &mut Session,
    handshake: &str,
) -> Option<ControlEvent> {
    match event {
        ControlEvent::Manual(cmd) => {
            let outcome = pipeline.gate_mut().send_manual(channel, cmd);
            log::info!("manual {cmd}: {outcome:?}");
        }
        ControlEvent::ConnectionOpened => {
            session.state.connected = true;
            log::info!("peer connected");
            let outcome = pipeline.gate_mut().send_handshake(channel, handshake);
            log::debug!("handshake: {outcome:?}");
        }
        ControlEvent::ConnectionClosed => {
            session.state.connected = false;
            log::info!("peer disconnected");
        }
        ControlEvent::Inbound(raw) => match session.telemetry.apply_message(&raw) {
            Ok(speed) => log::debug!("speed {speed}"),
            Err(err) => log::info!("message from peer ignored: {raw:?} ({err})"),
        },
        other => return Some(other),
    }
    None
}

fn loop_status(
    state: LoopState,
    session: &Session,
    cycles: u64,
    last_error: &Option<ControllerError>,
) -> LoopStatus {
    LoopStatus {
        state,
        session: session.state,
        speed: session.telemetry.speed(),
        has_model: session.has_model(),
        cycles,
        last_error: last_error.clone(),
    }
}
