use std::{thread, time::Duration};

use crate::{
    compositor::{default_sign_icon, load_sign_icon, ComposedFrame, Frame, FrameCompositor, Telemetry},
    dispatcher::CommandDispatcher,
    env::ControlConfig,
    error::Result,
    input::{InputStateTracker, Key, Trigger, VelocityIntent},
    toggles::ToggleStore,
};

/// The remote vehicle. Every call is made once; retrying is up to the
/// implementation.
pub trait Vehicle {
    fn connect(&mut self) -> Result<()>;
    fn set_speed(&mut self, speed: u32) -> Result<()>;
    fn stream_on(&mut self) -> Result<()>;
    fn stream_off(&mut self) -> Result<()>;
    fn get_battery(&mut self) -> Result<u8>;
    fn takeoff(&mut self) -> Result<()>;
    fn land(&mut self) -> Result<()>;
    fn send_velocity_command(
        &mut self,
        lateral: i32,
        longitudinal: i32,
        vertical: i32,
        yaw: i32,
    ) -> Result<()>;
    /// Final disarm: land if needed and release the link.
    fn shutdown(&mut self) -> Result<()>;
}

/// Latest-frame accessor over a decoder running on its own thread.
pub trait FrameSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// The newest frame not handed out yet, if any. Never blocks.
    fn latest_frame(&mut self) -> Option<Frame>;

    /// True once the stream has stopped for good.
    fn is_halted(&self) -> bool;
}

/// Window-like collaborator: input events in, composed frames out.
pub trait Surface {
    fn poll_events(&mut self) -> Vec<Event>;
    fn present(&mut self, frame: ComposedFrame) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    Quit,
    KeyDown(Key),
    KeyUp(Key),
    PointerDown(i32, i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    Aborted,
    StreamHalted,
    /// A collaborator call failed while running.
    Failed,
}

/// Everything the input side mutates and the output side reads.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub intent: VelocityIntent,
    pub armed: bool,
    pub toggles: ToggleStore,
}

impl ControlState {
    pub fn new(toggles: ToggleStore) -> Self {
        Self {
            intent: VelocityIntent::default(),
            armed: false,
            toggles,
        }
    }
}

/// Drives one teleoperation session: Idle -> Running -> Stopped.
///
/// Each iteration drains the input queue (ticks, keys, clicks), then
/// composes and presents the newest video frame if there is one. Ticks and
/// frames run on independent cadences; neither waits for the other.
pub struct ControlLoop<V: Vehicle, F: FrameSource, S: Surface> {
    vehicle: V,
    frames: F,
    surface: S,
    state: ControlState,
    tracker: InputStateTracker,
    dispatcher: CommandDispatcher,
    compositor: FrameCompositor,
    drone_speed: u32,
    frame_period: Duration,
    phase: LoopState,
    stop_reason: Option<StopReason>,
    connected: bool,
    shutdown_sent: bool,
}

impl<V: Vehicle, F: FrameSource, S: Surface> ControlLoop<V, F, S> {
    pub fn new(config: ControlConfig, vehicle: V, frames: F, surface: S) -> Result<Self> {
        let icon = match &config.sign_icon {
            Some(path) => load_sign_icon(path)?,
            None => default_sign_icon(),
        };
        Ok(Self {
            vehicle,
            frames,
            surface,
            state: ControlState::new(ToggleStore::from_defs(&config.toggles)?),
            tracker: InputStateTracker::new(config.bindings, config.speed),
            dispatcher: CommandDispatcher::new(),
            compositor: FrameCompositor::new(config.style, icon),
            drone_speed: config.drone_speed,
            frame_period: config.frame_period,
            phase: LoopState::Idle,
            stop_reason: None,
            connected: false,
            shutdown_sent: false,
        })
    }

    pub fn phase(&self) -> LoopState {
        self.phase
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Connects to the vehicle and starts video. A failed connect stops the
    /// session without a shutdown call; later failures still shut down.
    pub fn start(&mut self) -> Result<()> {
        let method_name = "start";
        if self.phase != LoopState::Idle {
            tracing::warn!(method_name, phase = ?self.phase, "session already started");
            return Ok(());
        }
        if let Err(e) = self.vehicle.connect() {
            tracing::error!(method_name, "unable to connect: {}", e);
            self.phase = LoopState::Stopped;
            self.stop_reason = Some(StopReason::Failed);
            return Err(e);
        }
        self.connected = true;
        if let Err(e) = self.start_stream() {
            tracing::error!(method_name, "unable to start video: {}", e);
            self.enter_stopped(StopReason::Failed);
            return Err(e);
        }
        self.phase = LoopState::Running;
        tracing::info!(method_name, "session running");
        Ok(())
    }

    fn start_stream(&mut self) -> Result<()> {
        self.vehicle.set_speed(self.drone_speed)?;
        self.vehicle.stream_off()?;
        self.vehicle.stream_on()?;
        self.frames.start()
    }

    /// Runs one loop iteration. Returns the stop reason once the session has
    /// ended.
    pub fn step(&mut self) -> Result<Option<StopReason>> {
        match self.phase {
            LoopState::Idle => return Ok(None),
            LoopState::Stopped => return Ok(self.stop_reason),
            LoopState::Running => {}
        }
        match self.iterate() {
            Ok(None) => Ok(None),
            Ok(Some(reason)) => {
                self.enter_stopped(reason);
                Ok(Some(reason))
            }
            Err(e) => {
                tracing::error!(method_name = "step", "session failed: {}", e);
                self.enter_stopped(StopReason::Failed);
                Err(e)
            }
        }
    }

    /// Starts the session and loops until it stops.
    pub fn run(&mut self) -> Result<StopReason> {
        self.start()?;
        loop {
            if let Some(reason) = self.step()? {
                return Ok(reason);
            }
            if !self.frame_period.is_zero() {
                thread::sleep(self.frame_period);
            }
        }
    }

    fn iterate(&mut self) -> Result<Option<StopReason>> {
        for event in self.surface.poll_events() {
            if let Some(reason) = self.handle_event(event)? {
                // events queued behind a stop are dropped
                return Ok(Some(reason));
            }
        }
        if self.frames.is_halted() {
            return Ok(Some(StopReason::StreamHalted));
        }
        if let Some(frame) = self.frames.latest_frame() {
            let telemetry = Telemetry {
                battery: self.vehicle.get_battery()?,
            };
            let composed = self
                .compositor
                .compose(&frame, &self.state.toggles, &telemetry)?;
            self.surface.present(composed)?;
        }
        Ok(None)
    }

    fn handle_event(&mut self, event: Event) -> Result<Option<StopReason>> {
        match event {
            Event::Tick => {
                self.dispatcher.tick(&self.state, &mut self.vehicle)?;
                Ok(None)
            }
            Event::Quit => Ok(Some(StopReason::Quit)),
            Event::KeyDown(key) => match self.tracker.on_key_down(&mut self.state, key) {
                Some(trigger) => self.fire(trigger),
                None => Ok(None),
            },
            Event::KeyUp(key) => match self.tracker.on_key_up(&mut self.state, key) {
                Some(trigger) => self.fire(trigger),
                None => Ok(None),
            },
            Event::PointerDown(x, y) => {
                self.state.toggles.on_click(x, y);
                Ok(None)
            }
        }
    }

    fn fire(&mut self, trigger: Trigger) -> Result<Option<StopReason>> {
        let method_name = "fire";
        tracing::info!(method_name, ?trigger, "trigger");
        match trigger {
            Trigger::Takeoff => self.vehicle.takeoff()?,
            Trigger::Land => self.vehicle.land()?,
            Trigger::Abort => return Ok(Some(StopReason::Aborted)),
        }
        Ok(None)
    }

    fn enter_stopped(&mut self, reason: StopReason) {
        let method_name = "stop";
        if self.phase == LoopState::Stopped {
            return;
        }
        self.phase = LoopState::Stopped;
        self.stop_reason = Some(reason);
        self.state.armed = false;
        self.state.intent = VelocityIntent::default();
        if self.connected && !self.shutdown_sent {
            self.shutdown_sent = true;
            if let Err(e) = self.vehicle.shutdown() {
                tracing::warn!(method_name, "unable to shut down vehicle: {}", e);
            }
        }
        tracing::info!(method_name, ?reason, "session stopped");
    }
}

impl<V: Vehicle, F: FrameSource, S: Surface> Drop for ControlLoop<V, F, S> {
    fn drop(&mut self) {
        if self.phase == LoopState::Running {
            self.enter_stopped(StopReason::Quit);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::TeleopError;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingVehicle {
        pub calls: Vec<&'static str>,
        pub rc: Vec<(i32, i32, i32, i32)>,
        pub fail_on: Option<&'static str>,
    }

    impl RecordingVehicle {
        fn call(&mut self, name: &'static str) -> Result<()> {
            self.calls.push(name);
            if self.fail_on == Some(name) {
                return Err(TeleopError::Timeout {
                    command: name.to_owned(),
                });
            }
            Ok(())
        }

        pub fn count(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| **c == name).count()
        }
    }

    impl Vehicle for RecordingVehicle {
        fn connect(&mut self) -> Result<()> {
            self.call("connect")
        }
        fn set_speed(&mut self, _speed: u32) -> Result<()> {
            self.call("set_speed")
        }
        fn stream_on(&mut self) -> Result<()> {
            self.call("stream_on")
        }
        fn stream_off(&mut self) -> Result<()> {
            self.call("stream_off")
        }
        fn get_battery(&mut self) -> Result<u8> {
            self.call("get_battery").map(|_| 77)
        }
        fn takeoff(&mut self) -> Result<()> {
            self.call("takeoff")
        }
        fn land(&mut self) -> Result<()> {
            self.call("land")
        }
        fn send_velocity_command(&mut self, a: i32, b: i32, c: i32, d: i32) -> Result<()> {
            self.rc.push((a, b, c, d));
            self.call("rc")
        }
        fn shutdown(&mut self) -> Result<()> {
            self.call("shutdown")
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct NoFrames {
        pub halted: bool,
    }

    impl FrameSource for NoFrames {
        fn latest_frame(&mut self) -> Option<Frame> {
            None
        }
        fn is_halted(&self) -> bool {
            self.halted
        }
    }

    /// Hands out one batch of events per poll.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedSurface {
        pub batches: Vec<Vec<Event>>,
        pub presented: usize,
    }

    impl Surface for ScriptedSurface {
        fn poll_events(&mut self) -> Vec<Event> {
            if self.batches.is_empty() {
                Vec::new()
            } else {
                self.batches.remove(0)
            }
        }
        fn present(&mut self, _frame: ComposedFrame) -> Result<()> {
            self.presented += 1;
            Ok(())
        }
    }
}
