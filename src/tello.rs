use std::{
    collections::HashMap,
    net::UdpSocket,
    sync::{
        atomic::{AtomicBool, AtomicI16, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    control::Vehicle,
    env,
    error::{Result, TeleopError},
    utils,
};

const RC_MIN: i32 = -100;
const RC_MAX: i32 = 100;
const NO_BATTERY: i16 = -1;

/// Battery level pushed by the drone on the state port as part of
/// `pitch:0;roll:0;yaw:0;...;bat:87;...`.
#[derive(Debug)]
pub struct DroneState {
    battery: AtomicI16,
}

impl DroneState {
    fn new() -> Self {
        Self {
            battery: AtomicI16::new(NO_BATTERY),
        }
    }

    pub fn battery(&self) -> Option<u8> {
        let b = self.battery.load(Ordering::Relaxed);
        (b >= 0).then(|| b.min(100) as u8)
    }

    fn update(&self, raw: &str) {
        let parsed = parse_state(raw);
        if let Some(bat) = parsed.get("bat").and_then(|v| v.parse::<i16>().ok()) {
            self.battery.store(bat, Ordering::Relaxed);
        }
    }
}

pub fn parse_state(raw: &str) -> HashMap<String, String> {
    raw.trim()
        .split(';')
        .filter_map(|field| {
            let (k, v) = field.split_once(':')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_owned(), v.trim().to_owned()))
        })
        .collect()
}

/// Drone client speaking the text SDK over UDP: commands and replies on the
/// control port, telemetry on the state port.
#[derive(Debug)]
pub struct TelloSdk {
    pub remote_addr: String,
    pub ctrl_conn: UdpSocket,
    pub state_port: u16,
    timeout: Duration,
    state: Arc<DroneState>,
    running: Arc<AtomicBool>,
    state_thread: Option<JoinHandle<()>>,
    flying: bool,
    streaming: bool,
    closed: bool,
}

impl TelloSdk {
    pub fn new() -> Result<Self> {
        let ctrl_port = *env::ENV_TELLO_CTRL_PORT;
        let remote_addr = format!("{}:{ctrl_port}", *env::ENV_TELLO_ADDR);
        let ctrl_conn = utils::udp_sock(&format!("0.0.0.0:{ctrl_port}"))?;
        Ok(Self::with_socket(
            ctrl_conn,
            remote_addr,
            *env::ENV_TELLO_STATE_PORT,
            Duration::from_millis(*env::ENV_TELLO_CMD_TIMEOUT_MS),
        ))
    }

    pub fn with_socket(
        ctrl_conn: UdpSocket,
        remote_addr: String,
        state_port: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            remote_addr,
            ctrl_conn,
            state_port,
            timeout,
            state: Arc::new(DroneState::new()),
            running: Arc::new(AtomicBool::new(false)),
            state_thread: None,
            flying: false,
            streaming: false,
            closed: false,
        }
    }

    pub fn is_flying(&self) -> bool {
        self.flying
    }

    /// Sends `command` and waits for the reply.
    pub fn send_command_with_return(&self, command: &str) -> Result<String> {
        let method_name = "send_command";
        tracing::debug!(method_name, command, remote = %self.remote_addr, "send");
        self.drain_stale_replies()?;
        self.ctrl_conn.set_read_timeout(Some(self.timeout))?;
        self.ctrl_conn.send_to(command.as_bytes(), &self.remote_addr)?;
        let mut buff: [u8; 1024] = [0; 1024];
        let nread = match self.ctrl_conn.recv(&mut buff) {
            Ok(n) => n,
            Err(e) if utils::is_timeout(&e) => {
                tracing::warn!(method_name, command, "no response");
                return Err(TeleopError::Timeout {
                    command: command.to_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let response = String::from_utf8_lossy(&buff[..nread]).trim().to_owned();
        tracing::debug!(method_name, command, response = %response, "recv");
        Ok(response)
    }

    /// Drops replies still queued on the control socket, e.g. a late `ok` to
    /// a command that already timed out, so they are not taken for the
    /// answer to the next command.
    fn drain_stale_replies(&self) -> Result<()> {
        let method_name = "drain_stale_replies";
        self.ctrl_conn.set_nonblocking(true)?;
        let mut buff: [u8; 1024] = [0; 1024];
        loop {
            match self.ctrl_conn.recv(&mut buff) {
                Ok(n) => {
                    let stale = String::from_utf8_lossy(&buff[..n]);
                    tracing::debug!(method_name, stale = %stale.trim(), "dropping late reply");
                }
                Err(e) if utils::is_timeout(&e) => break,
                Err(e) => {
                    tracing::warn!(method_name, "udp read error: {}", e);
                    break;
                }
            }
        }
        self.ctrl_conn.set_nonblocking(false)?;
        Ok(())
    }

    /// Sends a command that must be answered with `ok`.
    pub fn send_control_command(&self, command: &str) -> Result<()> {
        let response = self.send_command_with_return(command)?;
        if response.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(TeleopError::Rejected {
                command: command.to_owned(),
                response,
            })
        }
    }

    /// Fire and forget.
    pub fn send_command_without_return(&self, command: &str) -> Result<()> {
        let method_name = "send_command_without_return";
        tracing::trace!(method_name, command, "send");
        self.ctrl_conn.send_to(command.as_bytes(), &self.remote_addr)?;
        Ok(())
    }

    fn start_state_receiver(&mut self) -> Result<()> {
        if self.state_thread.is_some() {
            return Ok(());
        }
        let sock = utils::udp_sock(&format!("0.0.0.0:{}", self.state_port))?;
        sock.set_read_timeout(Some(Duration::from_millis(500)))?;
        self.running.store(true, Ordering::Relaxed);
        let state = self.state.clone();
        let running = self.running.clone();
        let h = thread::Builder::new()
            .name("tello-state".to_owned())
            .spawn(move || state_receiver(sock, state, running))?;
        self.state_thread = Some(h);
        Ok(())
    }

    fn stop_state_receiver(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.state_thread.take() {
            let _ = h.join();
        }
    }
}

fn state_receiver(sock: UdpSocket, state: Arc<DroneState>, running: Arc<AtomicBool>) {
    let method_name = "state_recv";
    let mut buff: [u8; 2048] = [0; 2048];
    while running.load(Ordering::Relaxed) {
        let nread = match sock.recv(&mut buff) {
            Ok(n) => n,
            Err(e) if utils::is_timeout(&e) => continue,
            Err(e) => {
                tracing::warn!(method_name, "udp read error: {}", e);
                continue;
            }
        };
        let raw = String::from_utf8_lossy(&buff[..nread]);
        tracing::trace!(method_name, nread, "state packet");
        state.update(&raw);
    }
    tracing::debug!(method_name, "state receiver finished");
}

pub fn rc_command(lateral: i32, longitudinal: i32, vertical: i32, yaw: i32) -> String {
    let c = |v: i32| v.clamp(RC_MIN, RC_MAX);
    format!(
        "rc {} {} {} {}",
        c(lateral),
        c(longitudinal),
        c(vertical),
        c(yaw)
    )
}

impl Vehicle for TelloSdk {
    fn connect(&mut self) -> Result<()> {
        let method_name = "connect";
        self.start_state_receiver()?;
        self.send_control_command("command")?;
        tracing::info!(method_name, remote = %self.remote_addr, "connected to tello");
        Ok(())
    }

    fn set_speed(&mut self, speed: u32) -> Result<()> {
        self.send_control_command(&format!("speed {}", speed.clamp(10, 100)))
    }

    fn stream_on(&mut self) -> Result<()> {
        self.send_control_command("streamon")?;
        self.streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) -> Result<()> {
        self.send_control_command("streamoff")?;
        self.streaming = false;
        Ok(())
    }

    fn get_battery(&mut self) -> Result<u8> {
        if let Some(b) = self.state.battery() {
            return Ok(b);
        }
        let response = self.send_command_with_return("battery?")?;
        response
            .parse::<u8>()
            .map_err(|_| TeleopError::Rejected {
                command: "battery?".to_owned(),
                response,
            })
    }

    fn takeoff(&mut self) -> Result<()> {
        let method_name = "takeoff";
        tracing::info!(method_name, "send");
        self.send_control_command("takeoff")?;
        self.flying = true;
        Ok(())
    }

    fn land(&mut self) -> Result<()> {
        let method_name = "land";
        tracing::info!(method_name, "send");
        self.send_control_command("land")?;
        self.flying = false;
        Ok(())
    }

    fn send_velocity_command(
        &mut self,
        lateral: i32,
        longitudinal: i32,
        vertical: i32,
        yaw: i32,
    ) -> Result<()> {
        self.send_command_without_return(&rc_command(lateral, longitudinal, vertical, yaw))
    }

    fn shutdown(&mut self) -> Result<()> {
        let method_name = "shutdown";
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::info!(
            method_name,
            flying = self.flying,
            streaming = self.streaming,
            "shutting down"
        );
        let mut result = Ok(());
        if self.flying {
            result = self.land();
        }
        if self.streaming {
            if let Err(e) = self.stream_off() {
                tracing::warn!(method_name, "unable to stop stream: {}", e);
            }
        }
        self.stop_state_receiver();
        result
    }
}

impl Drop for TelloSdk {
    fn drop(&mut self) {
        self.stop_state_receiver();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// A fake drone on loopback that answers every command with `reply`.
    fn fake_drone(reply: &'static str) -> (TelloSdk, thread::JoinHandle<Vec<String>>) {
        let drone = UdpSocket::bind("127.0.0.1:0").unwrap();
        drone
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let drone_addr = drone.local_addr().unwrap().to_string();
        let h = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut buff = [0u8; 256];
            while let Ok((n, from)) = drone.recv_from(&mut buff) {
                let cmd = String::from_utf8_lossy(&buff[..n]).to_string();
                if !cmd.starts_with("rc ") {
                    drone.send_to(reply.as_bytes(), from).unwrap();
                }
                seen.push(cmd);
            }
            seen
        });
        let ctrl = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sdk = TelloSdk::with_socket(ctrl, drone_addr, 0, Duration::from_millis(500));
        (sdk, h)
    }

    #[test]
    fn test_parse_state() {
        let m = parse_state("pitch:0;roll:-1;yaw:12;bat:87;baro:1.25;\r\n");
        assert_eq!(m.get("bat").map(String::as_str), Some("87"));
        assert_eq!(m.get("roll").map(String::as_str), Some("-1"));
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn test_state_update_sets_battery() {
        let st = DroneState::new();
        assert_eq!(st.battery(), None);
        st.update("pitch:0;bat:42;");
        assert_eq!(st.battery(), Some(42));
    }

    #[test]
    fn test_rc_command_clamps() {
        assert_eq!(rc_command(60, -60, 0, 250), "rc 60 -60 0 100");
        assert_eq!(rc_command(-101, 0, 0, 0), "rc -100 0 0 0");
    }

    #[test]
    fn test_control_commands_over_udp() {
        let (mut sdk, h) = fake_drone("ok");
        sdk.takeoff().unwrap();
        assert!(sdk.is_flying());
        sdk.send_velocity_command(0, 60, 0, 0).unwrap();
        sdk.shutdown().unwrap();
        sdk.shutdown().unwrap();
        assert!(!sdk.is_flying());
        let seen = h.join().unwrap();
        assert_eq!(seen, vec!["takeoff", "rc 0 60 0 0", "land"]);
    }

    #[test]
    fn test_rejected_command() {
        let (mut sdk, _h) = fake_drone("error Motor stop");
        match sdk.takeoff() {
            Err(TeleopError::Rejected { command, response }) => {
                assert_eq!(command, "takeoff");
                assert_eq!(response, "error Motor stop");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!sdk.is_flying());
    }

    #[test]
    fn test_late_reply_is_not_taken_for_next_answer() {
        let (mut sdk, _h) = fake_drone("64");
        let late = UdpSocket::bind("127.0.0.1:0").unwrap();
        let ctrl_addr = sdk.ctrl_conn.local_addr().unwrap();
        late.send_to(b"ok", ctrl_addr).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sdk.get_battery().unwrap(), 64);
    }

    #[test]
    fn test_battery_query_fallback() {
        let (mut sdk, _h) = fake_drone("64");
        assert_eq!(sdk.get_battery().unwrap(), 64);
        sdk.state.update("bat:12;");
        assert_eq!(sdk.get_battery().unwrap(), 12);
    }
}
