use std::time::{Duration, Instant};

use crate::{
    control::{ControlState, Vehicle},
    error::Result,
};

/// Forwards the current velocity intent to the vehicle once per tick while
/// armed. Nothing is queued: each tick sends the latest intent and forgets
/// it.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    sent: u64,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of velocity commands sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Returns whether a command went out.
    pub fn tick<V: Vehicle + ?Sized>(&mut self, state: &ControlState, vehicle: &mut V) -> Result<bool> {
        let method_name = "dispatch";
        if !state.armed {
            return Ok(false);
        }
        let i = state.intent;
        tracing::debug!(
            method_name,
            lateral = i.lateral,
            longitudinal = i.longitudinal,
            vertical = i.vertical,
            yaw = i.yaw,
            "update drone movement"
        );
        if let Err(e) = vehicle.send_velocity_command(i.lateral, i.longitudinal, i.vertical, i.yaw) {
            tracing::warn!(method_name, "unable to send velocity command: {}", e);
            return Err(e);
        }
        self.sent += 1;
        Ok(true)
    }
}

/// Fixed-rate clock. Periods missed while the loop was busy collapse into a
/// single tick.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(rate_hz: u32, now: Instant) -> Self {
        let period = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);
        Self {
            period,
            next: now + period,
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{control::test_support::RecordingVehicle, input::VelocityIntent, toggles::ToggleStore};

    #[test]
    fn test_disarmed_never_sends() {
        let mut st = ControlState::new(ToggleStore::new());
        st.intent = VelocityIntent {
            lateral: 60,
            longitudinal: -60,
            vertical: 0,
            yaw: 60,
        };
        let mut v = RecordingVehicle::default();
        let mut d = CommandDispatcher::new();
        for _ in 0..50 {
            assert!(!d.tick(&st, &mut v).unwrap());
        }
        assert!(v.rc.is_empty());
        assert_eq!(d.sent(), 0);
    }

    #[test]
    fn test_armed_sends_latest_intent_each_tick() {
        let mut st = ControlState::new(ToggleStore::new());
        st.armed = true;
        let mut v = RecordingVehicle::default();
        let mut d = CommandDispatcher::new();
        d.tick(&st, &mut v).unwrap();
        st.intent.longitudinal = 60;
        st.intent.yaw = -60;
        d.tick(&st, &mut v).unwrap();
        assert_eq!(v.rc, vec![(0, 0, 0, 0), (0, 60, 0, -60)]);
        assert_eq!(d.sent(), 2);
    }

    #[test]
    fn test_failed_send_is_reported_and_not_counted() {
        let mut st = ControlState::new(ToggleStore::new());
        st.armed = true;
        let mut v = RecordingVehicle {
            fail_on: Some("rc"),
            ..Default::default()
        };
        let mut d = CommandDispatcher::new();
        assert!(d.tick(&st, &mut v).is_err());
        assert_eq!(v.rc.len(), 1);
        assert_eq!(d.sent(), 0);
    }

    #[test]
    fn test_ticker_fires_once_per_period() {
        let t0 = Instant::now();
        let mut t = Ticker::new(10, t0);
        assert!(!t.poll(t0));
        assert!(!t.poll(t0 + Duration::from_millis(99)));
        assert!(t.poll(t0 + Duration::from_millis(100)));
        assert!(!t.poll(t0 + Duration::from_millis(150)));
        assert!(t.poll(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_ticker_coalesces_missed_periods() {
        let t0 = Instant::now();
        let mut t = Ticker::new(10, t0);
        let late = t0 + Duration::from_millis(1000);
        assert!(t.poll(late));
        assert!(!t.poll(late));
        assert!(t.poll(late + Duration::from_millis(100)));
    }
}
