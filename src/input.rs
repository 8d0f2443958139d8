use std::collections::HashMap;

use crate::control::ControlState;

/// Keyboard keys the control loop understands. Letter keys are kept
/// lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Lateral,
    Longitudinal,
    Vertical,
    Yaw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    fn apply(self, magnitude: i32) -> i32 {
        match self {
            Direction::Positive => magnitude,
            Direction::Negative => -magnitude,
        }
    }
}

/// What a key does once looked up in the binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    SetAxis(Axis, Direction),
    /// Fires on key-up: arms and requests takeoff.
    Arm,
    /// Fires on key-up: disarms and requests landing.
    Disarm,
    /// Fires on key-down: ends the session.
    Abort,
    Ignore,
}

/// One-shot requests raised by key edges, carried out by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Takeoff,
    Land,
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VelocityIntent {
    pub lateral: i32,
    pub longitudinal: i32,
    pub vertical: i32,
    pub yaw: i32,
}

impl VelocityIntent {
    pub fn get(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Lateral => self.lateral,
            Axis::Longitudinal => self.longitudinal,
            Axis::Vertical => self.vertical,
            Axis::Yaw => self.yaw,
        }
    }

    pub fn set(&mut self, axis: Axis, value: i32) {
        let slot = match axis {
            Axis::Lateral => &mut self.lateral,
            Axis::Longitudinal => &mut self.longitudinal,
            Axis::Vertical => &mut self.vertical,
            Axis::Yaw => &mut self.yaw,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    table: HashMap<Key, KeyAction>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn bind(mut self, key: Key, action: KeyAction) -> Self {
        self.table.insert(key, action);
        self
    }

    pub fn lookup(&self, key: Key) -> KeyAction {
        self.table.get(&key).copied().unwrap_or(KeyAction::Ignore)
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Axis::*;
        use Direction::*;
        Self::empty()
            .bind(Key::Up, KeyAction::SetAxis(Longitudinal, Positive))
            .bind(Key::Down, KeyAction::SetAxis(Longitudinal, Negative))
            .bind(Key::Left, KeyAction::SetAxis(Lateral, Negative))
            .bind(Key::Right, KeyAction::SetAxis(Lateral, Positive))
            .bind(Key::Char('w'), KeyAction::SetAxis(Vertical, Positive))
            .bind(Key::Char('s'), KeyAction::SetAxis(Vertical, Negative))
            .bind(Key::Char('a'), KeyAction::SetAxis(Yaw, Negative))
            .bind(Key::Char('d'), KeyAction::SetAxis(Yaw, Positive))
            .bind(Key::Char('t'), KeyAction::Arm)
            .bind(Key::Char('l'), KeyAction::Disarm)
            .bind(Key::Escape, KeyAction::Abort)
    }
}

/// Maps key edges onto the velocity intent and the armed flag.
///
/// A key-down on an axis key overwrites that axis with its signed speed, so
/// the last pressed key of a pair wins. A key-up on either key of a pair
/// zeroes the axis even when the opposite key is still held.
#[derive(Debug, Clone)]
pub struct InputStateTracker {
    bindings: KeyBindings,
    speed: i32,
}

impl InputStateTracker {
    pub fn new(bindings: KeyBindings, speed: i32) -> Self {
        Self {
            bindings,
            speed: speed.saturating_abs(),
        }
    }

    pub fn on_key_down(&self, state: &mut ControlState, key: Key) -> Option<Trigger> {
        let method_name = "on_key_down";
        match self.bindings.lookup(key) {
            KeyAction::SetAxis(axis, dir) => {
                let value = dir.apply(self.speed);
                tracing::debug!(method_name, ?axis, value, "update");
                state.intent.set(axis, value);
                None
            }
            KeyAction::Abort => Some(Trigger::Abort),
            KeyAction::Arm | KeyAction::Disarm | KeyAction::Ignore => None,
        }
    }

    pub fn on_key_up(&self, state: &mut ControlState, key: Key) -> Option<Trigger> {
        let method_name = "on_key_up";
        match self.bindings.lookup(key) {
            KeyAction::SetAxis(axis, _) => {
                tracing::debug!(method_name, ?axis, "reset");
                state.intent.set(axis, 0);
                None
            }
            KeyAction::Arm => {
                tracing::info!(method_name, "arm");
                state.armed = true;
                Some(Trigger::Takeoff)
            }
            KeyAction::Disarm => {
                tracing::info!(method_name, "disarm");
                state.armed = false;
                Some(Trigger::Land)
            }
            KeyAction::Abort | KeyAction::Ignore => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::toggles::ToggleStore;

    const S: i32 = 60;

    fn setup() -> (InputStateTracker, ControlState) {
        (
            InputStateTracker::new(KeyBindings::default(), S),
            ControlState::new(ToggleStore::new()),
        )
    }

    #[test]
    fn test_up_key_scenario() {
        let (tracker, mut st) = setup();
        tracker.on_key_down(&mut st, Key::Up);
        assert_eq!(st.intent.longitudinal, S);
        tracker.on_key_up(&mut st, Key::Up);
        assert_eq!(st.intent.longitudinal, 0);
    }

    #[test]
    fn test_extreme_speed_saturates() {
        let tracker = InputStateTracker::new(KeyBindings::default(), i32::MIN);
        let mut st = ControlState::new(ToggleStore::new());
        tracker.on_key_down(&mut st, Key::Up);
        assert_eq!(st.intent.longitudinal, i32::MAX);
        tracker.on_key_down(&mut st, Key::Down);
        assert_eq!(st.intent.longitudinal, -i32::MAX);
    }

    #[test]
    fn test_last_key_wins_within_axis() {
        let (tracker, mut st) = setup();
        tracker.on_key_down(&mut st, Key::Char('a'));
        tracker.on_key_down(&mut st, Key::Char('d'));
        assert_eq!(st.intent.yaw, S);
        tracker.on_key_down(&mut st, Key::Char('a'));
        assert_eq!(st.intent.yaw, -S);
    }

    #[test]
    fn test_release_either_key_zeroes_axis() {
        let (tracker, mut st) = setup();
        tracker.on_key_down(&mut st, Key::Left);
        tracker.on_key_down(&mut st, Key::Right);
        // left is still held, but releasing it zeroes the axis anyway
        tracker.on_key_up(&mut st, Key::Left);
        assert_eq!(st.intent.lateral, 0);

        tracker.on_key_down(&mut st, Key::Char('w'));
        tracker.on_key_up(&mut st, Key::Char('s'));
        assert_eq!(st.intent.vertical, 0);
    }

    #[test]
    fn test_axis_values_stay_in_range() {
        let (tracker, mut st) = setup();
        let keys = [Key::Up, Key::Down];
        // deterministic pseudo-random walk over down/up edges
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let key = keys[(seed >> 16) as usize % 2];
            if (seed >> 8) & 1 == 0 {
                tracker.on_key_down(&mut st, key);
            } else {
                tracker.on_key_up(&mut st, key);
            }
            assert!([-S, 0, S].contains(&st.intent.longitudinal));
        }
    }

    #[test]
    fn test_arm_and_disarm_fire_on_key_up_only() {
        let (tracker, mut st) = setup();
        assert!(!st.armed);
        assert_eq!(tracker.on_key_down(&mut st, Key::Char('t')), None);
        assert!(!st.armed);
        assert_eq!(
            tracker.on_key_up(&mut st, Key::Char('t')),
            Some(Trigger::Takeoff)
        );
        assert!(st.armed);
        assert_eq!(tracker.on_key_down(&mut st, Key::Char('l')), None);
        assert!(st.armed);
        assert_eq!(tracker.on_key_up(&mut st, Key::Char('l')), Some(Trigger::Land));
        assert!(!st.armed);
    }

    #[test]
    fn test_escape_aborts_on_key_down() {
        let (tracker, mut st) = setup();
        assert_eq!(tracker.on_key_down(&mut st, Key::Escape), Some(Trigger::Abort));
        assert_eq!(tracker.on_key_up(&mut st, Key::Escape), None);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let (tracker, mut st) = setup();
        tracker.on_key_down(&mut st, Key::Up);
        assert_eq!(tracker.on_key_down(&mut st, Key::Char('q')), None);
        assert_eq!(tracker.on_key_up(&mut st, Key::Char('q')), None);
        assert_eq!(st.intent.longitudinal, S);
        assert!(!st.armed);
    }

    #[test]
    fn test_custom_binding_table() {
        let bindings = KeyBindings::empty()
            .bind(Key::Char('i'), KeyAction::SetAxis(Axis::Longitudinal, Direction::Positive));
        let tracker = InputStateTracker::new(bindings, -25);
        let mut st = ControlState::new(ToggleStore::new());
        tracker.on_key_down(&mut st, Key::Char('i'));
        assert_eq!(st.intent.longitudinal, 25);
        tracker.on_key_down(&mut st, Key::Up);
        assert_eq!(st.intent.get(Axis::Longitudinal), 25);
    }
}
