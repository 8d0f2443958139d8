use std::time::Instant;

use minifb::{KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::{
    compositor::ComposedFrame,
    control::{Event, Surface},
    dispatcher::Ticker,
    error::{Result, TeleopError},
    input::Key,
};

/// Native window showing the composed video and feeding keyboard, mouse and
/// timer events back into the control loop.
pub struct WindowSurface {
    window: Window,
    ticker: Ticker,
    mouse_was_down: bool,
    // set when present() already pumped the window's event queue
    pumped: bool,
}

impl WindowSurface {
    pub fn new(title: &str, width: usize, height: usize, tick_rate: u32) -> Result<Self> {
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| TeleopError::Display(format!("failed to create window: {}", e)))?;
        Ok(Self {
            window,
            ticker: Ticker::new(tick_rate, Instant::now()),
            mouse_was_down: false,
            pumped: false,
        })
    }
}

pub fn map_key(key: minifb::Key) -> Option<Key> {
    use minifb::Key as K;
    let letter = |c: char| Some(Key::Char(c));
    match key {
        K::Up => Some(Key::Up),
        K::Down => Some(Key::Down),
        K::Left => Some(Key::Left),
        K::Right => Some(Key::Right),
        K::Escape => Some(Key::Escape),
        K::A => letter('a'),
        K::B => letter('b'),
        K::C => letter('c'),
        K::D => letter('d'),
        K::E => letter('e'),
        K::F => letter('f'),
        K::G => letter('g'),
        K::H => letter('h'),
        K::I => letter('i'),
        K::J => letter('j'),
        K::K => letter('k'),
        K::L => letter('l'),
        K::M => letter('m'),
        K::N => letter('n'),
        K::O => letter('o'),
        K::P => letter('p'),
        K::Q => letter('q'),
        K::R => letter('r'),
        K::S => letter('s'),
        K::T => letter('t'),
        K::U => letter('u'),
        K::V => letter('v'),
        K::W => letter('w'),
        K::X => letter('x'),
        K::Y => letter('y'),
        K::Z => letter('z'),
        _ => None,
    }
}

impl Surface for WindowSurface {
    fn poll_events(&mut self) -> Vec<Event> {
        if !self.pumped {
            self.window.update();
        }
        self.pumped = false;

        let mut events = Vec::new();
        if !self.window.is_open() {
            events.push(Event::Quit);
            return events;
        }
        for k in self.window.get_keys_pressed(KeyRepeat::No) {
            if let Some(key) = map_key(k) {
                events.push(Event::KeyDown(key));
            }
        }
        for k in self.window.get_keys_released() {
            if let Some(key) = map_key(k) {
                events.push(Event::KeyUp(key));
            }
        }
        let down = self.window.get_mouse_down(MouseButton::Left);
        if down && !self.mouse_was_down {
            if let Some((x, y)) = self.window.get_mouse_pos(MouseMode::Discard) {
                events.push(Event::PointerDown(x as i32, y as i32));
            }
        }
        self.mouse_was_down = down;
        if self.ticker.poll(Instant::now()) {
            events.push(Event::Tick);
        }
        events
    }

    fn present(&mut self, frame: ComposedFrame) -> Result<()> {
        let buffer = frame.to_argb();
        self.window
            .update_with_buffer(&buffer, frame.width() as usize, frame.height() as usize)
            .map_err(|e| TeleopError::Display(e.to_string()))?;
        self.pumped = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::map_key;
    use crate::input::Key;

    #[test]
    fn test_map_key() {
        assert_eq!(map_key(minifb::Key::Up), Some(Key::Up));
        assert_eq!(map_key(minifb::Key::Escape), Some(Key::Escape));
        assert_eq!(map_key(minifb::Key::W), Some(Key::Char('w')));
        assert_eq!(map_key(minifb::Key::T), Some(Key::Char('t')));
        assert_eq!(map_key(minifb::Key::F1), None);
    }
}
