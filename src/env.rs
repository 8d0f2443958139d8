use std::{str::FromStr, time::Duration};

use crate::{
    compositor::{OverlayStyle, BLUR_TOGGLE, SIGN_TOGGLE},
    input::KeyBindings,
    toggles::{HitBox, ToggleDef},
};

lazy_static! {
    pub static ref ENV_TELLO_ADDR: String =
        get_env_str("ENV_TELLO_ADDR", String::from("192.168.10.1"));
    pub static ref ENV_TELLO_CTRL_PORT: u16 = get_env("ENV_TELLO_CTRL_PORT", 8889);
    pub static ref ENV_TELLO_STATE_PORT: u16 = get_env("ENV_TELLO_STATE_PORT", 8890);
    pub static ref ENV_TELLO_VIDEO_PORT: u16 = get_env("ENV_TELLO_VIDEO_PORT", 11111);
    pub static ref ENV_TELLO_CMD_TIMEOUT_MS: u64 = get_env("ENV_TELLO_CMD_TIMEOUT_MS", 7000);
    pub static ref ENV_TELLO_SPEED: i32 = get_env("ENV_TELLO_SPEED", 60);
    pub static ref ENV_TELLO_DRONE_SPEED: u32 = get_env("ENV_TELLO_DRONE_SPEED", 10);
    pub static ref ENV_TELLO_TICK_RATE: u32 = get_env("ENV_TELLO_TICK_RATE", 120);
    pub static ref ENV_TELLO_FPS: u32 = get_env("ENV_TELLO_FPS", 120);
    pub static ref ENV_TELLO_BLUR_KERNEL: u32 = get_env("ENV_TELLO_BLUR_KERNEL", 15);
    pub static ref ENV_TELLO_FRAME_WIDTH: u32 = get_env("ENV_TELLO_FRAME_WIDTH", 960);
    pub static ref ENV_TELLO_FRAME_HEIGHT: u32 = get_env("ENV_TELLO_FRAME_HEIGHT", 720);
    pub static ref ENV_TELLO_SIGN_ICON: String = get_env_str("ENV_TELLO_SIGN_ICON", String::new());
    pub static ref ENV_TELLO_FFMPEG: String = get_env_str("ENV_TELLO_FFMPEG", "ffmpeg".to_owned());
    pub static ref ENV_TELLO_LOG: tracing::Level = get_env("ENV_TELLO_LOG", tracing::Level::INFO);
}

/// Tunables of a teleoperation session.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Magnitude S written to an axis while its key is held.
    pub speed: i32,
    /// Value handed to the vehicle's `set_speed` at session start.
    pub drone_speed: u32,
    pub tick_rate: u32,
    /// Pause between loop iterations.
    pub frame_period: Duration,
    pub bindings: KeyBindings,
    pub toggles: Vec<ToggleDef>,
    pub style: OverlayStyle,
    pub sign_icon: Option<String>,
    pub frame_size: (u32, u32),
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            speed: 60,
            drone_speed: 10,
            tick_rate: 120,
            frame_period: fps_period(120),
            bindings: KeyBindings::default(),
            toggles: vec![
                ToggleDef::new(BLUR_TOGGLE, "Blur Effect", HitBox::new(10, 10, 30, 30)),
                ToggleDef::new(SIGN_TOGGLE, "Sign", HitBox::new(10, 40, 30, 60)),
            ],
            style: OverlayStyle::default(),
            sign_icon: None,
            frame_size: (960, 720),
        }
    }
}

impl ControlConfig {
    pub fn from_env() -> Self {
        let frame_size = (*ENV_TELLO_FRAME_WIDTH, *ENV_TELLO_FRAME_HEIGHT);
        let style = OverlayStyle {
            blur_kernel: *ENV_TELLO_BLUR_KERNEL,
            icon_origin: (frame_size.0 as i32 - 80, 10),
            ..OverlayStyle::default()
        };
        let sign_icon = Some(ENV_TELLO_SIGN_ICON.clone()).filter(|p| !p.is_empty());
        Self {
            speed: *ENV_TELLO_SPEED,
            drone_speed: *ENV_TELLO_DRONE_SPEED,
            tick_rate: *ENV_TELLO_TICK_RATE,
            frame_period: fps_period(*ENV_TELLO_FPS),
            style,
            sign_icon,
            frame_size,
            ..Self::default()
        }
    }
}

fn fps_period(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}

pub fn get_env_str(name: &str, value: String) -> String {
    std::env::var(name).unwrap_or(value)
}

/// Reads `name` from the environment, falling back to `value` when the
/// variable is missing or does not parse.
pub fn get_env<T: FromStr>(name: &str, value: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(value),
        Err(_) => value,
    }
}

#[cfg(test)]
mod test {
    use super::{fps_period, get_env, get_env_str, ControlConfig};
    use std::time::Duration;

    #[test]
    fn test_get_env_fallbacks() {
        std::env::set_var("TELLO_TEST_BAD_NUMBER", "sixty");
        assert_eq!(get_env("TELLO_TEST_BAD_NUMBER", 60), 60);
        assert_eq!(get_env("TELLO_TEST_NOT_SET_AT_ALL", 8889u16), 8889);
        assert_eq!(
            get_env_str("TELLO_TEST_NOT_SET_AT_ALL", "x".to_owned()),
            "x"
        );
    }

    #[test]
    fn test_get_env_parses() {
        std::env::set_var("TELLO_TEST_TICK_RATE", " 30 ");
        assert_eq!(get_env("TELLO_TEST_TICK_RATE", 120u32), 30);
        std::env::set_var("TELLO_TEST_LEVEL", "debug");
        assert_eq!(
            get_env("TELLO_TEST_LEVEL", tracing::Level::INFO),
            tracing::Level::DEBUG
        );
    }

    #[test]
    fn test_default_config_matches_manual_control() {
        let c = ControlConfig::default();
        assert_eq!(c.speed, 60);
        assert_eq!(c.tick_rate, 120);
        assert_eq!(c.toggles[0].name, "blur");
        assert_eq!(c.toggles[0].hitbox.x0, 10);
        assert_eq!(c.toggles[0].hitbox.y1, 30);
        assert_eq!(c.style.blur_kernel, 15);
        assert_eq!(fps_period(0), Duration::from_secs(1));
    }
}
