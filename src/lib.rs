pub mod compositor;
pub mod control;
pub mod dispatcher;
pub mod env;
pub mod error;
pub(crate) mod font;
pub mod input;
pub mod tello;
pub mod toggles;
pub(crate) mod utils;
pub mod video;
pub mod window;

#[macro_use]
extern crate lazy_static;

pub use control::{ControlLoop, ControlState, Event, FrameSource, LoopState, StopReason, Surface, Vehicle};
pub use env::ControlConfig;
pub use error::TeleopError;
