use std::fmt;

#[derive(Debug)]
pub enum TeleopError {
    Io(std::io::Error),
    /// No reply arrived for a command within the command timeout.
    Timeout { command: String },
    /// The vehicle answered something other than `ok`.
    Rejected { command: String, response: String },
    NotConnected,
    ToggleNotFound(String),
    /// A toggle definition clashes with one already registered.
    InvalidToggle(String),
    Display(String),
    Decoder(String),
}

impl fmt::Display for TeleopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeleopError::Io(e) => write!(f, "i/o error: {e}"),
            TeleopError::Timeout { command } => {
                write!(f, "no response to command '{command}'")
            }
            TeleopError::Rejected { command, response } => {
                write!(f, "command '{command}' rejected: {response}")
            }
            TeleopError::NotConnected => write!(f, "vehicle is not connected"),
            TeleopError::ToggleNotFound(name) => write!(f, "toggle '{name}' is not registered"),
            TeleopError::InvalidToggle(msg) => write!(f, "invalid toggle: {msg}"),
            TeleopError::Display(msg) => write!(f, "display error: {msg}"),
            TeleopError::Decoder(msg) => write!(f, "video decoder error: {msg}"),
        }
    }
}

impl std::error::Error for TeleopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TeleopError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TeleopError {
    fn from(e: std::io::Error) -> Self {
        TeleopError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, TeleopError>;
