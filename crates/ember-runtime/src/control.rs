use std::fmt;
use std::str::FromStr;

use crate::error::RuntimeError;

/// Commands accepted from the host's control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    WakeWordStart,
    WakeWordStop,
    WakeWordRestart,
}

impl ControlAction {
    pub const ALL: [ControlAction; 6] = [
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::WakeWordStart,
        Self::WakeWordStop,
        Self::WakeWordRestart,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::WakeWordStart => "wakeword_start",
            Self::WakeWordStop => "wakeword_stop",
            Self::WakeWordRestart => "wakeword_restart",
        }
    }
}

impl FromStr for ControlAction {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| RuntimeError::UnknownAction(name.to_string()))
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
