use std::fmt;

/// Direction a backend moves audio in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Playback,
    Capture,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playback => f.write_str("playback"),
            Self::Capture => f.write_str("capture"),
        }
    }
}

/// Backend lifecycle state machine.
///
/// State transitions:
/// ```text
/// closed → open → configured ⇄ running
///            ↑        │
///            └────────┘  (failed reset)
/// ```
/// Capture backends configure their stream while opening and go straight
/// from closed to configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendState {
    Closed,
    Open,
    Configured,
    Running,
}

impl BackendState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether native handles are held (any state other than closed).
    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    /// Whether a stream endpoint exists.
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured | Self::Running)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Configured => "configured",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}
