//! Control protocol
//!
//! Text, colon-delimited: `START:<run_number>` or `STOP`. Trailing NUL bytes
//! and surrounding whitespace are ignored; the first field selects the
//! command. Anything else is not a command.

use std::fmt;

use contracts::RunNumber;

/// Remote control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start(RunNumber),
    Stop,
}

impl Command {
    /// Parse one control message; `None` for anything malformed
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());

        let mut fields = text.split(':');
        match fields.next()? {
            "START" => fields.next()?.parse().ok().map(Self::Start),
            "STOP" => Some(Self::Stop),
            _ => None,
        }
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(run) => write!(f, "START:{run}"),
            Self::Stop => write!(f, "STOP"),
        }
    }
}
