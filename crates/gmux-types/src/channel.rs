//! Input channel enumeration.
//!
//! Every code enters the system through exactly one [`CodeChannel`]. The set
//! is fixed at compile time; per-channel runtime state (ordering locks,
//! cancellation, capture slots) lives in arrays indexed by
//! [`CodeChannel::index`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical input stream a code originates from.
///
/// Each channel schedules independently: ordering guarantees hold per
/// channel, never across channels.
///
/// # Example
///
/// ```
/// use gmux_types::CodeChannel;
///
/// assert_eq!(CodeChannel::COUNT, 11);
/// assert_eq!(CodeChannel::from_index(CodeChannel::File.index()), Some(CodeChannel::File));
/// assert_eq!(CodeChannel::Http.to_string(), "HTTP");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChannel {
    /// Web requests.
    Http,
    /// Telnet sessions.
    Telnet,
    /// Codes read from a job file.
    File,
    /// USB serial.
    Usb,
    /// Auxiliary serial (e.g. PanelDue).
    Aux,
    /// Codes generated by the daemon itself.
    Daemon,
    /// Queued codes executed with the motion queue.
    Queue,
    /// Directly attached display.
    Lcd,
    /// Single-board-computer IPC clients.
    Sbc,
    /// Auto-pause events.
    Autopause,
    /// Trigger macros.
    Trigger,
}

impl CodeChannel {
    /// Number of channels.
    pub const COUNT: usize = 11;

    /// All channels in index order.
    pub const ALL: [CodeChannel; Self::COUNT] = [
        Self::Http,
        Self::Telnet,
        Self::File,
        Self::Usb,
        Self::Aux,
        Self::Daemon,
        Self::Queue,
        Self::Lcd,
        Self::Sbc,
        Self::Autopause,
        Self::Trigger,
    ];

    /// Returns the stable array index of this channel.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the channel for the given index, if any.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }
}

impl Default for CodeChannel {
    /// IPC clients that do not specify a channel act on behalf of the SBC.
    fn default() -> Self {
        Self::Sbc
    }
}

impl fmt::Display for CodeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Http => "HTTP",
            Self::Telnet => "Telnet",
            Self::File => "File",
            Self::Usb => "USB",
            Self::Aux => "Aux",
            Self::Daemon => "Daemon",
            Self::Queue => "Queue",
            Self::Lcd => "LCD",
            Self::Sbc => "SBC",
            Self::Autopause => "Autopause",
            Self::Trigger => "Trigger",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        for (i, ch) in CodeChannel::ALL.iter().enumerate() {
            assert_eq!(ch.index(), i);
            assert_eq!(CodeChannel::from_index(i), Some(*ch));
        }
        assert_eq!(CodeChannel::from_index(CodeChannel::COUNT), None);
    }

    #[test]
    fn all_is_exhaustive() {
        // A new variant must be added to ALL; this keeps COUNT honest.
        assert_eq!(CodeChannel::ALL.len(), CodeChannel::COUNT);
    }

    #[test]
    fn default_is_sbc() {
        assert_eq!(CodeChannel::default(), CodeChannel::Sbc);
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&CodeChannel::Autopause).unwrap();
        let back: CodeChannel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CodeChannel::Autopause);
    }
}
