//! Response-framing dialects.

use crate::CodeChannel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Textual framing applied to responses on a channel.
///
/// Compatibility only affects how results are rendered on the wire: the
/// format of `M20` listings and the `ok` terminators appended during result
/// finalization. Execution semantics are identical in every mode.
///
/// # Example
///
/// ```
/// use gmux_types::{CodeChannel, Compatibility};
///
/// // USB hosts usually speak Marlin-flavoured serial.
/// assert_eq!(Compatibility::default_for(CodeChannel::Usb), Compatibility::Marlin);
/// assert_eq!(Compatibility::default_for(CodeChannel::Http), Compatibility::RepRapFirmware);
/// assert!(Compatibility::NanoDlp.is_marlin_like());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compatibility {
    /// Native framing, no cosmetics.
    Me,
    /// RepRapFirmware-style responses.
    #[default]
    RepRapFirmware,
    /// Marlin-style responses (`ok` terminators).
    Marlin,
    /// NanoDLP; framed like Marlin.
    NanoDlp,
    /// Teacup; currently framed like RepRapFirmware.
    Teacup,
    /// Sprinter; currently framed like RepRapFirmware.
    Sprinter,
    /// Repetier; currently framed like RepRapFirmware.
    Repetier,
}

impl Compatibility {
    /// Default compatibility for a freshly registered channel.
    #[must_use]
    pub fn default_for(channel: CodeChannel) -> Self {
        match channel {
            CodeChannel::Usb => Self::Marlin,
            _ => Self::RepRapFirmware,
        }
    }

    /// Whether this dialect uses Marlin `ok` terminators.
    #[must_use]
    pub fn is_marlin_like(self) -> bool {
        matches!(self, Self::Marlin | Self::NanoDlp)
    }

    /// Parses the numeric value used by `M555 P`.
    #[must_use]
    pub fn from_m555(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Me),
            1 => Some(Self::RepRapFirmware),
            2 => Some(Self::Marlin),
            3 => Some(Self::Teacup),
            4 => Some(Self::Sprinter),
            5 => Some(Self::Repetier),
            6 => Some(Self::NanoDlp),
            _ => None,
        }
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Me => "Me",
            Self::RepRapFirmware => "RepRapFirmware",
            Self::Marlin => "Marlin",
            Self::NanoDlp => "NanoDLP",
            Self::Teacup => "Teacup",
            Self::Sprinter => "Sprinter",
            Self::Repetier => "Repetier",
        };
        f.write_str(name)
    }
}
