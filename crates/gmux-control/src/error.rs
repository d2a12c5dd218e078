//! Control layer errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`ControlError::Parser`] | delegated (`PARSE_*`) | No |
//! | [`ControlError::Cancelled`] | `CONTROL_CANCELLED` | Yes |
//! | [`ControlError::NotSupported`] | `CONTROL_NOT_SUPPORTED` | No |
//! | [`ControlError::Handler`] | `CONTROL_HANDLER` | No |
//! | [`ControlError::Io`] | `CONTROL_IO` | No |
//! | [`ControlError::Transport`] | `CONTROL_TRANSPORT` | Yes |
//! | [`ControlError::Protocol`] | `CONTROL_PROTOCOL` | No |
//!
//! Policy: transient I/O failures *inside a handler* (a missing file for
//! `M30`, say) do not surface here at all; the handler converts them into
//! an error [`Message`](gmux_types::Message) attached to the result.
//! `ControlError` is for failures of the pipeline itself.

use gmux_code::CodeParserError;
use gmux_types::ErrorCode;
use thiserror::Error;

/// Failure raised while scheduling or executing a code.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The code text was malformed.
    #[error(transparent)]
    Parser(#[from] CodeParserError),

    /// The code was cancelled cooperatively. Raised again *after*
    /// finalization so completion ordering is preserved.
    #[error("code has been cancelled")]
    Cancelled,

    /// The code is intentionally unhandled (e.g. `M998`). The pipeline
    /// converts this into an error result instead of propagating it.
    #[error("code is not supported")]
    NotSupported,

    /// An internal handler failed in a way that is not attributable to a
    /// transient I/O condition. Logged, then rethrown; the code is not
    /// forwarded to the firmware.
    #[error("handler failed: {0}")]
    Handler(String),

    /// I/O failure outside handler result policy (macro file reads,
    /// capture writes).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The firmware transport failed to carry the code.
    #[error("firmware transport failed: {0}")]
    Transport(String),

    /// Internal state machine violation; a bug, not an input error.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl ErrorCode for ControlError {
    fn code(&self) -> &'static str {
        match self {
            Self::Parser(e) => e.code(),
            Self::Cancelled => "CONTROL_CANCELLED",
            Self::NotSupported => "CONTROL_NOT_SUPPORTED",
            Self::Handler(_) => "CONTROL_HANDLER",
            Self::Io(_) => "CONTROL_IO",
            Self::Transport(_) => "CONTROL_TRANSPORT",
            Self::Protocol(_) => "CONTROL_PROTOCOL",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmux_types::assert_error_codes;

    fn control_variants() -> Vec<ControlError> {
        vec![
            ControlError::Cancelled,
            ControlError::NotSupported,
            ControlError::Handler("x".into()),
            ControlError::Io(std::io::Error::other("x")),
            ControlError::Transport("x".into()),
            ControlError::Protocol("x".into()),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&control_variants(), "CONTROL_");
    }

    #[test]
    fn parser_errors_keep_their_code() {
        let err = ControlError::from(CodeParserError::UnterminatedString);
        assert_eq!(err.code(), "PARSE_UNTERMINATED_STRING");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn recoverability() {
        assert!(ControlError::Cancelled.is_recoverable());
        assert!(ControlError::Transport("gone".into()).is_recoverable());
        assert!(!ControlError::NotSupported.is_recoverable());
        assert!(!ControlError::Protocol("bad".into()).is_recoverable());
    }
}
