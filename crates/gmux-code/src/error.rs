//! Parser errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`CodeParserError::UnterminatedString`] | `PARSE_UNTERMINATED_STRING` | No |
//! | [`CodeParserError::UnterminatedComment`] | `PARSE_UNTERMINATED_COMMENT` | No |
//! | [`CodeParserError::InvalidNumber`] | `PARSE_INVALID_NUMBER` | No |
//! | [`CodeParserError::MissingCodeType`] | `PARSE_MISSING_CODE_TYPE` | No |
//! | [`CodeParserError::InvalidParameter`] | `PARSE_INVALID_PARAMETER` | No |

use gmux_types::ErrorCode;
use thiserror::Error;

/// Failure to parse a code or to convert one of its parameters.
///
/// Malformed input is rejected at construction; parameter conversion errors
/// surface lazily when a handler asks for a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeParserError {
    /// A quoted string was still open at the end of the line.
    #[error("unterminated quoted string")]
    UnterminatedString,

    /// A `(` comment was still open at the end of the line.
    #[error("unterminated parenthesized comment")]
    UnterminatedComment,

    /// The major or minor number chunk is not an integer.
    #[error("invalid {what} number: '{found}'")]
    InvalidNumber {
        /// Which chunk failed (`"major"` or `"minor"`).
        what: &'static str,
        /// The offending chunk.
        found: String,
    },

    /// The line does not begin with `G`, `M`, `T`, a keyword, or a comment.
    #[error("expected G, M or T code, found '{found}'")]
    MissingCodeType {
        /// First non-space character of the line.
        found: char,
    },

    /// A parameter value could not be converted to the requested type.
    #[error("parameter '{letter}' is not a valid {expected}: '{value}'")]
    InvalidParameter {
        /// Parameter letter (`'@'` for the unnamed parameter).
        letter: char,
        /// Raw value.
        value: String,
        /// The requested type.
        expected: &'static str,
    },
}

impl ErrorCode for CodeParserError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnterminatedString => "PARSE_UNTERMINATED_STRING",
            Self::UnterminatedComment => "PARSE_UNTERMINATED_COMMENT",
            Self::InvalidNumber { .. } => "PARSE_INVALID_NUMBER",
            Self::MissingCodeType { .. } => "PARSE_MISSING_CODE_TYPE",
            Self::InvalidParameter { .. } => "PARSE_INVALID_PARAMETER",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Malformed input does not improve on retry.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmux_types::assert_error_codes;

    fn all_variants() -> Vec<CodeParserError> {
        vec![
            CodeParserError::UnterminatedString,
            CodeParserError::UnterminatedComment,
            CodeParserError::InvalidNumber {
                what: "major",
                found: "1X0".into(),
            },
            CodeParserError::MissingCodeType { found: '!' },
            CodeParserError::InvalidParameter {
                letter: 'X',
                value: "abc".into(),
                expected: "float",
            },
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "PARSE_");
    }

    #[test]
    fn display_mentions_offender() {
        let err = CodeParserError::InvalidParameter {
            letter: 'S',
            value: "fast".into(),
            expected: "integer",
        };
        let text = err.to_string();
        assert!(text.contains('S'));
        assert!(text.contains("fast"));
        assert!(text.contains("integer"));
    }
}
