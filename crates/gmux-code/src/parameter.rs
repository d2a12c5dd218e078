//! Code parameters with lazy typed access.

use crate::CodeParserError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter used for the unnamed parameter (a bare quoted string, as in
/// `M117 "message"`).
pub const UNNAMED_LETTER: char = '@';

/// One `letter value` pair of a code.
///
/// The raw value is kept as text; conversion happens lazily through the
/// typed accessors and fails with [`CodeParserError::InvalidParameter`] on
/// mismatch. Vector values use `:` as separator (`X1:2:3`).
///
/// # Example
///
/// ```
/// use gmux_code::Code;
///
/// let code = Code::parse("M92 E420:420").unwrap();
/// let steps = code.parameter('E').unwrap().as_f32_vec().unwrap();
/// assert_eq!(steps, vec![420.0, 420.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Uppercase parameter letter, or [`UNNAMED_LETTER`].
    pub letter: char,
    /// Raw value as written, unquoted and unescaped.
    pub value: String,
    /// Whether the value came from a quoted string.
    pub quoted: bool,
}

impl Parameter {
    /// Creates a parameter from its parts.
    #[must_use]
    pub fn new(letter: char, value: impl Into<String>, quoted: bool) -> Self {
        Self {
            letter: letter.to_ascii_uppercase(),
            value: value.into(),
            quoted,
        }
    }

    /// Raw string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// `true` if the value is an `{…}` expression to be evaluated against
    /// the object model.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        !self.quoted && self.value.starts_with('{')
    }

    /// Converts to a bool. Accepts `0`/`1` and `true`/`false`.
    pub fn as_bool(&self) -> Result<bool, CodeParserError> {
        match self.value.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Converts to a signed integer.
    pub fn as_i32(&self) -> Result<i32, CodeParserError> {
        self.value.trim().parse().map_err(|_| self.mismatch("integer"))
    }

    /// Converts to an unsigned integer.
    pub fn as_u32(&self) -> Result<u32, CodeParserError> {
        self.value
            .trim()
            .parse()
            .map_err(|_| self.mismatch("unsigned integer"))
    }

    /// Converts to a float.
    pub fn as_f32(&self) -> Result<f32, CodeParserError> {
        self.value.trim().parse().map_err(|_| self.mismatch("float"))
    }

    /// Converts to a `:`-separated integer vector.
    pub fn as_i32_vec(&self) -> Result<Vec<i32>, CodeParserError> {
        self.value
            .split(':')
            .map(|part| part.trim().parse().map_err(|_| self.mismatch("integer vector")))
            .collect()
    }

    /// Converts to a `:`-separated float vector.
    pub fn as_f32_vec(&self) -> Result<Vec<f32>, CodeParserError> {
        self.value
            .split(':')
            .map(|part| part.trim().parse().map_err(|_| self.mismatch("float vector")))
            .collect()
    }

    fn mismatch(&self, expected: &'static str) -> CodeParserError {
        CodeParserError::InvalidParameter {
            letter: self.letter,
            value: self.value.clone(),
            expected,
        }
    }
}

impl fmt::Display for Parameter {
    /// Renders the parameter in source form, re-quoting and re-escaping
    /// string values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.letter != UNNAMED_LETTER {
            write!(f, "{}", self.letter)?;
        }
        if self.quoted {
            write!(f, "\"{}\"", self.value.replace('"', "\"\""))
        } else {
            f.write_str(&self.value)
        }
    }
}
