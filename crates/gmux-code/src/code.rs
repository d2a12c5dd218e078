//! The code value.

use crate::code_type::{CodeType, Keyword};
use crate::parameter::Parameter;
use crate::{CodeFlags, CodeParserError};
use gmux_types::{CodeChannel, CodeResult, SourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of an executing macro file.
///
/// Macros live in an arena owned by the runtime; codes carry only the slot
/// index. Looking the state up on each access keeps the code value free of
/// owning references back into the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacroId(pub usize);

impl fmt::Display for MacroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "macro #{}", self.0)
    }
}

/// A parsed G/M/T-code.
///
/// A code is owned by the task executing it. The scheduler never holds a
/// reference to a code; ordering state is keyed by channel and priority
/// class alone.
///
/// # Example
///
/// ```
/// use gmux_code::{Code, CodeType};
/// use gmux_types::CodeChannel;
///
/// let mut code = Code::parse_on("M25", CodeChannel::Http).unwrap();
/// assert!(code.is(CodeType::M, 25));
/// assert_eq!(code.channel, CodeChannel::Http);
/// assert_eq!(code.short_form(), "M25");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    /// Connection that submitted the code, if any.
    pub source: Option<SourceId>,
    /// Channel the code executes on.
    pub channel: CodeChannel,
    /// Lifecycle flags.
    pub flags: CodeFlags,
    /// Lexical class.
    pub code_type: CodeType,
    /// Major number (`G1` → 1). `None` for a bare `T`.
    pub major: Option<i32>,
    /// Minor number (`G53.4` → 4).
    pub minor: Option<i32>,
    /// Parameters in source order.
    pub parameters: Vec<Parameter>,
    /// Comment text, exactly as written (without delimiters).
    pub comment: Option<String>,
    /// Byte offset in the source file, when read from one.
    pub file_position: Option<u64>,
    /// Line number in the source file, when read from one.
    pub line_number: Option<u64>,
    /// Executing macro this code belongs to.
    pub macro_id: Option<MacroId>,
    /// Result, assigned exactly once during finalization.
    pub result: Option<CodeResult>,
    /// Meta keyword for [`CodeType::Keyword`] lines.
    pub keyword: Option<Keyword>,
    /// Raw argument of the keyword line.
    pub keyword_argument: Option<String>,
}

impl Code {
    /// Creates an empty comment code on the given channel.
    pub(crate) fn empty(channel: CodeChannel) -> Self {
        Self {
            source: None,
            channel,
            flags: CodeFlags::default(),
            code_type: CodeType::Comment,
            major: None,
            minor: None,
            parameters: Vec::new(),
            comment: None,
            file_position: None,
            line_number: None,
            macro_id: None,
            result: None,
            keyword: None,
            keyword_argument: None,
        }
    }

    /// Parses a line of text on the default channel.
    ///
    /// # Errors
    ///
    /// Returns [`CodeParserError`] for malformed input; see the error type
    /// for the failure modes.
    pub fn parse(text: &str) -> Result<Self, CodeParserError> {
        Self::parse_on(text, CodeChannel::default())
    }

    /// Parses a line of text on a specific channel.
    ///
    /// # Errors
    ///
    /// Returns [`CodeParserError`] for malformed input.
    pub fn parse_on(text: &str, channel: CodeChannel) -> Result<Self, CodeParserError> {
        crate::parser::parse(text, channel)
    }

    /// Looks up a parameter by letter, case-insensitively.
    #[must_use]
    pub fn parameter(&self, letter: char) -> Option<&Parameter> {
        let letter = letter.to_ascii_uppercase();
        self.parameters.iter().find(|p| p.letter == letter)
    }

    /// `true` if a parameter with this letter is present.
    #[must_use]
    pub fn has_parameter(&self, letter: char) -> bool {
        self.parameter(letter).is_some()
    }

    /// `true` if this is the given code (e.g. `is(CodeType::M, 29)`).
    #[must_use]
    pub fn is(&self, code_type: CodeType, major: i32) -> bool {
        self.code_type == code_type && self.major == Some(major)
    }

    /// `true` if any parameter carries an `{…}` expression.
    #[must_use]
    pub fn has_expressions(&self) -> bool {
        self.parameters.iter().any(Parameter::is_expression)
    }

    /// Short form used to prefix error messages: `M997`, `G53.4`, `T`.
    #[must_use]
    pub fn short_form(&self) -> String {
        match self.code_type {
            CodeType::Comment => ";".to_string(),
            CodeType::Keyword => self
                .keyword
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            _ => {
                let mut out = self.code_type.to_string();
                if let Some(major) = self.major {
                    out.push_str(&major.to_string());
                    if let Some(minor) = self.minor {
                        out.push('.');
                        out.push_str(&minor.to_string());
                    }
                }
                out
            }
        }
    }
}

impl fmt::Display for Code {
    /// Renders the canonical text form. Parsing the rendered form yields an
    /// equal code modulo whitespace; parenthesized comments re-render as
    /// line comments.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code_type {
            CodeType::Comment => {
                if let Some(comment) = &self.comment {
                    write!(f, ";{comment}")?;
                }
                Ok(())
            }
            CodeType::Keyword => {
                if let Some(keyword) = self.keyword {
                    f.write_str(keyword.as_str())?;
                }
                if let Some(argument) = &self.keyword_argument {
                    write!(f, " {argument}")?;
                }
                Ok(())
            }
            _ => {
                f.write_str(&self.short_form())?;
                for parameter in &self.parameters {
                    write!(f, " {parameter}")?;
                }
                if let Some(comment) = &self.comment {
                    write!(f, " ;{comment}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_lookup_is_case_insensitive() {
        let code = Code::parse("G1 x5 Y10").unwrap();
        assert!(code.has_parameter('X'));
        assert!(code.has_parameter('x'));
        assert!(code.has_parameter('y'));
        assert!(!code.has_parameter('Z'));
    }

    #[test]
    fn short_forms() {
        assert_eq!(Code::parse("M997 S1").unwrap().short_form(), "M997");
        assert_eq!(Code::parse("G53.4").unwrap().short_form(), "G53.4");
        assert_eq!(Code::parse("T").unwrap().short_form(), "T");
        assert_eq!(Code::parse("echo 1").unwrap().short_form(), "echo");
    }

    #[test]
    fn display_renders_source_form() {
        let code = Code::parse("M117 \"Hello \"\"world\"\"\"").unwrap();
        assert_eq!(code.to_string(), "M117 \"Hello \"\"world\"\"\"");

        let move_code = Code::parse("G1 X10.5 Y-3 ; move").unwrap();
        assert_eq!(move_code.to_string(), "G1 X10.5 Y-3 ; move");
    }

    #[test]
    fn is_matches_type_and_major() {
        let code = Code::parse("M29").unwrap();
        assert!(code.is(CodeType::M, 29));
        assert!(!code.is(CodeType::M, 28));
        assert!(!code.is(CodeType::G, 29));
    }

    #[test]
    fn serde_round_trip() {
        let mut code = Code::parse("G1 X1").unwrap();
        code.source = Some(SourceId::new());
        code.flags |= CodeFlags::UNBUFFERED;
        let json = serde_json::to_string(&code).unwrap();
        let back: Code = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
