//! Code and keyword classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lexical class of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeType {
    /// Motion and geometry codes (`G…`).
    G,
    /// Miscellaneous codes (`M…`).
    M,
    /// Tool selection (`T…`).
    T,
    /// A line holding only a comment (or nothing at all).
    Comment,
    /// A meta keyword line (`echo`, `if`, `while`, …).
    Keyword,
}

impl CodeType {
    /// Maps a code letter to its type.
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'G' => Some(Self::G),
            'M' => Some(Self::M),
            'T' => Some(Self::T),
            _ => None,
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::G => "G",
            Self::M => "M",
            Self::T => "T",
            Self::Comment => "comment",
            Self::Keyword => "keyword",
        };
        f.write_str(s)
    }
}

/// Meta keyword introducing a non-G/M/T line.
///
/// Only `echo` is interpreted by the execution core itself; the control-flow
/// keywords are consumed by the macro interpreter before codes reach the
/// pipeline, and feeding one of them into internal processing is an
/// invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    /// Evaluate an expression and report it.
    Echo,
    /// Conditional block start.
    If,
    /// Conditional alternative with condition.
    ElseIf,
    /// Conditional alternative.
    Else,
    /// Loop block start.
    While,
    /// Leave the innermost loop.
    Break,
    /// Next iteration of the innermost loop.
    Continue,
    /// Declare a local variable.
    Var,
    /// Assign a variable.
    Set,
    /// Abort the current file with a message.
    Abort,
}

impl Keyword {
    /// Parses a lowercase keyword word. Returns `None` for anything else.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "echo" => Some(Self::Echo),
            "if" => Some(Self::If),
            "elif" => Some(Self::ElseIf),
            "else" => Some(Self::Else),
            "while" => Some(Self::While),
            "break" => Some(Self::Break),
            "continue" => Some(Self::Continue),
            "var" => Some(Self::Var),
            "set" => Some(Self::Set),
            "abort" => Some(Self::Abort),
            _ => None,
        }
    }

    /// The source-form word of this keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::If => "if",
            Self::ElseIf => "elif",
            Self::Else => "else",
            Self::While => "while",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Var => "var",
            Self::Set => "set",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_case_insensitively() {
        assert_eq!(CodeType::from_letter('g'), Some(CodeType::G));
        assert_eq!(CodeType::from_letter('M'), Some(CodeType::M));
        assert_eq!(CodeType::from_letter('t'), Some(CodeType::T));
        assert_eq!(CodeType::from_letter('X'), None);
    }

    #[test]
    fn keyword_words_round_trip() {
        for kw in [
            Keyword::Echo,
            Keyword::If,
            Keyword::ElseIf,
            Keyword::Else,
            Keyword::While,
            Keyword::Break,
            Keyword::Continue,
            Keyword::Var,
            Keyword::Set,
            Keyword::Abort,
        ] {
            assert_eq!(Keyword::parse(kw.as_str()), Some(kw));
        }
        assert_eq!(Keyword::parse("echoing"), None);
        assert_eq!(Keyword::parse(""), None);
    }
}
