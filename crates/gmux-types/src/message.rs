//! Structured code results.
//!
//! Executing a code produces an ordered list of typed messages. A result is
//! successful iff it contains no [`MessageType::Error`] entry. Note the
//! distinction between an **empty** result (the code ran and produced no
//! content) and **no** result (`Option<CodeResult>` = `None`, e.g. after
//! cancellation): callers must not collapse the two.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single result message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Ordinary content.
    #[default]
    Success,
    /// The code ran but something deserves attention.
    Warning,
    /// The code failed.
    Error,
}

/// One message produced while executing a code.
///
/// # Example
///
/// ```
/// use gmux_types::{Message, MessageType};
///
/// let msg = Message::new(MessageType::Warning, "heater tuned");
/// assert_eq!(msg.to_string(), "Warning: heater tuned");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Severity.
    pub kind: MessageType,
    /// Message text, without severity prefix or trailing newline.
    pub content: String,
}

impl Message {
    /// Creates a message of the given severity.
    #[must_use]
    pub fn new(kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Creates a success message.
    #[must_use]
    pub fn success(content: impl Into<String>) -> Self {
        Self::new(MessageType::Success, content)
    }

    /// Creates a warning message.
    #[must_use]
    pub fn warning(content: impl Into<String>) -> Self {
        Self::new(MessageType::Warning, content)
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageType::Error, content)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageType::Success => f.write_str(&self.content),
            MessageType::Warning => write!(f, "Warning: {}", self.content),
            MessageType::Error => write!(f, "Error: {}", self.content),
        }
    }
}

/// Ordered list of messages produced by one code.
///
/// # Example
///
/// ```
/// use gmux_types::{CodeResult, Message};
///
/// let mut result = CodeResult::empty();
/// assert!(result.is_successful());
/// assert!(result.is_empty());
///
/// result.push(Message::error("out of range"));
/// assert!(!result.is_successful());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeResult(Vec<Message>);

impl CodeResult {
    /// Creates an empty (successful) result.
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Creates a result holding a single message.
    #[must_use]
    pub fn from_message(message: Message) -> Self {
        Self(vec![message])
    }

    /// Creates a result holding one success message.
    #[must_use]
    pub fn success(content: impl Into<String>) -> Self {
        Self::from_message(Message::success(content))
    }

    /// Creates a result holding one warning message.
    #[must_use]
    pub fn warning(content: impl Into<String>) -> Self {
        Self::from_message(Message::warning(content))
    }

    /// Creates a result holding one error message.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::from_message(Message::error(content))
    }

    /// `true` iff no message is an error.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.0.iter().all(|m| m.kind != MessageType::Error)
    }

    /// `true` iff the result holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Appends a message, preserving order.
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// Messages in production order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    /// Mutable access to the messages, for finalization passes.
    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.0
    }
}

impl fmt::Display for CodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in &self.0 {
            if !first {
                f.write_str("\n")?;
            }
            write!(f, "{message}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<Message> for CodeResult {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CodeResult {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_successful() {
        let result = CodeResult::empty();
        assert!(result.is_successful());
        assert!(result.is_empty());
        assert_eq!(result.to_string(), "");
    }

    #[test]
    fn error_marks_unsuccessful() {
        let mut result = CodeResult::success("done");
        assert!(result.is_successful());
        result.push(Message::error("boom"));
        assert!(!result.is_successful());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn display_joins_lines() {
        let result: CodeResult = [
            Message::success("line one"),
            Message::warning("careful"),
            Message::error("bad"),
        ]
        .into_iter()
        .collect();
        assert_eq!(result.to_string(), "line one\nWarning: careful\nError: bad");
    }

    #[test]
    fn order_is_preserved() {
        let mut result = CodeResult::empty();
        for i in 0..5 {
            result.push(Message::success(format!("m{i}")));
        }
        let contents: Vec<_> = result.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m0", "m1", "m2", "m3", "m4"]);
    }
}
