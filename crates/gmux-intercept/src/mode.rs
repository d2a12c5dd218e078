//! Interception points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in the pipeline at which an interceptor attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterceptionMode {
    /// Before internal handling. May resolve or cancel the code.
    Pre,
    /// After internal handling declined the code, before firmware dispatch.
    /// May resolve or cancel the code.
    Post,
    /// After the result is finalized. Notification only.
    Executed,
}

impl InterceptionMode {
    /// All modes, in pipeline order.
    pub const ALL: [InterceptionMode; 3] = [Self::Pre, Self::Post, Self::Executed];

    /// `true` if verdicts in this mode can change the outcome.
    #[must_use]
    pub fn can_resolve(self) -> bool {
        !matches!(self, Self::Executed)
    }
}

impl fmt::Display for InterceptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pre => "pre",
            Self::Post => "post",
            Self::Executed => "executed",
        };
        f.write_str(s)
    }
}
