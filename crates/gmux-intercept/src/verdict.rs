//! Interceptor verdicts.

use gmux_types::CodeResult;
use serde::{Deserialize, Serialize};

/// Decision an interceptor returns for one code.
///
/// Exactly one verdict is produced per code per interceptor per mode; the
/// wire protocol enforces this by answering each transmitted code with a
/// single reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// Adopt this result and skip the rest of the pipeline. The code is
    /// marked as resolved by an interceptor and as internally processed;
    /// `Executed` hooks still fire.
    Resolve(CodeResult),
    /// Not interested; the pipeline continues.
    Ignore,
    /// Abort the code as cancelled.
    Cancel,
}

impl Verdict {
    /// `true` for [`Verdict::Ignore`].
    #[must_use]
    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}
