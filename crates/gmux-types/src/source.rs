//! Connection identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a connected client.
///
/// Every IPC connection (command clients and interceptors alike) gets a
/// random identity when it attaches. Codes carry the id of the connection
/// that submitted them, which is what lets the scheduler recognize codes
/// emitted from inside an interception callback.
///
/// # Example
///
/// ```
/// use gmux_types::SourceId;
///
/// let a = SourceId::new();
/// let b = SourceId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Creates a fresh random id.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
