//! The interceptor trait.

use crate::{InterceptionMode, Verdict};
use async_trait::async_trait;
use gmux_code::Code;
use gmux_types::{CodeChannel, SourceId};

/// An external observer attached to the pipeline.
///
/// Implementations typically proxy an IPC connection: `intercept` transmits
/// the code to the peer and awaits its reply. A broken or unresponsive peer
/// must be mapped to [`Verdict::Ignore`] so one dead client cannot wedge
/// the pipeline.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Identity of the connection backing this interceptor.
    ///
    /// Codes submitted on the same connection while `intercept` is awaited
    /// bypass scheduling (see the crate documentation).
    fn source(&self) -> SourceId;

    /// The point this interceptor attaches at.
    fn mode(&self) -> InterceptionMode;

    /// Channels this interceptor wants to see. Empty means all channels.
    fn channels(&self) -> &[CodeChannel] {
        &[]
    }

    /// Delivers one code and returns the verdict.
    async fn intercept(&self, code: &Code) -> Verdict;
}

/// Channel filter shared by the registry.
pub(crate) fn wants_channel(interceptor: &dyn Interceptor, channel: CodeChannel) -> bool {
    let filter = interceptor.channels();
    filter.is_empty() || filter.contains(&channel)
}
