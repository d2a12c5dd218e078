//! Test doubles for the interception bus.
//!
//! [`MockInterceptor`] is used by the registry's own tests and by the
//! runtime integration tests; it is compiled into the library so dependent
//! crates can reuse it.

use crate::{InterceptionMode, Interceptor, Verdict};
use async_trait::async_trait;
use gmux_code::Code;
use gmux_types::{CodeChannel, CodeResult, SourceId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

enum Behavior {
    Ignore,
    Resolve(CodeResult),
    Cancel,
    /// Park until the sender fires, then ignore.
    Gated(Mutex<Option<oneshot::Receiver<()>>>),
}

/// Scripted interceptor with call recording.
pub struct MockInterceptor {
    source: SourceId,
    mode: InterceptionMode,
    channels: Vec<CodeChannel>,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MockInterceptor {
    fn new(mode: InterceptionMode, behavior: Behavior) -> Self {
        Self {
            source: SourceId::new(),
            mode,
            channels: Vec::new(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answers [`Verdict::Ignore`].
    #[must_use]
    pub fn pass_through(mode: InterceptionMode) -> Self {
        Self::new(mode, Behavior::Ignore)
    }

    /// Always answers [`Verdict::Resolve`] with the given result.
    #[must_use]
    pub fn resolver(mode: InterceptionMode, result: CodeResult) -> Self {
        Self::new(mode, Behavior::Resolve(result))
    }

    /// Always answers [`Verdict::Cancel`].
    #[must_use]
    pub fn canceller(mode: InterceptionMode) -> Self {
        Self::new(mode, Behavior::Cancel)
    }

    /// Parks inside `intercept` until the returned sender fires, then
    /// ignores. Good for observing in-flight state.
    #[must_use]
    pub fn gated(mode: InterceptionMode) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::new(mode, Behavior::Gated(Mutex::new(Some(rx)))),
            tx,
        )
    }

    /// Restricts the interceptor to the given channels.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<CodeChannel>) -> Self {
        self.channels = channels;
        self
    }

    /// Overrides the connection identity.
    #[must_use]
    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = source;
        self
    }

    /// Connection identity of this mock.
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Shared call counter.
    #[must_use]
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Text forms of the codes this mock has seen, in order.
    #[must_use]
    pub fn seen(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Interceptor for MockInterceptor {
    fn source(&self) -> SourceId {
        self.source
    }

    fn mode(&self) -> InterceptionMode {
        self.mode
    }

    fn channels(&self) -> &[CodeChannel] {
        &self.channels
    }

    async fn intercept(&self, code: &Code) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(code.to_string());
        match &self.behavior {
            Behavior::Ignore => Verdict::Ignore,
            Behavior::Resolve(result) => Verdict::Resolve(result.clone()),
            Behavior::Cancel => Verdict::Cancel,
            Behavior::Gated(rx) => {
                let rx = rx.lock().take();
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Verdict::Ignore
            }
        }
    }
}
