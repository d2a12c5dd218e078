//! Interceptor registry — ordered dispatch and in-flight tracking.
//!
//! The registry is wrapped in `Arc<tokio::sync::RwLock<_>>` by the
//! executor: `intercept()` takes `&self` (read lock, held across the
//! verdict round-trips), registration takes `&mut self`.

use crate::interceptor::wants_channel;
use crate::{InterceptionMode, Interceptor, Verdict};
use gmux_code::{Code, CodeFlags, MacroId};
use gmux_types::{CodeChannel, SourceId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// What the registry knows about a code currently held by an interceptor.
///
/// The scheduler uses this to classify nested codes: they skip ordering
/// entirely and inherit the macro context of the intercepted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptedCode {
    /// Channel of the intercepted code.
    pub channel: CodeChannel,
    /// Whether the intercepted code came from a macro.
    pub from_macro: bool,
    /// Macro the intercepted code belongs to, if any.
    pub macro_id: Option<MacroId>,
}

/// Outcome of running one interception stage over a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptionOutcome {
    /// An interceptor resolved the code; its result has been adopted.
    Resolved,
    /// Every interceptor ignored the code.
    Passed,
    /// An interceptor cancelled the code.
    Cancelled,
}

/// Registered interceptors, per mode, in registration order.
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: Vec<Arc<dyn Interceptor>>,
    in_flight: Mutex<HashMap<SourceId, InterceptedCode>>,
}

impl InterceptorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interceptor. Order of registration is dispatch order.
    pub fn register(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Removes the interceptor of `source` in `mode`.
    /// Returns `true` if one was removed.
    pub fn unregister(&mut self, source: SourceId, mode: InterceptionMode) -> bool {
        let before = self.interceptors.len();
        self.interceptors
            .retain(|i| !(i.source() == source && i.mode() == mode));
        self.interceptors.len() < before
    }

    /// Removes every interceptor registered by `source` (connection
    /// teardown). Returns the number removed.
    pub fn unregister_source(&mut self, source: SourceId) -> usize {
        let before = self.interceptors.len();
        self.interceptors.retain(|i| i.source() != source);
        before - self.interceptors.len()
    }

    /// Number of registered interceptors across all modes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// The code currently held under interception by `source`, if any.
    #[must_use]
    pub fn code_being_intercepted(&self, source: SourceId) -> Option<InterceptedCode> {
        self.in_flight.lock().get(&source).copied()
    }

    /// Runs one interception stage over `code`.
    ///
    /// Interceptors registered for `mode` are visited in registration
    /// order. An interceptor never sees codes submitted on its own
    /// connection. In `Pre`/`Post` mode the first non-ignore verdict ends
    /// the stage; in `Executed` mode every interceptor is notified and
    /// resolve/cancel verdicts are discarded with a warning.
    pub async fn intercept(&self, mode: InterceptionMode, code: &mut Code) -> InterceptionOutcome {
        for interceptor in &self.interceptors {
            if interceptor.mode() != mode
                || !wants_channel(interceptor.as_ref(), code.channel)
                || code.source == Some(interceptor.source())
            {
                continue;
            }

            let source = interceptor.source();
            self.in_flight.lock().insert(
                source,
                InterceptedCode {
                    channel: code.channel,
                    from_macro: code.flags.contains(CodeFlags::IS_FROM_MACRO),
                    macro_id: code.macro_id,
                },
            );
            let verdict = interceptor.intercept(code).await;
            self.in_flight.lock().remove(&source);

            match verdict {
                Verdict::Ignore => {}
                Verdict::Resolve(result) => {
                    if mode.can_resolve() {
                        code.flags |=
                            CodeFlags::RESOLVED_BY_INTERCEPTOR | CodeFlags::IS_INTERNALLY_PROCESSED;
                        code.result = Some(result);
                        return InterceptionOutcome::Resolved;
                    }
                    tracing::warn!(
                        %source,
                        code = %code.short_form(),
                        "resolve verdict in executed mode, ignoring"
                    );
                }
                Verdict::Cancel => {
                    if mode.can_resolve() {
                        return InterceptionOutcome::Cancelled;
                    }
                    tracing::warn!(
                        %source,
                        code = %code.short_form(),
                        "cancel verdict in executed mode, ignoring"
                    );
                }
            }
        }
        InterceptionOutcome::Passed
    }
}
