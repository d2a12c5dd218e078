//! Per-channel ordering and cancellation.
//!
//! For every (channel, priority class) pair the scheduler keeps two fair
//! FIFO locks:
//!
//! - the **start lock** bounds admission: at most one code per pair is
//!   between admission and its pipelining decision, and waiters drain in
//!   submission order;
//! - the **finish lock** bounds completion: result finalization runs in
//!   admission order, even when pipelined firmware replies arrive out of
//!   order. The finish slot is reserved *while the start lock is still
//!   held*, which is what pins the order.
//!
//! Codes of a higher class may overtake lower classes at admission (the
//! classes use disjoint lock pairs); within a class nothing overtakes.
//!
//! Cancellation is per channel: [`Scheduler::cancel_pending`] swaps the
//! channel's token and cancels the old one, so not-yet-admitted codes fail
//! while in-flight codes only observe the cancellation at their next
//! suspension point.

mod fifo_lock;

pub use fifo_lock::{FifoGuard, FifoLock, PendingGuard};

use crate::capture::CaptureWriter;
use crate::macros::MacroArena;
use crate::ControlError;
use gmux_code::{Code, CodeFlags, CodeType};
use gmux_types::CodeChannel;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Priority class a code is admitted under. Higher classes overtake lower
/// ones at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CodeClass {
    /// Ordinary codes.
    Regular = 0,
    /// Codes racing a message-box acknowledgement.
    Acknowledgement = 1,
    /// Codes emitted from macro files.
    Macro = 2,
    /// Codes flagged as prioritized.
    Prioritized = 3,
}

impl CodeClass {
    /// Number of classes.
    pub const COUNT: usize = 4;

    /// All classes in ascending priority.
    pub const ALL: [CodeClass; Self::COUNT] = [
        Self::Regular,
        Self::Acknowledgement,
        Self::Macro,
        Self::Prioritized,
    ];

    /// Stable array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Start/finish lock pair of one (channel, class) slot or one macro.
#[derive(Clone, Default)]
pub struct LockPair {
    /// Admission lock.
    pub start: FifoLock,
    /// Completion lock.
    pub finish: FifoLock,
}

impl LockPair {
    /// Creates a fresh pair.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

struct ChannelState {
    locks: [LockPair; CodeClass::COUNT],
    cancel: parking_lot::Mutex<CancellationToken>,
    awaiting_ack: AtomicBool,
    capture: tokio::sync::Mutex<Option<CaptureWriter>>,
}

impl ChannelState {
    fn new(root: &CancellationToken) -> Self {
        Self {
            locks: std::array::from_fn(|_| LockPair::new()),
            cancel: parking_lot::Mutex::new(root.child_token()),
            awaiting_ack: AtomicBool::new(false),
            capture: tokio::sync::Mutex::new(None),
        }
    }
}

/// An execution slot handed out by the scheduler.
///
/// Holds the start guard and the reserved finish slot. The start guard is
/// released explicitly once the code decides to pipeline (or implicitly on
/// drop); [`Admission::wait_for_finish`] converts the reserved finish slot
/// into the held finish lock and is deliberately not cancellable, so
/// completion ordering survives errors and cancellation.
pub struct Admission {
    class: CodeClass,
    token: CancellationToken,
    start: Option<FifoGuard>,
    finish: Option<PendingGuard>,
    finish_guard: Option<FifoGuard>,
}

impl Admission {
    fn unordered(token: CancellationToken) -> Self {
        Self {
            class: CodeClass::Regular,
            token,
            start: None,
            finish: None,
            finish_guard: None,
        }
    }

    /// Class the code was admitted under.
    #[must_use]
    pub fn class(&self) -> CodeClass {
        self.class
    }

    /// Cancellation token in effect for this code.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` while the admission still holds its start lock.
    #[must_use]
    pub fn holds_start(&self) -> bool {
        self.start.is_some()
    }

    /// Releases the start lock so the next code of the class can be
    /// admitted. Idempotent.
    pub fn release_start(&mut self) {
        self.start = None;
    }

    /// Acquires the finish lock at the reserved queue position.
    pub async fn wait_for_finish(&mut self) {
        if let Some(pending) = self.finish.take() {
            self.finish_guard = Some(pending.wait().await);
        }
    }
}

/// Process-wide scheduling state: the lock matrix, per-channel
/// cancellation and the `M28` capture slots.
pub struct Scheduler {
    channels: [ChannelState; CodeChannel::COUNT],
    root: CancellationToken,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with its own root cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(CancellationToken::new())
    }

    /// Creates a scheduler linked to a process-wide token.
    #[must_use]
    pub fn with_root(root: CancellationToken) -> Self {
        Self {
            channels: std::array::from_fn(|_| ChannelState::new(&root)),
            root,
        }
    }

    fn channel(&self, channel: CodeChannel) -> &ChannelState {
        &self.channels[channel.index()]
    }

    /// Classifies a code into its priority class.
    ///
    /// The interceptor-nested rule is applied by the executor before this
    /// is consulted; everything else lives here, first match wins.
    #[must_use]
    pub fn classify(&self, code: &Code) -> CodeClass {
        if code.flags.contains(CodeFlags::IS_PRIORITIZED) {
            CodeClass::Prioritized
        } else if code.flags.contains(CodeFlags::IS_FROM_MACRO) {
            CodeClass::Macro
        } else if self.awaiting_acknowledgement(code.channel)
            && !(code.is(CodeType::M, 0) || code.is(CodeType::M, 1))
        {
            CodeClass::Acknowledgement
        } else {
            CodeClass::Regular
        }
    }

    /// Admits a code: waits for its start lock and reserves its finish
    /// slot.
    ///
    /// Macro-class codes with an attached macro serialize through that
    /// macro's gate instead of the channel's Macro class lock.
    ///
    /// # Errors
    ///
    /// [`ControlError::Cancelled`] when the channel is cancelled before
    /// the code is admitted.
    pub async fn wait_for_execution(
        &self,
        code: &Code,
        macros: &MacroArena,
    ) -> Result<Admission, ControlError> {
        let class = self.classify(code);
        let token = self.channel_token(code.channel);

        let pair = if class == CodeClass::Macro {
            code.macro_id
                .and_then(|id| macros.get(id))
                .map(|state| state.gate.clone())
                .unwrap_or_else(|| self.channel(code.channel).locks[class.index()].clone())
        } else {
            self.channel(code.channel).locks[class.index()].clone()
        };

        let pending = pair.start.enqueue();
        let start = tokio::select! {
            () = token.cancelled() => return Err(ControlError::Cancelled),
            guard = pending.wait() => guard,
        };
        // Reserve the finish slot while the start lock is held; this is
        // what makes completion order equal admission order.
        let finish = pair.finish.enqueue();

        Ok(Admission {
            class,
            token,
            start: Some(start),
            finish: Some(finish),
            finish_guard: None,
        })
    }

    /// Admission without any ordering locks, for codes emitted by an
    /// interceptor while it holds a code under interception.
    #[must_use]
    pub fn admit_unordered(&self, channel: CodeChannel) -> Admission {
        Admission::unordered(self.channel_token(channel))
    }

    /// The channel's current cancellation token.
    #[must_use]
    pub fn channel_token(&self, channel: CodeChannel) -> CancellationToken {
        self.channel(channel).cancel.lock().clone()
    }

    /// Cancels every code on the channel that has not been admitted yet.
    ///
    /// The channel's token is atomically replaced, so codes already past
    /// their start lock keep running and only observe the cancellation at
    /// their next suspension point.
    pub fn cancel_pending(&self, channel: CodeChannel) {
        let fresh = self.root.child_token();
        let old = {
            let mut slot = self.channel(channel).cancel.lock();
            std::mem::replace(&mut *slot, fresh)
        };
        old.cancel();
        tracing::debug!(%channel, "pending codes cancelled");
    }

    /// Cancels everything, process-wide.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Marks whether the channel is waiting for a message-box
    /// acknowledgement.
    pub fn set_awaiting_acknowledgement(&self, channel: CodeChannel, awaiting: bool) {
        self.channel(channel)
            .awaiting_ack
            .store(awaiting, Ordering::Release);
    }

    /// `true` while the channel waits for a message-box acknowledgement.
    #[must_use]
    pub fn awaiting_acknowledgement(&self, channel: CodeChannel) -> bool {
        self.channel(channel).awaiting_ack.load(Ordering::Acquire)
    }

    /// The channel's `M28` capture slot.
    #[must_use]
    pub fn capture_slot(&self, channel: CodeChannel) -> &tokio::sync::Mutex<Option<CaptureWriter>> {
        &self.channel(channel).capture
    }
}
