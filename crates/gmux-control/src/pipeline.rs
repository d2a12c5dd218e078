//! The execution pipeline.
//!
//! One [`CodeExecutor`] per daemon. For every code:
//!
//! ```text
//! execute() ── admission (scheduler) ── run()
//!                                        │  capture active? → append to file
//!                                        ▼
//!                                     process()
//!                                        │  pre-intercept → internal handler → post-intercept
//!                                        │  unresolved → firmware dispatch (pipelined)
//!                                        ▼
//!                  wait_for_finish() ── code_executed() ── release slot
//! ```
//!
//! Cancellation raised anywhere inside `process()` clears the result, still
//! acquires the finish lock and still runs finalization, then re-raises, so
//! the caller observes the cancellation while completion ordering stays
//! intact.

use crate::diagnostics::Diagnostics;
use crate::event_log::EventLog;
use crate::expressions;
use crate::firmware::FirmwareInterface;
use crate::handlers;
use crate::macros::MacroArena;
use crate::model::MachineModel;
use crate::sched::{Admission, Scheduler};
use crate::{ControlError, Settings};
use gmux_code::{Code, CodeFlags, CodeType, Keyword, MacroId};
use gmux_intercept::{InterceptedCode, InterceptionMode, InterceptionOutcome, Interceptor, InterceptorRegistry};
use gmux_types::{CodeChannel, CodeResult, Compatibility, Message, MessageType};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// The code execution core.
///
/// Owns the scheduler, the interception bus, the object model store, the
/// macro arena and the firmware handle; request handlers share it through
/// an `Arc`.
pub struct CodeExecutor {
    scheduler: Arc<Scheduler>,
    interceptors: Arc<RwLock<InterceptorRegistry>>,
    firmware: Arc<dyn FirmwareInterface>,
    model: Arc<MachineModel>,
    macros: Arc<MacroArena>,
    settings: Settings,
    event_log: EventLog,
    diagnostics: Diagnostics,
}

impl CodeExecutor {
    /// Creates an executor around a firmware transport.
    #[must_use]
    pub fn new(firmware: Arc<dyn FirmwareInterface>, settings: Settings) -> Arc<Self> {
        Arc::new(Self {
            scheduler: Arc::new(Scheduler::new()),
            interceptors: Arc::new(RwLock::new(InterceptorRegistry::new())),
            firmware,
            model: Arc::new(MachineModel::new()),
            macros: Arc::new(MacroArena::new()),
            settings,
            event_log: EventLog::new(),
            diagnostics: Diagnostics::new(),
        })
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// The object model store.
    #[must_use]
    pub fn model(&self) -> &Arc<MachineModel> {
        &self.model
    }

    /// The macro arena.
    #[must_use]
    pub fn macros(&self) -> &Arc<MacroArena> {
        &self.macros
    }

    /// The firmware transport.
    #[must_use]
    pub fn firmware(&self) -> &Arc<dyn FirmwareInterface> {
        &self.firmware
    }

    /// Daemon settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The event log (`M929`).
    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Execution counters (`M122`).
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Registers an interceptor.
    pub async fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.write().await.register(interceptor);
    }

    /// Removes every interceptor of a disconnected source.
    pub async fn unregister_source(&self, source: gmux_types::SourceId) -> usize {
        self.interceptors.write().await.unregister_source(source)
    }

    /// Executes one code to completion.
    ///
    /// Asynchronous codes are spawned fire-and-forget and yield `None`;
    /// everything else returns the finalized result.
    ///
    /// # Errors
    ///
    /// [`ControlError::Cancelled`] after cancellation (raised only once
    /// finalization has run), or the failure that stopped the pipeline.
    pub fn execute(
        self: &Arc<Self>,
        mut code: Code,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<Option<CodeResult>, ControlError>> + Send + '_>> {
        Box::pin(async move {
            // Codes emitted by an interceptor that currently holds a code of
            // ours bypass ordering entirely, inheriting the macro context of
            // the intercepted code; anything else would deadlock on the locks
            // its own code still occupies.
            let admission = match self.nested_context(&code).await {
                Some(nested) => {
                    if nested.from_macro {
                        code.flags |= CodeFlags::IS_FROM_MACRO;
                    }
                    if code.macro_id.is_none() {
                        code.macro_id = nested.macro_id;
                    }
                    self.scheduler.admit_unordered(code.channel)
                }
                None => self.scheduler.wait_for_execution(&code, &self.macros).await?,
            };

            if code.flags.contains(CodeFlags::ASYNCHRONOUS) {
                let executor = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = executor.run(code, admission).await {
                        debug!(error = %e, "asynchronous code failed");
                    }
                });
                return Ok(None);
            }
            self.run(code, admission).await.map(Some)
        })
    }

    async fn nested_context(&self, code: &Code) -> Option<InterceptedCode> {
        let source = code.source?;
        self.interceptors
            .read()
            .await
            .code_being_intercepted(source)
    }

    /// Runs an admitted code through the pipeline.
    async fn run(self: &Arc<Self>, mut code: Code, mut admission: Admission) -> Result<CodeResult, ControlError> {
        // A channel with an open M28 capture swallows everything but M29.
        if !code.is(CodeType::M, 29) {
            let mut slot = self.scheduler.capture_slot(code.channel).lock().await;
            if let Some(writer) = slot.as_mut() {
                let written = writer.write_code(&code).await;
                drop(slot);
                return written.map(|()| CodeResult::empty()).map_err(Into::into);
            }
        }

        let outcome = self.process(&mut code, &mut admission).await;
        // The start lock never outlives processing, whatever happened.
        admission.release_start();

        match outcome {
            Ok(()) => {
                admission.wait_for_finish().await;
                self.code_executed(&mut code).await;
                Ok(code.result.take().unwrap_or_default())
            }
            Err(ControlError::Cancelled) => {
                code.result = None;
                self.diagnostics.record_cancelled();
                admission.wait_for_finish().await;
                self.code_executed(&mut code).await;
                Err(ControlError::Cancelled)
            }
            Err(e) => {
                error!(code = %code.short_form(), error = %e, "code failed");
                // Completion ordering holds on the failure path too.
                admission.wait_for_finish().await;
                Err(e)
            }
        }
    }

    /// One pass over interception, internal handling and firmware
    /// dispatch. On success `code.result` is set (possibly empty).
    async fn process(self: &Arc<Self>, code: &mut Code, admission: &mut Admission) -> Result<(), ControlError> {
        // Job codes observe the pause state as of admission: the pause
        // codes themselves (M25 read from the file, say) must still reach
        // the firmware after their handler flips the flag.
        let was_paused =
            code.channel == CodeChannel::File && self.model.read().await.job.is_paused;

        if !code.flags.contains(CodeFlags::IS_INTERNALLY_PROCESSED)
            && self.process_internally(code).await?
        {
            return Ok(());
        }

        if code.code_type == CodeType::Comment {
            code.result = Some(CodeResult::empty());
            return Ok(());
        }

        if was_paused {
            return Err(ControlError::Cancelled);
        }

        self.diagnostics.record_forwarded();
        let unbuffered = code.flags.contains(CodeFlags::UNBUFFERED);
        let result = {
            let mut reply = self.firmware.process_code(code);
            // Poll once while the start lock is still held so the
            // transport receives codes in admission order.
            let early = std::future::poll_fn(|cx| Poll::Ready(reply.as_mut().poll(cx))).await;
            if !unbuffered {
                admission.release_start();
            }
            match early {
                Poll::Ready(result) => result?,
                Poll::Pending => tokio::select! {
                    () = admission.token().cancelled() => return Err(ControlError::Cancelled),
                    result = &mut reply => result?,
                },
            }
        };
        code.result = Some(result);
        Ok(())
    }

    /// Tries to settle the code without the firmware. Returns `true` when
    /// the code is resolved and `code.result` is set.
    async fn process_internally(self: &Arc<Self>, code: &mut Code) -> Result<bool, ControlError> {
        if let Some(keyword) = code.keyword {
            if keyword != Keyword::Echo {
                return Err(ControlError::Protocol(format!(
                    "keyword '{keyword}' must be consumed by the macro interpreter"
                )));
            }
        }

        if !code.flags.contains(CodeFlags::IS_PRE_PROCESSED)
            && self.intercept(InterceptionMode::Pre, code).await?
        {
            return Ok(true);
        }

        if code.keyword.is_none() && code.has_expressions() {
            self.flush(code).await?;
            let snapshot = self.model.snapshot().await;
            expressions::evaluate_code(code, &snapshot)?;
        }

        if code.keyword.is_none() {
            match handlers::try_handle(self, code).await {
                Ok(Some(result)) => {
                    code.result = Some(result);
                    code.flags |= CodeFlags::IS_INTERNALLY_PROCESSED;
                    self.diagnostics.record_internally_processed();
                    return Ok(true);
                }
                Ok(None) => {}
                Err(ControlError::NotSupported) => {
                    code.result = Some(CodeResult::error("Code is not supported"));
                    code.flags |= CodeFlags::IS_INTERNALLY_PROCESSED;
                    self.diagnostics.record_internally_processed();
                    return Ok(true);
                }
                Err(e) => return Err(e),
            }
        }

        if !code.flags.contains(CodeFlags::IS_POST_PROCESSED)
            && self.intercept(InterceptionMode::Post, code).await?
        {
            return Ok(true);
        }

        if code.keyword == Some(Keyword::Echo) {
            self.flush(code).await?;
            let snapshot = self.model.snapshot().await;
            let argument = code.keyword_argument.clone().unwrap_or_default();
            let text = expressions::evaluate(&argument, &snapshot)?;
            code.result = Some(CodeResult::success(text));
            code.flags |= CodeFlags::IS_INTERNALLY_PROCESSED;
            self.diagnostics.record_internally_processed();
            return Ok(true);
        }

        Ok(false)
    }

    /// Runs one interception stage; returns `true` on a resolve verdict.
    async fn intercept(&self, mode: InterceptionMode, code: &mut Code) -> Result<bool, ControlError> {
        let outcome = {
            let registry = self.interceptors.read().await;
            registry.intercept(mode, code).await
        };
        match mode {
            InterceptionMode::Pre => code.flags |= CodeFlags::IS_PRE_PROCESSED,
            InterceptionMode::Post => code.flags |= CodeFlags::IS_POST_PROCESSED,
            InterceptionMode::Executed => {}
        }
        match outcome {
            InterceptionOutcome::Resolved => Ok(true),
            InterceptionOutcome::Passed => Ok(false),
            InterceptionOutcome::Cancelled => Err(ControlError::Cancelled),
        }
    }

    /// Waits until the firmware has drained the code's channel.
    ///
    /// # Errors
    ///
    /// [`ControlError::Cancelled`] when the flush is denied or the channel
    /// is cancelled while waiting.
    pub(crate) async fn flush(&self, code: &Code) -> Result<(), ControlError> {
        let token = self.scheduler.channel_token(code.channel);
        let flushed = tokio::select! {
            () = token.cancelled() => false,
            flushed = self.firmware.flush_code(code) => flushed,
        };
        if flushed {
            Ok(())
        } else {
            Err(ControlError::Cancelled)
        }
    }

    /// Result finalization: post-execution hooks, error prefixes,
    /// compatibility cosmetics, logging, `Executed` interceptors.
    async fn code_executed(self: &Arc<Self>, code: &mut Code) {
        if !code.flags.contains(CodeFlags::RESOLVED_BY_INTERCEPTOR) {
            if let Err(e) = handlers::code_executed(self, code).await {
                warn!(code = %code.short_form(), error = %e, "post-execution hook failed");
            }
        }

        if code.result.is_some() {
            let compatibility = self.model.compatibility(code.channel).await;
            finalize_result(code, compatibility);
        }

        if code.channel != CodeChannel::File {
            if let Some(result) = &code.result {
                for message in result.messages() {
                    match message.kind {
                        MessageType::Error => {
                            error!(code = %code.short_form(), "{}", message.content);
                        }
                        MessageType::Warning => {
                            warn!(code = %code.short_form(), "{}", message.content);
                        }
                        MessageType::Success => {}
                    }
                    self.event_log.record(message).await;
                }
            }
        }

        {
            let registry = self.interceptors.read().await;
            registry.intercept(InterceptionMode::Executed, code).await;
        }
        self.diagnostics.record_executed(code.channel);
    }

    /// Executes a macro file through the pipeline, line by line.
    ///
    /// Every emitted code inherits the channel, carries the macro handle
    /// and serializes through the macro's own gate, so sibling macros make
    /// progress independently.
    ///
    /// # Errors
    ///
    /// The first parse or execution failure aborts the file.
    pub async fn run_macro(
        self: &Arc<Self>,
        physical: &Path,
        channel: CodeChannel,
        parent: Option<MacroId>,
    ) -> Result<CodeResult, ControlError> {
        let content = tokio::fs::read_to_string(physical).await?;
        let id = self.macros.create(physical.display().to_string(), channel, parent);
        debug!(file = %physical.display(), %channel, "macro started");

        let mut combined = CodeResult::empty();
        let mut position = 0u64;
        for (index, line) in content.lines().enumerate() {
            let mut code = match Code::parse_on(line, channel) {
                Ok(code) => code,
                Err(e) => {
                    self.macros.remove(id);
                    return Err(e.into());
                }
            };
            code.flags |= CodeFlags::IS_FROM_MACRO;
            code.macro_id = Some(id);
            code.line_number = Some(index as u64 + 1);
            code.file_position = Some(position);
            position += line.len() as u64 + 1;

            match self.execute(code).await {
                Ok(Some(result)) => {
                    for message in result {
                        combined.push(message);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.macros.remove(id);
                    return Err(e);
                }
            }
        }

        self.macros.remove(id);
        debug!(file = %physical.display(), "macro finished");
        Ok(combined)
    }

    /// Waits for the first full object-model sync, honoring channel
    /// cancellation.
    pub(crate) async fn wait_for_model_sync(&self, code: &Code) -> Result<(), ControlError> {
        let token = self.scheduler.channel_token(code.channel);
        tokio::select! {
            () = token.cancelled() => Err(ControlError::Cancelled),
            () = self.model.wait_for_sync() => Ok(()),
        }
    }
}

/// Applies error prefixes and compatibility cosmetics in place.
fn finalize_result(code: &mut Code, compatibility: Compatibility) {
    let short = code.short_form();
    let is_m105 = code.is(CodeType::M, 105);
    let Some(result) = code.result.as_mut() else {
        return;
    };

    let prefix = format!("{short}: ");
    for message in result.messages_mut() {
        if message.kind == MessageType::Error && !message.content.starts_with(&prefix) {
            message.content = format!("{prefix}{}", message.content);
        }
    }

    if compatibility.is_marlin_like() {
        if is_m105 {
            if result.is_empty() {
                result.push(Message::success("ok\n"));
            } else if let Some(first) = result.messages_mut().first_mut() {
                if !first.content.starts_with("ok") {
                    first.content = format!("ok {}", first.content);
                }
            }
        } else if result.is_empty() {
            result.push(Message::success("ok\n"));
        } else if let Some(last) = result.messages_mut().last_mut() {
            last.content.push_str("\nok\n");
        }
    } else if let Some(last) = result.messages_mut().last_mut() {
        last.content.push('\n');
    }
}
