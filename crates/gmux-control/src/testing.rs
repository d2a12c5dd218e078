//! Test doubles for the control layer.
//!
//! [`MockFirmware`] stands in for the SPI/serial transport. By default it
//! answers every code immediately with an empty (or scripted) result;
//! replies for selected codes can be held back and released later, which
//! lets tests pin down pipelining and ordering behavior.

use crate::heightmap::HeightMap;
use crate::{ControlError, FirmwareInterface};
use async_trait::async_trait;
use gmux_code::Code;
use gmux_types::{CodeChannel, CodeResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    sent: Vec<String>,
    scripted: HashMap<String, CodeResult>,
    transport_failures: HashMap<String, String>,
    held: HashSet<String>,
}

/// Recording firmware stub.
#[derive(Default)]
pub struct MockFirmware {
    state: Mutex<State>,
    notify: Notify,
    flush_ok: AtomicBool,
    emergency_stops: AtomicUsize,
    resets: AtomicUsize,
    updates: Mutex<Vec<(usize, usize)>>,
    height_map: Mutex<HeightMap>,
    flushes: AtomicUsize,
}

impl MockFirmware {
    /// Creates a firmware stub that replies immediately and accepts
    /// flushes.
    #[must_use]
    pub fn new() -> Self {
        let fw = Self::default();
        fw.flush_ok.store(true, Ordering::SeqCst);
        fw
    }

    /// Text forms of the codes received, in dispatch order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Scripts the reply for a short form (e.g. `"M105"`).
    pub fn script(&self, short_form: &str, result: CodeResult) {
        self.state
            .lock()
            .scripted
            .insert(short_form.to_string(), result);
    }

    /// Makes dispatch of a short form fail with a transport error.
    pub fn script_transport_failure(&self, short_form: &str, reason: &str) {
        self.state
            .lock()
            .transport_failures
            .insert(short_form.to_string(), reason.to_string());
    }

    /// Holds back replies to the given short form until [`Self::release`].
    /// The codes are still received (and recorded) immediately.
    pub fn hold(&self, short_form: &str) {
        self.state.lock().held.insert(short_form.to_string());
    }

    /// Releases all held replies of a short form.
    pub fn release(&self, short_form: &str) {
        self.state.lock().held.remove(short_form);
        self.notify.notify_waiters();
    }

    /// Makes `flush` succeed or fail from now on.
    pub fn set_flush_ok(&self, ok: bool) {
        self.flush_ok.store(ok, Ordering::SeqCst);
    }

    /// Number of flush requests seen.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of emergency stops requested.
    #[must_use]
    pub fn emergency_stops(&self) -> usize {
        self.emergency_stops.load(Ordering::SeqCst)
    }

    /// Number of resets requested.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Sizes of the (IAP, firmware) payloads streamed via `M997`.
    #[must_use]
    pub fn updates(&self) -> Vec<(usize, usize)> {
        self.updates.lock().clone()
    }

    /// Installs the height map returned by `get_height_map`.
    pub fn set_stored_height_map(&self, map: HeightMap) {
        *self.height_map.lock() = map;
    }

    /// The height map last pushed with `set_height_map`.
    #[must_use]
    pub fn stored_height_map(&self) -> HeightMap {
        self.height_map.lock().clone()
    }
}

#[async_trait]
impl FirmwareInterface for MockFirmware {
    async fn process_code(&self, code: &Code) -> Result<CodeResult, ControlError> {
        let short = code.short_form();
        {
            let mut state = self.state.lock();
            if let Some(reason) = state.transport_failures.get(&short) {
                return Err(ControlError::Transport(reason.clone()));
            }
            state.sent.push(code.to_string());
        }

        loop {
            let notified = self.notify.notified();
            if !self.state.lock().held.contains(&short) {
                break;
            }
            notified.await;
        }

        let result = self
            .state
            .lock()
            .scripted
            .get(&short)
            .cloned()
            .unwrap_or_else(CodeResult::empty);
        Ok(result)
    }

    async fn flush_channel(&self, _channel: CodeChannel) -> bool {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.flush_ok.load(Ordering::SeqCst)
    }

    async fn emergency_stop(&self) -> Result<(), ControlError> {
        self.emergency_stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> Result<(), ControlError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_firmware(&self, iap: Vec<u8>, firmware: Vec<u8>) -> Result<(), ControlError> {
        self.updates.lock().push((iap.len(), firmware.len()));
        Ok(())
    }

    async fn get_height_map(&self) -> Result<HeightMap, ControlError> {
        Ok(self.height_map.lock().clone())
    }

    async fn set_height_map(&self, map: HeightMap) -> Result<(), ControlError> {
        *self.height_map.lock() = map;
        Ok(())
    }
}
