//! Object model store.
//!
//! A reduced object model of the machine, held behind a read-write lock.
//! Readers share, writers are exclusive; handlers keep their lock scopes as
//! narrow as possible. Serialization uses camelCase keys so that `{…}`
//! expressions address fields the same way the wire model does
//! (`job.file.size`, `network.hostname`).
//!
//! The store also carries the full-sync gate: codes that need the complete
//! model (`M701`-`M703`) await [`MachineModel::wait_for_sync`], which opens
//! once the firmware connector has pushed its first full update via
//! [`MachineModel::signal_update`].

use chrono::NaiveDateTime;
use gmux_types::{CodeChannel, Compatibility};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Overall machine status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MachineStatus {
    /// Nothing to do.
    #[default]
    Idle,
    /// Executing a job file.
    Processing,
    /// Job paused.
    Paused,
    /// Simulating a job file.
    Simulating,
    /// Emergency stop.
    Halted,
    /// Firmware update in progress.
    Updating,
}

/// Virtual directory table. All entries are virtual paths under `0:/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Directories {
    /// Job files.
    pub gcodes: String,
    /// System files (config, heightmap, event log).
    pub system: String,
    /// Macro files.
    pub macros: String,
    /// Filament presets.
    pub filaments: String,
    /// Web assets.
    pub web: String,
    /// Scanner output.
    pub scans: String,
    /// Firmware and IAP binaries.
    pub firmware: String,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            gcodes: "0:/gcodes".into(),
            system: "0:/sys".into(),
            macros: "0:/macros".into(),
            filaments: "0:/filaments".into(),
            web: "0:/www".into(),
            scans: "0:/scans".into(),
            firmware: "0:/firmware".into(),
        }
    }
}

/// Message box shown on behalf of the firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBox {
    /// Message box mode (0-3).
    pub mode: i32,
    /// Body text.
    pub message: String,
    /// Title.
    pub title: String,
}

/// Global machine state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineState {
    /// Current status.
    pub status: MachineStatus,
    /// Selected tool, -1 if none.
    pub current_tool: i32,
    /// Machine date and time, if set.
    pub date_time: Option<NaiveDateTime>,
    /// Active event log file (virtual path), if logging is enabled.
    pub log_file: Option<String>,
    /// Active message box, if any.
    pub message_box: Option<MessageBox>,
}

/// The file selected for printing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintFile {
    /// Physical path of the file.
    pub file_name: String,
    /// Virtual path as selected.
    pub virtual_name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Job state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    /// Selected file, if any.
    pub file: Option<PrintFile>,
    /// Whether the job is paused.
    pub is_paused: bool,
    /// Whether the job is being simulated rather than printed.
    pub is_simulating: bool,
    /// Byte position in the job file.
    pub file_position: Option<u64>,
    /// Name of the last selected file.
    pub last_file_name: Option<String>,
}

/// Per-channel input state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    /// The channel this entry describes.
    pub channel: CodeChannel,
    /// Response framing dialect.
    pub compatibility: Compatibility,
    /// Whether extrusion amounts are relative (`M83`) or absolute (`M82`).
    pub drives_relative: bool,
}

impl InputState {
    fn new(channel: CodeChannel) -> Self {
        Self {
            channel,
            compatibility: Compatibility::default_for(channel),
            drives_relative: false,
        }
    }
}

/// Network state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    /// Machine hostname (`M550`).
    pub hostname: String,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            hostname: "gmux".into(),
        }
    }
}

/// A configured tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Tool number.
    pub number: i32,
    /// Loaded filament, if any.
    pub filament: Option<String>,
}

/// The object model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectModel {
    /// Global machine state.
    pub state: MachineState,
    /// Job state.
    pub job: JobState,
    /// Per-channel input state, indexed by [`CodeChannel::index`].
    pub inputs: Vec<InputState>,
    /// Network state.
    pub network: Network,
    /// Virtual directory table.
    pub directories: Directories,
    /// Configured tools.
    pub tools: Vec<Tool>,
}

impl ObjectModel {
    /// Creates a model with one input entry per channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: MachineState {
                current_tool: -1,
                ..MachineState::default()
            },
            inputs: CodeChannel::ALL.iter().map(|&ch| InputState::new(ch)).collect(),
            ..Self::default()
        }
    }

    /// Input state of a channel.
    #[must_use]
    pub fn input(&self, channel: CodeChannel) -> &InputState {
        &self.inputs[channel.index()]
    }

    /// Mutable input state of a channel.
    pub fn input_mut(&mut self, channel: CodeChannel) -> &mut InputState {
        &mut self.inputs[channel.index()]
    }

    /// The currently selected tool, if any.
    #[must_use]
    pub fn current_tool(&self) -> Option<&Tool> {
        self.tools.iter().find(|t| t.number == self.state.current_tool)
    }

    /// Mutable access to the currently selected tool.
    pub fn current_tool_mut(&mut self) -> Option<&mut Tool> {
        let number = self.state.current_tool;
        self.tools.iter_mut().find(|t| t.number == number)
    }
}

/// Shared, lock-guarded object model store.
pub struct MachineModel {
    model: RwLock<ObjectModel>,
    update: Notify,
    synced: AtomicBool,
}

impl Default for MachineModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineModel {
    /// Creates a store with a fresh model.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: RwLock::new(ObjectModel::new()),
            update: Notify::new(),
            synced: AtomicBool::new(false),
        }
    }

    /// Shared read access.
    pub async fn read(&self) -> RwLockReadGuard<'_, ObjectModel> {
        self.model.read().await
    }

    /// Exclusive write access.
    pub async fn write(&self) -> RwLockWriteGuard<'_, ObjectModel> {
        self.model.write().await
    }

    /// Marks the model as fully synchronized and wakes all waiters.
    ///
    /// Called by the firmware connector after each pushed model update.
    pub fn signal_update(&self) {
        self.synced.store(true, Ordering::Release);
        self.update.notify_waiters();
    }

    /// Waits until the model has been fully synchronized at least once.
    pub async fn wait_for_sync(&self) {
        if self.synced.load(Ordering::Acquire) {
            return;
        }
        let notified = self.update.notified();
        if self.synced.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// JSON snapshot for expression evaluation.
    pub async fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&*self.model.read().await).unwrap_or(serde_json::Value::Null)
    }

    /// Compatibility of a channel.
    pub async fn compatibility(&self, channel: CodeChannel) -> Compatibility {
        self.model.read().await.input(channel).compatibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_has_an_input_per_channel() {
        let model = ObjectModel::new();
        assert_eq!(model.inputs.len(), CodeChannel::COUNT);
        assert_eq!(
            model.input(CodeChannel::Usb).compatibility,
            Compatibility::Marlin
        );
        assert_eq!(
            model.input(CodeChannel::Http).compatibility,
            Compatibility::RepRapFirmware
        );
    }

    #[test]
    fn current_tool_lookup() {
        let mut model = ObjectModel::new();
        assert!(model.current_tool().is_none());

        model.tools.push(Tool {
            number: 0,
            filament: None,
        });
        model.state.current_tool = 0;
        assert!(model.current_tool().is_some());

        model.current_tool_mut().unwrap().filament = Some("PLA".into());
        assert_eq!(model.current_tool().unwrap().filament.as_deref(), Some("PLA"));
    }

    #[test]
    fn snapshot_uses_camel_case() {
        let model = ObjectModel::new();
        let value = serde_json::to_value(&model).unwrap();
        assert!(value["state"]["currentTool"].is_i64());
        assert!(value["network"]["hostname"].is_string());
        assert!(value["directories"]["gcodes"].is_string());
    }

    #[tokio::test]
    async fn sync_gate_opens_once() {
        let model = MachineModel::new();

        // Signal first, wait later: must not block.
        model.signal_update();
        model.wait_for_sync().await;

        // And stays open.
        model.wait_for_sync().await;
    }

    #[tokio::test]
    async fn sync_gate_blocks_until_signal() {
        use std::sync::Arc;
        let model = Arc::new(MachineModel::new());

        let waiter = tokio::spawn({
            let model = Arc::clone(&model);
            async move { model.wait_for_sync().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        model.signal_update();
        waiter.await.unwrap();
    }
}
