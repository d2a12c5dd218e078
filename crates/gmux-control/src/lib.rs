//! Code execution core of the control daemon.
//!
//! Clients (print queues, macros, interactive channels, plugins) submit
//! G/M/T-codes; this crate schedules them with per-channel ordering
//! guarantees, interprets a curated subset locally, forwards the rest to
//! the firmware and finalizes structured results.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          CodeExecutor                            │
//! │                                                                  │
//! │  Scheduler ──► interception (pre) ──► internal handlers          │
//! │      │              │                      │                     │
//! │      │              │ resolve/cancel       │ unresolved          │
//! │      │              ▼                      ▼                     │
//! │      │         finalization ◄── interception (post) ◄─┐          │
//! │      │              │                                 │          │
//! │      │              ▼                      FirmwareInterface     │
//! │      └──► interception (executed)                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Crate structure
//!
//! - [`Scheduler`], [`CodeClass`], [`Admission`] - per-channel ordering
//! - [`CodeExecutor`] - the pipeline
//! - [`FirmwareInterface`] - transport abstraction
//! - [`MachineModel`], [`ObjectModel`] - lock-guarded object model store
//! - [`MacroArena`] - nested macro execution contexts
//! - [`Settings`], [`FilePath`] - configuration and path mapping
//! - [`EventLog`], [`Diagnostics`], [`HeightMap`] - `M929`, `M122`,
//!   `G29`/`M374`/`M375` support
//! - [`testing`] - mock firmware for dependent crates' tests
//!
//! # Example
//!
//! ```
//! use gmux_code::Code;
//! use gmux_control::{testing::MockFirmware, CodeExecutor, Settings};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let firmware = Arc::new(MockFirmware::new());
//! let executor = CodeExecutor::new(firmware, Settings::default());
//!
//! let code = Code::parse("M27").unwrap();
//! let result = executor.execute(code).await.unwrap().unwrap();
//! assert!(result.is_successful());
//! # }
//! ```

mod capture;
mod diagnostics;
mod error;
mod event_log;
pub mod expressions;
mod firmware;
mod handlers;
mod heightmap;
mod macros;
mod model;
mod paths;
mod pipeline;
mod sched;
mod settings;
pub mod testing;

pub use capture::CaptureWriter;
pub use diagnostics::Diagnostics;
pub use error::ControlError;
pub use event_log::{EventLog, EventLogLevel};
pub use firmware::FirmwareInterface;
pub use heightmap::HeightMap;
pub use macros::{MacroArena, MacroState};
pub use model::{
    Directories, InputState, JobState, MachineModel, MachineState, MachineStatus, MessageBox,
    Network, ObjectModel, PrintFile, Tool,
};
pub use paths::{FilePath, KnownDirectory};
pub use pipeline::CodeExecutor;
pub use sched::{Admission, CodeClass, FifoGuard, FifoLock, LockPair, PendingGuard, Scheduler};
pub use settings::Settings;
