#![allow(dead_code)]

//! Shared fixtures for the control integration tests.

use gmux_code::Code;
use gmux_control::testing::MockFirmware;
use gmux_control::{CodeExecutor, ControlError, FirmwareInterface, Settings};
use gmux_types::{CodeChannel, CodeResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A fully wired executor on top of a temporary virtual SD card.
pub struct Rig {
    pub executor: Arc<CodeExecutor>,
    pub firmware: Arc<MockFirmware>,
    pub sd: tempfile::TempDir,
}

impl Rig {
    pub fn new() -> Self {
        let sd = tempfile::tempdir().expect("temp dir");
        let settings = Settings {
            base_directory: sd.path().to_path_buf(),
            ..Settings::default()
        };
        let firmware = Arc::new(MockFirmware::new());
        let transport: Arc<dyn FirmwareInterface> = Arc::clone(&firmware) as _;
        Self {
            executor: CodeExecutor::new(transport, settings),
            firmware,
            sd,
        }
    }

    /// Parses and executes one code on a channel.
    pub async fn run(
        &self,
        text: &str,
        channel: CodeChannel,
    ) -> Result<Option<CodeResult>, ControlError> {
        let code = Code::parse_on(text, channel).expect("parse");
        self.executor.execute(code).await
    }

    /// Like [`Rig::run`] but unwraps a synchronous, successful result.
    pub async fn run_ok(&self, text: &str, channel: CodeChannel) -> CodeResult {
        self.run(text, channel)
            .await
            .expect("execution")
            .expect("synchronous result")
    }

    /// Path below the virtual SD card.
    pub fn sd_path(&self, relative: &str) -> PathBuf {
        self.sd.path().join(relative)
    }

    /// Creates a file below the virtual SD card, parents included.
    pub fn seed_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.sd_path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("seed file");
        path
    }

    /// Creates a directory below the virtual SD card.
    pub fn seed_dir(&self, relative: &str) -> PathBuf {
        let path = self.sd_path(relative);
        std::fs::create_dir_all(&path).expect("seed dir");
        path
    }
}

/// Waits until `predicate` holds, yielding to the runtime in between.
pub async fn wait_until(mut predicate: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !predicate() {
        assert!(
            std::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::task::yield_now().await;
    }
}

/// Rendered text of a result.
pub fn text(result: &CodeResult) -> String {
    result.to_string()
}

/// `true` if the file exists.
pub fn exists(path: &Path) -> bool {
    path.exists()
}
