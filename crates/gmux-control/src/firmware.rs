//! Firmware transport abstraction.

use crate::heightmap::HeightMap;
use crate::ControlError;
use async_trait::async_trait;
use gmux_code::Code;
use gmux_types::{CodeChannel, CodeResult};

/// The transport to the firmware controller.
///
/// The real implementation talks SPI/serial and serializes requests through
/// its own mailbox; the core only relies on the contract below. All calls
/// are suspension points.
#[async_trait]
pub trait FirmwareInterface: Send + Sync {
    /// Forwards a code and resolves once the firmware has produced its
    /// reply.
    ///
    /// # Errors
    ///
    /// [`ControlError::Transport`] when the transport fails,
    /// [`ControlError::Cancelled`] when the firmware drops the code.
    async fn process_code(&self, code: &Code) -> Result<CodeResult, ControlError>;

    /// Waits until the transport has drained outstanding work for the
    /// channel. Returns `false` if the flush was aborted; callers treat
    /// that as cancellation.
    async fn flush_channel(&self, channel: CodeChannel) -> bool;

    /// Flushes the channel a code runs on.
    async fn flush_code(&self, code: &Code) -> bool {
        self.flush_channel(code.channel).await
    }

    /// Requests an immediate emergency stop (`M112`), bypassing all
    /// queues.
    ///
    /// # Errors
    ///
    /// [`ControlError::Transport`] when the transport fails.
    async fn emergency_stop(&self) -> Result<(), ControlError>;

    /// Requests a controller reset (`M999`), bypassing all queues.
    ///
    /// # Errors
    ///
    /// [`ControlError::Transport`] when the transport fails.
    async fn reset(&self) -> Result<(), ControlError>;

    /// Streams the IAP binary and the firmware image to the controller
    /// (`M997`).
    ///
    /// # Errors
    ///
    /// [`ControlError::Transport`] when the update handshake fails.
    async fn update_firmware(&self, iap: Vec<u8>, firmware: Vec<u8>) -> Result<(), ControlError>;

    /// Reads the current height map from the firmware.
    ///
    /// # Errors
    ///
    /// [`ControlError::Transport`] when the transport fails.
    async fn get_height_map(&self) -> Result<HeightMap, ControlError>;

    /// Installs a height map in the firmware.
    ///
    /// # Errors
    ///
    /// [`ControlError::Transport`] when the transport fails.
    async fn set_height_map(&self, map: HeightMap) -> Result<(), ControlError>;
}
