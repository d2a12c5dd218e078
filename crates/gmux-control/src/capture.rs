//! File capture for `M28`/`M29`.
//!
//! While a channel has a capture writer open, every code submitted on that
//! channel (except `M29`) is appended to the file in text form instead of
//! being executed. The slot lives on the scheduler, one per channel,
//! guarded by an async mutex.

use gmux_code::Code;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// An open capture target.
pub struct CaptureWriter {
    writer: BufWriter<File>,
    virtual_name: String,
    physical: PathBuf,
    lines: u64,
}

impl CaptureWriter {
    /// Creates (or truncates) the capture file.
    pub async fn create(physical: PathBuf, virtual_name: String) -> std::io::Result<Self> {
        if let Some(parent) = physical.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(&physical).await?;
        Ok(Self {
            writer: BufWriter::new(file),
            virtual_name,
            physical,
            lines: 0,
        })
    }

    /// Appends the text form of a code as one line.
    pub async fn write_code(&mut self, code: &Code) -> std::io::Result<()> {
        self.writer.write_all(code.to_string().as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.lines += 1;
        Ok(())
    }

    /// Virtual path the capture was opened with.
    #[must_use]
    pub fn virtual_name(&self) -> &str {
        &self.virtual_name
    }

    /// Physical path of the capture file.
    #[must_use]
    pub fn physical_path(&self) -> &Path {
        &self.physical
    }

    /// Flushes and closes the file. Returns the virtual path and the
    /// number of captured lines.
    pub async fn finish(mut self) -> std::io::Result<(String, u64)> {
        self.writer.flush().await?;
        self.writer.into_inner().sync_all().await?;
        Ok((self.virtual_name, self.lines))
    }
}
