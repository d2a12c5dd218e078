//! Execution counters reported by `M122`.

use gmux_types::CodeChannel;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters, updated lock-free.
#[derive(Default)]
pub struct Diagnostics {
    executed: [AtomicU64; CodeChannel::COUNT],
    internally_processed: AtomicU64,
    forwarded: AtomicU64,
    cancelled: AtomicU64,
}

impl Diagnostics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_executed(&self, channel: CodeChannel) {
        self.executed[channel.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_internally_processed(&self) {
        self.internally_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Total codes finalized across all channels.
    #[must_use]
    pub fn total_executed(&self) -> u64 {
        self.executed.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Renders the diagnostics block appended to `M122` output.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Control daemon diagnostics ===");
        let _ = writeln!(out, "Version: {}", env!("CARGO_PKG_VERSION"));
        let _ = writeln!(
            out,
            "Codes executed: {} ({} internally processed, {} forwarded, {} cancelled)",
            self.total_executed(),
            self.internally_processed.load(Ordering::Relaxed),
            self.forwarded.load(Ordering::Relaxed),
            self.cancelled.load(Ordering::Relaxed),
        );
        for channel in CodeChannel::ALL {
            let count = self.executed[channel.index()].load(Ordering::Relaxed);
            if count > 0 {
                let _ = writeln!(out, "Channel {channel}: {count}");
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_only_active_channels() {
        let diag = Diagnostics::new();
        diag.record_executed(CodeChannel::Usb);
        diag.record_executed(CodeChannel::Usb);
        diag.record_executed(CodeChannel::Http);
        diag.record_internally_processed();
        diag.record_forwarded();

        let report = diag.report();
        assert!(report.contains("Codes executed: 3"));
        assert!(report.contains("Channel USB: 2"));
        assert!(report.contains("Channel HTTP: 1"));
        assert!(!report.contains("Telnet"));
        assert_eq!(diag.total_executed(), 3);
    }
}
