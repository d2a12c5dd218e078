//! Code lifecycle flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bitset describing how a code is executed and how far it has come.
    ///
    /// The first four flags are set by the submitter and never cleared.
    /// The processed/resolved flags are stamped by the pipeline as the code
    /// passes the corresponding stage, and are likewise never cleared.
    ///
    /// | Flag | Meaning |
    /// |------|---------|
    /// | [`ASYNCHRONOUS`](Self::ASYNCHRONOUS) | Fire and forget; the caller gets no result |
    /// | [`IS_FROM_MACRO`](Self::IS_FROM_MACRO) | Emitted by an executing macro file |
    /// | [`IS_PRIORITIZED`](Self::IS_PRIORITIZED) | Admitted in the highest priority class |
    /// | [`UNBUFFERED`](Self::UNBUFFERED) | Pipelining forbidden; holds admission until the reply |
    /// | [`IS_PRE_PROCESSED`](Self::IS_PRE_PROCESSED) | Pre-interception already ran |
    /// | [`IS_POST_PROCESSED`](Self::IS_POST_PROCESSED) | Post-interception already ran |
    /// | [`IS_INTERNALLY_PROCESSED`](Self::IS_INTERNALLY_PROCESSED) | Resolved without firmware dispatch |
    /// | [`RESOLVED_BY_INTERCEPTOR`](Self::RESOLVED_BY_INTERCEPTOR) | An interceptor supplied the result |
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CodeFlags: u16 {
        /// Fire and forget; the caller receives no result.
        const ASYNCHRONOUS = 1 << 0;
        /// The code was emitted by an executing macro file.
        const IS_FROM_MACRO = 1 << 1;
        /// Admit in the `Prioritized` class.
        const IS_PRIORITIZED = 1 << 2;
        /// Hold the admission slot until the firmware has replied.
        const UNBUFFERED = 1 << 3;
        /// Pre-interception has run for this code.
        const IS_PRE_PROCESSED = 1 << 4;
        /// Post-interception has run for this code.
        const IS_POST_PROCESSED = 1 << 5;
        /// The code was resolved without invoking the firmware dispatcher.
        const IS_INTERNALLY_PROCESSED = 1 << 6;
        /// An interceptor short-circuited the pipeline with a result.
        const RESOLVED_BY_INTERCEPTOR = 1 << 7;
    }
}
