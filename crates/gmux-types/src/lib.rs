//! Shared types for the gmux code execution core.
//!
//! This crate is the bottom layer of the gmux workspace. It defines the
//! vocabulary every other crate speaks:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  gmux-control : scheduler, pipeline, handlers, firmware     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gmux-intercept : interception bus                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gmux-code : code value & parser                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gmux-types : channels, results, ids  ◄── HERE              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Contents
//!
//! - [`CodeChannel`] - the fixed set of input channels
//! - [`Compatibility`] - response-framing dialect per channel
//! - [`Message`], [`MessageType`], [`CodeResult`] - structured results
//! - [`SourceId`] - identity of a connected client
//! - [`ErrorCode`] - unified error code interface
//!
//! # Example
//!
//! ```
//! use gmux_types::{CodeChannel, CodeResult, Compatibility};
//!
//! let channel = CodeChannel::Usb;
//! assert_eq!(Compatibility::default_for(channel), Compatibility::Marlin);
//!
//! let result = CodeResult::success("ok");
//! assert!(result.is_successful());
//! ```

mod channel;
mod compatibility;
mod error;
mod message;
mod source;

pub use channel::CodeChannel;
pub use compatibility::Compatibility;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use message::{CodeResult, Message, MessageType};
pub use source::SourceId;
