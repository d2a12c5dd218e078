//! G/M/T-code value type and parser.
//!
//! This crate turns raw text into structured [`Code`] values and renders
//! them back. It knows nothing about scheduling or execution; the runtime
//! layers stamp [`CodeFlags`] and attach results as a code moves through
//! the pipeline.
//!
//! # Parsing
//!
//! ```
//! use gmux_code::{Code, CodeType};
//!
//! let code = Code::parse("G1 X10.5 Y-3 ; move").unwrap();
//! assert_eq!(code.code_type, CodeType::G);
//! assert_eq!(code.major, Some(1));
//! assert_eq!(code.parameter('X').unwrap().as_f32().unwrap(), 10.5);
//! assert_eq!(code.comment.as_deref(), Some(" move"));
//! ```
//!
//! # Rendering
//!
//! [`Code`] implements `Display`; the rendered form parses back to an equal
//! code modulo whitespace. The short form ([`Code::short_form`]) is used to
//! prefix error messages (`M997: …`).

mod code;
mod code_type;
mod error;
mod flags;
mod parameter;
mod parser;

pub use code::{Code, MacroId};
pub use code_type::{CodeType, Keyword};
pub use error::CodeParserError;
pub use flags::CodeFlags;
pub use parameter::{Parameter, UNNAMED_LETTER};
