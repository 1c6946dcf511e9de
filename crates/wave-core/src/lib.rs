//! Lexing, single-pass compilation and x86-64 code emission for Wave
//! source files.
//!
//! [`driver::compile`] is the crate's single public entry point; every
//! other module exists to support it and is exposed mainly so
//! `wave-object` and `wave-cli` can read the resulting byte buffers and
//! report data without duplicating layout knowledge.

pub mod buffer;
pub mod compile;
pub mod driver;
pub mod encode;
pub mod error;
pub mod label;
pub mod lexer;
pub mod telemetry;
pub mod vars;

pub use driver::{compile as compile_source, CompileOutput};
pub use error::{CompileWarning, StrictModeError};
