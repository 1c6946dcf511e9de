//! Warning conditions the compiler surfaces without aborting the build.
//!
//! Every condition here is permissive by design (spec-mandated): unresolved
//! fixups keep a zero displacement, capacity overflow drops the write. The
//! compiler still reports both instead of failing silently.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Code,
    Data,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferKind::Code => "code",
            BufferKind::Data => "data",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// A fixup referenced a label that was never defined; left as a zero
    /// displacement.
    UnresolvedFixup { label: String },
    /// A buffer write was dropped because the buffer had reached capacity.
    CapacityExceeded { buffer: BufferKind, dropped: u64 },
    /// A table (variables, functions, labels/fixups, pools, loop frames)
    /// reached its maximum and further entries were ignored.
    TableFull { table: &'static str },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::UnresolvedFixup { label } => {
                write!(f, "unresolved fixup for label `{label}`; left as zero displacement")
            }
            CompileWarning::CapacityExceeded { buffer, dropped } => {
                write!(f, "{buffer} buffer exceeded capacity; {dropped} byte(s) dropped")
            }
            CompileWarning::TableFull { table } => {
                write!(f, "{table} table is full; further entries were ignored")
            }
        }
    }
}

/// Raised only when `--strict` turns an unresolved fixup into a hard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictModeError {
    pub warnings: Vec<CompileWarning>,
}

impl fmt::Display for StrictModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "compilation failed under --strict:")?;
        for w in &self.warnings {
            writeln!(f, "  - {w}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StrictModeError {}
