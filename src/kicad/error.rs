//! Error types for KiCad project operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for KiCad operations.
pub type KicadResult<T> = Result<T, KicadError>;

/// Errors that can occur while resolving or patching a unit swap.
///
/// Every variant is fatal for the current swap request.
#[derive(Debug, Error)]
pub enum KicadError {
    /// Failed to open or read a file.
    #[error("Failed to read file: {path}")]
    FileRead {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file: {path}")]
    FileWrite {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A `${VAR}` token in a sheet path names an unset variable.
    #[error("Unresolved variable '{variable}' in sheet path '{raw_path}'")]
    UnresolvedVariable {
        /// Variable name inside the token.
        variable: String,
        /// Sheet path as written in the page.
        raw_path: String,
    },

    /// A `$Sheet` block has no file name field or is never closed.
    #[error("Malformed sheet block in {page} at line {line}: {message}")]
    MalformedSheetBlock {
        /// Page containing the block.
        page: PathBuf,
        /// 1-based line of the `$Sheet` delimiter.
        line: usize,
        /// Description of what's wrong.
        message: String,
    },

    /// The sheet hierarchy is deeper than the configured limit.
    #[error("Sheet hierarchy deeper than {max_depth} levels at {page}")]
    SheetDepthExceeded {
        /// Page that would have exceeded the limit.
        page: PathBuf,
        /// Configured limit.
        max_depth: usize,
    },

    /// Symbol is not defined in the cache library.
    #[error("Symbol not found in library: {name}")]
    SymbolNotFound {
        /// Requested symbol name.
        name: String,
    },

    /// A pin record has too few fields or an unreadable unit index.
    #[error("Malformed pin line {line}: {message}")]
    MalformedPinLine {
        /// 1-based line in the library file.
        line: usize,
        /// Description of what's wrong.
        message: String,
    },

    /// No pin of the symbol carries the pad designator.
    #[error("Pad '{pad}' not found on symbol {symbol}")]
    PadNotFound {
        /// Symbol name.
        symbol: String,
        /// Requested pad designator.
        pad: String,
    },

    /// The pad belongs to every unit (unit 0) and cannot select one.
    #[error("Pad '{pad}' of symbol {symbol} is shared by all units")]
    SharedPad {
        /// Symbol name.
        symbol: String,
        /// Requested pad designator.
        pad: String,
    },

    /// No page instantiates the reference.
    #[error("Reference {reference} not found on any schematic page")]
    ReferenceNotFound {
        /// Footprint reference.
        reference: String,
    },

    /// A `$Comp` block lacks a required line or is never closed.
    #[error("Malformed component block in {page} at line {line}: {message}")]
    MalformedComponentBlock {
        /// Page containing the block.
        page: PathBuf,
        /// 1-based line of the `$Comp` delimiter.
        line: usize,
        /// Description of what's wrong.
        message: String,
    },

    /// No instance of the reference declares the unit.
    #[error("No instance of {reference} declares unit {unit}")]
    UnitInstanceNotFound {
        /// Footprint reference.
        reference: String,
        /// Requested unit index.
        unit: u32,
    },

    /// More than one instance of the reference declares the unit.
    #[error("{count} instances of {reference} declare unit {unit}")]
    AmbiguousInstance {
        /// Footprint reference.
        reference: String,
        /// Requested unit index.
        unit: u32,
        /// Number of matching instances.
        count: usize,
    },

    /// Two edits on the same page overlap.
    #[error("Overlapping edits at offsets {first} and {second} in {page}")]
    SamePageConflict {
        /// Page being patched.
        page: PathBuf,
        /// Offset of the first edit.
        first: usize,
        /// Offset of the overlapping edit.
        second: usize,
    },

    /// An edit span no longer matches the page text.
    #[error("Stale edit span at offset {offset}: {message}")]
    StaleSpan {
        /// Byte offset of the span.
        offset: usize,
        /// Description of what's wrong.
        message: String,
    },

    /// A page to be overwritten changed on disk after the swap was planned.
    #[error("Page {page} changed on disk since the swap was planned")]
    PageChanged {
        /// Page path.
        page: PathBuf,
    },

    /// Sibling output was requested with an empty suffix, which would
    /// overwrite the pages themselves.
    #[error("Sibling output needs a non-empty file name suffix")]
    EmptySiblingSuffix,
}

impl KicadError {
    /// Creates a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed sheet block error.
    pub fn malformed_sheet(page: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::MalformedSheetBlock {
            page: page.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates a malformed component block error.
    pub fn malformed_component(
        page: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedComponentBlock {
            page: page.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates a malformed pin line error.
    pub fn malformed_pin(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedPinLine {
            line,
            message: message.into(),
        }
    }

    /// Creates a stale span error.
    pub fn stale_span(offset: usize, message: impl Into<String>) -> Self {
        Self::StaleSpan {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = KicadError::SymbolNotFound {
            name: "74HC00".to_string(),
        };
        assert_eq!(err.to_string(), "Symbol not found in library: 74HC00");
    }

    #[test]
    fn malformed_sheet_display_has_context() {
        let err = KicadError::malformed_sheet("/proj/root.sch", 42, "missing F1 field");
        let msg = err.to_string();
        assert!(msg.contains("root.sch"));
        assert!(msg.contains("line 42"));
        assert!(msg.contains("missing F1"));
    }
}
