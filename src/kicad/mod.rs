//! KiCad legacy project handling for unit swaps.
//!
//! This module reads KiCad 4/5 legacy projects and rewrites the unit of
//! component instances in place:
//!
//! - `.sch`: schematic pages, linked into a hierarchy by `$Sheet` blocks
//! - `-cache.lib`: the project symbol cache with every placed symbol
//!
//! # Architecture
//!
//! ```text
//! root.sch ──▶ sheets ──▶ pages ──▶ schematic (ComponentLinker)
//!                │                        │
//!              path                       ▼
//!                           library ──▶ units ──▶ swap ──▶ patch
//! ```
//!
//! Files are never re-serialised: edits replace the byte span of a single
//! token and leave every other byte as it was read.

pub mod error;
pub mod lexer;
pub mod library;
pub mod patch;
pub mod path;
pub mod schematic;
pub mod sheets;
pub mod swap;
pub mod units;

pub use error::{KicadError, KicadResult};
pub use library::{Pin, SymbolDefinition, SymbolLibrary};
pub use patch::{apply_edits, PageEdit};
pub use path::{resolve_sheet_path, EnvSnapshot};
pub use schematic::{ComponentInstance, ComponentLinker, ComponentRecord, Page};
pub use sheets::{SheetReference, SheetWalker};
pub use swap::{OutputMode, OutputOptions, SwapPlan, SwapRequest, UnitSwapper};
pub use units::UnitTable;
