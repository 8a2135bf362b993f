//! kicad-unit-swap: exchange the units of a multi-unit symbol in a KiCad
//! legacy hierarchical schematic.
//!
//! Given a footprint reference and two of its pads, the library finds the
//! unit each pad belongs to, locates the schematic page instance of each
//! unit, and rewrites the two unit designators so the instances trade
//! places. Only the unit tokens change; every other byte of every page is
//! preserved.
//!
//! # Example
//!
//! ```no_run
//! use kicad_unit_swap::kicad::{EnvSnapshot, OutputOptions, SwapRequest, UnitSwapper};
//!
//! let swapper = UnitSwapper::new(EnvSnapshot::from_process());
//! let request = SwapRequest::new("project.sch", "U1", "1", "4");
//! let plan = swapper.plan(&request)?;
//! plan.commit(&OutputOptions::default())?;
//! # Ok::<(), kicad_unit_swap::kicad::KicadError>(())
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Configuration errors and the crate-level [`error::Error`]
//! - [`kicad`]: Legacy page and library parsing, unit lookup, patching

pub mod config;
pub mod error;
pub mod kicad;
