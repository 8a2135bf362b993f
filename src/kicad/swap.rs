//! End-to-end unit swap.
//!
//! [`UnitSwapper::plan`] resolves everything and builds the patched page
//! texts without touching the disk. [`SwapPlan::commit`] then writes them,
//! restoring already-written pages if a later write fails.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use super::library::SymbolLibrary;
use super::patch::{self, PageEdit};
use super::path::EnvSnapshot;
use super::schematic::{ComponentInstance, ComponentLinker};
use super::sheets::SheetWalker;
use super::units::UnitTable;
use super::{KicadError, KicadResult};

/// Suffix of the project symbol cache next to the root page.
pub const CACHE_LIBRARY_SUFFIX: &str = "-cache.lib";

/// Returns the cache library path KiCad uses for a root page:
/// `project.sch` -> `project-cache.lib` in the same directory.
#[must_use]
pub fn default_cache_library(root: &Path) -> PathBuf {
    let stem = root
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    root.with_file_name(format!("{stem}{CACHE_LIBRARY_SUFFIX}"))
}

/// The inputs of one swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    /// Root schematic page.
    pub root: PathBuf,
    /// Footprint reference (e.g. `U1`).
    pub reference: String,
    /// First pad designator.
    pub pad_a: String,
    /// Second pad designator.
    pub pad_b: String,
    /// Cache library; defaults to [`default_cache_library`] of the root.
    pub library: Option<PathBuf>,
}

impl SwapRequest {
    /// Creates a request using the default cache library.
    pub fn new(
        root: impl Into<PathBuf>,
        reference: impl Into<String>,
        pad_a: impl Into<String>,
        pad_b: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            reference: reference.into(),
            pad_a: pad_a.into(),
            pad_b: pad_b.into(),
            library: None,
        }
    }

    /// Uses an explicit cache library.
    #[must_use]
    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = Some(library.into());
        self
    }

    /// The cache library this request reads.
    #[must_use]
    pub fn library_path(&self) -> PathBuf {
        self.library
            .clone()
            .unwrap_or_else(|| default_cache_library(&self.root))
    }
}

/// A page and its text after the swap.
#[derive(Debug, Clone, Serialize)]
pub struct PagePatch {
    /// Page file path.
    pub path: PathBuf,
    /// Text as loaded.
    #[serde(skip)]
    pub original: String,
    /// Text with the unit tokens exchanged.
    #[serde(skip)]
    pub patched: String,
    /// Number of unit tokens rewritten on this page.
    pub edits: usize,
}

/// A fully resolved swap, ready to be written.
#[derive(Debug, Clone, Serialize)]
pub struct SwapPlan {
    /// Footprint reference.
    pub reference: String,
    /// Library symbol bound to the reference.
    pub symbol: String,
    /// First pad.
    pub pad_a: String,
    /// Unit owning `pad_a`.
    pub unit_a: u32,
    /// Second pad.
    pub pad_b: String,
    /// Unit owning `pad_b`.
    pub unit_b: u32,
    /// Instances rewritten, before the swap.
    pub instances: Vec<ComponentInstance>,
    /// Pages to write.
    pub pages: Vec<PagePatch>,
    /// Pad correspondence between the two units, for the board side.
    pub pad_map: Vec<(String, String)>,
}

impl SwapPlan {
    /// Returns true if the plan writes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.pages.is_empty()
    }

    /// Writes every patched page.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::EmptySiblingSuffix`] for sibling output without
    /// a suffix, [`KicadError::PageChanged`] if an in-place page changed on
    /// disk since planning, and [`KicadError::FileWrite`] for the first
    /// failed write. Files already written by this call are restored to
    /// their previous contents, or removed if they did not exist, first.
    pub fn commit(&self, options: &OutputOptions) -> KicadResult<Vec<PathBuf>> {
        options.mode.validate()?;
        if self.is_noop() {
            tracing::info!(reference = %self.reference, "Nothing to write");
            return Ok(Vec::new());
        }

        let mut pending = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let target = options.mode.target_for(&page.path);
            let previous = match options.mode {
                OutputMode::InPlace => {
                    let on_disk = std::fs::read_to_string(&page.path)
                        .map_err(|e| KicadError::file_read(&page.path, e))?;
                    if on_disk != page.original {
                        return Err(KicadError::PageChanged {
                            page: page.path.clone(),
                        });
                    }
                    Some(on_disk.into_bytes())
                }
                OutputMode::Sibling { .. } => existing_contents(&target)?,
            };
            pending.push(PendingWrite {
                page,
                target,
                previous,
            });
        }

        if options.backup && matches!(options.mode, OutputMode::InPlace) {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
            for page in &self.pages {
                let backup = append_to_file_name(&page.path, &format!(".{stamp}.bak"));
                std::fs::write(&backup, &page.original)
                    .map_err(|e| KicadError::file_write(&backup, e))?;
                tracing::info!(backup = %backup.display(), "Backed up page");
            }
        }

        let mut written: Vec<PendingWrite<'_>> = Vec::with_capacity(pending.len());
        for write in pending {
            if let Err(e) = std::fs::write(&write.target, &write.page.patched) {
                rollback(&written);
                return Err(KicadError::file_write(&write.target, e));
            }
            tracing::info!(
                page = %write.target.display(),
                edits = write.page.edits,
                "Wrote page"
            );
            written.push(write);
        }

        Ok(written.into_iter().map(|w| w.target).collect())
    }
}

/// A page about to be written and what its target held before.
struct PendingWrite<'a> {
    page: &'a PagePatch,
    target: PathBuf,
    previous: Option<Vec<u8>>,
}

fn existing_contents(target: &Path) -> KicadResult<Option<Vec<u8>>> {
    if !target.is_file() {
        return Ok(None);
    }
    std::fs::read(target)
        .map(Some)
        .map_err(|e| KicadError::file_read(target, e))
}

fn rollback(written: &[PendingWrite<'_>]) {
    for write in written {
        let result = match &write.previous {
            Some(contents) => std::fs::write(&write.target, contents),
            None => std::fs::remove_file(&write.target),
        };
        match result {
            Ok(()) => tracing::warn!(page = %write.target.display(), "Rolled back page"),
            Err(e) => tracing::error!(
                page = %write.target.display(),
                error = %e,
                "Failed to roll back page"
            ),
        }
    }
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Where patched pages are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Overwrite each page.
    #[default]
    InPlace,
    /// Write `<page><suffix>` next to each page, leaving it untouched.
    Sibling {
        /// Appended to the page's file name.
        suffix: String,
    },
}

impl OutputMode {
    /// Checks that the mode never targets the pages themselves by accident.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::EmptySiblingSuffix`] for a sibling mode with an
    /// empty suffix.
    pub fn validate(&self) -> KicadResult<()> {
        match self {
            Self::Sibling { suffix } if suffix.is_empty() => Err(KicadError::EmptySiblingSuffix),
            _ => Ok(()),
        }
    }

    /// The file a page's patched text goes to.
    #[must_use]
    pub fn target_for(&self, page: &Path) -> PathBuf {
        match self {
            Self::InPlace => page.to_path_buf(),
            Self::Sibling { suffix } => append_to_file_name(page, suffix),
        }
    }
}

/// Options for [`SwapPlan::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Target selection.
    pub mode: OutputMode,
    /// Keep a timestamped copy of each page before overwriting it.
    pub backup: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::InPlace,
            backup: true,
        }
    }
}

/// Resolves swap requests against a project on disk.
#[derive(Debug, Clone)]
pub struct UnitSwapper {
    walker: SheetWalker,
}

impl UnitSwapper {
    /// Creates a swapper expanding sheet paths from `env`.
    #[must_use]
    pub const fn new(env: EnvSnapshot) -> Self {
        Self {
            walker: SheetWalker::new(env),
        }
    }

    /// Sets the sheet hierarchy depth limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.walker = self.walker.with_max_depth(max_depth);
        self
    }

    /// Resolves a request into a plan. Nothing is written.
    ///
    /// # Errors
    ///
    /// Fails on the first unresolvable step: page discovery, library
    /// parsing, reference, symbol, pad or unit instance lookup, or patching.
    pub fn plan(&self, request: &SwapRequest) -> KicadResult<SwapPlan> {
        let pages = self.walker.discover(&request.root)?;
        tracing::info!(
            root = %request.root.display(),
            pages = pages.len(),
            "Discovered schematic pages"
        );

        let library = SymbolLibrary::open(request.library_path())?;
        let linker = ComponentLinker::new(&pages)?;

        let reference = request.reference.as_str();
        let candidates = linker.pages_containing(reference)?;
        let symbol_name = linker.symbol_name_for(reference, candidates[0])?;
        let symbol = library.get(symbol_name)?;
        let table = UnitTable::new(symbol);

        let unit_a = table.unit_of(&request.pad_a)?;
        let unit_b = table.unit_of(&request.pad_b)?;
        tracing::info!(
            reference,
            symbol = %symbol.name,
            pad_a = %request.pad_a,
            unit_a,
            pad_b = %request.pad_b,
            unit_b,
            "Resolved pad units"
        );

        let mut plan = SwapPlan {
            reference: reference.to_string(),
            symbol: symbol.name.clone(),
            pad_a: request.pad_a.clone(),
            unit_a,
            pad_b: request.pad_b.clone(),
            unit_b,
            instances: Vec::new(),
            pages: Vec::new(),
            pad_map: Vec::new(),
        };

        if unit_a == unit_b {
            tracing::warn!(
                reference,
                unit = unit_a,
                "Both pads belong to the same unit, schematic is unchanged"
            );
            return Ok(plan);
        }

        let instance_a = linker.instance_for_unit(reference, unit_a, &candidates)?;
        let instance_b = linker.instance_for_unit(reference, unit_b, &candidates)?;

        let mut edits: IndexMap<PathBuf, Vec<PageEdit>> = IndexMap::new();
        edits
            .entry(instance_a.page.clone())
            .or_default()
            .push(PageEdit::set_unit(&instance_a, unit_b));
        edits
            .entry(instance_b.page.clone())
            .or_default()
            .push(PageEdit::set_unit(&instance_b, unit_a));

        for (path, page_edits) in edits {
            let page = candidates
                .iter()
                .find(|p| p.path() == path)
                .ok_or_else(|| KicadError::ReferenceNotFound {
                    reference: reference.to_string(),
                })?;
            let patched = patch::apply_edits(&path, page.text(), &page_edits)?;
            plan.pages.push(PagePatch {
                path,
                original: page.text().to_string(),
                patched,
                edits: page_edits.len(),
            });
        }

        plan.pad_map = table.pad_map(unit_a, unit_b);
        plan.instances = vec![instance_a, instance_b];
        Ok(plan)
    }
}

/// Plans and commits a swap in one call.
///
/// # Errors
///
/// See [`UnitSwapper::plan`] and [`SwapPlan::commit`].
pub fn swap_units(
    swapper: &UnitSwapper,
    request: &SwapRequest,
    options: &OutputOptions,
) -> KicadResult<(SwapPlan, Vec<PathBuf>)> {
    let plan = swapper.plan(request)?;
    let written = plan.commit(options)?;
    Ok((plan, written))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_library_sits_next_to_root() {
        assert_eq!(
            default_cache_library(Path::new("/proj/board.sch")),
            PathBuf::from("/proj/board-cache.lib")
        );
    }

    #[test]
    fn request_library_override() {
        let req = SwapRequest::new("/proj/board.sch", "U1", "1", "4").with_library("/libs/x.lib");
        assert_eq!(req.library_path(), PathBuf::from("/libs/x.lib"));
    }

    #[test]
    fn sibling_target_appends_suffix() {
        let mode = OutputMode::Sibling {
            suffix: "_alt".to_string(),
        };
        assert_eq!(
            mode.target_for(Path::new("/proj/sub.sch")),
            PathBuf::from("/proj/sub.sch_alt")
        );
        assert_eq!(
            OutputMode::InPlace.target_for(Path::new("/proj/sub.sch")),
            PathBuf::from("/proj/sub.sch")
        );
    }

    #[test]
    fn empty_sibling_suffix_is_rejected() {
        let mode = OutputMode::Sibling {
            suffix: String::new(),
        };
        assert!(matches!(mode.validate(), Err(KicadError::EmptySiblingSuffix)));
        assert!(OutputMode::InPlace.validate().is_ok());
    }

    #[test]
    fn default_output_is_in_place_with_backup() {
        let options = OutputOptions::default();
        assert_eq!(options.mode, OutputMode::InPlace);
        assert!(options.backup);
    }
}
