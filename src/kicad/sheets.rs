//! Hierarchical sheet discovery.
//!
//! A legacy page declares each child sheet in a block:
//!
//! ```text
//! $Sheet
//! S 5300 2500 1200 800
//! U 5B8E2E5F
//! F0 "Power" 50
//! F1 "power.sch" 50
//! $EndSheet
//! ```
//!
//! `F1` holds the child page's file name. The walker follows these edges
//! from the root page with an explicit queue and a visited set, so circular
//! references terminate and every page is loaded exactly once.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::lexer::{self, RawLine};
use super::path::{self, EnvSnapshot};
use super::schematic::Page;
use super::{KicadError, KicadResult};

const SHEET_START: &str = "$Sheet";
const SHEET_END: &str = "$EndSheet";
const SHEET_FILE_FIELD: &str = "F1";

/// A child sheet declared by a page, before path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReference {
    /// Page that declares the sheet.
    pub page: PathBuf,
    /// 1-based line of the `$Sheet` delimiter.
    pub line: usize,
    /// File name as written in the `F1` field.
    pub raw_path: String,
}

/// Extracts every sheet block of a page.
///
/// # Errors
///
/// Returns [`KicadError::MalformedSheetBlock`] if a block has no `F1` field
/// or is not closed before the next block or the end of the file.
pub fn extract_sheet_references(page: &Path, text: &str) -> KicadResult<Vec<SheetReference>> {
    let mut refs = Vec::new();
    let mut open: Option<(usize, Option<String>)> = None;

    for line in lexer::lines(text) {
        match classify(&line) {
            SheetLine::Start => {
                if let Some((start, _)) = open {
                    return Err(KicadError::malformed_sheet(
                        page,
                        start,
                        "sheet block not closed before next $Sheet",
                    ));
                }
                open = Some((line.number, None));
            }
            SheetLine::End => {
                let Some((start, file)) = open.take() else {
                    continue;
                };
                let raw_path = file.ok_or_else(|| {
                    KicadError::malformed_sheet(page, start, "missing F1 file name field")
                })?;
                refs.push(SheetReference {
                    page: page.to_path_buf(),
                    line: start,
                    raw_path,
                });
            }
            SheetLine::FileField => {
                if let Some((_, file)) = open.as_mut() {
                    *file = lexer::field_value(line.text);
                }
            }
            SheetLine::Other => {}
        }
    }

    if let Some((start, _)) = open {
        return Err(KicadError::malformed_sheet(
            page,
            start,
            "sheet block not closed before end of file",
        ));
    }

    Ok(refs)
}

enum SheetLine {
    Start,
    End,
    FileField,
    Other,
}

fn classify(line: &RawLine<'_>) -> SheetLine {
    if line.is_tagged(SHEET_START) {
        SheetLine::Start
    } else if line.is_tagged(SHEET_END) {
        SheetLine::End
    } else if line.is_tagged(SHEET_FILE_FIELD) {
        SheetLine::FileField
    } else {
        SheetLine::Other
    }
}

/// Walks a sheet hierarchy from its root page.
#[derive(Debug, Clone)]
pub struct SheetWalker {
    env: EnvSnapshot,
    max_depth: usize,
}

impl SheetWalker {
    /// Default limit on hierarchy depth.
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    /// Creates a walker that expands variables from `env`.
    #[must_use]
    pub const fn new(env: EnvSnapshot) -> Self {
        Self {
            env,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the maximum number of sheet levels below the root.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Loads the root page and every page reachable from it.
    ///
    /// Pages are returned once each, in depth-first declaration order with
    /// the root first. Page identity is the normalised absolute path.
    ///
    /// Pages are loaded breadth-first, so the depth limit applies to the
    /// shortest sheet chain reaching each page.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable page, malformed sheet block, unset
    /// path variable, or page more than the configured number of levels
    /// below the root.
    pub fn discover(&self, root: &Path) -> KicadResult<Vec<Page>> {
        let root = absolute(root)?;
        let mut loaded: IndexMap<PathBuf, (Page, Vec<PathBuf>)> = IndexMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::from([root.clone()]);
        let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::from([(root.clone(), 0)]);

        while let Some((page_path, depth)) = queue.pop_front() {
            let page = Page::load(&page_path)?;
            let dir = page_path.parent().unwrap_or_else(|| Path::new("/"));
            let children = extract_sheet_references(&page_path, page.text())?;
            tracing::debug!(
                page = %page_path.display(),
                depth,
                children = children.len(),
                "Loaded schematic page"
            );

            let mut resolved = Vec::with_capacity(children.len());
            for child in &children {
                let child_path = path::resolve_sheet_path(&child.raw_path, dir, &self.env)?;
                if child_path == page_path {
                    continue;
                }
                if seen.insert(child_path.clone()) {
                    if depth + 1 > self.max_depth {
                        return Err(KicadError::SheetDepthExceeded {
                            page: child_path,
                            max_depth: self.max_depth,
                        });
                    }
                    queue.push_back((child_path.clone(), depth + 1));
                } else {
                    tracing::debug!(
                        page = %child_path.display(),
                        "Sheet already reached, not loading again"
                    );
                }
                resolved.push(child_path);
            }
            loaded.insert(page_path, (page, resolved));
        }

        Ok(depth_first_order(&root, loaded))
    }

    /// Like [`discover`](Self::discover), returning only the page paths.
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn discover_paths(&self, root: &Path) -> KicadResult<Vec<PathBuf>> {
        Ok(self
            .discover(root)?
            .into_iter()
            .map(|page| page.path().to_path_buf())
            .collect())
    }
}

/// Orders loaded pages depth-first from the root, first declared child first.
fn depth_first_order(
    root: &Path,
    mut loaded: IndexMap<PathBuf, (Page, Vec<PathBuf>)>,
) -> Vec<Page> {
    let mut ordered = Vec::with_capacity(loaded.len());
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(page_path) = stack.pop() {
        let Some((page, children)) = loaded.swap_remove(&page_path) else {
            continue;
        };
        ordered.push(page);
        stack.extend(children.into_iter().rev());
    }

    ordered
}

fn absolute(root: &Path) -> KicadResult<PathBuf> {
    if root.is_absolute() {
        return Ok(path::normalize(root));
    }
    let cwd = std::env::current_dir().map_err(|e| KicadError::file_read(root, e))?;
    Ok(path::normalize(&cwd.join(root)))
}
