//! Schematic pages and component instance lookup.
//!
//! A legacy page places one unit of a symbol per component block:
//!
//! ```text
//! $Comp
//! L 74xx:74HC00 U1
//! U 2 1 5B8E2E60
//! P 3000 2000
//! F 0 "U1" H 3000 2200 50  0000 C CNN
//! $EndComp
//! ```
//!
//! The `L` line binds the block to a symbol name and a reference; the
//! second token of the `U` line is the unit index. A multi-unit part placed
//! across several pages (or several times on one page) has one block per
//! unit, all sharing the reference.

use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::lexer::{self, RawLine};
use super::{KicadError, KicadResult};

const COMP_START: &str = "$Comp";
const COMP_END: &str = "$EndComp";
const LIB_LINE_TAG: &str = "L";
const UNIT_LINE_TAG: &str = "U";

/// A schematic page file and its raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    path: PathBuf,
    text: String,
}

impl Page {
    /// Creates a page from text already in memory.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Reads a page from disk.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::FileRead`] if the file cannot be read as UTF-8.
    pub fn load(path: &Path) -> KicadResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| KicadError::file_read(path, e))?;
        Ok(Self::new(path, text))
    }

    /// Page file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw page text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parses every component block of the page.
    ///
    /// # Errors
    ///
    /// See [`parse_components`].
    pub fn components(&self) -> KicadResult<Vec<ComponentRecord>> {
        parse_components(&self.path, &self.text)
    }
}

/// One `$Comp` block of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    /// Page containing the block.
    pub page: PathBuf,
    /// 1-based line of the `$Comp` delimiter.
    pub line: usize,
    /// Symbol name from the `L` line.
    pub symbol: String,
    /// Reference from the `L` line.
    pub reference: String,
    /// Unit index from the `U` line.
    pub unit: u32,
    /// Byte span of the unit token within the page text.
    pub unit_span: Range<usize>,
}

/// The component block chosen to represent one unit of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInstance {
    /// Page containing the block.
    pub page: PathBuf,
    /// Footprint reference.
    pub reference: String,
    /// Declared unit index.
    pub unit: u32,
    /// Byte offset of the unit token.
    pub offset: usize,
    /// Byte length of the unit token.
    pub length: usize,
}

impl ComponentInstance {
    /// The unit token's byte range.
    #[must_use]
    pub const fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }
}

impl From<&ComponentRecord> for ComponentInstance {
    fn from(record: &ComponentRecord) -> Self {
        Self {
            page: record.page.clone(),
            reference: record.reference.clone(),
            unit: record.unit,
            offset: record.unit_span.start,
            length: record.unit_span.len(),
        }
    }
}

#[derive(Default)]
struct OpenBlock {
    line: usize,
    lib: Option<(String, String)>,
    unit: Option<(u32, Range<usize>)>,
}

impl OpenBlock {
    fn read_lib_line(&mut self, page: &Path, line: &RawLine<'_>) -> KicadResult<()> {
        let toks = line.tokens();
        let (Some(symbol), Some(reference)) = (toks.get(1), toks.get(2)) else {
            return Err(KicadError::malformed_component(
                page,
                self.line,
                format!("L line {} needs a symbol name and a reference", line.number),
            ));
        };
        self.lib = Some((symbol.text.to_string(), reference.text.to_string()));
        Ok(())
    }

    fn read_unit_line(&mut self, page: &Path, line: &RawLine<'_>) -> KicadResult<()> {
        let toks = line.tokens();
        let unit = toks.get(1).and_then(|t| t.text.parse::<u32>().ok().map(|u| (u, t)));
        let Some((unit, tok)) = unit else {
            return Err(KicadError::malformed_component(
                page,
                self.line,
                format!("U line {} has no numeric unit", line.number),
            ));
        };
        let start = line.offset + tok.offset;
        self.unit = Some((unit, start..start + tok.text.len()));
        Ok(())
    }

    fn finish(self, page: &Path) -> KicadResult<ComponentRecord> {
        let Some((symbol, reference)) = self.lib else {
            return Err(KicadError::malformed_component(page, self.line, "missing L line"));
        };
        let Some((unit, unit_span)) = self.unit else {
            return Err(KicadError::malformed_component(page, self.line, "missing U line"));
        };
        Ok(ComponentRecord {
            page: page.to_path_buf(),
            line: self.line,
            symbol,
            reference,
            unit,
            unit_span,
        })
    }
}

/// Parses the component blocks of a page's text, in file order.
///
/// # Errors
///
/// Returns [`KicadError::MalformedComponentBlock`] if a block lacks its `L`
/// or `U` line, or is not closed.
pub fn parse_components(page: &Path, text: &str) -> KicadResult<Vec<ComponentRecord>> {
    let mut records = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for line in lexer::lines(text) {
        if line.is_tagged(COMP_START) {
            if let Some(block) = open {
                return Err(KicadError::malformed_component(
                    page,
                    block.line,
                    "component block not closed before next $Comp",
                ));
            }
            open = Some(OpenBlock {
                line: line.number,
                ..OpenBlock::default()
            });
            continue;
        }

        let Some(block) = open.as_mut() else {
            continue;
        };
        if line.is_tagged(COMP_END) {
            if let Some(block) = open.take() {
                records.push(block.finish(page)?);
            }
        } else if line.is_tagged(LIB_LINE_TAG) {
            block.read_lib_line(page, &line)?;
        } else if line.is_tagged(UNIT_LINE_TAG) {
            block.read_unit_line(page, &line)?;
        }
    }

    if let Some(block) = open {
        return Err(KicadError::malformed_component(
            page,
            block.line,
            "component block not closed before end of file",
        ));
    }

    Ok(records)
}

/// Resolves references to pages, symbols and unit instances.
///
/// Every page's component blocks are parsed once up front.
#[derive(Debug)]
pub struct ComponentLinker<'p> {
    pages: &'p [Page],
    records: Vec<ComponentRecord>,
}

impl<'p> ComponentLinker<'p> {
    /// Indexes the component blocks of every page.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed component block.
    pub fn new(pages: &'p [Page]) -> KicadResult<Self> {
        let mut records = Vec::new();
        for page in pages {
            let found = page.components()?;
            tracing::debug!(
                page = %page.path().display(),
                components = found.len(),
                "Indexed component blocks"
            );
            records.extend(found);
        }
        Ok(Self { pages, records })
    }

    /// All component blocks, page by page in file order.
    #[must_use]
    pub fn records(&self) -> &[ComponentRecord] {
        &self.records
    }

    /// Pages with at least one block for `reference`, in page order.
    ///
    /// The reference must match the `L` line token exactly.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::ReferenceNotFound`] if no page has one.
    pub fn pages_containing(&self, reference: &str) -> KicadResult<Vec<&'p Page>> {
        let found: Vec<&Page> = self
            .pages
            .iter()
            .filter(|page| {
                self.records
                    .iter()
                    .any(|r| r.reference == reference && r.page == page.path())
            })
            .collect();

        if found.is_empty() {
            return Err(KicadError::ReferenceNotFound {
                reference: reference.to_string(),
            });
        }
        Ok(found)
    }

    /// The symbol bound to `reference` on `page`: that of the first block
    /// in file order.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::ReferenceNotFound`] if the page has no block for
    /// the reference.
    pub fn symbol_name_for(&self, reference: &str, page: &Page) -> KicadResult<&str> {
        let mut blocks = self
            .records
            .iter()
            .filter(|r| r.reference == reference && r.page == page.path());
        let first = blocks.next().ok_or_else(|| KicadError::ReferenceNotFound {
            reference: reference.to_string(),
        })?;

        for other in self.records.iter().filter(|r| r.reference == reference) {
            if other.symbol != first.symbol {
                tracing::warn!(
                    reference,
                    first = %first.symbol,
                    other = %other.symbol,
                    page = %other.page.display(),
                    "Reference bound to different symbols, using the first"
                );
            }
        }
        Ok(&first.symbol)
    }

    /// Finds the single block of `reference` declaring `unit` on any of
    /// `candidates`.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::UnitInstanceNotFound`] if there is none and
    /// [`KicadError::AmbiguousInstance`] if there are several.
    pub fn instance_for_unit(
        &self,
        reference: &str,
        unit: u32,
        candidates: &[&Page],
    ) -> KicadResult<ComponentInstance> {
        let matches: Vec<&ComponentRecord> = self
            .records
            .iter()
            .filter(|r| r.reference == reference && r.unit == unit)
            .filter(|r| candidates.iter().any(|p| p.path() == r.page))
            .collect();

        match matches.as_slice() {
            [] => Err(KicadError::UnitInstanceNotFound {
                reference: reference.to_string(),
                unit,
            }),
            [record] => {
                tracing::debug!(
                    reference,
                    unit,
                    page = %record.page.display(),
                    line = record.line,
                    "Resolved unit instance"
                );
                Ok(ComponentInstance::from(*record))
            }
            many => Err(KicadError::AmbiguousInstance {
                reference: reference.to_string(),
                unit,
                count: many.len(),
            }),
        }
    }
}
