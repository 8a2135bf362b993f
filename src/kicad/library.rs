//! Legacy symbol library (`.lib`) parsing.
//!
//! The project cache library is a sequence of symbol blocks:
//!
//! ```text
//! DEF 74xx_74HC00 U 0 40 Y Y 5 L N
//! F0 "U" 0 50 50 H V C CNN
//! ALIAS 74HCT00
//! DRAW
//! X ~ 1 -300 100 150 R 50 50 1 1 I
//! X ~ 2 -300 -100 150 R 50 50 1 1 I
//! ENDDRAW
//! ENDDEF
//! ```
//!
//! # Pin Record
//!
//! | Token | Field |
//! |-------|-------|
//! | 0 | `X` tag |
//! | 1 | Pin name |
//! | 2 | Pad designator |
//! | 3-4 | Position |
//! | 5 | Length |
//! | 6 | Orientation |
//! | 7-8 | Number/name text size |
//! | 9 | Unit (0 = common to all units) |
//! | 10 | Body style (De Morgan alternate) |
//! | 11 | Electrical type |
//! | 12 | Graphic shape (optional) |
//!
//! Only name, pad, unit and body style are interpreted.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use super::lexer::{self, RawLine};
use super::{KicadError, KicadResult};

const DEF_TAG: &str = "DEF";
const ENDDEF_TAG: &str = "ENDDEF";
const ALIAS_TAG: &str = "ALIAS";
const PIN_TAG: &str = "X";
const FPLIST_START: &str = "$FPLIST";
const FPLIST_END: &str = "$ENDFPLIST";

/// Token index of the unit field in a pin record.
const PIN_UNIT_INDEX: usize = 9;
/// Token index of the body style field in a pin record.
const PIN_BODY_STYLE_INDEX: usize = 10;
/// Minimum tokens for a pin record (tag through unit).
const PIN_MIN_TOKENS: usize = PIN_UNIT_INDEX + 1;

/// A symbol pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pin {
    /// Pin name (`~` when unnamed).
    pub name: String,
    /// Pad designator as used on the footprint.
    pub pad: String,
    /// Unit index, 1-based; 0 means the pin belongs to every unit.
    pub unit: u32,
    /// Body style; 0 means shared by all styles.
    pub body_style: u32,
    /// Every token of the record after the tag, verbatim.
    pub fields: Vec<String>,
}

impl Pin {
    /// Returns true if the pin is common to all units.
    #[must_use]
    pub const fn is_common(&self) -> bool {
        self.unit == 0
    }
}

/// A symbol definition from the cache library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolDefinition {
    /// Symbol name from the `DEF` line.
    pub name: String,
    /// Reference prefix (e.g. `U`).
    pub reference_prefix: String,
    /// Unit count declared on the `DEF` line, if readable.
    pub declared_units: Option<u32>,
    /// Alternative names from `ALIAS` lines.
    pub aliases: Vec<String>,
    /// Pins in file order.
    pub pins: Vec<Pin>,
    /// 1-based line of the `DEF` line.
    pub line: usize,
}

impl SymbolDefinition {
    fn from_def_line(line: &RawLine<'_>) -> Self {
        let toks = line.tokens();
        let name = toks
            .get(1)
            .map(|t| t.text.trim_start_matches('~').to_string())
            .unwrap_or_default();
        let reference_prefix = toks
            .get(2)
            .map(|t| t.text.trim_start_matches('~').to_string())
            .unwrap_or_default();
        let declared_units = toks.get(7).and_then(|t| t.text.parse().ok());

        Self {
            name,
            reference_prefix,
            declared_units,
            aliases: Vec::new(),
            pins: Vec::new(),
            line: line.number,
        }
    }

    /// Finds the first pin, in file order, carrying `pad`.
    #[must_use]
    pub fn pin_for_pad(&self, pad: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.pad == pad)
    }
}

/// Decodes a pin record line.
///
/// # Errors
///
/// Returns [`KicadError::MalformedPinLine`] if the record has fewer fields
/// than the unit position, or a unit or body style that is not a number.
pub fn parse_pin_line(line: &RawLine<'_>) -> KicadResult<Pin> {
    let toks: Vec<&str> = line.tokens().iter().map(|t| t.text).collect();
    if toks.len() < PIN_MIN_TOKENS {
        return Err(KicadError::malformed_pin(
            line.number,
            format!(
                "expected at least {PIN_MIN_TOKENS} fields, found {}",
                toks.len()
            ),
        ));
    }

    let unit = toks[PIN_UNIT_INDEX].parse::<u32>().map_err(|_| {
        KicadError::malformed_pin(
            line.number,
            format!("unit '{}' is not a number", toks[PIN_UNIT_INDEX]),
        )
    })?;
    let body_style = match toks.get(PIN_BODY_STYLE_INDEX) {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            KicadError::malformed_pin(line.number, format!("body style '{raw}' is not a number"))
        })?,
        None => 0,
    };

    Ok(Pin {
        name: toks[1].to_string(),
        pad: toks[2].to_string(),
        unit,
        body_style,
        fields: toks[1..].iter().map(|s| (*s).to_string()).collect(),
    })
}

enum LibLine {
    Def,
    EndDef,
    Alias,
    Pin,
    FootprintListStart,
    FootprintListEnd,
    Other,
}

fn classify(line: &RawLine<'_>) -> LibLine {
    match line.text.split_ascii_whitespace().next() {
        Some(DEF_TAG) => LibLine::Def,
        Some(ENDDEF_TAG) => LibLine::EndDef,
        Some(ALIAS_TAG) => LibLine::Alias,
        Some(PIN_TAG) => LibLine::Pin,
        Some(FPLIST_START) => LibLine::FootprintListStart,
        Some(FPLIST_END) => LibLine::FootprintListEnd,
        _ => LibLine::Other,
    }
}

/// A parsed symbol cache library.
#[derive(Debug, Default)]
pub struct SymbolLibrary {
    /// Library file path (if loaded from file).
    pub filepath: Option<PathBuf>,
    /// Definitions keyed by name, in file order.
    symbols: IndexMap<String, SymbolDefinition>,
    /// Alias name to definition name.
    aliases: IndexMap<String, String>,
}

impl SymbolLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens and parses a library file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> KicadResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| KicadError::file_read(path, e))?;
        let mut lib = Self::parse(&text)?;
        lib.filepath = Some(path.to_path_buf());
        Ok(lib)
    }

    /// Parses library text.
    ///
    /// Lines outside `DEF`/`ENDDEF` blocks are ignored, as are lines inside
    /// a `$FPLIST` footprint filter list.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::MalformedPinLine`] for the first bad pin record.
    pub fn parse(text: &str) -> KicadResult<Self> {
        let mut lib = Self::new();
        let mut current: Option<SymbolDefinition> = None;
        let mut in_fplist = false;

        for line in lexer::lines(text) {
            let kind = classify(&line);
            if in_fplist {
                in_fplist = !matches!(kind, LibLine::FootprintListEnd);
                continue;
            }

            match kind {
                LibLine::Def => {
                    if let Some(open) = current.take() {
                        tracing::warn!(symbol = %open.name, "DEF without ENDDEF");
                        lib.insert(open);
                    }
                    current = Some(SymbolDefinition::from_def_line(&line));
                }
                LibLine::EndDef => {
                    if let Some(done) = current.take() {
                        lib.insert(done);
                    }
                }
                LibLine::Alias => {
                    if let Some(def) = current.as_mut() {
                        def.aliases
                            .extend(line.text.split_ascii_whitespace().skip(1).map(str::to_string));
                    }
                }
                LibLine::Pin => {
                    if let Some(def) = current.as_mut() {
                        def.pins.push(parse_pin_line(&line)?);
                    }
                }
                LibLine::FootprintListStart => in_fplist = current.is_some(),
                LibLine::FootprintListEnd | LibLine::Other => {}
            }
        }

        if let Some(open) = current.take() {
            tracing::warn!(symbol = %open.name, "Library ended inside a DEF block");
            lib.insert(open);
        }

        tracing::debug!(symbols = lib.len(), "Parsed symbol library");
        Ok(lib)
    }

    fn insert(&mut self, def: SymbolDefinition) {
        if self.symbols.contains_key(&def.name) {
            tracing::warn!(
                symbol = %def.name,
                line = def.line,
                "Duplicate symbol definition ignored, first one wins"
            );
            return;
        }
        for alias in &def.aliases {
            self.aliases
                .entry(alias.clone())
                .or_insert_with(|| def.name.clone());
        }
        self.symbols.insert(def.name.clone(), def);
    }

    /// Finds a definition by exact name or alias.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SymbolDefinition> {
        self.symbols.get(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|target| self.symbols.get(target))
        })
    }

    /// Gets the definition bound to a schematic symbol name.
    ///
    /// Tries, in order: the exact name, the cache spelling of a `lib:name`
    /// identifier (`lib_name`), and the part after the colon.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::SymbolNotFound`] if no candidate matches.
    pub fn get(&self, name: &str) -> KicadResult<&SymbolDefinition> {
        if let Some(def) = self.find(name) {
            return Ok(def);
        }
        if let Some((lib, part)) = name.split_once(':') {
            if let Some(def) = self
                .find(&format!("{lib}_{part}"))
                .or_else(|| self.find(part))
            {
                return Ok(def);
            }
        }
        Err(KicadError::SymbolNotFound {
            name: name.to_string(),
        })
    }

    /// Returns an iterator over all definitions in file order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolDefinition> {
        self.symbols.values()
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if the library has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE: &str = "EESchema-LIBRARY Version 2.4\n\
#encoding utf-8\n\
#\n\
# 74xx_74LS00\n\
#\n\
DEF 74xx_74LS00 U 0 40 Y Y 5 L N\n\
F0 \"U\" 0 0 50 H V C CNN\n\
ALIAS 74HCT00 74HC00\n\
$FPLIST\n\
 X DIP*\n\
$ENDFPLIST\n\
DRAW\n\
X ~ 1 -300 100 150 R 50 50 1 1 I\n\
X ~ 2 -300 -100 150 R 50 50 1 1 I\n\
X ~ 3 300 0 150 L 50 50 1 1 O I\n\
X VCC 14 0 500 150 D 50 50 5 0 W\n\
ENDDRAW\n\
ENDDEF\n\
#\n\
# Device_R\n\
#\n\
DEF ~R R 0 0 N Y 1 F N\n\
DRAW\n\
X ~ 1 0 150 50 D 50 50 1 1 P\n\
X ~ 2 0 -150 50 U 50 50 1 1 P\n\
ENDDRAW\n\
ENDDEF\n\
#End Library\n";

    #[test]
    fn parses_definitions_in_order() {
        let lib = SymbolLibrary::parse(CACHE).unwrap();
        let names: Vec<_> = lib.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["74xx_74LS00", "R"]);
    }

    #[test]
    fn pin_fields_decode_positionally() {
        let lib = SymbolLibrary::parse(CACHE).unwrap();
        let def = lib.get("74xx_74LS00").unwrap();
        assert_eq!(def.pins.len(), 4);
        assert_eq!(def.reference_prefix, "U");
        assert_eq!(def.declared_units, Some(5));

        let vcc = def.pin_for_pad("14").unwrap();
        assert_eq!(vcc.name, "VCC");
        assert_eq!(vcc.unit, 5);
        assert_eq!(vcc.body_style, 0);
        assert_eq!(vcc.fields.len(), 11);
    }

    #[test]
    fn footprint_filters_are_not_pins() {
        let lib = SymbolLibrary::parse(CACHE).unwrap();
        let def = lib.get("74xx_74LS00").unwrap();
        assert!(def.pins.iter().all(|p| p.pad != "DIP*"));
    }

    #[test]
    fn lookup_by_alias_and_library_prefix() {
        let lib = SymbolLibrary::parse(CACHE).unwrap();
        assert_eq!(lib.get("74HC00").unwrap().name, "74xx_74LS00");
        assert_eq!(lib.get("74xx:74LS00").unwrap().name, "74xx_74LS00");
        assert_eq!(lib.get("Device:R").unwrap().name, "R");
    }

    #[test]
    fn missing_symbol_is_an_error() {
        let lib = SymbolLibrary::parse(CACHE).unwrap();
        assert!(matches!(
            lib.get("4011"),
            Err(KicadError::SymbolNotFound { name }) if name == "4011"
        ));
    }

    #[test]
    fn short_pin_line_is_malformed() {
        let text = "DEF X U 0 40 Y Y 1 L N\nDRAW\nX ~ 1 0 0 150 R 50\nENDDRAW\nENDDEF\n";
        assert!(matches!(
            SymbolLibrary::parse(text),
            Err(KicadError::MalformedPinLine { line: 3, .. })
        ));
    }

    #[test]
    fn non_numeric_unit_is_malformed() {
        let text = "DEF X U 0 40 Y Y 1 L N\nX ~ 1 0 0 150 R 50 50 A 1 I\nENDDEF\n";
        assert!(matches!(
            SymbolLibrary::parse(text),
            Err(KicadError::MalformedPinLine { line: 2, .. })
        ));
    }

    #[test]
    fn duplicate_definition_keeps_first() {
        let text = "DEF A U 0 40 Y Y 1 L N\nX ~ 1 0 0 150 R 50 50 1 1 I\nENDDEF\n\
DEF A U 0 40 Y Y 1 L N\nX ~ 9 0 0 150 R 50 50 1 1 I\nENDDEF\n";
        let lib = SymbolLibrary::parse(text).unwrap();
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get("A").unwrap().pins[0].pad, "1");
    }

    #[test]
    fn pins_outside_definitions_are_ignored() {
        let text = "X ~ 1 0 0 150 R 50 50 1 1 I\n";
        assert!(SymbolLibrary::parse(text).unwrap().is_empty());
    }
}
