//! Per-unit view of a multi-unit symbol.

use std::collections::BTreeMap;

use super::library::{Pin, SymbolDefinition};
use super::{KicadError, KicadResult};

/// Pins of a symbol grouped by unit index.
///
/// Unit-0 pins (common to every unit) are not assigned to any unit.
#[derive(Debug, Clone)]
pub struct UnitTable<'a> {
    symbol: &'a SymbolDefinition,
    units: BTreeMap<u32, Vec<&'a Pin>>,
    unit_count: u32,
}

impl<'a> UnitTable<'a> {
    /// Builds the table for a symbol.
    #[must_use]
    pub fn new(symbol: &'a SymbolDefinition) -> Self {
        let mut units: BTreeMap<u32, Vec<&Pin>> = BTreeMap::new();
        for pin in symbol.pins.iter().filter(|p| !p.is_common()) {
            units.entry(pin.unit).or_default().push(pin);
        }
        for pins in units.values_mut() {
            // Stable, so equal names keep file order.
            pins.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.pad.cmp(&b.pad)));
        }

        let unit_count = units.keys().next_back().copied().unwrap_or(0);
        let table = Self {
            symbol,
            units,
            unit_count,
        };

        let missing = table.missing_units();
        if !missing.is_empty() {
            tracing::warn!(
                symbol = %symbol.name,
                ?missing,
                "Symbol has gaps in its unit numbering"
            );
        }
        table
    }

    /// The symbol this table was built from.
    #[must_use]
    pub const fn symbol(&self) -> &'a SymbolDefinition {
        self.symbol
    }

    /// Returns the unit owning `pad`, by the first pin in file order.
    ///
    /// # Errors
    ///
    /// Returns [`KicadError::PadNotFound`] if no pin carries the pad, or
    /// [`KicadError::SharedPad`] if that pin is common to all units.
    pub fn unit_of(&self, pad: &str) -> KicadResult<u32> {
        let pin = self
            .symbol
            .pin_for_pad(pad)
            .ok_or_else(|| KicadError::PadNotFound {
                symbol: self.symbol.name.clone(),
                pad: pad.to_string(),
            })?;
        if pin.is_common() {
            return Err(KicadError::SharedPad {
                symbol: self.symbol.name.clone(),
                pad: pad.to_string(),
            });
        }
        Ok(pin.unit)
    }

    /// The highest unit index carried by any pin.
    #[must_use]
    pub const fn unit_count(&self) -> u32 {
        self.unit_count
    }

    /// Unit indices in `1..=unit_count()` that carry no pins.
    #[must_use]
    pub fn missing_units(&self) -> Vec<u32> {
        (1..=self.unit_count)
            .filter(|u| !self.units.contains_key(u))
            .collect()
    }

    /// Pins of `unit`, sorted by pin name then pad. Empty for unknown units.
    #[must_use]
    pub fn pins_in(&self, unit: u32) -> &[&'a Pin] {
        self.units.get(&unit).map_or(&[][..], Vec::as_slice)
    }

    /// Unit indices that carry at least one pin.
    pub fn units(&self) -> impl Iterator<Item = u32> + '_ {
        self.units.keys().copied()
    }

    /// Pairs each pad of unit `from` with the pad at the same position of
    /// unit `to`, in [`pins_in`](Self::pins_in) order.
    ///
    /// Pins of a body style other than the first one present are skipped so
    /// De Morgan alternates do not produce duplicate pairs.
    #[must_use]
    pub fn pad_map(&self, from: u32, to: u32) -> Vec<(String, String)> {
        let primary = |unit: u32| {
            let pins = self.pins_in(unit);
            let style = pins.iter().map(|p| p.body_style).filter(|s| *s != 0).min();
            pins.iter()
                .copied()
                .filter(|p| p.body_style == 0 || Some(p.body_style) == style)
                .collect::<Vec<&Pin>>()
        };
        primary(from)
            .into_iter()
            .zip(primary(to))
            .map(|(a, b)| (a.pad.clone(), b.pad.clone()))
            .collect()
    }
}
