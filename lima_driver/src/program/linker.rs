/// Program linker
///
/// Merges the vertex and fragment symbol tables into one program table,
/// resolves built-in symbols and assigns every symbol its location:
/// a byte offset in the program uniform block for uniforms, a slot index
/// for attributes and varyings.

use std::collections::BTreeMap;
use crate::error::{Error, Result};
use crate::{driver_bail, driver_debug};
use crate::symbol::{
    Symbol, SymbolKind, SymbolTable, StageFlags, Viewport,
    viewport_transform_symbol, constant_000_symbol,
};
use crate::memory::uniform_arena::{align_up, UNIFORM_ALIGNMENT};

/// Attribute streams the geometry processor can fetch
pub const MAX_ATTRIBUTES: u32 = 16;

/// Interpolated values passed to the pixel processor
pub const MAX_VARYINGS: u32 = 12;

// ===== UNIFORM LAYOUT =====

/// Placement of one uniform inside the program uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Read by fixed-function hardware through its own address
    pub physical: bool,
}

/// Largest program uniform block, in bytes
pub const MAX_UNIFORM_BLOCK_SIZE: u32 = 64 * 1024;

/// Byte layout of the program uniform block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: u32,
}

impl UniformLayout {
    /// Layout from placed slots; the block ends after the last one
    pub fn from_slots(mut slots: Vec<UniformSlot>) -> Self {
        slots.sort_by_key(|slot| slot.offset);
        let end = slots.iter()
            .map(|slot| slot.offset as usize + slot.size as usize)
            .max()
            .unwrap_or(0);
        let size = u32::try_from(align_up(end, UNIFORM_ALIGNMENT)).unwrap_or(u32::MAX);
        Self { slots, size }
    }

    /// Block size in bytes, a multiple of 16
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Slots in ascending offset order
    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Copy every uniform's current value to its offset
    pub fn snapshot(&self, symbols: &SymbolTable<'_>) -> Vec<u8> {
        let mut block = vec![0u8; self.size as usize];
        for slot in &self.slots {
            if let Some(data) = symbols.get(&slot.name).and_then(|symbol| symbol.data()) {
                let start = slot.offset as usize;
                block[start..start + data.len()].copy_from_slice(data);
            }
        }
        block
    }
}

// ===== MERGE =====

fn merge_symbol(merged: &mut SymbolTable<'static>, incoming: &Symbol<'static>) -> Result<()> {
    if !merged.contains(incoming.name()) {
        if incoming.kind() == SymbolKind::Varying {
            driver_bail!("lima::Linker", Error::Link(format!(
                "Varying '{}' read by the fragment stage is not written by the vertex stage",
                incoming.name())));
        }
        return merged.insert(incoming.clone().with_stages(StageFlags::FRAGMENT));
    }
    let existing = merged.lookup(incoming.name())?;

    if !existing.same_footprint(incoming) {
        driver_bail!("lima::Linker", Error::Link(format!(
            "Symbol '{}' has footprint {}x{}x{} in the vertex stage and {}x{}x{} in the fragment stage",
            incoming.name(),
            existing.element_size(), existing.element_entries(), existing.element_count(),
            incoming.element_size(), incoming.element_entries(), incoming.element_count())));
    }

    match (existing.kind(), incoming.kind()) {
        (a, b) if a == b => {
            merged.lookup_mut(incoming.name())?.add_stages(StageFlags::FRAGMENT);
        }
        (SymbolKind::Attribute, SymbolKind::Varying) => {
            merged.lookup_mut(incoming.name())?.add_stages(StageFlags::FRAGMENT);
        }
        (SymbolKind::Varying, SymbolKind::Attribute) => {
            let stages = existing.stages() | StageFlags::FRAGMENT;
            merged.replace(incoming.clone().with_stages(stages))?;
        }
        (a, b) => {
            driver_bail!("lima::Linker", Error::Link(format!(
                "Symbol '{}' is a {:?} in the vertex stage and a {:?} in the fragment stage",
                incoming.name(), a, b)));
        }
    }
    Ok(())
}

// ===== BUILT-INS =====

/// Check that built-ins declared by the shaders have the hardware layout
fn check_builtin_shapes(table: &SymbolTable<'static>) -> Result<()> {
    let reference = [
        viewport_transform_symbol(&Viewport::from_size(1, 1))?,
        constant_000_symbol()?,
    ];
    for expected in &reference {
        if let Some(declared) = table.get(expected.name()) {
            if declared.kind() != SymbolKind::Uniform || !declared.same_footprint(expected) {
                driver_bail!("lima::Linker", Error::Link(format!(
                    "Built-in '{}' declared as {:?} {}x{}x{}, hardware expects Uniform {}x{}x{}",
                    expected.name(), declared.kind(),
                    declared.element_size(), declared.element_entries(), declared.element_count(),
                    expected.element_size(), expected.element_entries(), expected.element_count())));
            }
        }
    }
    Ok(())
}

/// Insert or refresh the built-in uniforms for `viewport`
///
/// Shader-declared built-ins keep their position and hint, only their
/// value and physical flag are set.
pub fn inject_builtins(table: &mut SymbolTable<'static>, viewport: &Viewport) -> Result<()> {
    check_builtin_shapes(table)?;

    for builtin in [viewport_transform_symbol(viewport)?, constant_000_symbol()?] {
        if table.contains(builtin.name()) {
            let declared = table.lookup_mut(builtin.name())?;
            if let Some(data) = builtin.data() {
                declared.write(0, data)?;
            }
            declared.set_physical(true);
        } else {
            table.insert(builtin)?;
        }
    }
    Ok(())
}

// ===== LOCATIONS =====

fn overlaps(placed: &BTreeMap<u32, u32>, offset: u32, end: u32) -> bool {
    placed.iter().any(|(&start, &placed_end)| offset < placed_end && start < end)
}

/// Assign uniform offsets, honouring aligned non-overlapping hints
///
/// A hint whose range ends past `MAX_UNIFORM_BLOCK_SIZE` is ignored.
fn assign_uniform_offsets(table: &mut SymbolTable<'static>) -> Result<UniformLayout> {
    let mut placed: BTreeMap<u32, u32> = BTreeMap::new();
    let mut offsets: Vec<(String, u32, u32, bool)> = Vec::new();

    let mut uniforms: Vec<(String, u32, Option<u32>, bool)> = Vec::new();
    for symbol in table.of_kind(SymbolKind::Uniform) {
        let size = match u32::try_from(align_up(symbol.footprint(), UNIFORM_ALIGNMENT)) {
            Ok(size) => size,
            Err(_) => driver_bail!("lima::Linker", Error::Link(format!(
                "Uniform '{}' does not fit in the uniform block", symbol.name()))),
        };
        uniforms.push((symbol.name().to_string(), size, symbol.address_hint(), symbol.is_physical()));
    }

    let mut unhinted = Vec::new();
    for (name, size, hint, physical) in uniforms {
        let usable = hint
            .filter(|offset| offset % UNIFORM_ALIGNMENT as u32 == 0)
            .and_then(|offset| offset.checked_add(size).map(|end| (offset, end)))
            .filter(|&(offset, end)| end <= MAX_UNIFORM_BLOCK_SIZE && !overlaps(&placed, offset, end));
        match usable {
            Some((offset, end)) => {
                placed.insert(offset, end);
                offsets.push((name, offset, size, physical));
            }
            None => unhinted.push((name, size, physical)),
        }
    }

    for (name, size, physical) in unhinted {
        // First fit between placed ranges
        let mut offset: u32 = 0;
        for (&start, &end) in &placed {
            if offset.checked_add(size).is_some_and(|fit| fit <= start) {
                break;
            }
            offset = offset.max(end);
        }
        let end = match offset.checked_add(size) {
            Some(end) if end <= MAX_UNIFORM_BLOCK_SIZE => end,
            _ => driver_bail!("lima::Linker", Error::Link(format!(
                "No room for uniform '{}' in the uniform block", name))),
        };
        placed.insert(offset, end);
        offsets.push((name, offset, size, physical));
    }

    let slots: Vec<UniformSlot> = offsets.into_iter()
        .map(|(name, offset, size, physical)| UniformSlot { name, offset, size, physical })
        .collect();
    for slot in &slots {
        if let Ok(symbol) = table.lookup_mut(&slot.name) {
            symbol.set_location(Some(slot.offset));
        }
    }
    Ok(UniformLayout::from_slots(slots))
}

/// Assign slot indices to one kind, honouring free hints
fn assign_slots(table: &mut SymbolTable<'static>, kind: SymbolKind, limit: u32) -> Result<u32> {
    let requests: Vec<(String, Option<u32>)> = table.of_kind(kind)
        .map(|symbol| (symbol.name().to_string(), symbol.address_hint()))
        .collect();
    if requests.len() as u32 > limit {
        driver_bail!("lima::Linker", Error::Link(format!(
            "{} {:?} symbols exceed the hardware limit of {}", requests.len(), kind, limit)));
    }

    let mut used = vec![false; limit as usize];
    let mut pending = Vec::new();
    for (name, hint) in requests {
        match hint {
            Some(slot) if slot < limit && !used[slot as usize] => {
                used[slot as usize] = true;
                table.lookup_mut(&name)?.set_location(Some(slot));
            }
            _ => pending.push(name),
        }
    }
    for name in pending {
        // Count check above guarantees a free slot
        let slot = used.iter().position(|taken| !taken).unwrap_or(0);
        used[slot] = true;
        table.lookup_mut(&name)?.set_location(Some(slot as u32));
    }
    Ok(used.iter().filter(|taken| **taken).count() as u32)
}

/// Locations of a linked table
#[derive(Debug, Clone, Default)]
pub struct Locations {
    pub uniforms: UniformLayout,
    pub attribute_count: u32,
    pub varying_count: u32,
}

/// Resolve every symbol location of a merged table
pub fn assign_locations(table: &mut SymbolTable<'static>) -> Result<Locations> {
    let attribute_count = assign_slots(table, SymbolKind::Attribute, MAX_ATTRIBUTES)?;
    let varying_count = assign_slots(table, SymbolKind::Varying, MAX_VARYINGS)?;
    let uniforms = assign_uniform_offsets(table)?;
    Ok(Locations { uniforms, attribute_count, varying_count })
}

// ===== LINK =====

/// Result of a successful link
#[derive(Debug, Clone)]
pub struct LinkedSymbols {
    pub symbols: SymbolTable<'static>,
    pub locations: Locations,
    /// Built-ins were injected; false until the viewport is known
    pub builtins_ready: bool,
}

/// Merge two stage tables into a program table
///
/// With `viewport` unknown, built-in injection is deferred to the next
/// state setup rather than failing.
pub fn link(
    vertex: &SymbolTable<'static>,
    fragment: &SymbolTable<'static>,
    viewport: Option<&Viewport>,
) -> Result<LinkedSymbols> {
    let mut symbols = SymbolTable::new();
    for symbol in vertex.iter() {
        let stages = symbol.stages() | StageFlags::VERTEX;
        symbols.insert(symbol.clone().with_stages(stages))?;
    }
    for symbol in fragment.iter() {
        merge_symbol(&mut symbols, symbol)?;
    }

    check_builtin_shapes(&symbols)?;
    let builtins_ready = match viewport {
        Some(viewport) => {
            inject_builtins(&mut symbols, viewport)?;
            true
        }
        None => {
            driver_debug!("lima::Linker", "Viewport unknown, built-in injection deferred");
            false
        }
    };

    let locations = assign_locations(&mut symbols)?;
    driver_debug!("lima::Linker",
        "Linked {} symbols: {} attributes, {} varyings, {} byte uniform block",
        symbols.len(), locations.attribute_count, locations.varying_count, locations.uniforms.size());

    Ok(LinkedSymbols { symbols, locations, builtins_ready })
}

#[cfg(test)]
#[path = "linker_tests.rs"]
mod tests;
