/// Symbol table - ordered name → Symbol mapping for one shader stage
/// or for a linked program.
///
/// Symbols are stored contiguously in insertion order with an
/// FxHashMap name index for O(1) lookup.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::{driver_bail, driver_err};
use crate::shader::ShaderBinary;
use super::symbol::{Symbol, SymbolKind};

/// Ordered collection of uniquely named symbols
#[derive(Debug, Clone, Default)]
pub struct SymbolTable<'a> {
    symbols: Vec<Symbol<'a>>,
    names: FxHashMap<String, usize>,
}

impl<'a> SymbolTable<'a> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            names: FxHashMap::default(),
        }
    }

    /// Build a stage table from compiler output
    ///
    /// Every uniform and attribute gets zero-initialized owned storage.
    pub fn from_binary(binary: &ShaderBinary) -> Result<SymbolTable<'static>> {
        let mut table = SymbolTable::new();
        for desc in &binary.symbols {
            let symbol = Symbol::new(
                &desc.name,
                desc.kind,
                desc.element_size,
                desc.element_entries,
                desc.element_count,
                None,
            )?
            .with_address_hint(desc.address_hint)
            .with_stages(binary.stage.flags());
            table.insert(symbol)?;
        }
        Ok(table)
    }

    /// Create a symbol with a private copy of `data` and append it
    ///
    /// `None` zero-initializes the value. Fails with `DuplicateSymbol` if
    /// the name is already present; the table is left unchanged.
    pub fn create(
        &mut self,
        name: &str,
        kind: SymbolKind,
        element_size: u32,
        element_entries: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> Result<&Symbol<'a>> {
        self.ensure_unique(name)?;
        let symbol = Symbol::new(name, kind, element_size, element_entries, element_count, data)?;
        self.push(symbol)
    }

    /// Create a symbol borrowing `data` and append it
    ///
    /// `data` must stay alive as long as the table does.
    pub fn create_borrowed(
        &mut self,
        name: &str,
        kind: SymbolKind,
        element_size: u32,
        element_entries: u32,
        element_count: u32,
        data: &'a [u8],
    ) -> Result<&Symbol<'a>> {
        self.ensure_unique(name)?;
        let symbol = Symbol::new_borrowed(name, kind, element_size, element_entries, element_count, data)?;
        self.push(symbol)
    }

    /// Append an already built symbol
    pub fn insert(&mut self, symbol: Symbol<'a>) -> Result<()> {
        self.ensure_unique(symbol.name())?;
        self.push(symbol)?;
        Ok(())
    }

    /// Look up a symbol by name
    pub fn lookup(&self, name: &str) -> Result<&Symbol<'a>> {
        self.get(name)
            .ok_or_else(|| driver_err!("lima::SymbolTable", Error::SymbolNotFound(name.to_string())))
    }

    /// Look up a symbol by name for modification
    pub fn lookup_mut(&mut self, name: &str) -> Result<&mut Symbol<'a>> {
        match self.names.get(name) {
            Some(&index) => Ok(&mut self.symbols[index]),
            None => driver_bail!("lima::SymbolTable", Error::SymbolNotFound(name.to_string())),
        }
    }

    /// Look up a symbol without logging a miss
    pub fn get(&self, name: &str) -> Option<&Symbol<'a>> {
        self.names.get(name).map(|&index| &self.symbols[index])
    }

    /// Whether a symbol with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Remove a symbol, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Symbol<'a>> {
        let index = self.names.remove(name)?;
        let symbol = self.symbols.remove(index);
        for slot in self.names.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Some(symbol)
    }

    /// Replace a symbol in place, keeping its position
    pub(crate) fn replace(&mut self, symbol: Symbol<'a>) -> Result<()> {
        match self.names.get(symbol.name()) {
            Some(&index) => {
                self.symbols[index] = symbol;
                Ok(())
            }
            None => driver_bail!("lima::SymbolTable", Error::SymbolNotFound(symbol.name().to_string())),
        }
    }

    /// Iterate over symbols in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Symbol<'a>> {
        self.symbols.iter()
    }

    /// Iterate over symbols of one kind
    pub fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol<'a>> {
        self.symbols.iter().filter(move |symbol| symbol.kind() == kind)
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.names.contains_key(name) {
            driver_bail!("lima::SymbolTable", Error::DuplicateSymbol(name.to_string()));
        }
        Ok(())
    }

    fn push(&mut self, symbol: Symbol<'a>) -> Result<&Symbol<'a>> {
        let index = self.symbols.len();
        self.names.insert(symbol.name().to_string(), index);
        self.symbols.push(symbol);
        Ok(&self.symbols[index])
    }
}

#[cfg(test)]
#[path = "symbol_table_tests.rs"]
mod tests;
