/// Compiled shader stage as produced by the external compiler
///
/// The driver never interprets `code`; it only uploads it. The symbol
/// descriptor list is what the symbol table is built from.

use crate::error::Result;
use crate::symbol::{SymbolKind, StageFlags};

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Geometry processor program
    Vertex,
    /// Pixel processor program
    Fragment,
}

impl ShaderStage {
    /// Usage flag for symbols referenced by this stage
    pub fn flags(&self) -> StageFlags {
        match self {
            ShaderStage::Vertex => StageFlags::VERTEX,
            ShaderStage::Fragment => StageFlags::FRAGMENT,
        }
    }
}

/// One symbol entry from the binary's metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDesc {
    pub name: String,
    pub kind: SymbolKind,
    /// Bytes per scalar component
    pub element_size: u32,
    /// Components per element
    pub element_entries: u32,
    /// Array length
    pub element_count: u32,
    /// Location chosen by the compiler, if any
    pub address_hint: Option<u32>,
}

/// Compiled stage: machine code plus ordered symbol metadata
#[derive(Debug, Clone)]
pub struct ShaderBinary {
    pub stage: ShaderStage,
    pub code: Vec<u8>,
    pub symbols: Vec<SymbolDesc>,
}

impl ShaderBinary {
    /// Descriptors of one kind, in binary order
    pub fn symbols_of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &SymbolDesc> {
        self.symbols.iter().filter(move |desc| desc.kind == kind)
    }
}

/// External shader compiler
///
/// Compilation failures are reported as `Error::Compile`.
pub trait ShaderCompiler {
    fn compile(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderBinary>;
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
