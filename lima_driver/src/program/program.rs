/// Program - a vertex/fragment stage pair and its linked symbol table
///
/// Lifecycle: Unlinked -> Linked on a successful link. A failed link is
/// terminal; the program must be destroyed and recreated.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use slotmap::new_key_type;
use crate::error::{Error, Result};
use crate::{driver_bail, driver_err, driver_info, driver_warn};
use crate::binder::AttributeType;
use crate::memory::{BufferManager, BufferHandle, BufferRole};
use crate::shader::{ShaderBinary, ShaderStage};
use crate::symbol::{SymbolTable, Viewport};
use super::linker::{self, UniformLayout};

new_key_type! {
    /// Stable key for a program owned by a `Context`
    pub struct ProgramHandle;
}

/// Link state of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Unlinked,
    Linked,
    /// Link failed; the program is permanently unusable
    Failed,
}

/// Vertex stream bound to an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub buffer: BufferHandle,
    pub element_type: AttributeType,
    pub components: u32,
    /// Bytes between consecutive vertices
    pub stride: u32,
    /// Complete vertices available in the buffer
    pub vertex_count: u32,
}

/// One attached stage
#[derive(Debug, Clone)]
struct Stage {
    binary: ShaderBinary,
    symbols: SymbolTable<'static>,
}

/// Uploaded machine code of a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCode {
    pub vertex: BufferHandle,
    pub fragment: BufferHandle,
}

#[derive(Debug)]
pub struct Program {
    state: ProgramState,
    vertex: Option<Stage>,
    fragment: Option<Stage>,
    symbols: SymbolTable<'static>,
    layout: Arc<UniformLayout>,
    varying_count: u32,
    builtins_ready: bool,
    code: Option<ProgramCode>,
    attributes: FxHashMap<String, AttributeBinding>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            state: ProgramState::Unlinked,
            vertex: None,
            fragment: None,
            symbols: SymbolTable::new(),
            layout: Arc::new(UniformLayout::default()),
            varying_count: 0,
            builtins_ready: false,
            code: None,
            attributes: FxHashMap::default(),
        }
    }

    // ===== ACCESSORS =====

    pub fn state(&self) -> ProgramState { self.state }

    pub fn is_linked(&self) -> bool {
        self.state == ProgramState::Linked
    }

    /// Merged program table (empty until linked)
    pub fn symbols(&self) -> &SymbolTable<'static> { &self.symbols }

    pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable<'static> { &mut self.symbols }

    /// Symbol table of one attached stage
    pub fn stage_symbols(&self, stage: ShaderStage) -> Option<&SymbolTable<'static>> {
        self.stage(stage).map(|stage| &stage.symbols)
    }

    /// Attached binary of one stage
    pub fn binary(&self, stage: ShaderStage) -> Option<&ShaderBinary> {
        self.stage(stage).map(|stage| &stage.binary)
    }

    fn stage(&self, stage: ShaderStage) -> Option<&Stage> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Fragment => self.fragment.as_ref(),
        }
    }

    /// Uniform block layout, shared with recorded draws
    pub fn layout(&self) -> &Arc<UniformLayout> { &self.layout }

    pub fn varying_count(&self) -> u32 { self.varying_count }

    /// Whether built-in uniforms hold values for the current viewport
    pub fn builtins_ready(&self) -> bool { self.builtins_ready }

    /// Uploaded code buffers (linked programs only)
    pub fn code(&self) -> Option<ProgramCode> { self.code }

    pub fn attribute_binding(&self, name: &str) -> Option<&AttributeBinding> {
        self.attributes.get(name)
    }

    pub fn attribute_bindings(&self) -> impl Iterator<Item = (&str, &AttributeBinding)> {
        self.attributes.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    pub(crate) fn set_attribute_binding(&mut self, name: &str, binding: AttributeBinding) {
        self.attributes.insert(name.to_string(), binding);
    }

    /// Vertices available in every bound stream
    pub fn vertex_limit(&self) -> Option<u32> {
        self.attributes.values().map(|binding| binding.vertex_count).min()
    }

    /// Uniform block with every uniform's current value at its offset
    pub fn uniform_snapshot(&self) -> Vec<u8> {
        self.layout.snapshot(&self.symbols)
    }

    // ===== LIFECYCLE =====

    fn ensure_usable(&self) -> Result<()> {
        if self.state == ProgramState::Failed {
            driver_bail!("lima::Program", Error::Link(
                "Program failed to link and must be recreated".to_string()));
        }
        Ok(())
    }

    /// Attach a compiled stage, replacing any previous one
    ///
    /// A linked program returns to Unlinked and loses its bindings.
    pub fn attach(&mut self, buffers: &mut BufferManager, expected: ShaderStage, binary: ShaderBinary) -> Result<()> {
        self.ensure_usable()?;
        if binary.stage != expected {
            driver_bail!("lima::Program", Error::InvalidArgument(format!(
                "{:?} binary attached as {:?} stage", binary.stage, expected)));
        }

        let symbols = SymbolTable::from_binary(&binary)?;
        if self.state == ProgramState::Linked {
            driver_info!("lima::Program", "Stage replaced, program returns to unlinked");
            self.unlink(buffers)?;
        }

        let stage = Some(Stage { binary, symbols });
        match expected {
            ShaderStage::Vertex => self.vertex = stage,
            ShaderStage::Fragment => self.fragment = stage,
        }
        Ok(())
    }

    /// Link both stages
    ///
    /// A symbol conflict marks the program Failed. Code upload failures
    /// leave it Unlinked.
    pub fn link(&mut self, buffers: &mut BufferManager, viewport: Option<&Viewport>) -> Result<()> {
        self.ensure_usable()?;
        let (vertex, fragment) = match (&self.vertex, &self.fragment) {
            (Some(vertex), Some(fragment)) => (vertex, fragment),
            _ => driver_bail!("lima::Program", Error::InvalidState(
                "Both stages must be attached before linking".to_string())),
        };

        let linked = match linker::link(&vertex.symbols, &fragment.symbols, viewport) {
            Ok(linked) => linked,
            Err(err) => {
                self.state = ProgramState::Failed;
                driver_warn!("lima::Program", "Program is now unusable: {}", err);
                return Err(match err {
                    Error::Link(msg) => Error::Link(msg),
                    other => Error::Link(other.to_string()),
                });
            }
        };

        let vertex_code = Self::upload(buffers, &vertex.binary.code)?;
        let fragment_code = match Self::upload(buffers, &fragment.binary.code) {
            Ok(handle) => handle,
            Err(err) => {
                buffers.free(vertex_code)?;
                return Err(err);
            }
        };

        if self.state == ProgramState::Linked {
            self.unlink(buffers)?;
        }

        self.symbols = linked.symbols;
        self.layout = Arc::new(linked.locations.uniforms);
        self.varying_count = linked.locations.varying_count;
        self.builtins_ready = linked.builtins_ready;
        self.code = Some(ProgramCode { vertex: vertex_code, fragment: fragment_code });
        self.state = ProgramState::Linked;
        Ok(())
    }

    fn upload(buffers: &mut BufferManager, code: &[u8]) -> Result<BufferHandle> {
        if code.is_empty() {
            driver_bail!("lima::Program", Error::InvalidArgument("Shader binary has no code".to_string()));
        }
        let handle = buffers.allocate(BufferRole::Shader, code.len())?;
        if let Err(err) = buffers.write(handle, 0, code) {
            buffers.free(handle)?;
            return Err(err);
        }
        Ok(handle)
    }

    /// Recompute built-ins for a new viewport
    pub fn refresh_builtins(&mut self, viewport: &Viewport) -> Result<()> {
        if !self.is_linked() {
            return Ok(());
        }
        linker::inject_builtins(&mut self.symbols, viewport)?;
        let locations = linker::assign_locations(&mut self.symbols)?;
        self.layout = Arc::new(locations.uniforms);
        self.varying_count = locations.varying_count;
        self.builtins_ready = true;
        Ok(())
    }

    fn unlink(&mut self, buffers: &mut BufferManager) -> Result<()> {
        self.release_buffers(buffers)?;
        self.symbols = SymbolTable::new();
        self.layout = Arc::new(UniformLayout::default());
        self.varying_count = 0;
        self.builtins_ready = false;
        self.state = ProgramState::Unlinked;
        Ok(())
    }

    /// Free code and vertex buffers (deferred while recorded draws use them)
    pub(crate) fn release_buffers(&mut self, buffers: &mut BufferManager) -> Result<()> {
        if let Some(code) = self.code.take() {
            buffers.free(code.vertex)?;
            buffers.free(code.fragment)?;
        }
        for (_, binding) in self.attributes.drain() {
            if buffers.is_valid(binding.buffer) {
                buffers.free(binding.buffer)?;
            }
        }
        Ok(())
    }

    /// Link state error for draw-time checks
    pub(crate) fn require_linked(&self) -> Result<()> {
        if !self.is_linked() {
            return Err(driver_err!("lima::Program", Error::UnboundProgram(
                format!("Program is {:?}", self.state))));
        }
        Ok(())
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
