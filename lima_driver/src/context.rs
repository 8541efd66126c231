/// Context - the draw-time API of one driver instance
///
/// Owns every program and buffer it creates. One thread drives a context
/// through `state_setup -> frame_new -> draw_arrays* -> frame_flush ->
/// buffer_swap`. Any error while a frame is open discards that frame.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::{driver_bail, driver_err, driver_info, driver_warn};
use crate::binder::{self, AttributeType};
use crate::job::{AssemblerState, AttributeSnapshot, DrawCommand, FrameSetup, Job, JobAssembler, Topology};
use crate::kernel::{Kernel, KernelMemory, Submitter};
use crate::memory::{BufferManager, FramebufferPair, UniformArena};
use crate::program::{Program, ProgramHandle};
use crate::shader::{ShaderBinary, ShaderCompiler, ShaderStage};
use crate::symbol::Viewport;

/// Context configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Framebuffer width in pixels
    pub width: u32,
    /// Framebuffer height in pixels
    pub height: u32,
    /// Bytes of uniform snapshots one frame can record
    pub uniform_arena_size: usize,
    /// How long `frame_flush` waits for the hardware
    pub submit_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            uniform_arena_size: 64 * 1024,
            submit_timeout: Duration::from_secs(1),
        }
    }
}

pub struct Context {
    config: Config,
    buffers: BufferManager,
    framebuffers: FramebufferPair,
    arena: UniformArena,
    submitter: Submitter,
    assembler: JobAssembler,
    programs: SlotMap<ProgramHandle, Program>,
    current_program: Option<ProgramHandle>,
    viewport: Option<Viewport>,
}

impl Context {
    /// Allocate the framebuffer pair and uniform arena
    pub fn new(kernel: Arc<Mutex<dyn Kernel>>, config: Config) -> Result<Self> {
        let mut buffers = BufferManager::new(kernel.clone());
        let framebuffers = FramebufferPair::new(&mut buffers, config.width, config.height)?;
        let arena = match UniformArena::new(&mut buffers, config.uniform_arena_size) {
            Ok(arena) => arena,
            Err(err) => {
                buffers.release_all()?;
                return Err(err);
            }
        };

        driver_info!("lima::Context", "Context created: {}x{} framebuffer, {} byte uniform arena",
            config.width, config.height, config.uniform_arena_size);

        Ok(Self {
            submitter: Submitter::new(kernel, config.submit_timeout),
            config,
            buffers,
            framebuffers,
            arena,
            assembler: JobAssembler::new(),
            programs: SlotMap::with_key(),
            current_program: None,
            viewport: None,
        })
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &Config { &self.config }

    pub fn state(&self) -> AssemblerState { self.assembler.state() }

    pub fn buffers(&self) -> &BufferManager { &self.buffers }

    pub fn framebuffers(&self) -> &FramebufferPair { &self.framebuffers }

    /// Viewport of the last state setup
    pub fn viewport(&self) -> Option<&Viewport> { self.viewport.as_ref() }

    pub fn current_program(&self) -> Option<ProgramHandle> { self.current_program }

    /// Job of the last successful flush
    pub fn last_job(&self) -> Option<&Job> { self.assembler.last_job() }

    /// Job of the open frame
    pub fn current_job(&self) -> Option<&Job> { self.assembler.current_job() }

    pub fn program(&self, handle: ProgramHandle) -> Result<&Program> {
        self.programs.get(handle)
            .ok_or_else(|| driver_err!("lima::Context", Error::InvalidArgument(
                format!("Unknown program handle {:?}", handle))))
    }

    fn program_mut(&mut self, handle: ProgramHandle) -> Result<&mut Program> {
        match self.programs.get_mut(handle) {
            Some(program) => Ok(program),
            None => driver_bail!("lima::Context", Error::InvalidArgument(
                format!("Unknown program handle {:?}", handle))),
        }
    }

    // ===== FRAME ABORT =====

    /// Discard the open frame and release what its draws pinned
    fn abort_frame(&mut self, job: Option<Job>) {
        if let Some(job) = self.assembler.abort(job) {
            self.unpin_draws(&job);
            self.framebuffers.invalidate_back();
        }
    }

    fn unpin_draws(&mut self, job: &Job) {
        for handle in job.draws().iter().flat_map(|draw| draw.buffers()) {
            if let Err(err) = self.buffers.unpin(handle) {
                driver_warn!("lima::Context", "Unpin after frame failed: {}", err);
            }
        }
    }

    /// Abort the open frame when `result` is an error
    fn frame_guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.abort_frame(None);
        }
        result
    }

    // ===== PROGRAMS =====

    /// Create an empty program and make it current
    pub fn program_new(&mut self) -> Result<ProgramHandle> {
        self.assembler.ensure_active("program_new")?;
        let handle = self.programs.insert(Program::new());
        self.current_program = Some(handle);
        Ok(handle)
    }

    /// Select the program used by `draw_arrays`
    pub fn use_program(&mut self, handle: ProgramHandle) -> Result<()> {
        let result = self.assembler.ensure_active("use_program")
            .and_then(|_| self.program(handle).map(|_| ()));
        self.frame_guard(result)?;
        self.current_program = Some(handle);
        Ok(())
    }

    /// Destroy a program and free its buffers
    ///
    /// Buffers still used by recorded draws are freed after the flush.
    pub fn program_destroy(&mut self, handle: ProgramHandle) -> Result<()> {
        self.assembler.ensure_active("program_destroy")?;
        let mut program = match self.programs.remove(handle) {
            Some(program) => program,
            None => driver_bail!("lima::Context", Error::InvalidArgument(
                format!("Unknown program handle {:?}", handle))),
        };
        if self.current_program == Some(handle) {
            self.current_program = None;
        }
        program.release_buffers(&mut self.buffers)
    }

    fn attach(&mut self, handle: ProgramHandle, stage: ShaderStage, binary: ShaderBinary) -> Result<()> {
        self.assembler.ensure_active("shader_attach")?;
        let Self { programs, buffers, .. } = self;
        let result = match programs.get_mut(handle) {
            Some(program) => program.attach(buffers, stage, binary),
            None => Err(driver_err!("lima::Context", Error::InvalidArgument(
                format!("Unknown program handle {:?}", handle)))),
        };
        self.frame_guard(result)
    }

    /// Attach a compiled vertex stage
    pub fn vertex_shader_attach(&mut self, handle: ProgramHandle, binary: ShaderBinary) -> Result<()> {
        self.attach(handle, ShaderStage::Vertex, binary)
    }

    /// Attach a compiled fragment stage
    pub fn fragment_shader_attach(&mut self, handle: ProgramHandle, binary: ShaderBinary) -> Result<()> {
        self.attach(handle, ShaderStage::Fragment, binary)
    }

    /// Compile `source` with an external compiler and attach the result
    pub fn compile_shader_attach(
        &mut self,
        handle: ProgramHandle,
        compiler: &mut dyn ShaderCompiler,
        stage: ShaderStage,
        source: &str,
    ) -> Result<()> {
        self.assembler.ensure_active("compile_shader_attach")?;
        let binary = compiler.compile(stage, source);
        let binary = self.frame_guard(binary)?;
        self.attach(handle, stage, binary)
    }

    /// Link a program; built-ins are injected now if the viewport is known
    pub fn link(&mut self, handle: ProgramHandle) -> Result<()> {
        self.assembler.ensure_active("link")?;
        let Self { programs, buffers, viewport, .. } = self;
        let result = match programs.get_mut(handle) {
            Some(program) => program.link(buffers, viewport.as_ref()),
            None => Err(driver_err!("lima::Context", Error::InvalidArgument(
                format!("Unknown program handle {:?}", handle)))),
        };
        self.frame_guard(result)
    }

    // ===== BINDINGS =====

    /// Bind a vertex stream to a named attribute
    ///
    /// `stride` counts elements between vertices, 0 for tightly packed.
    pub fn bind_attribute(
        &mut self,
        handle: ProgramHandle,
        name: &str,
        element_type: AttributeType,
        component_count: u32,
        stride: u32,
        source: &[u8],
    ) -> Result<()> {
        self.assembler.ensure_active("bind_attribute")?;
        let Self { programs, buffers, .. } = self;
        let result = match programs.get_mut(handle) {
            Some(program) => binder::bind_attribute(program, buffers, name, element_type, component_count, stride, source),
            None => Err(driver_err!("lima::Context", Error::InvalidArgument(
                format!("Unknown program handle {:?}", handle)))),
        };
        self.frame_guard(result)
    }

    /// Bind tightly or loosely packed f32 data to a named attribute
    pub fn bind_attribute_f32(
        &mut self,
        handle: ProgramHandle,
        name: &str,
        component_count: u32,
        stride: u32,
        source: &[f32],
    ) -> Result<()> {
        self.bind_attribute(handle, name, AttributeType::Float, component_count, stride,
            bytemuck::cast_slice(source))
    }

    /// Write uniform values by name
    pub fn attach_uniform(&mut self, handle: ProgramHandle, name: &str, entries: u32, data: &[f32]) -> Result<()> {
        self.assembler.ensure_active("attach_uniform")?;
        let result = self.program_mut(handle)
            .and_then(|program| binder::attach_uniform(program, name, entries, data));
        self.frame_guard(result)
    }

    // ===== FRAME =====

    /// Record viewport and clear colour
    ///
    /// A dimension of 0 means the full framebuffer. Refreshes the built-in
    /// uniforms of every linked program.
    pub fn state_setup(&mut self, width: u32, height: u32, clear_color: u32) -> Result<()> {
        let result = self.state_setup_inner(width, height, clear_color);
        self.frame_guard(result)
    }

    fn state_setup_inner(&mut self, width: u32, height: u32, clear_color: u32) -> Result<()> {
        self.assembler.ensure_active("state_setup")?;
        let width = if width == 0 { self.framebuffers.width() } else { width };
        let height = if height == 0 { self.framebuffers.height() } else { height };
        if width > self.framebuffers.width() || height > self.framebuffers.height() {
            driver_bail!("lima::Context", Error::InvalidArgument(format!(
                "Viewport {}x{} exceeds framebuffer {}x{}",
                width, height, self.framebuffers.width(), self.framebuffers.height())));
        }

        let viewport = Viewport::from_size(width, height);
        viewport.validate()?;
        self.assembler.state_setup(FrameSetup { viewport, width, height, clear_color })?;
        self.viewport = Some(viewport);

        for program in self.programs.values_mut() {
            program.refresh_builtins(&viewport)?;
        }
        Ok(())
    }

    /// Open a frame; resets the uniform arena
    pub fn frame_new(&mut self) -> Result<()> {
        self.assembler.ensure_active("frame_new")?;
        let result = self.assembler.frame_new(self.framebuffers.back(), self.arena.buffer());
        self.frame_guard(result)?;
        self.arena.reset();
        self.framebuffers.invalidate_back();
        Ok(())
    }

    /// Record a draw of `count` vertices starting at `first`
    ///
    /// The current program's uniform values are snapshotted now.
    pub fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) -> Result<()> {
        let result = self.draw_arrays_inner(topology, first, count);
        self.frame_guard(result)
    }

    fn draw_arrays_inner(&mut self, topology: Topology, first: u32, count: u32) -> Result<()> {
        self.assembler.require_frame_open("draw_arrays")?;

        let handle = match self.current_program {
            Some(handle) => handle,
            None => driver_bail!("lima::Context", Error::UnboundProgram("No program in use".to_string())),
        };
        let program = self.program(handle)?;
        program.require_linked()?;
        let code = match program.code() {
            Some(code) => code,
            None => driver_bail!("lima::Context", Error::UnboundProgram("Program has no code".to_string())),
        };
        let limit = match program.vertex_limit() {
            Some(limit) => limit,
            None => driver_bail!("lima::Context", Error::UnboundProgram(
                "Program has no bound attribute supplying positions".to_string())),
        };
        if !program.builtins_ready() {
            driver_bail!("lima::Context", Error::InvalidState(
                "Built-in uniforms are missing; call state_setup first".to_string()));
        }

        if count == 0 {
            driver_bail!("lima::Context", Error::InvalidArgument("Draw of zero vertices".to_string()));
        }
        match first.checked_add(count) {
            Some(end) if end <= limit => {}
            _ => driver_bail!("lima::Context", Error::InvalidArgument(format!(
                "Vertices {}..{} exceed the {} bound vertices", first, first as u64 + count as u64, limit))),
        }

        let mut attributes = Vec::new();
        for (name, binding) in program.attribute_bindings() {
            let slot = program.symbols().lookup(name)?.location().unwrap_or(0);
            attributes.push(AttributeSnapshot {
                name: name.to_string(),
                slot,
                buffer: binding.buffer,
                element_type: binding.element_type,
                components: binding.components,
                stride: binding.stride,
            });
        }
        attributes.sort_by_key(|attribute| attribute.slot);

        let layout = program.layout().clone();
        let uniforms = program.uniform_snapshot();
        let varying_count = program.varying_count();
        let uniform_offset = self.arena.push(&mut self.buffers, &uniforms)?;

        let draw = DrawCommand {
            program: handle,
            topology,
            first,
            count,
            code,
            varying_count,
            attributes,
            layout,
            uniforms,
            uniform_offset,
        };

        let mut pinned = Vec::new();
        for buffer in draw.buffers() {
            if let Err(err) = self.buffers.pin(buffer) {
                for done in pinned {
                    if let Err(unpin_err) = self.buffers.unpin(done) {
                        driver_warn!("lima::Context", "Unpin after failed pin: {}", unpin_err);
                    }
                }
                return Err(err);
            }
            pinned.push(buffer);
        }
        self.assembler.record(draw)
    }

    /// Submit the frame and block until the hardware completes it
    pub fn frame_flush(&mut self) -> Result<()> {
        self.assembler.ensure_active("frame_flush")?;
        let job = match self.assembler.begin_flush() {
            Ok(job) => job,
            Err(err) => {
                self.abort_frame(None);
                return Err(err);
            }
        };

        match self.submit(&job) {
            Ok(()) => {
                self.unpin_draws(&job);
                self.framebuffers.mark_back_ready();
                self.assembler.complete_flush(job);
                Ok(())
            }
            Err(err) => {
                driver_warn!("lima::Context", "Frame not presented: {}", err);
                self.abort_frame(Some(job));
                Err(err)
            }
        }
    }

    fn submit(&self, job: &Job) -> Result<()> {
        let descriptor = job.to_descriptor(&self.buffers, &self.framebuffers)?;
        let regions = job.referenced_buffers().into_iter()
            .map(|handle| self.buffers.memory(handle))
            .collect::<Result<Vec<&dyn KernelMemory>>>()?;
        self.submitter.submit_and_wait(&descriptor, &regions)?;
        Ok(())
    }

    /// Present the completed back buffer
    pub fn buffer_swap(&mut self) -> Result<()> {
        let result = self.buffer_swap_inner();
        self.frame_guard(result)
    }

    fn buffer_swap_inner(&mut self) -> Result<()> {
        self.assembler.ensure_active("buffer_swap")?;
        if self.assembler.state() != AssemblerState::Idle {
            driver_bail!("lima::Context", Error::InvalidState(format!(
                "buffer_swap is not valid in state {:?}", self.assembler.state())));
        }
        self.framebuffers.swap()
    }

    /// Zero-fill the back buffer outside a frame
    pub fn buffer_clear(&mut self) -> Result<()> {
        let result = self.buffer_clear_inner();
        self.frame_guard(result)
    }

    fn buffer_clear_inner(&mut self) -> Result<()> {
        self.assembler.ensure_active("buffer_clear")?;
        match self.assembler.state() {
            AssemblerState::Idle | AssemblerState::Configuring => {}
            state => driver_bail!("lima::Context", Error::InvalidState(format!(
                "buffer_clear is not valid in state {:?}", state))),
        }
        self.buffers.fill(self.framebuffers.back(), 0)?;
        self.framebuffers.invalidate_back();
        Ok(())
    }

    /// Release every program and buffer; the context is unusable afterwards
    pub fn finish(&mut self) -> Result<()> {
        let result = self.assembler.finish();
        self.frame_guard(result)?;
        self.programs.clear();
        self.current_program = None;
        self.buffers.release_all()?;
        driver_info!("lima::Context", "Context finished");
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.assembler.state() != AssemblerState::Finished {
            if let Err(err) = self.buffers.release_all() {
                driver_warn!("lima::Context", "Release on drop failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
