/// Job - one frame of recorded draws
///
/// A job is mutable while its frame is open and read-only once submitted.
/// Each draw owns a snapshot of the uniform block taken when it was
/// recorded, so later uniform writes never reach an earlier draw.

use std::sync::Arc;
use crate::error::Result;
use crate::binder::AttributeType;
use crate::kernel::{
    AttributeDescriptor, CodeRef, DrawDescriptor, FixedUniformRef,
    FramebufferTarget, JobDescriptor, UniformBlockRef,
};
use crate::memory::{BufferHandle, BufferManager, FramebufferPair};
use crate::program::{ProgramCode, ProgramHandle, UniformLayout};
use crate::symbol::Viewport;

// ===== TOPOLOGY =====

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    /// Map a GLES primitive enum (GL_POINTS .. GL_TRIANGLE_FAN)
    pub fn from_gl(mode: u32) -> Option<Self> {
        match mode {
            0x0000 => Some(Topology::Points),
            0x0001 => Some(Topology::Lines),
            0x0002 => Some(Topology::LineLoop),
            0x0003 => Some(Topology::LineStrip),
            0x0004 => Some(Topology::Triangles),
            0x0005 => Some(Topology::TriangleStrip),
            0x0006 => Some(Topology::TriangleFan),
            _ => None,
        }
    }
}

// ===== DRAW COMMAND =====

/// Attribute stream as bound when the draw was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSnapshot {
    pub name: String,
    pub slot: u32,
    pub buffer: BufferHandle,
    pub element_type: AttributeType,
    pub components: u32,
    pub stride: u32,
}

/// One recorded draw
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub program: ProgramHandle,
    pub topology: Topology,
    pub first: u32,
    pub count: u32,
    pub code: ProgramCode,
    pub varying_count: u32,
    pub attributes: Vec<AttributeSnapshot>,
    /// Uniform block layout of the program at record time
    pub layout: Arc<UniformLayout>,
    /// Uniform block contents at record time
    pub uniforms: Vec<u8>,
    /// Offset of the block in the frame's uniform arena
    pub uniform_offset: usize,
}

impl DrawCommand {
    /// Snapshot bytes of one uniform
    pub fn uniform(&self, name: &str) -> Option<&[u8]> {
        let slot = self.layout.slot(name)?;
        let start = slot.offset as usize;
        self.uniforms.get(start..start + slot.size as usize)
    }

    /// Snapshot of one uniform as f32 values
    pub fn uniform_f32(&self, name: &str, count: usize) -> Option<Vec<f32>> {
        let bytes = self.uniform(name)?.get(..count * 4)?;
        Some(bytes.chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Every buffer the draw reads
    pub fn buffers(&self) -> impl Iterator<Item = BufferHandle> + '_ {
        [self.code.vertex, self.code.fragment].into_iter()
            .chain(self.attributes.iter().map(|attribute| attribute.buffer))
    }
}

// ===== JOB =====

/// One frame of work
#[derive(Debug, Clone)]
pub struct Job {
    pub viewport: Viewport,
    /// Packed 0xAARRGGBB
    pub clear_color: u32,
    pub framebuffer: BufferHandle,
    pub uniform_arena: BufferHandle,
    draws: Vec<DrawCommand>,
}

impl Job {
    pub fn new(viewport: Viewport, clear_color: u32, framebuffer: BufferHandle, uniform_arena: BufferHandle) -> Self {
        Self {
            viewport,
            clear_color,
            framebuffer,
            uniform_arena,
            draws: Vec::new(),
        }
    }

    /// Recorded draws in submission order
    pub fn draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    pub(crate) fn push(&mut self, draw: DrawCommand) {
        self.draws.push(draw);
    }

    /// Every buffer the job reads or writes, without duplicates
    pub fn referenced_buffers(&self) -> Vec<BufferHandle> {
        let mut handles = vec![self.framebuffer, self.uniform_arena];
        for handle in self.draws.iter().flat_map(|draw| draw.buffers()) {
            if !handles.contains(&handle) {
                handles.push(handle);
            }
        }
        handles
    }

    /// Encode the job with physical addresses
    ///
    /// The render target geometry comes from `target`; the viewport only
    /// restricts where draws land inside it.
    pub fn to_descriptor(&self, buffers: &BufferManager, target: &FramebufferPair) -> Result<JobDescriptor> {
        let arena = buffers.physical_address(self.uniform_arena)?;

        let mut draws = Vec::with_capacity(self.draws.len());
        for draw in &self.draws {
            let block = arena + draw.uniform_offset as u64;
            let attributes = draw.attributes.iter()
                .map(|attribute| Ok(AttributeDescriptor {
                    slot: attribute.slot,
                    address: buffers.physical_address(attribute.buffer)?,
                    stride: attribute.stride,
                    components: attribute.components,
                    element_type: attribute.element_type,
                }))
                .collect::<Result<Vec<_>>>()?;
            let fixed_uniforms = draw.layout.slots().iter()
                .filter(|slot| slot.physical)
                .map(|slot| FixedUniformRef {
                    offset: slot.offset,
                    address: block + slot.offset as u64,
                    size: slot.size,
                })
                .collect();

            draws.push(DrawDescriptor {
                topology: draw.topology,
                first: draw.first,
                count: draw.count,
                vertex_shader: CodeRef {
                    address: buffers.physical_address(draw.code.vertex)?,
                    size: buffers.size(draw.code.vertex)? as u32,
                },
                fragment_shader: CodeRef {
                    address: buffers.physical_address(draw.code.fragment)?,
                    size: buffers.size(draw.code.fragment)? as u32,
                },
                uniforms: UniformBlockRef { address: block, size: draw.uniforms.len() as u32 },
                fixed_uniforms,
                varying_count: draw.varying_count,
                attributes,
            });
        }

        Ok(JobDescriptor {
            framebuffer: FramebufferTarget {
                address: buffers.physical_address(self.framebuffer)?,
                width: target.width(),
                height: target.height(),
                pitch: target.pitch(),
            },
            viewport: self.viewport,
            clear_color: self.clear_color,
            draws,
        })
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
