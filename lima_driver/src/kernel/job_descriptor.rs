/// Job descriptor - plain data handed to the kernel on flush
///
/// Every address here is a physical address. This is the only place where
/// addresses leave the buffer manager.

use crate::binder::AttributeType;
use crate::job::Topology;
use crate::symbol::Viewport;

/// Render target of the job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramebufferTarget {
    pub address: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub pitch: u32,
}

/// Machine code location of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRef {
    pub address: u64,
    pub size: u32,
}

/// Uniform block snapshot of one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlockRef {
    pub address: u64,
    pub size: u32,
}

/// Uniform read by fixed-function hardware through its own address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedUniformRef {
    /// Byte offset inside the draw's uniform block
    pub offset: u32,
    pub address: u64,
    pub size: u32,
}

/// One vertex attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub slot: u32,
    pub address: u64,
    /// Bytes between consecutive vertices
    pub stride: u32,
    pub components: u32,
    pub element_type: AttributeType,
}

/// One draw command
#[derive(Debug, Clone, PartialEq)]
pub struct DrawDescriptor {
    pub topology: Topology,
    pub first: u32,
    pub count: u32,
    pub vertex_shader: CodeRef,
    pub fragment_shader: CodeRef,
    pub uniforms: UniformBlockRef,
    pub fixed_uniforms: Vec<FixedUniformRef>,
    pub varying_count: u32,
    pub attributes: Vec<AttributeDescriptor>,
}

/// A complete frame as submitted to the kernel
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub framebuffer: FramebufferTarget,
    pub viewport: Viewport,
    /// Packed 0xAARRGGBB
    pub clear_color: u32,
    pub draws: Vec<DrawDescriptor>,
}

impl JobDescriptor {
    /// Total vertices across every draw
    pub fn vertex_total(&self) -> u64 {
        self.draws.iter().map(|draw| draw.count as u64).sum()
    }
}
