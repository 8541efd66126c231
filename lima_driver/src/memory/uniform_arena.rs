/// Per-frame linear allocator for uniform block snapshots
///
/// One Uniform-role buffer is carved up front to back and rewound at every
/// `frame_new`. Snapshots never move once written.

use crate::error::{Error, Result};
use crate::driver_bail;
use super::buffer_manager::{BufferManager, BufferHandle, BufferRole};

/// Alignment of every snapshot (one vec4)
pub const UNIFORM_ALIGNMENT: usize = 16;

/// Round `value` up to a multiple of `alignment` (power of two)
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[derive(Debug)]
pub struct UniformArena {
    buffer: BufferHandle,
    capacity: usize,
    cursor: usize,
}

impl UniformArena {
    pub fn new(buffers: &mut BufferManager, capacity: usize) -> Result<Self> {
        let buffer = buffers.allocate(BufferRole::Uniform, capacity)?;
        Ok(Self { buffer, capacity, cursor: 0 })
    }

    /// Backing buffer
    pub fn buffer(&self) -> BufferHandle { self.buffer }

    pub fn capacity(&self) -> usize { self.capacity }

    /// Bytes handed out so far, including padding
    pub fn used(&self) -> usize { self.cursor }

    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Rewind to the start
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Reserve `size` bytes and return their offset
    pub fn alloc(&mut self, size: usize) -> Result<usize> {
        let offset = align_up(self.cursor, UNIFORM_ALIGNMENT);
        let end = offset.saturating_add(size);
        if end > self.capacity {
            driver_bail!("lima::UniformArena", Error::Allocation(format!(
                "Uniform arena exhausted: {} bytes requested, {} of {} used",
                size, self.cursor, self.capacity)));
        }
        self.cursor = end;
        Ok(offset)
    }

    /// Reserve space for `data` and copy it in
    pub fn push(&mut self, buffers: &mut BufferManager, data: &[u8]) -> Result<usize> {
        let offset = self.alloc(data.len())?;
        buffers.write(self.buffer, offset, data)?;
        Ok(offset)
    }
}

#[cfg(test)]
#[path = "uniform_arena_tests.rs"]
mod tests;
