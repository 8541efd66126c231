/// Buffer manager - owns every GPU-visible allocation of a context
///
/// Callers hold opaque `BufferHandle`s. Physical addresses are only read
/// when the job descriptor is built.

use std::sync::{Arc, Mutex, MutexGuard};
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::{driver_bail, driver_err, driver_debug, driver_trace};
use crate::kernel::{Kernel, KernelMemory};

new_key_type! {
    /// Stable key for a buffer owned by a `BufferManager`
    pub struct BufferHandle;
}

/// What a buffer is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    /// Attribute streams
    Vertex,
    /// Uniform blocks
    Uniform,
    /// Render targets
    Framebuffer,
    /// Uploaded shader machine code
    Shader,
}

struct BufferEntry {
    role: BufferRole,
    memory: Box<dyn KernelMemory>,
    /// Recorded draws referencing this buffer
    pins: u32,
    /// Freed by its owner, released on last unpin
    retired: bool,
}

/// Owner of all buffers of one context
pub struct BufferManager {
    kernel: Arc<Mutex<dyn Kernel>>,
    buffers: SlotMap<BufferHandle, BufferEntry>,
}

impl BufferManager {
    pub fn new(kernel: Arc<Mutex<dyn Kernel>>) -> Self {
        Self {
            kernel,
            buffers: SlotMap::with_key(),
        }
    }

    /// Kernel shared with the submitter
    pub fn kernel(&self) -> &Arc<Mutex<dyn Kernel>> {
        &self.kernel
    }

    fn lock_kernel(kernel: &Arc<Mutex<dyn Kernel>>) -> Result<MutexGuard<'_, dyn Kernel + 'static>> {
        kernel.lock()
            .map_err(|_| driver_err!("lima::BufferManager", Error::Backend("kernel lock poisoned".to_string())))
    }

    /// Allocate a zero-initialized buffer
    ///
    /// On failure nothing is registered.
    pub fn allocate(&mut self, role: BufferRole, size: usize) -> Result<BufferHandle> {
        if size == 0 {
            driver_bail!("lima::BufferManager", Error::InvalidArgument(
                format!("Zero-sized {:?} buffer", role)));
        }

        let mut kernel = Self::lock_kernel(&self.kernel)?;
        let mut memory = kernel.allocate_physical(size)?;
        if memory.size() < size {
            kernel.free_physical(memory);
            driver_bail!("lima::BufferManager", Error::Allocation(format!(
                "Kernel returned a short allocation for {} bytes", size)));
        }
        if let Err(err) = memory.write(0, &vec![0u8; memory.size()]) {
            kernel.free_physical(memory);
            return Err(err);
        }
        drop(kernel);

        driver_debug!("lima::BufferManager", "Allocated {:?} buffer: {} bytes at {:#x}",
            role, size, memory.physical_address());

        Ok(self.buffers.insert(BufferEntry {
            role,
            memory,
            pins: 0,
            retired: false,
        }))
    }

    fn entry(&self, handle: BufferHandle) -> Result<&BufferEntry> {
        match self.buffers.get(handle) {
            Some(entry) if !entry.retired => Ok(entry),
            _ => driver_bail!("lima::BufferManager", Error::InvalidArgument(
                format!("Unknown buffer handle {:?}", handle))),
        }
    }

    /// Like `entry`, but retired buffers stay reachable until their last unpin
    fn pinned_entry(&self, handle: BufferHandle) -> Result<&BufferEntry> {
        match self.buffers.get(handle) {
            Some(entry) if !entry.retired || entry.pins > 0 => Ok(entry),
            _ => driver_bail!("lima::BufferManager", Error::InvalidArgument(
                format!("Unknown buffer handle {:?}", handle))),
        }
    }

    fn entry_mut(&mut self, handle: BufferHandle) -> Result<&mut BufferEntry> {
        match self.buffers.get_mut(handle) {
            Some(entry) if !entry.retired => Ok(entry),
            _ => driver_bail!("lima::BufferManager", Error::InvalidArgument(
                format!("Unknown buffer handle {:?}", handle))),
        }
    }

    fn check_range(handle: BufferHandle, size: usize, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => driver_bail!("lima::BufferManager", Error::InvalidArgument(format!(
                "Range {}..{} out of bounds of buffer {:?} ({} bytes)",
                offset, offset.saturating_add(len), handle, size))),
        }
    }

    /// Copy `data` into the buffer at `offset`
    pub fn write(&mut self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        Self::check_range(handle, entry.memory.size(), offset, data.len())?;
        entry.memory.write(offset, data)
    }

    /// Fill the whole buffer with one byte value
    pub fn fill(&mut self, handle: BufferHandle, value: u8) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        let size = entry.memory.size();
        entry.memory.write(0, &vec![value; size])
    }

    /// Read `len` bytes at `offset`
    pub fn read(&self, handle: BufferHandle, offset: usize, len: usize) -> Result<Vec<u8>> {
        let entry = self.entry(handle)?;
        Self::check_range(handle, entry.memory.size(), offset, len)?;
        let mut bytes = vec![0u8; len];
        entry.memory.read(offset, &mut bytes)?;
        Ok(bytes)
    }

    /// Hardware address of the buffer start
    ///
    /// Freed buffers still pinned by recorded draws keep their address.
    pub fn physical_address(&self, handle: BufferHandle) -> Result<u64> {
        Ok(self.pinned_entry(handle)?.memory.physical_address())
    }

    pub fn size(&self, handle: BufferHandle) -> Result<usize> {
        Ok(self.pinned_entry(handle)?.memory.size())
    }

    pub fn role(&self, handle: BufferHandle) -> Result<BufferRole> {
        Ok(self.entry(handle)?.role)
    }

    /// Number of recorded draws referencing the buffer
    pub fn pin_count(&self, handle: BufferHandle) -> u32 {
        self.buffers.get(handle).map(|entry| entry.pins).unwrap_or(0)
    }

    /// Whether the handle refers to a live, not-retired buffer
    pub fn is_valid(&self, handle: BufferHandle) -> bool {
        self.buffers.get(handle).map(|entry| !entry.retired).unwrap_or(false)
    }

    /// Live buffers (retired ones excluded)
    pub fn len(&self) -> usize {
        self.buffers.values().filter(|entry| !entry.retired).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapping of a buffer, for cache maintenance
    pub(crate) fn memory(&self, handle: BufferHandle) -> Result<&dyn KernelMemory> {
        Ok(self.pinned_entry(handle)?.memory.as_ref())
    }

    /// Keep the buffer alive while a recorded draw references it
    pub fn pin(&mut self, handle: BufferHandle) -> Result<()> {
        self.entry_mut(handle)?.pins += 1;
        Ok(())
    }

    /// Drop one reference; releases a retired buffer on its last unpin
    pub fn unpin(&mut self, handle: BufferHandle) -> Result<()> {
        let release = match self.buffers.get_mut(handle) {
            Some(entry) if entry.pins > 0 => {
                entry.pins -= 1;
                entry.retired && entry.pins == 0
            }
            _ => driver_bail!("lima::BufferManager", Error::InvalidState(
                format!("Unpin of unpinned buffer {:?}", handle))),
        };
        if release {
            self.release(handle)?;
        }
        Ok(())
    }

    /// Free a buffer, deferred while pinned
    pub fn free(&mut self, handle: BufferHandle) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        if entry.pins > 0 {
            entry.retired = true;
            driver_trace!("lima::BufferManager", "Deferred free of pinned buffer {:?}", handle);
            return Ok(());
        }
        self.release(handle)
    }

    fn release(&mut self, handle: BufferHandle) -> Result<()> {
        if let Some(entry) = self.buffers.remove(handle) {
            Self::lock_kernel(&self.kernel)?.free_physical(entry.memory);
        }
        Ok(())
    }

    /// Release every buffer regardless of pins
    pub fn release_all(&mut self) -> Result<()> {
        let mut kernel = Self::lock_kernel(&self.kernel)?;
        for (_, entry) in self.buffers.drain() {
            kernel.free_physical(entry.memory);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "buffer_manager_tests.rs"]
mod tests;
