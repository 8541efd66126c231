/// Mock kernel for unit tests (no GPU required)
///
/// Host-memory allocations with fake physical addresses, recorded
/// submissions and injectable failures.

use std::time::Duration;
use crate::error::{Error, Result};
use crate::driver_bail;
use super::kernel::{Kernel, KernelMemory, JobId, CompletionStatus};
use super::job_descriptor::JobDescriptor;

/// First fake physical address handed out
pub const MOCK_PHYSICAL_BASE: u64 = 0x4000_0000;

// ============================================================================
// Mock Memory
// ============================================================================

#[derive(Debug)]
pub struct MockMemory {
    pub physical: u64,
    pub bytes: Vec<u8>,
}

impl KernelMemory for MockMemory {
    fn physical_address(&self) -> u64 {
        self.physical
    }

    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset + data.len();
        if end > self.bytes.len() {
            driver_bail!("lima::MockMemory", Error::Backend(format!(
                "write of {} bytes at {} past end of {:#x}", data.len(), offset, self.physical)));
        }
        self.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = offset + dst.len();
        if end > self.bytes.len() {
            driver_bail!("lima::MockMemory", Error::Backend(format!(
                "read of {} bytes at {} past end of {:#x}", dst.len(), offset, self.physical)));
        }
        dst.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }
}

// ============================================================================
// Mock Kernel
// ============================================================================

/// Kernel call, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum KernelEvent {
    Allocate { physical: u64, size: usize },
    Free { physical: u64 },
    /// Physical addresses flushed in one barrier
    Flush(Vec<u64>),
    Submit(JobId),
    Wait(JobId),
}

#[derive(Debug)]
pub struct MockKernel {
    next_physical: u64,
    next_job: u64,
    pub live_allocations: usize,
    pub events: Vec<KernelEvent>,
    pub submissions: Vec<JobDescriptor>,
    /// Fail every allocation once this many have succeeded
    pub allocation_limit: Option<usize>,
    pub reject_submissions: bool,
    /// Status returned by the next `wait` calls
    pub completion: CompletionStatus,
    /// Snapshot of every live allocation at the last submit, by physical address
    pub memory_at_submit: Vec<(u64, Vec<u8>)>,
    allocated: usize,
    snapshots: Vec<(u64, Vec<u8>)>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            next_physical: MOCK_PHYSICAL_BASE,
            next_job: 1,
            live_allocations: 0,
            events: Vec::new(),
            submissions: Vec::new(),
            allocation_limit: None,
            reject_submissions: false,
            completion: CompletionStatus::Success,
            memory_at_submit: Vec::new(),
            allocated: 0,
            snapshots: Vec::new(),
        }
    }

    /// Flush events recorded so far
    pub fn flushes(&self) -> Vec<&Vec<u64>> {
        self.events.iter().filter_map(|event| match event {
            KernelEvent::Flush(addresses) => Some(addresses),
            _ => None,
        }).collect()
    }

    /// Bytes of a flushed region as seen at the most recent submit
    pub fn flushed_bytes(&self, physical: u64) -> Option<&[u8]> {
        self.memory_at_submit.iter()
            .find(|(address, _)| *address == physical)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

impl Kernel for MockKernel {
    fn allocate_physical(&mut self, size: usize) -> Result<Box<dyn KernelMemory>> {
        if let Some(limit) = self.allocation_limit {
            if self.allocated >= limit {
                driver_bail!("lima::MockKernel", Error::Allocation(format!(
                    "out of GPU memory allocating {} bytes", size)));
            }
        }
        let physical = self.next_physical;
        // Page-aligned like the real allocator
        self.next_physical += ((size as u64 + 0xFFF) & !0xFFF).max(0x1000);
        self.allocated += 1;
        self.live_allocations += 1;
        self.events.push(KernelEvent::Allocate { physical, size });
        // Garbage so that zero-initialization by the caller is observable
        Ok(Box::new(MockMemory { physical, bytes: vec![0xCD; size] }))
    }

    fn free_physical(&mut self, memory: Box<dyn KernelMemory>) {
        self.live_allocations -= 1;
        self.events.push(KernelEvent::Free { physical: memory.physical_address() });
    }

    fn flush_caches(&mut self, regions: &[&dyn KernelMemory]) -> Result<()> {
        let mut addresses = Vec::with_capacity(regions.len());
        self.snapshots.clear();
        for region in regions {
            let mut bytes = vec![0u8; region.size()];
            region.read(0, &mut bytes)?;
            addresses.push(region.physical_address());
            self.snapshots.push((region.physical_address(), bytes));
        }
        self.events.push(KernelEvent::Flush(addresses));
        Ok(())
    }

    fn submit(&mut self, job: &JobDescriptor) -> Result<JobId> {
        if self.reject_submissions {
            driver_bail!("lima::MockKernel", Error::Submission("descriptor rejected".to_string()));
        }
        let id = JobId(self.next_job);
        self.next_job += 1;
        self.submissions.push(job.clone());
        self.memory_at_submit = std::mem::take(&mut self.snapshots);
        self.events.push(KernelEvent::Submit(id));
        Ok(id)
    }

    fn wait(&mut self, job: JobId, _timeout: Duration) -> Result<CompletionStatus> {
        self.events.push(KernelEvent::Wait(job));
        Ok(self.completion)
    }
}

#[cfg(test)]
#[path = "mock_kernel_tests.rs"]
mod tests;
