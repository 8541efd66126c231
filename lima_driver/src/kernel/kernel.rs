/// Kernel trait - transport to the in-kernel GPU driver
///
/// Implemented by the ioctl glue of a real system and by test doubles.
/// The driver core only sees opaque memory objects and job ids.

use std::fmt;
use std::time::Duration;
use crate::error::Result;
use super::job_descriptor::JobDescriptor;

/// Identifier returned by `Kernel::submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Outcome reported by the hardware for a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    /// The job hit an MMU or pipeline fault
    Fault,
    /// The job did not complete within the wait timeout
    Timeout,
}

/// One physically contiguous, CPU-mapped allocation
pub trait KernelMemory: Send {
    /// Address the hardware uses to reach this memory
    fn physical_address(&self) -> u64;

    /// Size in bytes
    fn size(&self) -> usize;

    /// Copy `data` into the mapping at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;

    /// Copy from the mapping at `offset` into `dst`
    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()>;
}

/// In-kernel GPU driver interface
pub trait Kernel: Send {
    /// Allocate GPU-visible memory. Fails with `Error::Allocation`.
    fn allocate_physical(&mut self, size: usize) -> Result<Box<dyn KernelMemory>>;

    /// Release a mapping returned by `allocate_physical`
    fn free_physical(&mut self, memory: Box<dyn KernelMemory>);

    /// Make CPU writes to these regions visible to the GPU
    fn flush_caches(&mut self, regions: &[&dyn KernelMemory]) -> Result<()>;

    /// Queue a job. Fails with `Error::Submission` on a rejected descriptor.
    fn submit(&mut self, job: &JobDescriptor) -> Result<JobId>;

    /// Block until the job completes or `timeout` elapses
    fn wait(&mut self, job: JobId, timeout: Duration) -> Result<CompletionStatus>;
}
