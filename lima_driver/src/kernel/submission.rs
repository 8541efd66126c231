/// Submission - ships a job to the kernel and waits for it
///
/// The cache flush before `submit` is unconditional. `submit_and_wait`
/// only returns once the hardware reported completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use crate::error::{Error, Result};
use crate::{driver_bail, driver_err, driver_debug};
use super::kernel::{Kernel, KernelMemory, CompletionStatus, JobId};
use super::job_descriptor::JobDescriptor;

pub struct Submitter {
    kernel: Arc<Mutex<dyn Kernel>>,
    timeout: Duration,
}

impl Submitter {
    pub fn new(kernel: Arc<Mutex<dyn Kernel>>, timeout: Duration) -> Self {
        Self { kernel, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Flush `regions`, submit `job` and block until it completes
    ///
    /// Kernel `Allocation`/`Submission` errors are passed through.
    /// A fault or timeout becomes `Execution`.
    pub fn submit_and_wait(&self, job: &JobDescriptor, regions: &[&dyn KernelMemory]) -> Result<JobId> {
        let mut kernel = self.kernel.lock()
            .map_err(|_| driver_err!("lima::Submitter", Error::Backend("kernel lock poisoned".to_string())))?;

        kernel.flush_caches(regions)?;
        let id = kernel.submit(job)?;
        driver_debug!("lima::Submitter", "Submitted {} with {} draws", id, job.draws.len());

        match kernel.wait(id, self.timeout)? {
            CompletionStatus::Success => Ok(id),
            CompletionStatus::Fault => driver_bail!("lima::Submitter", Error::Execution(
                format!("{} faulted", id))),
            CompletionStatus::Timeout => driver_bail!("lima::Submitter", Error::Execution(
                format!("{} did not complete within {:?}", id, self.timeout))),
        }
    }
}

#[cfg(test)]
#[path = "submission_tests.rs"]
mod tests;
