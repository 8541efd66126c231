/// Kernel module - the job-submission sink and GPU-visible memory provider

// Module declarations
pub mod kernel;
pub mod job_descriptor;
pub mod submission;
#[cfg(test)]
pub mod mock_kernel;

// Re-export everything from kernel.rs
pub use kernel::*;

// Re-export from other modules
pub use job_descriptor::*;
pub use submission::*;
