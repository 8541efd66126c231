/// Job module - per-frame draw recording and the frame state machine

// Module declarations
pub mod job;
pub mod assembler;

// Re-export everything from job.rs
pub use job::*;

// Re-export from other modules
pub use assembler::*;
