/// Program module - stage pairing, linking and location resolution

// Module declarations
pub mod program;
pub mod linker;

// Re-export everything from program.rs
pub use program::*;

// Re-export from other modules
pub use linker::*;
