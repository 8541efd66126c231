/// Memory module - GPU-visible buffers, presentation pair and uniform arena

// Module declarations
pub mod buffer_manager;
pub mod framebuffer;
pub mod uniform_arena;

// Re-export everything from buffer_manager.rs
pub use buffer_manager::*;

// Re-export from other modules
pub use framebuffer::*;
pub use uniform_arena::*;
