/// Shader module - compiled stage binaries consumed by the linker

// Module declarations
pub mod shader;

// Re-export everything from shader.rs
pub use shader::*;
