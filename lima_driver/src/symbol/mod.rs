/// Symbol module - named shader entities (uniforms, attributes, varyings)

// Module declarations
pub mod symbol;
pub mod symbol_table;
pub mod builtin;

// Re-export everything from symbol.rs
pub use symbol::*;

// Re-export from other modules
pub use symbol_table::*;
pub use builtin::*;
