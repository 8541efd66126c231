/// Binder module - name-based attribute and uniform binding

// Module declarations
pub mod attribute;
pub mod binder;

// Re-export everything from binder.rs
pub use binder::*;

// Re-export from other modules
pub use attribute::*;
