/*!
# Lima Driver

Userspace core of a driver for Mali-200/400 class GPUs.

This crate turns compiled shader binaries, vertex streams and uniform values
into hardware job descriptors and hands them to a kernel interface. Shader
compilation, the kernel ioctl transport and the GL entry points live outside
the crate and plug in through traits.

## Architecture

- **SymbolTable**: Named uniforms, attributes and varyings of a shader stage
- **Program / Linker**: Merges vertex and fragment tables, resolves locations
- **BufferManager**: GPU-visible memory obtained from the kernel interface
- **Binder**: Name-based attribute and uniform binding
- **JobAssembler**: Frame state machine recording draws into a job
- **Submitter**: Cache flush, submit and wait on a `Kernel`
- **Context**: The draw-time API tying the above together
*/

// Internal modules
mod error;
mod driver;
mod context;
pub mod log;
pub mod symbol;
pub mod shader;
pub mod kernel;
pub mod memory;
pub mod program;
pub mod binder;
pub mod job;

// Main lima namespace module
pub mod lima {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::driver::Driver;

    // Draw-time API
    pub use crate::context::{Config, Context};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod symbol {
        pub use crate::symbol::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod kernel {
        pub use crate::kernel::*;
    }

    pub mod memory {
        pub use crate::memory::*;
    }

    pub mod program {
        pub use crate::program::*;
    }

    pub mod binder {
        pub use crate::binder::*;
    }

    pub mod job {
        pub use crate::job::*;
    }
}

// Re-export math library at crate root
pub use glam;
