//! Reference executor for compiled modules
//!
//! - [`machine`]: Interprets a [`Module`](crate::ir::Module) starting at `main`
//! - [`console`]: Captured `printf` output and `scanf` input
//! - [`errors`]: Execution error types
//!
//! # Execution Model
//!
//! Globals get their own zero-initialised memory, allocated cell by cell
//! on first store so large arrays cost only what the program touches; `alloca` slots live on one
//! stack that each call truncates back on return. Values are `i32`, with
//! booleans stored as 0 or 1. `printf` and `scanf` are the only external
//! functions, and understand `%d`, `%s` and `%%`.

pub mod console;
pub mod errors;
pub mod machine;

pub use console::Console;
pub use errors::ExecError;
pub use machine::Machine;

/// Bounds on a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Instructions executed, across all calls
    pub max_steps: u64,
    pub max_call_depth: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        ExecLimits {
            max_steps: 10_000_000,
            max_call_depth: 1000,
        }
    }
}
