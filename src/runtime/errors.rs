//! Execution error types for the reference executor
//!
//! [`ExecError`] covers everything that can stop a compiled program while it
//! runs under [`Machine`](super::Machine). IR carries no source positions, so
//! errors name the function they occurred in instead.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("no function named {name}")]
    NoEntry { name: String },

    #[error("call to {name}, which has no body")]
    MissingBody { name: String },

    #[error("division by zero in {function}")]
    DivisionByZero { function: String },

    /// Dereference of something that is not a pointer
    #[error("invalid pointer in {function}")]
    InvalidPointer { function: String },

    #[error("index {offset} out of bounds of {global} in {function}")]
    OutOfBounds {
        global: String,
        offset: i64,
        function: String,
    },

    #[error("store to constant {global} in {function}")]
    WriteToConstant { global: String, function: String },

    #[error("register %{register} used before definition in {function}")]
    UndefinedRegister { register: usize, function: String },

    #[error("block {block} of {function} has no terminator")]
    MissingTerminator { block: String, function: String },

    #[error("{function} returned no value")]
    NoReturnValue { function: String },

    #[error("bad format string: {message}")]
    InvalidFormat { message: String },

    #[error("step limit of {limit} exceeded")]
    StepLimit { limit: u64 },

    #[error("call depth limit of {limit} exceeded")]
    CallDepth { limit: usize },
}
