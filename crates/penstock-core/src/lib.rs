//! Penstock Core - configuration-driven scalar dataflow engine
//!
//! A pipeline is a declarative, ordered sequence of scalar operator
//! invocations over named, typed variables. This crate provides two
//! interchangeable execution back-ends:
//! - Interpreter: the reference semantics, walking steps directly
//! - JIT: lowers the pipeline to C++, compiles it out-of-process into a
//!   shared object, and dynamically loads the entry point
//!
//! # Architecture
//!
//! ```text
//! PipelineConfig → fingerprint → CompileCache lookup
//!     miss: CodeGenerator → .cpp → Toolchain → .so
//! PipelineLoader → entry fn → execute(Environment)
//! ```
//!
//! Both back-ends share one operator registry and must agree on results
//! for every well-formed program.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data types, values and the variable environment
pub mod types;

/// Pipeline IR: configs, fingerprints, the JSON adapter
pub mod ir;

/// Operator registry shared by both back-ends
pub mod ops;

/// Reference interpreter
pub mod interp;

/// C++ code generation for the JIT back-end
pub mod codegen;

/// Compile cache, toolchain driver and dynamic loader
pub mod jit;

/// Engine façade and executor handles
pub mod engine;

/// Shared helpers for tests and benches
pub mod testutil;

pub use engine::{Engine, EngineError, EngineOptions, Mode, PipelineExecutor};
pub use interp::{ExecError, Interpreter};
pub use ir::{Arg, ConfigError, IOField, OpCall, PipelineConfig};
pub use ops::OperatorRegistry;
pub use types::{DataType, Environment, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
