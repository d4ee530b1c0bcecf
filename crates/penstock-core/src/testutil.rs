//! Test utilities for Penstock
//!
//! Shared fixtures for unit tests, integration tests and benches: known
//! pipeline configs, matching environments, and a toolchain probe so JIT
//! suites can skip cleanly on machines without a C++ compiler.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::engine::{Engine, EngineOptions};
use crate::ir::{Arg, IOField, OpCall, PipelineConfig};
use crate::types::{DataType, Environment};

/// `a + b -> c` over doubles
#[must_use]
pub fn trivial_add_config() -> PipelineConfig {
    PipelineConfig::new("trivial_add")
        .input(IOField::new("a", DataType::Double))
        .input(IOField::new("b", DataType::Double))
        .step(
            OpCall::new("add")
                .output("c")
                .arg(Arg::variable("a", DataType::Double))
                .arg(Arg::variable("b", DataType::Double)),
        )
        .output(IOField::new("c", DataType::Double))
}

/// The chained demo: `(price_a + price_b) * volume / 100 -> final`
#[must_use]
pub fn chained_demo_config() -> PipelineConfig {
    PipelineConfig::new("chained_demo")
        .input(IOField::new("price_a", DataType::Double))
        .input(IOField::new("price_b", DataType::Double))
        .input(IOField::new("volume", DataType::Int32))
        .variable(IOField::new("s", DataType::Double).optional())
        .variable(IOField::new("p", DataType::Double).optional())
        .step(
            OpCall::new("add")
                .output("s")
                .arg(Arg::variable("price_a", DataType::Double))
                .arg(Arg::variable("price_b", DataType::Double)),
        )
        .step(
            OpCall::new("mul")
                .output("p")
                .arg(Arg::variable("s", DataType::Double))
                .arg(Arg::variable("volume", DataType::Int32)),
        )
        .step(
            OpCall::new("div")
                .output("final")
                .arg(Arg::variable("p", DataType::Double))
                .arg(Arg::literal("100", DataType::Double)),
        )
        .output(IOField::new("final", DataType::Double))
}

/// `get_sign(x) -> s`, an int32-valued output
#[must_use]
pub fn sign_config() -> PipelineConfig {
    PipelineConfig::new("sign")
        .input(IOField::new("x", DataType::Double))
        .step(
            OpCall::new("get_sign")
                .output("s")
                .arg(Arg::variable("x", DataType::Double)),
        )
        .output(IOField::new("s", DataType::Int32))
}

/// `add(a, b) -> v0`, then `mul(v_{i-1}, c) -> v_i` for `i = 1..steps`
#[must_use]
pub fn long_chain_config(steps: usize) -> PipelineConfig {
    let mut config = PipelineConfig::new("long_chain")
        .input(IOField::new("a", DataType::Double))
        .input(IOField::new("b", DataType::Double))
        .input(IOField::new("c", DataType::Double))
        .step(
            OpCall::new("add")
                .output("v0")
                .arg(Arg::variable("a", DataType::Double))
                .arg(Arg::variable("b", DataType::Double)),
        );
    for i in 1..steps {
        config = config.step(
            OpCall::new("mul")
                .output(format!("v{i}"))
                .arg(Arg::variable(format!("v{}", i - 1), DataType::Double))
                .arg(Arg::variable("c", DataType::Double)),
        );
    }
    let last = format!("v{}", steps.saturating_sub(1));
    config.output(IOField::new(last, DataType::Double))
}

/// The environment matching [`chained_demo_config`]
#[must_use]
pub fn demo_environment() -> Environment {
    let mut env = Environment::new();
    env.set("price_a", 100.0);
    env.set("price_b", 50.0);
    env.set("volume", 10i32);
    env
}

/// Include directory holding the operator library header
#[must_use]
pub fn include_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/include"))
}

/// An engine caching into `cache_dir`, with timestamps off so emitted
/// source is byte-stable
#[must_use]
pub fn test_engine(cache_dir: &Path) -> Engine {
    Engine::with_options(EngineOptions {
        cache_dir: cache_dir.to_path_buf(),
        include_dir: include_dir(),
        codegen: crate::codegen::CodegenOptions { timestamp: false },
        ..EngineOptions::default()
    })
}

/// True when a C++ compiler is available; JIT suites skip otherwise
#[must_use]
pub fn toolchain_available() -> bool {
    ["clang++", "g++"].iter().any(|compiler| {
        Command::new(compiler)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    })
}
