//! Conformance scenarios for the two back-ends
//!
//! The interpreter half always runs. The JIT half compiles real C++ and
//! dlopens the result, so it skips cleanly when no toolchain is installed.

use penstock_core::testutil::{
    chained_demo_config, demo_environment, long_chain_config, sign_config, test_engine,
    toolchain_available, trivial_add_config,
};
use penstock_core::{
    EngineError, Environment, ExecError, Mode, OpCall, PipelineConfig, Value,
};

macro_rules! require_toolchain {
    () => {
        if !toolchain_available() {
            eprintln!("skipping: no C++ toolchain on this machine");
            return;
        }
    };
}

fn double_of(env: &Environment, name: &str) -> f64 {
    match env.get(name) {
        Some(Value::Double(v)) => *v,
        other => panic!("expected {name} to be a double, got {other:?}"),
    }
}

fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn interpreter_trivial_add() {
    let engine = penstock_core::Engine::new();
    let mut exec = engine
        .executor(trivial_add_config(), Mode::Interpreter)
        .unwrap();
    let mut env = Environment::new();
    env.set("a", 100.0);
    env.set("b", 50.0);
    exec.execute(&mut env).unwrap();
    assert_eq!(double_of(&env, "c"), 150.0);
}

#[test]
fn interpreter_chained_demo() {
    let engine = penstock_core::Engine::new();
    let mut exec = engine
        .executor(chained_demo_config(), Mode::Interpreter)
        .unwrap();
    let mut env = demo_environment();
    exec.execute(&mut env).unwrap();
    assert_eq!(double_of(&env, "final"), 15.0);
}

#[test]
fn interpreter_sign_dispatch() {
    let engine = penstock_core::Engine::new();
    for (input, expected) in [(-7.0, -1), (0.0, 0), (7.0, 1)] {
        let mut exec = engine.executor(sign_config(), Mode::Interpreter).unwrap();
        let mut env = Environment::new();
        env.set("x", input);
        exec.execute(&mut env).unwrap();
        assert_eq!(env.get("s"), Some(&Value::Int32(expected)));
    }
}

#[test]
fn interpreter_long_chain_scales() {
    let engine = penstock_core::Engine::new();
    let mut exec = engine
        .executor(long_chain_config(50), Mode::Interpreter)
        .unwrap();
    let mut env = Environment::new();
    env.set("a", 1.0);
    env.set("b", 2.0);
    env.set("c", 1.5);
    exec.execute(&mut env).unwrap();
    assert_close(double_of(&env, "v49"), 3.0 * 1.5f64.powi(49));
}

#[test]
fn interpreter_rejects_unknown_operator() {
    let engine = penstock_core::Engine::new();
    let config = PipelineConfig::new("bad").step(OpCall::new("nonesuch").output("x"));
    let mut exec = engine.executor(config, Mode::Interpreter).unwrap();
    let mut env = Environment::new();
    let err = exec.execute(&mut env).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Exec(ExecError::UnknownOperator(op)) if op == "nonesuch"
    ));
}

#[test]
fn jit_trivial_add() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut exec = engine.executor(trivial_add_config(), Mode::Jit).unwrap();
    let mut env = Environment::new();
    env.set("a", 100.0);
    env.set("b", 50.0);
    exec.execute(&mut env).unwrap();
    assert_eq!(double_of(&env, "c"), 150.0);
}

#[test]
fn jit_chained_demo_matches_interpreter() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());

    let mut interp_env = demo_environment();
    engine
        .executor(chained_demo_config(), Mode::Interpreter)
        .unwrap()
        .execute(&mut interp_env)
        .unwrap();

    let mut jit_env = demo_environment();
    engine
        .executor(chained_demo_config(), Mode::Jit)
        .unwrap()
        .execute(&mut jit_env)
        .unwrap();

    assert_close(double_of(&jit_env, "final"), double_of(&interp_env, "final"));
    assert_eq!(double_of(&jit_env, "final"), 15.0);
}

#[test]
fn jit_sign_dispatch_preserves_int32() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    for (input, expected) in [(-7.0, -1), (0.0, 0), (7.0, 1)] {
        let mut exec = engine.executor(sign_config(), Mode::Jit).unwrap();
        let mut env = Environment::new();
        env.set("x", input);
        exec.execute(&mut env).unwrap();
        assert_eq!(env.get("s"), Some(&Value::Int32(expected)));
    }
}

#[test]
fn jit_long_chain_agrees_with_interpreter() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());

    let mut inputs = Environment::new();
    inputs.set("a", 1.0);
    inputs.set("b", 2.0);
    inputs.set("c", 1.5);

    let mut interp_env = inputs.clone();
    engine
        .executor(long_chain_config(50), Mode::Interpreter)
        .unwrap()
        .execute(&mut interp_env)
        .unwrap();

    let mut jit_env = inputs;
    engine
        .executor(long_chain_config(50), Mode::Jit)
        .unwrap()
        .execute(&mut jit_env)
        .unwrap();

    assert_close(double_of(&jit_env, "v49"), double_of(&interp_env, "v49"));
}

#[test]
fn jit_unknown_operator_fails_to_compile() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let config = PipelineConfig::new("bad")
        .step(OpCall::new("nonesuch").output("x"))
        .output(penstock_core::IOField::new(
            "x",
            penstock_core::DataType::Double,
        ));
    let mut exec = engine.executor(config, Mode::Jit).unwrap();
    let mut env = Environment::new();
    let err = exec.execute(&mut env).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Jit(penstock_core::jit::JitError::CompileFailure(_))
    ));
}

#[test]
fn jit_cache_reuse_across_executor_rebuilds() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());

    {
        let mut exec = engine.executor(chained_demo_config(), Mode::Jit).unwrap();
        assert!(exec.needs_recompile());
        let mut env = demo_environment();
        exec.execute(&mut env).unwrap();
    }

    // Same config, same engine: the artifact is already cached.
    let exec = engine.executor(chained_demo_config(), Mode::Jit).unwrap();
    assert!(!exec.needs_recompile());
}

#[test]
fn jit_final_step_variable_reaches_the_environment() {
    require_toolchain!();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());

    // The last step writes `t`, which is not a declared output.
    let config = PipelineConfig::new("tail")
        .input(penstock_core::IOField::new("a", penstock_core::DataType::Double))
        .step(
            OpCall::new("square")
                .output("sq")
                .arg(penstock_core::Arg::variable("a", penstock_core::DataType::Double)),
        )
        .step(
            OpCall::new("get_sign")
                .output("t")
                .arg(penstock_core::Arg::variable("sq", penstock_core::DataType::Double)),
        )
        .output(penstock_core::IOField::new(
            "sq",
            penstock_core::DataType::Double,
        ));

    let mut exec = engine.executor(config, Mode::Jit).unwrap();
    let mut env = Environment::new();
    env.set("a", -3.0);
    exec.execute(&mut env).unwrap();
    assert_eq!(double_of(&env, "sq"), 9.0);
    assert_eq!(env.get("t"), Some(&Value::Int32(1)));
}
