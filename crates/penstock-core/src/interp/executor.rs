//! Step walker and argument resolution

use std::sync::Arc;

use crate::ir::{Arg, PipelineConfig};
use crate::ops::OperatorRegistry;
use crate::types::{DataType, Environment, Value};

use super::{ExecError, ExecResult};

/// The reference back-end: evaluates steps directly against the environment
#[derive(Debug)]
pub struct Interpreter {
    registry: Arc<OperatorRegistry>,
    config: PipelineConfig,
}

impl Interpreter {
    /// Create an interpreter for `config`
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>, config: PipelineConfig) -> Self {
        Self { registry, config }
    }

    /// The pipeline config this interpreter runs
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute every step in order
    ///
    /// Step `i` observes all writes of steps `0..i`; on error the
    /// environment keeps whatever earlier steps wrote.
    ///
    /// # Errors
    /// See [`ExecError`] for the failure modes.
    pub fn run(&self, env: &mut Environment) -> ExecResult<()> {
        for step in &self.config.steps {
            let meta = self
                .registry
                .lookup(&step.op_name)
                .ok_or_else(|| ExecError::UnknownOperator(step.op_name.clone()))?;

            if step.args.len() > meta.arity {
                return Err(ExecError::ArityMismatch {
                    op: step.op_name.clone(),
                    expected: meta.arity,
                    got: step.args.len(),
                });
            }

            let args = step
                .args
                .iter()
                .map(|arg| resolve(&step.op_name, arg, env))
                .collect::<ExecResult<Vec<_>>>()?;

            let result = (meta.kernel)(&args).map_err(|detail| ExecError::TypeMismatch {
                op: step.op_name.clone(),
                detail,
            })?;

            env.set(step.output_var.clone(), result);
        }
        Ok(())
    }
}

/// Resolve one arg against the environment
///
/// Numeric values are widened to `double` on the way in, matching the
/// generated code where every templated operator is instantiated at the
/// type its arguments implicitly convert to. Strings and lists pass through
/// unchanged. A literal that fails its declared decoder is a type mismatch;
/// the sanctioned conversions are the `direct_output_*` operators.
fn resolve(op: &str, arg: &Arg, env: &Environment) -> ExecResult<Value> {
    match arg {
        Arg::Variable { name, .. } => {
            let value = env
                .get(name)
                .ok_or_else(|| ExecError::VariableNotFound(name.clone()))?;
            Ok(promote(value.clone()))
        }
        Arg::Literal { text, ty } => {
            let value = decode_literal(text, *ty).ok_or_else(|| ExecError::TypeMismatch {
                op: op.to_string(),
                detail: format!("cannot decode literal '{text}' as {ty}"),
            })?;
            Ok(promote(value))
        }
    }
}

/// Widen numeric values to `double`; everything else is unchanged
fn promote(value: Value) -> Value {
    match value.as_f64() {
        Some(v) => Value::Double(v),
        None => value,
    }
}

/// Decode a literal by its declared type
fn decode_literal(text: &str, ty: DataType) -> Option<Value> {
    match ty {
        DataType::Int32 => text.parse().ok().map(Value::Int32),
        DataType::Int64 => text.parse().ok().map(Value::Int64),
        DataType::Float => text.parse().ok().map(Value::Float),
        DataType::Double => text.parse().ok().map(Value::Double),
        DataType::Str => Some(Value::Str(text.to_string())),
        // List literals have no text encoding.
        _ => None,
    }
}
