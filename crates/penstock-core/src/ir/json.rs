//! JSON input adapter for pipeline configs
//!
//! The core consumes [`PipelineConfig`] values; this module is the external
//! collaborator that produces them from the JSON surface syntax:
//!
//! ```json
//! {
//!   "name": "demo",
//!   "inputs":  [{"name": "price_a", "type": "double"}],
//!   "outputs": [{"name": "final", "type": "double"}],
//!   "steps":   [{"op": "add", "output": "s", "args": ["$price_a", 100]}]
//! }
//! ```
//!
//! Step args are `$`-prefixed strings for variable references, bare numbers
//! or numeric strings for numeric literals (`int32`/`int64`/`double`
//! inferred from their form), and any other string for a string literal.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::DataType;

use super::{Arg, IOField, OpCall, PipelineConfig};

/// Errors from the JSON adapter
#[derive(Debug, Error)]
pub enum JsonError {
    /// Malformed JSON or schema mismatch
    #[error("invalid pipeline JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Could not read the config file
    #[error("failed to read {path}: {source}")]
    Io {
        /// The offending path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

#[derive(Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default = "default_true")]
    required: bool,
}

#[derive(Serialize, Deserialize)]
struct RawStep {
    #[serde(default)]
    op: String,
    #[serde(default)]
    output: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    #[serde(default)]
    options: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct RawConfig {
    name: String,
    #[serde(default)]
    inputs: Vec<RawField>,
    #[serde(default)]
    variables: Vec<RawField>,
    #[serde(default)]
    outputs: Vec<RawField>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

const fn default_true() -> bool {
    true
}

/// Parse a config from a JSON string
///
/// The returned config has its fingerprint computed.
///
/// # Errors
/// Returns [`JsonError::Parse`] when the document does not match the schema.
pub fn from_str(json: &str) -> Result<PipelineConfig, JsonError> {
    let raw: RawConfig = serde_json::from_str(json)?;
    Ok(build(raw))
}

/// Parse a config from a JSON file
///
/// # Errors
/// Returns [`JsonError::Io`] when the file cannot be read, or
/// [`JsonError::Parse`] when its contents are malformed.
pub fn from_file(path: impl AsRef<Path>) -> Result<PipelineConfig, JsonError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| JsonError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_str(&text)
}

/// Render a config back to pretty-printed JSON
///
/// # Errors
/// Returns [`JsonError::Parse`] when serialization fails.
pub fn to_string_pretty(config: &PipelineConfig) -> Result<String, JsonError> {
    let raw = RawConfig {
        name: config.name.clone(),
        inputs: config.inputs.iter().map(field_to_raw).collect(),
        variables: config.variables.iter().map(field_to_raw).collect(),
        outputs: config.outputs.iter().map(field_to_raw).collect(),
        steps: config
            .steps
            .iter()
            .map(|step| RawStep {
                op: step.op_name.clone(),
                output: step.output_var.clone(),
                args: step.args.iter().map(arg_to_json).collect(),
                options: step.options.clone(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&raw)?)
}

fn build(raw: RawConfig) -> PipelineConfig {
    let mut config = PipelineConfig::new(raw.name);
    for field in raw.inputs {
        config.inputs.push(field_from_raw(field));
    }
    for field in raw.variables {
        config.variables.push(field_from_raw(field));
    }
    for field in raw.outputs {
        config.outputs.push(field_from_raw(field));
    }
    for step in raw.steps {
        let mut call = OpCall::new(step.op);
        call.output_var = step.output;
        call.options = step.options;
        call.args = step.args.iter().map(parse_arg).collect();
        config.steps.push(call);
    }
    resolve_arg_types(&mut config);
    config.compute_fingerprint();
    config
}

fn field_from_raw(raw: RawField) -> IOField {
    let ty = DataType::from_spelling(&raw.ty);
    if ty == DataType::Unknown {
        warn!(field = %raw.name, spelling = %raw.ty, "unrecognized field type");
    }
    IOField {
        name: raw.name,
        ty,
        required: raw.required,
    }
}

fn field_to_raw(field: &IOField) -> RawField {
    RawField {
        name: field.name.clone(),
        ty: field.ty.spelling().to_string(),
        required: field.required,
    }
}

fn parse_arg(value: &serde_json::Value) -> Arg {
    match value {
        serde_json::Value::String(s) => {
            if let Some(name) = s.strip_prefix('$') {
                Arg::variable(name, DataType::Unknown)
            } else {
                classify_text(s)
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let ty = if i32::try_from(i).is_ok() {
                    DataType::Int32
                } else {
                    DataType::Int64
                };
                Arg::literal(i.to_string(), ty)
            } else {
                Arg::literal(n.to_string(), DataType::Double)
            }
        }
        serde_json::Value::Bool(b) => Arg::literal(if *b { "1" } else { "0" }, DataType::Int32),
        other => Arg::literal(other.to_string(), DataType::Str),
    }
}

/// Classify a bare string arg: integer, float, or string literal
fn classify_text(text: &str) -> Arg {
    if let Ok(i) = text.parse::<i64>() {
        let ty = if i32::try_from(i).is_ok() {
            DataType::Int32
        } else {
            DataType::Int64
        };
        return Arg::literal(text, ty);
    }
    if text.parse::<f64>().is_ok() {
        return Arg::literal(text, DataType::Double);
    }
    Arg::literal(text, DataType::Str)
}

fn arg_to_json(arg: &Arg) -> serde_json::Value {
    match arg {
        Arg::Variable { name, .. } => serde_json::Value::String(format!("${name}")),
        Arg::Literal { text, ty } => {
            if ty.is_numeric() {
                if let Ok(n) = serde_json::from_str::<serde_json::Number>(text) {
                    return serde_json::Value::Number(n);
                }
            }
            serde_json::Value::String(text.clone())
        }
    }
}

/// Fill in declared types for `$var` references from the io declarations
fn resolve_arg_types(config: &mut PipelineConfig) {
    let declared: Vec<(String, DataType)> = config
        .inputs
        .iter()
        .chain(&config.variables)
        .chain(&config.outputs)
        .map(|f| (f.name.clone(), f.ty))
        .collect();

    for step in &mut config.steps {
        for arg in &mut step.args {
            if let Arg::Variable { name, ty } = arg {
                if *ty == DataType::Unknown {
                    if let Some((_, declared_ty)) =
                        declared.iter().find(|(n, _)| n == name)
                    {
                        *ty = *declared_ty;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"{
        "name": "demo",
        "inputs": [
            {"name": "price_a", "type": "double"},
            {"name": "price_b", "type": "double"},
            {"name": "volume", "type": "int32"}
        ],
        "outputs": [{"name": "final", "type": "double", "required": false}],
        "steps": [
            {"op": "add", "output": "s", "args": ["$price_a", "$price_b"]},
            {"op": "mul", "output": "p", "args": ["$s", "$volume"]},
            {"op": "div", "output": "final", "args": ["$p", 100]}
        ]
    }"#;

    #[test]
    fn parses_demo_pipeline() {
        let config = from_str(DEMO).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.inputs.len(), 3);
        assert_eq!(config.steps.len(), 3);
        assert!(config.fingerprint().is_some());
        assert!(!config.outputs[0].required);
    }

    #[test]
    fn dollar_prefix_is_a_variable_reference() {
        let config = from_str(DEMO).unwrap();
        let arg = &config.steps[0].args[0];
        assert_eq!(
            arg,
            &Arg::variable("price_a", DataType::Double),
            "type resolved from the input declaration"
        );
    }

    #[test]
    fn numeric_literals_are_typed_by_form() {
        let config = from_str(
            r#"{"name": "n", "steps": [
                {"op": "add", "output": "x", "args": [1, 3000000000, 1.5, "2.5", "hello"]}
            ]}"#,
        )
        .unwrap();
        let args = &config.steps[0].args;
        assert_eq!(args[0].ty(), DataType::Int32);
        assert_eq!(args[1].ty(), DataType::Int64);
        assert_eq!(args[2].ty(), DataType::Double);
        assert_eq!(args[3].ty(), DataType::Double);
        assert_eq!(args[4].ty(), DataType::Str);
    }

    #[test]
    fn round_trip_preserves_fingerprint() {
        let config = from_str(DEMO).unwrap();
        let json = to_string_pretty(&config).unwrap();
        let reparsed = from_str(&json).unwrap();
        assert_eq!(config.fingerprint(), reparsed.fingerprint());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(from_str("{"), Err(JsonError::Parse(_))));
    }
}
