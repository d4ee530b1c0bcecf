//! Pipeline config structs and validation

use std::collections::BTreeMap;

use crate::types::DataType;

use super::fingerprint;
use super::{ConfigError, ConfigResult};

/// One operator argument: a variable reference or a typed literal
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Reference to an environment slot
    Variable {
        /// Variable name
        name: String,
        /// Declared type of the slot
        ty: DataType,
    },

    /// Constant encoded as text, decoded by the target-typed parser
    Literal {
        /// Literal text
        text: String,
        /// Declared type the text decodes to
        ty: DataType,
    },
}

impl Arg {
    /// A variable reference
    pub fn variable(name: impl Into<String>, ty: DataType) -> Self {
        Arg::Variable {
            name: name.into(),
            ty,
        }
    }

    /// A typed literal
    pub fn literal(text: impl Into<String>, ty: DataType) -> Self {
        Arg::Literal {
            text: text.into(),
            ty,
        }
    }

    /// The text that represents this arg in the canonical form: the
    /// variable name or the literal text
    #[must_use]
    pub fn canonical_text(&self) -> &str {
        match self {
            Arg::Variable { name, .. } => name,
            Arg::Literal { text, .. } => text,
        }
    }

    /// Declared type of the arg
    #[must_use]
    pub const fn ty(&self) -> DataType {
        match self {
            Arg::Variable { ty, .. } | Arg::Literal { ty, .. } => *ty,
        }
    }
}

/// One step: an operator invocation writing exactly one variable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpCall {
    /// Operator name as registered in the operator table
    pub op_name: String,

    /// Variable the result is written to
    pub output_var: String,

    /// Ordered arguments
    pub args: Vec<Arg>,

    /// Free-form per-step options; sorted by key so canonicalization is
    /// deterministic
    pub options: BTreeMap<String, String>,
}

impl OpCall {
    /// Start building a step for `op_name`
    pub fn new(op_name: impl Into<String>) -> Self {
        Self {
            op_name: op_name.into(),
            ..Self::default()
        }
    }

    /// Set the output variable
    #[must_use]
    pub fn output(mut self, var: impl Into<String>) -> Self {
        self.output_var = var.into();
        self
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// Set an option
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A named, typed io field, used for inputs, declared variables and outputs
#[derive(Debug, Clone, PartialEq)]
pub struct IOField {
    /// Field name
    pub name: String,

    /// Declared type
    pub ty: DataType,

    /// Whether the caller must bind this field before execution
    pub required: bool,
}

impl IOField {
    /// A required field
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    /// Mark the field optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// The immutable pipeline program
///
/// Construct with the builder methods, then call [`compute_fingerprint`]
/// once; afterwards the config must not be mutated.
///
/// [`compute_fingerprint`]: PipelineConfig::compute_fingerprint
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Pipeline name, for diagnostics and the canonical form
    pub name: String,

    /// Caller-provided inputs, in declaration order
    pub inputs: Vec<IOField>,

    /// Declared intermediate variables
    pub variables: Vec<IOField>,

    /// Values marshalled back to the caller, in declaration order
    pub outputs: Vec<IOField>,

    /// Ordered operator invocations
    pub steps: Vec<OpCall>,

    fingerprint: Option<String>,
}

impl PipelineConfig {
    /// Start a config with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append an input field
    #[must_use]
    pub fn input(mut self, field: IOField) -> Self {
        self.inputs.push(field);
        self
    }

    /// Append a declared variable
    #[must_use]
    pub fn variable(mut self, field: IOField) -> Self {
        self.variables.push(field);
        self
    }

    /// Append an output field
    #[must_use]
    pub fn output(mut self, field: IOField) -> Self {
        self.outputs.push(field);
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: OpCall) -> Self {
        self.steps.push(step);
        self
    }

    /// The fingerprint, if computed
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Compute and store the content fingerprint
    ///
    /// Idempotent: the first call hashes the canonical form, later calls
    /// return the stored value.
    pub fn compute_fingerprint(&mut self) -> &str {
        if self.fingerprint.is_none() {
            self.fingerprint = Some(fingerprint::fingerprint(self));
        }
        self.fingerprint.as_deref().unwrap_or_default()
    }

    /// Check structural validity
    ///
    /// # Errors
    /// Returns [`ConfigError`] for an empty pipeline name, a step with an
    /// empty operator name or output variable, a field or output variable
    /// that is not a plain identifier, or an io field left at `unknown`.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        for field in self
            .inputs
            .iter()
            .chain(&self.variables)
            .chain(&self.outputs)
        {
            if !is_identifier(&field.name) {
                return Err(ConfigError::InvalidIdentifier {
                    name: field.name.clone(),
                });
            }
            if field.ty == DataType::Unknown {
                return Err(ConfigError::UnknownType {
                    name: field.name.clone(),
                });
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.op_name.is_empty() {
                return Err(ConfigError::EmptyOpName { index });
            }
            if step.output_var.is_empty() {
                return Err(ConfigError::EmptyOutputVar {
                    index,
                    op: step.op_name.clone(),
                });
            }
            if !is_identifier(&step.output_var) {
                return Err(ConfigError::InvalidIdentifier {
                    name: step.output_var.clone(),
                });
            }
            for arg in &step.args {
                if let Arg::Variable { name, .. } = arg {
                    if !is_identifier(name) {
                        return Err(ConfigError::InvalidIdentifier { name: name.clone() });
                    }
                }
            }
        }

        Ok(())
    }
}

/// True when `name` is a plain identifier: `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> PipelineConfig {
        PipelineConfig::new("p")
            .input(IOField::new("a", DataType::Double))
            .step(
                OpCall::new("add")
                    .output("b")
                    .arg(Arg::variable("a", DataType::Double))
                    .arg(Arg::literal("1", DataType::Double)),
            )
            .output(IOField::new("b", DataType::Double))
    }

    #[test]
    fn builder_produces_valid_config() {
        let cfg = minimal();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.steps[0].args[1].canonical_text(), "1");
    }

    #[test]
    fn empty_name_rejected() {
        let cfg = PipelineConfig::new("");
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyName)));
    }

    #[test]
    fn empty_op_name_rejected() {
        let cfg = PipelineConfig::new("p").step(OpCall::new("").output("x"));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EmptyOpName { index: 0 })
        ));
    }

    #[test]
    fn empty_output_var_rejected() {
        let cfg = PipelineConfig::new("p").step(OpCall::new("add"));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EmptyOutputVar { index: 0, .. })
        ));
    }

    #[test]
    fn bad_identifiers_rejected() {
        let cfg = PipelineConfig::new("p").input(IOField::new("1st", DataType::Double));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidIdentifier { .. })
        ));

        let cfg = PipelineConfig::new("p").step(OpCall::new("add").output("a;b"));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn unknown_io_type_rejected() {
        let cfg = PipelineConfig::new("p").input(IOField::new("a", DataType::Unknown));
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownType { .. })));
    }

    #[test]
    fn fingerprint_is_idempotent() {
        let mut cfg = minimal();
        let first = cfg.compute_fingerprint().to_string();
        let second = cfg.compute_fingerprint().to_string();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
