//! C++ source emission

use std::fmt::Write as _;
use std::path::Path;

use crate::ir::{sanitize_identifier, Arg, OpCall, PipelineConfig};
use crate::ops::OperatorRegistry;
use crate::types::DataType;

use super::layout::PackLayout;
use super::{CodegenError, CodegenOptions};

/// Which declaration a context field came from; earlier roles win on
/// name collisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Input,
    Declared,
    StepOutput,
    Output,
}

/// Emits one C++ translation unit for a fingerprinted pipeline
#[derive(Debug)]
pub struct CodeGenerator<'a> {
    registry: &'a OperatorRegistry,
    config: &'a PipelineConfig,
    options: CodegenOptions,
}

impl<'a> CodeGenerator<'a> {
    /// Create a generator over `config`
    #[must_use]
    pub fn new(
        registry: &'a OperatorRegistry,
        config: &'a PipelineConfig,
        options: CodegenOptions,
    ) -> Self {
        Self {
            registry,
            config,
            options,
        }
    }

    /// Layout of the generated `InputPack`: numeric inputs in declaration
    /// order
    ///
    /// # Errors
    /// Rejects non-numeric input types.
    pub fn input_layout(&self) -> Result<PackLayout, CodegenError> {
        PackLayout::compute(
            "input",
            self.config
                .inputs
                .iter()
                .map(|f| (f.name.as_str(), f.ty)),
        )
    }

    /// Layout of the generated `OutputPack`: declared outputs in order,
    /// plus the final step's output variable when it is not itself a
    /// declared output
    ///
    /// # Errors
    /// Rejects non-numeric output types.
    pub fn output_layout(&self) -> Result<PackLayout, CodegenError> {
        let fields = self.output_fields();
        PackLayout::compute("output", fields.iter().map(|(n, t)| (n.as_str(), *t)))
    }

    /// Emit the translation unit
    ///
    /// Deterministic for a given config, except for the cosmetic banner
    /// timestamp (see [`CodegenOptions::timestamp`]).
    ///
    /// # Errors
    /// Requires a computed fingerprint; rejects unmarshallable io types and
    /// malformed numeric literals.
    pub fn generate(&self) -> Result<String, CodegenError> {
        let fingerprint = self
            .config
            .fingerprint()
            .ok_or_else(|| CodegenError::MissingFingerprint(self.config.name.clone()))?;
        let ns = sanitize_identifier(fingerprint);
        let input_layout = self.input_layout()?;
        let output_layout = self.output_layout()?;

        let mut src = String::new();

        // Banner and guard.
        src.push_str("// ------------------------------------------------------------\n");
        src.push_str("// Auto-generated pipeline translation unit. Do not edit.\n");
        let _ = writeln!(src, "// Pipeline:    {}", self.config.name);
        let _ = writeln!(src, "// Fingerprint: {fingerprint}");
        if self.options.timestamp {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(src, "// Generated:   {now}");
        }
        src.push_str("// ------------------------------------------------------------\n\n");
        let _ = writeln!(src, "#ifndef PENSTOCK_GEN_{ns}");
        let _ = writeln!(src, "#define PENSTOCK_GEN_{ns}\n");
        src.push_str("#include <cmath>\n#include <cstdint>\n#include <string>\n#include <vector>\n\n");
        src.push_str("#include \"penstock/ops.hpp\"\n\n");
        src.push_str("namespace penstock {\nnamespace generated {\n");
        let _ = writeln!(src, "namespace {ns} {{\n");

        self.emit_context(&mut src);
        emit_pack(&mut src, "InputPack", &input_layout);
        emit_pack(&mut src, "OutputPack", &output_layout);

        src.push_str("extern \"C\" {\n\n");
        self.emit_entry(&mut src, &ns, &input_layout, &output_layout)?;
        let _ = writeln!(
            src,
            "const char* pipeline_name() {{ return \"{}\"; }}\n",
            escape_cpp(&self.config.name)
        );
        src.push_str("}  // extern \"C\"\n\n");

        let _ = writeln!(src, "}}  // namespace {ns}");
        src.push_str("}  // namespace generated\n}  // namespace penstock\n\n");
        let _ = writeln!(src, "#endif  // PENSTOCK_GEN_{ns}");

        Ok(src)
    }

    /// Emit to a file
    ///
    /// # Errors
    /// Propagates generation errors and surfaces write failures as
    /// [`CodegenError::Io`].
    pub fn write_to(&self, path: &Path) -> Result<(), CodegenError> {
        let source = self.generate()?;
        std::fs::write(path, source).map_err(|source| CodegenError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every context field with its type, in priority order
    /// input > declared variable > step output > output
    fn collect_variables(&self) -> Vec<(String, DataType, Role)> {
        let mut fields: Vec<(String, DataType, Role)> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for input in &self.config.inputs {
            if seen.insert(input.name.clone()) {
                fields.push((input.name.clone(), input.ty, Role::Input));
            }
        }
        for var in &self.config.variables {
            if seen.insert(var.name.clone()) {
                fields.push((var.name.clone(), var.ty, Role::Declared));
            }
        }
        for step in &self.config.steps {
            if seen.insert(step.output_var.clone()) {
                fields.push((
                    step.output_var.clone(),
                    self.registry.infer_output_type(step),
                    Role::StepOutput,
                ));
            }
        }
        for output in &self.config.outputs {
            if seen.insert(output.name.clone()) {
                fields.push((output.name.clone(), output.ty, Role::Output));
            }
        }

        fields
    }

    /// Declared outputs, plus the trailing final-step variable when it is
    /// not itself declared as an output
    fn output_fields(&self) -> Vec<(String, DataType)> {
        let mut fields: Vec<(String, DataType)> = self
            .config
            .outputs
            .iter()
            .map(|f| (f.name.clone(), f.ty))
            .collect();

        if let Some(last) = self.config.steps.last() {
            let declared = self.config.outputs.iter().any(|f| f.name == last.output_var);
            if !declared {
                let ty = self
                    .collect_variables()
                    .into_iter()
                    .find(|(name, _, _)| *name == last.output_var)
                    .map_or(DataType::Double, |(_, ty, _)| ty);
                // Non-numeric results cannot cross the boundary; they stay
                // internal to the generated code.
                if ty.is_numeric() {
                    fields.push((last.output_var.clone(), ty));
                }
            }
        }

        fields
    }

    fn emit_context(&self, src: &mut String) {
        src.push_str("struct PipelineContext {\n");
        let mut current_role = None;
        for (name, ty, role) in self.collect_variables() {
            if current_role != Some(role) {
                let comment = match role {
                    Role::Input => "    // inputs\n",
                    Role::Declared => "    // declared variables\n",
                    Role::StepOutput => "    // step outputs\n",
                    Role::Output => "    // outputs\n",
                };
                src.push_str(comment);
                current_role = Some(role);
            }
            let _ = writeln!(src, "    {} {};", ty.cpp_name(), name);
        }
        src.push_str("};\n\n");
    }

    fn emit_entry(
        &self,
        src: &mut String,
        ns: &str,
        input_layout: &PackLayout,
        output_layout: &PackLayout,
    ) -> Result<(), CodegenError> {
        let _ = writeln!(
            src,
            "bool pipeline_execute_{ns}(const void* input_data, void* output_data) {{"
        );
        src.push_str("    PipelineContext ctx{};\n\n");

        if !input_layout.is_empty() {
            src.push_str("    if (input_data) {\n");
            src.push_str("        const auto* in = static_cast<const InputPack*>(input_data);\n");
            for field in &input_layout.fields {
                let _ = writeln!(src, "        ctx.{0} = in->{0};", field.name);
            }
            src.push_str("    }\n\n");
        }

        for step in &self.config.steps {
            self.emit_step(src, step)?;
        }

        if !output_layout.is_empty() {
            src.push_str("    if (output_data) {\n");
            src.push_str("        auto* out = static_cast<OutputPack*>(output_data);\n");
            for field in &output_layout.fields {
                let _ = writeln!(
                    src,
                    "        out->{0} = static_cast<{1}>(ctx.{0});",
                    field.name,
                    field.ty.cpp_name()
                );
            }
            src.push_str("    }\n\n");
        }

        src.push_str("    return true;\n}\n\n");
        Ok(())
    }

    fn emit_step(&self, src: &mut String, step: &OpCall) -> Result<(), CodegenError> {
        let _ = writeln!(src, "    // {} -> {}", step.op_name, step.output_var);

        let call = match self.registry.lookup(&step.op_name) {
            Some(meta) if meta.type_param => {
                format!(
                    "::penstock::ops::{}<{}>",
                    meta.ident,
                    type_param_spelling(meta.return_type)
                )
            }
            Some(meta) => format!("::penstock::ops::{}", meta.ident),
            // Unregistered operator: emit the name as-is and let the
            // toolchain reject it as an undefined identifier.
            None => format!("::penstock::ops::{}", sanitize_identifier(&step.op_name)),
        };

        let mut args = Vec::with_capacity(step.args.len());
        for arg in &step.args {
            args.push(self.arg_expr(step, arg)?);
        }

        let _ = writeln!(
            src,
            "    ctx.{} = {}({});\n",
            step.output_var,
            call,
            args.join(", ")
        );
        Ok(())
    }

    fn arg_expr(&self, step: &OpCall, arg: &Arg) -> Result<String, CodegenError> {
        match arg {
            Arg::Variable { name, .. } => Ok(format!("ctx.{name}")),
            Arg::Literal { text, ty } => {
                if *ty == DataType::Str {
                    return Ok(format!("\"{}\"", escape_cpp(text)));
                }
                // `inf`/`nan` parse as f64 but are not C++ literals.
                let spelled_numeric = text.parse::<f64>().is_ok()
                    && !text
                        .chars()
                        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E');
                if !spelled_numeric {
                    return Err(CodegenError::InvalidLiteral {
                        op: step.op_name.clone(),
                        text: text.clone(),
                        ty: *ty,
                    });
                }
                // Floating literals keep a decimal point so template
                // deduction sees the intended type.
                let needs_point = matches!(ty, DataType::Double | DataType::Float)
                    && !text.contains(['.', 'e', 'E']);
                if needs_point {
                    Ok(format!("{text}.0"))
                } else {
                    Ok(text.clone())
                }
            }
        }
    }
}

fn emit_pack(src: &mut String, name: &str, layout: &PackLayout) {
    if layout.is_empty() {
        return;
    }
    let _ = writeln!(src, "struct {name} {{");
    for field in &layout.fields {
        let _ = writeln!(src, "    {} {};", field.ty.cpp_name(), field.name);
    }
    src.push_str("};\n\n");
}

/// Spelling of the explicit type parameter, keyed on the operator's output
/// type; non-scalar outputs instantiate at `double`
fn type_param_spelling(ty: DataType) -> &'static str {
    match ty {
        DataType::Int32 => "int32_t",
        DataType::Int64 => "int64_t",
        DataType::Float => "float",
        _ => "double",
    }
}

fn escape_cpp(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IOField;
    use crate::testutil::{chained_demo_config, sign_config};

    fn registry() -> OperatorRegistry {
        OperatorRegistry::with_builtins()
    }

    fn no_timestamp() -> CodegenOptions {
        CodegenOptions { timestamp: false }
    }

    #[test]
    fn emits_entry_under_sanitized_fingerprint() {
        let registry = registry();
        let mut config = chained_demo_config();
        let fp = config.compute_fingerprint().to_string();
        let src = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap();
        let sanitized = sanitize_identifier(&fp);
        assert!(src.contains(&format!(
            "bool pipeline_execute_{sanitized}(const void* input_data, void* output_data)"
        )));
        assert!(src.contains(&format!("namespace {sanitized} {{")));
        assert!(src.contains("pipeline_name()"));
    }

    #[test]
    fn generation_is_deterministic_without_timestamp() {
        let registry = registry();
        let mut config = chained_demo_config();
        config.compute_fingerprint();
        let gen = CodeGenerator::new(&registry, &config, no_timestamp());
        assert_eq!(gen.generate().unwrap(), gen.generate().unwrap());
    }

    #[test]
    fn timestamp_line_is_the_only_variation() {
        let registry = registry();
        let mut config = chained_demo_config();
        config.compute_fingerprint();
        let with = CodeGenerator::new(&registry, &config, CodegenOptions::default())
            .generate()
            .unwrap();
        let without = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap();
        let strip = |s: &str| {
            s.lines()
                .filter(|l| !l.starts_with("// Generated:"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(strip(&with), strip(&without));
    }

    #[test]
    fn context_fields_are_deduped_in_priority_order() {
        let registry = registry();
        let mut config = chained_demo_config();
        config.compute_fingerprint();
        let src = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap();
        // "final" is both a step output and a declared output; the context
        // declares it exactly once.
        assert_eq!(src.matches("double final;").count(), 1);
        assert!(src.contains("double price_a;"));
        assert!(src.contains("int32_t volume;"));
    }

    #[test]
    fn templated_and_plain_calls() {
        let registry = registry();
        let mut config = chained_demo_config();
        config.compute_fingerprint();
        let src = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap();
        assert!(src.contains("::penstock::ops::add_op<double>(ctx.price_a, ctx.price_b)"));
        assert!(src.contains("::penstock::ops::div_op<double>(ctx.p, 100.0)"));

        let mut sign = sign_config();
        sign.compute_fingerprint();
        let src = CodeGenerator::new(&registry, &sign, no_timestamp())
            .generate()
            .unwrap();
        assert!(src.contains("::penstock::ops::get_sign(ctx.x)"));
    }

    #[test]
    fn unregistered_operator_is_emitted_verbatim() {
        let registry = registry();
        let mut config = crate::ir::PipelineConfig::new("bad")
            .step(crate::ir::OpCall::new("nonesuch").output("x"))
            .output(IOField::new("x", DataType::Double));
        config.compute_fingerprint();
        let src = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap();
        assert!(src.contains("::penstock::ops::nonesuch()"));
    }

    #[test]
    fn final_step_output_joins_the_output_pack() {
        let registry = registry();
        // Last step writes `t`, which is not a declared output.
        let mut config = crate::ir::PipelineConfig::new("tail")
            .input(IOField::new("a", DataType::Double))
            .step(
                crate::ir::OpCall::new("square")
                    .output("sq")
                    .arg(crate::ir::Arg::variable("a", DataType::Double)),
            )
            .step(
                crate::ir::OpCall::new("get_sign")
                    .output("t")
                    .arg(crate::ir::Arg::variable("sq", DataType::Double)),
            )
            .output(IOField::new("sq", DataType::Double));
        config.compute_fingerprint();
        let gen = CodeGenerator::new(&registry, &config, no_timestamp());
        let layout = gen.output_layout().unwrap();
        assert_eq!(layout.fields.len(), 2);
        assert_eq!(layout.fields[1].name, "t");
        assert_eq!(layout.fields[1].ty, DataType::Int32);
        let src = gen.generate().unwrap();
        assert!(src.contains("out->t = static_cast<int32_t>(ctx.t);"));
    }

    #[test]
    fn string_io_is_rejected() {
        let registry = registry();
        let mut config = crate::ir::PipelineConfig::new("strio")
            .input(IOField::new("s", DataType::Str))
            .output(IOField::new("s", DataType::Str));
        config.compute_fingerprint();
        let err = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedIoType { .. }));
    }

    #[test]
    fn bad_numeric_literal_is_rejected() {
        let registry = registry();
        let mut config = crate::ir::PipelineConfig::new("lit")
            .step(
                crate::ir::OpCall::new("abs")
                    .output("y")
                    .arg(crate::ir::Arg::literal("drop table", DataType::Double)),
            )
            .output(IOField::new("y", DataType::Double));
        config.compute_fingerprint();
        let err = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap_err();
        assert!(matches!(err, CodegenError::InvalidLiteral { .. }));
    }

    #[test]
    fn string_literals_are_quoted() {
        let registry = registry();
        let mut config = crate::ir::PipelineConfig::new("join")
            .input(IOField::new("xs", DataType::DoubleList))
            .step(
                crate::ir::OpCall::new("list_join")
                    .output("joined")
                    .arg(crate::ir::Arg::variable("xs", DataType::DoubleList))
                    .arg(crate::ir::Arg::literal(",", DataType::Str)),
            );
        config.compute_fingerprint();
        let src = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap();
        assert!(src.contains("::penstock::ops::list_join(ctx.xs, \",\")"));
    }

    #[test]
    fn missing_fingerprint_is_an_error() {
        let registry = registry();
        let config = chained_demo_config();
        let err = CodeGenerator::new(&registry, &config, no_timestamp())
            .generate()
            .unwrap_err();
        assert!(matches!(err, CodegenError::MissingFingerprint(_)));
    }
}
