//! Operator registry
//!
//! One table is the authority for every operator a pipeline may invoke.
//! Each entry carries the metadata the code generator needs (emitted
//! function identifier, return type, arity, type-parameter rule) and the
//! scalar kernel the interpreter dispatches to, so the two back-ends cannot
//! drift apart. The table is immutable once built.

mod kernels;

use std::collections::HashMap;

use crate::ir::OpCall;
use crate::types::{DataType, Value};

/// An interpreter kernel: resolved args in, value out
///
/// Kernels report extraction and arity problems as plain strings; the
/// interpreter wraps them into its error type.
pub type KernelFn = fn(&[Value]) -> Result<Value, String>;

/// Metadata and runtime kernel for one operator
#[derive(Clone)]
pub struct OperatorMetadata {
    /// Public name used in configs
    pub name: &'static str,

    /// Function identifier emitted into generated source
    pub ident: &'static str,

    /// Declared return type
    pub return_type: DataType,

    /// Full parameter count; calls may pass fewer where the native
    /// signature has trailing defaults, never more
    pub arity: usize,

    /// Whether the emitted call takes an explicit type parameter
    pub type_param: bool,

    /// Scalar kernel backing the interpreter
    pub kernel: KernelFn,
}

impl std::fmt::Debug for OperatorMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorMetadata")
            .field("name", &self.name)
            .field("ident", &self.ident)
            .field("return_type", &self.return_type)
            .field("arity", &self.arity)
            .field("type_param", &self.type_param)
            .finish()
    }
}

/// The operator table shared by the interpreter and the code generator
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    table: HashMap<&'static str, OperatorMetadata>,
}

impl OperatorRegistry {
    /// Build the registry with every built-in operator
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();

        // Arithmetic, templated on the output type.
        registry.register("add", "add_op", DataType::Double, 2, true, kernels::add);
        registry.register("sub", "sub_op", DataType::Double, 2, true, kernels::sub);
        registry.register("mul", "mul_op", DataType::Double, 2, true, kernels::mul);
        registry.register("div", "div_op", DataType::Double, 2, true, kernels::div);
        registry.register("max", "max_op", DataType::Double, 2, true, kernels::max);
        registry.register("min", "min_op", DataType::Double, 2, true, kernels::min);
        registry.register("abs", "abs_op", DataType::Double, 1, true, kernels::abs);
        registry.register("square", "square_op", DataType::Double, 1, true, kernels::square);
        registry.register("sqrt", "sqrt_op", DataType::Double, 1, true, kernels::sqrt);
        registry.register("floor", "floor_op", DataType::Int32, 1, true, kernels::floor);
        registry.register("ceil", "ceil_op", DataType::Int32, 1, true, kernels::ceil);

        // Branching and ratios.
        registry.register("if_else", "if_else", DataType::Double, 3, false, kernels::if_else);
        registry.register("percent", "percent_op", DataType::Double, 2, false, kernels::percent);

        // Domain scalars.
        registry.register("get_sign", "get_sign", DataType::Int32, 1, false, kernels::get_sign);
        registry.register(
            "price_delta",
            "price_delta",
            DataType::Double,
            2,
            false,
            kernels::price_delta,
        );
        registry.register(
            "log_bucket",
            "log_bucket",
            DataType::Int64,
            5,
            false,
            kernels::log_bucket,
        );

        // Sanctioned type conversions.
        registry.register(
            "direct_output_int32",
            "direct_output_int32",
            DataType::Int32,
            1,
            true,
            kernels::direct_output_int32,
        );
        registry.register(
            "direct_output_int64",
            "direct_output_int64",
            DataType::Int64,
            1,
            true,
            kernels::direct_output_int64,
        );
        registry.register(
            "direct_output_double",
            "direct_output_double",
            DataType::Double,
            1,
            true,
            kernels::direct_output_double,
        );
        registry.register(
            "direct_output_string",
            "direct_output_string",
            DataType::Str,
            1,
            true,
            kernels::direct_output_string,
        );

        // Container operators.
        registry.register("len", "list_len", DataType::Int64, 1, false, kernels::len);
        registry.register("list_join", "list_join", DataType::Str, 2, false, kernels::list_join);
        registry.register(
            "list_contains",
            "list_contains",
            DataType::Int32,
            2,
            false,
            kernels::list_contains,
        );
        registry.register(
            "list_count",
            "list_count",
            DataType::Int32,
            2,
            false,
            kernels::list_count,
        );
        registry.register(
            "moving_average",
            "moving_average",
            DataType::Double,
            2,
            false,
            kernels::moving_average,
        );
        registry.register(
            "vector_sum",
            "vector_sum",
            DataType::Double,
            1,
            false,
            kernels::vector_sum,
        );
        registry.register(
            "vector_avg",
            "vector_avg",
            DataType::Double,
            1,
            false,
            kernels::vector_avg,
        );

        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        ident: &'static str,
        return_type: DataType,
        arity: usize,
        type_param: bool,
        kernel: KernelFn,
    ) {
        let previous = self.table.insert(
            name,
            OperatorMetadata {
                name,
                ident,
                return_type,
                arity,
                type_param,
                kernel,
            },
        );
        assert!(previous.is_none(), "duplicate operator registration: {name}");
    }

    /// Look up an operator by its config name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&OperatorMetadata> {
        self.table.get(name)
    }

    /// True when `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// All registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Output type of a step: the registered return type, or `double` for
    /// an unregistered operator
    ///
    /// The fallback exists for the code generator's variable collector; the
    /// interpreter never guesses and rejects unknown operators instead.
    #[must_use]
    pub fn infer_output_type(&self, step: &OpCall) -> DataType {
        self.lookup(&step.op_name)
            .map_or(DataType::Double, |meta| meta.return_type)
    }
}
