//! Penstock CLI - run, inspect and fingerprint dataflow pipelines
//!
//! ```text
//! penstock run demo.json --mode jit --input price_a=100 --input price_b=50 --input volume=10
//! penstock emit demo.json
//! penstock fingerprint demo.json
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use penstock_core::codegen::{CodeGenerator, CodegenOptions};
use penstock_core::ir::json;
use penstock_core::{
    DataType, Engine, EngineOptions, Environment, IOField, Mode, OperatorRegistry, Value,
};

#[derive(Parser)]
#[command(name = "penstock")]
#[command(version = penstock_core::VERSION)]
#[command(about = "Configuration-driven dataflow pipelines, interpreted or JIT-compiled", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline config against the given inputs
    Run {
        /// Path to the pipeline JSON
        config: PathBuf,

        /// Execution back-end
        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,

        /// Input binding `name=value`; list values are comma-separated
        #[arg(long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Cache directory for artifacts and emitted source
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Include path for the operator library header
        #[arg(long)]
        include_dir: Option<PathBuf>,
    },

    /// Print the C++ translation unit generated for a pipeline
    Emit {
        /// Path to the pipeline JSON
        config: PathBuf,
    },

    /// Print a pipeline's fingerprint
    Fingerprint {
        /// Path to the pipeline JSON
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Interpreter,
    Jit,
    Auto,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Interpreter => Mode::Interpreter,
            ModeArg::Jit => Mode::Jit,
            ModeArg::Auto => Mode::Auto,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            mode,
            inputs,
            cache_dir,
            include_dir,
        } => run(&config, mode.into(), &inputs, cache_dir, include_dir),
        Commands::Emit { config } => emit(&config),
        Commands::Fingerprint { config } => fingerprint(&config),
    }
}

fn run(
    config_path: &PathBuf,
    mode: Mode,
    inputs: &[String],
    cache_dir: Option<PathBuf>,
    include_dir: Option<PathBuf>,
) -> Result<()> {
    let config = json::from_file(config_path)
        .with_context(|| format!("loading pipeline config {}", config_path.display()))?;

    let mut options = EngineOptions::default();
    if let Some(dir) = cache_dir {
        options.cache_dir = dir;
    }
    if let Some(dir) = include_dir {
        options.include_dir = dir;
    }
    let engine = Engine::with_options(options);

    let mut env = Environment::new();
    for binding in inputs {
        let (name, text) = binding
            .split_once('=')
            .with_context(|| format!("input '{binding}' is not of the form name=value"))?;
        let field = config
            .inputs
            .iter()
            .find(|f| f.name == name)
            .with_context(|| format!("pipeline '{}' has no input '{name}'", config.name))?;
        env.set(name, parse_input(field, text)?);
    }

    for field in &config.inputs {
        if field.required && !env.contains(&field.name) {
            bail!("required input '{}' is not bound; pass --input {}=<value>", field.name, field.name);
        }
    }

    let outputs: Vec<String> = config.outputs.iter().map(|f| f.name.clone()).collect();
    let mut exec = engine
        .executor(config, mode)
        .context("building pipeline executor")?;

    tracing::info!(pipeline = exec.name(), fingerprint = exec.fingerprint(), "executing");
    exec.execute(&mut env).context("executing pipeline")?;

    for name in outputs {
        match env.get(&name) {
            Some(value) => println!("{name} = {value}"),
            None => println!("{name} = <unset>"),
        }
    }
    Ok(())
}

fn emit(config_path: &PathBuf) -> Result<()> {
    let mut config = json::from_file(config_path)
        .with_context(|| format!("loading pipeline config {}", config_path.display()))?;
    config.compute_fingerprint();

    let registry = OperatorRegistry::with_builtins();
    let source = CodeGenerator::new(&registry, &config, CodegenOptions::default())
        .generate()
        .context("generating pipeline source")?;
    print!("{source}");
    Ok(())
}

fn fingerprint(config_path: &PathBuf) -> Result<()> {
    let mut config = json::from_file(config_path)
        .with_context(|| format!("loading pipeline config {}", config_path.display()))?;
    println!("{}", config.compute_fingerprint());
    Ok(())
}

fn parse_input(field: &IOField, text: &str) -> Result<Value> {
    let parse_err = || format!("input '{}' is not a valid {}", field.name, field.ty);
    let value = match field.ty {
        DataType::Int32 => Value::Int32(text.parse().with_context(parse_err)?),
        DataType::Int64 => Value::Int64(text.parse().with_context(parse_err)?),
        DataType::Float => Value::Float(text.parse().with_context(parse_err)?),
        DataType::Double => Value::Double(text.parse().with_context(parse_err)?),
        DataType::Str => Value::Str(text.to_string()),
        DataType::Int32List => Value::Int32List(parse_list(text).with_context(parse_err)?),
        DataType::Int64List => Value::Int64List(parse_list(text).with_context(parse_err)?),
        DataType::DoubleList => Value::DoubleList(parse_list(text).with_context(parse_err)?),
        DataType::StringList => {
            Value::StringList(text.split(',').map(str::to_string).collect())
        }
        DataType::Unknown => bail!("input '{}' has unresolved type", field.name),
    };
    Ok(value)
}

fn parse_list<T: std::str::FromStr>(text: &str) -> Result<Vec<T>, T::Err> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',').map(str::parse).collect()
}
