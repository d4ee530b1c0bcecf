//! Executor handles for the two back-ends

use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::codegen::{PackField, PackLayout};
use crate::interp::{ExecError, Interpreter};
use crate::ir::PipelineConfig;
use crate::jit::JitError;
use crate::ops::OperatorRegistry;
use crate::types::{DataType, Environment, Value};

use super::{EngineError, JitShared};

/// A runnable pipeline bound to one back-end
pub trait PipelineExecutor {
    /// Run the pipeline against `env`
    ///
    /// On failure the environment may be partially written; it is not
    /// transactional.
    ///
    /// # Errors
    /// See [`EngineError`].
    fn execute(&mut self, env: &mut Environment) -> Result<(), EngineError>;

    /// Pipeline name
    fn name(&self) -> &str;

    /// Pipeline fingerprint
    fn fingerprint(&self) -> &str;

    /// True exactly when no valid cache entry exists for the fingerprint
    fn needs_recompile(&self) -> bool;
}

/// Interpreter-backed executor
pub(super) struct InterpreterExecutor {
    interp: Interpreter,
    fingerprint: String,
}

impl InterpreterExecutor {
    pub(super) fn new(interp: Interpreter, fingerprint: String) -> Self {
        Self {
            interp,
            fingerprint,
        }
    }
}

impl PipelineExecutor for InterpreterExecutor {
    fn execute(&mut self, env: &mut Environment) -> Result<(), EngineError> {
        self.interp.run(env)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.interp.config().name
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn needs_recompile(&self) -> bool {
        false
    }
}

/// JIT-backed executor sharing the engine's cache and loader
pub(super) struct JitExecutor {
    registry: Arc<OperatorRegistry>,
    shared: Arc<Mutex<JitShared>>,
    config: PipelineConfig,
    fingerprint: String,
    input_layout: PackLayout,
    output_layout: PackLayout,
}

impl JitExecutor {
    pub(super) fn new(
        registry: Arc<OperatorRegistry>,
        shared: Arc<Mutex<JitShared>>,
        config: PipelineConfig,
        fingerprint: String,
        input_layout: PackLayout,
        output_layout: PackLayout,
    ) -> Self {
        Self {
            registry,
            shared,
            config,
            fingerprint,
            input_layout,
            output_layout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, JitShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fill the input buffer from the environment
    fn marshal_inputs(&self, env: &Environment) -> Result<Vec<u64>, EngineError> {
        let mut buffer = alloc_pack(&self.input_layout);
        if buffer.is_empty() {
            return Ok(buffer);
        }
        let bytes = pack_bytes_mut(&mut buffer);

        for field in &self.input_layout.fields {
            let required = self
                .config
                .inputs
                .iter()
                .find(|f| f.name == field.name)
                .is_none_or(|f| f.required);

            match env.get(&field.name) {
                Some(value) => {
                    write_field(bytes, field, value).ok_or_else(|| {
                        ExecError::TypeMismatch {
                            op: "input marshalling".to_string(),
                            detail: format!(
                                "input '{}' is declared {} but holds {}",
                                field.name,
                                field.ty,
                                value.type_name()
                            ),
                        }
                    })?;
                }
                None if required => {
                    return Err(ExecError::VariableNotFound(field.name.clone()).into())
                }
                // Optional and unbound: the slot stays zeroed.
                None => {}
            }
        }
        Ok(buffer)
    }

    /// Copy the output buffer back into the environment under declared
    /// names and types
    fn unmarshal_outputs(&self, buffer: &[u64], env: &mut Environment) {
        if buffer.is_empty() {
            return;
        }
        let bytes = pack_bytes(buffer);
        for field in &self.output_layout.fields {
            if let Some(value) = read_field(bytes, field) {
                env.set(field.name.clone(), value);
            }
        }
    }
}

impl PipelineExecutor for JitExecutor {
    fn execute(&mut self, env: &mut Environment) -> Result<(), EngineError> {
        // Marshalling happens outside the lock; only compile, load and the
        // entry call itself hold it.
        let input_buffer = self.marshal_inputs(env)?;
        let mut output_buffer = alloc_pack(&self.output_layout);

        {
            let mut guard = self.lock();
            let shared = &mut *guard;

            if shared.cache.artifact_path(&self.fingerprint).is_none() {
                shared.cache.compile(
                    &self.registry,
                    &self.config,
                    &shared.gen,
                    &shared.toolchain,
                    &shared.include_dir,
                )?;
            }

            let artifact = shared
                .cache
                .artifact_path(&self.fingerprint)
                .ok_or_else(|| JitError::ArtifactMissing(self.fingerprint.clone()))?;

            if !shared.loader.is_loaded(&self.fingerprint) {
                shared.loader.load(&self.fingerprint, &artifact)?;
            }

            let input_ptr: *const c_void = if input_buffer.is_empty() {
                std::ptr::null()
            } else {
                input_buffer.as_ptr().cast()
            };
            let output_ptr: *mut c_void = if output_buffer.is_empty() {
                std::ptr::null_mut()
            } else {
                output_buffer.as_mut_ptr().cast()
            };

            // SAFETY: both buffers were sized and aligned by the same
            // PackLayout the generated structs were emitted from, and they
            // outlive the call.
            let ok = unsafe {
                shared
                    .loader
                    .execute(&self.fingerprint, input_ptr, output_ptr)?
            };
            if !ok {
                return Err(EngineError::ExecutionFailure(self.config.name.clone()));
            }
        }

        self.unmarshal_outputs(&output_buffer, env);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn needs_recompile(&self) -> bool {
        self.lock().cache.artifact_path(&self.fingerprint).is_none()
    }
}

/// Allocate a zeroed, 8-byte-aligned buffer for a pack
fn alloc_pack(layout: &PackLayout) -> Vec<u64> {
    vec![0u64; layout.size.div_ceil(8)]
}

/// Byte view over a pack buffer
fn pack_bytes(buffer: &[u64]) -> &[u8] {
    // SAFETY: reinterpreting u64 storage as bytes; same allocation, length
    // scaled by the element size.
    unsafe { std::slice::from_raw_parts(buffer.as_ptr().cast::<u8>(), buffer.len() * 8) }
}

/// Mutable byte view over a pack buffer
fn pack_bytes_mut(buffer: &mut [u64]) -> &mut [u8] {
    // SAFETY: as `pack_bytes`, with exclusive access inherited from the
    // mutable borrow.
    unsafe { std::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), buffer.len() * 8) }
}

/// Write one value at its field offset, converting to the declared type;
/// `None` when the value has no numeric reading
fn write_field(bytes: &mut [u8], field: &PackField, value: &Value) -> Option<()> {
    let off = field.offset;
    match field.ty {
        DataType::Int32 => {
            let v = match value {
                Value::Int32(v) => *v,
                Value::Int64(v) => *v as i32,
                other => other.as_f64()? as i32,
            };
            bytes[off..off + 4].copy_from_slice(&v.to_ne_bytes());
        }
        DataType::Int64 => {
            let v = match value {
                Value::Int32(v) => i64::from(*v),
                Value::Int64(v) => *v,
                other => other.as_f64()? as i64,
            };
            bytes[off..off + 8].copy_from_slice(&v.to_ne_bytes());
        }
        DataType::Float => {
            let v = value.as_f64()? as f32;
            bytes[off..off + 4].copy_from_slice(&v.to_ne_bytes());
        }
        DataType::Double => {
            let v = value.as_f64()?;
            bytes[off..off + 8].copy_from_slice(&v.to_ne_bytes());
        }
        _ => return None,
    }
    Some(())
}

/// Read one value from its field offset
fn read_field(bytes: &[u8], field: &PackField) -> Option<Value> {
    let off = field.offset;
    match field.ty {
        DataType::Int32 => {
            let raw = bytes.get(off..off + 4)?.try_into().ok()?;
            Some(Value::Int32(i32::from_ne_bytes(raw)))
        }
        DataType::Int64 => {
            let raw = bytes.get(off..off + 8)?.try_into().ok()?;
            Some(Value::Int64(i64::from_ne_bytes(raw)))
        }
        DataType::Float => {
            let raw = bytes.get(off..off + 4)?.try_into().ok()?;
            Some(Value::Float(f32::from_ne_bytes(raw)))
        }
        DataType::Double => {
            let raw = bytes.get(off..off + 8)?.try_into().ok()?;
            Some(Value::Double(f64::from_ne_bytes(raw)))
        }
        _ => None,
    }
}
