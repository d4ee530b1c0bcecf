//! Canonicalization, content fingerprint and the identifier sanitizer
//!
//! The canonical form covers everything that shapes the generated entry:
//! the pipeline name, inputs, declared variables, each step with its args
//! and options, and the declared outputs. Two configs with equal canonical
//! forms compile to byte-identical source (modulo the cosmetic timestamp),
//! so the fingerprint is a sound compile-cache key.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use super::config::PipelineConfig;

/// Hex length of the stored fingerprint
const FINGERPRINT_LEN: usize = 16;

/// Placeholder identifier for an empty fingerprint
const EMPTY_IDENT: &str = "p_invalid";

/// Render the canonical form of a config
///
/// Layout:
/// `name|in:a:double,|var:t:double,|step:add(a,b)->t;|out:t:double,`
/// with step options, when present, appended as `[k=v,...]` before the `;`.
#[must_use]
pub fn canonical_form(config: &PipelineConfig) -> String {
    let mut s = String::new();
    s.push_str(&config.name);

    s.push_str("|in:");
    for field in &config.inputs {
        let _ = write!(s, "{}:{},", field.name, field.ty);
    }

    s.push_str("|var:");
    for field in &config.variables {
        let _ = write!(s, "{}:{},", field.name, field.ty);
    }

    s.push_str("|step:");
    for step in &config.steps {
        s.push_str(&step.op_name);
        s.push('(');
        for (i, arg) in step.args.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            s.push_str(arg.canonical_text());
        }
        s.push_str(")->");
        s.push_str(&step.output_var);
        if !step.options.is_empty() {
            s.push('[');
            for (k, v) in &step.options {
                let _ = write!(s, "{k}={v},");
            }
            s.push(']');
        }
        s.push(';');
    }

    s.push_str("|out:");
    for field in &config.outputs {
        let _ = write!(s, "{}:{},", field.name, field.ty);
    }

    s
}

/// Hash the canonical form into the stored fingerprint
#[must_use]
pub(crate) fn fingerprint(config: &PipelineConfig) -> String {
    let digest = Sha256::digest(canonical_form(config).as_bytes());
    let mut hex = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Turn an arbitrary string into a valid C identifier
///
/// Deterministic, and applied identically at code-emission time and at
/// symbol-resolution time: the empty string maps to a fixed placeholder, a
/// leading digit gets a `p_` prefix, and every character outside
/// `[A-Za-z0-9_]` becomes `_`.
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    if raw.is_empty() {
        return EMPTY_IDENT.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 2);
    if raw.as_bytes()[0].is_ascii_digit() {
        out.push_str("p_");
    }
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}
