//! Field offsets for the marshalling packs
//!
//! The generated entry point reads its inputs from, and writes its outputs
//! to, plain C structs whose fields appear in declaration order. This
//! module computes the offsets the C compiler will choose for those structs
//! (natural alignment, no packing), and is the single source of truth for
//! both the emitter and the executor marshaller.

use crate::types::DataType;

use super::CodegenError;

/// One marshalled field with its resolved offset
#[derive(Debug, Clone, PartialEq)]
pub struct PackField {
    /// Field name (a pipeline variable name)
    pub name: String,

    /// Field type; always a numeric scalar
    pub ty: DataType,

    /// Byte offset from the start of the pack
    pub offset: usize,
}

/// Computed layout of one pack struct
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackLayout {
    /// Fields in declaration order
    pub fields: Vec<PackField>,

    /// Total size in bytes, including trailing padding
    pub size: usize,

    /// Required alignment in bytes
    pub align: usize,
}

impl PackLayout {
    /// Lay out `fields` the way a C compiler lays out a plain struct
    ///
    /// # Errors
    /// Returns [`CodegenError::UnsupportedIoType`] for any non-numeric
    /// field.
    pub fn compute<'a>(
        role: &'static str,
        fields: impl IntoIterator<Item = (&'a str, DataType)>,
    ) -> Result<Self, CodegenError> {
        let mut layout = PackLayout {
            align: 1,
            ..Self::default()
        };
        let mut cursor = 0usize;

        for (name, ty) in fields {
            let (size, align) = scalar_layout(ty).ok_or_else(|| CodegenError::UnsupportedIoType {
                role,
                name: name.to_string(),
                ty,
            })?;
            cursor = align_up(cursor, align);
            layout.fields.push(PackField {
                name: name.to_string(),
                ty,
                offset: cursor,
            });
            cursor += size;
            layout.align = layout.align.max(align);
        }

        layout.size = align_up(cursor, layout.align);
        Ok(layout)
    }

    /// Look up a field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&PackField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True when the pack has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Size and alignment of a marshallable scalar; `None` for everything else
#[must_use]
pub fn scalar_layout(ty: DataType) -> Option<(usize, usize)> {
    match ty {
        DataType::Int32 | DataType::Float => Some((4, 4)),
        DataType::Int64 | DataType::Double => Some((8, 8)),
        _ => None,
    }
}

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}
