//! Data types, runtime values and the variable environment
//!
//! Every variable in a pipeline carries one of a closed set of scalar or
//! list types. The same [`DataType`] table drives the config surface (type
//! spellings), the interpreter (value tags) and the code generator (C++
//! spellings), so the three can never disagree on what a type is called.

mod env;
mod value;

pub use env::Environment;
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of data types a pipeline variable may have
///
/// `Unknown` exists only so the config surface can represent a not-yet
/// inferred type; the interpreter and the code generator both reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int32,
    Int64,
    Float,
    Double,
    #[serde(rename = "string")]
    Str,
    Int32List,
    Int64List,
    DoubleList,
    StringList,
    Unknown,
}

impl DataType {
    /// The spelling used in configs (`int32`, `double_list`, ...)
    #[must_use]
    pub const fn spelling(self) -> &'static str {
        match self {
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Str => "string",
            DataType::Int32List => "int32_list",
            DataType::Int64List => "int64_list",
            DataType::DoubleList => "double_list",
            DataType::StringList => "string_list",
            DataType::Unknown => "unknown",
        }
    }

    /// Parse a config spelling; anything unrecognized maps to `Unknown`
    #[must_use]
    pub fn from_spelling(spelling: &str) -> Self {
        match spelling {
            "int32" => DataType::Int32,
            "int64" => DataType::Int64,
            "float" => DataType::Float,
            "double" => DataType::Double,
            "string" => DataType::Str,
            "int32_list" => DataType::Int32List,
            "int64_list" => DataType::Int64List,
            "double_list" => DataType::DoubleList,
            "string_list" => DataType::StringList,
            _ => DataType::Unknown,
        }
    }

    /// The C++ spelling used in emitted source
    #[must_use]
    pub const fn cpp_name(self) -> &'static str {
        match self {
            DataType::Int32 => "int32_t",
            DataType::Int64 => "int64_t",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Str => "std::string",
            DataType::Int32List => "std::vector<int32_t>",
            DataType::Int64List => "std::vector<int64_t>",
            DataType::DoubleList => "std::vector<double>",
            DataType::StringList => "std::vector<std::string>",
            DataType::Unknown => "void",
        }
    }

    /// True for the four list variants
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(
            self,
            DataType::Int32List
                | DataType::Int64List
                | DataType::DoubleList
                | DataType::StringList
        )
    }

    /// True for the numeric scalar variants
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float | DataType::Double
        )
    }

    /// Element type of a list variant, `None` otherwise
    #[must_use]
    pub const fn element_type(self) -> Option<DataType> {
        match self {
            DataType::Int32List => Some(DataType::Int32),
            DataType::Int64List => Some(DataType::Int64),
            DataType::DoubleList => Some(DataType::Double),
            DataType::StringList => Some(DataType::Str),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_round_trips() {
        for ty in [
            DataType::Int32,
            DataType::Int64,
            DataType::Float,
            DataType::Double,
            DataType::Str,
            DataType::Int32List,
            DataType::Int64List,
            DataType::DoubleList,
            DataType::StringList,
        ] {
            assert_eq!(DataType::from_spelling(ty.spelling()), ty);
        }
    }

    #[test]
    fn unrecognized_spelling_is_unknown() {
        assert_eq!(DataType::from_spelling("quaternion"), DataType::Unknown);
        assert_eq!(DataType::from_spelling(""), DataType::Unknown);
    }

    #[test]
    fn list_projection() {
        assert!(DataType::DoubleList.is_list());
        assert!(!DataType::Double.is_list());
        assert_eq!(DataType::Int32List.element_type(), Some(DataType::Int32));
        assert_eq!(DataType::StringList.element_type(), Some(DataType::Str));
        assert_eq!(DataType::Double.element_type(), None);
    }

    #[test]
    fn serde_spellings_match_table() {
        let json = serde_json::to_string(&DataType::Str).unwrap();
        assert_eq!(json, "\"string\"");
        let ty: DataType = serde_json::from_str("\"int32_list\"").unwrap();
        assert_eq!(ty, DataType::Int32List);
    }
}
