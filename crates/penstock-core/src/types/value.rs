//! Runtime values for pipeline variables

use std::fmt;

use super::DataType;

/// A tagged runtime value
///
/// There is one variant per non-`Unknown` [`DataType`]; a value's tag must
/// match the declared type of the variable slot holding it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer
    Int32(i32),

    /// 64-bit signed integer
    Int64(i64),

    /// 32-bit floating-point number
    Float(f32),

    /// 64-bit floating-point number
    Double(f64),

    /// Owned string
    Str(String),

    /// List of 32-bit integers
    Int32List(Vec<i32>),

    /// List of 64-bit integers
    Int64List(Vec<i64>),

    /// List of 64-bit floats
    DoubleList(Vec<f64>),

    /// List of strings
    StringList(Vec<String>),
}

impl Value {
    /// The [`DataType`] matching this value's tag
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Str(_) => DataType::Str,
            Value::Int32List(_) => DataType::Int32List,
            Value::Int64List(_) => DataType::Int64List,
            Value::DoubleList(_) => DataType::DoubleList,
            Value::StringList(_) => DataType::StringList,
        }
    }

    /// The config spelling of this value's type, for diagnostics
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.data_type().spelling()
    }

    /// Widen a numeric value to `f64`; `None` for strings and lists
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the string payload, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements for list values, byte length for strings
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.len()),
            Value::Int32List(v) => Some(v.len()),
            Value::Int64List(v) => Some(v.len()),
            Value::DoubleList(v) => Some(v.len()),
            Value::StringList(v) => Some(v.len()),
            _ => None,
        }
    }

    /// True when this is any list variant
    #[must_use]
    pub const fn is_list(&self) -> bool {
        self.data_type().is_list()
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, "]")
        }

        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Int32List(v) => join(f, v),
            Value::Int64List(v) => join(f, v),
            Value::DoubleList(v) => join(f, v),
            Value::StringList(v) => join(f, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_data_type() {
        assert_eq!(Value::Int32(1).data_type(), DataType::Int32);
        assert_eq!(Value::Double(1.5).data_type(), DataType::Double);
        assert_eq!(Value::from("x").data_type(), DataType::Str);
        assert_eq!(Value::DoubleList(vec![1.0]).data_type(), DataType::DoubleList);
    }

    #[test]
    fn numeric_widening() {
        assert_eq!(Value::Int32(7).as_f64(), Some(7.0));
        assert_eq!(Value::Int64(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Double(2.25).as_f64(), Some(2.25));
        assert_eq!(Value::from("nope").as_f64(), None);
        assert_eq!(Value::Int32List(vec![]).as_f64(), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Double(1.5).to_string(), "1.5");
        assert_eq!(Value::Int32List(vec![1, 2, 3]).to_string(), "[1, 2, 3]");
        assert_eq!(Value::from("abc").to_string(), "abc");
    }
}
