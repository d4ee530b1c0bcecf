//! Scalar kernels backing the interpreter
//!
//! Each kernel mirrors the C++ template the code generator emits for the
//! same operator, instantiated the way a generated pipeline instantiates
//! it. The conformance suite pins the two implementations together.

use crate::types::Value;

/// Extract a required numeric argument, widened to `f64`
fn num(op: &str, args: &[Value], idx: usize) -> Result<f64, String> {
    match args.get(idx) {
        Some(v) => v
            .as_f64()
            .ok_or_else(|| format!("{op}: argument {idx} expected a number, got {}", v.type_name())),
        None => Err(format!("{op}: missing argument {idx}")),
    }
}

/// Extract an optional numeric argument, falling back to a default
fn num_or(op: &str, args: &[Value], idx: usize, default: f64) -> Result<f64, String> {
    if idx < args.len() {
        num(op, args, idx)
    } else {
        Ok(default)
    }
}

/// Extract a required string argument
fn str_arg<'a>(op: &str, args: &'a [Value], idx: usize) -> Result<&'a str, String> {
    match args.get(idx) {
        Some(v) => v
            .as_str()
            .ok_or_else(|| format!("{op}: argument {idx} expected a string, got {}", v.type_name())),
        None => Err(format!("{op}: missing argument {idx}")),
    }
}

/// Extract a required double-list argument
fn double_list<'a>(op: &str, args: &'a [Value], idx: usize) -> Result<&'a [f64], String> {
    match args.get(idx) {
        Some(Value::DoubleList(v)) => Ok(v),
        Some(v) => Err(format!(
            "{op}: argument {idx} expected a double_list, got {}",
            v.type_name()
        )),
        None => Err(format!("{op}: missing argument {idx}")),
    }
}

pub(super) fn add(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Double(num("add", args, 0)? + num("add", args, 1)?))
}

pub(super) fn sub(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Double(num("sub", args, 0)? - num("sub", args, 1)?))
}

pub(super) fn mul(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Double(num("mul", args, 0)? * num("mul", args, 1)?))
}

pub(super) fn div(args: &[Value]) -> Result<Value, String> {
    let a = num("div", args, 0)?;
    let b = num("div", args, 1)?;
    Ok(Value::Double(if b == 0.0 { 0.0 } else { a / b }))
}

pub(super) fn max(args: &[Value]) -> Result<Value, String> {
    let a = num("max", args, 0)?;
    let b = num("max", args, 1)?;
    Ok(Value::Double(if a > b { a } else { b }))
}

pub(super) fn min(args: &[Value]) -> Result<Value, String> {
    let a = num("min", args, 0)?;
    let b = num("min", args, 1)?;
    Ok(Value::Double(if a < b { a } else { b }))
}

pub(super) fn abs(args: &[Value]) -> Result<Value, String> {
    let v = num("abs", args, 0)?;
    Ok(Value::Double(if v >= 0.0 { v } else { -v }))
}

pub(super) fn square(args: &[Value]) -> Result<Value, String> {
    let v = num("square", args, 0)?;
    Ok(Value::Double(v * v))
}

pub(super) fn sqrt(args: &[Value]) -> Result<Value, String> {
    let v = num("sqrt", args, 0)?;
    Ok(Value::Double(if v < 0.0 { 0.0 } else { v.sqrt() }))
}

pub(super) fn floor(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int32(num("floor", args, 0)?.floor() as i32))
}

pub(super) fn ceil(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int32(num("ceil", args, 0)?.ceil() as i32))
}

pub(super) fn if_else(args: &[Value]) -> Result<Value, String> {
    let cond = num("if_else", args, 0)?;
    let true_val = num("if_else", args, 1)?;
    let false_val = num("if_else", args, 2)?;
    Ok(Value::Double(if cond != 0.0 { true_val } else { false_val }))
}

pub(super) fn percent(args: &[Value]) -> Result<Value, String> {
    let part = num("percent", args, 0)?;
    let total = num("percent", args, 1)?;
    Ok(Value::Double(if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }))
}

pub(super) fn get_sign(args: &[Value]) -> Result<Value, String> {
    let v = num("get_sign", args, 0)?;
    Ok(Value::Int32(if v < 0.0 {
        -1
    } else if v > 0.0 {
        1
    } else {
        0
    }))
}

pub(super) fn price_delta(args: &[Value]) -> Result<Value, String> {
    let discount = num("price_delta", args, 0)?;
    let original = num("price_delta", args, 1)?;
    Ok(Value::Double(if discount == 0.0 {
        0.0
    } else {
        discount - original
    }))
}

/// Piecewise-logarithmic bucketing: linear buckets of width `inter1` up to
/// `threshold1`, width `inter2` up to `threshold2`, log-spaced (base 1.5)
/// beyond. Sign of the input is preserved.
pub(super) fn log_bucket(args: &[Value]) -> Result<Value, String> {
    let origin = num("log_bucket", args, 0)?;
    let inter1 = num_or("log_bucket", args, 1, 1000.0)? as i64;
    let threshold1 = num_or("log_bucket", args, 2, 15_000.0)? as i64;
    let inter2 = num_or("log_bucket", args, 3, 5000.0)? as i64;
    let threshold2 = num_or("log_bucket", args, 4, 250_000.0)? as i64;

    if inter1 <= 0 || inter2 <= 0 {
        return Err("log_bucket: bucket widths must be positive".to_string());
    }
    if origin == 0.0 {
        return Ok(Value::Int64(0));
    }

    let ori_abs = origin.abs() as i64;
    let signed = |res: i64| if origin >= 0.0 { res } else { -res };

    if ori_abs <= threshold1 {
        return Ok(Value::Int64(signed(ori_abs / inter1 + 1)));
    }

    if ori_abs <= threshold2 {
        let start = threshold1 / inter1 + 1;
        return Ok(Value::Int64(signed(start + (ori_abs - threshold1) / inter2 + 1)));
    }

    let start = threshold1 / inter1 + 1 + (threshold2 - threshold1) / inter2 + 1;
    let real_log = ori_abs / inter2;
    let res = start + ((real_log as f64).ln() / 1.5f64.ln()) as i64;
    Ok(Value::Int64(signed(res)))
}

pub(super) fn direct_output_int32(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int32(num("direct_output_int32", args, 0)? as i32))
}

pub(super) fn direct_output_int64(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int64(num("direct_output_int64", args, 0)? as i64))
}

pub(super) fn direct_output_double(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Double(num("direct_output_double", args, 0)?))
}

pub(super) fn direct_output_string(args: &[Value]) -> Result<Value, String> {
    let v = num("direct_output_string", args, 0)?;
    // Integer-valued doubles print without a fractional part, matching the
    // stream formatting of the native library.
    if v.fract() == 0.0 && v.abs() < 1e15 {
        Ok(Value::Str(format!("{}", v as i64)))
    } else {
        Ok(Value::Str(format!("{v}")))
    }
}

pub(super) fn len(args: &[Value]) -> Result<Value, String> {
    match args.first() {
        Some(v) => match v.len() {
            Some(n) => Ok(Value::Int64(n as i64)),
            None => Err(format!("len: expected a list or string, got {}", v.type_name())),
        },
        None => Err("len: missing argument 0".to_string()),
    }
}

pub(super) fn list_join(args: &[Value]) -> Result<Value, String> {
    let delimiter = if args.len() > 1 {
        str_arg("list_join", args, 1)?
    } else {
        "|"
    };
    let joined = match args.first() {
        Some(Value::Int32List(v)) => join(v, delimiter),
        Some(Value::Int64List(v)) => join(v, delimiter),
        Some(Value::DoubleList(v)) => join(v, delimiter),
        Some(Value::StringList(v)) => join(v, delimiter),
        Some(v) => {
            return Err(format!("list_join: argument 0 expected a list, got {}", v.type_name()))
        }
        None => return Err("list_join: missing argument 0".to_string()),
    };
    Ok(Value::Str(joined))
}

fn join<T: std::fmt::Display>(items: &[T], delimiter: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(delimiter)
}

pub(super) fn list_contains(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int32(i32::from(count_matches("list_contains", args)? > 0)))
}

pub(super) fn list_count(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int32(count_matches("list_count", args)?))
}

fn count_matches(op: &str, args: &[Value]) -> Result<i32, String> {
    let needle = args
        .get(1)
        .ok_or_else(|| format!("{op}: missing argument 1"))?;
    let count = match args.first() {
        Some(Value::Int32List(v)) => {
            let n = needle
                .as_f64()
                .ok_or_else(|| format!("{op}: argument 1 expected a number"))?;
            v.iter().filter(|x| f64::from(**x) == n).count()
        }
        Some(Value::Int64List(v)) => {
            let n = needle
                .as_f64()
                .ok_or_else(|| format!("{op}: argument 1 expected a number"))?;
            v.iter().filter(|x| **x as f64 == n).count()
        }
        Some(Value::DoubleList(v)) => {
            let n = needle
                .as_f64()
                .ok_or_else(|| format!("{op}: argument 1 expected a number"))?;
            v.iter().filter(|x| **x == n).count()
        }
        Some(Value::StringList(v)) => {
            let n = needle
                .as_str()
                .ok_or_else(|| format!("{op}: argument 1 expected a string"))?;
            v.iter().filter(|x| x.as_str() == n).count()
        }
        Some(v) => return Err(format!("{op}: argument 0 expected a list, got {}", v.type_name())),
        None => return Err(format!("{op}: missing argument 0")),
    };
    Ok(count as i32)
}

pub(super) fn moving_average(args: &[Value]) -> Result<Value, String> {
    let history = double_list("moving_average", args, 0)?;
    let window = num("moving_average", args, 1)? as i64;
    if history.is_empty() || window <= 0 {
        return Ok(Value::Double(0.0));
    }
    let start = history.len().saturating_sub(window as usize);
    let tail = &history[start..];
    Ok(Value::Double(tail.iter().sum::<f64>() / tail.len() as f64))
}

pub(super) fn vector_sum(args: &[Value]) -> Result<Value, String> {
    let v = double_list("vector_sum", args, 0)?;
    Ok(Value::Double(v.iter().sum()))
}

pub(super) fn vector_avg(args: &[Value]) -> Result<Value, String> {
    let v = double_list("vector_avg", args, 0)?;
    if v.is_empty() {
        return Ok(Value::Double(0.0));
    }
    Ok(Value::Double(v.iter().sum::<f64>() / v.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: f64) -> Value {
        Value::Double(v)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(add(&[d(100.0), d(50.0)]).unwrap(), d(150.0));
        assert_eq!(sub(&[d(3.0), d(5.0)]).unwrap(), d(-2.0));
        assert_eq!(mul(&[d(1.5), d(4.0)]).unwrap(), d(6.0));
        assert_eq!(div(&[d(150.0), d(10.0)]).unwrap(), d(15.0));
    }

    #[test]
    fn div_by_zero_is_zero() {
        assert_eq!(div(&[d(5.0), d(0.0)]).unwrap(), d(0.0));
    }

    #[test]
    fn sign_dispatch() {
        assert_eq!(get_sign(&[d(-7.0)]).unwrap(), Value::Int32(-1));
        assert_eq!(get_sign(&[d(0.0)]).unwrap(), Value::Int32(0));
        assert_eq!(get_sign(&[d(7.0)]).unwrap(), Value::Int32(1));
    }

    #[test]
    fn sqrt_clamps_negative() {
        assert_eq!(sqrt(&[d(-4.0)]).unwrap(), d(0.0));
        assert_eq!(sqrt(&[d(9.0)]).unwrap(), d(3.0));
    }

    #[test]
    fn rounding_returns_int32() {
        assert_eq!(floor(&[d(2.9)]).unwrap(), Value::Int32(2));
        assert_eq!(ceil(&[d(2.1)]).unwrap(), Value::Int32(3));
        assert_eq!(floor(&[d(-2.1)]).unwrap(), Value::Int32(-3));
    }

    #[test]
    fn conditional_and_percent() {
        assert_eq!(if_else(&[d(1.0), d(10.0), d(20.0)]).unwrap(), d(10.0));
        assert_eq!(if_else(&[d(0.0), d(10.0), d(20.0)]).unwrap(), d(20.0));
        assert_eq!(percent(&[d(25.0), d(200.0)]).unwrap(), d(12.5));
        assert_eq!(percent(&[d(25.0), d(0.0)]).unwrap(), d(0.0));
    }

    #[test]
    fn price_delta_zero_discount() {
        assert_eq!(price_delta(&[d(0.0), d(80.0)]).unwrap(), d(0.0));
        assert_eq!(price_delta(&[d(100.0), d(80.0)]).unwrap(), d(20.0));
    }

    #[test]
    fn log_bucket_branches() {
        // Zero short-circuits.
        assert_eq!(log_bucket(&[d(0.0)]).unwrap(), Value::Int64(0));
        // Linear region one: 500 / 1000 + 1.
        assert_eq!(log_bucket(&[d(500.0)]).unwrap(), Value::Int64(1));
        assert_eq!(log_bucket(&[d(-500.0)]).unwrap(), Value::Int64(-1));
        // Linear region two: 16 + (20000 - 15000) / 5000 + 1.
        assert_eq!(log_bucket(&[d(20_000.0)]).unwrap(), Value::Int64(18));
        // Log region: start 64, 300000/5000 = 60, ln(60)/ln(1.5) = 10.09...
        assert_eq!(log_bucket(&[d(300_000.0)]).unwrap(), Value::Int64(74));
    }

    #[test]
    fn log_bucket_rejects_bad_widths() {
        assert!(log_bucket(&[d(5.0), d(0.0)]).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(direct_output_int32(&[d(3.9)]).unwrap(), Value::Int32(3));
        assert_eq!(direct_output_int64(&[d(-2.5)]).unwrap(), Value::Int64(-2));
        assert_eq!(direct_output_double(&[d(1.5)]).unwrap(), d(1.5));
        assert_eq!(
            direct_output_string(&[d(150.0)]).unwrap(),
            Value::Str("150".to_string())
        );
        assert_eq!(
            direct_output_string(&[d(1.5)]).unwrap(),
            Value::Str("1.5".to_string())
        );
    }

    #[test]
    fn type_errors_are_reported() {
        assert!(add(&[Value::from("x"), d(1.0)]).is_err());
        assert!(add(&[d(1.0)]).is_err());
        assert!(vector_sum(&[d(1.0)]).is_err());
    }

    #[test]
    fn container_ops() {
        let list = Value::DoubleList(vec![1.0, 2.0, 3.0, 2.0]);
        assert_eq!(len(&[list.clone()]).unwrap(), Value::Int64(4));
        assert_eq!(len(&[Value::from("abc")]).unwrap(), Value::Int64(3));
        assert_eq!(
            list_contains(&[list.clone(), d(2.0)]).unwrap(),
            Value::Int32(1)
        );
        assert_eq!(
            list_contains(&[list.clone(), d(9.0)]).unwrap(),
            Value::Int32(0)
        );
        assert_eq!(list_count(&[list.clone(), d(2.0)]).unwrap(), Value::Int32(2));
        assert_eq!(
            list_join(&[Value::Int32List(vec![1, 2, 3]), Value::from(",")]).unwrap(),
            Value::Str("1,2,3".to_string())
        );
        assert_eq!(vector_sum(&[list.clone()]).unwrap(), d(8.0));
        assert_eq!(vector_avg(&[list.clone()]).unwrap(), d(2.0));
        assert_eq!(moving_average(&[list, d(2.0)]).unwrap(), d(2.5));
    }

    #[test]
    fn moving_average_edge_cases() {
        assert_eq!(
            moving_average(&[Value::DoubleList(vec![]), d(3.0)]).unwrap(),
            d(0.0)
        );
        assert_eq!(
            moving_average(&[Value::DoubleList(vec![1.0, 2.0]), d(0.0)]).unwrap(),
            d(0.0)
        );
        // Window larger than history averages everything.
        assert_eq!(
            moving_average(&[Value::DoubleList(vec![1.0, 3.0]), d(10.0)]).unwrap(),
            d(2.0)
        );
    }
}
