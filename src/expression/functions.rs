//! 内置函数

use crate::core::error::ExpressionError;
use crate::core::Value;

/// 参数已求值的内置函数
///
/// `if` 和 `coalesce` 需要惰性求值，在求值器中单独处理
pub fn call_builtin(name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    match name {
        "abs" => {
            expect_args(name, args, 1, 1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                    ExpressionError::type_error(format!("函数 {} 整数溢出", name))
                }),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(type_error(name, other)),
            }
        }
        "round" => {
            expect_args(name, args, 1, 2)?;
            let digits = match args.get(1) {
                Some(Value::Int(d)) => *d as i32,
                Some(Value::Null) | None => 0,
                Some(other) => return Err(type_error(name, other)),
            };
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) => {
                    let factor = 10f64.powi(digits);
                    Ok(Value::Float((f * factor).round() / factor))
                }
                other => Err(type_error(name, other)),
            }
        }
        "floor" | "ceil" => {
            expect_args(name, args, 1, 1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) => {
                    let v = if name == "floor" { f.floor() } else { f.ceil() };
                    Ok(Value::Int(v as i64))
                }
                other => Err(type_error(name, other)),
            }
        }
        "upper" | "lower" => {
            expect_args(name, args, 1, 1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::String(s) if name == "upper" => Ok(Value::String(s.to_uppercase())),
                Value::String(s) => Ok(Value::String(s.to_lowercase())),
                other => Err(type_error(name, other)),
            }
        }
        "len" => {
            expect_args(name, args, 1, 1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(l) => Ok(Value::Int(l.len() as i64)),
                Value::Map(m) => Ok(Value::Int(m.len() as i64)),
                other => Err(type_error(name, other)),
            }
        }
        "concat" => {
            let mut out = String::new();
            for arg in args {
                if !arg.is_null() {
                    out.push_str(&arg.to_string());
                }
            }
            Ok(Value::String(out))
        }
        _ => Err(ExpressionError::unknown_function(name)),
    }
}

/// 是否为已知函数名（包括惰性函数）
pub fn is_known_function(name: &str) -> bool {
    matches!(
        name,
        "abs" | "round" | "floor" | "ceil" | "upper" | "lower" | "len" | "concat" | "if"
            | "coalesce"
    )
}

fn expect_args(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), ExpressionError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        return Err(ExpressionError::argument_count(name, &expected, args.len()));
    }
    Ok(())
}

fn type_error(name: &str, value: &Value) -> ExpressionError {
    ExpressionError::type_error(format!("函数 {} 不支持 {} 类型的参数", name, value.get_type()))
}
