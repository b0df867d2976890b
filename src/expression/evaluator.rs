//! 表达式求值器
//!
//! null 传播规则：算术运算和大小比较中任一操作数为 null 时结果为 null；
//! 相等比较把 null 当作普通值。

use std::cmp::Ordering;

use super::ast::{BinaryOperator, Expression, UnaryOperator};
use super::functions::call_builtin;
use crate::core::error::ExpressionError;
use crate::core::{Record, Value};

/// 表达式上下文特征
pub trait ExpressionContext {
    /// 记录字段，不存在时返回 None
    fn get_field(&self, path: &str) -> Option<Value>;

    /// 变量当前值，变量不存在时返回 None
    fn get_variable(&self, name: &str) -> Option<Value>;
}

/// 只提供记录字段的上下文，引用任何变量都会失败
pub struct RecordContext<'a> {
    record: &'a Record,
}

impl<'a> RecordContext<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }
}

impl ExpressionContext for RecordContext<'_> {
    fn get_field(&self, path: &str) -> Option<Value> {
        self.record.get_path(path).cloned()
    }

    fn get_variable(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// 表达式求值器实现（unit struct，零开销）
#[derive(Debug)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn evaluate<C: ExpressionContext + ?Sized>(
        expression: &Expression,
        context: &C,
    ) -> Result<Value, ExpressionError> {
        match expression {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Field(path) => Ok(context.get_field(path).unwrap_or(Value::Null)),
            Expression::Variable(name) => context
                .get_variable(name)
                .ok_or_else(|| ExpressionError::undefined_variable(name)),
            Expression::Unary { op, operand } => {
                let value = Self::evaluate(operand, context)?;
                Self::eval_unary(*op, value)
            }
            Expression::Binary { left, op, right } => match op {
                BinaryOperator::And => {
                    let l = Self::evaluate(left, context)?;
                    if !l.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(Self::evaluate(right, context)?.is_truthy()))
                }
                BinaryOperator::Or => {
                    let l = Self::evaluate(left, context)?;
                    if l.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(Self::evaluate(right, context)?.is_truthy()))
                }
                _ => {
                    let l = Self::evaluate(left, context)?;
                    let r = Self::evaluate(right, context)?;
                    Self::eval_binary(*op, &l, &r)
                }
            },
            Expression::Function { name, args } => Self::eval_function(name, args, context),
        }
    }

    fn eval_unary(op: UnaryOperator, value: Value) -> Result<Value, ExpressionError> {
        match op {
            UnaryOperator::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOperator::Minus => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                value.neg().map_err(ExpressionError::type_error)
            }
        }
    }

    fn eval_binary(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, ExpressionError> {
        match op {
            BinaryOperator::Equal => return Ok(Value::Bool(l.loose_eq(r))),
            BinaryOperator::NotEqual => return Ok(Value::Bool(!l.loose_eq(r))),
            _ => {}
        }

        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }

        let result = match op {
            BinaryOperator::Add => l.add(r),
            BinaryOperator::Subtract => l.sub(r),
            BinaryOperator::Multiply => l.mul(r),
            BinaryOperator::Divide => {
                if r.as_f64() == Some(0.0) {
                    return Err(ExpressionError::division_by_zero());
                }
                l.div(r)
            }
            BinaryOperator::Modulo => {
                if r.as_i64() == Some(0) {
                    return Err(ExpressionError::division_by_zero());
                }
                l.rem(r)
            }
            BinaryOperator::LessThan => Ok(Value::Bool(l.cmp(r) == Ordering::Less)),
            BinaryOperator::LessThanOrEqual => Ok(Value::Bool(l.cmp(r) != Ordering::Greater)),
            BinaryOperator::GreaterThan => Ok(Value::Bool(l.cmp(r) == Ordering::Greater)),
            BinaryOperator::GreaterThanOrEqual => Ok(Value::Bool(l.cmp(r) != Ordering::Less)),
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::And
            | BinaryOperator::Or => Err(format!("操作符 {} 不能在此处求值", op.name())),
        };
        result.map_err(ExpressionError::type_error)
    }

    fn eval_function<C: ExpressionContext + ?Sized>(
        name: &str,
        args: &[Expression],
        context: &C,
    ) -> Result<Value, ExpressionError> {
        match name {
            "if" => {
                if args.len() != 3 {
                    return Err(ExpressionError::argument_count(name, "3", args.len()));
                }
                if Self::evaluate(&args[0], context)?.is_truthy() {
                    Self::evaluate(&args[1], context)
                } else {
                    Self::evaluate(&args[2], context)
                }
            }
            "coalesce" => {
                for arg in args {
                    let value = Self::evaluate(arg, context)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
            _ => {
                let values = args
                    .iter()
                    .map(|arg| Self::evaluate(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                call_builtin(name, &values)
            }
        }
    }

    /// 对记录求值，不允许引用变量
    pub fn evaluate_on_record(
        expression: &Expression,
        record: &Record,
    ) -> Result<Value, ExpressionError> {
        Self::evaluate(expression, &RecordContext::new(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Parser;
    use std::collections::HashMap;

    struct TestContext {
        record: Record,
        variables: HashMap<String, Value>,
    }

    impl ExpressionContext for TestContext {
        fn get_field(&self, path: &str) -> Option<Value> {
            self.record.get_path(path).cloned()
        }

        fn get_variable(&self, name: &str) -> Option<Value> {
            self.variables.get(name).cloned()
        }
    }

    fn eval(input: &str, ctx: &TestContext) -> Result<Value, ExpressionError> {
        let expr = Parser::parse(input).expect("parse");
        ExpressionEvaluator::evaluate(&expr, ctx)
    }

    fn context() -> TestContext {
        TestContext {
            record: Record::new()
                .with("amt", 100)
                .with("qty", 4)
                .with("region", "West")
                .with("price", 2.5),
            variables: HashMap::from([("total".to_string(), Value::Int(300))]),
        }
    }

    #[test]
    fn test_arithmetic_on_fields() {
        let ctx = context();
        assert_eq!(eval("amt + qty * 2", &ctx).expect("eval"), Value::Int(108));
        assert_eq!(eval("qty * price", &ctx).expect("eval"), Value::Float(10.0));
        assert_eq!(eval("$total / 3", &ctx).expect("eval"), Value::Float(100.0));
    }

    #[test]
    fn test_missing_field_is_null_and_propagates() {
        let ctx = context();
        assert_eq!(eval("missing", &ctx).expect("eval"), Value::Null);
        assert_eq!(eval("missing + 1", &ctx).expect("eval"), Value::Null);
        assert_eq!(eval("missing > 1", &ctx).expect("eval"), Value::Null);
        assert_eq!(eval("missing == null", &ctx).expect("eval"), Value::Bool(true));
    }

    #[test]
    fn test_undefined_variable_errors() {
        let ctx = context();
        let err = eval("$nope + 1", &ctx).expect_err("should fail");
        assert_eq!(
            err.error_type,
            crate::core::error::ExpressionErrorType::UndefinedVariable
        );
    }

    #[test]
    fn test_logic_and_comparison() {
        let ctx = context();
        assert_eq!(
            eval("region == 'West' and amt >= 100", &ctx).expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(eval("not amt > 50", &ctx).expect("eval"), Value::Bool(false));
        assert_eq!(eval("qty == 4.0", &ctx).expect("eval"), Value::Bool(true));
    }

    #[test]
    fn test_lazy_functions() {
        let ctx = context();
        assert_eq!(
            eval("if(amt > 50, 'big', $nope)", &ctx).expect("eval"),
            Value::from("big")
        );
        assert_eq!(
            eval("coalesce(missing, qty)", &ctx).expect("eval"),
            Value::Int(4)
        );
    }

    #[test]
    fn test_division_by_zero_and_type_errors() {
        let ctx = context();
        assert!(eval("amt / 0", &ctx).is_err());
        assert!(eval("region * 2", &ctx).is_err());
    }
}
