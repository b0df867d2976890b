//! 表达式模块
//!
//! 变量的 `source_expression` 和分组的 `key_expression` 都在这里解析和求值。
//! 字段直接写名字（`amt`、`customer.region`），变量写作 `$name`。

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

use std::collections::BTreeSet;
use std::fmt;

pub use ast::{BinaryOperator, Expression, UnaryOperator};
pub use evaluator::{ExpressionContext, ExpressionEvaluator, RecordContext};
pub use parser::Parser;

use crate::core::error::ExpressionError;
use crate::core::Value;

/// 预先解析好的表达式，保留源码文本便于日志输出
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    expression: Expression,
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let expression = Parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expression,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn referenced_variables(&self) -> BTreeSet<String> {
        self.expression.referenced_variables()
    }

    pub fn evaluate<C: ExpressionContext + ?Sized>(&self, context: &C) -> Result<Value, ExpressionError> {
        ExpressionEvaluator::evaluate(&self.expression, context)
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;

    #[test]
    fn test_compile_and_evaluate_on_record() {
        let compiled = CompiledExpression::compile("amt * 2").expect("compile");
        let record = Record::new().with("amt", 21);
        let value = compiled
            .evaluate(&RecordContext::new(&record))
            .expect("evaluate");
        assert_eq!(value, Value::Int(42));
        assert_eq!(compiled.source(), "amt * 2");
    }

    #[test]
    fn test_compile_error_carries_position() {
        let err = CompiledExpression::compile("amt +* 2").expect_err("should fail");
        assert!(err.position.is_some());
    }
}
