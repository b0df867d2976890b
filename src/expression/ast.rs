//! 表达式语法树
//!
//! 字段引用使用裸标识符（可带点号路径），变量引用使用 `$name`

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::Value;

/// 二元操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }

    /// 优先级，数值越大结合越紧
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Equal | BinaryOperator::NotEqual => 3,
            BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => 4,
            BinaryOperator::Add | BinaryOperator::Subtract => 5,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
        }
    }
}

/// 一元操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Minus,
    Not,
}

impl UnaryOperator {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    /// 记录字段，`path` 可以是 `a.b.c`
    Field(String),
    /// 变量当前值，源码中写作 `$name`
    Variable(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// 收集表达式中引用的所有变量名
    pub fn referenced_variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Literal(_) | Expression::Field(_) => {}
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::Unary { operand, .. } => operand.collect_variables(names),
            Expression::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expression::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }

    /// 收集表达式中引用的所有记录字段
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_fields(&mut names);
        names
    }

    fn collect_fields(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Literal(_) | Expression::Variable(_) => {}
            Expression::Field(path) => {
                names.insert(path.clone());
            }
            Expression::Unary { operand, .. } => operand.collect_fields(names),
            Expression::Binary { left, right, .. } => {
                left.collect_fields(names);
                right.collect_fields(names);
            }
            Expression::Function { args, .. } => {
                for arg in args {
                    arg.collect_fields(names);
                }
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Field(path) => write!(f, "{}", path),
            Expression::Variable(name) => write!(f, "${}", name),
            Expression::Unary { op, operand } => match op {
                UnaryOperator::Minus => write!(f, "-({})", operand),
                UnaryOperator::Not => write!(f, "not ({})", operand),
            },
            Expression::Binary { left, op, right } => {
                write!(f, "({} {} {})", left, op.name(), right)
            }
            Expression::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
