use serde::{Deserialize, Serialize};
use std::fmt;

use super::scope::ResetScope;
use crate::core::Value;

/// 变量聚合类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Sum,
    Count,
    Average,
    Min,
    Max,
    CountWhere,
    Custom,
}

impl VariableKind {
    /// 未显式给出初始值时使用的默认值
    pub fn default_initial_value(&self) -> Value {
        match self {
            VariableKind::Sum | VariableKind::Count | VariableKind::CountWhere => Value::Int(0),
            VariableKind::Average | VariableKind::Min | VariableKind::Max | VariableKind::Custom => {
                Value::Null
            }
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableKind::Sum => "sum",
            VariableKind::Count => "count",
            VariableKind::Average => "average",
            VariableKind::Min => "min",
            VariableKind::Max => "max",
            VariableKind::CountWhere => "count_where",
            VariableKind::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// 变量定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    #[serde(default)]
    pub source_expression: String,
    #[serde(default)]
    pub reset_scope: ResetScope,
    #[serde(default)]
    pub initial_value: Option<Value>,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        kind: VariableKind,
        source_expression: impl Into<String>,
        reset_scope: ResetScope,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            source_expression: source_expression.into(),
            reset_scope,
            initial_value: None,
        }
    }

    pub fn with_initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// 实际生效的初始值
    pub fn effective_initial_value(&self) -> Value {
        self.initial_value
            .clone()
            .unwrap_or_else(|| self.kind.default_initial_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_initial_value() {
        let v = Variable::new("total", VariableKind::Sum, "amt", ResetScope::Report);
        assert_eq!(v.effective_initial_value(), Value::Int(0));

        let v = Variable::new("low", VariableKind::Min, "amt", ResetScope::Report);
        assert!(v.effective_initial_value().is_null());

        let v = v.with_initial_value(-1);
        assert_eq!(v.effective_initial_value(), Value::Int(-1));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let v: Variable = toml::from_str(
            r#"
            name = "region_total"
            kind = "sum"
            source_expression = "amt"
            reset_scope = { group = 1 }
            "#,
        )
        .expect("variable should parse");
        assert_eq!(v.kind, VariableKind::Sum);
        assert_eq!(v.reset_scope, ResetScope::Group(1));
        assert!(v.initial_value.is_none());
    }
}
