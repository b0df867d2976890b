use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value类型定义枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTypeDef {
    Null,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
}

impl std::fmt::Display for ValueTypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueTypeDef::Null => "null",
            ValueTypeDef::Bool => "bool",
            ValueTypeDef::Int => "int",
            ValueTypeDef::Float => "float",
            ValueTypeDef::String => "string",
            ValueTypeDef::List => "list",
            ValueTypeDef::Map => "map",
        };
        write!(f, "{}", name)
    }
}

/// 记录字段和变量的取值
///
/// 序列化为无标签形式，与 JSON 的自然表示一致：
/// `null`、`true`、`42`、`1.5`、`"West"`、`[..]`、`{..}`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// 获取值的类型
    pub fn get_type(&self) -> ValueTypeDef {
        match self {
            Value::Null => ValueTypeDef::Null,
            Value::Bool(_) => ValueTypeDef::Bool,
            Value::Int(_) => ValueTypeDef::Int,
            Value::Float(_) => ValueTypeDef::Float,
            Value::String(_) => ValueTypeDef::String,
            Value::List(_) => ValueTypeDef::List,
            Value::Map(_) => ValueTypeDef::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// 数值视图，非数值返回 None
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// 真值判断：null、false、0、空字符串、空集合为假
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// 估算值占用的内存字节数
    pub fn estimated_size(&self) -> usize {
        let base = std::mem::size_of::<Value>();
        match self {
            Value::String(s) => base + s.capacity(),
            Value::List(l) => base + l.iter().map(Value::estimated_size).sum::<usize>(),
            Value::Map(m) => {
                base + m
                    .iter()
                    .map(|(k, v)| k.capacity() + v.estimated_size())
                    .sum::<usize>()
            }
            _ => base,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
