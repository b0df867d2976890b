//! 业务记录
//!
//! 一条记录是字段名到值的有序映射，支持以点号分隔的路径访问嵌套字段

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{ReportError, ReportResult};
use super::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式设置字段
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// 顶层字段查找
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// 路径查找，例如 `customer.region`
    ///
    /// 先尝试把整个路径当作顶层字段名，再逐段进入嵌套映射
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }

    /// 估算记录占用的内存字节数
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Record>()
            + self
                .fields
                .iter()
                .map(|(k, v)| k.capacity() + v.estimated_size())
                .sum::<usize>()
    }

    /// 从 JSON 对象构造记录，非对象输入视为错误
    pub fn from_json(json: serde_json::Value) -> ReportResult<Self> {
        match Value::from(json) {
            Value::Map(fields) => Ok(Self { fields }),
            other => Err(ReportError::Serialization(format!(
                "记录必须是 JSON 对象, 实际为 {}",
                other.get_type()
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
