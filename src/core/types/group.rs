use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::Value;

/// 分组排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Ascending
    }
}

/// 分组定义
///
/// `level` 从 1 开始，1 为最外层
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub level: u32,
    pub key_expression: String,
    #[serde(default)]
    pub sort_direction: SortDirection,
}

impl Group {
    pub fn new(name: impl Into<String>, level: u32, key_expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            key_expression: key_expression.into(),
            sort_direction: SortDirection::Ascending,
        }
    }

    pub fn descending(mut self) -> Self {
        self.sort_direction = SortDirection::Descending;
        self
    }

    /// 按声明方向比较两个键，用于顺序校验
    pub fn compare_keys(&self, previous: &Value, current: &Value) -> Ordering {
        match self.sort_direction {
            SortDirection::Ascending => previous.cmp(current),
            SortDirection::Descending => current.cmp(previous),
        }
    }
}
