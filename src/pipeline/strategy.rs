//! 加载策略选择

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStrategy {
    #[default]
    Auto,
    /// 一次性读入全部记录
    InMemory,
    /// 按需求分块推送
    Streaming,
    /// 只保留分组汇总和样本
    Aggregation,
}

impl LoadingStrategy {
    /// 解析策略名称，无法识别时记录警告并回退到 `Auto`
    pub fn parse_lenient(name: &str) -> Self {
        match name.parse() {
            Ok(strategy) => strategy,
            Err(e) => {
                log::warn!("{}, 使用 auto", e);
                LoadingStrategy::Auto
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingStrategy::Auto => "auto",
            LoadingStrategy::InMemory => "in_memory",
            LoadingStrategy::Streaming => "streaming",
            LoadingStrategy::Aggregation => "aggregation",
        }
    }

    /// 把请求的策略解析为具体策略
    ///
    /// 显式指定的策略总是优先。`Auto` 时：只需要聚合数据 → aggregation；
    /// 预计行数不超过阈值 → in_memory；其余（包括行数未知）→ streaming
    pub fn resolve(
        self,
        aggregation_only: bool,
        expected_rows: Option<usize>,
        in_memory_threshold: usize,
    ) -> LoadingStrategy {
        if self != LoadingStrategy::Auto {
            return self;
        }
        if aggregation_only {
            return LoadingStrategy::Aggregation;
        }
        match expected_rows {
            Some(rows) if rows <= in_memory_threshold => LoadingStrategy::InMemory,
            _ => LoadingStrategy::Streaming,
        }
    }
}

impl FromStr for LoadingStrategy {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" | "" => Ok(LoadingStrategy::Auto),
            "in_memory" | "memory" => Ok(LoadingStrategy::InMemory),
            "streaming" | "stream" => Ok(LoadingStrategy::Streaming),
            "aggregation" | "aggregate" => Ok(LoadingStrategy::Aggregation),
            _ => Err(ReportError::InvalidStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for LoadingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
