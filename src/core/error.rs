//! 统一错误处理系统
//!
//! ## 设计理念
//!
//! 1. **按阶段区分**：
//!    - 建立阶段错误（循环依赖、未知变量、定义错误）在处理任何记录之前返回
//!    - 单条记录错误（转换失败、计算错误）在本地恢复：跳过或按中性元素处理并计数
//!    - 数据源与资源错误（查询失败、超时、内存超限）终止整个会话
//!
//! 2. **结构化表达式错误**：表达式错误保留错误类型和位置信息，
//!    通过 `#[from]` 自动转换为 `ReportError`
//!
//! 3. **统一接口**：`ReportResult<T>` 提供统一的返回类型

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::progress::ProgressSummary;

/// 统一的报表处理错误类型
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("变量未找到: {0}")]
    VariableNotFound(String),

    #[error("变量依赖存在循环: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("数据源查询失败: {0}")]
    QueryFailed(String),

    #[error("记录转换失败: {0}")]
    TransformationFailed(String),

    #[error("分块消费失败 (尝试 {attempts} 次): {reason}")]
    ConsumeChunkFailed { attempts: u32, reason: String },

    #[error("总数未知，无法估算剩余时间")]
    UnknownTotal,

    #[error("无效的加载策略: {0}")]
    InvalidStrategy(String),

    #[error("表达式错误: {0}")]
    Expression(#[from] ExpressionError),

    #[error("报表定义错误: {0}")]
    Definition(String),

    #[error("分组顺序错误: 分组 {group} (级别 {level}) 的键 {current} 排在 {previous} 之前")]
    OrderViolation {
        group: String,
        level: u32,
        previous: String,
        current: String,
    },

    #[error("会话超时: 超过 {0:?}")]
    Timeout(Duration),

    #[error("内存超出限制: 当前={current}, 限制={limit}")]
    MemoryLimitExceeded { current: usize, limit: usize },

    #[error("数据流已关闭")]
    StreamClosed,

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(String),
}

/// 统一的结果类型
pub type ReportResult<T> = Result<T, ReportError>;

impl ReportError {
    /// 消费步骤的错误是否值得重试
    ///
    /// 建立阶段错误和资源类错误重试也不会成功
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportError::Io(_)
            | ReportError::Serialization(_)
            | ReportError::TransformationFailed(_) => true,
            ReportError::ConsumeChunkFailed { .. } => true,
            _ => false,
        }
    }

    /// 是否是会终止会话的错误
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ReportError::TransformationFailed(_)
                | ReportError::UnknownTotal
                | ReportError::InvalidStrategy(_)
        )
    }

    /// 把任意数据源错误包装为查询失败，已是查询失败的保持原样
    pub fn into_query_failed(self) -> ReportError {
        match self {
            ReportError::QueryFailed(_) => self,
            other => ReportError::QueryFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        ReportError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ReportError {
    fn from(err: toml::ser::Error) -> Self {
        ReportError::Config(err.to_string())
    }
}

/// 会话级失败：致命错误加上可用的部分进度
#[derive(Error, Debug)]
#[error("{error}")]
pub struct SessionFailure {
    #[source]
    pub error: ReportError,
    pub progress: Option<ProgressSummary>,
}

impl SessionFailure {
    pub fn new(error: ReportError, progress: Option<ProgressSummary>) -> Self {
        Self { error, progress }
    }
}

impl From<ReportError> for SessionFailure {
    fn from(error: ReportError) -> Self {
        Self {
            error,
            progress: None,
        }
    }
}

/// 表达式错误（结构化设计）
///
/// 包含错误类型、错误消息和可选的位置信息
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionError {
    /// 错误类型
    pub error_type: ExpressionErrorType,
    /// 错误消息
    pub message: String,
    /// 错误位置（字符偏移）
    pub position: Option<usize>,
}

/// 表达式错误类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionErrorType {
    /// 语法错误
    SyntaxError,
    /// 类型错误
    TypeError,
    /// 未定义变量
    UndefinedVariable,
    /// 未知函数
    UnknownFunction,
    /// 参数数量错误
    ArgumentCountError,
    /// 除零错误
    DivisionByZero,
}

impl ExpressionError {
    /// 创建新的表达式错误
    pub fn new(error_type: ExpressionErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            position: None,
        }
    }

    /// 设置错误位置
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new(ExpressionErrorType::SyntaxError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExpressionErrorType::TypeError, message)
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(
            ExpressionErrorType::UndefinedVariable,
            format!("未定义的变量: ${}", name),
        )
    }

    pub fn unknown_function(name: &str) -> Self {
        Self::new(
            ExpressionErrorType::UnknownFunction,
            format!("未知函数: {}", name),
        )
    }

    pub fn argument_count(name: &str, expected: &str, actual: usize) -> Self {
        Self::new(
            ExpressionErrorType::ArgumentCountError,
            format!("函数 {} 需要 {} 个参数, 实际 {}", name, expected, actual),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::new(ExpressionErrorType::DivisionByZero, "除零错误")
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{:?}: {} (位置 {})", self.error_type, self.message, pos),
            None => write!(f, "{:?}: {}", self.error_type, self.message),
        }
    }
}
