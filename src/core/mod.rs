pub mod error;
pub mod record;
pub mod types;
pub mod value;

// 错误和结果类型
pub use error::{
    ExpressionError, ExpressionErrorType, ReportError, ReportResult, SessionFailure,
};

// 核心数据类型
pub use record::Record;
pub use value::{Value, ValueTypeDef};

pub use types::{
    Group, ReportDefinition, ResetScope, ScopeChange, SortDirection, Variable, VariableKind,
};
