// 核心类型模块
//
// 报表运行开始后不可变的静态描述：分组、变量、作用域和报表定义

pub mod definition;
pub mod group;
pub mod scope;
pub mod variable;

pub use definition::{is_identifier, ReportDefinition};
pub use group::{Group, SortDirection};
pub use scope::{ResetScope, ScopeChange};
pub use variable::{Variable, VariableKind};
