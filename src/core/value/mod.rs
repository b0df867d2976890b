//! Value 模块 - 报表记录与变量的值类型系统
//!
//! 此模块提供：
//! - 核心类型定义 (`types.rs`)
//! - 比较逻辑 (`comparison.rs`)
//! - 算术运算 (`operations.rs`)
//! - 类型转换 (`conversion.rs`)

pub mod comparison;
pub mod conversion;
pub mod operations;
pub mod types;

pub use types::*;
