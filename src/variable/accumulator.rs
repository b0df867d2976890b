//! 变量累加器
//!
//! 每种变量类型对应一种运行时状态。累加失败时返回错误描述，
//! 由引擎记录日志并把这次贡献视为中性。

use crate::core::{Value, VariableKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// 整数累加，遇到浮点后转为浮点
    Sum(Value),
    Count(i64),
    Average { sum: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    CountWhere(i64),
    /// 最近一次求值的结果
    Custom(Value),
}

impl Accumulator {
    /// 按初始值创建累加器
    pub fn new(kind: VariableKind, initial: &Value) -> Self {
        match kind {
            VariableKind::Sum => Accumulator::Sum(if initial.is_null() {
                Value::Int(0)
            } else {
                initial.clone()
            }),
            VariableKind::Count => Accumulator::Count(initial.as_i64().unwrap_or(0)),
            VariableKind::CountWhere => Accumulator::CountWhere(initial.as_i64().unwrap_or(0)),
            VariableKind::Average => Accumulator::Average { sum: 0.0, count: 0 },
            VariableKind::Min => Accumulator::Min(None),
            VariableKind::Max => Accumulator::Max(None),
            VariableKind::Custom => Accumulator::Custom(initial.clone()),
        }
    }

    /// 合并一次贡献
    ///
    /// `value` 为 null 表示字段缺失，对所有类型都是中性的（custom 除外，直接保存）
    pub fn accumulate(&mut self, value: Value) -> Result<(), String> {
        match self {
            Accumulator::Sum(current) => {
                if value.is_null() {
                    return Ok(());
                }
                if !value.is_numeric() {
                    return Err(format!("sum 需要数值, 实际为 {}", value.get_type()));
                }
                *current = current.add(&value)?;
                Ok(())
            }
            Accumulator::Count(n) => {
                if !value.is_null() {
                    *n += 1;
                }
                Ok(())
            }
            Accumulator::CountWhere(n) => {
                if value.is_truthy() {
                    *n += 1;
                }
                Ok(())
            }
            Accumulator::Average { sum, count } => {
                if value.is_null() {
                    return Ok(());
                }
                match value.as_f64() {
                    Some(v) => {
                        *sum += v;
                        *count += 1;
                        Ok(())
                    }
                    None => Err(format!("average 需要数值, 实际为 {}", value.get_type())),
                }
            }
            Accumulator::Min(current) => {
                if value.is_null() {
                    return Ok(());
                }
                match current {
                    Some(existing) if *existing <= value => {}
                    _ => *current = Some(value),
                }
                Ok(())
            }
            Accumulator::Max(current) => {
                if value.is_null() {
                    return Ok(());
                }
                match current {
                    Some(existing) if *existing >= value => {}
                    _ => *current = Some(value),
                }
                Ok(())
            }
            Accumulator::Custom(current) => {
                *current = value;
                Ok(())
            }
        }
    }

    /// 记录计数贡献，不需要求值表达式
    pub fn count_one(&mut self) {
        match self {
            Accumulator::Count(n) | Accumulator::CountWhere(n) => *n += 1,
            _ => {}
        }
    }

    /// 对外展示的值，空状态回退到初始值
    pub fn value(&self, initial: &Value) -> Value {
        match self {
            Accumulator::Sum(v) | Accumulator::Custom(v) => v.clone(),
            Accumulator::Count(n) | Accumulator::CountWhere(n) => Value::Int(*n),
            Accumulator::Average { sum, count } => {
                if *count == 0 {
                    initial.clone()
                } else {
                    Value::Float(*sum / *count as f64)
                }
            }
            Accumulator::Min(v) | Accumulator::Max(v) => {
                v.clone().unwrap_or_else(|| initial.clone())
            }
        }
    }
}
