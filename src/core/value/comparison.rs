use super::types::Value;
use std::cmp::Ordering as CmpOrdering;
use std::hash::Hash;

// 手动实现PartialEq以正确处理f64比较
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => (a == b) || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

// 手动实现Eq，因为f64没有实现Eq
impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        match (self, other) {
            (Value::Null, Value::Null) => CmpOrdering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => Self::cmp_f64(*a, *b),
            // 整数与浮点数按数值比较
            (Value::Int(a), Value::Float(b)) => Self::cmp_f64(*a as f64, *b),
            (Value::Float(a), Value::Int(b)) => Self::cmp_f64(*a, *b as f64),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.iter().cmp(b.iter()),

            // 不同类型之间的比较：基于类型优先级
            (a, b) => a.type_priority().cmp(&b.type_priority()),
        }
    }
}

// 手动实现Hash以处理f64哈希
impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                if f.is_nan() {
                    // 所有NaN值应该哈希到相同的值
                    (0x7ff80000u32 as u64).hash(state);
                } else if *f == 0.0 {
                    // 确保+0.0和-0.0哈希到相同的值
                    0.0_f64.to_bits().hash(state);
                } else {
                    f.to_bits().hash(state);
                }
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::List(l) => {
                5u8.hash(state);
                l.hash(state);
            }
            Value::Map(m) => {
                6u8.hash(state);
                for (k, v) in m {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl Value {
    /// 类型优先级：null < bool < 数值 < 字符串 < 列表 < 映射
    fn type_priority(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
        }
    }

    fn cmp_f64(a: f64, b: f64) -> CmpOrdering {
        // NaN 排在所有数值之后
        match (a.is_nan(), b.is_nan()) {
            (true, true) => CmpOrdering::Equal,
            (true, false) => CmpOrdering::Greater,
            (false, true) => CmpOrdering::Less,
            (false, false) => a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal),
        }
    }

    /// 数值感知的相等判断，`Int(1)` 与 `Float(1.0)` 视为相等
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                self.cmp(other) == CmpOrdering::Equal
            }
            _ => self == other,
        }
    }
}
