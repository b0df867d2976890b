use super::types::Value;

impl Value {
    /// 加法运算
    pub fn add(&self, other: &Value) -> Result<Value, String> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a
                .checked_add(*b)
                .map(Int)
                .ok_or_else(|| "整数加法溢出".to_string()),
            (Float(a), Float(b)) => Ok(Float(a + b)),
            (Int(a), Float(b)) => Ok(Float(*a as f64 + b)),
            (Float(a), Int(b)) => Ok(Float(a + *b as f64)),
            (String(a), String(b)) => Ok(String(format!("{}{}", a, b))),
            _ => Err(format!(
                "无法对 {} 和 {} 进行加法运算",
                self.get_type(),
                other.get_type()
            )),
        }
    }

    /// 减法运算
    pub fn sub(&self, other: &Value) -> Result<Value, String> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a
                .checked_sub(*b)
                .map(Int)
                .ok_or_else(|| "整数减法溢出".to_string()),
            (Float(a), Float(b)) => Ok(Float(a - b)),
            (Int(a), Float(b)) => Ok(Float(*a as f64 - b)),
            (Float(a), Int(b)) => Ok(Float(a - *b as f64)),
            _ => Err(format!(
                "无法对 {} 和 {} 进行减法运算",
                self.get_type(),
                other.get_type()
            )),
        }
    }

    /// 乘法运算
    pub fn mul(&self, other: &Value) -> Result<Value, String> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a
                .checked_mul(*b)
                .map(Int)
                .ok_or_else(|| "整数乘法溢出".to_string()),
            (Float(a), Float(b)) => Ok(Float(a * b)),
            (Int(a), Float(b)) => Ok(Float(*a as f64 * b)),
            (Float(a), Int(b)) => Ok(Float(a * *b as f64)),
            _ => Err(format!(
                "无法对 {} 和 {} 进行乘法运算",
                self.get_type(),
                other.get_type()
            )),
        }
    }

    /// 除法运算，结果总是浮点数
    pub fn div(&self, other: &Value) -> Result<Value, String> {
        let (a, b) = match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(format!(
                    "无法对 {} 和 {} 进行除法运算",
                    self.get_type(),
                    other.get_type()
                ))
            }
        };
        if b == 0.0 {
            return Err("除零错误".to_string());
        }
        Ok(Value::Float(a / b))
    }

    /// 取模运算
    pub fn rem(&self, other: &Value) -> Result<Value, String> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => {
                if *b == 0 {
                    Err("除零错误".to_string())
                } else {
                    a.checked_rem(*b)
                        .map(Int)
                        .ok_or_else(|| "整数取模溢出".to_string())
                }
            }
            _ => Err("只能对整数类型进行取模运算".to_string()),
        }
    }

    /// 取负运算
    pub fn neg(&self) -> Result<Value, String> {
        use Value::*;
        match self {
            Int(a) => a
                .checked_neg()
                .map(Int)
                .ok_or_else(|| "整数取负溢出".to_string()),
            Float(a) => Ok(Float(-a)),
            _ => Err("只能对数值类型进行取负运算".to_string()),
        }
    }
}
