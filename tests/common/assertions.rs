//! 自定义断言辅助模块
//!
//! 提供测试中的常用断言函数

use banded_report::consumer::CollectedReport;
use banded_report::core::Value;

/// 断言结果成功，返回内部值
pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>) -> T {
    result.expect("操作应该成功")
}

/// 断言结果失败并匹配错误消息
pub fn assert_err_with<T: std::fmt::Debug, E: std::fmt::Display>(
    result: Result<T, E>,
    expected_msg: &str,
) {
    let err = result.expect_err("操作应该失败");
    let err_str = err.to_string();
    assert!(
        err_str.contains(expected_msg),
        "错误消息应包含 '{}', 实际是 '{}'",
        expected_msg,
        err_str
    );
}

/// 断言集合包含指定数量的元素
pub fn assert_count<T>(collection: &[T], expected: usize, item_name: &str) {
    assert_eq!(
        collection.len(),
        expected,
        "{}数量不匹配: 期望 {}, 实际 {}",
        item_name,
        expected,
        collection.len()
    );
}

/// 指定级别页脚的 (分组键, 变量值) 列表
pub fn footer_values(report: &CollectedReport, level: u32, variable: &str) -> Vec<(Value, Value)> {
    report
        .footers_at(level)
        .into_iter()
        .map(|b| {
            (
                b.key().cloned().unwrap_or(Value::Null),
                b.values.get(variable).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

/// 整数变量值，非整数时测试失败
pub fn int_value(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        other => panic!("期望整数, 实际为 {:?}", other),
    }
}
