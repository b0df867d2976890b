//! 测试数据生成模块
//!
//! 提供报表定义和按分组键排好序的记录

use banded_report::core::{
    Group, Record, ReportDefinition, ResetScope, Value, Variable, VariableKind,
};

/// 按 region 分组的销售报表
pub fn sales_definition() -> ReportDefinition {
    ReportDefinition::new("sales")
        .with_group(Group::new("region", 1, "region"))
        .with_variable(Variable::new(
            "region_total",
            VariableKind::Sum,
            "amt",
            ResetScope::Group(1),
        ))
        .with_variable(Variable::new(
            "region_count",
            VariableKind::Count,
            "",
            ResetScope::Group(1),
        ))
        .with_variable(Variable::new(
            "region_avg",
            VariableKind::Average,
            "amt",
            ResetScope::Group(1),
        ))
        .with_variable(Variable::new(
            "grand_total",
            VariableKind::Sum,
            "amt",
            ResetScope::Report,
        ))
}

/// West 100, West 200, East 150
pub fn sales_records() -> Vec<Record> {
    vec![
        sale("West", 100),
        sale("West", 200),
        sale("East", 150),
    ]
}

pub fn sale(region: &str, amt: i64) -> Record {
    Record::new().with("region", region).with("amt", amt)
}

/// region → city 两级分组
pub fn nested_definition() -> ReportDefinition {
    ReportDefinition::new("nested_sales")
        .with_group(Group::new("region", 1, "region"))
        .with_group(Group::new("city", 2, "city"))
        .with_variable(Variable::new(
            "city_total",
            VariableKind::Sum,
            "amt",
            ResetScope::Group(2),
        ))
        .with_variable(Variable::new(
            "region_total",
            VariableKind::Sum,
            "amt",
            ResetScope::Group(1),
        ))
        .with_variable(Variable::new(
            "grand_total",
            VariableKind::Sum,
            "amt",
            ResetScope::Report,
        ))
        .with_variable(Variable::new(
            "big_sales",
            VariableKind::CountWhere,
            "amt > 10",
            ResetScope::Group(1),
        ))
}

/// 生成 `count` 条按 (region, city) 升序排列的记录，每个 region 有 `group_size` 条
pub fn generated_sales(count: usize, group_size: usize) -> Vec<Record> {
    let group_size = group_size.max(1);
    let city_size = (group_size / 3).max(1);
    (0..count)
        .map(|i| {
            Record::new()
                .with("region", format!("R{:05}", i / group_size))
                .with("city", format!("C{:06}", i / city_size))
                .with("amt", (i % 13 + 1) as i64)
        })
        .collect()
}

/// 记录中 `amt` 字段之和
pub fn total_amount(records: &[Record]) -> i64 {
    records
        .iter()
        .filter_map(|r| match r.get("amt") {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        })
        .sum()
}
