//! 分组断点检测
//!
//! 纯函数 `detect` 比较前后两组键，返回最外层发生变化的级别。
//! `GroupBreakDetector` 在此之上保存上一条记录的键，并可选地校验输入顺序。

use crate::core::error::{ReportError, ReportResult};
use crate::core::{Group, Record, ScopeChange, Value};
use crate::core::ExpressionError;
use crate::expression::{CompiledExpression, RecordContext};

/// 比较前后两条记录的分组键
///
/// `groups` 按级别升序排列，`current[i]` 对应 `groups[i]`。
/// 没有上一条记录时返回 `ReportChange`；键完全相同返回 `NoChange`；
/// 否则返回最外层不同级别的 `GroupChange`，更内层的级别隐含一起变化。
/// 相等判断与排序方向无关。
pub fn detect(previous: Option<&[Value]>, current: &[Value], groups: &[Group]) -> ScopeChange {
    let Some(previous) = previous else {
        return ScopeChange::ReportChange;
    };

    for (i, group) in groups.iter().enumerate() {
        if previous.get(i) != current.get(i) {
            return ScopeChange::GroupChange(group.level);
        }
    }
    ScopeChange::NoChange
}

#[derive(Debug, Clone)]
pub struct GroupBreakDetector {
    groups: Vec<Group>,
    keys: Vec<CompiledExpression>,
    previous: Option<Vec<Value>>,
    strict_order: bool,
}

impl GroupBreakDetector {
    /// 编译所有分组键表达式，分组按级别排序
    pub fn new(mut groups: Vec<Group>, strict_order: bool) -> ReportResult<Self> {
        groups.sort_by_key(|g| g.level);
        for (i, group) in groups.iter().enumerate() {
            if group.level as usize != i + 1 {
                return Err(ReportError::Definition(format!(
                    "分组 {} 的级别 {} 无效，级别必须从 1 开始连续",
                    group.name, group.level
                )));
            }
        }
        let mut keys = Vec::with_capacity(groups.len());
        for group in &groups {
            let compiled = CompiledExpression::compile(&group.key_expression)?;
            if let Some(name) = compiled.referenced_variables().into_iter().next() {
                return Err(ReportError::Definition(format!(
                    "分组 {} 的键表达式不能引用变量 ${}",
                    group.name, name
                )));
            }
            keys.push(compiled);
        }

        Ok(Self {
            groups,
            keys,
            previous: None,
            strict_order,
        })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// 上一条记录的分组键
    pub fn previous_keys(&self) -> Option<&[Value]> {
        self.previous.as_deref()
    }

    /// 对一条记录求出所有分组键
    pub fn evaluate_keys(&self, record: &Record) -> Result<Vec<Value>, ExpressionError> {
        let context = RecordContext::new(record);
        self.keys.iter().map(|key| key.evaluate(&context)).collect()
    }

    /// 检测断点并保存当前键
    ///
    /// 启用严格顺序时，若变化级别上的新键按声明方向排在旧键之前，
    /// 返回 `OrderViolation`，此时不更新保存的键
    pub fn observe(&mut self, current: Vec<Value>) -> ReportResult<ScopeChange> {
        let change = detect(self.previous.as_deref(), &current, &self.groups);

        if self.strict_order {
            if let (ScopeChange::GroupChange(level), Some(previous)) = (change, &self.previous) {
                let i = self
                    .groups
                    .iter()
                    .position(|g| g.level == level)
                    .unwrap_or_default();
                let group = &self.groups[i];
                if group.compare_keys(&previous[i], &current[i]) == std::cmp::Ordering::Greater {
                    return Err(ReportError::OrderViolation {
                        group: group.name.clone(),
                        level,
                        previous: previous[i].to_string(),
                        current: current[i].to_string(),
                    });
                }
            }
        }

        self.previous = Some(current);
        Ok(change)
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<Group> {
        vec![
            Group::new("region", 1, "region"),
            Group::new("city", 2, "city"),
        ]
    }

    fn keys(region: &str, city: &str) -> Vec<Value> {
        vec![Value::from(region), Value::from(city)]
    }

    #[test]
    fn test_detect_first_record_is_report_change() {
        assert_eq!(
            detect(None, &keys("West", "LA"), &groups()),
            ScopeChange::ReportChange
        );
    }

    #[test]
    fn test_detect_outermost_change_wins() {
        let g = groups();
        let prev = keys("West", "LA");
        assert_eq!(detect(Some(prev.as_slice()), &keys("West", "LA"), &g), ScopeChange::NoChange);
        assert_eq!(
            detect(Some(prev.as_slice()), &keys("West", "SF"), &g),
            ScopeChange::GroupChange(2)
        );
        assert_eq!(
            detect(Some(prev.as_slice()), &keys("East", "LA"), &g),
            ScopeChange::GroupChange(1)
        );
    }

    #[test]
    fn test_detect_without_groups() {
        let empty: Vec<Value> = Vec::new();
        assert_eq!(detect(Some(empty.as_slice()), &empty, &[]), ScopeChange::NoChange);
    }

    #[test]
    fn test_detector_keeps_previous_keys() {
        let mut detector = GroupBreakDetector::new(groups(), false).expect("detector");
        let record = Record::new().with("region", "West").with("city", "LA");
        let k = detector.evaluate_keys(&record).expect("keys");
        assert_eq!(detector.observe(k).expect("observe"), ScopeChange::ReportChange);
        assert_eq!(detector.previous_keys(), Some(keys("West", "LA").as_slice()));
    }

    #[test]
    fn test_strict_order_violation() {
        let mut detector = GroupBreakDetector::new(groups(), true).expect("detector");
        detector.observe(keys("West", "LA")).expect("first");
        let err = detector
            .observe(keys("East", "LA"))
            .expect_err("East sorts before West");
        assert!(matches!(err, ReportError::OrderViolation { level: 1, .. }));
    }

    #[test]
    fn test_strict_order_descending() {
        let g = vec![Group::new("region", 1, "region").descending()];
        let mut detector = GroupBreakDetector::new(g, true).expect("detector");
        detector.observe(vec![Value::from("West")]).expect("first");
        assert_eq!(
            detector.observe(vec![Value::from("East")]).expect("descending"),
            ScopeChange::GroupChange(1)
        );
    }

    #[test]
    fn test_key_expression_cannot_use_variables() {
        let g = vec![Group::new("bad", 1, "$total")];
        assert!(matches!(
            GroupBreakDetector::new(g, false),
            Err(ReportError::Definition(_))
        ));
    }

    #[test]
    fn test_levels_must_be_contiguous() {
        let zero = vec![Group::new("g", 0, "amt")];
        assert!(GroupBreakDetector::new(zero, false).is_err());

        let gap = vec![Group::new("region", 1, "region"), Group::new("city", 3, "city")];
        assert!(GroupBreakDetector::new(gap, false).is_err());

        let shuffled = vec![Group::new("city", 2, "city"), Group::new("region", 1, "region")];
        let detector = GroupBreakDetector::new(shuffled, false).expect("detector");
        assert_eq!(detector.groups()[0].name, "region");
    }
}
