//! 报表扫描器
//!
//! 三种加载策略共用的逐条处理流程：
//! 求分组键 → 检测断点 → 关闭分组的页脚快照 → 级联重置 → 新分组页眉 → 按依赖顺序更新变量。
//! 分块边界不参与这个流程，所以聚合结果与分块大小和加载策略无关。

use crate::core::error::{ReportError, ReportResult};
use crate::core::{Record, ReportDefinition, ScopeChange, Value};
use crate::group::GroupBreakDetector;
use crate::variable::{VariableEngine, VariableSnapshot};

use super::chunk::{BreakKind, GroupBreak};

#[derive(Debug, Clone)]
pub struct ReportScanner {
    engine: VariableEngine,
    detector: GroupBreakDetector,
    suppress_detail_reset: bool,
    scanned: u64,
    finished: bool,
}

impl ReportScanner {
    pub fn new(
        definition: &ReportDefinition,
        strict_order: bool,
        suppress_detail_reset: bool,
    ) -> ReportResult<Self> {
        definition.validate()?;
        Ok(Self {
            engine: VariableEngine::new(definition.variables.clone())?,
            detector: GroupBreakDetector::new(definition.groups.clone(), strict_order)?,
            suppress_detail_reset,
            scanned: 0,
            finished: false,
        })
    }

    /// 处理一条记录，返回出现在该记录之前的断点（页脚在前，页眉在后）
    ///
    /// 分组键求值失败返回 `TransformationFailed`，调用方跳过该记录；
    /// 严格顺序校验失败返回 `OrderViolation`，会话终止
    pub fn scan(&mut self, record: &Record) -> ReportResult<Vec<GroupBreak>> {
        let keys = self.detector.evaluate_keys(record).map_err(|e| {
            ReportError::TransformationFailed(format!("分组键求值失败: {}", e))
        })?;
        let previous = self.detector.previous_keys().map(<[Value]>::to_vec);
        let change = self.detector.observe(keys.clone())?;

        let mut breaks = Vec::new();
        let group_count = self.detector.groups().len();

        if let (ScopeChange::GroupChange(level), Some(previous)) = (change, previous.as_deref()) {
            self.push_footers(&mut breaks, previous, level);
        }

        self.engine.handle_scope_change(change);

        let first_header = match change {
            ScopeChange::ReportChange => Some(1),
            ScopeChange::GroupChange(level) => Some(level),
            _ => None,
        };
        if let Some(first) = first_header {
            if group_count > 0 {
                let snapshot = self.engine.snapshot();
                for i in (first as usize - 1)..group_count {
                    let group = &self.detector.groups()[i];
                    breaks.push(GroupBreak {
                        kind: BreakKind::Header,
                        level: group.level,
                        group_name: group.name.clone(),
                        keys: keys[..=i].to_vec(),
                        values: snapshot.clone(),
                        position: 0,
                    });
                }
            }
        }

        if change == ScopeChange::NoChange && !self.suppress_detail_reset {
            self.engine.handle_scope_change(ScopeChange::DetailChange);
        }

        self.engine.update_all_ordered(record);
        self.scanned += 1;
        metrics::counter!("banded_report_records_scanned_total").increment(1);

        Ok(breaks)
    }

    /// 输入结束，关闭最后一组的所有级别（由内到外）
    pub fn finish(&mut self) -> Vec<GroupBreak> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut breaks = Vec::new();
        if let Some(previous) = self.detector.previous_keys().map(<[Value]>::to_vec) {
            self.push_footers(&mut breaks, &previous, 1);
        }
        breaks
    }

    /// 从最内层到 `outermost` 级别依次生成页脚
    fn push_footers(&self, breaks: &mut Vec<GroupBreak>, keys: &[Value], outermost: u32) {
        let groups = self.detector.groups();
        if groups.is_empty() {
            return;
        }
        let snapshot = self.engine.snapshot();
        for i in ((outermost as usize - 1)..groups.len()).rev() {
            let group = &groups[i];
            breaks.push(GroupBreak {
                kind: BreakKind::Footer,
                level: group.level,
                group_name: group.name.clone(),
                keys: keys[..=i].to_vec(),
                values: snapshot.clone(),
                position: 0,
            });
        }
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        self.engine.snapshot()
    }

    pub fn engine(&self) -> &VariableEngine {
        &self.engine
    }

    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// 变量计算中被按中性值处理的错误数
    pub fn calculation_errors(&self) -> u64 {
        self.engine.error_count()
    }
}
