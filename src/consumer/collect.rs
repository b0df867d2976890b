//! 收集全部输出的消费者，测试和小报表使用

use async_trait::async_trait;
use serde::Serialize;

use super::traits::ChunkConsumer;
use crate::core::error::ReportResult;
use crate::core::Record;
use crate::pipeline::chunk::{Chunk, GroupBreak};
use crate::variable::VariableSnapshot;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectedReport {
    pub records: Vec<Record>,
    /// `position` 已换算为在 `records` 中的绝对下标
    pub breaks: Vec<GroupBreak>,
    pub variables: VariableSnapshot,
    pub chunks: u64,
}

impl CollectedReport {
    pub fn footers(&self) -> impl Iterator<Item = &GroupBreak> {
        self.breaks.iter().filter(|b| b.is_footer())
    }

    /// 指定级别的页脚，按出现顺序
    pub fn footers_at(&self, level: u32) -> Vec<&GroupBreak> {
        self.footers().filter(|b| b.level == level).collect()
    }
}

#[derive(Debug, Default)]
pub struct CollectingConsumer {
    report: CollectedReport,
}

impl CollectingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collected(&self) -> &CollectedReport {
        &self.report
    }
}

#[async_trait]
impl ChunkConsumer for CollectingConsumer {
    type Output = CollectedReport;

    async fn consume_chunk(&mut self, chunk: &Chunk) -> ReportResult<()> {
        let offset = self.report.records.len();
        self.report
            .breaks
            .extend(chunk.breaks.iter().cloned().map(|mut b| {
                b.position += offset;
                b
            }));
        self.report.records.extend(chunk.records.iter().cloned());
        self.report.variables = chunk.variables.clone();
        self.report.chunks += 1;
        Ok(())
    }

    async fn finalize(self) -> ReportResult<CollectedReport> {
        Ok(self.report)
    }
}
