//! 记录读取与非流式加载
//!
//! `RecordReader` 封装数据源、逐条转换和跳过逻辑；
//! `load_in_memory` 和 `load_aggregation` 在它之上实现两种一次性加载策略。

use serde::Serialize;
use std::sync::Arc;

use super::chunk::GroupBreak;
use super::memory::MemoryTracker;
use super::progress::{ProgressSummary, ProgressUpdate, SharedProgress};
use super::sample::{SampleMethod, Sampler};
use super::scanner::ReportScanner;
use super::source::RecordSource;
use crate::core::error::{ReportError, ReportResult};
use crate::core::Record;
use crate::variable::VariableSnapshot;

/// 逐条记录转换，失败的记录被跳过
pub type RecordTransform = Arc<dyn Fn(Record) -> ReportResult<Record> + Send + Sync>;

pub fn identity_transform() -> RecordTransform {
    Arc::new(|record: Record| -> ReportResult<Record> { Ok(record) })
}

pub struct RecordReader<S> {
    source: S,
    transform: RecordTransform,
    row_cap: Option<usize>,
    read: usize,
    skipped: u64,
    progress: SharedProgress,
    opened: bool,
}

impl<S: RecordSource> RecordReader<S> {
    pub fn new(
        source: S,
        transform: RecordTransform,
        row_cap: Option<usize>,
        progress: SharedProgress,
    ) -> Self {
        Self {
            source,
            transform,
            row_cap,
            read: 0,
            skipped: 0,
            progress,
            opened: false,
        }
    }

    pub async fn open(&mut self) -> ReportResult<()> {
        self.source
            .open()
            .await
            .map_err(ReportError::into_query_failed)?;
        self.opened = true;
        Ok(())
    }

    /// 下一条转换后的记录
    ///
    /// 非致命错误记一次跳过后继续读；致命错误包装为 `QueryFailed`
    pub async fn next(&mut self) -> ReportResult<Option<Record>> {
        loop {
            if matches!(self.row_cap, Some(cap) if self.read >= cap) {
                return Ok(None);
            }

            match self.source.next_record().await {
                Ok(None) => return Ok(None),
                Ok(Some(record)) => {
                    self.read += 1;
                    match (self.transform)(record) {
                        Ok(record) => return Ok(Some(record)),
                        Err(e) => self.skip(&e),
                    }
                }
                Err(e) if !e.is_fatal() => {
                    self.read += 1;
                    self.skip(&e);
                }
                Err(e) => return Err(e.into_query_failed()),
            }
        }
    }

    /// 记录一次跳过
    pub fn skip(&mut self, error: &ReportError) {
        self.skipped += 1;
        self.progress.lock().record_error();
        metrics::counter!("banded_report_records_skipped_total").increment(1);
        log::warn!("跳过第 {} 条记录: {}", self.read, error);
    }

    /// 关闭数据源，失败只记录日志
    pub async fn close(&mut self) {
        if !self.opened {
            return;
        }
        self.opened = false;
        if let Err(e) = self.source.close().await {
            log::warn!("关闭数据源失败: {}", e);
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn progress(&self) -> &SharedProgress {
        &self.progress
    }

    /// 处理一条记录并推进进度，非致命的扫描错误被跳过
    ///
    /// 返回 None 表示记录被跳过
    pub fn scan(
        &mut self,
        scanner: &mut ReportScanner,
        record: &Record,
    ) -> ReportResult<Option<Vec<GroupBreak>>> {
        match scanner.scan(record) {
            Ok(breaks) => {
                self.progress.lock().update(ProgressUpdate::Increment(1));
                Ok(Some(breaks))
            }
            Err(e) if !e.is_fatal() => {
                self.skip(&e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// 一次性加载的结果
#[derive(Debug, Clone, Serialize)]
pub struct InMemoryResult {
    pub records: Vec<Record>,
    /// `position` 为在 `records` 中的绝对下标
    pub breaks: Vec<GroupBreak>,
    pub variables: VariableSnapshot,
    pub progress: ProgressSummary,
    pub skipped: u64,
}

/// 聚合加载的结果，只保留每个分组的汇总和有限样本
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    /// 每个分组关闭时的页脚，按关闭顺序
    pub groups: Vec<GroupBreak>,
    pub sample: Vec<Record>,
    pub variables: VariableSnapshot,
    pub record_count: u64,
    pub progress: ProgressSummary,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SampleOptions {
    pub include: bool,
    pub size: usize,
    pub method: SampleMethod,
    pub seed: Option<u64>,
}

pub async fn load_in_memory<S: RecordSource>(
    reader: &mut RecordReader<S>,
    scanner: &mut ReportScanner,
    memory: &MemoryTracker,
) -> ReportResult<InMemoryResult> {
    let result = read_all(reader, scanner, memory).await;
    reader.close().await;
    result
}

async fn read_all<S: RecordSource>(
    reader: &mut RecordReader<S>,
    scanner: &mut ReportScanner,
    memory: &MemoryTracker,
) -> ReportResult<InMemoryResult> {
    reader.open().await?;

    let mut records = Vec::new();
    let mut breaks = Vec::new();

    while let Some(record) = reader.next().await? {
        let Some(record_breaks) = reader.scan(scanner, &record)? else {
            continue;
        };
        memory.allocate(record.estimated_size())?;
        let position = records.len();
        breaks.extend(record_breaks.into_iter().map(|mut b| {
            b.position = position;
            b
        }));
        records.push(record);
    }

    let position = records.len();
    breaks.extend(scanner.finish().into_iter().map(|mut b| {
        b.position = position;
        b
    }));

    log::info!(
        "一次性加载完成: {} 条记录, {} 个断点, 跳过 {} 条",
        records.len(),
        breaks.len(),
        reader.skipped()
    );

    Ok(InMemoryResult {
        records,
        breaks,
        variables: scanner.snapshot(),
        progress: reader.progress().lock().summary(),
        skipped: reader.skipped(),
    })
}

pub async fn load_aggregation<S: RecordSource>(
    reader: &mut RecordReader<S>,
    scanner: &mut ReportScanner,
    memory: &MemoryTracker,
    sample: SampleOptions,
) -> ReportResult<AggregationResult> {
    let result = aggregate_all(reader, scanner, memory, sample).await;
    reader.close().await;
    result
}

async fn aggregate_all<S: RecordSource>(
    reader: &mut RecordReader<S>,
    scanner: &mut ReportScanner,
    memory: &MemoryTracker,
    sample: SampleOptions,
) -> ReportResult<AggregationResult> {
    reader.open().await?;

    let mut sampler = sample
        .include
        .then(|| Sampler::new(sample.method, sample.size, sample.seed));
    let mut groups = Vec::new();
    let mut record_count = 0u64;

    while let Some(record) = reader.next().await? {
        let Some(breaks) = reader.scan(scanner, &record)? else {
            continue;
        };
        record_count += 1;
        groups.extend(breaks.into_iter().filter(GroupBreak::is_footer));

        if let Some(sampler) = sampler.as_mut() {
            let before = sampler.len();
            if sampler.offer(&record) && sampler.len() > before {
                memory.allocate(record.estimated_size())?;
            }
        }
    }
    groups.extend(scanner.finish());

    let sample = sampler.map(Sampler::into_sample).unwrap_or_default();
    log::info!(
        "聚合加载完成: {} 条记录, {} 个分组汇总, 样本 {} 条",
        record_count,
        groups.len(),
        sample.len()
    );

    Ok(AggregationResult {
        groups,
        sample,
        variables: scanner.snapshot(),
        record_count,
        progress: reader.progress().lock().summary(),
        skipped: reader.skipped(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Group, ReportDefinition, ResetScope, Value, Variable, VariableKind};
    use crate::pipeline::progress::ProgressTracker;
    use crate::pipeline::source::{IterSource, VecSource};

    fn definition() -> ReportDefinition {
        ReportDefinition::new("sales")
            .with_group(Group::new("region", 1, "region"))
            .with_variable(Variable::new(
                "region_total",
                VariableKind::Sum,
                "amt",
                ResetScope::Group(1),
            ))
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new().with("region", "West").with("amt", 100),
            Record::new().with("region", "West").with("amt", 200),
            Record::new().with("region", "East").with("amt", 150),
        ]
    }

    fn reader<S: RecordSource>(source: S, row_cap: Option<usize>) -> RecordReader<S> {
        RecordReader::new(
            source,
            identity_transform(),
            row_cap,
            ProgressTracker::shared(None),
        )
    }

    #[tokio::test]
    async fn test_in_memory_breaks_have_absolute_positions() {
        let mut reader = reader(VecSource::new(records()), None);
        let mut scanner = ReportScanner::new(&definition(), false, false).expect("scanner");
        let memory = MemoryTracker::new(usize::MAX);
        let result = load_in_memory(&mut reader, &mut scanner, &memory)
            .await
            .expect("load");

        assert_eq!(result.records.len(), 3);
        let footers: Vec<_> = result.breaks.iter().filter(|b| b.is_footer()).collect();
        assert_eq!(footers.len(), 2);
        assert_eq!(footers[0].position, 2);
        assert_eq!(footers[0].values["region_total"], Value::Int(300));
        assert_eq!(footers[1].position, 3);
        assert_eq!(footers[1].values["region_total"], Value::Int(150));
        assert_eq!(result.progress.processed, 3);
    }

    #[tokio::test]
    async fn test_row_cap_limits_reads() {
        let mut reader = reader(VecSource::new(records()), Some(2));
        let mut scanner = ReportScanner::new(&definition(), false, false).expect("scanner");
        let memory = MemoryTracker::new(usize::MAX);
        let result = load_in_memory(&mut reader, &mut scanner, &memory)
            .await
            .expect("load");
        assert_eq!(result.records.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_ceiling() {
        let mut reader = reader(VecSource::new(records()), None);
        let mut scanner = ReportScanner::new(&definition(), false, false).expect("scanner");
        let memory = MemoryTracker::new(1);
        let err = load_in_memory(&mut reader, &mut scanner, &memory)
            .await
            .expect_err("over ceiling");
        assert!(matches!(err, ReportError::MemoryLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_source_failure_becomes_query_failed() {
        let items = vec![
            Ok(Record::new().with("region", "West").with("amt", 1)),
            Err(ReportError::Io(std::io::Error::new(std::io::ErrorKind::Other, "断开"))),
        ];
        let mut reader = reader(IterSource::new(items.into_iter()), None);
        let mut scanner = ReportScanner::new(&definition(), false, false).expect("scanner");
        let memory = MemoryTracker::new(usize::MAX);
        let err = load_in_memory(&mut reader, &mut scanner, &memory)
            .await
            .expect_err("source failure");
        assert!(matches!(err, ReportError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_transform_failures_are_skipped() {
        let transform: RecordTransform = Arc::new(|record: Record| {
            if record.get("amt") == Some(&Value::Int(200)) {
                Err(ReportError::TransformationFailed("拒绝".to_string()))
            } else {
                Ok(record)
            }
        });
        let mut reader = RecordReader::new(
            VecSource::new(records()),
            transform,
            None,
            ProgressTracker::shared(None),
        );
        let mut scanner = ReportScanner::new(&definition(), false, false).expect("scanner");
        let memory = MemoryTracker::new(usize::MAX);
        let result = load_in_memory(&mut reader, &mut scanner, &memory)
            .await
            .expect("load");
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.progress.errors, 1);
    }

    #[tokio::test]
    async fn test_aggregation_keeps_group_summaries_and_sample() {
        let mut reader = reader(VecSource::new(records()), None);
        let mut scanner = ReportScanner::new(&definition(), false, false).expect("scanner");
        let memory = MemoryTracker::new(usize::MAX);
        let options = SampleOptions {
            include: true,
            size: 2,
            method: SampleMethod::First,
            seed: None,
        };
        let result = load_aggregation(&mut reader, &mut scanner, &memory, options)
            .await
            .expect("load");
        assert_eq!(result.record_count, 3);
        assert_eq!(result.sample.len(), 2);
        let totals: Vec<_> = result
            .groups
            .iter()
            .map(|g| g.values["region_total"].clone())
            .collect();
        assert_eq!(totals, vec![Value::Int(300), Value::Int(150)]);
    }
}
