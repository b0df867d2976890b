//! 报表会话
//!
//! 一个会话对应一份报表定义和一组管道配置，负责：
//! 选择加载策略、为每次运行创建扫描器和读取器、施加超时和内存上限，
//! 以及把分块逐个交给消费者。会话之间没有共享状态，可以并发运行。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::chunk::Chunk;
use super::loader::{
    identity_transform, load_aggregation, load_in_memory, AggregationResult, InMemoryResult,
    RecordReader, RecordTransform, SampleOptions,
};
use super::memory::MemoryTracker;
use super::progress::{ProgressTracker, SharedProgress};
use super::scanner::ReportScanner;
use super::source::RecordSource;
use super::strategy::LoadingStrategy;
use super::stream::ChunkStream;
use crate::config::PipelineConfig;
use crate::consumer::{consume_with_retry, ChunkConsumer};
use crate::core::error::{ReportError, ReportResult, SessionFailure};
use crate::core::{Record, ReportDefinition};

/// 一次加载的结果，形态取决于实际使用的策略
pub enum LoadOutcome {
    InMemory(InMemoryResult),
    Aggregation(AggregationResult),
    Streaming(ChunkStream),
}

impl LoadOutcome {
    pub fn strategy(&self) -> LoadingStrategy {
        match self {
            LoadOutcome::InMemory(_) => LoadingStrategy::InMemory,
            LoadOutcome::Aggregation(_) => LoadingStrategy::Aggregation,
            LoadOutcome::Streaming(_) => LoadingStrategy::Streaming,
        }
    }
}

#[derive(Clone)]
pub struct ReportSession {
    id: Uuid,
    definition: Arc<ReportDefinition>,
    config: PipelineConfig,
    transform: RecordTransform,
}

impl ReportSession {
    /// 校验定义和配置，建立阶段的错误在这里返回
    pub fn new(definition: ReportDefinition, config: PipelineConfig) -> ReportResult<Self> {
        definition.validate()?;
        config.validate()?;
        // 提前编译表达式并排好变量依赖，循环依赖等错误不会拖到第一条记录
        ReportScanner::new(
            &definition,
            config.strict_order,
            config.suppress_detail_reset,
        )?;

        let session = Self {
            id: Uuid::new_v4(),
            definition: Arc::new(definition),
            config,
            transform: identity_transform(),
        };
        log::debug!(
            "创建会话 {}: 报表 {}, {} 个分组, {} 个变量",
            session.id,
            session.definition.name,
            session.definition.groups.len(),
            session.definition.variables.len()
        );
        Ok(session)
    }

    /// 设置逐条记录转换，返回错误的记录会被跳过
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Record) -> ReportResult<Record> + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition(&self) -> &ReportDefinition {
        &self.definition
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 根据配置、定义和数据源的预计行数选择策略
    pub fn strategy_for(&self, size_hint: Option<usize>) -> LoadingStrategy {
        let expected_rows = self.definition.row_cap.or(size_hint);
        self.config.loading_strategy().resolve(
            self.definition.aggregation_only,
            expected_rows,
            self.config.in_memory_threshold,
        )
    }

    fn timeout(&self) -> Option<Duration> {
        (self.config.timeout_secs > 0).then(|| Duration::from_secs(self.config.timeout_secs))
    }

    fn scanner(&self) -> ReportResult<ReportScanner> {
        ReportScanner::new(
            &self.definition,
            self.config.strict_order,
            self.config.suppress_detail_reset,
        )
    }

    fn reader<S: RecordSource>(
        &self,
        source: S,
        strategy: LoadingStrategy,
        progress: SharedProgress,
    ) -> RecordReader<S> {
        // 聚合策略总是读完整个数据源
        let row_cap = match strategy {
            LoadingStrategy::Aggregation => None,
            _ => self.definition.row_cap,
        };
        let expected = match (row_cap, source.size_hint()) {
            (Some(cap), Some(hint)) => Some(cap.min(hint)),
            (cap, hint) => cap.or(hint),
        };
        progress.lock().set_total(expected.map(|n| n as u64));
        RecordReader::new(source, Arc::clone(&self.transform), row_cap, progress)
    }

    fn memory(&self) -> Arc<MemoryTracker> {
        Arc::new(MemoryTracker::new(self.config.memory_limit))
    }

    fn sample_options(&self) -> SampleOptions {
        SampleOptions {
            include: self.config.include_sample,
            size: self.config.sample_size,
            method: self.config.sample_method,
            seed: self.config.sample_seed,
        }
    }

    async fn with_timeout<T, F>(&self, future: F) -> ReportResult<T>
    where
        F: Future<Output = ReportResult<T>>,
    {
        match self.timeout() {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| ReportError::Timeout(limit))?,
            None => future.await,
        }
    }

    /// 以流式策略打开数据源，不论配置选择了哪种策略
    pub fn stream<S>(&self, source: S) -> ReportResult<ChunkStream>
    where
        S: RecordSource + 'static,
    {
        self.stream_with(source, ProgressTracker::shared(None))
    }

    fn stream_with<S>(&self, source: S, progress: SharedProgress) -> ReportResult<ChunkStream>
    where
        S: RecordSource + 'static,
    {
        let scanner = self.scanner()?;
        let reader = self.reader(source, LoadingStrategy::Streaming, progress);
        Ok(ChunkStream::spawn(
            self.id,
            reader,
            scanner,
            &self.config,
            self.memory(),
        ))
    }

    /// 按选定策略加载
    ///
    /// 一次性策略在返回前读完并关闭数据源；流式策略返回句柄，由调用方拉取
    pub async fn load<S>(&self, source: S) -> ReportResult<LoadOutcome>
    where
        S: RecordSource + 'static,
    {
        self.load_with(source, ProgressTracker::shared(None)).await
    }

    async fn load_with<S>(&self, source: S, progress: SharedProgress) -> ReportResult<LoadOutcome>
    where
        S: RecordSource + 'static,
    {
        let strategy = self.strategy_for(source.size_hint());
        log::info!(
            "会话 {} 使用 {} 策略加载报表 {}",
            self.id,
            strategy,
            self.definition.name
        );

        match strategy {
            LoadingStrategy::Streaming | LoadingStrategy::Auto => self
                .stream_with(source, progress)
                .map(LoadOutcome::Streaming),
            LoadingStrategy::InMemory => {
                let mut scanner = self.scanner()?;
                let mut reader = self.reader(source, strategy, progress);
                let memory = self.memory();
                let result = self
                    .with_timeout(load_in_memory(&mut reader, &mut scanner, &memory))
                    .await;
                // 超时时加载器来不及关闭数据源
                reader.close().await;
                result.map(LoadOutcome::InMemory)
            }
            LoadingStrategy::Aggregation => {
                let mut scanner = self.scanner()?;
                let mut reader = self.reader(source, strategy, progress);
                let memory = self.memory();
                let sample = self.sample_options();
                let result = self
                    .with_timeout(load_aggregation(&mut reader, &mut scanner, &memory, sample))
                    .await;
                reader.close().await;
                result.map(LoadOutcome::Aggregation)
            }
        }
    }

    /// 完整运行一次：加载、逐块交给消费者、finalize
    ///
    /// 一次性策略的结果作为单个分块交付。失败时附带已有的进度。
    pub async fn run<S, C>(&self, source: S, consumer: C) -> Result<C::Output, SessionFailure>
    where
        S: RecordSource + 'static,
        C: ChunkConsumer,
    {
        let progress = ProgressTracker::shared(None);
        let result = self
            .with_timeout(self.drive(source, consumer, SharedProgress::clone(&progress)))
            .await;

        let summary = progress.lock().summary();
        match result {
            Ok(output) => {
                log::info!(
                    "会话 {} 完成: {} 条记录, {} 条跳过, 用时 {:.2}s",
                    self.id,
                    summary.processed,
                    summary.errors,
                    summary.elapsed_seconds
                );
                Ok(output)
            }
            Err(error) => {
                log::error!("会话 {} 失败: {}", self.id, error);
                Err(SessionFailure {
                    error,
                    progress: Some(summary),
                })
            }
        }
    }

    async fn drive<S, C>(
        &self,
        source: S,
        mut consumer: C,
        progress: SharedProgress,
    ) -> ReportResult<C::Output>
    where
        S: RecordSource + 'static,
        C: ChunkConsumer,
    {
        let retry = &self.config.retry;
        match self.load_with(source, progress).await? {
            LoadOutcome::Streaming(mut chunks) => {
                while let Some(chunk) = chunks.next_chunk().await? {
                    consume_with_retry(&mut consumer, &chunk, retry).await?;
                }
                let stats = chunks.stats();
                log::debug!(
                    "会话 {} 流式统计: {} 个分块, 在途峰值 {}",
                    self.id,
                    stats.chunks_sent(),
                    stats.peak_in_flight()
                );
            }
            LoadOutcome::InMemory(result) => {
                let chunk = Chunk {
                    index: 0,
                    cumulative_count: result.records.len() as u64,
                    records: result.records,
                    breaks: result.breaks,
                    variables: result.variables,
                    is_last: true,
                };
                consume_with_retry(&mut consumer, &chunk, retry).await?;
            }
            LoadOutcome::Aggregation(result) => {
                // 样本之后依次是各分组的页脚
                let position = result.sample.len();
                let breaks = result
                    .groups
                    .into_iter()
                    .map(|mut b| {
                        b.position = position;
                        b
                    })
                    .collect();
                let chunk = Chunk {
                    index: 0,
                    cumulative_count: result.sample.len() as u64,
                    records: result.sample,
                    breaks,
                    variables: result.variables,
                    is_last: true,
                };
                consume_with_retry(&mut consumer, &chunk, retry).await?;
            }
        }
        consumer.finalize().await
    }
}
