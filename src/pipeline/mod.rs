//! 数据加载与分块管道
//!
//! 数据源 → 读取器（转换、跳过、进度）→ 扫描器（断点、变量）→ 按策略输出：
//! - `in_memory`: 一次读完，返回全部记录和断点
//! - `streaming`: 生产者任务按需求许可读取，分块经有界通道交给消费端
//! - `aggregation`: 只保留分组汇总和有限样本

pub mod buffer;
pub mod chunk;
pub mod demand;
pub mod loader;
pub mod memory;
pub mod progress;
pub mod sample;
pub mod scanner;
pub mod session;
pub mod source;
pub mod stream;
pub mod strategy;

pub use buffer::{AppendOutcome, Buffer};
pub use chunk::{BreakKind, Chunk, ChunkBuilder, ChunkMetadata, GroupBreak};
pub use demand::{DemandGate, PipelineStats};
pub use loader::{
    identity_transform, load_aggregation, load_in_memory, AggregationResult, InMemoryResult,
    RecordReader, RecordTransform, SampleOptions,
};
pub use memory::MemoryTracker;
pub use progress::{ProgressSummary, ProgressTracker, ProgressUpdate, SharedProgress};
pub use sample::{SampleMethod, Sampler};
pub use scanner::ReportScanner;
pub use session::{LoadOutcome, ReportSession};
pub use source::{IterSource, JsonLinesSource, RecordSource, VecSource};
pub use stream::{ChunkStream, DemandMode};
pub use strategy::LoadingStrategy;
