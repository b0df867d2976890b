//! 消费者辅助工具

use std::future::Future;

use tokio::sync::Mutex;

use super::traits::ChunkConsumer;
use crate::core::error::{ReportError, ReportResult};
use crate::core::Record;
use crate::pipeline::buffer::{AppendOutcome, Buffer};
use crate::pipeline::chunk::Chunk;
use crate::utils::retry::{retry_with_strategy, RetryConfig, RetryFailure};

/// 为消费者攒批写出的记录缓冲
#[derive(Debug)]
pub struct ConsumerBuffer {
    buffer: Buffer<Record>,
}

impl ConsumerBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            buffer: Buffer::new(batch_size),
        }
    }

    /// 追加一个分块的记录，达到批大小时返回全部待写记录
    pub fn append_chunk(&mut self, chunk: &Chunk) -> Option<Vec<Record>> {
        match self.buffer.append(chunk.records.iter().cloned()) {
            AppendOutcome::Flush(batch) => Some(batch),
            AppendOutcome::Buffering => None,
        }
    }

    pub fn append(&mut self, records: Vec<Record>) -> Option<Vec<Record>> {
        match self.buffer.append(records) {
            AppendOutcome::Flush(batch) => Some(batch),
            AppendOutcome::Buffering => None,
        }
    }

    /// 取出剩余记录，`finalize` 时调用
    pub fn flush(&mut self) -> Vec<Record> {
        self.buffer.flush()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn total_buffered(&self) -> u64 {
        self.buffer.total_buffered()
    }

    pub fn flush_count(&self) -> u64 {
        self.buffer.flush_count()
    }
}

fn exhausted(failure: RetryFailure) -> ReportError {
    ReportError::ConsumeChunkFailed {
        attempts: failure.attempts,
        reason: failure.last_error.to_string(),
    }
}

/// 按策略重试一个消费操作，耗尽后返回 `ConsumeChunkFailed`
pub async fn with_error_handling<F, Fut, T>(policy: &RetryConfig, operation: F) -> ReportResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ReportResult<T>>,
{
    retry_with_strategy(policy, operation).await.map_err(exhausted)
}

/// 把一个分块交给消费者，失败按策略重试
///
/// 与 `with_error_handling` 共用 `retry_with_strategy` 的重试循环
pub async fn consume_with_retry<C: ChunkConsumer>(
    consumer: &mut C,
    chunk: &Chunk,
    policy: &RetryConfig,
) -> ReportResult<()> {
    let consumer = Mutex::new(consumer);
    let shared = &consumer;
    retry_with_strategy(policy, |_| async move {
        let mut guard = shared.lock().await;
        guard.consume_chunk(chunk).await
    })
    .await
    .map_err(|failure| {
        log::warn!(
            "分块 #{} 消费失败 {} 次, 放弃: {}",
            chunk.index,
            failure.attempts,
            failure.last_error
        );
        exhausted(failure)
    })
}
