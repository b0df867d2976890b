//! 记录消费进度的消费者包装

use async_trait::async_trait;

use super::traits::ChunkConsumer;
use crate::core::error::ReportResult;
use crate::pipeline::chunk::Chunk;
use crate::pipeline::progress::{ProgressTracker, ProgressUpdate, SharedProgress};

/// 每个分块成功消费后把进度推进到该分块的累计记录数
///
/// 进度对象可以被其他任务共享读取，例如界面轮询
pub struct ProgressConsumer<C> {
    inner: C,
    progress: SharedProgress,
}

impl<C: ChunkConsumer> ProgressConsumer<C> {
    pub fn new(inner: C, total: Option<u64>) -> Self {
        Self::with_progress(inner, ProgressTracker::shared(total))
    }

    pub fn with_progress(inner: C, progress: SharedProgress) -> Self {
        Self { inner, progress }
    }

    pub fn progress(&self) -> SharedProgress {
        SharedProgress::clone(&self.progress)
    }
}

#[async_trait]
impl<C: ChunkConsumer> ChunkConsumer for ProgressConsumer<C> {
    type Output = C::Output;

    async fn consume_chunk(&mut self, chunk: &Chunk) -> ReportResult<()> {
        match self.inner.consume_chunk(chunk).await {
            Ok(()) => {
                self.progress
                    .lock()
                    .update(ProgressUpdate::Processed(chunk.cumulative_count));
                Ok(())
            }
            Err(e) => {
                self.progress.lock().record_error();
                Err(e)
            }
        }
    }

    async fn finalize(self) -> ReportResult<C::Output> {
        let summary = self.progress.lock().summary();
        log::info!(
            "消费完成: {} 条记录, 用时 {:.2}s, {} 次错误",
            summary.processed,
            summary.elapsed_seconds,
            summary.errors
        );
        self.inner.finalize().await
    }
}
