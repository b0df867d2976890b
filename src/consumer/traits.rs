//! 消费者接口

use async_trait::async_trait;

use crate::core::error::ReportResult;
use crate::pipeline::chunk::Chunk;

/// 分块消费者
///
/// 会话按 `index` 递增的顺序逐个交付分块，全部交付后调用一次 `finalize`。
/// 状态保存在消费者自身，`finalize` 消耗消费者得到最终输出。
#[async_trait]
pub trait ChunkConsumer: Send + Sized {
    type Output: Send;

    async fn consume_chunk(&mut self, chunk: &Chunk) -> ReportResult<()>;

    async fn finalize(self) -> ReportResult<Self::Output>;
}
