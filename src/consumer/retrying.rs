//! 带重试的消费者包装

use async_trait::async_trait;

use super::helpers::consume_with_retry;
use super::traits::ChunkConsumer;
use crate::core::error::ReportResult;
use crate::pipeline::chunk::Chunk;
use crate::utils::retry::RetryConfig;

pub struct RetryingConsumer<C> {
    inner: C,
    policy: RetryConfig,
}

impl<C: ChunkConsumer> RetryingConsumer<C> {
    pub fn new(inner: C, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }
}

#[async_trait]
impl<C: ChunkConsumer> ChunkConsumer for RetryingConsumer<C> {
    type Output = C::Output;

    async fn consume_chunk(&mut self, chunk: &Chunk) -> ReportResult<()> {
        consume_with_retry(&mut self.inner, chunk, &self.policy).await
    }

    /// finalize 不重试
    async fn finalize(self) -> ReportResult<C::Output> {
        self.inner.finalize().await
    }
}
