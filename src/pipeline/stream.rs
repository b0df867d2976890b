//! 带背压的流式管道
//!
//! 生产者任务只在有需求许可时读取数据源，扫描后按 `chunk_size` 组装分块，
//! 通过有界通道发送。需求耗尽而分块未满时提前输出，避免 `max_demand < chunk_size`
//! 时互相等待。消费端通过 `next_chunk` 拉取，自动模式下拉取即确认上一个分块。

use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use super::chunk::{Chunk, ChunkBuilder};
use super::demand::{DemandGate, PipelineStats};
use super::loader::RecordReader;
use super::memory::MemoryTracker;
use super::progress::{ProgressSummary, SharedProgress};
use super::scanner::ReportScanner;
use super::source::RecordSource;
use crate::config::PipelineConfig;
use crate::core::error::{ReportError, ReportResult};

/// 需求确认方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemandMode {
    /// 每次 `next_chunk` 确认上一个分块的全部记录
    #[default]
    Automatic,
    /// 由消费者调用 `request(n)` 确认
    Manual,
}

struct Producer<S> {
    reader: RecordReader<S>,
    scanner: ReportScanner,
    builder: ChunkBuilder,
    gate: DemandGate,
    stats: Arc<PipelineStats>,
    memory: Arc<MemoryTracker>,
    sender: mpsc::Sender<ReportResult<Chunk>>,
}

impl<S: RecordSource> Producer<S> {
    async fn run(mut self) {
        let result = self.produce().await;
        self.reader.close().await;

        match result {
            Ok(()) => log::debug!("生产者完成, 共输出 {} 个分块", self.builder.chunks_built()),
            Err(ReportError::StreamClosed) => log::debug!("消费端已关闭, 生产者退出"),
            Err(e) => {
                log::error!("流式加载失败: {}", e);
                let _ = self.sender.send(Err(e)).await;
            }
        }
    }

    async fn produce(&mut self) -> ReportResult<()> {
        self.reader.open().await?;

        loop {
            if !self.gate.try_acquire() {
                if let Some(chunk) = self.flush_partial() {
                    self.send(chunk).await?;
                }
                if !self.gate.acquire().await {
                    return Err(ReportError::StreamClosed);
                }
            }

            let Some(record) = self.reader.next().await? else {
                self.gate.return_unused(1);
                break;
            };
            let Some(breaks) = self.reader.scan(&mut self.scanner, &record)? else {
                self.gate.return_unused(1);
                continue;
            };

            self.gate.mark_materialized();
            self.memory.allocate(record.estimated_size())?;
            self.builder.add_breaks(breaks);

            let scanner = &self.scanner;
            if let Some(chunk) = self.builder.push(record, || scanner.snapshot()) {
                self.send(chunk).await?;
            }
        }

        let footers = self.scanner.finish();
        self.builder.add_breaks(footers);
        let last = self.builder.finish(self.scanner.snapshot());
        self.send(last).await
    }

    fn flush_partial(&mut self) -> Option<Chunk> {
        if self.builder.pending_len() == 0 {
            return None;
        }
        self.builder.flush_partial(self.scanner.snapshot())
    }

    async fn send(&mut self, chunk: Chunk) -> ReportResult<()> {
        log::debug!(
            "输出分块 #{}: {} 条记录, {} 个断点",
            chunk.index,
            chunk.size(),
            chunk.breaks.len()
        );
        self.sender
            .send(Ok(chunk))
            .await
            .map_err(|_| ReportError::StreamClosed)?;
        self.stats.record_chunk_sent();
        Ok(())
    }
}

/// 消费端句柄
///
/// 丢弃句柄会关闭需求闸门，生产者随之退出并关闭数据源
pub struct ChunkStream {
    session_id: Uuid,
    receiver: mpsc::Receiver<ReportResult<Chunk>>,
    gate: DemandGate,
    stats: Arc<PipelineStats>,
    progress: SharedProgress,
    memory: Arc<MemoryTracker>,
    mode: DemandMode,
    unacknowledged: usize,
    deadline: Option<Instant>,
    timeout: Duration,
    finished: bool,
}

impl ChunkStream {
    /// 启动生产者任务
    pub fn spawn<S>(
        session_id: Uuid,
        reader: RecordReader<S>,
        scanner: ReportScanner,
        config: &PipelineConfig,
        memory: Arc<MemoryTracker>,
    ) -> Self
    where
        S: RecordSource + 'static,
    {
        let chunk_size = config.chunk_size.max(1);
        let max_demand = config.max_demand.max(1);
        let capacity = (max_demand / chunk_size).max(1) + 1;
        let (sender, receiver) = mpsc::channel(capacity);

        let gate = DemandGate::new(max_demand);
        let stats = gate.stats();
        let progress = Arc::clone(reader.progress());

        let producer = Producer {
            reader,
            scanner,
            builder: ChunkBuilder::new(chunk_size),
            gate: gate.clone(),
            stats: Arc::clone(&stats),
            memory: Arc::clone(&memory),
            sender,
        };
        tokio::spawn(producer.run());

        let timeout = Duration::from_secs(config.timeout_secs);
        let deadline = (config.timeout_secs > 0).then(|| Instant::now() + timeout);

        log::info!(
            "会话 {} 开始流式加载: chunk_size={}, max_demand={}",
            session_id,
            chunk_size,
            max_demand
        );

        Self {
            session_id,
            receiver,
            gate,
            stats,
            progress,
            memory,
            mode: DemandMode::Automatic,
            unacknowledged: 0,
            deadline,
            timeout,
            finished: false,
        }
    }

    pub fn with_demand_mode(mut self, mode: DemandMode) -> Self {
        self.mode = mode;
        self
    }

    /// 拉取下一个分块，流结束后返回 `None`
    pub async fn next_chunk(&mut self) -> ReportResult<Option<Chunk>> {
        if self.mode == DemandMode::Automatic {
            let delivered = self.unacknowledged;
            self.acknowledge(delivered);
        }
        if self.finished {
            return Ok(None);
        }

        let received = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        self.finished = true;
                        self.gate.close();
                        log::warn!("会话 {} 超时 ({:?})", self.session_id, self.timeout);
                        return Err(ReportError::Timeout(self.timeout));
                    }
                }
            }
            None => self.receiver.recv().await,
        };

        match received {
            Some(Ok(chunk)) => {
                self.unacknowledged += chunk.size();
                self.memory.deallocate(chunk.estimated_size());
                if chunk.is_last {
                    self.finished = true;
                }
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                self.finished = true;
                Err(e)
            }
            None => {
                self.finished = true;
                Err(ReportError::StreamClosed)
            }
        }
    }

    /// 手动确认 `n` 条已交付记录，返回实际确认的数量
    ///
    /// 确认数不会超过已交付未确认的记录数
    pub fn request(&mut self, n: usize) -> usize {
        let granted = n.min(self.unacknowledged);
        self.acknowledge(granted);
        granted
    }

    fn acknowledge(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.unacknowledged -= n;
        self.gate.acknowledge(n);
    }

    /// 转换为 `futures::Stream`，每次轮询相当于一次 `next_chunk`
    pub fn into_stream(self) -> impl Stream<Item = ReportResult<Chunk>> {
        stream::unfold(self, |mut chunks| async move {
            match chunks.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), chunks)),
                Ok(None) => None,
                Err(e) => Some((Err(e), chunks)),
            }
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn demand_mode(&self) -> DemandMode {
        self.mode
    }

    pub fn unacknowledged(&self) -> usize {
        self.unacknowledged
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn progress(&self) -> ProgressSummary {
        self.progress.lock().summary()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.gate.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, ReportDefinition};
    use crate::pipeline::loader::identity_transform;
    use crate::pipeline::progress::ProgressTracker;
    use crate::pipeline::source::VecSource;
    use futures::StreamExt;

    fn spawn(records: Vec<Record>, config: &PipelineConfig) -> ChunkStream {
        let reader = RecordReader::new(
            VecSource::new(records),
            identity_transform(),
            None,
            ProgressTracker::shared(None),
        );
        let scanner =
            ReportScanner::new(&ReportDefinition::new("plain"), false, false).expect("scanner");
        ChunkStream::spawn(
            Uuid::new_v4(),
            reader,
            scanner,
            config,
            Arc::new(MemoryTracker::new(usize::MAX)),
        )
    }

    fn numbered(n: i64) -> Vec<Record> {
        (0..n).map(|i| Record::new().with("n", i)).collect()
    }

    #[tokio::test]
    async fn test_chunks_are_ordered_and_lossless() {
        let config = PipelineConfig::default().with_chunk_size(4).with_max_demand(8);
        let mut chunks = spawn(numbered(10), &config);

        let mut seen = Vec::new();
        let mut indices = Vec::new();
        while let Some(chunk) = chunks.next_chunk().await.expect("chunk") {
            indices.push(chunk.index);
            seen.extend(chunk.records.iter().map(|r| r.get("n").cloned()));
            assert!(chunk.size() <= 4);
        }
        // 需求耗尽时可能提前输出部分分块，但编号总是连续的
        let expected_indices: Vec<u64> = (0..indices.len() as u64).collect();
        assert_eq!(indices, expected_indices);
        let expected: Vec<_> = numbered(10).iter().map(|r| r.get("n").cloned()).collect();
        assert_eq!(seen, expected);
        assert!(chunks.stats().peak_in_flight() <= 8);
    }

    #[tokio::test]
    async fn test_small_demand_flushes_early() {
        let config = PipelineConfig::default().with_chunk_size(10).with_max_demand(3);
        let mut chunks = spawn(numbered(7), &config);

        let mut total = 0;
        while let Some(chunk) = chunks.next_chunk().await.expect("chunk") {
            assert!(chunk.size() <= 3);
            total += chunk.size();
        }
        assert_eq!(total, 7);
        assert!(chunks.stats().peak_in_flight() <= 3);
    }

    #[tokio::test]
    async fn test_manual_demand() {
        let config = PipelineConfig::default().with_chunk_size(2).with_max_demand(2);
        let mut chunks = spawn(numbered(4), &config).with_demand_mode(DemandMode::Manual);

        let first = chunks.next_chunk().await.expect("chunk").expect("first");
        assert_eq!(first.size(), 2);
        assert_eq!(chunks.unacknowledged(), 2);
        assert_eq!(chunks.request(10), 2);

        let second = chunks.next_chunk().await.expect("chunk").expect("second");
        assert_eq!(second.size(), 2);
        chunks.request(2);
        let last = chunks.next_chunk().await.expect("chunk").expect("last");
        assert!(last.is_last);
        assert!(chunks.next_chunk().await.expect("done").is_none());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let config = PipelineConfig::default().with_chunk_size(3);
        let chunks: Vec<_> = spawn(numbered(5), &config).into_stream().collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.is_ok()));
    }

    #[tokio::test]
    async fn test_empty_source_yields_terminal_chunk() {
        let mut chunks = spawn(Vec::new(), &PipelineConfig::default());
        let last = chunks.next_chunk().await.expect("chunk").expect("terminal");
        assert!(last.is_last);
        assert!(last.is_empty());
        assert!(chunks.next_chunk().await.expect("done").is_none());
    }
}
