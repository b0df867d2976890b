//! 可观测的测试数据源

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use banded_report::core::{Record, ReportError, ReportResult};
use banded_report::pipeline::RecordSource;

/// 数据源的外部观察句柄
#[derive(Debug, Clone, Default)]
pub struct SourceTracker {
    reads: Arc<AtomicUsize>,
    opened: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl SourceTracker {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 等待数据源被关闭，最多等 `limit`
    pub async fn wait_closed(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.closed() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.closed()
    }
}

/// 记录读取次数和打开/关闭状态的数据源
pub struct TrackingSource {
    records: std::vec::IntoIter<Record>,
    len: usize,
    delay: Option<Duration>,
    tracker: SourceTracker,
}

impl TrackingSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            len: records.len(),
            records: records.into_iter(),
            delay: None,
            tracker: SourceTracker::default(),
        }
    }

    /// 每条记录之前等待 `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn tracker(&self) -> SourceTracker {
        self.tracker.clone()
    }
}

#[async_trait]
impl RecordSource for TrackingSource {
    async fn open(&mut self) -> ReportResult<()> {
        self.tracker.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_record(&mut self) -> ReportResult<Option<Record>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let record = self.records.next();
        if record.is_some() {
            self.tracker.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(record)
    }

    async fn close(&mut self) -> ReportResult<()> {
        self.tracker.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

/// 打开即失败的数据源
pub struct UnreachableSource;

#[async_trait]
impl RecordSource for UnreachableSource {
    async fn open(&mut self) -> ReportResult<()> {
        Err(ReportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "数据库不可达",
        )))
    }

    async fn next_record(&mut self) -> ReportResult<Option<Record>> {
        Ok(None)
    }
}
