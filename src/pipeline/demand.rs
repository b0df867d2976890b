//! 需求闸门
//!
//! 生产者每物化一条记录消耗一个许可，消费者确认后归还。
//! 许可总数为 `max_demand`，因此未确认的记录数永远不会超过它。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, TryAcquireError};

#[derive(Debug, Clone)]
pub struct DemandGate {
    semaphore: Arc<Semaphore>,
    stats: Arc<PipelineStats>,
}

impl DemandGate {
    pub fn new(max_demand: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_demand)),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// 不等待地取一个许可
    pub fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => false,
        }
    }

    /// 等待一个许可，闸门关闭时返回 false
    pub async fn acquire(&self) -> bool {
        match self.semaphore.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// 许可对应的记录已经物化
    pub fn mark_materialized(&self) {
        self.stats.record_materialized();
    }

    /// 归还未使用的许可（记录被跳过或输入已结束）
    pub fn return_unused(&self, n: usize) {
        if n > 0 {
            self.semaphore.add_permits(n);
        }
    }

    /// 消费者确认 `n` 条已物化记录
    pub fn acknowledge(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.stats.record_acknowledged(n);
        self.semaphore.add_permits(n);
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }
}

/// 管道运行统计
#[derive(Debug, Default)]
pub struct PipelineStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    materialized: AtomicU64,
    chunks_sent: AtomicU64,
}

impl PipelineStats {
    fn record_materialized(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        self.materialized.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!("banded_report_in_flight_records").set(now as f64);
    }

    fn record_acknowledged(&self, n: usize) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(n))
            });
    }

    pub(crate) fn record_chunk_sent(&self) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("banded_report_chunks_emitted_total").increment(1);
    }

    /// 已物化但未被确认的记录数
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    pub fn materialized(&self) -> u64 {
        self.materialized.load(Ordering::Relaxed)
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_bound_in_flight() {
        let gate = DemandGate::new(2);
        assert!(gate.try_acquire());
        gate.mark_materialized();
        assert!(gate.acquire().await);
        gate.mark_materialized();
        assert!(!gate.try_acquire());

        let stats = gate.stats();
        assert_eq!(stats.in_flight(), 2);

        gate.acknowledge(1);
        assert_eq!(stats.in_flight(), 1);
        assert_eq!(stats.peak_in_flight(), 2);
        assert!(gate.try_acquire());
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let gate = DemandGate::new(0);
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };
        gate.close();
        assert!(!waiter.await.expect("join"));
        assert!(gate.is_closed());
    }
}
