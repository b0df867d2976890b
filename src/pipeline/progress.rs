//! 进度跟踪
//!
//! 记录已处理数、错误数和耗时，并按平均速率估算剩余时间。
//! 跨任务共享时包在 `Arc<parking_lot::Mutex<_>>` 里。

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::core::error::{ReportError, ReportResult};

pub type SharedProgress = Arc<Mutex<ProgressTracker>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// 已处理总数的绝对值
    Processed(u64),
    /// 在已处理数上累加
    Increment(u64),
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    processed: u64,
    errors: u64,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    last_update: Instant,
}

/// 可序列化的进度摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub processed: u64,
    pub total: Option<u64>,
    pub percentage: Option<f64>,
    pub elapsed_seconds: f64,
    /// 总数未知或尚未处理任何记录时为空
    pub estimated_remaining_seconds: Option<f64>,
    pub errors: u64,
    pub started_at: DateTime<Utc>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            total,
            processed: 0,
            errors: 0,
            started_at: now,
            started_wall: Utc::now(),
            last_update: now,
        }
    }

    pub fn shared(total: Option<u64>) -> SharedProgress {
        Arc::new(Mutex::new(Self::new(total)))
    }

    pub fn update(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Processed(n) => self.processed = n,
            ProgressUpdate::Increment(k) => self.processed = self.processed.saturating_add(k),
        }
        self.last_update = Instant::now();
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
        self.last_update = Instant::now();
    }

    pub fn set_total(&mut self, total: Option<u64>) {
        self.total = total;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    /// 完成百分比；总数为 0 视为已完成
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.processed as f64 / total as f64 * 100.0).min(100.0)
            }
        })
    }

    /// 剩余秒数，尚未处理任何记录时为无穷大
    pub fn estimate_remaining(&self) -> ReportResult<f64> {
        self.estimate_remaining_at(Instant::now())
    }

    pub fn estimate_remaining_at(&self, now: Instant) -> ReportResult<f64> {
        let total = self.total.ok_or(ReportError::UnknownTotal)?;
        if self.processed == 0 {
            return Ok(f64::INFINITY);
        }
        let remaining = total.saturating_sub(self.processed);
        if remaining == 0 {
            return Ok(0.0);
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let per_record = elapsed / self.processed as f64;
        Ok(per_record * remaining as f64)
    }

    pub fn summary(&self) -> ProgressSummary {
        let estimated_remaining_seconds = self
            .estimate_remaining()
            .ok()
            .filter(|seconds| seconds.is_finite());
        ProgressSummary {
            processed: self.processed,
            total: self.total,
            percentage: self.percentage(),
            elapsed_seconds: self.elapsed_seconds(),
            estimated_remaining_seconds,
            errors: self.errors,
            started_at: self.started_wall,
        }
    }
}
