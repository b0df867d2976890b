//! 内存管理模块
//!
//! 按记录估算字节数做内存使用监控和限制

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::error::{ReportError, ReportResult};

/// 内存使用跟踪器
#[derive(Debug)]
pub struct MemoryTracker {
    current_usage: AtomicUsize,
    peak_usage: AtomicUsize,
    limit: usize,
}

impl MemoryTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            current_usage: AtomicUsize::new(0),
            peak_usage: AtomicUsize::new(0),
            limit,
        }
    }

    /// 登记一次分配，超出限制时回滚并返回错误
    pub fn allocate(&self, size: usize) -> ReportResult<()> {
        let current = self.current_usage.fetch_add(size, Ordering::AcqRel) + size;

        if current > self.limit {
            self.current_usage.fetch_sub(size, Ordering::AcqRel);
            return Err(ReportError::MemoryLimitExceeded {
                current,
                limit: self.limit,
            });
        }

        self.peak_usage.fetch_max(current, Ordering::AcqRel);
        Ok(())
    }

    /// 释放内存，不会低于 0
    pub fn deallocate(&self, size: usize) {
        let _ = self
            .current_usage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(size))
            });
    }

    pub fn current_usage(&self) -> usize {
        self.current_usage.load(Ordering::Acquire)
    }

    pub fn peak_usage(&self) -> usize {
        self.peak_usage.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 获取内存使用比例（0-100）
    pub fn usage_ratio(&self) -> u8 {
        if self.limit == 0 {
            return 100;
        }
        ((self.current_usage() as f64 / self.limit as f64) * 100.0).min(100.0) as u8
    }

    pub fn reset(&self) {
        self.current_usage.store(0, Ordering::Release);
    }
}
