//! 缓冲/分块器
//!
//! 把有序输入累积成批次。`batch_size` 是触发刷新的阈值而不是上限：
//! 一次追加多条时，刷新出的批次可能超过 `batch_size`。

#[derive(Debug)]
pub enum AppendOutcome<T> {
    /// 未达到阈值，继续缓冲
    Buffering,
    /// 达到阈值，返回全部待处理项
    Flush(Vec<T>),
}

impl<T> AppendOutcome<T> {
    pub fn is_flush(&self) -> bool {
        matches!(self, AppendOutcome::Flush(_))
    }
}

#[derive(Debug)]
pub struct Buffer<T> {
    pending: Vec<T>,
    batch_size: usize,
    total_buffered: u64,
    flush_count: u64,
}

impl<T> Buffer<T> {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pending: Vec::with_capacity(batch_size),
            batch_size,
            total_buffered: 0,
            flush_count: 0,
        }
    }

    /// 追加一批元素，达到阈值时整体刷新
    pub fn append<I>(&mut self, items: I) -> AppendOutcome<T>
    where
        I: IntoIterator<Item = T>,
    {
        let before = self.pending.len();
        self.pending.extend(items);
        self.total_buffered += (self.pending.len() - before) as u64;

        if self.pending.len() >= self.batch_size {
            AppendOutcome::Flush(self.take())
        } else {
            AppendOutcome::Buffering
        }
    }

    pub fn push(&mut self, item: T) -> AppendOutcome<T> {
        self.append(std::iter::once(item))
    }

    /// 取出剩余元素，统计数据保留
    pub fn flush(&mut self) -> Vec<T> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        self.take()
    }

    fn take(&mut self) -> Vec<T> {
        self.flush_count += 1;
        std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total_buffered(&self) -> u64 {
        self.total_buffered
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }
}
