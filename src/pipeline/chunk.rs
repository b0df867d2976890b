//! 分块与分组断点
//!
//! 断点的 `position` 是它在分块记录中的下标：页眉页脚出现在该下标的记录之前，
//! 等于 `records.len()` 时表示出现在分块末尾。同一位置先页脚后页眉。

use serde::{Deserialize, Serialize};

use super::buffer::{AppendOutcome, Buffer};
use crate::core::{Record, Value};
use crate::variable::VariableSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Header,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBreak {
    pub kind: BreakKind,
    pub level: u32,
    pub group_name: String,
    /// 从第 1 级到本级的分组键
    pub keys: Vec<Value>,
    /// 断点处所有变量的快照；页脚是该分组的最终聚合值
    pub values: VariableSnapshot,
    pub position: usize,
}

impl GroupBreak {
    pub fn is_footer(&self) -> bool {
        self.kind == BreakKind::Footer
    }

    pub fn is_header(&self) -> bool {
        self.kind == BreakKind::Header
    }

    /// 本级分组键
    pub fn key(&self) -> Option<&Value> {
        self.keys.last()
    }
}

/// 提供给消费者的分块元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_index: u64,
    pub chunk_size: usize,
    pub total_processed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u64,
    pub records: Vec<Record>,
    /// 包括本分块在内已输出的记录总数
    pub cumulative_count: u64,
    pub breaks: Vec<GroupBreak>,
    /// 本分块最后一条记录处理后的变量快照
    pub variables: VariableSnapshot,
    pub is_last: bool,
}

impl Chunk {
    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            chunk_index: self.index,
            chunk_size: self.records.len(),
            total_processed: self.cumulative_count,
        }
    }

    pub fn footers(&self) -> impl Iterator<Item = &GroupBreak> {
        self.breaks.iter().filter(|b| b.is_footer())
    }

    pub fn headers(&self) -> impl Iterator<Item = &GroupBreak> {
        self.breaks.iter().filter(|b| b.is_header())
    }

    pub fn estimated_size(&self) -> usize {
        self.records.iter().map(Record::estimated_size).sum()
    }
}

/// 把记录和断点组装成编号递增的分块
#[derive(Debug)]
pub struct ChunkBuilder {
    buffer: Buffer<Record>,
    breaks: Vec<GroupBreak>,
    next_index: u64,
    emitted: u64,
}

impl ChunkBuilder {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buffer: Buffer::new(chunk_size),
            breaks: Vec::new(),
            next_index: 0,
            emitted: 0,
        }
    }

    /// 待输出的记录数
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.breaks.is_empty()
    }

    /// 断点挂在下一条记录之前
    pub fn add_breaks(&mut self, breaks: Vec<GroupBreak>) {
        let position = self.buffer.len();
        self.breaks.extend(breaks.into_iter().map(|mut b| {
            b.position = position;
            b
        }));
    }

    /// 追加记录，达到分块大小时返回完整分块
    pub fn push<F>(&mut self, record: Record, snapshot: F) -> Option<Chunk>
    where
        F: FnOnce() -> VariableSnapshot,
    {
        match self.buffer.push(record) {
            AppendOutcome::Flush(records) => Some(self.build(records, snapshot(), false)),
            AppendOutcome::Buffering => None,
        }
    }

    /// 提前输出未满的分块，没有待输出内容时返回 None
    pub fn flush_partial(&mut self, snapshot: VariableSnapshot) -> Option<Chunk> {
        if !self.has_pending() {
            return None;
        }
        let records = self.buffer.flush();
        Some(self.build(records, snapshot, false))
    }

    /// 输出最后一个分块，可能不含记录
    pub fn finish(&mut self, snapshot: VariableSnapshot) -> Chunk {
        let records = self.buffer.flush();
        self.build(records, snapshot, true)
    }

    fn build(&mut self, records: Vec<Record>, variables: VariableSnapshot, is_last: bool) -> Chunk {
        self.emitted += records.len() as u64;
        let chunk = Chunk {
            index: self.next_index,
            records,
            cumulative_count: self.emitted,
            breaks: std::mem::take(&mut self.breaks),
            variables,
            is_last,
        };
        self.next_index += 1;
        chunk
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn chunks_built(&self) -> u64 {
        self.next_index
    }
}
