//! JSON Lines 输出消费者
//!
//! 每条记录、每个页眉页脚各占一行，按它们在报表中的顺序写出：
//!
//! ```text
//! {"type":"header","level":1,"group":"region","keys":["West"],"values":{...}}
//! {"type":"record","data":{"region":"West","amt":100}}
//! {"type":"footer","level":1,"group":"region","keys":["West"],"values":{...}}
//! ```

use async_trait::async_trait;
use serde_json::{json, Map};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::traits::ChunkConsumer;
use crate::core::error::ReportResult;
use crate::pipeline::chunk::{Chunk, GroupBreak};
use crate::variable::VariableSnapshot;

fn snapshot_json(values: &VariableSnapshot) -> serde_json::Value {
    let map: Map<String, serde_json::Value> = values
        .iter()
        .map(|(name, value)| (name.clone(), serde_json::Value::from(value)))
        .collect();
    serde_json::Value::Object(map)
}

fn break_json(group_break: &GroupBreak) -> serde_json::Value {
    let keys: Vec<serde_json::Value> = group_break.keys.iter().map(serde_json::Value::from).collect();
    json!({
        "type": group_break.kind,
        "level": group_break.level,
        "group": group_break.group_name,
        "keys": keys,
        "values": snapshot_json(&group_break.values),
    })
}

/// 写出结果
#[derive(Debug)]
pub struct JsonLinesOutput<W> {
    pub writer: W,
    pub lines: u64,
    /// 最后一个分块之后的变量值
    pub variables: VariableSnapshot,
}

pub struct JsonLinesConsumer<W> {
    writer: W,
    lines: u64,
    variables: VariableSnapshot,
    include_summary: bool,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesConsumer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines: 0,
            variables: VariableSnapshot::new(),
            include_summary: false,
        }
    }

    /// finalize 时额外写一行 `{"type":"summary", ...}`
    pub fn with_summary(mut self, include_summary: bool) -> Self {
        self.include_summary = include_summary;
        self
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    async fn write_line(&mut self, line: &serde_json::Value) -> ReportResult<()> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await?;
        self.lines += 1;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ChunkConsumer for JsonLinesConsumer<W> {
    type Output = JsonLinesOutput<W>;

    async fn consume_chunk(&mut self, chunk: &Chunk) -> ReportResult<()> {
        let mut breaks = chunk.breaks.iter().peekable();
        for (position, record) in chunk.records.iter().enumerate() {
            while let Some(group_break) = breaks.next_if(|b| b.position <= position) {
                self.write_line(&break_json(group_break)).await?;
            }
            let line = json!({ "type": "record", "data": record.to_json() });
            self.write_line(&line).await?;
        }
        for group_break in breaks {
            self.write_line(&break_json(group_break)).await?;
        }
        self.variables = chunk.variables.clone();
        Ok(())
    }

    async fn finalize(mut self) -> ReportResult<JsonLinesOutput<W>> {
        if self.include_summary {
            let line = json!({ "type": "summary", "values": snapshot_json(&self.variables) });
            self.write_line(&line).await?;
        }
        self.writer.flush().await?;
        Ok(JsonLinesOutput {
            writer: self.writer,
            lines: self.lines,
            variables: self.variables,
        })
    }
}
