//! 记录数据源
//!
//! 数据源在第一次读取前 `open`，在加载器或生产者任务的每条退出路径上 `close`。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::error::{ReportError, ReportResult};
use crate::core::Record;

#[async_trait]
pub trait RecordSource: Send {
    async fn open(&mut self) -> ReportResult<()> {
        Ok(())
    }

    /// 下一条记录，读完返回 `None`
    ///
    /// 返回非致命错误（如单行格式错误）时调用方跳过该记录继续读取
    async fn next_record(&mut self) -> ReportResult<Option<Record>>;

    async fn close(&mut self) -> ReportResult<()> {
        Ok(())
    }

    /// 预计记录数，用于策略选择和进度
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
impl RecordSource for Box<dyn RecordSource> {
    async fn open(&mut self) -> ReportResult<()> {
        (**self).open().await
    }

    async fn next_record(&mut self) -> ReportResult<Option<Record>> {
        (**self).next_record().await
    }

    async fn close(&mut self) -> ReportResult<()> {
        (**self).close().await
    }

    fn size_hint(&self) -> Option<usize> {
        (**self).size_hint()
    }
}

/// 内存中的记录列表
pub struct VecSource {
    records: std::vec::IntoIter<Record>,
    len: usize,
}

impl VecSource {
    pub fn new(records: Vec<Record>) -> Self {
        let len = records.len();
        Self {
            records: records.into_iter(),
            len,
        }
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn next_record(&mut self) -> ReportResult<Option<Record>> {
        Ok(self.records.next())
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

/// 任意产生 `ReportResult<Record>` 的迭代器
pub struct IterSource<I> {
    iter: I,
    hint: Option<usize>,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = ReportResult<Record>> + Send,
{
    pub fn new(iter: I) -> Self {
        Self { iter, hint: None }
    }

    pub fn with_size_hint(mut self, hint: usize) -> Self {
        self.hint = Some(hint);
        self
    }
}

#[async_trait]
impl<I> RecordSource for IterSource<I>
where
    I: Iterator<Item = ReportResult<Record>> + Send,
{
    async fn next_record(&mut self) -> ReportResult<Option<Record>> {
        self.iter.next().transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        self.hint
    }
}

/// 每行一个 JSON 对象的文件
///
/// 空行被忽略；非 UTF-8 或格式错误的行返回 `TransformationFailed`，读文件失败返回 `QueryFailed`
pub struct JsonLinesSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
    line_number: usize,
}

impl JsonLinesSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: None,
            buf: Vec::new(),
            line_number: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for JsonLinesSource {
    async fn open(&mut self) -> ReportResult<()> {
        let file = File::open(&self.path).await.map_err(|e| {
            ReportError::QueryFailed(format!("无法打开 {}: {}", self.path.display(), e))
        })?;
        self.reader = Some(BufReader::new(file));
        self.line_number = 0;
        log::debug!("打开数据文件 {}", self.path.display());
        Ok(())
    }

    async fn next_record(&mut self) -> ReportResult<Option<Record>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| ReportError::QueryFailed("数据源尚未打开".to_string()))?;

        loop {
            self.buf.clear();
            let read = reader.read_until(b'\n', &mut self.buf).await.map_err(|e| {
                ReportError::QueryFailed(format!("读取 {} 失败: {}", self.path.display(), e))
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            // 整行已被消费，非 UTF-8 的行只影响自身
            let line = std::str::from_utf8(&self.buf).map_err(|e| {
                ReportError::TransformationFailed(format!(
                    "第 {} 行不是合法 UTF-8: {}",
                    self.line_number, e
                ))
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let json: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                ReportError::TransformationFailed(format!("第 {} 行不是合法 JSON: {}", self.line_number, e))
            })?;
            return Record::from_json(json)
                .map(Some)
                .map_err(|e| {
                    ReportError::TransformationFailed(format!("第 {} 行: {}", self.line_number, e))
                });
        }
    }

    async fn close(&mut self) -> ReportResult<()> {
        self.reader = None;
        self.buf = Vec::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_vec_source() {
        let mut source = VecSource::new(vec![Record::new().with("n", 1)]);
        assert_eq!(source.size_hint(), Some(1));
        assert!(source.next_record().await.expect("read").is_some());
        assert!(source.next_record().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn test_iter_source_propagates_errors() {
        let items = vec![
            Ok(Record::new().with("n", 1)),
            Err(ReportError::QueryFailed("连接断开".to_string())),
        ];
        let mut source = IterSource::new(items.into_iter());
        assert!(source.next_record().await.expect("first").is_some());
        assert!(source.next_record().await.is_err());
    }

    #[tokio::test]
    async fn test_json_lines_source() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"region": "West", "amt": 100}}"#).expect("write");
        writeln!(file).expect("write");
        writeln!(file, "not json").expect("write");
        writeln!(file, r#"{{"region": "East", "amt": 150}}"#).expect("write");

        let mut source = JsonLinesSource::new(file.path());
        source.open().await.expect("open");

        let first = source.next_record().await.expect("read").expect("record");
        assert_eq!(first.get("amt"), Some(&crate::core::Value::Int(100)));

        let err = source.next_record().await.expect_err("bad line");
        assert!(matches!(err, ReportError::TransformationFailed(_)));

        let third = source.next_record().await.expect("read").expect("record");
        assert_eq!(third.get("region"), Some(&crate::core::Value::from("East")));
        assert!(source.next_record().await.expect("read").is_none());
        source.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_json_lines_invalid_utf8_line_is_skippable() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"amt": 1}}"#).expect("write");
        file.write_all(b"\xff\xfe\n").expect("write");
        writeln!(file, r#"{{"amt": 2}}"#).expect("write");

        let mut source = JsonLinesSource::new(file.path());
        source.open().await.expect("open");

        assert!(source.next_record().await.expect("read").is_some());
        let err = source.next_record().await.expect_err("bad line");
        assert!(matches!(err, ReportError::TransformationFailed(_)));
        assert!(!err.is_fatal());

        let third = source.next_record().await.expect("read").expect("record");
        assert_eq!(third.get("amt"), Some(&crate::core::Value::Int(2)));
        assert!(source.next_record().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn test_json_lines_missing_file() {
        let mut source = JsonLinesSource::new("/nonexistent/records.jsonl");
        assert!(matches!(
            source.open().await,
            Err(ReportError::QueryFailed(_))
        ));
    }
}
