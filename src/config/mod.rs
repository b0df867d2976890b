use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{ReportError, ReportResult};
use crate::pipeline::sample::SampleMethod;
use crate::pipeline::strategy::LoadingStrategy;
use crate::utils::retry::RetryConfig;

/// 应用配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: "banded-report".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_files: 5,
        }
    }
}

/// 一次报表会话的运行参数
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// auto | in_memory | streaming | aggregation，无法识别时按 auto 处理
    pub strategy: String,
    pub chunk_size: usize,
    /// 消费者确认前最多可以物化的记录数
    pub max_demand: usize,
    /// 字节
    pub memory_limit: usize,
    pub timeout_secs: u64,
    pub include_sample: bool,
    pub sample_size: usize,
    pub sample_method: SampleMethod,
    pub sample_seed: Option<u64>,
    pub in_memory_threshold: usize,
    pub strict_order: bool,
    pub suppress_detail_reset: bool,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: "auto".to_string(),
            chunk_size: 500,
            max_demand: 1000,
            memory_limit: 500 * 1024 * 1024, // 500MB
            timeout_secs: 300,
            include_sample: true,
            sample_size: 100,
            sample_method: SampleMethod::First,
            sample_seed: None,
            in_memory_threshold: 10_000,
            strict_order: false,
            suppress_detail_reset: false,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// 解析后的加载策略
    pub fn loading_strategy(&self) -> LoadingStrategy {
        LoadingStrategy::parse_lenient(&self.strategy)
    }

    pub fn with_strategy(mut self, strategy: LoadingStrategy) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_demand(mut self, max_demand: usize) -> Self {
        self.max_demand = max_demand;
        self
    }

    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_sample(mut self, include_sample: bool, sample_size: usize) -> Self {
        self.include_sample = include_sample;
        self.sample_size = sample_size;
        self
    }

    pub fn with_strict_order(mut self, strict_order: bool) -> Self {
        self.strict_order = strict_order;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> ReportResult<()> {
        if self.chunk_size == 0 {
            return Err(ReportError::Config("chunk_size 必须大于 0".to_string()));
        }
        if self.max_demand == 0 {
            return Err(ReportError::Config("max_demand 必须大于 0".to_string()));
        }
        if self.include_sample && self.sample_size == 0 {
            return Err(ReportError::Config(
                "启用采样时 sample_size 必须大于 0".to_string(),
            ));
        }
        if self.memory_limit == 0 {
            return Err(ReportError::Config("memory_limit 必须大于 0".to_string()));
        }
        Ok(())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ReportResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
