//! 重试机制
//!
//! 提供可配置的重试策略和退避算法。只用于消费者处理分块这一步。

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::core::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[default]
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 包括第一次在内的最大尝试次数
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub strategy: RetryStrategy,
    pub retry_only_retryable: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            strategy: RetryStrategy::Fixed,
            retry_only_retryable: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不重试，失败一次即放弃
    pub fn none() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn with_max_delay(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_retry_only_retryable(mut self, only_retryable: bool) -> Self {
        self.retry_only_retryable = only_retryable;
        self
    }

    /// 第 `attempt` 次失败（从 1 开始）之后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay_ms = match self.strategy {
            RetryStrategy::Fixed => self.initial_delay_ms,
            RetryStrategy::Linear => self.initial_delay_ms.saturating_mul(attempt as u64),
            RetryStrategy::Exponential => {
                let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
                (self.initial_delay_ms as f64 * factor) as u64
            }
        };
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// 第 `attempt` 次失败后是否还要再试
    pub fn should_retry(&self, error: &ReportError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        !self.retry_only_retryable || error.is_retryable()
    }
}

/// 重试耗尽或遇到不可重试错误
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub last_error: ReportError,
}

/// 按配置重试异步操作
pub async fn retry_with_strategy<F, Fut, T>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ReportError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !config.should_retry(&e, attempt) {
                    return Err(RetryFailure {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                let delay = config.delay_for(attempt);
                log::debug!("第 {} 次尝试失败: {}, {:?} 后重试", attempt, e, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 5000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.strategy, RetryStrategy::Fixed);
    }

    #[test]
    fn test_delay_for_strategies() {
        let base = RetryConfig::new().with_initial_delay(100).with_max_delay(1000);
        assert_eq!(base.delay_for(3), Duration::from_millis(100));

        let linear = base.clone().with_strategy(RetryStrategy::Linear);
        assert_eq!(linear.delay_for(3), Duration::from_millis(300));

        let exponential = base.with_strategy(RetryStrategy::Exponential);
        assert_eq!(exponential.delay_for(1), Duration::from_millis(100));
        assert_eq!(exponential.delay_for(3), Duration::from_millis(400));
        assert_eq!(exponential.delay_for(10), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let config = RetryConfig::new().with_initial_delay(1);
        let calls = AtomicU32::new(0);
        let result = retry_with_strategy(&config, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err(ReportError::TransformationFailed("暂时失败".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.expect("should succeed"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_non_retryable() {
        let config = RetryConfig::new().with_initial_delay(1);
        let failure = retry_with_strategy(&config, |_| async {
            Err::<(), _>(ReportError::Definition("坏定义".to_string()))
        })
        .await
        .expect_err("should fail");
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let config = RetryConfig::new().with_initial_delay(1).with_max_attempts(3);
        let failure = retry_with_strategy(&config, |_| async {
            Err::<(), _>(ReportError::TransformationFailed("一直失败".to_string()))
        })
        .await
        .expect_err("should fail");
        assert_eq!(failure.attempts, 3);
    }
}
