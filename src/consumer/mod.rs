//! 分块消费者
//!
//! `ChunkConsumer` 是管道的输出端接口，渲染器（HTML、PDF 等）在本 crate 之外实现它。
//! 这里提供重试和进度包装，以及两个参考实现。

pub mod collect;
pub mod helpers;
pub mod json;
pub mod progress;
pub mod retrying;
pub mod traits;

pub use collect::{CollectedReport, CollectingConsumer};
pub use helpers::{consume_with_retry, with_error_handling, ConsumerBuffer};
pub use json::{JsonLinesConsumer, JsonLinesOutput};
pub use progress::ProgressConsumer;
pub use retrying::RetryingConsumer;
pub use traits::ChunkConsumer;
