//! banded-report - streaming core of a banded report generator
//!
//! This crate takes a sorted, grouped stream of business records, computes
//! running aggregates at nested scopes, detects group boundaries and hands
//! bounded chunks of enriched data to pluggable output consumers.

pub mod config;
pub mod consumer;
pub mod core;
pub mod expression;
pub mod group;
pub mod pipeline;
pub mod utils;
pub mod variable;

pub use crate::config::{Config, PipelineConfig};
pub use crate::consumer::ChunkConsumer;
pub use crate::core::{Record, ReportDefinition, ReportError, ReportResult, Value};
pub use crate::pipeline::{Chunk, ChunkStream, LoadingStrategy, ReportSession};
