//! 变量模块：累加器、依赖顺序和作用域变量引擎

pub mod accumulator;
pub mod dependency_graph;
pub mod engine;

pub use accumulator::Accumulator;
pub use dependency_graph::DependencyGraph;
pub use engine::{VariableEngine, VariableSnapshot};
