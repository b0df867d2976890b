//! 分组模块

pub mod break_detector;

pub use break_detector::{detect, GroupBreakDetector};
