//! 集成测试共享工具模块
//!
//! 提供报表定义、记录数据、可观测的数据源和常用断言

#![allow(dead_code)]

pub mod assertions;
pub mod data_fixtures;
pub mod sources;

use std::path::PathBuf;

/// 项目 target 目录下的测试临时目录，每次调用得到唯一的子目录
pub fn test_dir(prefix: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join("test-temp")
        .join(format!(
            "{}_{}_{}",
            prefix,
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
    std::fs::create_dir_all(&dir).expect("创建测试目录失败");
    dir
}
