//! 日志系统集成测试
//!
//! 测试范围:
//! - 日志配置默认值和 TOML 读写
//! - flexi_logger 初始化、写入和关闭
//!
//! 注意：flexi_logger 使用全局 logger，同一进程只能初始化一次，
//! 所以写文件的部分集中在一个测试里

mod common;

use serial_test::serial;
use std::fs;

use banded_report::config::{Config, LogConfig};
use banded_report::utils::logging;

/// 测试日志配置默认值
#[test]
fn test_log_config_defaults() {
    let config = Config::default();

    assert_eq!(config.log.level, "info");
    assert_eq!(config.log.dir, "logs");
    assert_eq!(config.log.file, "banded-report");
    assert_eq!(config.log.max_file_size, 100 * 1024 * 1024); // 100MB
    assert_eq!(config.log.max_files, 5);
}

/// 测试日志配置序列化和反序列化
#[test]
fn test_log_config_serialization() {
    let mut config = Config::default();
    config.log = LogConfig {
        level: "debug".to_string(),
        dir: "test_logs".to_string(),
        file: "test_report".to_string(),
        max_file_size: 50 * 1024 * 1024, // 50MB
        max_files: 3,
    };

    let toml_str = toml::to_string_pretty(&config).expect("序列化配置失败");
    assert!(toml_str.contains("[log]"));
    assert!(toml_str.contains("level = \"debug\""));
    assert!(toml_str.contains("max_file_size = 52428800"));

    let loaded: Config = toml::from_str(&toml_str).expect("反序列化配置失败");
    assert_eq!(loaded, config);
}

/// 测试日志配置从文件加载，缺省字段使用默认值
#[test]
fn test_log_config_from_file() {
    let dir = common::test_dir("log_config");
    let config_path = dir.join("config.toml");
    fs::write(
        &config_path,
        r#"
[log]
level = "warn"
dir = "custom_logs"
"#,
    )
    .expect("写入配置文件失败");

    let config = Config::load(&config_path).expect("加载配置失败");
    assert_eq!(config.log.level, "warn");
    assert_eq!(config.log.dir, "custom_logs");
    assert_eq!(config.log.file, "banded-report");
    assert_eq!(config.pipeline.chunk_size, 500);

    let _ = fs::remove_dir_all(&dir);
}

/// 集成测试：通过 logging::init 写日志文件，shutdown 后内容已落盘
#[test]
#[serial]
fn test_logging_init_and_shutdown() {
    let dir = common::test_dir("logging");
    let config = LogConfig {
        level: "info".to_string(),
        dir: dir.to_string_lossy().to_string(),
        file: "report_test".to_string(),
        max_file_size: 1024 * 1024,
        max_files: 2,
    };

    logging::init(&config).expect("日志初始化失败");
    assert!(logging::is_initialized());
    // 重复初始化保留第一次的配置
    logging::init(&LogConfig::default()).expect("重复初始化不应失败");

    log::info!("会话日志写入测试");
    log::warn!("警告日志测试");
    log::debug!("调试日志不应出现");

    logging::shutdown();
    assert!(!logging::is_initialized());

    let content: String = fs::read_dir(&dir)
        .expect("读取日志目录失败")
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("report_test") && name.ends_with(".log")
        })
        .map(|e| fs::read_to_string(e.path()).unwrap_or_default())
        .collect();

    assert!(content.contains("会话日志写入测试"), "日志应包含信息日志");
    assert!(content.contains("警告日志测试"), "日志应包含警告日志");
    assert!(!content.contains("调试日志不应出现"), "info 级别应过滤调试日志");

    let _ = fs::remove_dir_all(&dir);
}
