//! 日志初始化
//!
//! 日志配置文件 (INI):
//! ```text
//! [logging]
//! level = info
//! directory = logs
//! file_name = pysolo-tracker.log
//! json = false
//! ```
//! `RUST_LOG` 环境变量优先于配置文件中的级别。

use crate::error::Result;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 日志配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub directory: PathBuf,
    /// 为空时使用 `<程序名>.log`
    pub file_name: Option<String>,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            file_name: None,
            json: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LogConfigFile {
    #[serde(default)]
    logging: LogConfig,
}

impl LogConfig {
    /// 读取日志配置; 文件不存在时返回 None
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let file: LogConfigFile = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()?
            .try_deserialize()?;
        Ok(Some(file.logging))
    }

    /// 日志文件名
    pub fn file_name_for(&self, binary: &str) -> String {
        self.file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{}.log", binary))
    }
}

/// 初始化日志: stderr + 非阻塞文件输出
///
/// 返回的 guard 必须在 main 中持有, 否则文件日志会丢失
pub fn init_logging(log_config_file: impl AsRef<Path>, binary: &str) -> Result<WorkerGuard> {
    let log_config_file = log_config_file.as_ref();
    let (config, missing) = match LogConfig::load(log_config_file)? {
        Some(config) => (config, false),
        None => (LogConfig::default(), true),
    };

    fs::create_dir_all(&config.directory)?;
    let appender = tracing_appender::rolling::never(&config.directory, config.file_name_for(binary));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = if config.json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_ansi(false).with_writer(writer).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if missing {
        tracing::warn!(
            "⚠️  日志配置文件 {} 不存在, 使用默认配置",
            log_config_file.display()
        );
    }
    tracing::debug!("📝 日志目录: {}", config.directory.display());
    Ok(guard)
}
