//! 错误类型
//! Error types for the tracker

use std::path::PathBuf;
use thiserror::Error;

/// 追踪器结果类型
pub type Result<T> = std::result::Result<T, TrackerError>;

/// 追踪过程中可能出现的错误
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Config load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("INI parse error: {0}")]
    IniParse(#[from] ini::ParseError),

    #[error("Config errors: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Invalid mask file {path}: {message}")]
    InvalidMask { path: PathBuf, message: String },

    #[error("Unknown mask region: {0}")]
    UnknownRegion(String),

    #[error("Tracking interval {suffix} failed: {message}")]
    IntervalFailed { suffix: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl TrackerError {
    /// 创建FFmpeg失败错误
    pub fn ffmpeg_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            exit_code,
        }
    }

    /// 创建掩码文件错误
    pub fn invalid_mask(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidMask {
            path: path.into(),
            message: message.into(),
        }
    }
}
