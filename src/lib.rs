#![allow(clippy::type_complexity)]
pub mod config; // 命令行参数
pub mod detection; // 前景检测与活动追踪
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod logging; // 日志初始化
pub mod options; // INI 配置文件
pub mod pipeline; // 追踪流水线
pub mod results; // DAM 格式结果输出
pub mod utils; // 图像操作与掩码生成

#[cfg(all(test, unix))]
mod testing; // 假 ffmpeg / ffprobe

pub use crate::config::{BackgroundArgs, MaskMakerArgs, Region, TrackerArgs};
pub use crate::error::{Result, TrackerError};
pub use crate::options::{ConfigOptions, MonitorOptions};

