//! 命令行参数
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// 默认日志配置文件
pub const DEFAULT_LOG_CONFIG: &str = "logger.conf";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "pySolo 果蝇活动追踪 (无界面)", long_about = None)]
pub struct TrackerArgs {
    /// INI 配置文件
    #[arg(short, long = "config", value_name = "CONFIG_FILE")]
    pub config_file: PathBuf,

    /// 日志配置文件
    #[arg(short, long = "log-config", value_name = "LOG_CONFIG_FILE", default_value = DEFAULT_LOG_CONFIG)]
    pub log_config_file: PathBuf,

    /// 开始时间 (秒), 负数表示从头开始
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub start_frame_time: i64,

    /// 结束时间 (秒), 负数表示到结尾
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub end_frame_time: i64,

    /// 高斯平滑核大小
    #[arg(long, default_value_t = 3)]
    pub smooth_filter_size: u32,

    /// 高斯平滑 sigma, 0 表示按核大小推算
    #[arg(long, default_value_t = 0.0)]
    pub smooth_filter_sigma: f32,

    /// 区域分析线程数
    #[arg(long, default_value_t = 1)]
    pub nthreads: usize,

    /// 区间并行分析的工作线程数
    #[arg(long, default_value_t = 1)]
    pub nprocesses: usize,

    /// 分析结束后合并区间结果文件
    #[arg(long)]
    pub merge_results: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "pySolo 背景估计", long_about = None)]
pub struct BackgroundArgs {
    /// INI 配置文件
    #[arg(short, long = "config", value_name = "CONFIG_FILE")]
    pub config_file: PathBuf,

    /// 日志配置文件
    #[arg(short, long = "log-config", value_name = "LOG_CONFIG_FILE", default_value = DEFAULT_LOG_CONFIG)]
    pub log_config_file: PathBuf,

    /// 背景图片输出路径
    #[arg(long, default_value = "background.jpg")]
    pub background_image_file: PathBuf,

    /// 开始时间 (秒), 负数表示从头开始
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub start_frame_time: i64,

    /// 结束时间 (秒), 负数表示到结尾
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub end_frame_time: i64,

    /// 高斯平滑核大小
    #[arg(long, default_value_t = 3)]
    pub smooth_filter_size: u32,

    /// 最多采样帧数
    #[arg(long, default_value_t = 50)]
    pub max_samples: usize,

    /// 在背景图上绘制所有追踪区域的ROI和光束
    #[arg(long)]
    pub overlay_masks: bool,
}

/// 掩码预设区域
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum Region {
    UpperLeft,
    LowerLeft,
    UpperRight,
    LowerRight,
}

impl Region {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpperLeft => "upper_left",
            Self::LowerLeft => "lower_left",
            Self::UpperRight => "upper_right",
            Self::LowerRight => "lower_right",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "pySolo 掩码生成", long_about = None)]
pub struct MaskMakerArgs {
    /// 输出掩码文件
    #[arg(short, long)]
    pub mask_file: PathBuf,

    /// 预设区域
    #[arg(short, long, value_enum)]
    pub region: Region,

    /// 每列的ROI行数
    #[arg(long, default_value_t = 1)]
    pub rows: u32,

    /// ROI列数
    #[arg(long, default_value_t = 14)]
    pub cols: u32,

    #[arg(long, allow_negative_numbers = true)]
    pub x1: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub x_span: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub x_gap: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub x_tilt: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub y1: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub y_len: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub y_sep: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub y_tilt: Option<f64>,
}
