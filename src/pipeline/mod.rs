/// 视频处理流水线 (Video Processing Pipeline)
///
/// 两线程架构, 通过 crossbeam 有界通道通信:
/// - Decoder:  视频解码 (独立线程)
/// - Analyser: 平滑 + 前景分割 + 各监控区域更新 (调用线程, 可选 rayon 线程池)
///
/// 区间并行模式下, 每个工作线程运行一条独立的流水线。
pub mod background;
pub mod intervals;
pub mod runner;

pub use background::{estimate_background, BackgroundParams};
pub use intervals::{analysis_range, run_intervals, split_intervals, Interval};
pub use runner::{
    create_results_suffix, prepare_monitored_areas, process_image_frames, run_tracker, RunSummary,
    TrackingParams,
};
