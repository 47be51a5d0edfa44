/// 追踪系统 (Tracking System)
///
/// 分析线程中运行, 负责每一帧的活动分析
/// - Detector: 背景建模 + 前景分割 + 果蝇定位
/// - Arena:    监控区域与ROI几何
/// - Tracker:  每个ROI的活动统计与聚合输出
pub mod arena;
pub mod detector;
pub mod tracker;
pub mod types;

pub use arena::MonitoredArea;
pub use detector::{locate_fly, ForegroundDetector, ForegroundParams, RoiMask};
pub use tracker::{AreaTracker, RoiTracker};
pub use types::*;
