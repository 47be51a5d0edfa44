/// 追踪流水线 (Tracking Pipeline)
/// 职责: 解码线程 → 有界通道 → 分析线程 (平滑 + 前景 + 各监控区域更新) → 结果文件
use crate::config::TrackerArgs;
use crate::detection::{AreaTracker, ForegroundDetector, ForegroundParams};
use crate::error::{Result, TrackerError};
use crate::input::{GrayFrame, ImageSource, MovieFile};
use crate::options::ConfigOptions;
use crate::results::{results_file_name, ResultsWriter};
use crate::utils::smooth;
use chrono::NaiveDateTime;
use crossbeam_channel::{bounded, Receiver};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 解码线程 → 分析线程的通道容量
pub const FRAME_CHANNEL_CAPACITY: usize = 16;

/// 进度日志间隔 (帧)
const PROGRESS_LOG_FRAMES: u64 = 1000;

/// 追踪参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingParams {
    /// 起始时间 (毫秒), 非正数表示视频开头
    pub start_msecs: f64,
    /// 结束时间 (毫秒), 非正数表示视频结尾
    pub end_msecs: f64,
    pub smooth_filter_size: u32,
    pub smooth_filter_sigma: f32,
    /// 区域并行分析线程数
    pub nthreads: usize,
    pub foreground: ForegroundParams,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            start_msecs: -1.0,
            end_msecs: -1.0,
            smooth_filter_size: 3,
            smooth_filter_sigma: 0.0,
            nthreads: 1,
            foreground: ForegroundParams::default(),
        }
    }
}

impl TrackingParams {
    pub fn from_args(args: &TrackerArgs) -> Self {
        Self {
            start_msecs: args.start_frame_time as f64 * 1000.0,
            end_msecs: args.end_frame_time as f64 * 1000.0,
            smooth_filter_size: args.smooth_filter_size,
            smooth_filter_sigma: args.smooth_filter_sigma,
            nthreads: args.nthreads.max(1),
            ..Default::default()
        }
    }
}

/// 一次追踪的统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub first_frame_time_msecs: Option<f64>,
    pub last_frame_time_msecs: Option<f64>,
    /// 每个监控区域写入的行数
    pub rows_written: Vec<(String, u64)>,
    pub elapsed: Duration,
}

/// 结果文件后缀: 缺失或负数的边界写作 0 / end
pub fn create_results_suffix(start: Option<i64>, end: Option<i64>) -> String {
    let start = match start {
        Some(s) if s >= 0 => s.to_string(),
        _ => "0".to_string(),
    };
    let end = match end {
        Some(e) if e >= 0 => e.to_string(),
        _ => "end".to_string(),
    };
    format!("{}-{}", start, end)
}

/// 第0帧的采集时刻: 配置的 acq_time, 否则视频文件时间, 否则 Unix 纪元
pub fn acquisition_start(config: &ConfigOptions, source: &dyn ImageSource) -> NaiveDateTime {
    config
        .acq_time
        .or_else(|| source.recorded_at())
        .unwrap_or_default()
}

/// 为每个需要分析的监控区域创建追踪器并打开结果文件
pub fn prepare_monitored_areas(
    source: &dyn ImageSource,
    config: &ConfigOptions,
    results_suffix: &str,
) -> Result<Vec<AreaTracker>> {
    let data_folder = config
        .data_folder
        .as_ref()
        .ok_or_else(|| TrackerError::InvalidConfig(vec!["Results folder (data_folder) is not set".to_string()]))?;
    let acq_start = acquisition_start(config, source);
    let frame_size = source.resolution();

    let mut areas = Vec::new();
    for monitor in config.tracked_areas() {
        let mut area = monitor.to_monitored_area();
        let mask_file = monitor
            .mask_file
            .as_ref()
            .ok_or_else(|| TrackerError::InvalidConfig(vec![format!("{}: mask file is not set", monitor.name)]))?;
        area.load_rois(mask_file)?;

        let results_path = data_folder.join(results_file_name(&monitor.name, results_suffix));
        let writer = ResultsWriter::create(&results_path)?;
        info!(
            "🎯 {}: {} 个ROI, {:?}, 间隔 {} {} → {}",
            monitor.name,
            area.roi_count(),
            area.track_type,
            area.aggregation.value,
            area.aggregation.units.name(),
            results_path.display()
        );
        areas.push(AreaTracker::new(area, frame_size, Box::new(writer), acq_start));
    }
    if areas.is_empty() {
        warn!("⚠️ 没有需要分析的监控区域");
    }
    Ok(areas)
}

/// 逐帧分析: 解码线程产生帧, 当前线程分析
pub fn process_image_frames(
    source: &dyn ImageSource,
    areas: &mut [AreaTracker],
    params: &TrackingParams,
) -> Result<RunSummary> {
    let started = Instant::now();
    let frames = source.frames()?;

    let (tx, rx) = bounded::<Result<GrayFrame>>(FRAME_CHANNEL_CAPACITY);
    let decoder = thread::Builder::new()
        .name("decoder".to_string())
        .spawn(move || {
            for frame in frames {
                let failed = frame.is_err();
                // 分析线程退出后停止解码
                if tx.send(frame).is_err() || failed {
                    break;
                }
            }
        })?;

    let pool = if params.nthreads > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(params.nthreads)
                .thread_name(|i| format!("area-{}", i))
                .build()?,
        )
    } else {
        None
    };

    let mut summary = RunSummary::default();
    let outcome = analyse_frames(rx, areas, params, pool.as_ref(), &mut summary);
    if decoder.join().is_err() {
        error!("❌ 解码线程异常退出");
    }
    outcome?;

    for area in areas.iter_mut() {
        area.finish()?;
        summary
            .rows_written
            .push((area.name().to_string(), area.rows_written()));
    }
    summary.elapsed = started.elapsed();
    info!(
        "✅ 分析完成: {} 帧, 用时 {:.1}s",
        summary.frames,
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

fn analyse_frames(
    rx: Receiver<Result<GrayFrame>>,
    areas: &mut [AreaTracker],
    params: &TrackingParams,
    pool: Option<&ThreadPool>,
    summary: &mut RunSummary,
) -> Result<()> {
    let mut detector = ForegroundDetector::new(params.foreground);

    for frame in rx {
        let frame = frame?;
        let smoothed = smooth(&frame.image, params.smooth_filter_size, params.smooth_filter_sigma);
        let foreground = detector.apply(&smoothed);
        let time = frame.time_msecs;

        match pool {
            Some(pool) => pool.install(|| {
                areas
                    .par_iter_mut()
                    .try_for_each(|area| area.process_frame(time, &foreground))
            })?,
            None => {
                for area in areas.iter_mut() {
                    area.process_frame(time, &foreground)?;
                }
            }
        }

        summary.frames += 1;
        summary.first_frame_time_msecs.get_or_insert(time);
        summary.last_frame_time_msecs = Some(time);
        if summary.frames % PROGRESS_LOG_FRAMES == 0 {
            debug!("📊 已分析 {} 帧 (帧 {}, {:.1}s)", summary.frames, frame.index, time / 1000.0);
        }
    }
    Ok(())
}

/// 打开视频并追踪一个时间区间
pub fn run_tracker(config: &ConfigOptions, params: &TrackingParams, results_suffix: &str) -> Result<RunSummary> {
    let source_path = config
        .source
        .as_ref()
        .ok_or_else(|| TrackerError::InvalidConfig(vec!["Video source is not set".to_string()]))?;
    info!(
        "▶️ 追踪区间 {}",
        if results_suffix.is_empty() {
            create_results_suffix(
                Some((params.start_msecs / 1000.0) as i64),
                Some((params.end_msecs / 1000.0) as i64),
            )
        } else {
            results_suffix.to_string()
        }
    );

    let source = MovieFile::open(source_path, params.start_msecs, params.end_msecs, config.image_size())?;
    if !source.is_opened() {
        return Err(TrackerError::InvalidVideo(format!(
            "No frames to read from {} in the requested range",
            source_path.display()
        )));
    }
    let mut areas = prepare_monitored_areas(&source, config, results_suffix)?;
    process_image_frames(&source, &mut areas, params)
}
