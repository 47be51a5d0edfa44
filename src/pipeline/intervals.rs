/// 区间并行分析 (Interval-parallel analysis)
///
/// 视频时长被切分为互不重叠的区间, 由固定数量的工作线程从通道中领取;
/// 每个工作线程独立解码 (自己的 ffmpeg 进程) 并写入带区间后缀的结果文件。
/// 非首个区间的第一帧背景模型为空, 该帧结果不准确。
use super::runner::{create_results_suffix, run_tracker, RunSummary, TrackingParams};
use crate::error::{Result, TrackerError};
use crate::input::{ImageSource, MovieFile};
use crate::options::ConfigOptions;
use crossbeam_channel::unbounded;
use std::thread;
use tracing::{error, info};

/// 分析区间 [start, end) (秒)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start_secs: i64,
    pub end_secs: i64,
}

impl Interval {
    /// 结果文件后缀
    pub fn suffix(&self) -> String {
        create_results_suffix(Some(self.start_secs), Some(self.end_secs))
    }
}

/// 把 [start, end) 切分为约 n 个等长区间
///
/// 步长为 max(1, (end-start)/n), 余数形成额外的尾部区间
pub fn split_intervals(start_secs: i64, end_secs: i64, n: usize) -> Vec<Interval> {
    if end_secs <= start_secs {
        return Vec::new();
    }
    let step = ((end_secs - start_secs) / n.max(1) as i64).max(1);
    (start_secs..end_secs)
        .step_by(step as usize)
        .map(|s| Interval {
            start_secs: s,
            end_secs: s + step,
        })
        .collect()
}

/// 分析范围 (整秒): 起点向下取整, 终点向上取整, 覆盖视频的小数尾部
pub fn analysis_range(source: &dyn ImageSource) -> (i64, i64) {
    (
        source.start_time_in_seconds().floor() as i64,
        source.end_time_in_seconds().ceil() as i64,
    )
}

/// 在 `workers` 个线程上执行所有区间
///
/// 单个区间失败只记录日志, 其余区间继续; 全部结束后若有失败则返回第一个错误
pub fn run_interval_jobs<F>(intervals: &[Interval], workers: usize, job: F) -> Result<Vec<(Interval, RunSummary)>>
where
    F: Fn(&Interval) -> Result<RunSummary> + Sync,
{
    let (job_tx, job_rx) = unbounded::<Interval>();
    for interval in intervals {
        // 接收端仍存活, 发送不会失败
        let _ = job_tx.send(*interval);
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded();
    let job = &job;
    thread::scope(|scope| {
        for worker in 0..workers.max(1).min(intervals.len().max(1)) {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for interval in job_rx {
                    info!("🧵 worker-{} 开始区间 {}", worker, interval.suffix());
                    let _ = result_tx.send((interval, job(&interval)));
                }
            });
        }
    });
    drop(result_tx);

    let mut summaries = Vec::new();
    let mut first_failure = None;
    for (interval, result) in result_rx {
        match result {
            Ok(summary) => summaries.push((interval, summary)),
            Err(e) => {
                error!("❌ 区间 {} 失败: {}", interval.suffix(), e);
                first_failure.get_or_insert(TrackerError::IntervalFailed {
                    suffix: interval.suffix(),
                    message: e.to_string(),
                });
            }
        }
    }
    summaries.sort_by_key(|(interval, _)| interval.start_secs);

    match first_failure {
        Some(e) => Err(e),
        None => Ok(summaries),
    }
}

/// 区间并行追踪整个分析范围
pub fn run_intervals(
    config: &ConfigOptions,
    params: &TrackingParams,
    workers: usize,
) -> Result<Vec<(Interval, RunSummary)>> {
    let source_path = config
        .source
        .as_ref()
        .ok_or_else(|| TrackerError::InvalidConfig(vec!["Video source is not set".to_string()]))?;
    let source = MovieFile::open(source_path, params.start_msecs, params.end_msecs, config.image_size())?;
    if !source.is_opened() {
        return Err(TrackerError::InvalidVideo(format!(
            "No frames to read from {} in the requested range",
            source_path.display()
        )));
    }

    let (start, end) = analysis_range(&source);
    let intervals = split_intervals(start, end, workers);
    info!(
        "🧩 {}s - {}s 切分为 {} 个区间, {} 个工作线程",
        start,
        end,
        intervals.len(),
        workers
    );

    run_interval_jobs(&intervals, workers, |interval| {
        let interval_params = TrackingParams {
            start_msecs: interval.start_secs as f64 * 1000.0,
            end_msecs: interval.end_secs as f64 * 1000.0,
            ..*params
        };
        run_tracker(config, &interval_params, &interval.suffix())
    })
}
