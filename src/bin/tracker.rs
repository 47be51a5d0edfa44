/// pySolo 无界面追踪 (Headless Tracker)
///
/// 系统架构:
/// 1. 解码线程: ffmpeg 管道解码为灰度帧
/// 2. 分析线程: 平滑 + 前景分割 + 各监控区域活动统计
/// 3. 区间并行 (--nprocesses > 1): 每个工作线程独立运行以上流水线
use anyhow::{Context, Result};
use clap::Parser;
use pysolo_tracker::logging::init_logging;
use pysolo_tracker::pipeline::{run_intervals, run_tracker, TrackingParams};
use pysolo_tracker::results::merge_interval_results;
use pysolo_tracker::{ConfigOptions, TrackerArgs, TrackerError};
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let args = TrackerArgs::parse();
    let _guard = init_logging(&args.log_config_file, "pysolo-tracker")
        .with_context(|| format!("初始化日志失败: {}", args.log_config_file.display()))?;

    info!("🚀 pySolo 追踪启动");
    info!("📄 配置文件: {}", args.config_file.display());

    let config = ConfigOptions::load(&args.config_file)
        .with_context(|| format!("无法加载配置文件 {}", args.config_file.display()))?;

    let mut errors = config.load_errors.clone();
    for e in config.validate() {
        if !errors.contains(&e) {
            errors.push(e);
        }
    }
    if !errors.is_empty() {
        for e in &errors {
            error!("❌ {}", e);
        }
        return Err(TrackerError::InvalidConfig(errors).into());
    }

    let params = TrackingParams::from_args(&args);
    if args.nprocesses > 1 {
        let summaries = run_intervals(&config, &params, args.nprocesses)?;
        let frames: u64 = summaries.iter().map(|(_, s)| s.frames).sum();
        info!("✅ {} 个区间完成, 共 {} 帧", summaries.len(), frames);

        if args.merge_results {
            let suffixes: Vec<String> = summaries.iter().map(|(interval, _)| interval.suffix()).collect();
            if let Some(data_folder) = &config.data_folder {
                for monitor in config.tracked_areas() {
                    if let Some(merged) = merge_interval_results(data_folder, &monitor.name, &suffixes)? {
                        info!("🧩 {} → {}", monitor.name, merged.display());
                    }
                }
            }
        }
    } else {
        if args.merge_results {
            warn!("⚠️ --merge-results 仅在 --nprocesses > 1 时有效");
        }
        let summary = run_tracker(&config, &params, "")?;
        for (name, rows) in &summary.rows_written {
            info!("📝 {}: {} 行", name, rows);
        }
    }

    info!("👋 追踪结束");
    Ok(())
}
