/// pySolo 背景估计
///
/// 从视频中均匀采样帧, 逐像素取中位数得到静态背景;
/// --overlay-masks 时在背景上绘制所有追踪区域的ROI和光束。
use anyhow::{Context, Result};
use clap::Parser;
use pysolo_tracker::input::{ImageSource, MovieFile};
use pysolo_tracker::logging::init_logging;
use pysolo_tracker::pipeline::{estimate_background, BackgroundParams};
use pysolo_tracker::utils::overlay_areas;
use pysolo_tracker::{BackgroundArgs, ConfigOptions, TrackerError};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    let args = BackgroundArgs::parse();
    let _guard = init_logging(&args.log_config_file, "pysolo-background")
        .with_context(|| format!("初始化日志失败: {}", args.log_config_file.display()))?;

    let config = ConfigOptions::load(&args.config_file)
        .with_context(|| format!("无法加载配置文件 {}", args.config_file.display()))?;

    let mut errors = config.load_errors.clone();
    errors.extend(config.validate_source());
    if !errors.is_empty() {
        for e in &errors {
            error!("❌ {}", e);
        }
        return Err(TrackerError::InvalidConfig(errors).into());
    }
    let source_path = config.source.as_ref().context("未设置视频源")?;

    let source = MovieFile::open(
        source_path,
        args.start_frame_time as f64 * 1000.0,
        args.end_frame_time as f64 * 1000.0,
        config.image_size(),
    )
    .with_context(|| format!("无法打开视频 {}", source_path.display()))?;
    if !source.is_opened() {
        anyhow::bail!("视频 {} 在指定区间内没有帧", source_path.display());
    }

    let params = BackgroundParams {
        smooth_filter_size: args.smooth_filter_size,
        max_samples: args.max_samples,
        ..Default::default()
    };
    let background = estimate_background(&source, &params)?;

    if args.overlay_masks {
        let mut areas = Vec::new();
        for monitor in config.tracked_areas() {
            let mut area = monitor.to_monitored_area();
            match &monitor.mask_file {
                Some(mask) => match area.load_rois(mask) {
                    Ok(()) => areas.push(area),
                    Err(e) => warn!("⚠️ {}: 无法加载掩码 {}: {}", monitor.name, mask.display(), e),
                },
                None => warn!("⚠️ {}: 未设置掩码文件", monitor.name),
            }
        }
        // ROI 坐标即解码分辨率坐标
        let overlay = overlay_areas(&background, &areas, (1.0, 1.0));
        overlay.save(&args.background_image_file)?;
    } else {
        background.save(&args.background_image_file)?;
    }

    let (w, h) = source.resolution();
    info!(
        "✅ 背景图 ({}x{}) 已保存到 {}",
        w,
        h,
        args.background_image_file.display()
    );
    Ok(())
}
