/// pySolo 掩码生成
///
/// 按预设区域的网格参数生成一排果蝇管的ROI, 参数可逐项覆盖
use anyhow::{Context, Result};
use clap::Parser;
use pysolo_tracker::utils::maskmaker::{create_mask, get_mask_params};
use pysolo_tracker::MaskMakerArgs;

fn main() -> Result<()> {
    let args = MaskMakerArgs::parse();

    let mut params = get_mask_params(args.region.name())?;
    let overrides = [
        (&mut params.x1, args.x1),
        (&mut params.x_span, args.x_span),
        (&mut params.x_gap, args.x_gap),
        (&mut params.x_tilt, args.x_tilt),
        (&mut params.y1, args.y1),
        (&mut params.y_len, args.y_len),
        (&mut params.y_sep, args.y_sep),
        (&mut params.y_tilt, args.y_tilt),
    ];
    for (field, value) in overrides {
        if let Some(v) = value {
            *field = v;
        }
    }

    let area = create_mask(args.rows, args.cols, &params);
    area.save_rois(&args.mask_file)
        .with_context(|| format!("无法写入掩码文件 {}", args.mask_file.display()))?;

    println!(
        "✅ {}: {} 个ROI ({} 行 x {} 列) → {}",
        args.region.name(),
        area.roi_count(),
        args.rows,
        args.cols,
        args.mask_file.display()
    );
    Ok(())
}
