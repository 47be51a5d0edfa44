/// 掩码生成: 按网格参数生成一排果蝇管的ROI
use crate::detection::{MonitoredArea, Roi};
use crate::error::{Result, TrackerError};
use phf::phf_map;

/// 网格参数 (像素)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    /// 第一列左边 x
    pub x1: f64,
    /// 管宽
    pub x_span: f64,
    /// 列间距
    pub x_gap: f64,
    /// 每行的 x 偏移
    pub x_tilt: f64,
    /// 第一行上边 y
    pub y1: f64,
    /// 管长
    pub y_len: f64,
    /// 行间距
    pub y_sep: f64,
    /// 每列的 y 偏移
    pub y_tilt: f64,
}

/// 预设区域
static REGION_PARAMS: phf::Map<&'static str, MaskParams> = phf_map! {
    "upper_left" => MaskParams {
        x1: 191.5, x_span: 8.0, x_gap: 3.75, x_tilt: 0.0,
        y1: 205.0, y_len: 50.0, y_sep: 2.0, y_tilt: 0.0,
    },
    "lower_left" => MaskParams {
        x1: 194.0, x_span: 8.0, x_gap: 3.75, x_tilt: 0.0,
        y1: 298.0, y_len: 50.0, y_sep: 2.0, y_tilt: 0.0,
    },
    "upper_right" => MaskParams {
        x1: 376.0, x_span: 7.75, x_gap: 4.2, x_tilt: 0.0,
        y1: 206.0, y_len: 50.0, y_sep: 2.0, y_tilt: 0.0,
    },
    "lower_right" => MaskParams {
        x1: 379.0, x_span: 7.7, x_gap: 4.1, x_tilt: 0.0,
        y1: 300.0, y_len: 50.0, y_sep: 2.0, y_tilt: 0.0,
    },
};

/// 默认行数
pub const DEFAULT_ROWS: u32 = 1;
/// 默认列数
pub const DEFAULT_COLS: u32 = 14;

/// 预设区域的网格参数
pub fn get_mask_params(region: &str) -> Result<MaskParams> {
    REGION_PARAMS
        .get(region)
        .copied()
        .ok_or_else(|| TrackerError::UnknownRegion(region.to_string()))
}

/// 所有预设区域名称
pub fn region_names() -> impl Iterator<Item = &'static str> {
    REGION_PARAMS.keys().copied()
}

/// 按网格生成ROI: 逐列从左到右, 每列内逐行从上到下
///
/// 坐标截断为整数
pub fn create_mask(rows: u32, cols: u32, params: &MaskParams) -> MonitoredArea {
    let mut area = MonitoredArea::new("mask");
    for col in 0..cols {
        let col = col as f64;
        let mut ay = params.y1 + col * params.y_tilt;
        let mut by = ay + params.y_len;
        let mut ax = if col == 0.0 {
            params.x1
        } else {
            params.x1 + col * (params.x_span + params.x_gap)
        };
        let mut cx = ax + params.x_span;

        for _ in 0..rows {
            let (bx, cy, dx, dy) = (ax, by, cx, ay);
            area.add_roi(Roi::new([
                (ax as i32, ay as i32),
                (bx as i32, by as i32),
                (cx as i32, cy as i32),
                (dx as i32, dy as i32),
            ]));
            ay = by + params.y_sep;
            by = ay + params.y_len;
            ax += params.x_tilt;
            cx = ax + params.x_span;
        }
    }
    area
}
