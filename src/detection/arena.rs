//! 监控区域 (Monitored Area)
//!
//! 一个监控区域对应一个掩码文件: 一组ROI (每根果蝇管一个),
//! 以及该区域的追踪类型、光束方向、聚合间隔和ROI过滤器。

use super::types::{AggregationInterval, CrossingBeamType, PixelRect, Point, Roi, TrackType};
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// 掩码文件格式 (JSON)
#[derive(Debug, Serialize, Deserialize)]
struct MaskFile {
    rois: Vec<Roi>,
}

/// 监控区域
#[derive(Debug, Clone, Default)]
pub struct MonitoredArea {
    /// 区域名称 (结果文件前缀, 如 Monitor0)
    pub name: String,
    pub rois: Vec<Roi>,
    pub track_type: TrackType,
    pub crossing_beam: CrossingBeamType,
    pub aggregation: AggregationInterval,
    /// 需要追踪的ROI编号 (从1开始), 为空表示全部
    pub roi_filter: BTreeSet<usize>,
    /// 睡眠剥夺监控器标志
    pub sleep_deprivation: bool,
}

impl MonitoredArea {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_roi(&mut self, roi: Roi) {
        self.rois.push(roi);
    }

    pub fn roi_count(&self) -> usize {
        self.rois.len()
    }

    /// 从掩码文件加载ROI (替换现有ROI)
    pub fn load_rois(&mut self, mask_file: impl AsRef<Path>) -> Result<()> {
        let path = mask_file.as_ref();
        if !path.exists() {
            return Err(TrackerError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let mask: MaskFile = serde_json::from_str(&content)
            .map_err(|e| TrackerError::invalid_mask(path, e.to_string()))?;
        if mask.rois.is_empty() {
            return Err(TrackerError::invalid_mask(path, "mask contains no ROIs"));
        }
        self.rois = mask.rois;
        Ok(())
    }

    /// 保存ROI到掩码文件
    pub fn save_rois(&self, mask_file: impl AsRef<Path>) -> Result<()> {
        let mask = MaskFile {
            rois: self.rois.clone(),
        };
        fs::write(mask_file, serde_json::to_string_pretty(&mask)?)?;
        Ok(())
    }

    /// ROI是否参与追踪 (roi_index 从0开始)
    pub fn is_roi_trackable(&self, roi_index: usize) -> bool {
        roi_index < self.rois.len()
            && (self.roi_filter.is_empty() || self.roi_filter.contains(&(roi_index + 1)))
    }

    pub fn roi_to_poly(&self, roi: &Roi, scale: (f32, f32)) -> Vec<Point> {
        roi.to_poly(scale)
    }

    pub fn get_midline(&self, roi: &Roi, scale: (f32, f32), beam: CrossingBeamType) -> Option<(Point, Point)> {
        roi.midline(scale, beam)
    }
}

// ========== 几何工具 ==========

/// 射线法判断点是否在多边形内
pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    let mut inside = false;
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (poly[i], poly[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// 多边形的像素包围盒, 裁剪到图像范围内
pub fn bounding_rect(poly: &[Point], image_width: u32, image_height: u32) -> PixelRect {
    let empty = PixelRect { x: 0, y: 0, width: 0, height: 0 };
    if poly.is_empty() {
        return empty;
    }
    let min_x = poly.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0);
    let min_y = poly.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0);
    let max_x = poly.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil();
    let max_y = poly.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil();

    let x1 = (max_x as i64 + 1).clamp(0, image_width as i64) as u32;
    let y1 = (max_y as i64 + 1).clamp(0, image_height as i64) as u32;
    let x0 = (min_x as u32).min(x1);
    let y0 = (min_y as u32).min(y1);
    PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// 点在有向直线 (m1 -> m2) 的哪一侧: 1, -1, 在线上为 0
pub fn side_of_line(p: Point, m1: Point, m2: Point) -> i8 {
    let cross = (m2.x - m1.x) * (p.y - m1.y) - (m2.y - m1.y) * (p.x - m1.x);
    if cross > f32::EPSILON {
        1
    } else if cross < -f32::EPSILON {
        -1
    } else {
        0
    }
}

/// 点在线段 (start -> end) 上的投影长度
pub fn project_on_axis(p: Point, start: Point, end: Point) -> f32 {
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        return 0.0;
    }
    ((p.x - start.x) * dx + (p.y - start.y) * dy) / len
}
