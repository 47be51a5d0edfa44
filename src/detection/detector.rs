/// 前景检测器 (Foreground Detector)
/// 职责: 平滑后的灰度帧 → 滑动平均背景 → 差分二值化 → 每个ROI内最大连通域的质心
use super::arena::{bounding_rect, point_in_polygon};
use super::types::{FlyDetection, PixelRect, Point, Roi, BACKGROUND_ALPHA, FOREGROUND_THRESHOLD};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::Array2;

/// 前景分割参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForegroundParams {
    /// 背景更新权重 (0-1, 越大背景更新越快)
    pub alpha: f32,
    /// 二值化阈值
    pub threshold: u8,
    /// 膨胀半径 (像素)
    pub dilate_radius: u8,
    /// 腐蚀半径 (像素)
    pub erode_radius: u8,
}

impl Default for ForegroundParams {
    fn default() -> Self {
        Self {
            alpha: BACKGROUND_ALPHA,
            threshold: FOREGROUND_THRESHOLD,
            dilate_radius: 2,
            erode_radius: 1,
        }
    }
}

/// 滑动平均背景模型
pub struct ForegroundDetector {
    params: ForegroundParams,
    background: Option<Array2<f32>>,
    frames_seen: u64,
}

impl ForegroundDetector {
    pub fn new(params: ForegroundParams) -> Self {
        Self {
            params,
            background: None,
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// 当前背景 (8位)
    pub fn background_image(&self) -> Option<GrayImage> {
        let bg = self.background.as_ref()?;
        let (h, w) = bg.dim();
        Some(GrayImage::from_fn(w as u32, h as u32, |x, y| {
            Luma([bg[[y as usize, x as usize]].round().clamp(0.0, 255.0) as u8])
        }))
    }

    /// 更新背景并返回前景二值图
    ///
    /// 第一帧初始化背景, 因此第一帧的前景为空
    pub fn apply(&mut self, frame: &GrayImage) -> GrayImage {
        let (w, h) = frame.dimensions();
        let current = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
            frame.get_pixel(x as u32, y as u32)[0] as f32
        });

        // 分辨率变化时重置背景
        if self
            .background
            .as_ref()
            .map_or(false, |bg| bg.dim() != current.dim())
        {
            self.background = None;
        }
        let alpha = self.params.alpha;
        let background = self.background.get_or_insert_with(|| current.clone());
        background.zip_mut_with(&current, |b, &c| *b = (1.0 - alpha) * *b + alpha * c);
        self.frames_seen += 1;

        let threshold = self.params.threshold as f32;
        let background = &*background;
        let mask = GrayImage::from_fn(w, h, |x, y| {
            let (r, c) = (y as usize, x as usize);
            let diff = (current[[r, c]] - background[[r, c]]).abs().round();
            if diff > threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let mask = if self.params.dilate_radius > 0 {
            dilate(&mask, Norm::LInf, self.params.dilate_radius)
        } else {
            mask
        };
        if self.params.erode_radius > 0 {
            erode(&mask, Norm::LInf, self.params.erode_radius)
        } else {
            mask
        }
    }
}

/// ROI的像素掩码 (预先计算, 每帧复用)
#[derive(Debug, Clone)]
pub struct RoiMask {
    pub rect: PixelRect,
    inside: Vec<bool>,
}

impl RoiMask {
    pub fn new(roi: &Roi, scale: (f32, f32), image_width: u32, image_height: u32) -> Self {
        let poly = roi.to_poly(scale);
        let rect = bounding_rect(&poly, image_width, image_height);
        let mut inside = Vec::with_capacity((rect.width * rect.height) as usize);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                inside.push(point_in_polygon(Point::new(x as f32, y as f32), &poly));
            }
        }
        Self { rect, inside }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        if x < self.rect.x
            || y < self.rect.y
            || x >= self.rect.x + self.rect.width
            || y >= self.rect.y + self.rect.height
        {
            return false;
        }
        let idx = ((y - self.rect.y) * self.rect.width + (x - self.rect.x)) as usize;
        self.inside[idx]
    }

    pub fn pixel_count(&self) -> usize {
        self.inside.iter().filter(|v| **v).count()
    }
}

/// 在前景图中定位ROI内的果蝇: 最大8连通域的质心
pub fn locate_fly(foreground: &GrayImage, mask: &RoiMask) -> Option<FlyDetection> {
    let rect = mask.rect;
    if rect.is_empty() {
        return None;
    }
    let (fw, fh) = foreground.dimensions();
    if rect.x + rect.width > fw || rect.y + rect.height > fh {
        return None;
    }

    let crop = GrayImage::from_fn(rect.width, rect.height, |x, y| {
        let (ix, iy) = (x + rect.x, y + rect.y);
        if foreground.get_pixel(ix, iy)[0] > 0 && mask.contains(ix, iy) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let labels = connected_components(&crop, Connectivity::Eight, Luma([0u8]));

    // (面积, x累加, y累加)
    let mut blobs: Vec<(u32, f64, f64)> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if blobs.len() < label {
            blobs.resize(label, (0, 0.0, 0.0));
        }
        let blob = &mut blobs[label - 1];
        blob.0 += 1;
        blob.1 += x as f64;
        blob.2 += y as f64;
    }

    // 面积相同取编号最小者
    let mut best: Option<&(u32, f64, f64)> = None;
    for blob in blobs.iter().filter(|b| b.0 > 0) {
        if best.map_or(true, |b| blob.0 > b.0) {
            best = Some(blob);
        }
    }

    best.map(|&(area, sx, sy)| FlyDetection {
        position: Point::new(
            (sx / area as f64) as f32 + rect.x as f32,
            (sy / area as f64) as f32 + rect.y as f32,
        ),
        area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tube() -> Roi {
        Roi::new([(10, 10), (10, 60), (20, 60), (20, 10)])
    }

    fn fill(image: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, value: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn test_first_frame_has_no_foreground() {
        let mut detector = ForegroundDetector::new(ForegroundParams::default());
        let mut frame = GrayImage::new(40, 80);
        fill(&mut frame, 12, 20, 3, 3, 200);
        let fg = detector.apply(&frame);
        assert!(fg.pixels().all(|p| p[0] == 0));
        assert_eq!(detector.frames_seen(), 1);
    }

    #[test]
    fn test_moving_object_detected() {
        let params = ForegroundParams {
            dilate_radius: 0,
            erode_radius: 0,
            ..Default::default()
        };
        let mut detector = ForegroundDetector::new(params);
        let empty = GrayImage::new(40, 80);
        detector.apply(&empty);

        let mut frame = GrayImage::new(40, 80);
        fill(&mut frame, 12, 30, 3, 3, 200);
        let fg = detector.apply(&frame);
        // 200 * (1 - 0.2) = 160 > 20
        assert_eq!(fg.get_pixel(13, 31)[0], 255);
        assert_eq!(fg.get_pixel(30, 70)[0], 0);
    }

    #[test]
    fn test_background_image_tracks_frames() {
        let mut detector = ForegroundDetector::new(ForegroundParams::default());
        let frame = GrayImage::from_pixel(4, 4, Luma([100]));
        detector.apply(&frame);
        let bg = detector.background_image().unwrap();
        assert_eq!(bg.get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn test_roi_mask_contains() {
        let mask = RoiMask::new(&tube(), (1.0, 1.0), 40, 80);
        assert!(mask.contains(10, 10));
        assert!(mask.contains(19, 59));
        assert!(!mask.contains(20, 30));
        assert!(!mask.contains(15, 60));
        assert_eq!(mask.pixel_count(), 10 * 50);
    }

    #[test]
    fn test_locate_largest_blob() {
        let mask = RoiMask::new(&tube(), (1.0, 1.0), 40, 80);
        let mut fg = GrayImage::new(40, 80);
        fill(&mut fg, 11, 12, 2, 2, 255); // 小块
        fill(&mut fg, 14, 40, 3, 3, 255); // 大块 (果蝇)
        fill(&mut fg, 25, 40, 5, 5, 255); // ROI 外

        let fly = locate_fly(&fg, &mask).unwrap();
        assert_eq!(fly.area, 9);
        assert_eq!(fly.position, Point::new(15.0, 41.0));
    }

    #[test]
    fn test_locate_nothing() {
        let mask = RoiMask::new(&tube(), (1.0, 1.0), 40, 80);
        let fg = GrayImage::new(40, 80);
        assert!(locate_fly(&fg, &mask).is_none());
    }
}
