/// 图像操作: 高斯平滑与ROI叠加绘制
use crate::detection::{CrossingBeamType, MonitoredArea};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_polygon_mut, draw_line_segment_mut};
use imageproc::filter::separable_filter_equal;
use imageproc::point::Point as DrawPoint;

/// ROI 边框颜色
pub const ROI_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// 光束颜色
pub const BEAM_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// sigma 为 0 时按核大小推算
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// 归一化的一维高斯核 (偶数大小向上取奇数)
pub fn gaussian_kernel(kernel_size: u32, sigma: f32) -> Vec<f32> {
    let size = kernel_size | 1;
    let sigma = if sigma > 0.0 { sigma } else { sigma_for_kernel(size) };
    let center = (size as f32 - 1.0) / 2.0;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// 高斯平滑; 核大小不超过1时原样返回
pub fn smooth(image: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    if kernel_size <= 1 {
        return image.clone();
    }
    let kernel = gaussian_kernel(kernel_size, sigma);
    separable_filter_equal(image, &kernel)
}

/// 在灰度图上绘制监控区域的ROI与光束
pub fn overlay_areas(image: &GrayImage, areas: &[MonitoredArea], scale: (f32, f32)) -> RgbImage {
    let mut canvas = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    for area in areas {
        let beam = Some(area.crossing_beam)
            .filter(|b| CrossingBeamType::is_crossing_beam_needed(area.track_type, *b));
        for roi in &area.rois {
            let poly: Vec<DrawPoint<f32>> = area
                .roi_to_poly(roi, scale)
                .into_iter()
                .map(|p| DrawPoint::new(p.x, p.y))
                .collect();
            // 首尾相同的多边形会触发断言
            if poly.first() != poly.last() {
                draw_hollow_polygon_mut(&mut canvas, &poly, ROI_COLOR);
            }
            if let Some((m1, m2)) = beam.and_then(|b| area.get_midline(roi, scale, b)) {
                draw_line_segment_mut(&mut canvas, (m1.x, m1.y), (m2.x, m2.y), BEAM_COLOR);
            }
        }
    }
    canvas
}
