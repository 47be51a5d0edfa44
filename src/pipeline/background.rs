/// 背景估计: 均匀采样平滑后的帧, 逐像素取中位数
use crate::error::{Result, TrackerError};
use crate::input::ImageSource;
use crate::utils::smooth;
use image::{GrayImage, Luma};
use ndarray::{s, Array3};
use tracing::{debug, info};

/// 背景估计参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundParams {
    pub smooth_filter_size: u32,
    pub smooth_filter_sigma: f32,
    /// 最多采样帧数
    pub max_samples: usize,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            smooth_filter_size: 3,
            smooth_filter_sigma: 0.0,
            max_samples: 50,
        }
    }
}

/// 采样间隔 (帧): 让样本均匀分布在整个区间
pub fn sample_stride(expected_frames: u64, max_samples: usize) -> u64 {
    let max_samples = max_samples.max(1) as u64;
    expected_frames.div_ceil(max_samples).max(1)
}

/// 估计静态背景
pub fn estimate_background(source: &dyn ImageSource, params: &BackgroundParams) -> Result<GrayImage> {
    let duration = (source.end_time_in_seconds() - source.start_time_in_seconds()).max(0.0);
    let expected_frames = (duration * source.fps()).round() as u64;
    let stride = sample_stride(expected_frames, params.max_samples);
    debug!("🖼️ 预计 {} 帧, 每 {} 帧采样一次", expected_frames, stride);

    let mut samples = Vec::new();
    for (i, frame) in source.frames()?.enumerate() {
        let frame = frame?;
        if i as u64 % stride != 0 {
            continue;
        }
        samples.push(smooth(&frame.image, params.smooth_filter_size, params.smooth_filter_sigma));
        if samples.len() >= params.max_samples.max(1) {
            break;
        }
    }
    let Some(first) = samples.first() else {
        return Err(TrackerError::InvalidVideo("No frames available for background estimation".to_string()));
    };
    let (width, height) = first.dimensions();
    info!("🖼️ 使用 {} 帧估计背景", samples.len());

    let stack = Array3::from_shape_fn((samples.len(), height as usize, width as usize), |(i, y, x)| {
        samples[i].get_pixel(x as u32, y as u32)[0]
    });
    Ok(median_image(&stack))
}

/// 沿第0轴的逐像素中位数 (偶数个样本取中间两个的平均)
fn median_image(stack: &Array3<u8>) -> GrayImage {
    let (n, height, width) = stack.dim();
    let mut values = Vec::with_capacity(n);
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        values.clear();
        values.extend(stack.slice(s![.., y as usize, x as usize]).iter().copied());
        values.sort_unstable();
        let median = if n % 2 == 1 {
            values[n / 2] as u16
        } else {
            (values[n / 2 - 1] as u16 + values[n / 2] as u16 + 1) / 2
        };
        Luma([median as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::FrameSequence;

    #[test]
    fn test_sample_stride() {
        assert_eq!(sample_stride(1000, 50), 20);
        assert_eq!(sample_stride(1001, 50), 21);
        assert_eq!(sample_stride(10, 50), 1);
        assert_eq!(sample_stride(0, 50), 1);
    }

    #[test]
    fn test_median_removes_moving_fly() {
        // 背景 100, 果蝇在每帧的不同位置
        let frames: Vec<GrayImage> = (0..5)
            .map(|i| {
                let mut image = GrayImage::from_pixel(20, 10, Luma([100]));
                image.put_pixel(2 + i * 3, 5, Luma([0]));
                image
            })
            .collect();
        let source = FrameSequence::new(frames, 25.0).unwrap();
        let params = BackgroundParams {
            smooth_filter_size: 1,
            ..Default::default()
        };
        let background = estimate_background(&source, &params).unwrap();
        assert!(background.pixels().all(|p| p[0] == 100));
    }

    #[test]
    fn test_median_of_even_samples() {
        let frames = vec![
            GrayImage::from_pixel(2, 2, Luma([10])),
            GrayImage::from_pixel(2, 2, Luma([20])),
        ];
        let source = FrameSequence::new(frames, 25.0).unwrap();
        let params = BackgroundParams {
            smooth_filter_size: 1,
            ..Default::default()
        };
        let background = estimate_background(&source, &params).unwrap();
        assert_eq!(background.get_pixel(0, 0)[0], 15);
    }

    #[test]
    fn test_max_samples_limits_frames() {
        let frames: Vec<GrayImage> = (0..10u8)
            .map(|i| GrayImage::from_pixel(1, 1, Luma([i * 10])))
            .collect();
        let source = FrameSequence::new(frames, 25.0).unwrap();
        let params = BackgroundParams {
            smooth_filter_size: 1,
            max_samples: 3,
            ..Default::default()
        };
        // 步长 4: 采样帧 0, 4, 8 → 0, 40, 80
        let background = estimate_background(&source, &params).unwrap();
        assert_eq!(background.get_pixel(0, 0)[0], 40);
    }
}
