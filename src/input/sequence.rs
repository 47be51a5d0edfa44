/// 内存帧序列输入源
use super::decoder::GrayFrame;
use super::movie::{FrameStream, ImageSource};
use crate::error::{Result, TrackerError};
use image::GrayImage;
use std::sync::Arc;

/// 已解码的灰度帧序列, 按固定帧率播放
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Arc<Vec<GrayImage>>,
    fps: f64,
}

impl FrameSequence {
    pub fn new(frames: Vec<GrayImage>, fps: f64) -> Result<Self> {
        let Some(first) = frames.first() else {
            return Err(TrackerError::InvalidVideo("Frame sequence is empty".to_string()));
        };
        if fps <= 0.0 {
            return Err(TrackerError::InvalidVideo(format!("Invalid frame rate {}", fps)));
        }
        let dims = first.dimensions();
        if frames.iter().any(|f| f.dimensions() != dims) {
            return Err(TrackerError::InvalidVideo(
                "Frames in a sequence must share one resolution".to_string(),
            ));
        }
        Ok(Self {
            frames: Arc::new(frames),
            fps,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl ImageSource for FrameSequence {
    fn resolution(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn start_time_in_seconds(&self) -> f64 {
        0.0
    }

    fn end_time_in_seconds(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn frames(&self) -> Result<FrameStream> {
        let frames = Arc::clone(&self.frames);
        let fps = self.fps;
        Ok(Box::new((0..frames.len()).map(move |i| {
            Ok(GrayFrame {
                index: i as u64,
                time_msecs: i as f64 * 1000.0 / fps,
                image: frames[i].clone(),
            })
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_times() {
        let seq = FrameSequence::new(vec![GrayImage::new(4, 3); 5], 25.0).unwrap();
        assert_eq!(seq.resolution(), (4, 3));
        assert_eq!(seq.end_time_in_seconds(), 0.2);
        let times: Vec<f64> = seq.frames().unwrap().map(|f| f.unwrap().time_msecs).collect();
        assert_eq!(times, vec![0.0, 40.0, 80.0, 120.0, 160.0]);
    }

    #[test]
    fn test_invalid_sequences() {
        assert!(FrameSequence::new(Vec::new(), 25.0).is_err());
        assert!(FrameSequence::new(vec![GrayImage::new(4, 3)], 0.0).is_err());
        assert!(FrameSequence::new(vec![GrayImage::new(4, 3), GrayImage::new(3, 4)], 25.0).is_err());
    }
}
