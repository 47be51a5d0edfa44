/// 视频文件输入源
use super::decoder::{FfmpegDecoder, GrayFrame};
use super::probe::{probe_video, VideoInfo};
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 帧流: 解码线程中迭代
pub type FrameStream = Box<dyn Iterator<Item = Result<GrayFrame>> + Send>;

/// 图像输入源
pub trait ImageSource: Send + Sync {
    /// 输出分辨率 (宽, 高)
    fn resolution(&self) -> (u32, u32);

    fn fps(&self) -> f64;

    fn start_time_in_seconds(&self) -> f64;

    fn end_time_in_seconds(&self) -> f64;

    /// 从起始时间开始的帧流
    fn frames(&self) -> Result<FrameStream>;

    /// 第0帧的采集时刻 (已知时)
    fn recorded_at(&self) -> Option<NaiveDateTime> {
        None
    }
}

/// 视频文件
#[derive(Debug, Clone)]
pub struct MovieFile {
    path: PathBuf,
    info: VideoInfo,
    resolution: (u32, u32),
    start_msecs: f64,
    /// None 表示时长未知, 解码到结尾
    end_msecs: Option<f64>,
}

impl MovieFile {
    /// 打开视频文件
    ///
    /// # 参数
    /// - `start_msecs` / `end_msecs`: 分析区间, 非正数表示视频开头 / 结尾
    /// - `resolution`: 解码分辨率, None 使用原始分辨率
    pub fn open(
        path: impl AsRef<Path>,
        start_msecs: f64,
        end_msecs: f64,
        resolution: Option<(u32, u32)>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe_video(&path)?;
        Ok(Self::from_info(path, info, start_msecs, end_msecs, resolution))
    }

    /// 用已知视频信息构造
    pub fn from_info(
        path: PathBuf,
        info: VideoInfo,
        start_msecs: f64,
        end_msecs: f64,
        resolution: Option<(u32, u32)>,
    ) -> Self {
        let duration = info.duration_msecs();
        let known_duration = duration > 0.0;

        let mut start = start_msecs.max(0.0);
        if known_duration {
            start = start.min(duration);
        }
        let end = if known_duration {
            Some(if end_msecs <= 0.0 { duration } else { end_msecs.min(duration) })
        } else if end_msecs > 0.0 {
            Some(end_msecs)
        } else {
            None
        };
        let resolution = resolution
            .filter(|(w, h)| *w > 0 && *h > 0)
            .unwrap_or((info.width, info.height));

        Self {
            path,
            info,
            resolution,
            start_msecs: start,
            end_msecs: end,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// 区间内是否有可读取的帧
    pub fn is_opened(&self) -> bool {
        self.end_msecs.map_or(true, |end| self.start_msecs < end)
    }

    /// 解码分辨率 / 原始分辨率
    pub fn scale(&self) -> (f32, f32) {
        (
            self.resolution.0 as f32 / self.info.width as f32,
            self.resolution.1 as f32 / self.info.height as f32,
        )
    }
}

impl ImageSource for MovieFile {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn start_time_in_seconds(&self) -> f64 {
        self.start_msecs / 1000.0
    }

    fn end_time_in_seconds(&self) -> f64 {
        self.end_msecs.unwrap_or(self.start_msecs) / 1000.0
    }

    fn frames(&self) -> Result<FrameStream> {
        info!(
            "🎬 解码 {} [{:.1}s - {}]",
            self.path.display(),
            self.start_time_in_seconds(),
            self.end_msecs
                .map(|e| format!("{:.1}s", e / 1000.0))
                .unwrap_or_else(|| "end".to_string())
        );
        let decoder = FfmpegDecoder::spawn(
            &self.path,
            self.start_msecs,
            self.end_msecs.map(|end| end - self.start_msecs),
            self.resolution,
            self.info.fps,
        )?;
        Ok(Box::new(decoder))
    }

    /// 视频文件的修改时间
    fn recorded_at(&self) -> Option<NaiveDateTime> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(DateTime::<Local>::from(modified).naive_local())
    }
}
