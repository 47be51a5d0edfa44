//! FFprobe 视频信息
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// 默认帧率 (无法从视频中读取时)
pub const DEFAULT_FPS: f64 = 30.0;

/// 视频文件信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// 时长 (秒)
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
}

impl VideoInfo {
    pub fn duration_msecs(&self) -> f64 {
        self.duration * 1000.0
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// 读取视频文件信息
pub fn probe_video(path: impl AsRef<Path>) -> Result<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TrackerError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffprobe").map_err(|_| TrackerError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(TrackerError::FfprobeFailed {
            message: format!("ffprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(
        "🎞️ {}: {}x{} @ {:.2}fps, {:.1}s ({})",
        path.display(),
        info.width,
        info.height,
        info.fps,
        info.duration,
        info.codec
    );
    Ok(info)
}

/// 解析 ffprobe JSON 输出
pub fn parse_probe_output(json: &[u8]) -> Result<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| TrackerError::InvalidVideo("No video stream found".to_string()))?;

    // 容器时长优先, 否则使用视频流时长
    let duration = probe
        .format
        .duration
        .as_ref()
        .or(stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // avg_frame_rate 可能是 "0/0"
    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|r| parse_frame_rate(r))
        .find(|fps| *fps > 0.0)
        .unwrap_or(DEFAULT_FPS);

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(TrackerError::InvalidVideo("Video stream has no dimensions".to_string())),
    };

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

/// 解析帧率字符串 ("30/1" 或 "29.97")
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
