/// FFmpeg 管道解码器
/// Decodes a video file into grayscale frames through an `ffmpeg` rawvideo pipe
use crate::error::{Result, TrackerError};
use image::GrayImage;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// 保留的 stderr 尾部字节数
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// 解码后的灰度帧
#[derive(Debug, Clone)]
pub struct GrayFrame {
    /// 帧序号 (相对视频开头)
    pub index: u64,
    /// 帧时间 (毫秒, 相对视频开头)
    pub time_msecs: f64,
    pub image: GrayImage,
}

/// FFmpeg 解码器
///
/// 子进程输出固定大小的灰度帧; 末尾不完整的帧被丢弃
pub struct FfmpegDecoder {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    fps: f64,
    start_msecs: f64,
    first_index: u64,
    produced: u64,
    finished: bool,
}

impl FfmpegDecoder {
    /// 启动解码
    ///
    /// # 参数
    /// - `start_msecs`: 起始时间
    /// - `duration_msecs`: 解码时长, None 表示到结尾
    /// - `size`: 输出分辨率
    pub fn spawn(
        path: &Path,
        start_msecs: f64,
        duration_msecs: Option<f64>,
        size: (u32, u32),
        fps: f64,
    ) -> Result<Self> {
        which::which("ffmpeg").map_err(|_| TrackerError::FfmpegNotFound)?;

        let (width, height) = size;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        if start_msecs > 0.0 {
            cmd.args(["-ss", &format!("{:.3}", start_msecs / 1000.0)]);
        }
        if let Some(duration) = duration_msecs {
            cmd.args(["-t", &format!("{:.3}", duration / 1000.0)]);
        }
        cmd.arg("-i")
            .arg(path)
            .args([
                "-an",
                "-vf",
                &format!("scale={}:{}", width, height),
                "-pix_fmt",
                "gray",
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("🎬 启动 FFmpeg 解码: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| TrackerError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrackerError::ffmpeg_failed("Failed to capture FFmpeg stdout", None))?;
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(Self {
            child,
            reader: BufReader::with_capacity((width * height) as usize * 2, stdout),
            stderr,
            width,
            height,
            fps,
            start_msecs: start_msecs.max(0.0),
            first_index: (start_msecs.max(0.0) / 1000.0 * fps).round() as u64,
            produced: 0,
            finished: false,
        })
    }

    pub fn frames_decoded(&self) -> u64 {
        self.produced
    }

    /// 解码结束: 等待子进程并检查退出状态
    fn finish(&mut self) -> Option<Result<GrayFrame>> {
        self.finished = true;
        let status = match self.child.wait() {
            Ok(status) => status,
            Err(e) => return Some(Err(e.into())),
        };
        if status.success() {
            debug!("✅ FFmpeg 解码结束: {} 帧", self.produced);
            return None;
        }

        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if self.produced == 0 {
            Some(Err(TrackerError::ffmpeg_failed(stderr.trim().to_string(), status.code())))
        } else {
            warn!(
                "⚠️ FFmpeg 退出码 {:?} ({} 帧后): {}",
                status.code(),
                self.produced,
                stderr.trim()
            );
            None
        }
    }
}

/// 在后台线程中持续读取 stderr, 只保留尾部
///
/// 管道写满时 ffmpeg 会阻塞, stdout 也随之停止输出
fn drain_stderr(mut pipe: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut tail: Vec<u8> = Vec::with_capacity(STDERR_TAIL_BYTES);
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL_BYTES {
                        tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

impl Iterator for FfmpegDecoder {
    type Item = Result<GrayFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut buffer = vec![0u8; (self.width * self.height) as usize];
        match self.reader.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return self.finish(),
            Err(e) => {
                self.finished = true;
                return Some(Err(e.into()));
            }
        }

        let Some(image) = GrayImage::from_raw(self.width, self.height, buffer) else {
            self.finished = true;
            return Some(Err(TrackerError::ffmpeg_failed("Invalid frame buffer", None)));
        };
        let i = self.produced;
        self.produced += 1;
        Some(Ok(GrayFrame {
            index: self.first_index + i,
            time_msecs: self.start_msecs + i as f64 * 1000.0 / self.fps,
            image,
        }))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{FakeTools, FfmpegBehaviour};
    use image::Luma;
    use std::time::{Duration, Instant};

    fn frames(n: u8) -> Vec<GrayImage> {
        (0..n)
            .map(|i| GrayImage::from_pixel(4, 4, Luma([i * 10 + 1])))
            .collect()
    }

    fn spawn(tools: &FakeTools, start_msecs: f64) -> FfmpegDecoder {
        FfmpegDecoder::spawn(&tools.video(), start_msecs, None, (4, 4), 25.0).unwrap()
    }

    #[test]
    fn test_frames_sliced_and_timed() {
        let tools = FakeTools::install();
        tools.ffmpeg(&frames(3), FfmpegBehaviour::default());

        let decoded: Vec<GrayFrame> = spawn(&tools, 0.0).map(|f| f.unwrap()).collect();
        assert_eq!(decoded.len(), 3);
        let values: Vec<u8> = decoded.iter().map(|f| f.image.get_pixel(3, 3)[0]).collect();
        assert_eq!(values, vec![1, 11, 21]);
        let times: Vec<f64> = decoded.iter().map(|f| f.time_msecs).collect();
        assert_eq!(times, vec![0.0, 40.0, 80.0]);
    }

    #[test]
    fn test_seek_offsets_index_and_time() {
        let tools = FakeTools::install();
        tools.ffmpeg(&frames(2), FfmpegBehaviour::default());

        let decoded: Vec<GrayFrame> = spawn(&tools, 2000.0).map(|f| f.unwrap()).collect();
        assert_eq!(decoded[0].index, 50);
        assert_eq!(decoded[1].index, 51);
        assert_eq!(decoded[1].time_msecs, 2040.0);
    }

    #[test]
    fn test_partial_trailing_frame_dropped() {
        let tools = FakeTools::install();
        tools.ffmpeg(
            &frames(2),
            FfmpegBehaviour {
                trailing_bytes: 9,
                ..Default::default()
            },
        );

        let mut decoder = spawn(&tools, 0.0);
        let decoded: Vec<Result<GrayFrame>> = decoder.by_ref().collect();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|f| f.is_ok()));
        assert_eq!(decoder.frames_decoded(), 2);
    }

    #[test]
    fn test_chatty_stderr_does_not_block() {
        let tools = FakeTools::install();
        tools.ffmpeg(
            &frames(2),
            FfmpegBehaviour {
                stderr_bytes: 256 * 1024,
                ..Default::default()
            },
        );

        assert_eq!(spawn(&tools, 0.0).count(), 2);
    }

    #[test]
    fn test_failure_without_frames_is_error() {
        let tools = FakeTools::install();
        tools.ffmpeg(
            &[],
            FfmpegBehaviour {
                stderr_bytes: 32,
                exit_code: 1,
                ..Default::default()
            },
        );

        let decoded: Vec<Result<GrayFrame>> = spawn(&tools, 0.0).collect();
        assert_eq!(decoded.len(), 1);
        match &decoded[0] {
            Err(TrackerError::FfmpegFailed { message, exit_code }) => {
                assert_eq!(*exit_code, Some(1));
                assert!(message.starts_with("eeee"), "{}", message);
            }
            other => panic!("unexpected result: {:?}", other.as_ref().map(|f| f.index)),
        }
    }

    #[test]
    fn test_failure_after_frames_keeps_frames() {
        let tools = FakeTools::install();
        tools.ffmpeg(
            &frames(2),
            FfmpegBehaviour {
                exit_code: 1,
                ..Default::default()
            },
        );

        let decoded: Vec<Result<GrayFrame>> = spawn(&tools, 0.0).collect();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|f| f.is_ok()));
    }

    #[test]
    fn test_drop_kills_running_ffmpeg() {
        let tools = FakeTools::install();
        tools.ffmpeg(
            &frames(2),
            FfmpegBehaviour {
                linger_secs: 30,
                ..Default::default()
            },
        );

        let mut decoder = spawn(&tools, 0.0);
        assert!(decoder.next().unwrap().is_ok());
        let started = Instant::now();
        drop(decoder);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
