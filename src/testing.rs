//! 测试工具: 把假的 ffmpeg / ffprobe 脚本放到 PATH 最前面
//!
//! PATH 是进程级的, 同一时刻只允许一个测试持有 `FakeTools`。
use image::GrayImage;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

static PATH_LOCK: Mutex<()> = Mutex::new(());

/// 假 ffmpeg 的行为
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBehaviour {
    /// 帧之后追加的不完整帧字节数
    pub trailing_bytes: usize,
    /// 输出帧之前写到 stderr 的字节数
    pub stderr_bytes: usize,
    /// 输出完成后保持运行的秒数
    pub linger_secs: u32,
    pub exit_code: i32,
}

pub struct FakeTools {
    dir: TempDir,
    old_path: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl FakeTools {
    pub fn install() -> Self {
        let lock = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let old_path = env::var_os("PATH");
        let mut paths = vec![dir.path().to_path_buf()];
        if let Some(old) = &old_path {
            paths.extend(env::split_paths(old));
        }
        env::set_var("PATH", env::join_paths(paths).unwrap());
        Self {
            dir,
            old_path,
            _lock: lock,
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// 一个空的 "视频" 文件
    pub fn video(&self) -> PathBuf {
        let path = self.dir().join("video.avi");
        fs::write(&path, b"").unwrap();
        path
    }

    /// ffprobe 输出固定的视频信息
    pub fn ffprobe(&self, width: u32, height: u32, fps: u32, duration: f64) {
        let json = format!(
            r#"{{"format": {{"duration": "{}"}}, "streams": [{{"codec_type": "video", "codec_name": "h264", "width": {}, "height": {}, "r_frame_rate": "{}/1", "avg_frame_rate": "{}/1"}}]}}"#,
            duration, width, height, fps, fps
        );
        let json_path = self.dir().join("probe.json");
        fs::write(&json_path, json).unwrap();
        self.script("ffprobe", &format!("cat '{}'\n", json_path.display()));
    }

    /// ffmpeg 忽略参数, 把 `frames` 作为 gray rawvideo 写到 stdout
    pub fn ffmpeg(&self, frames: &[GrayImage], behaviour: FfmpegBehaviour) {
        let mut raw: Vec<u8> = frames.iter().flat_map(|f| f.as_raw().iter().copied()).collect();
        raw.extend(std::iter::repeat(7u8).take(behaviour.trailing_bytes));
        let raw_path = self.dir().join("frames.raw");
        fs::write(&raw_path, raw).unwrap();

        let mut body = String::new();
        if behaviour.stderr_bytes > 0 {
            body.push_str(&format!(
                "head -c {} /dev/zero | tr '\\000' 'e' >&2\n",
                behaviour.stderr_bytes
            ));
        }
        body.push_str(&format!("cat '{}'\n", raw_path.display()));
        if behaviour.linger_secs > 0 {
            body.push_str(&format!("exec sleep {}\n", behaviour.linger_secs));
        }
        body.push_str(&format!("exit {}\n", behaviour.exit_code));
        self.script("ffmpeg", &body);
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.dir().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

impl Drop for FakeTools {
    fn drop(&mut self) {
        match &self.old_path {
            Some(path) => env::set_var("PATH", path),
            None => env::remove_var("PATH"),
        }
    }
}
