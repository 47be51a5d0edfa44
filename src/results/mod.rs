//! 结果输出 (DAM 格式)
//!
//! 每个监控区域一个制表符分隔的文本文件, 每个聚合间隔一行:
//! 序号, 日期, 时间, 状态(1), 六个保留列(0), 然后每个ROI一个数值。

use crate::error::Result;
use chrono::{Duration, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 结果文件名中的活动标签
pub const RESULTS_TAG: &str = "crossings";

/// 状态列之后的保留列数
const RESERVED_COLUMNS: usize = 6;

/// 区间结果文件名: <Monitor>-crossings-<start>-<end>.txt
static INTERVAL_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<monitor>.+)-crossings-(?P<start>\d+)-(?P<end>\d+|end)\.txt$")
        .expect("interval file pattern is valid")
});

/// 结果文件名, 后缀为空时不带区间
pub fn results_file_name(monitor: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        format!("{}-{}.txt", monitor, RESULTS_TAG)
    } else {
        format!("{}-{}-{}.txt", monitor, RESULTS_TAG, suffix)
    }
}

/// 解析区间结果文件名 → (监控区域, 起始秒, 结束秒 / None 表示到结尾)
pub fn parse_interval_file_name(file_name: &str) -> Option<(String, u64, Option<u64>)> {
    let caps = INTERVAL_FILE_RE.captures(file_name)?;
    let start = caps["start"].parse().ok()?;
    let end = match &caps["end"] {
        "end" => None,
        e => Some(e.parse().ok()?),
    };
    Some((caps["monitor"].to_string(), start, end))
}

/// 一行结果
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// 从1开始的行号
    pub index: u64,
    /// 聚合间隔开始时刻
    pub timestamp: NaiveDateTime,
    /// 每个ROI的活动值
    pub values: Vec<i64>,
}

impl ResultRow {
    /// 采集开始时间 + 帧时间
    pub fn timestamp_at(acquisition_start: NaiveDateTime, frame_time_msecs: f64) -> NaiveDateTime {
        acquisition_start + Duration::milliseconds(frame_time_msecs.round() as i64)
    }

    pub fn format(&self) -> String {
        let mut line = format!(
            "{}\t{}\t{}\t1",
            self.index,
            self.timestamp.format("%d %b %y"),
            self.timestamp.format("%H:%M:%S"),
        );
        for _ in 0..RESERVED_COLUMNS {
            line.push_str("\t0");
        }
        for value in &self.values {
            line.push('\t');
            line.push_str(&value.to_string());
        }
        line
    }
}

/// 结果输出目标
pub trait ResultsSink: Send {
    fn write_row(&mut self, row: &ResultRow) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// 结果文件写入器
pub struct ResultsWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows_written: u64,
}

impl ResultsWriter {
    /// 创建 (覆盖) 结果文件
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!("📝 结果文件: {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl ResultsSink for ResultsWriter {
    fn write_row(&mut self, row: &ResultRow) -> Result<()> {
        writeln!(self.writer, "{}", row.format())?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// 合并某个监控区域在本次运行中写出的区间结果文件
///
/// 只读取 `suffixes` 对应的文件 (目录中其它运行留下的区间文件被忽略),
/// 按起始时间排序后拼接, 重新编号, 写入 <Monitor>-crossings.txt。
/// 没有找到任何区间文件时返回 None。
pub fn merge_interval_results(
    dir: impl AsRef<Path>,
    monitor: &str,
    suffixes: &[String],
) -> Result<Option<PathBuf>> {
    let dir = dir.as_ref();
    let mut parts: Vec<(u64, PathBuf)> = Vec::new();
    for suffix in suffixes {
        let name = results_file_name(monitor, suffix);
        let Some((_, start, _)) = parse_interval_file_name(&name) else {
            warn!("⚠️ 不是区间结果文件: {}", name);
            continue;
        };
        let path = dir.join(&name);
        if path.is_file() {
            parts.push((start, path));
        } else {
            warn!("⚠️ 区间结果文件不存在: {}", path.display());
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    parts.sort_by_key(|(start, _)| *start);

    let merged_path = dir.join(results_file_name(monitor, ""));
    let mut out = BufWriter::new(File::create(&merged_path)?);
    let mut index = 0u64;
    for (_, part) in &parts {
        let reader = BufReader::new(File::open(part)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            index += 1;
            // 替换第一列序号
            let rest = line.split_once('\t').map(|(_, rest)| rest).unwrap_or("");
            writeln!(out, "{}\t{}", index, rest)?;
        }
    }
    out.flush()?;
    info!(
        "🧩 合并 {} 个区间文件 ({} 行) → {}",
        parts.len(),
        index,
        merged_path.display()
    );
    Ok(Some(merged_path))
}
