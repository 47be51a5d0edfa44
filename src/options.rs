//! 追踪器配置 - INI 配置文件
//!
//! ```text
//! [Options]
//! monitors = 2
//! fullsize = 960,720
//! data_folder = results
//! source = video.avi
//!
//! [Monitor0]
//! maskfile = upper_left.msk
//! trackType = 1
//! track = True
//! crossingBeam = horizontal
//! ```

use crate::detection::{
    AggregationInterval, CrossingBeamType, IntervalUnits, MonitoredArea, TrackType,
};
use crate::error::{Result, TrackerError};
use chrono::NaiveDateTime;
use ini::{Ini, ParseOption};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const OPTIONS_SECTION: &str = "Options";

/// 采集开始时间格式
pub const ACQ_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 单个监控区域的配置 ([Monitor<i>] 段)
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorOptions {
    /// 段名, 同时作为结果文件前缀
    pub name: String,
    pub mask_file: Option<PathBuf>,
    pub track_type: TrackType,
    /// 是否分析该区域
    pub track: bool,
    pub sleep_deprivation: bool,
    pub crossing_beam: CrossingBeamType,
    pub aggregation: AggregationInterval,
    /// 从1开始的ROI编号, 为空表示全部
    pub roi_filter: Vec<usize>,
}

impl MonitorOptions {
    pub fn new(index: usize) -> Self {
        Self {
            name: monitor_section(index),
            mask_file: None,
            track_type: TrackType::default(),
            track: false,
            sleep_deprivation: false,
            crossing_beam: CrossingBeamType::default(),
            aggregation: AggregationInterval::default(),
            roi_filter: Vec::new(),
        }
    }

    /// 构造监控区域 (不加载ROI)
    pub fn to_monitored_area(&self) -> MonitoredArea {
        let mut area = MonitoredArea::new(self.name.clone());
        area.track_type = self.track_type;
        area.crossing_beam = self.crossing_beam;
        area.aggregation = self.aggregation;
        area.roi_filter = self.roi_filter.iter().copied().collect();
        area.sleep_deprivation = self.sleep_deprivation;
        area
    }
}

/// 追踪器配置
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOptions {
    /// 配置文件路径 (已加载或已保存时)
    pub path: Option<PathBuf>,
    pub source: Option<PathBuf>,
    pub data_folder: Option<PathBuf>,
    /// 解码分辨率 (宽, 高), ROI坐标空间
    pub image_size: Option<(u32, u32)>,
    /// 视频第0帧对应的采集时刻
    pub acq_time: Option<NaiveDateTime>,
    /// [Options] 中声明的区域数量
    pub monitors_count: usize,
    pub monitors: Vec<MonitorOptions>,
    /// 加载时无法解析的值
    pub load_errors: Vec<String>,
}

fn monitor_section(index: usize) -> String {
    format!("Monitor{}", index)
}

/// 段内大小写不敏感的键值
struct Section<'a> {
    name: String,
    values: HashMap<String, &'a str>,
}

impl<'a> Section<'a> {
    /// 按段名查找 (大小写不敏感)
    fn find(raw: &'a HashMap<String, HashMap<String, String>>, name: &str) -> Option<Self> {
        let (_, values) = raw.iter().find(|(k, _)| k.eq_ignore_ascii_case(name))?;
        let values = values
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.trim()))
            .collect();
        Some(Self {
            name: name.to_string(),
            values,
        })
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.values.get(&key.to_lowercase()).copied()
    }

    /// 非空字符串值
    fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, errors: &mut Vec<String>) -> Option<T> {
        let raw = self.get_str(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.push(format!("[{}] {}: invalid value {:?}", self.name, key, raw));
                None
            }
        }
    }

    fn parse_bool(&self, key: &str, errors: &mut Vec<String>) -> Option<bool> {
        let raw = self.get_str(key)?;
        match raw.to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => {
                errors.push(format!("[{}] {}: expected True or False, got {:?}", self.name, key, raw));
                None
            }
        }
    }
}

/// 逗号分隔的整数列表
fn parse_list<T: std::str::FromStr>(raw: &str) -> Option<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse().ok())
        .collect()
}

/// 读取INI: 值按原文保留 (反斜杠、引号、`#`、`;` 不做特殊处理)
fn read_ini(path: &Path) -> Result<HashMap<String, HashMap<String, String>>> {
    let text = fs::read_to_string(path)?;
    let opt = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(&text, opt)?;

    let mut raw: HashMap<String, HashMap<String, String>> = HashMap::new();
    for (section, props) in &ini {
        let Some(section) = section else { continue };
        let values = raw.entry(section.to_string()).or_default();
        for (key, value) in props.iter() {
            values.insert(key.to_string(), value.to_string());
        }
    }
    Ok(raw)
}

impl ConfigOptions {
    /// 从INI文件加载配置
    ///
    /// 无法解析的值记录在 `load_errors` 中, 不会中断加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrackerError::FileNotFound(path.to_path_buf()));
        }
        info!("📂 加载配置文件: {}", path.display());

        let raw = read_ini(path)?;

        let mut options = ConfigOptions {
            path: Some(path.to_path_buf()),
            ..Default::default()
        };
        let mut errors = Vec::new();

        match Section::find(&raw, OPTIONS_SECTION) {
            Some(opts) => {
                options.monitors_count = opts.parse("monitors", &mut errors).unwrap_or(0);
                options.source = opts.get_str("source").map(PathBuf::from);
                options.data_folder = opts.get_str("data_folder").map(PathBuf::from);
                if let Some(raw) = opts.get_str("fullsize") {
                    match parse_list::<u32>(raw).as_deref() {
                        Some(&[w, h]) => options.image_size = Some((w, h)),
                        _ => errors.push(format!(
                            "[{}] fullsize: expected <width>,<height>, got {:?}",
                            OPTIONS_SECTION, raw
                        )),
                    }
                }
                if let Some(raw) = opts.get_str("acq_time") {
                    match NaiveDateTime::parse_from_str(raw, ACQ_TIME_FORMAT) {
                        Ok(t) => options.acq_time = Some(t),
                        Err(e) => errors.push(format!("[{}] acq_time: {} ({:?})", OPTIONS_SECTION, e, raw)),
                    }
                }
            }
            None => warn!("⚠️  配置文件 {} 中没有 [{}] 段", path.display(), OPTIONS_SECTION),
        }

        for index in 0..options.monitors_count {
            let name = monitor_section(index);
            let Some(sec) = Section::find(&raw, &name) else {
                warn!("⚠️  配置文件 {} 中没有 [{}] 段", path.display(), name);
                continue;
            };
            let mut monitor = MonitorOptions::new(index);
            monitor.mask_file = sec.get_str("maskfile").map(PathBuf::from);
            if let Some(idx) = sec.parse::<i64>("trackType", &mut errors) {
                match TrackType::from_index(idx) {
                    Some(t) => monitor.track_type = t,
                    None => errors.push(format!("[{}] trackType: unknown track type {}", name, idx)),
                }
            }
            monitor.track = sec.parse_bool("track", &mut errors).unwrap_or(false);
            monitor.sleep_deprivation = sec.parse_bool("isSDMonitor", &mut errors).unwrap_or(false);
            if let Some(beam) = sec.parse::<CrossingBeamType>("crossingBeam", &mut errors) {
                monitor.crossing_beam = beam;
            }
            if let Some(value) = sec.parse::<u32>("aggregationInterval", &mut errors) {
                monitor.aggregation.value = value;
            }
            if let Some(units) = sec.parse::<IntervalUnits>("aggregationIntervalUnits", &mut errors) {
                monitor.aggregation.units = units;
            }
            if let Some(raw) = sec.get_str("roisFilter") {
                match parse_list::<usize>(raw) {
                    Some(filter) => monitor.roi_filter = filter,
                    None => errors.push(format!("[{}] roisFilter: invalid ROI list {:?}", name, raw)),
                }
            }
            options.monitors.push(monitor);
        }

        for e in &errors {
            warn!("⚠️  {}", e);
        }
        options.load_errors = errors;
        Ok(options)
    }

    /// 保存为INI文件
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_ini())?;
        self.path = Some(path.to_path_buf());
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    fn to_ini(&self) -> String {
        let mut out = String::new();
        let path_value = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let _ = writeln!(out, "[{}]", OPTIONS_SECTION);
        let _ = writeln!(out, "monitors = {}", self.monitors.len());
        if let Some((w, h)) = self.image_size {
            let _ = writeln!(out, "fullsize = {},{}", w, h);
        }
        let _ = writeln!(out, "data_folder = {}", path_value(&self.data_folder));
        let _ = writeln!(out, "source = {}", path_value(&self.source));
        if let Some(t) = self.acq_time {
            let _ = writeln!(out, "acq_time = {}", t.format(ACQ_TIME_FORMAT));
        }

        for monitor in &self.monitors {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}]", monitor.name);
            let _ = writeln!(out, "maskfile = {}", path_value(&monitor.mask_file));
            let _ = writeln!(out, "trackType = {}", monitor.track_type.index());
            let _ = writeln!(out, "track = {}", if monitor.track { "True" } else { "False" });
            let _ = writeln!(
                out,
                "isSDMonitor = {}",
                if monitor.sleep_deprivation { "True" } else { "False" }
            );
            let _ = writeln!(out, "crossingBeam = {}", monitor.crossing_beam.name());
            let _ = writeln!(out, "aggregationInterval = {}", monitor.aggregation.value);
            let _ = writeln!(out, "aggregationIntervalUnits = {}", monitor.aggregation.units.name());
            let filter: Vec<String> = monitor.roi_filter.iter().map(|i| i.to_string()).collect();
            let _ = writeln!(out, "roisFilter = {}", filter.join(","));
        }
        out
    }

    /// 检查视频源
    pub fn validate_source(&self) -> Vec<String> {
        match &self.source {
            None => vec!["Video source is not set".to_string()],
            Some(source) if !source.is_file() => {
                vec![format!("Video source {} does not exist", source.display())]
            }
            Some(_) => Vec::new(),
        }
    }

    /// 检查完整配置, 返回所有问题
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.validate_source();

        match &self.data_folder {
            None => errors.push("Results folder (data_folder) is not set".to_string()),
            Some(dir) if !dir.is_dir() => {
                errors.push(format!("Results folder {} is not a directory", dir.display()))
            }
            Some(_) => {}
        }
        match self.image_size {
            None => errors.push("Image size (fullsize) is not set".to_string()),
            Some((w, h)) if w == 0 || h == 0 => {
                errors.push(format!("Invalid image size {}x{}", w, h))
            }
            Some(_) => {}
        }
        if self.monitors.len() < self.monitors_count {
            errors.push(format!(
                "{} monitored areas declared but only {} [Monitor<i>] sections found",
                self.monitors_count,
                self.monitors.len()
            ));
        }

        for monitor in self.monitors.iter().filter(|m| m.track) {
            match &monitor.mask_file {
                None => errors.push(format!("{}: mask file is not set", monitor.name)),
                Some(mask) if !mask.is_file() => {
                    errors.push(format!("{}: mask file {} does not exist", monitor.name, mask.display()))
                }
                Some(_) => {}
            }
            if monitor.track_type == TrackType::Crossover
                && !CrossingBeamType::is_crossing_beam_needed(monitor.track_type, monitor.crossing_beam)
            {
                errors.push(format!("{}: crossover tracking needs a crossing beam", monitor.name));
            }
            if monitor.aggregation.value < 1 {
                errors.push(format!("{}: aggregation interval must be at least 1", monitor.name));
            }
            if monitor.roi_filter.contains(&0) {
                errors.push(format!("{}: ROI numbers in roisFilter start at 1", monitor.name));
            }
        }
        errors
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn monitored_areas(&self) -> &[MonitorOptions] {
        &self.monitors
    }

    /// 需要分析的区域
    pub fn tracked_areas(&self) -> impl Iterator<Item = &MonitorOptions> {
        self.monitors.iter().filter(|m| m.track)
    }

    /// 调整区域数量: 增加时使用默认值, 减少时截断
    pub fn set_monitored_areas_count(&mut self, count: usize) {
        if count < self.monitors.len() {
            self.monitors.truncate(count);
        } else {
            let start = self.monitors.len();
            self.monitors.extend((start..count).map(MonitorOptions::new));
        }
        self.monitors_count = count;
    }
}
