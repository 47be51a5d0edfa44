/// 果蝇追踪数据结构定义
/// Data structures for the fly activity tracker
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ========== 公共常量 ==========

/// 背景滑动平均权重
pub const BACKGROUND_ALPHA: f32 = 0.2;

/// 前景二值化阈值
pub const FOREGROUND_THRESHOLD: u8 = 20;

// ========== 枚举类型 ==========

/// 追踪类型 (配置文件中的 trackType)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackType {
    /// 移动距离
    #[default]
    Distance,
    /// 虚拟光束穿越
    Crossover,
    /// 位置
    Position,
}

impl TrackType {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Distance),
            1 => Some(Self::Crossover),
            2 => Some(Self::Position),
            _ => None,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            Self::Distance => 0,
            Self::Crossover => 1,
            Self::Position => 2,
        }
    }
}

/// 穿越光束方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossingBeamType {
    #[default]
    None,
    /// 水平中线 (检测管内上下移动)
    Horizontal,
    /// 垂直中线 (检测管内左右移动)
    Vertical,
}

impl CrossingBeamType {
    /// 是否需要绘制/计算中线
    pub fn is_crossing_beam_needed(track_type: TrackType, beam: CrossingBeamType) -> bool {
        track_type == TrackType::Crossover && beam != CrossingBeamType::None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

impl FromStr for CrossingBeamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            other => Err(format!("unknown crossing beam type {:?}", other)),
        }
    }
}

/// 聚合间隔单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntervalUnits {
    Frames,
    Seconds,
    #[default]
    Minutes,
}

impl IntervalUnits {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frames => "frames",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
        }
    }
}

impl FromStr for IntervalUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "frames" => Ok(Self::Frames),
            "seconds" => Ok(Self::Seconds),
            "minutes" => Ok(Self::Minutes),
            other => Err(format!("unknown aggregation interval units {:?}", other)),
        }
    }
}

// ========== 数据结构 ==========

/// 聚合间隔 (每个间隔输出一行结果)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationInterval {
    pub value: u32,
    pub units: IntervalUnits,
}

impl Default for AggregationInterval {
    fn default() -> Self {
        Self {
            value: 1,
            units: IntervalUnits::Minutes,
        }
    }
}

impl AggregationInterval {
    /// 时间型间隔的长度 (毫秒), 帧间隔返回 None
    pub fn duration_msecs(&self) -> Option<f64> {
        match self.units {
            IntervalUnits::Frames => None,
            IntervalUnits::Seconds => Some(self.value as f64 * 1000.0),
            IntervalUnits::Minutes => Some(self.value as f64 * 60_000.0),
        }
    }
}

/// 二维点 (图像坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn scaled(&self, scale: (f32, f32)) -> Point {
        Point::new(self.x * scale.0, self.y * scale.1)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// 轴对齐矩形 (像素, 右下角不包含)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 感兴趣区域: 四个角点 (a 左上, b 左下, c 右下, d 右上)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roi {
    pub points: [(i32, i32); 4],
}

impl Roi {
    pub fn new(points: [(i32, i32); 4]) -> Self {
        Self { points }
    }

    /// 角点 (浮点)
    pub fn corners(&self) -> [Point; 4] {
        self.points.map(|(x, y)| Point::new(x as f32, y as f32))
    }

    /// 按缩放比例转换为多边形
    pub fn to_poly(&self, scale: (f32, f32)) -> Vec<Point> {
        self.corners().iter().map(|p| p.scaled(scale)).collect()
    }

    /// 中线端点
    ///
    /// 水平中线连接 ab 与 dc 的中点, 垂直中线连接 ad 与 bc 的中点
    pub fn midline(&self, scale: (f32, f32), beam: CrossingBeamType) -> Option<(Point, Point)> {
        let [a, b, c, d] = self.corners().map(|p| p.scaled(scale));
        match beam {
            CrossingBeamType::None => None,
            CrossingBeamType::Horizontal => Some((a.midpoint(&b), d.midpoint(&c))),
            CrossingBeamType::Vertical => Some((a.midpoint(&d), b.midpoint(&c))),
        }
    }

    /// 长轴 (起点, 终点): 沿着管子较长的方向
    pub fn long_axis(&self) -> (Point, Point) {
        let [a, b, c, d] = self.corners();
        let vertical = (a.midpoint(&d), b.midpoint(&c));
        let horizontal = (a.midpoint(&b), d.midpoint(&c));
        if vertical.0.distance(&vertical.1) >= horizontal.0.distance(&horizontal.1) {
            vertical
        } else {
            horizontal
        }
    }
}

/// 单帧中某个ROI的果蝇检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyDetection {
    /// 质心
    pub position: Point,
    /// 前景像素数
    pub area: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tube() -> Roi {
        Roi::new([(10, 20), (10, 70), (18, 70), (18, 20)])
    }

    #[test]
    fn test_track_type_index() {
        for index in 0..3 {
            assert_eq!(TrackType::from_index(index).unwrap().index(), index);
        }
        assert!(TrackType::from_index(3).is_none());
    }

    #[test]
    fn test_beam_needed_only_for_crossover() {
        assert!(CrossingBeamType::is_crossing_beam_needed(
            TrackType::Crossover,
            CrossingBeamType::Horizontal
        ));
        assert!(!CrossingBeamType::is_crossing_beam_needed(
            TrackType::Crossover,
            CrossingBeamType::None
        ));
        assert!(!CrossingBeamType::is_crossing_beam_needed(
            TrackType::Distance,
            CrossingBeamType::Vertical
        ));
    }

    #[test]
    fn test_horizontal_midline_crosses_tube() {
        let (m1, m2) = tube().midline((1.0, 1.0), CrossingBeamType::Horizontal).unwrap();
        assert_eq!(m1, Point::new(10.0, 45.0));
        assert_eq!(m2, Point::new(18.0, 45.0));
    }

    #[test]
    fn test_midline_scaled() {
        let (m1, m2) = tube().midline((2.0, 0.5), CrossingBeamType::Vertical).unwrap();
        assert_eq!(m1, Point::new(28.0, 10.0));
        assert_eq!(m2, Point::new(28.0, 35.0));
    }

    #[test]
    fn test_long_axis_of_vertical_tube() {
        let (start, end) = tube().long_axis();
        assert_eq!(start, Point::new(14.0, 20.0));
        assert_eq!(end, Point::new(14.0, 70.0));
    }

    #[test]
    fn test_interval_duration() {
        let minutes = AggregationInterval { value: 2, units: IntervalUnits::Minutes };
        assert_eq!(minutes.duration_msecs(), Some(120_000.0));
        let frames = AggregationInterval { value: 5, units: IntervalUnits::Frames };
        assert_eq!(frames.duration_msecs(), None);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Vertical".parse::<CrossingBeamType>(), Ok(CrossingBeamType::Vertical));
        assert_eq!("".parse::<CrossingBeamType>(), Ok(CrossingBeamType::None));
        assert_eq!(" seconds ".parse::<IntervalUnits>(), Ok(IntervalUnits::Seconds));
        assert!("hours".parse::<IntervalUnits>().is_err());
    }
}
