//! 果蝇活动追踪
//! Per-ROI activity tracking and aggregation

use super::arena::{project_on_axis, side_of_line, MonitoredArea};
use super::detector::{locate_fly, RoiMask};
use super::types::{CrossingBeamType, IntervalUnits, Point, TrackType};
use crate::error::Result;
use crate::results::{ResultRow, ResultsSink};
use chrono::NaiveDateTime;
use image::GrayImage;
use tracing::debug;

// ========== 单个ROI ==========

/// 单个ROI的追踪状态
#[derive(Debug, Clone)]
pub struct RoiTracker {
    mask: RoiMask,
    midline: Option<(Point, Point)>,
    axis: (Point, Point),
    trackable: bool,
    last_position: Option<Point>,
    /// 上一次已知的中线侧 (0 = 未知)
    last_side: i8,
    /// 当前间隔内累积的距离或穿越次数
    accumulated: f64,
}

impl RoiTracker {
    pub fn new(mask: RoiMask, midline: Option<(Point, Point)>, axis: (Point, Point), trackable: bool) -> Self {
        Self {
            mask,
            midline,
            axis,
            trackable,
            last_position: None,
            last_side: 0,
            accumulated: 0.0,
        }
    }

    pub fn is_trackable(&self) -> bool {
        self.trackable
    }

    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }

    /// 用一帧前景更新; 未检测到果蝇时保持上一次位置
    pub fn update(&mut self, foreground: &GrayImage, track_type: TrackType) {
        if !self.trackable {
            return;
        }
        let Some(fly) = locate_fly(foreground, &self.mask) else {
            return;
        };
        let position = fly.position;

        match track_type {
            TrackType::Distance => {
                if let Some(prev) = self.last_position {
                    self.accumulated += prev.distance(&position) as f64;
                }
            }
            TrackType::Crossover => {
                if let Some((m1, m2)) = self.midline {
                    let side = side_of_line(position, m1, m2);
                    if side != 0 {
                        if self.last_side != 0 && side != self.last_side {
                            self.accumulated += 1.0;
                        }
                        self.last_side = side;
                    }
                }
            }
            TrackType::Position => {}
        }
        self.last_position = Some(position);
    }

    /// 取出当前间隔的数值并清零累积量
    pub fn take_value(&mut self, track_type: TrackType) -> i64 {
        if !self.trackable {
            return 0;
        }
        match track_type {
            TrackType::Distance | TrackType::Crossover => {
                let value = self.accumulated.round() as i64;
                self.accumulated = 0.0;
                value
            }
            TrackType::Position => self
                .last_position
                .map(|p| project_on_axis(p, self.axis.0, self.axis.1).round() as i64)
                .unwrap_or(0),
        }
    }
}

// ========== 聚合窗口 ==========

#[derive(Debug, Clone, Copy)]
struct Window {
    start_msecs: f64,
    frames: u32,
}

// ========== 监控区域 ==========

/// 监控区域追踪器: 区域内所有ROI + 聚合窗口 + 结果输出
pub struct AreaTracker {
    area: MonitoredArea,
    rois: Vec<RoiTracker>,
    sink: Box<dyn ResultsSink>,
    acquisition_start: NaiveDateTime,
    window: Option<Window>,
    rows: u64,
    frames: u64,
}

impl AreaTracker {
    /// 创建追踪器
    ///
    /// # 参数
    /// - `area`: 已加载ROI的监控区域
    /// - `frame_size`: 解码帧尺寸 (ROI坐标空间)
    /// - `sink`: 结果输出
    /// - `acquisition_start`: 视频第0毫秒对应的采集时刻
    pub fn new(
        area: MonitoredArea,
        frame_size: (u32, u32),
        sink: Box<dyn ResultsSink>,
        acquisition_start: NaiveDateTime,
    ) -> Self {
        let scale = (1.0, 1.0);
        let beam = match (area.track_type, area.crossing_beam) {
            (TrackType::Crossover, CrossingBeamType::None) => CrossingBeamType::Horizontal,
            (_, beam) => beam,
        };
        let rois = area
            .rois
            .iter()
            .enumerate()
            .map(|(i, roi)| {
                RoiTracker::new(
                    RoiMask::new(roi, scale, frame_size.0, frame_size.1),
                    area.get_midline(roi, scale, beam),
                    roi.long_axis(),
                    area.is_roi_trackable(i),
                )
            })
            .collect();
        Self {
            area,
            rois,
            sink,
            acquisition_start,
            window: None,
            rows: 0,
            frames: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.area.name
    }

    pub fn area(&self) -> &MonitoredArea {
        &self.area
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// 每个ROI最近的果蝇位置
    pub fn positions(&self) -> Vec<Option<Point>> {
        self.rois.iter().map(|r| r.last_position()).collect()
    }

    /// 处理一帧前景
    pub fn process_frame(&mut self, frame_time_msecs: f64, foreground: &GrayImage) -> Result<()> {
        let aggregation = self.area.aggregation;

        // 时间型间隔: 当前帧超出窗口时先输出上一窗口, 跳过的整窗口输出空行
        if let (Some(window), Some(duration)) = (self.window, aggregation.duration_msecs()) {
            if frame_time_msecs >= window.start_msecs + duration {
                self.emit_row(window.start_msecs)?;
                let elapsed = ((frame_time_msecs - window.start_msecs) / duration).floor();
                for skipped in 1..elapsed as u64 {
                    self.emit_row(window.start_msecs + skipped as f64 * duration)?;
                }
                self.window = Some(Window {
                    start_msecs: window.start_msecs + elapsed * duration,
                    frames: 0,
                });
            }
        }

        let track_type = self.area.track_type;
        for roi in &mut self.rois {
            roi.update(foreground, track_type);
        }
        self.frames += 1;

        let window = self.window.get_or_insert(Window {
            start_msecs: frame_time_msecs,
            frames: 0,
        });
        window.frames += 1;

        if aggregation.units == IntervalUnits::Frames && window.frames >= aggregation.value.max(1) {
            let start = window.start_msecs;
            self.emit_row(start)?;
            self.window = None;
        }
        Ok(())
    }

    /// 输出未完成的窗口并刷新
    pub fn finish(&mut self) -> Result<()> {
        if let Some(window) = self.window.take() {
            if window.frames > 0 {
                self.emit_row(window.start_msecs)?;
            }
        }
        self.sink.flush()?;
        debug!("✅ {} 完成: {} 帧, {} 行", self.area.name, self.frames, self.rows);
        Ok(())
    }

    fn emit_row(&mut self, window_start_msecs: f64) -> Result<()> {
        let track_type = self.area.track_type;
        let values = self.rois.iter_mut().map(|r| r.take_value(track_type)).collect();
        self.rows += 1;
        let row = ResultRow {
            index: self.rows,
            timestamp: ResultRow::timestamp_at(self.acquisition_start, window_start_msecs),
            values,
        };
        self.sink.write_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{AggregationInterval, Roi};
    use chrono::NaiveDate;
    use image::Luma;
    use std::sync::{Arc, Mutex};

    /// 内存结果输出
    #[derive(Clone, Default)]
    struct VecSink(Arc<Mutex<Vec<ResultRow>>>);

    impl ResultsSink for VecSink {
        fn write_row(&mut self, row: &ResultRow) -> Result<()> {
            self.0.lock().unwrap().push(row.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn acq() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    /// 两根竖直管, 每根 10x50
    fn area(track_type: TrackType, aggregation: AggregationInterval) -> MonitoredArea {
        let mut area = MonitoredArea::new("Monitor0");
        area.add_roi(Roi::new([(10, 10), (10, 60), (20, 60), (20, 10)]));
        area.add_roi(Roi::new([(30, 10), (30, 60), (40, 60), (40, 10)]));
        area.track_type = track_type;
        area.crossing_beam = CrossingBeamType::Horizontal;
        area.aggregation = aggregation;
        area
    }

    /// 在 (x, y) 处放一个 3x3 的前景块
    fn foreground_with(points: &[(u32, u32)]) -> GrayImage {
        let mut fg = GrayImage::new(50, 70);
        for &(cx, cy) in points {
            for y in cy - 1..=cy + 1 {
                for x in cx - 1..=cx + 1 {
                    fg.put_pixel(x, y, Luma([255]));
                }
            }
        }
        fg
    }

    fn tracker(area: MonitoredArea) -> (AreaTracker, VecSink) {
        let sink = VecSink::default();
        let tracker = AreaTracker::new(area, (50, 70), Box::new(sink.clone()), acq());
        (tracker, sink)
    }

    #[test]
    fn test_crossings_counted_per_window() {
        let frames = AggregationInterval { value: 4, units: IntervalUnits::Frames };
        let (mut t, sink) = tracker(area(TrackType::Crossover, frames));

        // 第一根管上下穿越中线 (y=35) 三次, 第二根不动
        let ys = [20, 50, 20, 50];
        for (i, y) in ys.iter().enumerate() {
            let fg = foreground_with(&[(15, *y), (35, 20)]);
            t.process_frame(i as f64 * 40.0, &fg).unwrap();
        }
        t.finish().unwrap();

        let rows = sink.0.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![3, 0]);
        assert_eq!(rows[0].index, 1);
    }

    #[test]
    fn test_distance_and_missing_detection() {
        let frames = AggregationInterval { value: 10, units: IntervalUnits::Frames };
        let (mut t, sink) = tracker(area(TrackType::Distance, frames));

        t.process_frame(0.0, &foreground_with(&[(15, 20)])).unwrap();
        t.process_frame(40.0, &foreground_with(&[])).unwrap(); // 未检测到
        t.process_frame(80.0, &foreground_with(&[(15, 30)])).unwrap();
        t.process_frame(120.0, &foreground_with(&[(15, 34)])).unwrap();
        t.finish().unwrap();

        let rows = sink.0.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![14, 0]);
        assert_eq!(t.positions()[0], Some(Point::new(15.0, 34.0)));
    }

    #[test]
    fn test_time_windows_and_timestamps() {
        let seconds = AggregationInterval { value: 1, units: IntervalUnits::Seconds };
        let (mut t, sink) = tracker(area(TrackType::Crossover, seconds));

        // 每 250ms 一帧, 共 2.5 秒
        for i in 0..10 {
            let y = if i % 2 == 0 { 20 } else { 50 };
            t.process_frame(i as f64 * 250.0, &foreground_with(&[(15, y)])).unwrap();
        }
        t.finish().unwrap();

        let rows = sink.0.lock().unwrap();
        let values: Vec<i64> = rows.iter().map(|r| r.values[0]).collect();
        // 窗口 [0,1000): 4帧 3次穿越; [1000,2000): 4帧 4次; [2000,2500): 2帧 2次
        assert_eq!(values, vec![3, 4, 2]);
        assert_eq!(rows[1].timestamp.format("%H:%M:%S").to_string(), "10:00:01");
        assert_eq!(rows[2].index, 3);
    }

    #[test]
    fn test_frame_gap_fills_skipped_windows() {
        let seconds = AggregationInterval { value: 1, units: IntervalUnits::Seconds };
        let (mut t, sink) = tracker(area(TrackType::Crossover, seconds));

        t.process_frame(0.0, &foreground_with(&[(15, 20)])).unwrap();
        t.process_frame(500.0, &foreground_with(&[(15, 50)])).unwrap();
        // 丢帧: 下一帧落在 [3000,4000)
        t.process_frame(3200.0, &foreground_with(&[(15, 20)])).unwrap();
        t.finish().unwrap();

        let rows = sink.0.lock().unwrap();
        let times: Vec<String> = rows
            .iter()
            .map(|r| r.timestamp.format("%H:%M:%S").to_string())
            .collect();
        assert_eq!(times, vec!["10:00:00", "10:00:01", "10:00:02", "10:00:03"]);
        let values: Vec<i64> = rows.iter().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![1, 0, 0, 1]);
        let indices: Vec<u64> = rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_roi_filter_reports_zero() {
        let frames = AggregationInterval { value: 2, units: IntervalUnits::Frames };
        let mut a = area(TrackType::Crossover, frames);
        a.roi_filter = [2].into_iter().collect();
        let (mut t, sink) = tracker(a);

        t.process_frame(0.0, &foreground_with(&[(15, 20), (35, 20)])).unwrap();
        t.process_frame(40.0, &foreground_with(&[(15, 50), (35, 50)])).unwrap();
        t.finish().unwrap();

        let rows = sink.0.lock().unwrap();
        assert_eq!(rows[0].values, vec![0, 1]);
    }

    #[test]
    fn test_position_along_tube() {
        let frames = AggregationInterval { value: 1, units: IntervalUnits::Frames };
        let (mut t, sink) = tracker(area(TrackType::Position, frames));

        t.process_frame(0.0, &foreground_with(&[(15, 40), (35, 12)])).unwrap();
        t.finish().unwrap();

        let rows = sink.0.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![30, 2]);
    }

    #[test]
    fn test_crossover_without_beam_defaults_to_horizontal() {
        let frames = AggregationInterval { value: 2, units: IntervalUnits::Frames };
        let mut a = area(TrackType::Crossover, frames);
        a.crossing_beam = CrossingBeamType::None;
        let (mut t, sink) = tracker(a);

        t.process_frame(0.0, &foreground_with(&[(15, 20)])).unwrap();
        t.process_frame(40.0, &foreground_with(&[(15, 50)])).unwrap();
        t.finish().unwrap();

        assert_eq!(sink.0.lock().unwrap()[0].values, vec![1, 0]);
    }
}
