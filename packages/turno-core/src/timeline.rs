/// Timeline geometry: where each run's bar sits on a 12-hour axis.
///
/// Percentages are relative to the lane width; vertical positions are pixels.
/// Bars on one lane stack top to bottom in stored order.
use std::collections::BTreeMap;

use crate::report::validation::parse_time;
use crate::types::{LineId, RunData, ShiftWindow, WINDOW_MINUTES};

const LANE_BASE_HEIGHT_PX: u32 = 40;
const BAR_TOP_OFFSET_PX: u32 = 8;
const BAR_STRIDE_PX: u32 = 28;
const MIN_WIDTH_PCT: f64 = 1.0;

/// Hours labelled on the axis, in display order.
pub fn axis_hours(window: ShiftWindow) -> Vec<u32> {
    let start = window.start_hour();
    (0..12).map(|i| (start + i) % 24).collect()
}

/// Axis label; compact labels are used on narrow screens.
pub fn axis_label(hour: u32, compact: bool) -> String {
    if compact {
        hour.to_string()
    } else {
        format!("{:02}:00", hour)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub left_pct: f64,
    pub width_pct: f64,
}

/// Horizontal placement of a run, or `None` when a time does not parse.
/// Positions are clamped to the window; width never drops below 1%.
pub fn place_bar(window: ShiftWindow, start: &str, end: &str) -> Option<BarGeometry> {
    let start = window.offset(parse_time(start).ok()?).clamp(0, WINDOW_MINUTES);
    let end = window.offset(parse_time(end).ok()?).clamp(0, WINDOW_MINUTES);

    let span = WINDOW_MINUTES as f64;
    let left_pct = start as f64 / span * 100.0;
    let width_pct = ((end - start) as f64 / span * 100.0).max(MIN_WIDTH_PCT);
    Some(BarGeometry { left_pct, width_pct })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBar {
    pub run: RunData,
    pub geometry: BarGeometry,
    pub top_px: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaneLayout {
    pub line: LineId,
    pub bars: Vec<PlacedBar>,
    pub height_px: u32,
}

/// Lane height for a number of stacked bars.
pub fn lane_height(bars: usize) -> u32 {
    match bars {
        0 => LANE_BASE_HEIGHT_PX,
        n => LANE_BASE_HEIGHT_PX + (n as u32 - 1) * BAR_STRIDE_PX,
    }
}

/// Group runs by line (ascending) and stack each lane's bars. Runs whose
/// times do not parse are skipped.
pub fn layout_lanes(window: ShiftWindow, runs: &[RunData]) -> Vec<LaneLayout> {
    let mut lanes: BTreeMap<LineId, Vec<PlacedBar>> = BTreeMap::new();

    for run in runs {
        let Some(geometry) = place_bar(window, &run.start, &run.end) else {
            log::debug!(
                "[turno.timeline] Skipping run with unreadable times {}-{}",
                run.start,
                run.end
            );
            continue;
        };
        let bars = lanes.entry(run.line.clone()).or_default();
        let top_px = BAR_TOP_OFFSET_PX + bars.len() as u32 * BAR_STRIDE_PX;
        bars.push(PlacedBar {
            run: run.clone(),
            geometry,
            top_px,
        });
    }

    lanes
        .into_iter()
        .map(|(line, bars)| LaneLayout {
            height_px: lane_height(bars.len()),
            line,
            bars,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_axis_hours_per_window() {
        assert_eq!(axis_hours(ShiftWindow::Day), (6..18).collect::<Vec<_>>());
        let night = axis_hours(ShiftWindow::Night);
        assert_eq!(night.first(), Some(&18));
        assert_eq!(night.last(), Some(&5));
        assert_eq!(axis_label(6, false), "06:00");
        assert_eq!(axis_label(6, true), "6");
    }

    #[test]
    fn test_day_bar_geometry() {
        let bar = place_bar(ShiftWindow::Day, "09:00", "12:00").unwrap();
        assert!(approx(bar.left_pct, 25.0));
        assert!(approx(bar.width_pct, 25.0));
    }

    #[test]
    fn test_night_bar_crosses_midnight() {
        let bar = place_bar(ShiftWindow::Night, "23:00", "02:00").unwrap();
        assert!(approx(bar.left_pct, 300.0 / 720.0 * 100.0));
        assert!(approx(bar.width_pct, 25.0));
        let full = place_bar(ShiftWindow::Night, "18:00", "06:00").unwrap();
        assert!(approx(full.width_pct, 100.0));
    }

    #[test]
    fn test_tiny_bar_keeps_minimum_width() {
        let bar = place_bar(ShiftWindow::Day, "10:00", "10:01").unwrap();
        assert!(approx(bar.width_pct, 1.0));
        assert!(place_bar(ShiftWindow::Day, "bad", "10:00").is_none());
    }

    #[test]
    fn test_lanes_stack_bars() {
        let runs = vec![
            RunData::new("2", "06:00", "08:00", "A"),
            RunData::new("1", "06:00", "07:00", "B"),
            RunData::new("2", "09:00", "10:00", "C"),
        ];
        let lanes = layout_lanes(ShiftWindow::Day, &runs);
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].line, LineId::new("1"));
        assert_eq!(lanes[0].height_px, 40);
        assert_eq!(lanes[1].bars[0].top_px, 8);
        assert_eq!(lanes[1].bars[1].top_px, 36);
        assert_eq!(lanes[1].height_px, 68);
        assert_eq!(lane_height(0), 40);
    }
}
