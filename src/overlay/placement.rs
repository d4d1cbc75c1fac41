use crate::platform::Rect;

pub const FALLBACK_MONITOR: Rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);

pub fn monitor_for_point(monitors: &[Rect], x: f64, y: f64) -> Option<Rect> {
    monitors.iter().find(|m| m.contains(x, y)).copied()
}

/// The monitor under the cursor, else the first one reported.
pub fn active_monitor(monitors: &[Rect], cursor: Option<(f64, f64)>) -> Rect {
    cursor
        .and_then(|(x, y)| monitor_for_point(monitors, x, y))
        .or_else(|| monitors.first().copied())
        .unwrap_or(FALLBACK_MONITOR)
}
