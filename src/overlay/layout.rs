use crate::platform::Rect;

pub const CELL_PADDING: f64 = 12.0;
pub const CELL_GAP: f64 = 8.0;
pub const PANEL_PADDING: f64 = 18.0;
pub const LABEL_HEIGHT: f64 = 22.0;
/// Share of the monitor the panel may cover.
const MAX_SCREEN_FRACTION: f64 = 0.9;

/// Panel geometry for one show. Cell rects are relative to the panel's
/// top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelLayout {
    pub frame: Rect,
    pub columns: usize,
    pub count: usize,
    pub cell_width: f64,
    pub cell_height: f64,
}

pub fn cell_size(icon_size: u32) -> (f64, f64) {
    let icon = f64::from(icon_size);
    (icon + CELL_PADDING * 2.0, icon + CELL_PADDING * 2.0 + LABEL_HEIGHT)
}

/// Largest thumbnail that fits inside one cell.
pub fn preview_size(icon_size: u32) -> (u32, u32) {
    (icon_size.max(1), icon_size.max(1))
}

pub fn column_count(count: usize, icon_size: u32, monitor: &Rect) -> usize {
    let count = count.max(1);
    let (cell_w, _) = cell_size(icon_size);
    let usable = monitor.width * MAX_SCREEN_FRACTION - PANEL_PADDING * 2.0;
    let fit = ((usable + CELL_GAP) / (cell_w + CELL_GAP)).floor();
    let fit = if fit.is_finite() && fit >= 1.0 { fit as usize } else { 1 };
    count.min(fit)
}

/// Sizes the panel for `count` entries and centers it on `monitor`.
pub fn panel_layout(count: usize, icon_size: u32, monitor: &Rect) -> PanelLayout {
    let columns = column_count(count, icon_size, monitor);
    let rows = count.max(1).div_ceil(columns);
    let (cell_w, cell_h) = cell_size(icon_size);

    let width = PANEL_PADDING * 2.0 + columns as f64 * cell_w + columns.saturating_sub(1) as f64 * CELL_GAP;
    let height = PANEL_PADDING * 2.0 + rows as f64 * cell_h + rows.saturating_sub(1) as f64 * CELL_GAP;
    let height = height.min(monitor.height * MAX_SCREEN_FRACTION);

    PanelLayout {
        frame: monitor.centered(width, height),
        columns,
        count,
        cell_width: cell_w,
        cell_height: cell_h,
    }
}

impl PanelLayout {
    pub fn cell_rect(&self, index: usize) -> Option<Rect> {
        if index >= self.count {
            return None;
        }
        let col = index % self.columns;
        let row = index / self.columns;
        Some(Rect::new(
            PANEL_PADDING + col as f64 * (self.cell_width + CELL_GAP),
            PANEL_PADDING + row as f64 * (self.cell_height + CELL_GAP),
            self.cell_width,
            self.cell_height,
        ))
    }

    /// Entry under a panel-local point; gaps and padding hit nothing.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<usize> {
        if x < PANEL_PADDING || y < PANEL_PADDING {
            return None;
        }
        let col = ((x - PANEL_PADDING) / (self.cell_width + CELL_GAP)).floor() as usize;
        let row = ((y - PANEL_PADDING) / (self.cell_height + CELL_GAP)).floor() as usize;
        if col >= self.columns {
            return None;
        }
        let index = row * self.columns + col;
        self.cell_rect(index)
            .filter(|cell| cell.contains(x, y))
            .map(|_| index)
    }
}
