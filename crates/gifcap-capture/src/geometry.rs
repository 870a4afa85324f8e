//! Mapping of logical selections to physical capture regions.

use tracing::{debug, instrument};

use gifcap_ipc::{CaptureRegion, MonitorDescriptor, SelectionRect};

use crate::error::CaptureError;
use crate::CaptureResult;

/// A snapshot of the monitor layout of the virtual desktop.
#[derive(Debug, Clone)]
pub struct MonitorLayout {
    monitors: Vec<MonitorDescriptor>,
    primary: usize,
    bounds: DesktopBounds,
}

/// Union bounding box of all monitors, physical pixels, exclusive right/bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DesktopBounds {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

impl MonitorLayout {
    /// Build a layout from enumerated monitors.
    ///
    /// The primary monitor is the one flagged as primary, or the first.
    pub fn new(monitors: Vec<MonitorDescriptor>) -> CaptureResult<Self> {
        let first = monitors.first().ok_or(CaptureError::NoMonitors)?;

        let mut bounds = DesktopBounds {
            left: first.left as i64,
            top: first.top as i64,
            right: first.left as i64 + first.width as i64,
            bottom: first.top as i64 + first.height as i64,
        };
        for m in &monitors[1..] {
            bounds.left = bounds.left.min(m.left as i64);
            bounds.top = bounds.top.min(m.top as i64);
            bounds.right = bounds.right.max(m.left as i64 + m.width as i64);
            bounds.bottom = bounds.bottom.max(m.top as i64 + m.height as i64);
        }

        let primary = monitors.iter().position(|m| m.is_primary).unwrap_or(0);

        for (index, m) in monitors.iter().enumerate() {
            debug!(
                index,
                name = %m.name,
                left = m.left,
                top = m.top,
                width = m.width,
                height = m.height,
                scale = m.scale_factor,
                primary = index == primary,
                "Monitor"
            );
        }

        Ok(Self {
            monitors,
            primary,
            bounds,
        })
    }

    /// All monitors in enumeration order.
    pub fn monitors(&self) -> &[MonitorDescriptor] {
        &self.monitors
    }

    /// The primary monitor.
    pub fn primary(&self) -> &MonitorDescriptor {
        &self.monitors[self.primary]
    }

    /// The union bounding box of all monitors.
    pub fn virtual_bounds(&self) -> CaptureRegion {
        CaptureRegion::new(
            self.bounds.left as i32,
            self.bounds.top as i32,
            (self.bounds.right - self.bounds.left) as u32,
            (self.bounds.bottom - self.bounds.top) as u32,
        )
    }

    /// The monitor whose logical bounds contain the point, or the primary.
    pub fn monitor_at(&self, x: i64, y: i64) -> &MonitorDescriptor {
        self.monitors
            .iter()
            .find(|m| m.contains_logical(x, y))
            .unwrap_or_else(|| self.primary())
    }

    /// Resolve a logical selection to a physical capture region.
    ///
    /// A missing or empty selection records the whole primary monitor. The
    /// selection is shrunk by `inset_pixels` on every side, converted to
    /// physical pixels with the scale factor of the monitor containing its
    /// origin, then moved inside the virtual desktop.
    #[instrument(name = "resolve_region", skip(self))]
    pub fn resolve(&self, selection: Option<SelectionRect>, inset_pixels: u32) -> CaptureRegion {
        let selection = match selection.map(|s| s.normalized()) {
            Some(s) if !s.is_empty() => s,
            _ => {
                debug!("No selection, using primary monitor bounds");
                self.primary().logical_bounds()
            }
        };

        let (x, y, width, height) = inset(&selection, inset_pixels);
        let monitor = self.monitor_at(x, y);
        let scale = monitor.scale_factor;

        // Monitor origins are already physical; only the offset inside the
        // monitor and the size are scaled.
        let left = monitor.left as i64 + ((x - monitor.left as i64) as f64 * scale).round() as i64;
        let top = monitor.top as i64 + ((y - monitor.top as i64) as f64 * scale).round() as i64;
        let width = ((width as f64 * scale).round() as i64).max(1);
        let height = ((height as f64 * scale).round() as i64).max(1);

        debug!(
            monitor = %monitor.name,
            scale,
            left,
            top,
            width,
            height,
            "Mapped selection to physical pixels"
        );

        let (left, width) = clamp_axis(left, width, self.bounds.left, self.bounds.right);
        let (top, height) = clamp_axis(top, height, self.bounds.top, self.bounds.bottom);

        let region = CaptureRegion::new(
            saturate_i32(left),
            saturate_i32(top),
            width.clamp(0, u32::MAX as i64) as u32,
            height.clamp(0, u32::MAX as i64) as u32,
        );
        debug!(?region, "Resolved capture region");
        region
    }
}

/// Resolve a selection without any monitor information.
///
/// Used when enumeration fails: the inset is applied and logical units are
/// taken as physical pixels.
pub fn resolve_unscaled(selection: SelectionRect, inset_pixels: u32) -> CaptureRegion {
    let (x, y, width, height) = inset(&selection.normalized(), inset_pixels);
    CaptureRegion::new(
        saturate_i32(x),
        saturate_i32(y),
        width.min(u32::MAX as i64) as u32,
        height.min(u32::MAX as i64) as u32,
    )
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn inset(selection: &SelectionRect, inset_pixels: u32) -> (i64, i64, i64, i64) {
    let p = inset_pixels as i64;
    (
        selection.x as i64 + p,
        selection.y as i64 + p,
        (selection.width as i64 - 2 * p).max(1),
        (selection.height as i64 - 2 * p).max(1),
    )
}

/// Move a span inside `[min, max)`, shrinking it only if it cannot fit.
fn clamp_axis(mut start: i64, len: i64, min: i64, max: i64) -> (i64, i64) {
    let len = len.min(max - min).max(1);
    if start < min {
        start = min;
    }
    if start + len > max {
        start = min.max(max - len);
    }
    (start, len)
}
