//! Monitor enumeration.

use tracing::{debug, instrument};

use gifcap_ipc::MonitorDescriptor;

use crate::CaptureResult;

/// Source of the current monitor layout.
///
/// Layouts are queried at capture time, never cached across sessions.
pub trait MonitorSource: Send + Sync {
    /// Enumerate the monitors of the virtual desktop.
    fn monitors(&self) -> CaptureResult<Vec<MonitorDescriptor>>;
}

/// Monitor source backed by the window system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMonitors;

impl MonitorSource for SystemMonitors {
    fn monitors(&self) -> CaptureResult<Vec<MonitorDescriptor>> {
        enumerate_monitors()
    }
}

/// A fixed monitor list.
#[derive(Debug, Clone)]
pub struct StaticMonitors(pub Vec<MonitorDescriptor>);

impl MonitorSource for StaticMonitors {
    fn monitors(&self) -> CaptureResult<Vec<MonitorDescriptor>> {
        Ok(self.0.clone())
    }
}

/// Enumerate all available monitors.
#[instrument(name = "enumerate_monitors")]
pub fn enumerate_monitors() -> CaptureResult<Vec<MonitorDescriptor>> {
    let monitors = platform::enumerate()?;
    debug!(count = monitors.len(), "Enumerated monitors");
    Ok(monitors)
}

/// Opt the process into per-monitor DPI awareness so that monitor bounds
/// and grabs are reported in physical pixels.
pub fn enable_dpi_awareness() {
    platform::enable_dpi_awareness();
}

#[cfg(windows)]
mod platform {
    use tracing::{debug, warn};
    use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW,
    };
    use windows::Win32::UI::HiDpi::{
        GetDpiForMonitor, SetProcessDpiAwarenessContext,
        DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, MDT_EFFECTIVE_DPI,
    };

    use gifcap_ipc::MonitorDescriptor;

    use crate::error::CaptureError;
    use crate::CaptureResult;

    const MONITORINFOF_PRIMARY: u32 = 1;
    const BASE_DPI: f64 = 96.0;

    pub(super) fn enumerate() -> CaptureResult<Vec<MonitorDescriptor>> {
        let mut monitors: Vec<MonitorDescriptor> = Vec::new();

        unsafe {
            EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_monitor_callback),
                LPARAM(&mut monitors as *mut Vec<MonitorDescriptor> as isize),
            )
            .ok()
            .map_err(|_| CaptureError::WindowsApi {
                message: "Failed to enumerate monitors".to_string(),
                source: None,
            })?;
        }

        Ok(monitors)
    }

    pub(super) fn enable_dpi_awareness() {
        let result =
            unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
        debug!(?result, "Requested per-monitor DPI awareness");
    }

    unsafe extern "system" fn enum_monitor_callback(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let monitors = &mut *(lparam.0 as *mut Vec<MonitorDescriptor>);

        let mut monitor_info = MONITORINFOEXW::default();
        monitor_info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(hmonitor, &mut monitor_info.monitorInfo).as_bool() {
            let name = String::from_utf16_lossy(
                &monitor_info.szDevice[..monitor_info
                    .szDevice
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(monitor_info.szDevice.len())],
            );

            let rect = monitor_info.monitorInfo.rcMonitor;
            let scale = monitor_scale(hmonitor);

            let mut descriptor = MonitorDescriptor::new(
                rect.left,
                rect.top,
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
                scale,
            )
            .named(name);
            if monitor_info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0 {
                descriptor = descriptor.primary();
            }

            monitors.push(descriptor);
        }

        BOOL::from(true)
    }

    unsafe fn monitor_scale(hmonitor: HMONITOR) -> f64 {
        let mut dpi_x = 0u32;
        let mut dpi_y = 0u32;
        match GetDpiForMonitor(hmonitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) {
            Ok(()) if dpi_x > 0 => dpi_x as f64 / BASE_DPI,
            Ok(()) => 1.0,
            Err(e) => {
                warn!("GetDpiForMonitor failed: {}", e);
                1.0
            }
        }
    }
}

#[cfg(all(not(windows), feature = "xcap"))]
mod platform {
    use tracing::debug;
    use xcap::Monitor;

    use gifcap_ipc::MonitorDescriptor;

    use crate::error::CaptureError;
    use crate::CaptureResult;

    pub(super) fn enumerate() -> CaptureResult<Vec<MonitorDescriptor>> {
        let monitors = Monitor::all().map_err(|e| CaptureError::Grab(e.to_string()))?;

        Ok(monitors
            .iter()
            .map(|monitor| {
                let mut descriptor = MonitorDescriptor::new(
                    monitor.x().unwrap_or(0),
                    monitor.y().unwrap_or(0),
                    monitor.width().unwrap_or(0),
                    monitor.height().unwrap_or(0),
                    monitor.scale_factor().unwrap_or(1.0) as f64,
                )
                .named(monitor.name().unwrap_or_default());
                if monitor.is_primary().unwrap_or(false) {
                    descriptor = descriptor.primary();
                }
                descriptor
            })
            .collect())
    }

    pub(super) fn enable_dpi_awareness() {
        debug!("DPI awareness is managed by the display server");
    }
}

#[cfg(all(not(windows), not(feature = "xcap")))]
mod platform {
    use gifcap_ipc::MonitorDescriptor;

    use crate::error::CaptureError;
    use crate::CaptureResult;

    pub(super) fn enumerate() -> CaptureResult<Vec<MonitorDescriptor>> {
        Err(CaptureError::NotSupported(
            "Monitor enumeration requires Windows or the `xcap` feature".into(),
        ))
    }

    pub(super) fn enable_dpi_awareness() {}
}
