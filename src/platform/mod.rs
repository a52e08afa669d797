//! Platform abstraction for the overlay window
//!
//! Every backend provides a borderless, translucent, non-activating surface
//! that stays above normal windows. Rendering happens elsewhere into an RGBA
//! buffer; a backend only has to blit finished frames and answer stacking
//! requests.

use thiserror::Error;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

/// One output as reported by the windowing system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Platform-specific identifier (output name, device name, screen index)
    pub id: String,
    /// Left edge in virtual-desktop coordinates
    pub x: i32,
    /// Top edge in virtual-desktop coordinates
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    pub is_primary: bool,
}

impl MonitorInfo {
    /// Top-left corner for a `width`×`height` window anchored to the
    /// bottom-right of this monitor, inset by the given margins.
    ///
    /// The result never leaves the monitor's top-left bound, so an oversized
    /// margin pins the window to the monitor origin instead of off-screen.
    pub fn anchor_bottom_right(
        &self,
        width: u32,
        height: u32,
        right_margin: u32,
        bottom_margin: u32,
    ) -> (i32, i32) {
        let x = self.x as i64 + self.width as i64 - width as i64 - right_margin as i64;
        let y = self.y as i64 + self.height as i64 - height as i64 - bottom_margin as i64;
        (
            x.max(self.x as i64) as i32,
            y.max(self.y as i64) as i32,
        )
    }
}

/// Pick the primary monitor, falling back to the first one reported
pub fn primary_monitor(monitors: &[MonitorInfo]) -> Option<&MonitorInfo> {
    monitors.iter().find(|m| m.is_primary).or(monitors.first())
}

/// Geometry and behaviour of the window to create
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Absolute X position (virtual screen coordinates)
    pub x: i32,
    /// Absolute Y position (virtual screen coordinates)
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Window title / class name used for window rules
    pub namespace: String,
    /// Whether pointer input passes through the overlay
    pub click_through: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 120,
            height: 46,
            namespace: "netspeed-overlay".to_string(),
            click_through: false,
        }
    }
}

/// Errors raised by windowing-system calls
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("buffer error: {0}")]
    BufferError(String),
    #[error("platform error: {0}")]
    Other(String),
}

/// A native overlay surface
pub trait OverlayPlatform: Sized {
    /// Create and show the overlay window without activating it
    fn new(config: OverlayConfig) -> Result<Self, PlatformError>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn x(&self) -> i32;

    fn y(&self) -> i32;

    /// Transfer a finished frame to the visible surface in one operation.
    ///
    /// `rgba` holds premultiplied RGBA pixels, `width * height * 4` bytes.
    fn commit(&mut self, rgba: &[u8]);

    /// Ask the windowing system to stack the overlay above all other windows
    /// without moving, resizing or activating it. Safe to call repeatedly.
    fn raise_topmost(&self) -> Result<(), PlatformError>;

    /// Drain pending windowing-system events without blocking.
    /// `false` once the window is gone.
    fn poll_events(&mut self) -> bool;

    /// Whether the windowing system asked for a repaint since the last call
    /// (clears the flag)
    fn take_redraw_requested(&mut self) -> bool;
}

/// Backend for the build target
#[cfg(all(unix, not(target_os = "macos")))]
pub use x11::X11Overlay as NativeOverlay;

#[cfg(target_os = "windows")]
pub use windows::WindowsOverlay as NativeOverlay;

#[cfg(target_os = "macos")]
pub use macos::MacOSOverlay as NativeOverlay;

/// Enumerate outputs before any overlay window exists
#[cfg(all(unix, not(target_os = "macos")))]
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    x11::get_all_monitors()
}

#[cfg(target_os = "windows")]
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    windows::get_all_monitors()
}

#[cfg(target_os = "macos")]
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    macos::get_all_monitors()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(id: &str, x: i32, width: u32, is_primary: bool) -> MonitorInfo {
        MonitorInfo {
            id: id.to_string(),
            x,
            y: 0,
            width,
            height: 1080,
            is_primary,
        }
    }

    #[test]
    fn anchors_to_bottom_right_with_margin() {
        let m = monitor("DP-1", 0, 1920, true);
        assert_eq!(m.anchor_bottom_right(120, 46, 260, 0), (1540, 1034));
    }

    #[test]
    fn anchor_respects_monitor_offset() {
        let m = monitor("HDMI-1", 1920, 1280, true);
        assert_eq!(m.anchor_bottom_right(120, 46, 260, 10), (2820, 1024));
    }

    #[test]
    fn anchor_clamps_to_monitor_origin() {
        let m = monitor("tiny", 100, 200, true);
        assert_eq!(m.anchor_bottom_right(120, 46, 260, 2000), (100, 0));
    }

    #[test]
    fn primary_monitor_prefers_flag_then_first() {
        let monitors = vec![monitor("a", 0, 1920, false), monitor("b", 1920, 1920, true)];
        assert_eq!(primary_monitor(&monitors).map(|m| m.id.as_str()), Some("b"));

        let monitors = vec![monitor("a", 0, 1920, false), monitor("b", 1920, 1920, false)];
        assert_eq!(primary_monitor(&monitors).map(|m| m.id.as_str()), Some("a"));

        assert!(primary_monitor(&[]).is_none());
    }
}
