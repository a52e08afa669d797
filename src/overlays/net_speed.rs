//! Network speed overlay
//!
//! Shows the latest upload and download rates as two left-aligned lines on a
//! translucent rounded panel.

use tracing::{debug, info, warn};

use crate::config::OverlaySettings;
use crate::manager::OverlayWindow;
use crate::platform::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, primary_monitor};
use crate::sampler::RateSample;
use crate::utils::{color_from_rgba, format_rate};

/// The two lines currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub upload_line: String,
    pub download_line: String,
}

impl DisplayState {
    pub fn from_sample(sample: &RateSample) -> Self {
        Self {
            upload_line: format!("U: {}", format_rate(sample.upload_bytes_per_sec)),
            download_line: format!("D: {}", format_rate(sample.download_bytes_per_sec)),
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::from_sample(&RateSample::default())
    }
}

pub struct NetSpeedOverlay<P: OverlayPlatform> {
    window: OverlayWindow<P>,
    settings: OverlaySettings,
    display: DisplayState,
    needs_render: bool,
}

impl<P: OverlayPlatform> NetSpeedOverlay<P> {
    /// Create the window in the bottom-right corner of the primary monitor
    pub fn new(settings: OverlaySettings, monitors: &[MonitorInfo]) -> Result<Self, PlatformError> {
        let config = Self::window_config(&settings, monitors);
        let window = OverlayWindow::<P>::new(config, &settings.font_family)?;
        let platform = window.platform();
        info!(
            x = platform.x(),
            y = platform.y(),
            width = platform.width(),
            height = platform.height(),
            "Network speed overlay created"
        );
        Ok(Self::with_window(window, settings))
    }

    pub fn with_window(window: OverlayWindow<P>, settings: OverlaySettings) -> Self {
        Self {
            window,
            settings,
            display: DisplayState::default(),
            needs_render: true,
        }
    }

    /// Window geometry for `settings`, anchored to the primary monitor.
    /// Falls back to the virtual-screen origin when no monitor is reported.
    pub fn window_config(settings: &OverlaySettings, monitors: &[MonitorInfo]) -> OverlayConfig {
        let (x, y) = match primary_monitor(monitors) {
            Some(monitor) => {
                let pos = monitor.anchor_bottom_right(
                    settings.width,
                    settings.height,
                    settings.right_margin,
                    settings.bottom_margin,
                );
                debug!(
                    monitor = %monitor.id,
                    screen_width = monitor.width,
                    screen_height = monitor.height,
                    x = pos.0,
                    y = pos.1,
                    "Anchored overlay"
                );
                pos
            }
            None => {
                warn!("No monitors reported, placing overlay at the screen origin");
                (0, 0)
            }
        };

        OverlayConfig {
            x,
            y,
            width: settings.width,
            height: settings.height,
            click_through: settings.click_through,
            ..Default::default()
        }
    }

    /// Replace the displayed rates and schedule a repaint
    pub fn on_sample(&mut self, sample: &RateSample) {
        self.display = DisplayState::from_sample(sample);
        self.needs_render = true;
    }

    /// Paint the panel into the back buffer, then present it in one blit
    pub fn render(&mut self) {
        let width = self.window.width() as f32;
        let height = self.window.height() as f32;
        let s = &self.settings;

        let font_size = s.font_size;
        let x = s.padding_left as f32;
        let upload_y = s.padding_top as f32 + font_size;
        let download_y = upload_y + font_size * 1.2 + s.line_spacing as f32;
        let text_color = color_from_rgba(s.text_color);

        self.window.clear(tiny_skia::Color::TRANSPARENT);
        self.window.fill_rounded_rect(
            0.0,
            0.0,
            width,
            height,
            s.corner_radius,
            color_from_rgba(s.background),
        );
        self.window
            .draw_text(&self.display.upload_line, x, upload_y, font_size, text_color);
        self.window
            .draw_text(&self.display.download_line, x, download_y, font_size, text_color);

        self.window.present();
        self.needs_render = false;
    }

    /// Render if a sample arrived or the windowing system asked for a repaint.
    /// Returns whether a frame was presented.
    pub fn render_if_needed(&mut self) -> bool {
        let os_requested = self.window.take_redraw_requested();
        if self.needs_render || os_requested {
            self.render();
            return true;
        }
        false
    }

    /// Non-blocking; false once the window has been closed
    pub fn poll_events(&mut self) -> bool {
        self.window.poll_events()
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Borrow the platform window, e.g. for stacking requests
    pub fn platform(&self) -> &P {
        self.window.platform()
    }

    #[cfg(test)]
    pub(crate) fn frame(&self) -> &[u8] {
        self.window.back_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HeadlessOverlay;

    fn primary_1080p() -> Vec<MonitorInfo> {
        vec![MonitorInfo {
            id: "primary".to_string(),
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
            is_primary: true,
        }]
    }

    fn overlay() -> NetSpeedOverlay<HeadlessOverlay> {
        NetSpeedOverlay::new(OverlaySettings::default(), &primary_1080p()).unwrap()
    }

    fn alpha_at(frame: &[u8], width: u32, x: u32, y: u32) -> u8 {
        frame[((y * width + x) * 4 + 3) as usize]
    }

    #[test]
    fn test_window_placed_bottom_right() {
        let overlay = overlay();
        let config = overlay.platform().config();
        assert_eq!((config.x, config.y), (1540, 1034));
        assert_eq!((config.width, config.height), (120, 46));
        assert!(!config.click_through);
    }

    #[test]
    fn test_window_falls_back_to_origin_without_monitors() {
        let config =
            NetSpeedOverlay::<HeadlessOverlay>::window_config(&OverlaySettings::default(), &[]);
        assert_eq!((config.x, config.y), (0, 0));
    }

    #[test]
    fn test_initial_display_shows_zero() {
        let overlay = overlay();
        assert_eq!(overlay.display().upload_line, "U: 0.00 B/S");
        assert_eq!(overlay.display().download_line, "D: 0.00 B/S");
        assert!(overlay.needs_render());
    }

    #[test]
    fn test_on_sample_formats_and_requests_redraw() {
        let mut overlay = overlay();
        overlay.render();
        assert!(!overlay.needs_render());

        overlay.on_sample(&RateSample {
            upload_bytes_per_sec: 2048.0,
            download_bytes_per_sec: 512.0,
        });

        assert_eq!(
            overlay.display(),
            &DisplayState {
                upload_line: "U: 2.00 KB/S".to_string(),
                download_line: "D: 512.00 B/S".to_string(),
            }
        );
        assert!(overlay.needs_render());
    }

    #[test]
    fn test_render_commits_one_full_frame() {
        let mut overlay = overlay();
        overlay.render();

        let platform = overlay.platform();
        assert_eq!(platform.commits(), 1);
        assert_eq!(platform.last_frame().len(), 120 * 46 * 4);
        assert_eq!(platform.last_frame(), overlay.frame());
    }

    #[test]
    fn test_render_draws_translucent_rounded_panel() {
        let mut overlay = overlay();
        overlay.render();

        let frame = overlay.platform().last_frame();
        assert_eq!(alpha_at(frame, 120, 0, 0), 0);
        assert_eq!(alpha_at(frame, 120, 119, 0), 0);
        assert_eq!(alpha_at(frame, 120, 0, 45), 0);
        assert_eq!(alpha_at(frame, 120, 119, 45), 0);
        // Right of the text, inside the panel
        assert!(alpha_at(frame, 120, 110, 23) > 0);
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut overlay = overlay();
        overlay.on_sample(&RateSample {
            upload_bytes_per_sec: 1_500_000.0,
            download_bytes_per_sec: 3000.0,
        });
        overlay.render();
        let first = overlay.platform().last_frame().to_vec();
        overlay.render();
        assert_eq!(overlay.platform().last_frame(), first.as_slice());
        assert_eq!(overlay.platform().commits(), 2);
    }

    #[test]
    fn test_render_if_needed_honours_os_repaint() {
        let mut overlay = overlay();
        assert!(overlay.render_if_needed());
        assert!(!overlay.render_if_needed());

        overlay.platform().request_redraw();
        assert!(overlay.render_if_needed());
        assert_eq!(overlay.platform().commits(), 2);
    }
}
