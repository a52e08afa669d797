//! Overlay window: a platform surface paired with a renderer and back buffer
//!
//! Drawing calls only ever touch the back buffer. Nothing reaches the screen
//! until `present` hands the finished frame to the platform in one blit.

use tiny_skia::Color;

use crate::platform::{OverlayConfig, OverlayPlatform, PlatformError};
use crate::renderer::Renderer;

pub struct OverlayWindow<P: OverlayPlatform> {
    platform: P,
    renderer: Renderer,
    back_buffer: Vec<u8>,
}

impl<P: OverlayPlatform> OverlayWindow<P> {
    /// Create and show the platform window
    pub fn new(config: OverlayConfig, font_family: &str) -> Result<Self, PlatformError> {
        let platform = P::new(config)?;
        Ok(Self::with_platform(platform, Renderer::new(font_family)))
    }

    pub fn with_platform(platform: P, renderer: Renderer) -> Self {
        let back_buffer = Renderer::create_buffer(platform.width(), platform.height());
        Self {
            platform,
            renderer,
            back_buffer,
        }
    }

    pub fn width(&self) -> u32 {
        self.platform.width()
    }

    pub fn height(&self) -> u32 {
        self.platform.height()
    }

    pub fn clear(&mut self, color: Color) {
        let (width, height) = (self.width(), self.height());
        self.renderer.clear(&mut self.back_buffer, width, height, color);
    }

    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Color) {
        let (width, height) = (self.width(), self.height());
        self.renderer.fill_rounded_rect(
            &mut self.back_buffer,
            width,
            height,
            x,
            y,
            w,
            h,
            radius,
            color,
        );
    }

    /// Draw text with its baseline at `y`
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Color) {
        let (width, height) = (self.width(), self.height());
        self.renderer.draw_text(
            &mut self.back_buffer,
            width,
            height,
            text,
            x,
            y,
            font_size,
            color,
        );
    }

    /// Blit the back buffer to the visible surface
    pub fn present(&mut self) {
        self.platform.commit(&self.back_buffer);
    }

    /// Non-blocking; false once the window has been closed
    pub fn poll_events(&mut self) -> bool {
        self.platform.poll_events()
    }

    pub fn take_redraw_requested(&mut self) -> bool {
        self.platform.take_redraw_requested()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[cfg(test)]
    pub(crate) fn back_buffer(&self) -> &[u8] {
        &self.back_buffer
    }
}
