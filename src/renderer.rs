//! CPU renderer built on tiny-skia and cosmic-text
//!
//! Draws into caller-owned RGBA buffers. The buffers hold premultiplied
//! pixels, which is what every backend expects from `commit`.
#![allow(clippy::too_many_arguments)]
use std::collections::HashMap;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, LayoutGlyph, Metrics, Shaping, SwashCache};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, PixmapMut, Transform};
use tracing::debug;

/// Shaped lines kept between frames. The panel shows two short lines that
/// change once per sample, so a small cache covers the whole working set.
const SHAPE_CACHE_LIMIT: usize = 64;

/// Text content plus font size in tenths of a pixel
type ShapeKey = (String, u32);

struct ShapedLine {
    glyphs: Vec<LayoutGlyph>,
    width: f32,
    height: f32,
    last_used: u64,
}

pub struct Renderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    font_family: String,
    shaped: HashMap<ShapeKey, ShapedLine>,
    generation: u64,
}

impl Renderer {
    /// `font_family` is resolved by cosmic-text; a missing family falls back
    /// to whatever sans-serif the system provides.
    pub fn new(font_family: impl Into<String>) -> Self {
        let font_family = font_family.into();
        let font_system = FontSystem::new();
        debug!(
            family = %font_family,
            faces = font_system.db().len(),
            "Font database loaded"
        );

        Self {
            font_system,
            swash_cache: SwashCache::new(),
            font_family,
            shaped: HashMap::with_capacity(SHAPE_CACHE_LIMIT),
            generation: 0,
        }
    }

    pub fn create_buffer(width: u32, height: u32) -> Vec<u8> {
        vec![0u8; (width as usize) * (height as usize) * 4]
    }

    pub fn clear(&self, buffer: &mut [u8], width: u32, height: u32, color: Color) {
        if let Some(mut pixmap) = PixmapMut::from_bytes(buffer, width, height) {
            pixmap.fill(color);
        }
    }

    /// Anti-aliased filled rectangle with rounded corners. The radius is
    /// capped at half the shorter side.
    pub fn fill_rounded_rect(
        &self,
        buffer: &mut [u8],
        width: u32,
        height: u32,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        color: Color,
    ) {
        let Some(mut pixmap) = PixmapMut::from_bytes(buffer, width, height) else {
            return;
        };
        let Some(path) = rounded_rect_path(x, y, w, h, radius) else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;

        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    /// Draw a single line of text with its baseline at `y`
    pub fn draw_text(
        &mut self,
        buffer: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Color,
    ) {
        let Some(mut pixmap) = PixmapMut::from_bytes(buffer, width, height) else {
            return;
        };

        let key = self.shape(text, font_size);
        let Some(line) = self.shaped.get(&key) else {
            return;
        };

        let rgba = color.to_color_u8();
        for glyph in &line.glyphs {
            let physical = glyph.physical((x, y), 1.0);
            let Some(image) = self
                .swash_cache
                .get_image(&mut self.font_system, physical.cache_key)
            else {
                continue;
            };

            blend_mask(
                &mut pixmap,
                &image.data,
                image.placement.width,
                image.placement.height,
                physical.x + image.placement.left,
                physical.y - image.placement.top,
                [rgba.red(), rgba.green(), rgba.blue(), rgba.alpha()],
            );
        }
    }

    /// Width and height of `text` at `font_size`, in pixels
    pub fn measure_text(&mut self, text: &str, font_size: f32) -> (f32, f32) {
        let key = self.shape(text, font_size);
        self.shaped
            .get(&key)
            .map(|line| (line.width, line.height))
            .unwrap_or_default()
    }

    /// Shape `text` unless it is already cached, and return its cache key
    fn shape(&mut self, text: &str, font_size: f32) -> ShapeKey {
        self.generation += 1;
        let key = (text.to_string(), (font_size * 10.0).round() as u32);

        if let Some(line) = self.shaped.get_mut(&key) {
            line.last_used = self.generation;
            return key;
        }

        let metrics = Metrics::new(font_size, font_size * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        let attrs = Attrs::new().family(Family::Name(&self.font_family));
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut line = ShapedLine {
            glyphs: Vec::new(),
            width: 0.0,
            height: 0.0,
            last_used: self.generation,
        };
        for run in buffer.layout_runs() {
            line.width = line.width.max(run.line_w);
            line.height += run.line_height;
            line.glyphs.extend(run.glyphs.iter().cloned());
        }

        if self.shaped.len() >= SHAPE_CACHE_LIMIT {
            self.evict_stale();
        }
        self.shaped.insert(key.clone(), line);
        key
    }

    /// Drop the older half of the cache
    fn evict_stale(&mut self) {
        let mut stamps: Vec<u64> = self.shaped.values().map(|l| l.last_used).collect();
        stamps.sort_unstable();
        let cutoff = stamps[stamps.len() / 2];
        self.shaped.retain(|_, line| line.last_used > cutoff);
    }
}

fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<tiny_skia::Path> {
    let r = radius.max(0.0).min(w / 2.0).min(h / 2.0);
    let (right, bottom) = (x + w, y + h);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.quad_to(right, y, right, y + r);
    pb.line_to(right, bottom - r);
    pb.quad_to(right, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.quad_to(x, bottom, x, bottom - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Source-over blend of an 8-bit coverage mask in a solid colour
fn blend_mask(
    pixmap: &mut PixmapMut,
    mask: &[u8],
    mask_width: u32,
    mask_height: u32,
    left: i32,
    top: i32,
    color: [u8; 4],
) {
    let pw = pixmap.width() as i32;
    let ph = pixmap.height() as i32;
    let data = pixmap.data_mut();

    for my in 0..mask_height as i32 {
        let py = top + my;
        if !(0..ph).contains(&py) {
            continue;
        }
        for mx in 0..mask_width as i32 {
            let px = left + mx;
            if !(0..pw).contains(&px) {
                continue;
            }

            let Some(&coverage) = mask.get((my * mask_width as i32 + mx) as usize) else {
                continue;
            };
            let src_a = coverage as u32 * color[3] as u32 / 255;
            if src_a == 0 {
                continue;
            }
            let inv_a = 255 - src_a;

            let i = ((py * pw + px) * 4) as usize;
            let dst = &mut data[i..i + 4];
            for c in 0..3 {
                // Premultiplied source over premultiplied destination
                let src = color[c] as u32 * src_a / 255;
                dst[c] = (src + dst[c] as u32 * inv_a / 255) as u8;
            }
            dst[3] = (src_a + dst[3] as u32 * inv_a / 255) as u8;
        }
    }
}
