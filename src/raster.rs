//! Bitmap rasterizer for the HTML backend.
//!
//! Paints one paginated page of layout boxes into an RGBA bitmap, encodes it
//! as PNG and wraps it as a single full-bleed PDF page. Text uses the Spleen
//! 12x24 bitmap face scaled to the requested size, so the output is
//! self-contained and independent of system fonts.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba as Pixel, RgbaImage};
use printpdf::{Mm, PdfDocument, PdfPage};
use spleen_font::{PSF2Font, FONT_12X24};

use crate::error::{CallsheetError, Result};
use crate::layout_config::{GradientAxis, LayoutBox, PageLayout, WatermarkLayer};
use crate::painter::{decode_data_uri, embed_image, lerp, save_document, PageOps, Rgba};

/// Device pixels per point. Anything below 3 blurs small print.
pub const DEFAULT_SCALE: u32 = 3;

const GLYPH_W: f32 = 12.0;
const GLYPH_H: f32 = 24.0;
const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];
const PT_PER_MM: f32 = 72.0 / 25.4;

/// An RGBA canvas addressed in points.
pub struct Canvas {
    img: RgbaImage,
    scale: f32,
}

impl Canvas {
    pub fn new(width_pt: f32, height_pt: f32, scale: u32, background: Rgba) -> Self {
        let scale = scale.max(1);
        let w = (width_pt * scale as f32).ceil().max(1.0) as u32;
        let h = (height_pt * scale as f32).ceil().max(1.0) as u32;
        Self {
            img: RgbaImage::from_pixel(w, h, to_pixel(background)),
            scale: scale as f32,
        }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    pub fn into_image(self) -> RgbaImage {
        self.img
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.img.get_pixel(x, y).0
    }

    /// Pixel range covering `[from, to)` points on an axis of `len` pixels.
    fn span(&self, from: f32, to: f32, len: u32) -> (u32, u32) {
        let a = (from * self.scale).floor().max(0.0) as u32;
        let b = ((to * self.scale).ceil().max(0.0) as u32).min(len);
        (a.min(len), b)
    }

    fn blend_px(&mut self, x: u32, y: u32, color: Rgba, alpha: f32) {
        let a = (color[3] * alpha).clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let px = self.img.get_pixel_mut(x, y);
        for c in 0..3 {
            let under = px.0[c] as f32 / 255.0;
            px.0[c] = ((color[c] * a + under * (1.0 - a)) * 255.0).round() as u8;
        }
        px.0[3] = 255;
    }

    /// Fill a rounded rectangle; `paint` picks the colour at each point.
    #[allow(clippy::too_many_arguments)]
    fn fill_with(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, alpha: f32, paint: impl Fn(f32, f32) -> Rgba) {
        let r = r.max(0.0).min(w / 2.0).min(h / 2.0);
        let (x0, x1) = self.span(x, x + w, self.img.width());
        let (y0, y1) = self.span(y, y + h, self.img.height());
        for py in y0..y1 {
            let cy = (py as f32 + 0.5) / self.scale;
            for px in x0..x1 {
                let cx = (px as f32 + 0.5) / self.scale;
                if inside_rounded(cx, cy, x, y, w, h, r) {
                    let color = paint(cx, cy);
                    self.blend_px(px, py, color, alpha);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, color: Rgba, alpha: f32) {
        self.fill_with(x, y, w, h, r, alpha, |_, _| color);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fill_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, from: Rgba, to: Rgba, axis: GradientAxis, alpha: f32) {
        self.fill_with(x, y, w, h, r, alpha, |cx, cy| {
            let t = match axis {
                GradientAxis::Horizontal => (cx - x) / w.max(1e-3),
                GradientAxis::Vertical => (cy - y) / h.max(1e-3),
                GradientAxis::Diagonal => ((cx - x) / w.max(1e-3) + (cy - y) / h.max(1e-3)) / 2.0,
            };
            lerp(from, to, t)
        });
    }

    /// Stroke the outline of a rounded rectangle, inside its edge.
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, width: f32, color: Rgba, alpha: f32) {
        let r = r.max(0.0).min(w / 2.0).min(h / 2.0);
        let (ix, iy, iw, ih) = (x + width, y + width, w - 2.0 * width, h - 2.0 * width);
        let ir = (r - width).max(0.0);
        let (x0, x1) = self.span(x, x + w, self.img.width());
        let (y0, y1) = self.span(y, y + h, self.img.height());
        for py in y0..y1 {
            let cy = (py as f32 + 0.5) / self.scale;
            for px in x0..x1 {
                let cx = (px as f32 + 0.5) / self.scale;
                let on_edge = inside_rounded(cx, cy, x, y, w, h, r)
                    && (iw <= 0.0 || ih <= 0.0 || !inside_rounded(cx, cy, ix, iy, iw, ih, ir));
                if on_edge {
                    self.blend_px(px, py, color, alpha);
                }
            }
        }
    }

    /// One line of text whose top edge sits at `y`.
    #[allow(clippy::too_many_arguments)]
    pub fn text(&mut self, x: f32, y: f32, text: &str, size: f32, bold: bool, color: Rgba, alpha: f32) {
        if text.trim().is_empty() {
            return;
        }
        let Ok(mut font) = PSF2Font::new(FONT_12X24) else {
            log::warn!("spleen font unavailable; text skipped");
            return;
        };
        // Glyph cells are 1:2; advance matches the 0.5 em layout estimate.
        let dot = size * self.scale / GLYPH_H;
        let advance = GLYPH_W * size / GLYPH_H;
        let (w, h) = (self.img.width() as i64, self.img.height() as i64);
        let mut pen_x = x;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let encoded = ch.encode_utf8(&mut buf);
            let mut hits = Vec::new();
            match font.glyph_for_utf8(encoded.as_bytes()) {
                Some(glyph) => {
                    for (row_y, row) in glyph.enumerate() {
                        for (col_x, on) in row.enumerate() {
                            if on {
                                hits.push((col_x as f32, row_y as f32));
                            }
                        }
                    }
                }
                None => log::debug!("no raster glyph for {ch:?}"),
            }
            for (gx, gy) in hits {
                let left = pen_x * self.scale + gx * dot;
                let top = y * self.scale + gy * dot;
                let right = left + dot.max(1.0) + if bold { dot.max(1.0) } else { 0.0 };
                let bottom = top + dot.max(1.0);
                for py in (top as i64).max(0)..(bottom.ceil() as i64).min(h) {
                    for px in (left as i64).max(0)..(right.ceil() as i64).min(w) {
                        self.blend_px(px as u32, py as u32, color, alpha);
                    }
                }
            }
            pen_x += advance;
        }
    }

    /// Draw an encoded image scaled into the box.
    #[allow(clippy::too_many_arguments)]
    pub fn image(&mut self, bytes: &[u8], x: f32, y: f32, w: f32, h: f32, alpha: f32) {
        let decoded = match ::image::load_from_memory(bytes) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::warn!("skipping raster image: {e}");
                return;
            }
        };
        let tw = (w * self.scale).round().max(1.0) as u32;
        let th = (h * self.scale).round().max(1.0) as u32;
        let scaled = imageops::resize(&decoded, tw, th, FilterType::Triangle);
        let ox = (x * self.scale).round() as i64;
        let oy = (y * self.scale).round() as i64;
        for (sx, sy, p) in scaled.enumerate_pixels() {
            let (px, py) = (ox + sx as i64, oy + sy as i64);
            if px < 0 || py < 0 || px >= self.img.width() as i64 || py >= self.img.height() as i64 {
                continue;
            }
            let color = [
                p.0[0] as f32 / 255.0,
                p.0[1] as f32 / 255.0,
                p.0[2] as f32 / 255.0,
                p.0[3] as f32 / 255.0,
            ];
            self.blend_px(px as u32, py as u32, color, alpha);
        }
    }
}

fn to_pixel(c: Rgba) -> Pixel<u8> {
    let ch = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Pixel([ch(c[0]), ch(c[1]), ch(c[2]), 255])
}

#[allow(clippy::too_many_arguments)]
fn inside_rounded(px: f32, py: f32, x: f32, y: f32, w: f32, h: f32, r: f32) -> bool {
    if px < x || py < y || px > x + w || py > y + h {
        return false;
    }
    if r <= 0.0 {
        return true;
    }
    let cx = px.clamp(x + r, x + w - r);
    let cy = py.clamp(y + r, y + h - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

fn paint_box(canvas: &mut Canvas, lbox: &LayoutBox) {
    let (x, y, w, h, r) = (lbox.x, lbox.y, lbox.width, lbox.height, lbox.corner_radius);
    let alpha = lbox.opacity;

    if let Some(shadow) = &lbox.shadow {
        let layers = ((shadow.blur / 2.0).ceil() as usize).clamp(1, 4);
        for i in (0..layers).rev() {
            let spread = i as f32;
            canvas.fill_rounded_rect(
                x - spread,
                y + shadow.offset_y - spread + i as f32,
                w + 2.0 * spread,
                h + 2.0 * spread,
                r + spread,
                shadow.color,
                alpha / (i as f32 + 1.0),
            );
        }
    }

    if let Some(g) = &lbox.gradient {
        canvas.fill_gradient(x, y, w, h, r, g.from, g.to, g.axis, alpha);
    } else if let Some(bg) = lbox.background_color {
        canvas.fill_rounded_rect(x, y, w, h, r, bg, alpha);
    }

    if let Some(border) = &lbox.border {
        if border.bottom_only {
            canvas.fill_rounded_rect(x, y + h - border.width, w, border.width, 0.0, border.color, alpha);
        } else {
            canvas.stroke_rounded_rect(x, y, w, h, r, border.width, border.color, alpha);
        }
    }

    if let Some(text) = &lbox.text {
        let leading = ((text.line_height - text.font_size) / 2.0).max(0.0);
        for line in &text.lines {
            canvas.text(
                x + line.x_offset,
                y + line.y_offset + leading,
                &line.text,
                text.font_size,
                text.bold,
                text.color,
                alpha,
            );
        }
    }

    if let Some(img) = &lbox.image {
        match decode_data_uri(&img.src) {
            Ok(bytes) => canvas.image(&bytes, x, y, img.width, img.height, alpha),
            Err(e) => log::warn!("skipping raster image: {e}"),
        }
    }

    for child in &lbox.children {
        paint_box(canvas, child);
    }
}

fn paint_watermark(canvas: &mut Canvas, mark: &WatermarkLayer, width_pt: f32, height_pt: f32) {
    let text_w = mark.text.chars().count() as f32 * mark.font_size * GLYPH_W / GLYPH_H;
    canvas.text(
        ((width_pt - text_w) / 2.0).max(0.0),
        (height_pt - mark.font_size) / 2.0,
        &mark.text,
        mark.font_size,
        true,
        mark.color,
        1.0,
    );
}

/// Paint one page of boxes.
pub fn rasterize_page(
    page: &PageLayout,
    width_pt: f32,
    height_pt: f32,
    background: Option<Rgba>,
    watermark: Option<&WatermarkLayer>,
    scale: u32,
) -> RgbaImage {
    let mut canvas = Canvas::new(width_pt, height_pt, scale, background.unwrap_or(WHITE));
    for lbox in &page.boxes {
        paint_box(&mut canvas, lbox);
    }
    if let Some(mark) = watermark {
        paint_watermark(&mut canvas, mark, width_pt, height_pt);
    }
    canvas.into_image()
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CallsheetError::Rasterization(format!("PNG encoding failed: {e}")))?;
    Ok(png)
}

/// Wrap a PNG as the only content of a one-page A4 document (210x297 mm,
/// swapped for landscape). The image covers the whole page.
pub fn single_page_pdf(title: &str, png: &[u8], landscape: bool) -> Result<Vec<u8>> {
    let (w_mm, h_mm) = if landscape { (297.0, 210.0) } else { (210.0, 297.0) };
    let (w_pt, h_pt) = (w_mm * PT_PER_MM, h_mm * PT_PER_MM);

    let mut doc = PdfDocument::new(title);
    let res = embed_image(&mut doc, png)
        .ok_or_else(|| CallsheetError::Rasterization("rendered page could not be embedded".into()))?;
    let mut page = PageOps::new(h_pt);
    page.image(&res, 0.0, 0.0, w_pt, h_pt);

    doc.with_pages(vec![PdfPage::new(Mm(w_mm), Mm(h_mm), page.into_ops())]);
    save_document(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_config::{TextContent, TextLine};

    const RED: Rgba = [1.0, 0.0, 0.0, 1.0];

    #[test]
    fn canvas_is_scaled() {
        let canvas = Canvas::new(100.0, 50.0, DEFAULT_SCALE, WHITE);
        assert_eq!((canvas.width(), canvas.height()), (300, 150));
    }

    #[test]
    fn rounded_fill_leaves_corners_clear() {
        let mut canvas = Canvas::new(40.0, 40.0, 1, WHITE);
        canvas.fill_rounded_rect(0.0, 0.0, 40.0, 40.0, 12.0, RED, 1.0);
        assert_eq!(canvas.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(20, 20), [255, 0, 0, 255]);
    }

    #[test]
    fn opacity_blends_against_backdrop() {
        let mut canvas = Canvas::new(10.0, 10.0, 1, WHITE);
        canvas.fill_rounded_rect(0.0, 0.0, 10.0, 10.0, 0.0, [0.0, 0.0, 0.0, 1.0], 0.5);
        let p = canvas.pixel(5, 5);
        assert!((126..=129).contains(&p[0]), "{p:?}");
    }

    #[test]
    fn text_marks_pixels() {
        let mut canvas = Canvas::new(60.0, 20.0, DEFAULT_SCALE, WHITE);
        canvas.text(2.0, 2.0, "CAST", 12.0, false, [0.0, 0.0, 0.0, 1.0], 1.0);
        let img = canvas.into_image();
        assert!(img.pixels().any(|p| p.0[0] < 128));
    }

    #[test]
    fn page_renders_to_single_page_pdf() {
        let mut lbox = LayoutBox::new(10.0, 10.0, 200.0, 40.0);
        lbox.background_color = Some([0.9, 0.9, 0.95, 1.0]);
        lbox.text = Some(TextContent {
            lines: vec![TextLine {
                text: "Call 06:00".into(),
                x_offset: 4.0,
                y_offset: 4.0,
            }],
            font_family: "Helvetica".into(),
            font_size: 10.0,
            bold: false,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            line_height: 14.0,
            text_align: "left".into(),
        });
        let page = PageLayout {
            page_index: 0,
            boxes: vec![lbox],
        };
        let img = rasterize_page(&page, 595.28, 841.89, None, None, 1);
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let pdf = single_page_pdf("t", &png, false).unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");
    }
}
