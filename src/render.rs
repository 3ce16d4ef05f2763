//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use printpdf::{PdfDocument, PdfPage, Mm};

use crate::error::Result;
use crate::layout_config::*;
use crate::painter::{blend, builtin_font, lerp, save_document, ImageRegistry, PageOps, Rgba};

const PT_TO_MM: f32 = 0.352778;
const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

/// Render a LayoutConfig into PDF bytes.
///
/// Images whose source is not a base64 data URI, or whose bytes cannot be
/// decoded, are skipped with a warning.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>> {
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);

    let mut images = ImageRegistry::default();
    for page_layout in &config.pages {
        for lbox in &page_layout.boxes {
            register_images(&mut doc, &mut images, lbox);
        }
    }

    let backdrop = config.page_background.unwrap_or(WHITE);
    let mut pages = Vec::with_capacity(config.pages.len().max(1));
    for page_layout in &config.pages {
        let mut page = PageOps::new(config.page_height_pt);
        if let Some(bg) = config.page_background {
            page.fill_rect(0.0, 0.0, config.page_width_pt, config.page_height_pt, bg);
        }
        for lbox in &page_layout.boxes {
            render_box(&mut page, lbox, &images, backdrop);
        }
        if let Some(mark) = &config.watermark {
            render_watermark(&mut page, mark, config.page_width_pt, config.page_height_pt, backdrop);
        }
        pages.push(PdfPage::new(page_w, page_h, page.into_ops()));
    }
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    save_document(&doc)
}

fn register_images(doc: &mut PdfDocument, images: &mut ImageRegistry, lbox: &LayoutBox) {
    if let Some(img) = &lbox.image {
        images.register(doc, &img.src);
    }
    for child in &lbox.children {
        register_images(doc, images, child);
    }
}

/// Shadow emulated by layered offset rectangles, furthest and faintest
/// first.
fn render_shadow(page: &mut PageOps, lbox: &LayoutBox, shadow: &ShadowStyle, backdrop: Rgba) {
    let layers = ((shadow.blur / 2.0).ceil() as usize).clamp(1, 4);
    for i in (0..layers).rev() {
        let spread = i as f32;
        let alpha = shadow.color[3] / (i as f32 + 1.0);
        page.fill_rounded_rect(
            lbox.x - spread,
            lbox.y + shadow.offset_y - spread + i as f32,
            lbox.width + 2.0 * spread,
            lbox.height + 2.0 * spread,
            lbox.corner_radius + spread,
            blend(shadow.color, alpha / shadow.color[3].max(1e-3) * lbox.opacity, backdrop),
        );
    }
}

fn render_box(page: &mut PageOps, lbox: &LayoutBox, images: &ImageRegistry, backdrop: Rgba) {
    let (x, y, w, h, r) = (lbox.x, lbox.y, lbox.width, lbox.height, lbox.corner_radius);
    let paint = |c: Rgba| blend(c, lbox.opacity, backdrop);

    if let Some(shadow) = &lbox.shadow {
        render_shadow(page, lbox, shadow, backdrop);
    }

    let mut own_backdrop = backdrop;
    if let Some(g) = &lbox.gradient {
        let (from, to) = (paint(g.from), paint(g.to));
        page.fill_gradient(x, y, w, h, r, from, to, g.axis == GradientAxis::Vertical);
        own_backdrop = lerp(from, to, 0.5);
    } else if let Some(bg) = lbox.background_color {
        if bg[3] > 0.001 {
            own_backdrop = blend(bg, lbox.opacity, backdrop);
            page.fill_rounded_rect(x, y, w, h, r, own_backdrop);
        }
    }

    if let Some(border) = &lbox.border {
        if border.bottom_only {
            page.line(x, y + h, x + w, y + h, border.width, paint(border.color));
        } else {
            page.stroke_rounded_rect(x, y, w, h, r, border.width, paint(border.color));
        }
    }

    if let Some(text) = &lbox.text {
        let font = builtin_font(&text.font_family, text.bold, text.italic);
        let leading = ((text.line_height - text.font_size) / 2.0).max(0.0);
        let color = blend(text.color, lbox.opacity, own_backdrop);
        for tline in &text.lines {
            page.text(
                x + tline.x_offset,
                y + tline.y_offset + leading,
                &tline.text,
                font,
                text.font_size,
                color,
            );
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            page.image(res, x, y, img.width, img.height);
        }
    }

    for child in &lbox.children {
        render_box(page, child, images, own_backdrop);
    }
}

fn render_watermark(page: &mut PageOps, mark: &WatermarkLayer, page_w: f32, page_h: f32, backdrop: Rgba) {
    let width = mark.text.chars().count() as f32 * mark.font_size * 0.55;
    page.text(
        ((page_w - width) / 2.0).max(0.0),
        (page_h - mark.font_size) / 2.0,
        &mark.text,
        builtin_font("helvetica", true, false),
        mark.font_size,
        blend(mark.color, 1.0, backdrop),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty_page() {
        let config = LayoutConfig::new("empty", 595.28, 841.89);
        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_styled_boxes() {
        let mut card = LayoutBox::new(36.0, 36.0, 200.0, 80.0);
        card.background_color = Some([0.9, 0.9, 0.9, 1.0]);
        card.corner_radius = 8.0;
        card.shadow = Some(ShadowStyle {
            offset_y: 2.0,
            blur: 6.0,
            color: [0.0, 0.0, 0.0, 0.2],
        });
        card.border = Some(BorderStyle {
            width: 1.0,
            color: [0.5, 0.5, 0.5, 1.0],
            bottom_only: false,
        });
        let mut title = LayoutBox::new(44.0, 44.0, 100.0, 14.0);
        title.text = Some(TextContent {
            lines: vec![TextLine {
                text: "Cast".into(),
                x_offset: 0.0,
                y_offset: 0.0,
            }],
            font_family: "Times".into(),
            font_size: 12.0,
            bold: true,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            line_height: 14.0,
            text_align: "left".into(),
        });
        card.children.push(title);

        let mut config = LayoutConfig::new("styled", 595.28, 841.89);
        config.page_background = Some([1.0, 1.0, 1.0, 1.0]);
        config.watermark = Some(WatermarkLayer {
            text: "DRAFT".into(),
            font_size: 72.0,
            color: [0.0, 0.0, 0.0, 0.08],
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![card],
        });
        let bytes = render_pdf(&config).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }
}
