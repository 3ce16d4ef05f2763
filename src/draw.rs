//! Direct-drawing backend.
//!
//! Sections are drawn one after another at an explicit vertical cursor. Each
//! section function takes the context and its block and returns the cursor
//! after drawing. A page break is inserted whenever the next section, or the
//! next row of a list section, would cross the bottom margin.

use std::collections::BTreeMap;

use printpdf::{Mm, PdfDocument, PdfPage};

use crate::callsheet::{safe_text, Callsheet};
use crate::customization::{
    Alignment, ContactLayout, FooterStyle, HeaderStyle, Orientation, PdfCustomization, SectionKey,
    TextRole,
};
use crate::error::{CallsheetError, Result};
use crate::fonts::{wrap_text, FontManager};
use crate::painter::{blend, builtin_font, decode_data_uri, save_document, ImageRegistry, PageOps, Rgba};
use crate::resolve::{Divider, Fill, ResolvedFont, ResolvedStyle};
use crate::sections::{
    checked_inputs, plan_document, ContactBlock, DetailsBlock, FooterBlock, HeaderBlock, LogoRef, NotesBlock,
    ScheduleBlock, SectionBlock, SectionTitle,
};
use crate::style::{Color, GradientAxis, JustifyContent};
use crate::tree::{logo_placement, EMERGENCY_RED, WATERMARK_SIZE};

const PT_TO_MM: f32 = 25.4 / 72.0;

/// Padding inside framed cards.
const CARD_PAD: f32 = 10.0;

// ---------------------------------------------------------------------------
// Surfaces
// ---------------------------------------------------------------------------

/// Drawing target. Coordinates are points from the top-left corner of the
/// current page.
pub trait Surface {
    fn begin_page(&mut self, width: f32, height: f32);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba);
    /// Rounded top corners, square bottom ones.
    fn fill_band(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba);
    #[allow(clippy::too_many_arguments)]
    fn fill_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, from: Rgba, to: Rgba, axis: GradientAxis);
    #[allow(clippy::too_many_arguments)]
    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, width: f32, color: Rgba);
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgba);
    fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: Rgba);
    /// One line of text whose top edge sits at `y`.
    fn text(&mut self, x: f32, y: f32, text: &str, font: ResolvedFont, color: Rgba);
    fn image(&mut self, src: &str, x: f32, y: f32, w: f32, h: f32);
}

struct OpenPage {
    ops: PageOps,
    width: f32,
    height: f32,
}

/// Draws into a printpdf document, one op list per page.
pub struct PdfSurface {
    doc: PdfDocument,
    images: ImageRegistry,
    pages: Vec<PdfPage>,
    current: Option<OpenPage>,
}

impl PdfSurface {
    pub fn new(title: &str) -> Self {
        Self {
            doc: PdfDocument::new(title),
            images: ImageRegistry::default(),
            pages: Vec::new(),
            current: None,
        }
    }

    fn flush(&mut self) {
        if let Some(page) = self.current.take() {
            self.pages.push(PdfPage::new(
                Mm(page.width * PT_TO_MM),
                Mm(page.height * PT_TO_MM),
                page.ops.into_ops(),
            ));
        }
    }

    fn ops(&mut self) -> Option<&mut PageOps> {
        self.current.as_mut().map(|p| &mut p.ops)
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.flush();
        if self.pages.is_empty() {
            return Err(CallsheetError::Rasterization("no page was drawn".into()));
        }
        self.doc.with_pages(self.pages);
        save_document(&self.doc)
    }
}

impl Surface for PdfSurface {
    fn begin_page(&mut self, width: f32, height: f32) {
        self.flush();
        self.current = Some(OpenPage {
            ops: PageOps::new(height),
            width,
            height,
        });
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba) {
        if let Some(ops) = self.ops() {
            ops.fill_rounded_rect(x, y, w, h, radius, color);
        }
    }

    fn fill_band(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba) {
        if let Some(ops) = self.ops() {
            ops.fill_top_rounded_rect(x, y, w, h, radius, color);
        }
    }

    fn fill_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, from: Rgba, to: Rgba, axis: GradientAxis) {
        if let Some(ops) = self.ops() {
            ops.fill_gradient(x, y, w, h, radius, from, to, axis != GradientAxis::Horizontal);
        }
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, width: f32, color: Rgba) {
        if let Some(ops) = self.ops() {
            ops.stroke_rounded_rect(x, y, w, h, radius, width, color);
        }
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgba) {
        if let Some(ops) = self.ops() {
            ops.line(x1, y1, x2, y2, width, color);
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: Rgba) {
        if let Some(ops) = self.ops() {
            ops.fill_circle(cx, cy, r, color);
        }
    }

    fn text(&mut self, x: f32, y: f32, text: &str, font: ResolvedFont, color: Rgba) {
        if let Some(ops) = self.ops() {
            let face = builtin_font(font.family.as_str(), font.bold(), false);
            ops.text(x, y, text, face, font.size, color);
        }
    }

    fn image(&mut self, src: &str, x: f32, y: f32, w: f32, h: f32) {
        let Some(page) = self.current.as_mut() else {
            return;
        };
        if let Some(res) = self.images.register(&mut self.doc, src) {
            page.ops.image(res, x, y, w, h);
        }
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Page { width: f32, height: f32 },
    Fill { x: f32, y: f32, w: f32, h: f32, color: Rgba },
    Band { x: f32, y: f32, w: f32, h: f32 },
    Gradient { x: f32, y: f32, w: f32, h: f32 },
    Stroke { x: f32, y: f32, w: f32, h: f32 },
    Line { y: f32 },
    Circle { cx: f32, cy: f32 },
    Text { x: f32, y: f32, text: String },
    Image { src: String },
}

/// Surface that records every call instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<Primitive>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> usize {
        self.ops.iter().filter(|p| matches!(p, Primitive::Page { .. })).count()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Texts grouped by the page they were drawn on.
    pub fn page_texts(&self) -> Vec<Vec<&str>> {
        let mut pages: Vec<Vec<&str>> = Vec::new();
        for op in &self.ops {
            match op {
                Primitive::Page { .. } => pages.push(Vec::new()),
                Primitive::Text { text, .. } => {
                    if let Some(page) = pages.last_mut() {
                        page.push(text);
                    }
                }
                _ => {}
            }
        }
        pages
    }
}

impl Surface for RecordingSurface {
    fn begin_page(&mut self, width: f32, height: f32) {
        self.ops.push(Primitive::Page { width, height });
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, _radius: f32, color: Rgba) {
        self.ops.push(Primitive::Fill { x, y, w, h, color });
    }

    fn fill_band(&mut self, x: f32, y: f32, w: f32, h: f32, _radius: f32, _color: Rgba) {
        self.ops.push(Primitive::Band { x, y, w, h });
    }

    fn fill_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, _radius: f32, _from: Rgba, _to: Rgba, _axis: GradientAxis) {
        self.ops.push(Primitive::Gradient { x, y, w, h });
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, _radius: f32, _width: f32, _color: Rgba) {
        self.ops.push(Primitive::Stroke { x, y, w, h });
    }

    fn line(&mut self, _x1: f32, y1: f32, _x2: f32, _y2: f32, _width: f32, _color: Rgba) {
        self.ops.push(Primitive::Line { y: y1 });
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, _r: f32, _color: Rgba) {
        self.ops.push(Primitive::Circle { cx, cy });
    }

    fn text(&mut self, x: f32, y: f32, text: &str, _font: ResolvedFont, _color: Rgba) {
        self.ops.push(Primitive::Text {
            x,
            y,
            text: text.to_string(),
        });
    }

    fn image(&mut self, src: &str, _x: f32, _y: f32, _w: f32, _h: f32) {
        self.ops.push(Primitive::Image { src: src.to_string() });
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// What a finished drawing pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawSummary {
    pub pages: usize,
    /// List rows drawn per section key.
    pub rows: BTreeMap<String, usize>,
}

impl DrawSummary {
    pub fn rows_for(&self, key: SectionKey) -> usize {
        self.rows.get(key.as_str()).copied().unwrap_or(0)
    }
}

/// Running state threaded through the section functions.
pub struct DrawContext<'a, S: Surface> {
    surface: &'a mut S,
    c: &'a PdfCustomization,
    fonts: &'a FontManager,
    style: ResolvedStyle,
    watermark: Option<(String, f32)>,
    page_width: f32,
    page_height: f32,
    /// Left edge of the content column.
    pub margin: f32,
    pub width: f32,
    /// Top of the next thing to draw.
    pub y: f32,
    pages: usize,
    rows: BTreeMap<String, usize>,
}

impl<'a, S: Surface> DrawContext<'a, S> {
    pub fn new(
        surface: &'a mut S,
        c: &'a PdfCustomization,
        fonts: &'a FontManager,
        watermark: Option<(String, f32)>,
    ) -> Self {
        let (page_width, page_height) = c.page_size_pt();
        Self {
            surface,
            c,
            fonts,
            style: ResolvedStyle::new(c),
            watermark,
            page_width,
            page_height,
            margin: c.layout.margins.left,
            width: c.content_width(),
            y: c.layout.margins.top,
            pages: 0,
            rows: BTreeMap::new(),
        }
    }

    fn top(&self) -> f32 {
        self.c.layout.margins.top
    }

    fn bottom(&self) -> f32 {
        self.page_height - self.c.layout.margins.bottom
    }

    fn backdrop(&self) -> Rgba {
        self.style.palette.background.to_array()
    }

    fn paint(&self, color: Color) -> Rgba {
        blend(color.to_array(), 1.0, self.backdrop())
    }

    /// Start a page: background first, then the watermark, cursor at the
    /// top margin.
    pub fn new_page(&mut self) {
        let (w, h) = (self.page_width, self.page_height);
        self.surface.begin_page(w, h);
        let bg = self.backdrop();
        self.surface.fill_rect(0.0, 0.0, w, h, 0.0, bg);
        if let Some((text, opacity)) = &self.watermark {
            let font = ResolvedFont {
                size: WATERMARK_SIZE,
                weight: 700,
                ..self.style.font(None, TextRole::Title)
            };
            let width = self.fonts.measure_text_width(text, font.size, true, false, font.family.as_str());
            let color = blend(self.style.palette.muted().to_array(), *opacity, bg);
            self.surface.text(((w - width) / 2.0).max(0.0), (h - font.size) / 2.0, text, font, color);
        }
        self.y = self.top();
        self.pages += 1;
        log::debug!("direct backend: page {}", self.pages);
    }

    pub fn fits(&self, height: f32) -> bool {
        self.y + height <= self.bottom()
    }

    /// Break to a new page unless `height` fits below the cursor. Returns
    /// whether a page was started. Content taller than a whole page is drawn
    /// from the top of a fresh page rather than breaking forever.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if self.fits(height) || self.y <= self.top() + 0.5 {
            return false;
        }
        self.new_page();
        true
    }

    fn count_rows(&mut self, key: SectionKey, n: usize) {
        if n > 0 {
            *self.rows.entry(key.as_str().to_string()).or_insert(0) += n;
        }
    }

    pub fn summary(&self) -> DrawSummary {
        DrawSummary {
            pages: self.pages,
            rows: self.rows.clone(),
        }
    }

    fn font(&self, key: SectionKey, role: TextRole) -> ResolvedFont {
        self.style.font(Some(key), role)
    }

    fn measure(&self, text: &str, font: ResolvedFont) -> f32 {
        self.fonts
            .measure_text_width(text, font.size, font.bold(), false, font.family.as_str())
    }

    /// Wrapped lines of `text`; nothing at all for blank text.
    fn wrap(&self, text: &str, font: ResolvedFont, width: f32) -> Vec<String> {
        match safe_text(text) {
            Some(t) => wrap_text(t, font.size, font.bold(), false, font.family.as_str(), width, self.fonts),
            None => Vec::new(),
        }
    }

    fn text_line(&mut self, x: f32, y: f32, text: &str, font: ResolvedFont, color: Rgba) {
        if let Some(t) = safe_text(text) {
            let leading = ((font.line_pt() - font.size) / 2.0).max(0.0);
            self.surface.text(x, y + leading, t, font, color);
        }
    }

    /// Draw wrapped lines inside a box `width` wide. Returns the height used.
    #[allow(clippy::too_many_arguments)]
    fn text_lines(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        lines: &[String],
        font: ResolvedFont,
        color: Color,
        align: Alignment,
    ) -> f32 {
        let color = self.paint(color);
        let step = font.line_pt();
        for (i, line) in lines.iter().enumerate() {
            let w = self.measure(line, font);
            let dx = match align {
                Alignment::Left => 0.0,
                Alignment::Center => ((width - w) / 2.0).max(0.0),
                Alignment::Right => (width - w).max(0.0),
            };
            self.text_line(x + dx, y + i as f32 * step, line, font, color);
        }
        lines.len() as f32 * step
    }

    fn fill(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, fill: Fill) {
        match fill {
            Fill::None => {}
            Fill::Solid(c) => {
                let color = self.paint(c);
                self.surface.fill_rect(x, y, w, h, r, color);
            }
            Fill::Gradient(g) => {
                let (from, to) = (self.paint(g.from), self.paint(g.to));
                self.surface.fill_gradient(x, y, w, h, r, from, to, g.axis);
            }
        }
    }

    fn framed(&self, prominent: bool) -> bool {
        let look = &self.style.card;
        prominent || look.fill != Fill::None || look.border.is_some()
    }

    fn pad(&self, prominent: bool) -> f32 {
        if self.framed(prominent) {
            CARD_PAD
        } else {
            0.0
        }
    }

    fn title_height(&self, key: SectionKey) -> f32 {
        let band = if self.style.card.band.is_some() { 6.0 } else { 0.0 };
        self.font(key, TextRole::Header).line_pt() + band
    }

    /// Card chrome in fixed z-order: shadow layers, fill, border, title band.
    fn card(&mut self, x: f32, y: f32, w: f32, h: f32, title_h: f32, prominent: bool) {
        let look = self.style.card.clone();
        let bg = self.backdrop();
        for layer in &look.shadows {
            let s = layer.spread;
            let color = blend(Color::BLACK.to_array(), layer.alpha, bg);
            self.surface
                .fill_rect(x - s, y + layer.offset_y - s, w + 2.0 * s, h + 2.0 * s, look.radius + s, color);
        }
        self.fill(x, y, w, h, look.radius, look.fill);
        if prominent {
            let accent = self.paint(self.style.palette.accent);
            self.surface.stroke_rect(x, y, w, h, look.radius, 1.5, accent);
        } else if let Some((width, color)) = look.border {
            let color = self.paint(color);
            self.surface.stroke_rect(x, y, w, h, look.radius, width, color);
        }
        if let Some(band) = look.band {
            let color = self.paint(band);
            self.surface.fill_band(x, y, w, CARD_PAD + title_h, look.radius, color);
        }
    }

    fn card_title(&mut self, x: f32, y: f32, text: &str, key: SectionKey, prominent: bool) {
        let font = self.font(key, TextRole::Header);
        let p = self.style.palette;
        let color = self.paint(if prominent { p.accent } else { p.primary });
        let inset = if self.style.card.band.is_some() { 3.0 } else { 0.0 };
        self.text_line(x, y + inset, text, font, color);
    }
}

// ---------------------------------------------------------------------------
// List cards
// ---------------------------------------------------------------------------

/// A card whose body is a sequence of entries that may continue on later
/// pages. Each continuation repeats the title and column headers.
struct ListCard<'b> {
    key: SectionKey,
    title: &'b SectionTitle,
    prominent: bool,
    /// Height of the column-header row.
    lead: f32,
    heights: Vec<f32>,
    /// List rows held by each entry; 0 for trailers.
    counts: Vec<usize>,
}

fn draw_list_card<S: Surface>(
    ctx: &mut DrawContext<S>,
    card: &ListCard,
    mut draw_lead: impl FnMut(&mut DrawContext<S>, f32),
    mut draw_entry: impl FnMut(&mut DrawContext<S>, usize, f32),
) -> f32 {
    let pad = ctx.pad(card.prominent);
    let title_h = ctx.title_height(card.key);
    let gap = ctx.c.layout.spacing.item_gap;
    let chrome = pad * 2.0 + title_h + gap + card.lead;
    let n = card.heights.len();
    let mut next = 0;
    let mut part = 0;
    loop {
        ctx.ensure_space(chrome + card.heights.get(next).copied().unwrap_or(0.0));
        let start = next;
        let mut height = chrome;
        // Rows are taken one at a time; the first row of a part is always
        // taken so an oversized row cannot stall the loop.
        while next < n {
            let h = card.heights[next];
            if next > start && !ctx.fits(height + h) {
                break;
            }
            height += h;
            next += 1;
        }

        let (x, y, w) = (ctx.margin, ctx.y, ctx.width);
        ctx.card(x, y, w, height, title_h, card.prominent);
        let title = if part == 0 {
            card.title.display()
        } else {
            format!("{} (continued)", card.title.display())
        };
        ctx.card_title(x + pad, y + pad, &title, card.key, card.prominent);

        let mut cy = y + pad + title_h + gap;
        if card.lead > 0.0 {
            draw_lead(ctx, cy);
            cy += card.lead;
        }
        for i in start..next {
            draw_entry(ctx, i, cy);
            cy += card.heights[i];
            ctx.count_rows(card.key, card.counts[i]);
        }
        ctx.y = y + height + ctx.c.layout.spacing.section_gap;
        part += 1;
        if next >= n {
            break;
        }
        log::debug!("{} continues on the next page after {next} entries", card.key.as_str());
    }
    ctx.y
}

/// Column widths proportional to `grows` across `width`.
fn column_widths(grows: &[f32], width: f32) -> Vec<f32> {
    let total: f32 = grows.iter().sum();
    grows.iter().map(|g| width * g / total.max(f32::EPSILON)).collect()
}

/// Wrapped cell contents and the resulting row height.
fn table_row<S: Surface>(
    ctx: &DrawContext<S>,
    cells: &[(&str, ResolvedFont)],
    widths: &[f32],
    pad: (f32, f32),
) -> (Vec<Vec<String>>, f32) {
    let mut tallest: f32 = 0.0;
    let wrapped = cells
        .iter()
        .zip(widths)
        .map(|((text, font), w)| {
            let lines = ctx.wrap(text, *font, w - 2.0 * pad.0);
            tallest = tallest.max(lines.len() as f32 * font.line_pt());
            lines
        })
        .collect();
    (wrapped, tallest + 2.0 * pad.1)
}

#[allow(clippy::too_many_arguments)]
fn draw_table_row<S: Surface>(
    ctx: &mut DrawContext<S>,
    x: f32,
    y: f32,
    height: f32,
    cells: &[(Vec<String>, ResolvedFont, Color)],
    widths: &[f32],
    pad: (f32, f32),
    striped: bool,
) {
    let p = ctx.style.palette;
    let w: f32 = widths.iter().sum();
    if striped {
        let color = ctx.paint(p.surface);
        ctx.surface.fill_rect(x, y, w, height, 0.0, color);
    }
    let mut cx = x;
    for ((lines, font, color), cw) in cells.iter().zip(widths) {
        ctx.text_lines(cx + pad.0, y + pad.1, cw - 2.0 * pad.0, lines, *font, *color, Alignment::Left);
        cx += cw;
    }
    let rule = ctx.paint(p.border);
    ctx.surface.line(x, y + height, x + w, y + height, 0.5, rule);
}

#[allow(clippy::too_many_arguments)]
fn draw_column_heads<S: Surface>(
    ctx: &mut DrawContext<S>,
    key: SectionKey,
    x0: f32,
    y: f32,
    columns: &[&str],
    widths: &[f32],
    pad: (f32, f32),
) {
    let font = ResolvedFont {
        weight: 700,
        ..ctx.font(key, TextRole::Caption)
    };
    let muted = ctx.style.palette.muted();
    let mut cx = x0;
    for (name, cw) in columns.iter().zip(widths) {
        let label = vec![name.to_uppercase()];
        ctx.text_lines(cx + pad.0, y + pad.1, cw - 2.0 * pad.0, &label, font, muted, Alignment::Left);
        cx += cw;
    }
    let h = font.line_pt() + 2.0 * pad.1;
    let rule = ctx.paint(ctx.style.palette.border);
    ctx.surface.line(x0, y + h, cx, y + h, 1.0, rule);
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn logo_size(logo: &LogoRef) -> (f32, f32) {
    let aspect = decode_data_uri(&logo.url)
        .ok()
        .and_then(|bytes| ::image::load_from_memory(&bytes).ok())
        .map(|img| img.width() as f32 / img.height().max(1) as f32)
        .unwrap_or(1.0);
    (logo.height * aspect, logo.height)
}

fn draw_logo_row<S: Surface>(ctx: &mut DrawContext<S>, logos: &[&LogoRef], justify: JustifyContent, x: f32, y: f32, width: f32) -> f32 {
    if logos.is_empty() {
        return 0.0;
    }
    let sizes: Vec<(f32, f32)> = logos.iter().map(|l| logo_size(l)).collect();
    let total = sizes.iter().map(|s| s.0).sum::<f32>() + 8.0 * (sizes.len() - 1) as f32;
    let tallest = sizes.iter().map(|s| s.1).fold(0.0, f32::max);
    let mut cx = match justify {
        JustifyContent::Center => x + (width - total) / 2.0,
        JustifyContent::End => x + width - total,
        _ => x,
    };
    for (logo, (w, h)) in logos.iter().zip(sizes) {
        ctx.surface.image(&logo.url, cx, y + (tallest - h) / 2.0, w, h);
        cx += w + 8.0;
    }
    tallest
}

/// Stacked text lines with their fonts and colours.
type Stack = Vec<(Vec<String>, ResolvedFont, Color)>;

fn stack_height(stack: &Stack, gap: f32) -> f32 {
    let body: f32 = stack.iter().map(|(l, f, _)| l.len() as f32 * f.line_pt()).sum();
    body + gap * stack.len().saturating_sub(1) as f32
}

fn draw_badge<S: Surface>(ctx: &mut DrawContext<S>, x: f32, y: f32, label: &str) -> (f32, f32) {
    let font = ResolvedFont {
        weight: 700,
        ..ctx.font(SectionKey::Header, TextRole::Caption)
    };
    let (w, h) = (ctx.measure(label, font) + 12.0, font.line_pt() + 4.0);
    let bg = if label == "EMERGENCY" {
        EMERGENCY_RED
    } else {
        ctx.style.palette.accent
    };
    let bg = ctx.paint(bg);
    ctx.surface.fill_rect(x, y, w, h, 3.0, bg);
    let white = ctx.paint(Color::WHITE);
    ctx.text_line(x + 6.0, y + 2.0, label, font, white);
    (w, h)
}

fn draw_header<S: Surface>(ctx: &mut DrawContext<S>, h: &HeaderBlock) -> f32 {
    let key = SectionKey::Header;
    let p = ctx.style.palette;
    let minimal = h.style == HeaderStyle::Minimal;
    let creative = h.style == HeaderStyle::Creative;
    let fg = if minimal { p.primary } else { ctx.style.header_text };
    let sub = if minimal { p.muted() } else { fg };
    let (pad_x, pad_y) = match h.style {
        HeaderStyle::Minimal => (0.0, 8.0),
        HeaderStyle::Corporate => (16.0, 12.0),
        _ => (16.0, 16.0),
    };
    let (x, width) = (ctx.margin, ctx.width);

    let (inside, above): (Vec<&LogoRef>, Vec<&LogoRef>) = h.logos.iter().partition(|l| logo_placement(l.position).0);
    fn group<'l>(logos: &[&'l LogoRef], j: JustifyContent) -> Vec<&'l LogoRef> {
        logos
            .iter()
            .copied()
            .filter(|l| logo_placement(l.position).1 == j)
            .collect()
    }
    let justifies = [JustifyContent::Start, JustifyContent::Center, JustifyContent::End];
    let above_h: f32 = justifies
        .iter()
        .map(|&j| group(&above, j))
        .filter(|g| !g.is_empty())
        .map(|g| g.iter().map(|l| l.height).fold(0.0, f32::max) + 6.0)
        .sum();

    let logos_w = |logos: &[&LogoRef]| -> f32 { logos.iter().map(|l| logo_size(l).0 + 12.0).sum() };
    let (start, center, end) = (
        group(&inside, JustifyContent::Start),
        group(&inside, JustifyContent::Center),
        group(&inside, JustifyContent::End),
    );
    let inside_h = inside.iter().map(|l| l.height).fold(0.0, f32::max);

    let title_font = ctx.font(key, TextRole::Title);
    let small = ctx.font(key, TextRole::Small);
    let date_font = ctx.font(key, TextRole::Header);
    let body = ctx.font(key, TextRole::Body);
    let badge_h = h
        .urgency
        .as_ref()
        .map_or(0.0, |_| ctx.font(key, TextRole::Caption).line_pt() + 4.0 + 2.0);

    let mut meta: Stack = vec![(ctx.wrap(&h.date, date_font, width), date_font, fg)];
    if let Some(call) = &h.call_time {
        meta.push((ctx.wrap(call, body, width), body, sub));
    }
    let mut meta_w: f32 = 0.0;
    if !creative {
        for (lines, font, _) in &meta {
            for line in lines {
                meta_w = meta_w.max(ctx.measure(line, *font));
            }
        }
    }
    let lead_w = if creative {
        width - 2.0 * pad_x
    } else {
        (width - 2.0 * pad_x - meta_w - logos_w(&start) - logos_w(&center) - logos_w(&end) - 12.0).max(width * 0.3)
    };

    let mut lead: Stack = Vec::new();
    if let Some(company) = &h.company {
        let text = if h.style == HeaderStyle::Corporate {
            company.to_uppercase()
        } else {
            company.clone()
        };
        lead.push((ctx.wrap(&text, small, lead_w), small, sub));
    }
    lead.push((ctx.wrap(&h.title, title_font, lead_w), title_font, fg));
    if let Some(series) = &h.series_line {
        lead.push((ctx.wrap(series, small, lead_w), small, sub));
    }

    let content_h = if creative {
        let logos = if inside.is_empty() { 0.0 } else { inside_h + 4.0 };
        logos + stack_height(&lead, 2.0) + 4.0 + stack_height(&meta, 2.0) + badge_h
    } else {
        stack_height(&lead, 2.0)
            .max(stack_height(&meta, 2.0) + badge_h)
            .max(inside_h)
    };
    let band_h = content_h + 2.0 * pad_y;
    ctx.ensure_space(above_h + band_h);

    for j in justifies {
        let row = group(&above, j);
        let top = ctx.y;
        let used = draw_logo_row(ctx, &row, j, x, top, width);
        if used > 0.0 {
            ctx.y += used + 6.0;
        }
    }

    let y = ctx.y;
    match h.style {
        HeaderStyle::Minimal => {
            let rule = ctx.paint(p.primary);
            ctx.surface.line(x, y + band_h, x + width, y + band_h, 1.5, rule);
        }
        HeaderStyle::Corporate => ctx.fill(x, y, width, band_h, 0.0, ctx.style.header),
        HeaderStyle::Professional | HeaderStyle::Creative => {
            ctx.fill(x, y, width, band_h, ctx.style.card.radius, ctx.style.header)
        }
    }

    let inner_x = x + pad_x;
    let inner_w = width - 2.0 * pad_x;
    let mut cy = y + pad_y;
    if creative {
        if !inside.is_empty() {
            draw_logo_row(ctx, &inside, JustifyContent::Center, inner_x, cy, inner_w);
            cy += inside_h + 4.0;
        }
        for (lines, font, color) in lead.iter().chain(meta.iter()) {
            cy += ctx.text_lines(inner_x, cy, inner_w, lines, *font, *color, Alignment::Center) + 2.0;
        }
        if let Some(urgency) = &h.urgency {
            let font = ResolvedFont {
                weight: 700,
                ..ctx.font(key, TextRole::Caption)
            };
            let w = ctx.measure(urgency, font) + 12.0;
            draw_badge(ctx, inner_x + (inner_w - w) / 2.0, cy + 2.0, urgency);
        }
    } else {
        let mut lx = inner_x;
        if !start.is_empty() {
            let used = logos_w(&start);
            draw_logo_row(ctx, &start, JustifyContent::Start, lx, cy + (content_h - inside_h) / 2.0, used);
            lx += used;
        }
        let mut ly = cy;
        for (lines, font, color) in &lead {
            ly += ctx.text_lines(lx, ly, lead_w, lines, *font, *color, Alignment::Left) + 2.0;
        }
        if !center.is_empty() {
            draw_logo_row(ctx, &center, JustifyContent::Center, inner_x, cy + (content_h - inside_h) / 2.0, inner_w);
        }
        let end_w = logos_w(&end);
        if !end.is_empty() {
            draw_logo_row(ctx, &end, JustifyContent::End, inner_x, cy + (content_h - inside_h) / 2.0, inner_w);
        }
        let meta_right = inner_x + inner_w - end_w;
        let mut my = cy;
        for (lines, font, color) in &meta {
            my += ctx.text_lines(meta_right - meta_w, my, meta_w, lines, *font, *color, Alignment::Right) + 2.0;
        }
        if let Some(urgency) = &h.urgency {
            let font = ResolvedFont {
                weight: 700,
                ..ctx.font(key, TextRole::Caption)
            };
            let w = ctx.measure(urgency, font) + 12.0;
            draw_badge(ctx, meta_right - w, my + 2.0, urgency);
        }
    }
    y + band_h + ctx.c.layout.spacing.section_gap
}

fn draw_details<S: Surface>(ctx: &mut DrawContext<S>, d: &DetailsBlock) -> f32 {
    let key = SectionKey::Details;
    let p = ctx.style.palette;
    let cols = if ctx.c.layout.orientation == Orientation::Landscape { 3 } else { 2 };
    let gap = ctx.c.layout.spacing.item_gap;
    let inner = ctx.width - 2.0 * ctx.pad(false);
    let col_w = (inner - gap * (cols - 1) as f32) / cols as f32;
    let label_font = ctx.font(key, TextRole::Caption);
    let value_font = ctx.font(key, TextRole::Body);

    let cells: Vec<(Vec<String>, Vec<String>)> = d
        .fields
        .iter()
        .map(|f| {
            (
                ctx.wrap(&f.label.to_uppercase(), label_font, col_w),
                ctx.wrap(&f.value, value_font, col_w),
            )
        })
        .collect();
    let grid: Vec<&[(Vec<String>, Vec<String>)]> = cells.chunks(cols).collect();
    let heights: Vec<f32> = grid
        .iter()
        .map(|row| {
            row.iter()
                .map(|(l, v)| l.len() as f32 * label_font.line_pt() + 1.0 + v.len() as f32 * value_font.line_pt())
                .fold(0.0, f32::max)
                + gap
        })
        .collect();
    let card = ListCard {
        key,
        title: &d.title,
        prominent: false,
        lead: 0.0,
        counts: vec![0; heights.len()],
        heights,
    };
    draw_list_card(
        ctx,
        &card,
        |_, _| {},
        |ctx, i, y| {
            let x0 = ctx.margin + ctx.pad(false);
            for (j, (label, value)) in grid[i].iter().enumerate() {
                let cx = x0 + j as f32 * (col_w + gap);
                let used = ctx.text_lines(cx, y, col_w, label, label_font, p.muted(), Alignment::Left);
                ctx.text_lines(cx, y + used + 1.0, col_w, value, value_font, p.text, Alignment::Left);
            }
        },
    )
}

fn draw_notes<S: Surface>(ctx: &mut DrawContext<S>, n: &NotesBlock) -> f32 {
    let key = SectionKey::Notes;
    let font = ctx.font(key, TextRole::Body);
    let gap = ctx.c.layout.spacing.item_gap;
    let inner = ctx.width - 2.0 * ctx.pad(false);
    let paragraphs: Vec<Vec<String>> = n.paragraphs.iter().map(|p| ctx.wrap(p, font, inner)).collect();
    let heights: Vec<f32> = paragraphs
        .iter()
        .map(|lines| lines.len() as f32 * font.line_pt() + gap)
        .collect();
    let card = ListCard {
        key,
        title: &n.title,
        prominent: false,
        lead: 0.0,
        counts: vec![0; heights.len()],
        heights,
    };
    let color = ctx.style.palette.text;
    draw_list_card(
        ctx,
        &card,
        |_, _| {},
        |ctx, i, y| {
            let x = ctx.margin + ctx.pad(false);
            ctx.text_lines(x, y, inner, &paragraphs[i], font, color, Alignment::Left);
        },
    )
}

fn draw_schedule<S: Surface>(ctx: &mut DrawContext<S>, s: &ScheduleBlock) -> f32 {
    let key = SectionKey::Schedule;
    let p = ctx.style.palette;
    let font = ctx.font(key, if s.compact { TextRole::Small } else { TextRole::Body });
    let pad = if s.compact { (3.0, 1.5) } else { (4.0, 3.0) };
    let grows: Vec<f32> = s
        .columns
        .iter()
        .map(|c| if *c == "Description" { 2.5 } else { 1.0 })
        .collect();
    let widths = column_widths(&grows, ctx.width - 2.0 * ctx.pad(false));

    let mut rows = Vec::with_capacity(s.rows.len());
    let mut heights = Vec::with_capacity(s.rows.len() + 1);
    for row in &s.rows {
        let cells: Vec<(&str, ResolvedFont)> = s.cells(row).into_iter().map(|t| (t, font)).collect();
        let (wrapped, h) = table_row(ctx, &cells, &widths, pad);
        rows.push(wrapped);
        heights.push(h);
    }
    let mut counts = vec![1; rows.len()];
    let small = ctx.font(key, TextRole::Small);
    if s.total_pages.is_some() {
        heights.push(small.line_pt() + 4.0);
        counts.push(0);
    }
    let lead = ctx.font(key, TextRole::Caption).line_pt() + 2.0 * pad.1;
    let card = ListCard {
        key,
        title: &s.title,
        prominent: false,
        lead,
        heights,
        counts,
    };
    draw_list_card(
        ctx,
        &card,
        |ctx, y| {
            let x = ctx.margin + ctx.pad(false);
            draw_column_heads(ctx, key, x, y, &s.columns, &widths, pad)
        },
        |ctx, i, y| match rows.get(i) {
            Some(cells) => {
                let cells: Vec<(Vec<String>, ResolvedFont, Color)> =
                    cells.iter().map(|l| (l.clone(), font, p.text)).collect();
                let h = card_row_height(&cells, pad);
                let x = ctx.margin + ctx.pad(false);
                draw_table_row(ctx, x, y, h, &cells, &widths, pad, s.alternate_rows && i % 2 == 1);
            }
            None => {
                if let Some(total) = &s.total_pages {
                    let x = ctx.margin + ctx.pad(false);
                    let w = ctx.width - 2.0 * ctx.pad(false);
                    let line = vec![format!("Total pages: {total}")];
                    ctx.text_lines(x, y + 4.0, w, &line, small, p.muted(), Alignment::Right);
                }
            }
        },
    )
}

fn card_row_height(cells: &[(Vec<String>, ResolvedFont, Color)], pad: (f32, f32)) -> f32 {
    cells
        .iter()
        .map(|(l, f, _)| l.len() as f32 * f.line_pt())
        .fold(0.0, f32::max)
        + 2.0 * pad.1
}

fn draw_contacts<S: Surface>(ctx: &mut DrawContext<S>, block: &ContactBlock) -> f32 {
    let key = block.key;
    let p = ctx.style.palette;
    let body_color = if block.prominent { p.accent } else { p.text };
    let body = ctx.font(key, TextRole::Body);
    let bold = ResolvedFont { weight: 700, ..body };
    let small = ctx.font(key, TextRole::Small);
    let pad = ctx.pad(block.prominent);
    let inner = ctx.width - 2.0 * pad;
    let gap = ctx.c.layout.spacing.item_gap;

    // The optional hospital note trails as an entry holding no rows.
    let mut entries: Vec<Stack> = Vec::new();
    let mut heights = Vec::new();
    let mut counts = Vec::new();
    let mut lead = 0.0;
    let mut columns: Vec<&str> = Vec::new();
    let mut widths: Vec<f32> = Vec::new();
    let cell_pad = (4.0, 3.0);

    let note_line = block
        .note
        .as_ref()
        .map(|n| ctx.wrap(&format!("{}: {}", n.label, n.value), bold, inner));

    match block.layout {
        ContactLayout::Table => {
            let detail = match key {
                SectionKey::Cast => "Character",
                SectionKey::Crew => "Department",
                _ => "Relation",
            };
            columns = vec!["Name", "Role", detail, "Phone", "Email"];
            widths = column_widths(&[1.2, 1.0, 1.0, 1.0, 1.6], inner);
            lead = ctx.font(key, TextRole::Caption).line_pt() + 2.0 * cell_pad.1;
            for r in &block.rows {
                let texts = [
                    (r.name.as_str(), bold, body_color),
                    (r.role.as_deref().unwrap_or(""), body, p.text),
                    (r.detail.as_deref().unwrap_or(""), body, r.tint.unwrap_or(p.text)),
                    (r.phone.as_deref().unwrap_or(""), body, p.text),
                    (r.email.as_deref().unwrap_or(""), small, p.muted()),
                ];
                let cells: Stack = texts
                    .iter()
                    .zip(&widths)
                    .map(|((t, f, c), w)| (ctx.wrap(t, *f, w - 2.0 * cell_pad.0), *f, *c))
                    .collect();
                heights.push(card_row_height(&cells, cell_pad));
                counts.push(1);
                entries.push(cells);
            }
        }
        ContactLayout::Cards => {
            let cols = if ctx.c.layout.orientation == Orientation::Landscape { 4 } else { 3 };
            let spacing = ctx.c.layout.spacing.card_spacing;
            let cell_w = (inner - spacing * (cols - 1) as f32) / cols as f32;
            widths = vec![cell_w; cols];
            for chunk in block.rows.chunks(cols) {
                let mut tallest: f32 = 0.0;
                // Two stacks per card: the name, then its detail lines.
                let mut cells: Stack = Vec::new();
                for r in chunk {
                    let name = ctx.wrap(&r.name, bold, cell_w - 12.0);
                    let name_h = name.len() as f32 * bold.line_pt();
                    let mut rest = Vec::new();
                    for l in r.lines() {
                        rest.extend(ctx.wrap(l, small, cell_w - 12.0));
                    }
                    tallest = tallest.max(name_h + rest.len() as f32 * small.line_pt() + 12.0);
                    cells.push((name, bold, body_color));
                    cells.push((rest, small, r.tint.unwrap_or(p.muted())));
                }
                heights.push(tallest + spacing);
                counts.push(chunk.len());
                entries.push(cells);
            }
        }
        ContactLayout::Compact => {
            for r in &block.rows {
                let mut parts = vec![r.name.as_str()];
                parts.extend(r.lines());
                let lines = ctx.wrap(&parts.join(" \u{00B7} "), small, inner - 10.0);
                heights.push(lines.len() as f32 * small.line_pt() + 2.0);
                counts.push(1);
                entries.push(vec![(lines, small, r.tint.unwrap_or(body_color))]);
            }
        }
    }
    if let Some(lines) = &note_line {
        heights.push(lines.len() as f32 * bold.line_pt() + gap);
        counts.push(0);
    }

    let card = ListCard {
        key,
        title: &block.title,
        prominent: block.prominent,
        lead,
        heights,
        counts,
    };
    let layout = block.layout;
    let striped = block.alternate_rows;
    let spacing = ctx.c.layout.spacing.card_spacing;
    draw_list_card(
        ctx,
        &card,
        |ctx, y| {
            if layout == ContactLayout::Table {
                let x = ctx.margin + pad;
                draw_column_heads(ctx, key, x, y, &columns, &widths, cell_pad);
            }
        },
        |ctx, i, y| {
            let x0 = ctx.margin + pad;
            let Some(cells) = entries.get(i) else {
                if let Some(lines) = &note_line {
                    ctx.text_lines(x0, y + gap / 2.0, inner, lines, bold, body_color, Alignment::Left);
                }
                return;
            };
            match layout {
                ContactLayout::Table => {
                    let h = card_row_height(cells, cell_pad);
                    draw_table_row(ctx, x0, y, h, cells, &widths, cell_pad, striped && i % 2 == 1);
                }
                ContactLayout::Cards => {
                    let h = card.heights[i] - spacing;
                    for (j, pair) in cells.chunks(2).enumerate() {
                        let cx = x0 + j as f32 * (widths[0] + spacing);
                        let edge = ctx.paint(pair[1].2);
                        if striped {
                            let fill = ctx.paint(ctx.style.palette.surface);
                            ctx.surface.fill_rect(cx, y, widths[0], h, ctx.style.card.radius / 2.0, fill);
                        }
                        ctx.surface.stroke_rect(cx, y, widths[0], h, ctx.style.card.radius / 2.0, 0.5, edge);
                        let mut ty = y + 6.0;
                        for (lines, font, color) in pair {
                            ty += ctx.text_lines(cx + 6.0, ty, widths[0] - 12.0, lines, *font, *color, Alignment::Left);
                        }
                    }
                }
                ContactLayout::Compact => {
                    let (lines, font, color) = &cells[0];
                    let dot = ctx.paint(*color);
                    ctx.surface.fill_circle(x0 + 3.0, y + font.line_pt() / 2.0, 1.5, dot);
                    ctx.text_lines(x0 + 10.0, y, inner - 10.0, lines, *font, *color, Alignment::Left);
                }
            }
        },
    )
}

fn draw_footer<S: Surface>(ctx: &mut DrawContext<S>, f: &FooterBlock) -> f32 {
    let key = SectionKey::Footer;
    let p = ctx.style.palette;
    let small = ctx.font(key, TextRole::Small);
    let caption = ctx.font(key, TextRole::Caption);
    let width = ctx.width;
    let mut stack: Stack = Vec::new();
    if let Some(company) = &f.company {
        stack.push((ctx.wrap(company, small, width), small, p.muted()));
    }
    for text in [&f.text, &f.union_line].into_iter().flatten() {
        stack.push((ctx.wrap(text, caption, width), caption, p.muted()));
    }
    let rule = if f.style == FooterStyle::Minimal { 0.0 } else { 4.5 };
    let height = rule + stack_height(&stack, 2.0);
    ctx.ensure_space(height);

    let (x, mut y) = (ctx.margin, ctx.y);
    if rule > 0.0 {
        let color = ctx.paint(p.border);
        ctx.surface.line(x, y, x + width, y, 0.5, color);
        y += rule;
    }
    for (lines, font, color) in &stack {
        y += ctx.text_lines(x, y, width, lines, *font, *color, f.alignment) + 2.0;
    }
    y
}

fn draw_divider<S: Surface>(ctx: &mut DrawContext<S>) -> f32 {
    let gap = ctx.c.layout.spacing.section_gap;
    let (x, w) = (ctx.margin, ctx.width);
    match ctx.style.divider {
        Divider::Line { width, color } => {
            ctx.ensure_space(width + gap);
            let color = ctx.paint(color);
            let y = ctx.y;
            ctx.surface.line(x, y, x + w, y, width, color);
            y + width + gap
        }
        Divider::Gap(h) => ctx.y + h,
        Divider::Bar { height, color } => {
            ctx.ensure_space(height + gap);
            let color = ctx.paint(color);
            let y = ctx.y;
            ctx.surface.fill_rect(x, y, w, height, height / 2.0, color);
            y + height + gap
        }
        Divider::None => ctx.y,
    }
}

/// Draw a callsheet onto `surface`.
///
/// Inputs are validated before the first primitive is issued; a failing
/// validation leaves the surface untouched.
pub fn draw_document<S: Surface>(
    surface: &mut S,
    sheet: &Callsheet,
    c: &PdfCustomization,
    fonts: &FontManager,
) -> Result<DrawSummary> {
    let c = checked_inputs(sheet, c)?;

    let plan = plan_document(sheet, &c);
    let mut ctx = DrawContext::new(surface, &c, fonts, plan.watermark.clone());
    ctx.new_page();

    let last_middle = plan
        .sections
        .iter()
        .rposition(|s| !matches!(s, SectionBlock::Header(_) | SectionBlock::Footer(_)));
    for (i, section) in plan.sections.iter().enumerate() {
        ctx.y = match section {
            SectionBlock::Header(h) => draw_header(&mut ctx, h),
            SectionBlock::Details(d) => draw_details(&mut ctx, d),
            SectionBlock::Notes(n) => draw_notes(&mut ctx, n),
            SectionBlock::Schedule(s) => draw_schedule(&mut ctx, s),
            SectionBlock::Contacts(b) => draw_contacts(&mut ctx, b),
            SectionBlock::Footer(f) => draw_footer(&mut ctx, f),
        };
        let middle = !matches!(section, SectionBlock::Header(_) | SectionBlock::Footer(_));
        if middle && Some(i) != last_middle {
            ctx.y = draw_divider(&mut ctx);
        }
    }
    Ok(ctx.summary())
}

/// Render a callsheet by drawing primitives directly into a PDF.
pub fn render_direct(sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<Vec<u8>> {
    let mut surface = PdfSurface::new(sheet.project_title.trim());
    let summary = draw_document(&mut surface, sheet, c, fonts)?;
    log::debug!(
        "direct backend drew {} page(s), rows {:?}",
        summary.pages,
        summary.rows
    );
    surface.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsheet::Contact;
    use crate::customization::{CardStyle, Logo, LogoPosition, LogoSize};
    use crate::samples::{sample_callsheet, SAMPLE_LOGO};

    fn draw(sheet: &Callsheet, c: &PdfCustomization) -> (RecordingSurface, DrawSummary) {
        let mut surface = RecordingSurface::new();
        let summary = draw_document(&mut surface, sheet, c, &FontManager::default()).unwrap();
        (surface, summary)
    }

    fn crew_member(i: usize) -> Contact {
        Contact {
            name: format!("Crew Member {i:03}"),
            role: "Grip".into(),
            phone: format!("555-{i:04}"),
            email: None,
            character: None,
            department: Some("Grip & Electric".into()),
        }
    }

    #[test]
    fn validation_happens_before_any_drawing() {
        let mut sheet = sample_callsheet();
        sheet.project_title = "   ".into();
        let mut surface = RecordingSurface::new();
        let err = draw_document(&mut surface, &sheet, &PdfCustomization::default(), &FontManager::default()).unwrap_err();
        assert!(matches!(err, CallsheetError::Validation { ref field, .. } if field == "projectTitle"));
        assert!(surface.ops.is_empty());
    }

    #[test]
    fn long_lists_span_pages_without_losing_rows() {
        let mut sheet = sample_callsheet();
        sheet.crew = (0..90).map(crew_member).collect();
        let (surface, summary) = draw(&sheet, &PdfCustomization::default());

        assert!(summary.pages > 1, "expected overflow onto a second page");
        assert_eq!(summary.pages, surface.pages());
        assert_eq!(summary.rows_for(SectionKey::Crew), 90);
        for i in 0..90 {
            let name = format!("Crew Member {i:03}");
            assert_eq!(surface.texts().iter().filter(|t| **t == name).count(), 1, "{name}");
        }

        let pages = surface.page_texts();
        assert_eq!(pages.len(), summary.pages);
        let page_of = |name: &str| pages.iter().position(|p| p.contains(&name)).unwrap();
        assert!(page_of("Crew Member 000") < page_of("Crew Member 089"));
    }

    #[test]
    fn every_page_starts_with_its_background() {
        let mut sheet = sample_callsheet();
        sheet.crew = (0..90).map(crew_member).collect();
        let (surface, _) = draw(&sheet, &PdfCustomization::default());
        for (i, op) in surface.ops.iter().enumerate() {
            if let Primitive::Page { width, height } = op {
                match &surface.ops[i + 1] {
                    Primitive::Fill { x, y, w, h, .. } => {
                        assert_eq!((*x, *y, *w, *h), (0.0, 0.0, *width, *height));
                    }
                    other => panic!("page began with {other:?}"),
                }
            }
        }
    }

    #[test]
    fn card_layers_keep_their_order() {
        let mut c = PdfCustomization::default();
        c.visual.card_style = CardStyle::Bordered;
        let (surface, _) = draw(&sample_callsheet(), &c);
        let band = surface
            .ops
            .iter()
            .position(|op| matches!(op, Primitive::Band { .. }))
            .expect("bordered cards have a title band");
        let Primitive::Band { x, y, w, .. } = surface.ops[band] else {
            unreachable!()
        };
        assert!(matches!(surface.ops[band - 1], Primitive::Stroke { x: sx, y: sy, w: sw, .. } if (sx, sy, sw) == (x, y, w)));
        assert!(matches!(surface.ops[band - 2], Primitive::Fill { x: fx, y: fy, w: fw, .. } if (fx, fy, fw) == (x, y, w)));
    }

    #[test]
    fn blank_emails_draw_nothing() {
        let mut sheet = sample_callsheet();
        for contact in sheet.cast.iter_mut().chain(sheet.crew.iter_mut()) {
            contact.email = Some("   ".into());
        }
        sheet.emergency_contacts.clear();
        let (surface, _) = draw(&sheet, &PdfCustomization::default());
        assert!(surface.texts().iter().all(|t| !t.contains('@')));
        assert!(surface.texts().iter().all(|t| !t.trim().is_empty()));
    }

    #[test]
    fn hidden_schedule_draws_no_rows() {
        let mut c = PdfCustomization::default();
        c.sections.visibility.schedule = false;
        let (_, summary) = draw(&sample_callsheet(), &c);
        assert_eq!(summary.rows_for(SectionKey::Schedule), 0);

        c.sections.visibility.schedule = true;
        let (_, summary) = draw(&sample_callsheet(), &c);
        assert_eq!(summary.rows_for(SectionKey::Schedule), sample_callsheet().schedule.len());
    }

    #[test]
    fn every_contact_layout_counts_each_contact() {
        let sheet = sample_callsheet();
        for layout in [ContactLayout::Table, ContactLayout::Cards, ContactLayout::Compact] {
            let mut c = PdfCustomization::default();
            c.sections.formatting.contact_layout = layout;
            let (_, summary) = draw(&sheet, &c);
            assert_eq!(summary.rows_for(SectionKey::Cast), sheet.cast.len(), "{layout:?}");
            assert_eq!(summary.rows_for(SectionKey::Crew), sheet.crew.len(), "{layout:?}");
        }
    }

    fn with_logos(positions: &[LogoPosition]) -> PdfCustomization {
        let logo = |position| Logo {
            url: SAMPLE_LOGO.into(),
            position,
            size: LogoSize::Small,
            opacity: 1.0,
        };
        let mut c = PdfCustomization::default();
        c.branding.primary_logo = positions.first().copied().map(logo);
        c.branding.secondary_logo = positions.get(1).copied().map(logo);
        c
    }

    #[test]
    fn header_logos_are_drawn_in_every_placement() {
        for pair in [
            [LogoPosition::TopCenter, LogoPosition::HeaderRight],
            [LogoPosition::HeaderLeft, LogoPosition::HeaderCenter],
            [LogoPosition::TopLeft, LogoPosition::TopRight],
        ] {
            let (surface, _) = draw(&sample_callsheet(), &with_logos(&pair));
            let images = surface
                .ops
                .iter()
                .filter(|op| matches!(op, Primitive::Image { src } if src == SAMPLE_LOGO))
                .count();
            assert_eq!(images, 2, "{pair:?}");
        }
    }

    #[test]
    fn pdf_with_logos_is_stable() {
        let c = with_logos(&[LogoPosition::HeaderLeft, LogoPosition::TopRight]);
        let fonts = FontManager::default();
        let first = render_direct(&sample_callsheet(), &c, &fonts).unwrap();
        let second = render_direct(&sample_callsheet(), &c, &fonts).unwrap();
        assert!(first == second, "repeated renders differ");
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = render_direct(&sample_callsheet(), &PdfCustomization::default(), &FontManager::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }
}
