//! HTML/raster backend.
//!
//! Section blocks are templated into markup with inline `style` attributes,
//! parsed into an isolated [`DocumentContext`], laid out with the shared
//! taffy engine and rasterized into a single full-bleed page image.
//!
//! Only the first laid-out page is captured; content that flows past it is
//! clipped.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::callsheet::Callsheet;
use crate::customization::{
    Alignment, ContactLayout, FooterStyle, HeaderStyle, Orientation, PdfCustomization, SectionKey,
    TextRole,
};
use crate::dom::{body_children, escape, parse_html, DomNode};
use crate::error::{CallsheetError, Result, Stage};
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::{PageLayout, WatermarkLayer};
use crate::pagination::{paginate, PageGeometry};
use crate::raster::{encode_png, rasterize_page, single_page_pdf, DEFAULT_SCALE};
use crate::resolve::{Divider, Fill, ResolvedFont, ResolvedStyle};
use crate::sections::{
    checked_inputs, plan_document, ContactBlock, DetailsBlock, DocumentPlan, FooterBlock, HeaderBlock, LogoRef,
    NotesBlock, ScheduleBlock, SectionBlock, SectionTitle,
};
use crate::style::{build_styled_tree, Color, GradientAxis, JustifyContent, StyledNode};
use crate::tree::{logo_placement, CONTACT_ROW, EMERGENCY_RED, SCHEDULE_ROW, WATERMARK_SIZE};

// ---------------------------------------------------------------------------
// Markup generation
// ---------------------------------------------------------------------------

fn font_css(font: ResolvedFont, color: Color) -> String {
    format!(
        "font-family: {}; font-size: {}px; font-weight: {}; line-height: {}; color: {}",
        font.family.as_str(),
        font.size,
        font.weight,
        font.line_height,
        color.to_hex()
    )
}

fn fill_css(fill: Fill) -> String {
    match fill {
        Fill::None => String::new(),
        Fill::Solid(c) => format!("background-color: {}", c.to_hex()),
        Fill::Gradient(g) => {
            let direction = match g.axis {
                GradientAxis::Horizontal => "to right",
                GradientAxis::Vertical => "to bottom",
                GradientAxis::Diagonal => "to bottom right",
            };
            format!(
                "background: linear-gradient({direction}, {}, {})",
                g.from.to_hex(),
                g.to.to_hex()
            )
        }
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("; ")
}

struct Markup<'a> {
    out: String,
    c: &'a PdfCustomization,
    style: ResolvedStyle,
}

impl<'a> Markup<'a> {
    fn new(c: &'a PdfCustomization) -> Self {
        Self {
            out: String::new(),
            c,
            style: ResolvedStyle::new(c),
        }
    }

    fn open(&mut self, tag: &str, css: &str, label: Option<&str>) {
        let _ = write!(self.out, "<{tag}");
        if !css.is_empty() {
            let _ = write!(self.out, " style=\"{}\"", escape(css));
        }
        if let Some(label) = label {
            let _ = write!(self.out, " data-label=\"{}\"", escape(label));
        }
        self.out.push('>');
    }

    fn close(&mut self, tag: &str) {
        let _ = write!(self.out, "</{tag}>");
    }

    fn leaf(&mut self, tag: &str, css: &str, text: &str, label: Option<&str>) {
        self.open(tag, css, label);
        self.out.push_str(&escape(text));
        self.close(tag);
    }

    fn empty(&mut self, css: &str) {
        self.open("div", css, None);
        self.close("div");
    }

    fn font(&self, key: SectionKey, role: TextRole, color: Color) -> String {
        font_css(self.style.font(Some(key), role), color)
    }

    fn img(&mut self, logo: &LogoRef) {
        let _ = write!(
            self.out,
            "<img src=\"{}\" style=\"height: {}px; flex-shrink: 0; opacity: {}\" data-label=\"logo\">",
            escape(&logo.url),
            logo.height,
            logo.opacity
        );
    }

    fn document(mut self, plan: &DocumentPlan) -> String {
        let _ = write!(
            self.out,
            "<!DOCTYPE html><html><head><title>{}</title></head><body style=\"{}\">",
            escape(&plan.title),
            fill_css(Fill::Solid(self.style.palette.background))
        );
        let last_middle = plan
            .sections
            .iter()
            .rposition(|s| !matches!(s, SectionBlock::Header(_) | SectionBlock::Footer(_)));
        for (i, section) in plan.sections.iter().enumerate() {
            match section {
                SectionBlock::Header(h) => self.header(h),
                SectionBlock::Details(d) => self.details(d),
                SectionBlock::Notes(n) => self.notes(n),
                SectionBlock::Schedule(s) => self.schedule(s),
                SectionBlock::Contacts(c) => self.contacts(c),
                SectionBlock::Footer(f) => self.footer(f),
            }
            let middle = !matches!(section, SectionBlock::Header(_) | SectionBlock::Footer(_));
            if middle && Some(i) != last_middle {
                self.divider();
            }
        }
        self.out.push_str("</body></html>");
        self.out
    }

    fn divider(&mut self) {
        let gap = self.c.layout.spacing.section_gap;
        match self.style.divider {
            Divider::Line { width, color } => self.empty(&format!(
                "height: 0px; border-bottom: {width}px solid {}; margin-bottom: {gap}px",
                color.to_hex()
            )),
            Divider::Gap(h) => self.empty(&format!("height: {h}px")),
            Divider::Bar { height, color } => self.empty(&format!(
                "height: {height}px; background-color: {}; border-radius: {}px; margin-bottom: {gap}px",
                color.to_hex(),
                height / 2.0
            )),
            Divider::None => {}
        }
    }

    fn header(&mut self, h: &HeaderBlock) {
        let key = SectionKey::Header;
        let p = self.style.palette;
        let minimal = h.style == HeaderStyle::Minimal;
        let fg = if minimal { p.primary } else { self.style.header_text };
        let sub = if minimal { p.muted() } else { fg };
        let creative = h.style == HeaderStyle::Creative;

        self.open(
            "header",
            &format!(
                "display: flex; flex-direction: column; margin-bottom: {}px",
                self.c.layout.spacing.section_gap
            ),
            Some(key.as_str()),
        );

        let (inside, above): (Vec<&LogoRef>, Vec<&LogoRef>) =
            h.logos.iter().partition(|l| logo_placement(l.position).0);
        for (justify, css) in [
            (JustifyContent::Start, "flex-start"),
            (JustifyContent::Center, "center"),
            (JustifyContent::End, "flex-end"),
        ] {
            let row: Vec<&LogoRef> = above
                .iter()
                .copied()
                .filter(|l| logo_placement(l.position).1 == justify)
                .collect();
            if row.is_empty() {
                continue;
            }
            self.open(
                "div",
                &format!("display: flex; justify-content: {css}; align-items: center; gap: 8px; margin-bottom: 6px"),
                None,
            );
            for logo in row {
                self.img(logo);
            }
            self.close("div");
        }

        let band = match h.style {
            HeaderStyle::Minimal => format!("padding: 8px 0px; border-bottom: 1.5px solid {}", p.primary.to_hex()),
            HeaderStyle::Professional | HeaderStyle::Creative => join(&[
                &fill_css(self.style.header),
                "padding: 16px",
                &format!("border-radius: {}px", self.style.card.radius),
            ]),
            HeaderStyle::Corporate => join(&[&fill_css(self.style.header), "padding: 12px 16px"]),
        };
        let layout = if creative {
            "display: flex; flex-direction: column; align-items: center; gap: 4px"
        } else {
            "display: flex; flex-direction: row; align-items: center; justify-content: space-between; gap: 12px"
        };
        self.open("div", &join(&[layout, &band]), None);

        let slot = |j: JustifyContent| -> Vec<&LogoRef> {
            inside
                .iter()
                .copied()
                .filter(|l| logo_placement(l.position).1 == j)
                .collect()
        };
        let align = if creative { "; text-align: center" } else { "" };

        if creative {
            for logo in &inside {
                self.img(logo);
            }
        } else {
            for logo in slot(JustifyContent::Start) {
                self.img(logo);
            }
            self.open("div", "display: flex; flex-direction: column; flex-grow: 1; gap: 2px", None);
        }
        if let Some(company) = &h.company {
            let mut css = self.font(key, TextRole::Small, sub);
            if h.style == HeaderStyle::Corporate {
                css.push_str("; text-transform: uppercase");
            }
            css.push_str(align);
            self.leaf("p", &css, company, None);
        }
        let css = self.font(key, TextRole::Title, fg) + align;
        self.leaf("h1", &css, &h.title, None);
        if let Some(series) = &h.series_line {
            let css = self.font(key, TextRole::Small, sub) + align;
            self.leaf("p", &css, series, None);
        }
        if !creative {
            self.close("div");
            for logo in slot(JustifyContent::Center) {
                self.img(logo);
            }
            self.open("div", "display: flex; flex-direction: column; align-items: flex-end; gap: 2px", None);
        }
        let css = self.font(key, TextRole::Header, fg) + align;
        self.leaf("p", &css, &h.date, None);
        if let Some(call) = &h.call_time {
            let css = self.font(key, TextRole::Body, sub) + align;
            self.leaf("p", &css, call, None);
        }
        if let Some(urgency) = &h.urgency {
            let bg = if urgency == "EMERGENCY" {
                EMERGENCY_RED
            } else {
                p.accent
            };
            let css = join(&[
                &self.font(key, TextRole::Caption, Color::WHITE),
                "font-weight: bold",
                &format!("background-color: {}", bg.to_hex()),
                "padding: 2px 6px",
                "border-radius: 3px",
            ]);
            self.leaf("p", &css, urgency, Some("urgency"));
        }
        if !creative {
            self.close("div");
            for logo in slot(JustifyContent::End) {
                self.img(logo);
            }
        }
        self.close("div");
        self.close("header");
    }

    fn open_card(&mut self, key: SectionKey, title: &SectionTitle, prominent: bool) {
        let look = self.style.card.clone();
        let p = self.style.palette;
        let mut css = vec![
            "display: flex".to_string(),
            "flex-direction: column".to_string(),
            format!("gap: {}px", self.c.layout.spacing.item_gap),
            format!("margin-bottom: {}px", self.c.layout.spacing.section_gap),
            format!("border-radius: {}px", look.radius),
            fill_css(look.fill),
        ];
        let framed = look.fill != Fill::None || look.border.is_some() || prominent;
        if framed {
            css.push("padding: 10px".into());
        }
        if prominent {
            css.push(format!("border: 1.5px solid {}", p.accent.to_hex()));
        } else if let Some((w, c)) = look.border {
            css.push(format!("border: {w}px solid {}", c.to_hex()));
        }
        if let Some(deepest) = look.shadows.first() {
            let alpha = look.shadows.iter().map(|l| l.alpha).fold(0.0, f32::max);
            css.push(format!(
                "box-shadow: 0 {}px {}px {}",
                deepest.offset_y,
                look.shadows.len() * 2,
                Color::BLACK.with_alpha(alpha).to_hex()
            ));
        }
        let css: Vec<&str> = css.iter().map(String::as_str).collect();
        self.open("section", &join(&css), Some(key.as_str()));

        let title_color = if prominent { p.accent } else { p.primary };
        let mut heading = self.font(key, TextRole::Header, title_color);
        if let Some(band) = look.band {
            let _ = write!(
                heading,
                "; background-color: {}; padding: 5px 8px; border-radius: {}px",
                band.to_hex(),
                look.radius / 2.0
            );
        }
        self.leaf("h2", &heading, &title.display(), None);
    }

    fn details(&mut self, d: &DetailsBlock) {
        let key = SectionKey::Details;
        let p = self.style.palette;
        self.open_card(key, &d.title, false);
        let columns = if self.c.layout.orientation == Orientation::Landscape { 3 } else { 2 };
        self.open(
            "div",
            &format!(
                "display: grid; grid-template-columns: repeat({columns}, 1fr); gap: {}px",
                self.c.layout.spacing.item_gap
            ),
            None,
        );
        for f in &d.fields {
            self.open("div", "display: flex; flex-direction: column; gap: 1px", None);
            let label = self.font(key, TextRole::Caption, p.muted()) + "; text-transform: uppercase";
            self.leaf("p", &label, &f.label, None);
            let value = self.font(key, TextRole::Body, p.text);
            self.leaf("p", &value, &f.value, None);
            self.close("div");
        }
        self.close("div");
        self.close("section");
    }

    fn notes(&mut self, n: &NotesBlock) {
        let key = SectionKey::Notes;
        self.open_card(key, &n.title, false);
        let css = self.font(key, TextRole::Body, self.style.palette.text);
        for para in &n.paragraphs {
            self.leaf("p", &css, para, None);
        }
        self.close("section");
    }

    fn row_css(&self, index: usize, alternate: bool) -> String {
        let p = self.style.palette;
        let mut css = format!("border-bottom: 0.5px solid {}", p.border.to_hex());
        if alternate && index % 2 == 1 {
            let _ = write!(css, "; background-color: {}", p.surface.to_hex());
        }
        css
    }

    fn header_cells(&mut self, key: SectionKey, columns: &[&str], grows: &[f32], pad: &str) {
        let p = self.style.palette;
        self.open("tr", &format!("border-bottom: 1px solid {}", p.border.to_hex()), None);
        for (name, grow) in columns.iter().zip(grows) {
            let css = join(&[
                &self.font(key, TextRole::Caption, p.muted()),
                "font-weight: bold",
                "text-transform: uppercase",
                &format!("flex: {grow}"),
                pad,
            ]);
            self.leaf("th", &css, name, None);
        }
        self.close("tr");
    }

    fn schedule(&mut self, s: &ScheduleBlock) {
        let key = SectionKey::Schedule;
        let p = self.style.palette;
        let role = if s.compact { TextRole::Small } else { TextRole::Body };
        let pad = if s.compact { "padding: 1.5px 3px" } else { "padding: 3px 4px" };
        let grows: Vec<f32> = s
            .columns
            .iter()
            .map(|c| if *c == "Description" { 2.5 } else { 1.0 })
            .collect();

        self.open_card(key, &s.title, false);
        self.open("table", "", None);
        self.header_cells(key, &s.columns, &grows, pad);
        for (i, row) in s.rows.iter().enumerate() {
            let css = self.row_css(i, s.alternate_rows);
            self.open("tr", &css, Some(SCHEDULE_ROW));
            for (value, grow) in s.cells(row).into_iter().zip(&grows) {
                let css = join(&[&self.font(key, role, p.text), &format!("flex: {grow}"), pad]);
                self.leaf("td", &css, value, None);
            }
            self.close("tr");
        }
        self.close("table");
        if let Some(total) = &s.total_pages {
            let css = self.font(key, TextRole::Small, p.muted()) + "; text-align: right";
            self.leaf("p", &css, &format!("Total pages: {total}"), None);
        }
        self.close("section");
    }

    fn contacts(&mut self, block: &ContactBlock) {
        let key = block.key;
        let p = self.style.palette;
        let body_color = if block.prominent { p.accent } else { p.text };
        self.open_card(key, &block.title, block.prominent);
        match block.layout {
            ContactLayout::Table => {
                let detail = match key {
                    SectionKey::Cast => "Character",
                    SectionKey::Crew => "Department",
                    _ => "Relation",
                };
                let columns = ["Name", "Role", detail, "Phone", "Email"];
                let grows = [1.2, 1.0, 1.0, 1.0, 1.6];
                let pad = "padding: 3px 4px";
                self.open("table", "", None);
                self.header_cells(key, &columns, &grows, pad);
                for (i, r) in block.rows.iter().enumerate() {
                    let css = self.row_css(i, block.alternate_rows);
                    self.open("tr", &css, Some(CONTACT_ROW));
                    let detail_color = r.tint.unwrap_or(p.text);
                    let cells = [
                        (self.font(key, TextRole::Body, body_color) + "; font-weight: bold", Some(r.name.as_str())),
                        (self.font(key, TextRole::Body, p.text), r.role.as_deref()),
                        (self.font(key, TextRole::Body, detail_color), r.detail.as_deref()),
                        (self.font(key, TextRole::Body, p.text), r.phone.as_deref()),
                        (self.font(key, TextRole::Small, p.muted()), r.email.as_deref()),
                    ];
                    for ((css, value), grow) in cells.iter().zip(grows) {
                        let css = join(&[css, &format!("flex: {grow}"), pad]);
                        match value {
                            Some(v) => self.leaf("td", &css, v, None),
                            None => {
                                self.open("td", &css, None);
                                self.close("td");
                            }
                        }
                    }
                    self.close("tr");
                }
                self.close("table");
            }
            ContactLayout::Cards => {
                let columns = if self.c.layout.orientation == Orientation::Landscape { 4 } else { 3 };
                self.open(
                    "div",
                    &format!(
                        "display: grid; grid-template-columns: repeat({columns}, 1fr); gap: {}px",
                        self.c.layout.spacing.card_spacing
                    ),
                    None,
                );
                for r in &block.rows {
                    let mut css = format!(
                        "display: flex; flex-direction: column; gap: 1px; padding: 6px; border-radius: {}px; border: 0.5px solid {}",
                        self.style.card.radius / 2.0,
                        r.tint.unwrap_or(p.border).to_hex()
                    );
                    if block.alternate_rows {
                        let _ = write!(css, "; background-color: {}", p.surface.to_hex());
                    }
                    self.open("div", &css, Some(CONTACT_ROW));
                    let name = self.font(key, TextRole::Body, body_color) + "; font-weight: bold";
                    self.leaf("p", &name, &r.name, None);
                    let small = self.font(key, TextRole::Small, p.muted());
                    for line in r.lines() {
                        self.leaf("p", &small, line, None);
                    }
                    self.close("div");
                }
                self.close("div");
            }
            ContactLayout::Compact => {
                for r in &block.rows {
                    let mut parts = vec![r.name.as_str()];
                    parts.extend(r.lines());
                    let css = self.font(key, TextRole::Small, r.tint.unwrap_or(body_color));
                    self.leaf("p", &css, &parts.join(" \u{00B7} "), Some(CONTACT_ROW));
                }
            }
        }
        if let Some(note) = &block.note {
            let css = self.font(key, TextRole::Body, body_color) + "; font-weight: bold";
            self.leaf("p", &css, &format!("{}: {}", note.label, note.value), None);
        }
        self.close("section");
    }

    fn footer(&mut self, f: &FooterBlock) {
        let key = SectionKey::Footer;
        let p = self.style.palette;
        let align = match f.alignment {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        };
        self.open(
            "footer",
            "display: flex; flex-direction: column; gap: 2px; break-inside: avoid",
            Some(key.as_str()),
        );
        if f.style != FooterStyle::Minimal {
            self.empty(&format!(
                "height: 0px; border-bottom: 0.5px solid {}; margin-bottom: 4px",
                p.border.to_hex()
            ));
        }
        let small = format!("{}; text-align: {align}", self.font(key, TextRole::Small, p.muted()));
        let caption = format!("{}; text-align: {align}", self.font(key, TextRole::Caption, p.muted()));
        if let Some(company) = &f.company {
            self.leaf("p", &small, company, None);
        }
        if let Some(text) = &f.text {
            self.leaf("p", &caption, text, None);
        }
        if let Some(union) = &f.union_line {
            self.leaf("p", &caption, union, None);
        }
        self.close("footer");
    }
}

/// Markup for `plan`, every element styled inline.
pub fn generate_html(plan: &DocumentPlan, c: &PdfCustomization) -> String {
    Markup::new(c).document(plan)
}

// ---------------------------------------------------------------------------
// Document context
// ---------------------------------------------------------------------------

/// A parsed document owned by exactly one render.
///
/// Contexts register themselves in a live counter on creation and
/// unregister on drop, so a render that fails part-way still tears its
/// document down.
pub struct DocumentContext {
    nodes: Vec<DomNode>,
    live: Arc<AtomicUsize>,
}

impl DocumentContext {
    pub fn open(markup: &str, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        let nodes = body_children(&parse_html(markup));
        log::debug!("document context opened with {} top-level node(s)", nodes.len());
        Self { nodes, live }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn styled(&self) -> Vec<StyledNode> {
        build_styled_tree(&self.nodes, None)
    }
}

impl Drop for DocumentContext {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        log::debug!("document context torn down");
    }
}

/// How long to wait for a document to settle before capture.
///
/// Layout here is synchronous, so there is nothing to wait for and
/// [`SettleStrategy::Immediate`] is the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SettleStrategy {
    #[default]
    Immediate,
    /// Sleep for a fixed time. Fragile: a fixed delay is a guess, not a
    /// signal that anything finished.
    FixedDelay(Duration),
    /// Settling always fails with the given message. Used to exercise
    /// teardown on the failure path.
    Fail(String),
}

impl SettleStrategy {
    pub fn settle(&self, ctx: &DocumentContext) -> Result<()> {
        match self {
            SettleStrategy::Immediate => Ok(()),
            SettleStrategy::FixedDelay(delay) => {
                log::debug!("settling document for {delay:?}");
                std::thread::sleep(*delay);
                Ok(())
            }
            SettleStrategy::Fail(message) => {
                log::debug!("settle failure injected ({} nodes)", ctx.nodes.len());
                Err(CallsheetError::render(Stage::Raster, message.clone()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// Device pixels per point; values below 3 are raised to 3.
    pub scale: u32,
    pub settle: SettleStrategy,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            settle: SettleStrategy::default(),
        }
    }
}

/// Lay out an open document and return its first page.
fn first_page(ctx: &DocumentContext, c: &PdfCustomization, fonts: &FontManager) -> Result<PageLayout> {
    let (width, height) = c.page_size_pt();
    let margins = &c.layout.margins;
    let boxes = compute_layout(&ctx.styled(), c.content_width(), margins.left, fonts)?;
    let pages = paginate(
        &boxes,
        PageGeometry {
            width,
            height,
            margin_top: margins.top,
            margin_bottom: margins.bottom,
        },
    );
    if pages.len() > 1 {
        log::warn!(
            "HTML backend captures the first page only; {} page(s) clipped",
            pages.len() - 1
        );
    }
    pages
        .into_iter()
        .next()
        .ok_or_else(|| CallsheetError::render(Stage::Pagination, "document produced no pages"))
}

/// Render a callsheet through generated markup into a one-page PDF.
///
/// `live` counts open document contexts; it is back to its previous value
/// when this returns, whatever the outcome.
pub fn render_html(
    sheet: &Callsheet,
    c: &PdfCustomization,
    fonts: &FontManager,
    options: &HtmlOptions,
    live: &Arc<AtomicUsize>,
) -> Result<Vec<u8>> {
    let c = &checked_inputs(sheet, c)?;
    let plan = plan_document(sheet, c);
    let markup = generate_html(&plan, c);
    let ctx = DocumentContext::open(&markup, Arc::clone(live));
    if ctx.is_empty() {
        return Err(CallsheetError::Rasterization("generated document is empty".into()));
    }
    options.settle.settle(&ctx)?;

    let page = first_page(&ctx, c, fonts)?;
    let palette = ResolvedStyle::new(c).palette;
    let watermark = plan.watermark.as_ref().map(|(text, opacity)| WatermarkLayer {
        text: text.clone(),
        font_size: WATERMARK_SIZE,
        color: palette.muted().with_alpha(*opacity).to_array(),
    });
    let (width, height) = c.page_size_pt();
    let image = rasterize_page(
        &page,
        width,
        height,
        Some(palette.background.to_array()),
        watermark.as_ref(),
        options.scale.max(DEFAULT_SCALE),
    );
    let png = encode_png(&image)?;
    single_page_pdf(&plan.title, &png, c.layout.orientation == Orientation::Landscape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Tag;
    use crate::samples::sample_callsheet;

    fn markup(c: &PdfCustomization) -> String {
        generate_html(&plan_document(&sample_callsheet(), c), c)
    }

    #[test]
    fn markup_labels_every_row() {
        let sheet = sample_callsheet();
        let html = markup(&PdfCustomization::default());
        assert_eq!(html.matches(r#"data-label="schedule-row""#).count(), sheet.schedule.len());
        assert_eq!(
            html.matches(r#"data-label="contact-row""#).count(),
            sheet.cast.len() + sheet.crew.len() + sheet.emergency_contacts.len()
        );
    }

    #[test]
    fn text_is_escaped() {
        let mut sheet = sample_callsheet();
        sheet.project_title = "Tom & <Jerry>".into();
        let c = PdfCustomization::default();
        let html = generate_html(&plan_document(&sheet, &c), &c);
        assert!(html.contains("Tom &amp; &lt;Jerry&gt;"));
    }

    #[test]
    fn generated_markup_parses_into_sections() {
        let live = Arc::new(AtomicUsize::new(0));
        let ctx = DocumentContext::open(&markup(&PdfCustomization::default()), Arc::clone(&live));
        let styled = ctx.styled();
        let first = match &styled[0] {
            StyledNode::Element { tag, label, .. } => (tag.clone(), label.clone()),
            other => panic!("expected element, got {other:?}"),
        };
        assert_eq!(first, (Tag::Header, Some("header".to_string())));
        assert_eq!(live.load(Ordering::SeqCst), 1);
        drop(ctx);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn context_is_torn_down_when_settling_fails() {
        let live = Arc::new(AtomicUsize::new(0));
        let options = HtmlOptions {
            settle: SettleStrategy::Fail("layout never settled".into()),
            ..HtmlOptions::default()
        };
        let err = render_html(
            &sample_callsheet(),
            &PdfCustomization::default(),
            &FontManager::default(),
            &options,
            &live,
        )
        .unwrap_err();
        assert!(matches!(err, CallsheetError::Render { stage: Stage::Raster, .. }));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn renders_single_page() {
        let live = Arc::new(AtomicUsize::new(0));
        let bytes = render_html(
            &sample_callsheet(),
            &PdfCustomization::default(),
            &FontManager::default(),
            &HtmlOptions::default(),
            &live,
        )
        .unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
