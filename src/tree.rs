//! Component-tree backend.
//!
//! Section blocks become a [`StyledNode`] tree (header band, cards, tables,
//! contact grids) that goes through the same taffy layout, pagination and
//! printpdf renderer as markup does. The intermediate [`LayoutConfig`] is
//! exposed so callers can inspect or diff a layout without rendering it.

use crate::callsheet::Callsheet;
use crate::customization::{
    Alignment, ContactLayout, FooterStyle, HeaderStyle, LogoPosition, Orientation, PdfCustomization,
    SectionKey, TextRole,
};
use crate::dom::Tag;
use crate::error::Result;
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::{LayoutConfig, WatermarkLayer};
use crate::pagination::{paginate, PageGeometry};
use crate::render::render_pdf;
use crate::resolve::{Divider, Fill, ResolvedFont, ResolvedStyle, ShadowLayer};
use crate::sections::{
    checked_inputs, plan_document, ContactBlock, DetailsBlock, DocumentPlan, FooterBlock, HeaderBlock, LogoRef,
    NotesBlock, ScheduleBlock, SectionBlock, SectionTitle,
};
use crate::style::{
    AlignItems, BoxShadow, Color, ComputedStyle, Dimension, Display, Edges, FlexDirection,
    FontWeight, JustifyContent, StyledNode, TextAlign,
};

pub const SCHEDULE_ROW: &str = "schedule-row";
pub const CONTACT_ROW: &str = "contact-row";
pub const WATERMARK_SIZE: f32 = 64.0;
pub const EMERGENCY_RED: Color = Color::rgb(0.86, 0.15, 0.15);

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

fn element(tag: Tag, style: ComputedStyle, children: Vec<StyledNode>) -> StyledNode {
    StyledNode::Element {
        tag,
        style,
        children,
        src: None,
        label: None,
    }
}

fn div(style: ComputedStyle, children: Vec<StyledNode>) -> StyledNode {
    element(Tag::Div, style, children)
}

/// A text block holding a single run.
fn text(tag: Tag, style: ComputedStyle, content: &str) -> StyledNode {
    let run = StyledNode::Text {
        text: content.to_string(),
        style: ComputedStyle::text_of(&style),
    };
    element(tag, style, vec![run])
}

fn labelled(mut node: StyledNode, name: &str) -> StyledNode {
    if let StyledNode::Element { label, .. } = &mut node {
        *label = Some(name.to_string());
    }
    node
}

fn row(gap: f32) -> ComputedStyle {
    ComputedStyle {
        display: Display::Flex,
        flex_direction: FlexDirection::Row,
        gap,
        ..Default::default()
    }
}

fn column(gap: f32) -> ComputedStyle {
    ComputedStyle {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        gap,
        ..Default::default()
    }
}

fn font_style(font: ResolvedFont, color: Color) -> ComputedStyle {
    ComputedStyle {
        font_size: font.size,
        font_weight: FontWeight::from_numeric(font.weight),
        font_family: font.family.as_str().to_string(),
        line_height: font.line_height,
        color,
        ..Default::default()
    }
}

fn apply_fill(style: &mut ComputedStyle, fill: Fill) {
    match fill {
        Fill::None => {}
        Fill::Solid(c) => style.background_color = c,
        Fill::Gradient(g) => style.background_gradient = Some(g),
    }
}

/// Collapse layered shadows into the renderer's single shadow description.
fn box_shadow(layers: &[ShadowLayer]) -> Option<BoxShadow> {
    let deepest = layers.first()?;
    let alpha = layers.iter().map(|l| l.alpha).fold(0.0, f32::max);
    Some(BoxShadow {
        offset_y: deepest.offset_y,
        blur: layers.len() as f32 * 2.0,
        color: Color::BLACK.with_alpha(alpha),
    })
}

/// Where a logo sits: inside the header band or in a row above it, and
/// how it is justified there.
pub fn logo_placement(position: LogoPosition) -> (bool, JustifyContent) {
    match position {
        LogoPosition::TopLeft => (false, JustifyContent::Start),
        LogoPosition::TopCenter => (false, JustifyContent::Center),
        LogoPosition::TopRight => (false, JustifyContent::End),
        LogoPosition::HeaderLeft => (true, JustifyContent::Start),
        LogoPosition::HeaderCenter => (true, JustifyContent::Center),
        LogoPosition::HeaderRight => (true, JustifyContent::End),
    }
}

fn logo_node(logo: &LogoRef) -> StyledNode {
    StyledNode::Element {
        tag: Tag::Img,
        style: ComputedStyle {
            height: Dimension::Px(logo.height),
            flex_shrink: 0.0,
            opacity: logo.opacity,
            ..Default::default()
        },
        children: Vec::new(),
        src: Some(logo.url.clone()),
        label: Some("logo".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tree builder
// ---------------------------------------------------------------------------

struct TreeBuilder<'a> {
    c: &'a PdfCustomization,
    style: ResolvedStyle,
}

impl<'a> TreeBuilder<'a> {
    fn new(c: &'a PdfCustomization) -> Self {
        Self {
            c,
            style: ResolvedStyle::new(c),
        }
    }

    fn font(&self, key: SectionKey, role: TextRole, color: Color) -> ComputedStyle {
        font_style(self.style.font(Some(key), role), color)
    }

    fn section_gap(&self) -> f32 {
        self.c.layout.spacing.section_gap
    }

    fn item_gap(&self) -> f32 {
        self.c.layout.spacing.item_gap
    }

    fn wide(&self) -> bool {
        self.c.layout.orientation == Orientation::Landscape
    }

    fn build(&self, plan: &DocumentPlan) -> Vec<StyledNode> {
        let mut nodes = Vec::new();
        let last_middle = plan
            .sections
            .iter()
            .rposition(|s| !matches!(s, SectionBlock::Header(_) | SectionBlock::Footer(_)));
        for (i, section) in plan.sections.iter().enumerate() {
            nodes.push(match section {
                SectionBlock::Header(h) => self.header(h),
                SectionBlock::Details(d) => self.details(d),
                SectionBlock::Notes(n) => self.notes(n),
                SectionBlock::Schedule(s) => self.schedule(s),
                SectionBlock::Contacts(c) => self.contacts(c),
                SectionBlock::Footer(f) => self.footer(f),
            });
            let between = !matches!(section, SectionBlock::Header(_) | SectionBlock::Footer(_))
                && Some(i) != last_middle;
            if between {
                nodes.extend(self.divider());
            }
        }
        nodes
    }

    fn divider(&self) -> Option<StyledNode> {
        let margin = Edges {
            bottom: self.section_gap(),
            ..Edges::ZERO
        };
        let style = match self.style.divider {
            Divider::Line { width, color } => ComputedStyle {
                height: Dimension::Px(0.0),
                border_width: width,
                border_color: color,
                border_bottom_only: true,
                margin,
                ..Default::default()
            },
            Divider::Gap(gap) => ComputedStyle {
                height: Dimension::Px(gap),
                ..Default::default()
            },
            Divider::Bar { height, color } => ComputedStyle {
                height: Dimension::Px(height),
                background_color: color,
                border_radius: height / 2.0,
                margin,
                ..Default::default()
            },
            Divider::None => return None,
        };
        Some(div(style, Vec::new()))
    }

    // -- header -------------------------------------------------------------

    fn header(&self, h: &HeaderBlock) -> StyledNode {
        let p = &self.style.palette;
        let key = SectionKey::Header;
        let minimal = h.style == HeaderStyle::Minimal;
        let fg = if minimal { p.primary } else { self.style.header_text };
        let sub = if minimal { p.muted() } else { fg };

        let mut band = ComputedStyle {
            align_items: AlignItems::Center,
            justify_content: JustifyContent::SpaceBetween,
            ..row(12.0)
        };
        match h.style {
            HeaderStyle::Minimal => {
                band.padding = Edges::xy(0.0, 8.0);
                band.border_width = 1.5;
                band.border_color = p.primary;
                band.border_bottom_only = true;
            }
            HeaderStyle::Professional | HeaderStyle::Creative => {
                apply_fill(&mut band, self.style.header);
                band.padding = Edges::all(16.0);
                band.border_radius = self.style.card.radius;
            }
            HeaderStyle::Corporate => {
                apply_fill(&mut band, self.style.header);
                band.padding = Edges::xy(16.0, 12.0);
            }
        }

        let mut lead = Vec::new();
        if let Some(company) = &h.company {
            let mut s = self.font(key, TextRole::Small, sub);
            s.uppercase = h.style == HeaderStyle::Corporate;
            lead.push(text(Tag::P, s, company));
        }
        lead.push(text(Tag::H1, self.font(key, TextRole::Title, fg), &h.title));
        if let Some(series) = &h.series_line {
            lead.push(text(Tag::P, self.font(key, TextRole::Small, sub), series));
        }

        let mut meta = vec![text(Tag::P, self.font(key, TextRole::Header, fg), &h.date)];
        if let Some(call) = &h.call_time {
            meta.push(text(Tag::P, self.font(key, TextRole::Body, sub), call));
        }
        if let Some(urgency) = &h.urgency {
            meta.push(self.urgency_badge(urgency));
        }

        let (inside, above): (Vec<&LogoRef>, Vec<&LogoRef>) =
            h.logos.iter().partition(|l| logo_placement(l.position).0);
        let slot = |j: JustifyContent| -> Vec<StyledNode> {
            inside
                .iter()
                .filter(|l| logo_placement(l.position).1 == j)
                .map(|l| logo_node(l))
                .collect()
        };

        let band_children = if h.style == HeaderStyle::Creative {
            band.flex_direction = FlexDirection::Column;
            band.gap = 4.0;
            let mut all: Vec<StyledNode> = inside.iter().map(|l| logo_node(l)).collect();
            all.extend(lead);
            all.extend(meta);
            for node in &mut all {
                if let StyledNode::Element { style, .. } = node {
                    style.text_align = TextAlign::Center;
                }
            }
            all
        } else {
            let lead_col = ComputedStyle {
                flex_grow: 1.0,
                ..column(2.0)
            };
            let meta_col = ComputedStyle {
                align_items: AlignItems::End,
                ..column(2.0)
            };
            let mut children = slot(JustifyContent::Start);
            children.push(div(lead_col, lead));
            children.extend(slot(JustifyContent::Center));
            children.push(div(meta_col, meta));
            children.extend(slot(JustifyContent::End));
            children
        };

        let mut outer = vec![];
        for justify in [JustifyContent::Start, JustifyContent::Center, JustifyContent::End] {
            let logos: Vec<StyledNode> = above
                .iter()
                .filter(|l| logo_placement(l.position).1 == justify)
                .map(|l| logo_node(l))
                .collect();
            if !logos.is_empty() {
                outer.push(div(
                    ComputedStyle {
                        justify_content: justify,
                        align_items: AlignItems::Center,
                        margin: Edges {
                            bottom: 6.0,
                            ..Edges::ZERO
                        },
                        ..row(8.0)
                    },
                    logos,
                ));
            }
        }
        outer.push(div(band, band_children));

        let wrapper = ComputedStyle {
            margin: Edges {
                bottom: self.section_gap(),
                ..Edges::ZERO
            },
            ..column(0.0)
        };
        labelled(div(wrapper, outer), key.as_str())
    }

    fn urgency_badge(&self, label: &str) -> StyledNode {
        let p = &self.style.palette;
        let mut s = self.font(SectionKey::Header, TextRole::Caption, Color::WHITE);
        s.font_weight = FontWeight::Bold;
        s.background_color = if label == "EMERGENCY" { EMERGENCY_RED } else { p.accent };
        s.padding = Edges::xy(6.0, 2.0);
        s.border_radius = 3.0;
        labelled(text(Tag::P, s, label), "urgency")
    }

    // -- cards --------------------------------------------------------------

    fn card(&self, key: SectionKey, title: &SectionTitle, body: Vec<StyledNode>, prominent: bool) -> StyledNode {
        let look = &self.style.card;
        let p = &self.style.palette;
        let mut s = ComputedStyle {
            padding: if look.fill == Fill::None && look.border.is_none() {
                Edges::ZERO
            } else {
                Edges::all(10.0)
            },
            margin: Edges {
                bottom: self.section_gap(),
                ..Edges::ZERO
            },
            border_radius: look.radius,
            box_shadow: box_shadow(&look.shadows),
            ..column(self.item_gap())
        };
        apply_fill(&mut s, look.fill);
        if let Some((width, color)) = look.border {
            s.border_width = width;
            s.border_color = color;
        }
        if prominent {
            s.border_width = 1.5;
            s.border_color = p.accent;
            s.padding = Edges::all(10.0);
        }

        let title_color = if prominent { p.accent } else { p.primary };
        let mut heading = self.font(key, TextRole::Header, title_color);
        if let Some(band) = look.band {
            heading.background_color = band;
            heading.padding = Edges::xy(8.0, 5.0);
            heading.border_radius = look.radius / 2.0;
        }
        let mut children = vec![text(Tag::H2, heading, &title.display())];
        children.extend(body);
        labelled(div(s, children), key.as_str())
    }

    fn details(&self, d: &DetailsBlock) -> StyledNode {
        let key = SectionKey::Details;
        let p = &self.style.palette;
        let fields = d
            .fields
            .iter()
            .map(|f| {
                let mut label = self.font(key, TextRole::Caption, p.muted());
                label.uppercase = true;
                div(
                    column(1.0),
                    vec![
                        text(Tag::P, label, &f.label),
                        text(Tag::P, self.font(key, TextRole::Body, p.text), &f.value),
                    ],
                )
            })
            .collect();
        let grid = ComputedStyle {
            display: Display::Grid,
            grid_columns: if self.wide() { 3 } else { 2 },
            gap: self.item_gap(),
            ..Default::default()
        };
        self.card(key, &d.title, vec![div(grid, fields)], false)
    }

    fn notes(&self, n: &NotesBlock) -> StyledNode {
        let key = SectionKey::Notes;
        let body = n
            .paragraphs
            .iter()
            .map(|para| text(Tag::P, self.font(key, TextRole::Body, self.style.palette.text), para))
            .collect();
        self.card(key, &n.title, body, false)
    }

    fn table_row(&self, cells: Vec<StyledNode>, index: usize, alternate: bool) -> StyledNode {
        let p = &self.style.palette;
        let mut s = ComputedStyle {
            border_width: 0.5,
            border_color: p.border,
            border_bottom_only: true,
            ..Default::default()
        };
        if alternate && index % 2 == 1 {
            s.background_color = p.surface;
        }
        element(Tag::Tr, s, cells)
    }

    fn cell(&self, tag: Tag, mut style: ComputedStyle, content: &str, grow: f32, compact: bool) -> StyledNode {
        style.flex_grow = grow;
        style.padding = if compact { Edges::xy(3.0, 1.5) } else { Edges::xy(4.0, 3.0) };
        if content.trim().is_empty() {
            return element(tag, style, Vec::new());
        }
        text(tag, style, content)
    }

    fn header_row(&self, key: SectionKey, columns: &[&str], grows: &[f32], compact: bool) -> StyledNode {
        let p = &self.style.palette;
        let cells = columns
            .iter()
            .zip(grows)
            .map(|(name, &grow)| {
                let mut s = self.font(key, TextRole::Caption, p.muted());
                s.font_weight = FontWeight::Bold;
                s.uppercase = true;
                self.cell(Tag::Th, s, name, grow, compact)
            })
            .collect();
        let s = ComputedStyle {
            border_width: 1.0,
            border_color: p.border,
            border_bottom_only: true,
            ..Default::default()
        };
        element(Tag::Tr, s, cells)
    }

    fn schedule(&self, block: &ScheduleBlock) -> StyledNode {
        let key = SectionKey::Schedule;
        let p = &self.style.palette;
        let role = if block.compact { TextRole::Small } else { TextRole::Body };
        let grows: Vec<f32> = block
            .columns
            .iter()
            .map(|c| if *c == "Description" { 2.5 } else { 1.0 })
            .collect();

        let mut rows = vec![self.header_row(key, &block.columns, &grows, block.compact)];
        for (i, r) in block.rows.iter().enumerate() {
            let cells = block
                .cells(r)
                .into_iter()
                .zip(&grows)
                .map(|(value, &grow)| self.cell(Tag::Td, self.font(key, role, p.text), value, grow, block.compact))
                .collect();
            rows.push(labelled(self.table_row(cells, i, block.alternate_rows), SCHEDULE_ROW));
        }
        let mut body = vec![element(Tag::Table, ComputedStyle::default(), rows)];
        if let Some(total) = &block.total_pages {
            let mut s = self.font(key, TextRole::Small, p.muted());
            s.text_align = TextAlign::Right;
            body.push(text(Tag::P, s, &format!("Total pages: {total}")));
        }
        self.card(key, &block.title, body, false)
    }

    fn contacts(&self, block: &ContactBlock) -> StyledNode {
        let key = block.key;
        let p = &self.style.palette;
        let body_color = if block.prominent { p.accent } else { p.text };
        let mut body: Vec<StyledNode> = match block.layout {
            ContactLayout::Table => {
                let detail = match key {
                    SectionKey::Cast => "Character",
                    SectionKey::Crew => "Department",
                    _ => "Relation",
                };
                let columns = ["Name", "Role", detail, "Phone", "Email"];
                let grows = [1.2, 1.0, 1.0, 1.0, 1.6];
                let mut rows = vec![self.header_row(key, &columns, &grows, false)];
                for (i, r) in block.rows.iter().enumerate() {
                    let mut name = self.font(key, TextRole::Body, body_color);
                    name.font_weight = FontWeight::Bold;
                    let mut detail_style = self.font(key, TextRole::Body, p.text);
                    if let Some(tint) = r.tint {
                        detail_style.color = tint;
                    }
                    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
                    let cells = vec![
                        self.cell(Tag::Td, name, &r.name, grows[0], false),
                        self.cell(Tag::Td, self.font(key, TextRole::Body, p.text), &opt(&r.role), grows[1], false),
                        self.cell(Tag::Td, detail_style, &opt(&r.detail), grows[2], false),
                        self.cell(Tag::Td, self.font(key, TextRole::Body, p.text), &opt(&r.phone), grows[3], false),
                        self.cell(Tag::Td, self.font(key, TextRole::Small, p.muted()), &opt(&r.email), grows[4], false),
                    ];
                    rows.push(labelled(self.table_row(cells, i, block.alternate_rows), CONTACT_ROW));
                }
                vec![element(Tag::Table, ComputedStyle::default(), rows)]
            }
            ContactLayout::Cards => {
                let cards = block
                    .rows
                    .iter()
                    .map(|r| {
                        let mut s = ComputedStyle {
                            padding: Edges::all(6.0),
                            border_radius: self.style.card.radius / 2.0,
                            border_width: 0.5,
                            border_color: r.tint.unwrap_or(p.border),
                            ..column(1.0)
                        };
                        if block.alternate_rows {
                            s.background_color = p.surface;
                        }
                        let mut name = self.font(key, TextRole::Body, body_color);
                        name.font_weight = FontWeight::Bold;
                        let mut lines = vec![text(Tag::P, name, &r.name)];
                        lines.extend(
                            r.lines()
                                .into_iter()
                                .map(|l| text(Tag::P, self.font(key, TextRole::Small, p.muted()), l)),
                        );
                        labelled(div(s, lines), CONTACT_ROW)
                    })
                    .collect();
                let grid = ComputedStyle {
                    display: Display::Grid,
                    grid_columns: if self.wide() { 4 } else { 3 },
                    gap: self.c.layout.spacing.card_spacing,
                    ..Default::default()
                };
                vec![div(grid, cards)]
            }
            ContactLayout::Compact => block
                .rows
                .iter()
                .map(|r| {
                    let mut parts = vec![r.name.as_str()];
                    parts.extend(r.lines());
                    let mut s = self.font(key, TextRole::Small, body_color);
                    if let Some(tint) = r.tint {
                        s.color = tint;
                    }
                    labelled(text(Tag::P, s, &parts.join(" \u{00B7} ")), CONTACT_ROW)
                })
                .collect(),
        };
        if let Some(note) = &block.note {
            let mut s = self.font(key, TextRole::Body, body_color);
            s.font_weight = FontWeight::Bold;
            body.push(text(Tag::P, s, &format!("{}: {}", note.label, note.value)));
        }
        self.card(key, &block.title, body, block.prominent)
    }

    fn footer(&self, f: &FooterBlock) -> StyledNode {
        let key = SectionKey::Footer;
        let p = &self.style.palette;
        let align = match f.alignment {
            Alignment::Left => TextAlign::Left,
            Alignment::Center => TextAlign::Center,
            Alignment::Right => TextAlign::Right,
        };
        let line = |content: &str, role: TextRole| {
            let mut s = self.font(key, role, p.muted());
            s.text_align = align;
            text(Tag::P, s, content)
        };
        let mut children = Vec::new();
        if f.style != FooterStyle::Minimal {
            children.push(div(
                ComputedStyle {
                    height: Dimension::Px(0.0),
                    border_width: 0.5,
                    border_color: p.border,
                    border_bottom_only: true,
                    margin: Edges {
                        bottom: 4.0,
                        ..Edges::ZERO
                    },
                    ..Default::default()
                },
                Vec::new(),
            ));
        }
        if let Some(company) = &f.company {
            children.push(line(company, TextRole::Small));
        }
        if let Some(t) = &f.text {
            children.push(line(t, TextRole::Caption));
        }
        if let Some(union) = &f.union_line {
            children.push(line(union, TextRole::Caption));
        }
        let s = ComputedStyle {
            page_break_inside_avoid: true,
            ..column(2.0)
        };
        labelled(element(Tag::Footer, s, children), key.as_str())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The styled node tree for `plan`.
pub fn build_tree(plan: &DocumentPlan, c: &PdfCustomization) -> Vec<StyledNode> {
    TreeBuilder::new(c).build(plan)
}

/// Lay out and paginate a callsheet without rendering it.
///
/// The result is a pure function of its inputs, so equal inputs serialize
/// to byte-identical JSON.
pub fn layout_document(sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<LayoutConfig> {
    let c = &checked_inputs(sheet, c)?;
    let plan = plan_document(sheet, c);
    let nodes = build_tree(&plan, c);
    let (width, height) = c.page_size_pt();
    let margins = &c.layout.margins;

    let boxes = compute_layout(&nodes, c.content_width(), margins.left, fonts)?;
    let geometry = PageGeometry {
        width,
        height,
        margin_top: margins.top,
        margin_bottom: margins.bottom,
    };

    let palette = ResolvedStyle::new(c).palette;
    let mut config = LayoutConfig::new(plan.title.clone(), width, height);
    config.page_background = Some(palette.background.to_array());
    config.watermark = plan.watermark.map(|(text, opacity)| WatermarkLayer {
        text,
        font_size: WATERMARK_SIZE,
        color: palette.muted().with_alpha(opacity).to_array(),
    });
    config.pages = paginate(&boxes, geometry);
    log::debug!(
        "laid out {:?} on {} page(s)",
        plan.title,
        config.pages.len()
    );
    Ok(config)
}

/// Render a callsheet through the component tree.
pub fn render_tree(sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<Vec<u8>> {
    render_pdf(&layout_document(sheet, c, fonts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsheet::Contact;
    use crate::samples::sample_callsheet;

    fn layout(sheet: &Callsheet, c: &PdfCustomization) -> LayoutConfig {
        layout_document(sheet, c, &FontManager::default()).unwrap()
    }

    fn page_of(config: &LayoutConfig, label: &str) -> Option<usize> {
        config.count_labels(label).iter().position(|&n| n > 0)
    }

    #[test]
    fn sections_appear_in_order() {
        let config = layout(&sample_callsheet(), &PdfCustomization::default());
        let text = config.all_text();
        let at = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("{needle} missing"));
        assert!(at("Production Details") < at("Shooting Schedule"));
        assert!(at("Shooting Schedule") < at("Cast"));
        assert!(at("Cast") < at("Crew"));
    }

    #[test]
    fn every_schedule_row_rendered_once() {
        let mut sheet = sample_callsheet();
        let template = sheet.schedule[0].clone();
        sheet.schedule = (0..60)
            .map(|i| {
                let mut item = template.clone();
                item.scene_number = format!("{i}");
                item
            })
            .collect();
        let config = layout(&sheet, &PdfCustomization::default());
        assert!(config.pages.len() > 1);
        assert_eq!(config.count_labels(SCHEDULE_ROW).iter().sum::<usize>(), 60);
        assert_eq!(config.count_labels("header").iter().sum::<usize>(), 1);
        assert_eq!(page_of(&config, "header"), Some(0));
    }

    #[test]
    fn contact_rows_match_each_layout() {
        let sheet = sample_callsheet();
        let total = sheet.cast.len() + sheet.crew.len() + sheet.emergency_contacts.len();
        for layout_kind in [ContactLayout::Table, ContactLayout::Cards, ContactLayout::Compact] {
            let mut c = PdfCustomization::default();
            c.sections.formatting.contact_layout = layout_kind;
            let config = layout(&sheet, &c);
            assert_eq!(
                config.count_labels(CONTACT_ROW).iter().sum::<usize>(),
                total,
                "{layout_kind:?}"
            );
        }
    }

    #[test]
    fn blank_email_draws_no_text() {
        let mut sheet = sample_callsheet();
        for contact in sheet.cast.iter_mut().chain(&mut sheet.crew) {
            contact.email = Some("   ".into());
        }
        sheet.emergency_contacts = vec![Contact {
            name: "Set Medic".into(),
            role: "Medic".into(),
            phone: "555-0100".into(),
            ..Default::default()
        }];
        let mut c = PdfCustomization::default();
        c.sections.formatting.contact_layout = ContactLayout::Cards;
        let config = layout(&sheet, &c);
        assert!(!config.all_text().contains('@'));
    }

    #[test]
    fn logo_placements_cover_all_positions() {
        use LogoPosition::*;
        let inside: Vec<bool> = [TopLeft, TopCenter, TopRight, HeaderLeft, HeaderCenter, HeaderRight]
            .into_iter()
            .map(|p| logo_placement(p).0)
            .collect();
        assert_eq!(inside, vec![false, false, false, true, true, true]);
    }

    #[test]
    fn landscape_uses_wide_pages() {
        let mut c = PdfCustomization::default();
        c.layout.orientation = Orientation::Landscape;
        let config = layout(&sample_callsheet(), &c);
        assert!(config.page_width_pt > config.page_height_pt);
    }

    #[test]
    fn watermark_carries_opacity() {
        let mut c = PdfCustomization::default();
        c.branding.watermark = Some(crate::customization::Watermark {
            text: "DRAFT".into(),
            opacity: 0.1,
        });
        let config = layout(&sample_callsheet(), &c);
        let mark = config.watermark.unwrap();
        assert_eq!(mark.text, "DRAFT");
        assert!((mark.color[3] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = render_tree(&sample_callsheet(), &PdfCustomization::default(), &FontManager::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }
}
