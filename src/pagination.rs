//! Pagination – splits positioned boxes into pages.
//!
//! Handles:
//! - page boundaries with asymmetric top/bottom margins
//! - moving whole blocks that do not fit to the next page
//! - expanding containers taller than a page so their children flow
//! - splitting grid containers row by row
//!
//! A container whose children were spread over several pages is repainted
//! once per page behind the children it holds there, so card backgrounds
//! follow their rows.

use crate::layout::{BoxContent, PositionedBox};
use crate::layout_config::*;
use crate::style::{self, ComputedStyle, TextAlign};

/// Page size and vertical margins, in points.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl PageGeometry {
    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }
}

/// Where an expanded container's children landed on one page.
struct Span {
    page: usize,
    top: f32,
    bottom: f32,
}

struct Paginator<'a> {
    geometry: PageGeometry,
    pages: Vec<PageLayout>,
    /// Document-space y at which each page begins.
    page_starts: Vec<f32>,
    owners: Vec<&'a PositionedBox>,
    spans: Vec<Vec<Span>>,
}

impl<'a> Paginator<'a> {
    fn new(geometry: PageGeometry, first_y: f32) -> Self {
        Self {
            geometry,
            pages: vec![PageLayout {
                page_index: 0,
                boxes: Vec::new(),
            }],
            page_starts: vec![first_y],
            owners: Vec::new(),
            spans: Vec::new(),
        }
    }

    fn page(&self) -> usize {
        self.pages.len() - 1
    }

    fn page_start(&self) -> f32 {
        self.page_starts[self.page()]
    }

    fn new_page(&mut self, start_y: f32) {
        self.pages.push(PageLayout {
            page_index: self.pages.len(),
            boxes: Vec::new(),
        });
        self.page_starts.push(start_y);
    }

    fn page_y(&self, doc_y: f32, page: usize) -> f32 {
        self.geometry.margin_top + (doc_y - self.page_starts[page]).max(0.0)
    }

    fn place(&mut self, pbox: &'a PositionedBox, owners: &[usize]) {
        let content_height = self.geometry.content_height();
        let fits = (pbox.y - self.page_start()) + pbox.height <= content_height;

        let expand = !fits
            && pbox.is_container()
            && (pbox.height > content_height
                || (is_grid_like(pbox) && !pbox.style.page_break_inside_avoid));
        if expand {
            let id = self.owners.len();
            self.owners.push(pbox);
            self.spans.push(Vec::new());
            let mut chain = owners.to_vec();
            chain.push(id);
            for child in &pbox.children {
                self.place(child, &chain);
            }
            return;
        }

        if !fits && !self.pages[self.page()].boxes.is_empty() {
            self.new_page(pbox.y);
        }

        let page = self.page();
        let top = self.page_y(pbox.y, page);
        let bottom = top + pbox.height;
        self.pages[page].boxes.push(build_layout_box(pbox, pbox.x, top));

        for &owner in owners {
            match self.spans[owner].last_mut() {
                Some(span) if span.page == page => {
                    span.top = span.top.min(top);
                    span.bottom = span.bottom.max(bottom);
                }
                _ => self.spans[owner].push(Span { page, top, bottom }),
            }
        }
    }

    /// Insert per-page paint for expanded containers behind their children.
    fn finish(mut self) -> Vec<PageLayout> {
        for id in (0..self.owners.len()).rev() {
            let owner = self.owners[id];
            let spans = std::mem::take(&mut self.spans[id]);
            let count = spans.len();
            for (i, span) in spans.into_iter().enumerate() {
                let top = if i == 0 {
                    self.page_y(owner.y, span.page)
                } else {
                    span.top
                };
                let bottom = if i + 1 == count {
                    self.page_y(owner.y + owner.height, span.page)
                } else {
                    span.bottom
                };
                let mut segment = paint_box(owner, owner.x, top, owner.width, (bottom - top).max(0.0));
                if i > 0 {
                    segment.label = None;
                }
                if !segment.is_transparent() || segment.label.is_some() {
                    self.pages[span.page].boxes.insert(0, segment);
                }
            }
        }
        self.pages
    }
}

/// Convert positioned boxes into paginated pages.
pub fn paginate(boxes: &[PositionedBox], geometry: PageGeometry) -> Vec<PageLayout> {
    let mut paginator = Paginator::new(geometry, 0.0);
    for pbox in boxes {
        paginator.place(pbox, &[]);
    }
    paginator.finish()
}

fn is_grid_like(pbox: &PositionedBox) -> bool {
    pbox.style.display == style::Display::Grid && !pbox.children.is_empty()
}

fn color(c: &style::Color) -> [f32; 4] {
    c.to_array()
}

/// A box carrying only the paint of `pbox` (no content, no children).
fn paint_box(pbox: &PositionedBox, x: f32, y: f32, width: f32, height: f32) -> LayoutBox {
    let s = &pbox.style;
    let mut lb = LayoutBox::new(x, y, width, height);
    lb.label = pbox.label.clone();
    if !s.background_color.is_transparent() {
        lb.background_color = Some(color(&s.background_color));
    }
    lb.gradient = s.background_gradient.map(|g| GradientFill {
        from: color(&g.from),
        to: color(&g.to),
        axis: match g.axis {
            style::GradientAxis::Horizontal => GradientAxis::Horizontal,
            style::GradientAxis::Vertical => GradientAxis::Vertical,
            style::GradientAxis::Diagonal => GradientAxis::Diagonal,
        },
    });
    if s.border_width > 0.0 {
        lb.border = Some(BorderStyle {
            width: s.border_width,
            color: color(&s.border_color),
            bottom_only: s.border_bottom_only,
        });
    }
    lb.corner_radius = s.border_radius;
    lb.shadow = s.box_shadow.map(|sh| ShadowStyle {
        offset_y: sh.offset_y,
        blur: sh.blur,
        color: color(&sh.color),
    });
    lb.opacity = s.opacity;
    lb
}

fn text_content(s: &ComputedStyle, lines: &[String], widths: &[f32], box_width: f32) -> TextContent {
    let inset = s.padding.left + if s.border_bottom_only { 0.0 } else { s.border_width };
    let inner = box_width - s.padding.horizontal();
    let line_height = s.font_size * s.line_height;
    let text_lines = lines
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (line, &w))| TextLine {
            text: line.clone(),
            x_offset: inset
                + match s.text_align {
                    TextAlign::Left => 0.0,
                    TextAlign::Center => ((inner - w) / 2.0).max(0.0),
                    TextAlign::Right => (inner - w).max(0.0),
                },
            y_offset: s.padding.top + i as f32 * line_height,
        })
        .collect();
    TextContent {
        lines: text_lines,
        font_family: s.font_family.clone(),
        font_size: s.font_size,
        bold: s.is_bold(),
        italic: s.is_italic(),
        color: color(&s.color),
        line_height,
        text_align: s.text_align.as_str().to_string(),
    }
}

/// Recursively build a LayoutBox tree where every box carries *page-absolute*
/// coordinates. Children keep their offset from the parent:
/// `child_abs_y = parent_abs_y + (child.y − parent.y)`.
fn build_layout_box(pbox: &PositionedBox, abs_x: f32, abs_y: f32) -> LayoutBox {
    let mut lb = paint_box(pbox, abs_x, abs_y, pbox.width, pbox.height);

    match &pbox.content {
        BoxContent::Text { lines, widths } => {
            lb.text = Some(text_content(&pbox.style, lines, widths, pbox.width));
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children.push(build_layout_box(child, child.x, child_abs_y));
    }
    lb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::fonts::FontManager;
    use crate::layout::compute_layout;
    use crate::style::build_styled_tree;

    const A4: PageGeometry = PageGeometry {
        width: 595.28,
        height: 841.89,
        margin_top: 40.0,
        margin_bottom: 40.0,
    };

    fn pages_for(html: &str) -> Vec<PageLayout> {
        let styled = build_styled_tree(&parse_html(html), None);
        let boxes = compute_layout(&styled, 515.0, 40.0, &FontManager::default()).unwrap();
        paginate(&boxes, A4)
    }

    fn count(pages: &[PageLayout], label: &str) -> usize {
        pages
            .iter()
            .flat_map(|p| &p.boxes)
            .map(|b| b.count_label(label))
            .sum()
    }

    #[test]
    fn single_page() {
        assert_eq!(pages_for("<p>Short text</p>").len(), 1);
    }

    #[test]
    fn multiple_pages() {
        let html: String = (0..80)
            .map(|i| format!("<p>Paragraph {i} with some text</p>"))
            .collect();
        let pages = pages_for(&html);
        assert!(pages.len() > 1, "Expected multiple pages, got {}", pages.len());
    }

    #[test]
    fn long_container_keeps_every_row_once() {
        let rows: String = (0..120)
            .map(|i| format!(r#"<div data-label="row" style="padding: 4px"><p>Row {i}</p></div>"#))
            .collect();
        let html = format!(r#"<div data-label="section" style="background-color: #eeeeee">{rows}</div>"#);
        let pages = pages_for(&html);
        assert!(pages.len() > 1);
        assert_eq!(count(&pages, "row"), 120);
        // The section label is emitted once even though it spans pages.
        assert_eq!(count(&pages, "section"), 1);
        // Each page carries a background segment for the section.
        for page in &pages {
            assert!(page.boxes[0].background_color.is_some());
        }
    }

    #[test]
    fn grid_splits_between_rows() {
        let cells: String = (0..90).map(|i| format!(r#"<p data-label="cell">Cell {i}</p>"#)).collect();
        let html = format!(
            r#"<div style="height: 600px"></div><div style="display: grid; grid-template-columns: repeat(3, 1fr)">{cells}</div>"#
        );
        let pages = pages_for(&html);
        assert!(pages.len() >= 2);
        assert_eq!(count(&pages, "cell"), 90);
    }

    #[test]
    fn text_is_centred_inside_padding() {
        let pages = pages_for(r#"<p style="text-align: center; padding: 10px">Hi</p>"#);
        let text = pages[0].boxes[0].text.as_ref().unwrap();
        assert!(text.lines[0].x_offset > 10.0);
        assert_eq!(text.lines[0].y_offset, 10.0);
    }
}
