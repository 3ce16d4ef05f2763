//! Layout engine – uses Taffy to compute flexbox / grid layout from a styled
//! tree, then converts the result into positioned boxes in document space.

use std::collections::HashMap;
use taffy::prelude::*;

use crate::dom::Tag;
use crate::error::{CallsheetError, Result, Stage};
use crate::fonts::{wrap_text, FontManager};
use crate::style::{self, ComputedStyle, StyledNode};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub label: Option<String>,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text {
        lines: Vec<String>,
        /// Measured width of each line, for alignment.
        widths: Vec<f32>,
    },
    Image {
        src: String,
    },
}

impl PositionedBox {
    pub fn is_container(&self) -> bool {
        matches!(self.content, BoxContent::None) && !self.children.is_empty()
    }
}

fn layout_err(e: taffy::TaffyError) -> CallsheetError {
    CallsheetError::render(Stage::Layout, e.to_string())
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    node_labels: HashMap<NodeId, String>,
    available_width: f32,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, available_width: f32) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            node_labels: HashMap::new(),
            available_width,
        }
    }

    /// Collect all text content from an inline subtree (spans, text nodes).
    fn collect_inline_text(node: &StyledNode) -> String {
        match node {
            StyledNode::Text { text, .. } => text.clone(),
            StyledNode::Element { tag: Tag::Br, .. } => "\n".to_string(),
            StyledNode::Element { children, .. } => {
                children.iter().map(Self::collect_inline_text).collect()
            }
        }
    }

    /// True when every child is a text node or an inline element.
    fn all_inline(children: &[StyledNode]) -> bool {
        children.iter().all(|c| match c {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                style,
                children: gc,
                ..
            } => style.display == style::Display::Inline && Self::all_inline(gc),
        })
    }

    fn build_node(&mut self, styled: &StyledNode, parent_width: f32) -> Result<NodeId> {
        match styled {
            StyledNode::Text { text, style } => self.build_text_node(text, style, parent_width, false),
            StyledNode::Element {
                tag,
                style,
                children,
                src,
                label,
            } => {
                let node = self.build_element_node(tag, style, children, src.as_deref(), parent_width)?;
                if let Some(label) = label {
                    self.node_labels.insert(node, label.clone());
                }
                Ok(node)
            }
        }
    }

    /// Leaf node holding wrapped text. With `block` set the leaf also takes
    /// the margin, padding and box paint of the enclosing block, so headings
    /// and cells keep their spacing.
    fn build_text_node(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        parent_width: f32,
        block: bool,
    ) -> Result<NodeId> {
        let bold = style.is_bold();
        let italic = style.is_italic();
        let family = &style.font_family;
        let font_size = style.font_size;
        let line_height = font_size * style.line_height;
        let (pad_x, pad_y) = if block {
            (style.padding.horizontal(), style.padding.top + style.padding.bottom)
        } else {
            (0.0, 0.0)
        };

        let outer = if parent_width > 0.0 {
            parent_width
        } else {
            self.available_width
        };
        let margin_x = if block { style.margin.horizontal() } else { 0.0 };
        let max_w = outer - pad_x - margin_x;

        let text = if style.uppercase {
            text.trim().to_uppercase()
        } else {
            text.trim().to_string()
        };
        let lines = wrap_text(&text, font_size, bold, italic, family, max_w, self.fonts);
        let widths: Vec<f32> = lines
            .iter()
            .map(|l| self.fonts.measure_text_width(l, font_size, bold, italic, family))
            .collect();
        let text_width = widths.iter().copied().fold(0.0f32, f32::max);
        let text_height = lines.len() as f32 * line_height;

        // Growing leaves share their row; aligned text fills its container
        // so offsets can be computed later.
        let grows = style.flex_grow > 0.0;
        let width = match (style.width, style.text_align) {
            (style::Dimension::Auto, _) if grows => taffy::Dimension::Auto,
            (style::Dimension::Auto, style::TextAlign::Left) => {
                taffy::Dimension::Length(text_width + pad_x)
            }
            (style::Dimension::Auto, _) => taffy::Dimension::Percent(1.0),
            (d, _) => dim_to_taffy(d),
        };

        let mut taffy_style = Style {
            size: Size {
                width,
                height: taffy::Dimension::Length(text_height + pad_y),
            },
            flex_shrink: style.flex_shrink,
            flex_grow: style.flex_grow,
            ..Default::default()
        };
        if grows {
            taffy_style.flex_basis = taffy::Dimension::Length(0.0);
            taffy_style.min_size.width = taffy::Dimension::Length(0.0);
        }
        if block {
            taffy_style.margin = margin_rect(&style.margin);
            taffy_style.padding = padding_rect(&style.padding);
            taffy_style.border = border_rect(style);
        }

        let node = self.taffy.new_leaf(taffy_style).map_err(layout_err)?;
        let node_style = if block {
            style.clone()
        } else {
            ComputedStyle::text_of(style)
        };
        self.node_styles.insert(node, node_style);
        self.node_content.insert(node, BoxContent::Text { lines, widths });
        Ok(node)
    }

    fn build_element_node(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        src: Option<&str>,
        parent_width: f32,
    ) -> Result<NodeId> {
        // Text blocks whose children are all inline get their text merged
        // into a single wrapped leaf so spans flow correctly.
        if tag.is_text_block() && !children.is_empty() && Self::all_inline(children) {
            let raw: String = children.iter().map(Self::collect_inline_text).collect();
            let combined = raw
                .split('\n')
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n");
            if !combined.trim().is_empty() {
                // A single strong child carries its weight up to the block.
                let mut block_style = style.clone();
                if let [StyledNode::Element { style: inner, .. }] = children {
                    block_style.font_weight = inner.font_weight;
                }
                if matches!(tag, Tag::Td | Tag::Th) {
                    block_style.flex_grow = block_style.flex_grow.max(1.0);
                }
                return self.build_text_node(&combined, &block_style, parent_width, true);
            }
        }

        let my_width = match style.width {
            style::Dimension::Px(w) => w,
            style::Dimension::Percent(p) => parent_width * p / 100.0,
            style::Dimension::Auto => parent_width - style.margin.horizontal(),
        };
        let inner_width = my_width - style.padding.horizontal() - 2.0 * style.border_width;

        // Estimate per-child width for rows and grids so text wraps to the
        // column width at build time.
        let elem_child_count = children
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { .. }))
            .count()
            .max(1);
        let columns = if style.display == style::Display::Grid {
            style.grid_columns.max(1)
        } else if *tag == Tag::Tr
            || (style.display == style::Display::Flex
                && style.flex_direction == style::FlexDirection::Row)
        {
            elem_child_count
        } else {
            1
        };
        let child_build_width = if columns > 1 {
            let gap_total = style.gap * (columns - 1) as f32;
            ((inner_width - gap_total) / columns as f32).max(1.0)
        } else {
            inner_width
        };

        let mut child_nodes = Vec::with_capacity(children.len());
        for child in children {
            if child.style().display == style::Display::None {
                continue;
            }
            child_nodes.push(self.build_node(child, child_build_width)?);
        }

        // Images with an Auto side take it from the intrinsic aspect ratio;
        // otherwise a childless node computes to 0×0.
        let style_override = match (tag, src) {
            (Tag::Img, Some(src))
                if matches!(style.width, style::Dimension::Auto)
                    || matches!(style.height, style::Dimension::Auto) =>
            {
                resolve_img_auto_dimensions(src, style, parent_width)
            }
            _ => None,
        };

        let effective_style = style_override.as_ref().unwrap_or(style);
        let taffy_style = computed_to_taffy(effective_style, tag);
        let node = self
            .taffy
            .new_with_children(taffy_style, &child_nodes)
            .map_err(layout_err)?;
        self.node_styles.insert(node, effective_style.clone());

        if let (Tag::Img, Some(src)) = (tag, src) {
            self.node_content.insert(
                node,
                BoxContent::Image {
                    src: src.to_string(),
                },
            );
        }

        Ok(node)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let style = self.node_styles.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(layout_err)?
            .iter()
            .map(|&child| self.extract(child, x, y))
            .collect::<Result<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style,
            content,
            label: self.node_labels.get(&node).cloned(),
            children,
        })
    }
}

fn computed_to_taffy(s: &ComputedStyle, tag: &Tag) -> Style {
    let mut ts = Style::default();

    // Table model: rows are flex rows of equal-width cells.
    match tag {
        Tag::Table => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
            ts.size.width = dim_to_taffy(s.width);
            ts.size.height = dim_to_taffy(s.height);
            ts.min_size.width = taffy::Dimension::Length(0.0);
            ts.padding = padding_rect(&s.padding);
            ts.margin = margin_rect(&s.margin);
            ts.border = border_rect(s);
            return ts;
        }
        Tag::Tr => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.align_items = Some(taffy::AlignItems::Stretch);
            ts.size.width = taffy::Dimension::Percent(1.0);
            ts.min_size.width = taffy::Dimension::Length(0.0);
            ts.margin = margin_rect(&s.margin);
            ts.border = border_rect(s);
            return ts;
        }
        Tag::Td | Tag::Th => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
            ts.flex_grow = if s.flex_grow > 0.0 { s.flex_grow } else { 1.0 };
            ts.flex_shrink = 1.0;
            ts.flex_basis = taffy::Dimension::Length(0.0);
            ts.min_size.width = taffy::Dimension::Length(0.0);
            ts.padding = padding_rect(&s.padding);
            ts.border = border_rect(s);
            return ts;
        }
        _ => {}
    }

    match s.display {
        style::Display::Flex => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            ts.flex_wrap = match s.flex_wrap {
                style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
            };
            ts.justify_content = Some(match s.justify_content {
                style::JustifyContent::Start => taffy::JustifyContent::Start,
                style::JustifyContent::End => taffy::JustifyContent::End,
                style::JustifyContent::Center => taffy::JustifyContent::Center,
                style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
            });
            ts.align_items = Some(match s.align_items {
                style::AlignItems::Start => taffy::AlignItems::Start,
                style::AlignItems::End => taffy::AlignItems::End,
                style::AlignItems::Center => taffy::AlignItems::Center,
                style::AlignItems::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::Grid => {
            ts.display = taffy::Display::Grid;
            ts.grid_template_columns =
                vec![taffy::TrackSizingFunction::from_flex(1.0); s.grid_columns.max(1)];
        }
        style::Display::Block => {
            // Block-level elements stack vertically.
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
        }
        style::Display::Inline => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.flex_wrap = taffy::FlexWrap::Wrap;
        }
        style::Display::None => {
            ts.display = taffy::Display::None;
        }
    }

    ts.size = Size {
        width: dim_to_taffy(s.width),
        height: dim_to_taffy(s.height),
    };
    // Allow flex items to compress below their natural content size.
    ts.min_size = Size {
        width: if s.flex_shrink > 0.0 || s.flex_grow > 0.0 {
            taffy::Dimension::Length(0.0)
        } else {
            taffy::Dimension::Auto
        },
        height: dim_to_taffy(s.min_height),
    };

    ts.flex_grow = s.flex_grow;
    ts.flex_shrink = s.flex_shrink;
    ts.margin = margin_rect(&s.margin);
    ts.padding = padding_rect(&s.padding);
    ts.border = border_rect(s);
    ts.gap = Size {
        width: LengthPercentage::Length(s.gap),
        height: LengthPercentage::Length(s.gap),
    };

    ts
}

fn dim_to_taffy(d: style::Dimension) -> taffy::Dimension {
    match d {
        style::Dimension::Auto => taffy::Dimension::Auto,
        style::Dimension::Px(v) => taffy::Dimension::Length(v),
        style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn margin_rect(e: &style::Edges) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(e.top),
        right: LengthPercentageAuto::Length(e.right),
        bottom: LengthPercentageAuto::Length(e.bottom),
        left: LengthPercentageAuto::Length(e.left),
    }
}

fn padding_rect(e: &style::Edges) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(e.top),
        right: LengthPercentage::Length(e.right),
        bottom: LengthPercentage::Length(e.bottom),
        left: LengthPercentage::Length(e.left),
    }
}

fn border_rect(s: &ComputedStyle) -> Rect<LengthPercentage> {
    let w = s.border_width;
    let side = if s.border_bottom_only { 0.0 } else { w };
    Rect {
        top: LengthPercentage::Length(side),
        right: LengthPercentage::Length(side),
        bottom: LengthPercentage::Length(w),
        left: LengthPercentage::Length(side),
    }
}

// ---------------------------------------------------------------------------
// Image intrinsic-size helper
// ---------------------------------------------------------------------------

/// Decode a base64 data-URI image and return a copy of `style` with any
/// `Auto` side replaced by a length derived from the intrinsic aspect ratio.
///
/// `None` when the source cannot be decoded or both sides are already set.
fn resolve_img_auto_dimensions(src: &str, style: &ComputedStyle, parent_width: f32) -> Option<ComputedStyle> {
    let bytes = crate::painter::decode_data_uri(src).ok()?;
    let img = ::image::load_from_memory(&bytes).ok()?;
    let (px_w, px_h) = (img.width() as f32, img.height() as f32);
    if px_w == 0.0 || px_h == 0.0 {
        return None;
    }
    let aspect = px_w / px_h;

    let known_w = match style.width {
        style::Dimension::Px(v) => Some(v),
        style::Dimension::Percent(p) => Some(parent_width * p / 100.0),
        style::Dimension::Auto => None,
    };
    let known_h = match style.height {
        style::Dimension::Px(v) => Some(v),
        _ => None,
    };

    let mut s = style.clone();
    match (known_w, known_h) {
        (Some(w), None) => s.height = style::Dimension::Px((w / aspect).max(1.0)),
        (None, Some(h)) => s.width = style::Dimension::Px((h * aspect).max(1.0)),
        // 1 px = 1 pt.
        (None, None) => {
            s.width = style::Dimension::Px(px_w);
            s.height = style::Dimension::Px(px_h);
        }
        (Some(_), Some(_)) => return None,
    }
    Some(s)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out `styled_nodes` in a column `content_width` wide whose left edge
/// sits at `origin_x`. Returns the top-level boxes in document coordinates
/// (y starts at 0).
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    content_width: f32,
    origin_x: f32,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>> {
    let mut builder = LayoutBuilder::new(fonts, content_width);

    let mut child_ids = Vec::with_capacity(styled_nodes.len());
    for node in styled_nodes {
        if node.style().display == style::Display::None {
            continue;
        }
        child_ids.push(builder.build_node(node, content_width)?);
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(content_width),
            height: taffy::Dimension::Auto,
        },
        ..Default::default()
    };

    let root = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    Ok(builder.extract(root, origin_x, 0.0)?.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::style::build_styled_tree;

    fn layout(html: &str) -> Vec<PositionedBox> {
        let styled = build_styled_tree(&parse_html(html), None);
        compute_layout(&styled, 515.0, 40.0, &FontManager::default()).unwrap()
    }

    #[test]
    fn layout_simple_paragraph() {
        let boxes = layout("<p>Hello world</p>");
        assert!(!boxes.is_empty(), "Should produce at least one box");
        let first = &boxes[0];
        assert!(first.width > 0.0, "Box should have width");
        assert!(first.height > 0.0, "Box should have height");
        assert_eq!(first.x, 40.0);
    }

    #[test]
    fn grid_places_cells_side_by_side() {
        let boxes = layout(
            r#"<div style="display: grid; grid-template-columns: repeat(2, 1fr); gap: 5px"><p>A</p><p>B</p><p>C</p></div>"#,
        );
        let grid = &boxes[0];
        assert_eq!(grid.children.len(), 3);
        let (a, b, c) = (&grid.children[0], &grid.children[1], &grid.children[2]);
        assert_eq!(a.y, b.y);
        assert!(b.x > a.x);
        assert!(c.y > a.y);
    }

    #[test]
    fn labels_survive_layout() {
        let boxes = layout(r#"<div data-label="schedule"><p>x</p></div>"#);
        assert_eq!(boxes[0].label.as_deref(), Some("schedule"));
    }

    #[test]
    fn centred_text_fills_its_container() {
        let boxes = layout(r#"<p style="text-align: center">Hi</p>"#);
        assert!((boxes[0].width - 515.0).abs() < 0.5);
    }

    #[test]
    fn hidden_nodes_take_no_space() {
        let boxes = layout(r#"<div style="display: none"><p>gone</p></div><p>kept</p>"#);
        assert_eq!(boxes.len(), 1);
    }
}
