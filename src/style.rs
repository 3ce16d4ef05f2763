//! Computed styles shared by the component-tree and HTML backends.
//!
//! The component-tree backend fills [`ComputedStyle`] directly; the HTML
//! backend gets it by resolving `style` attributes. Either way the layout
//! engine only ever sees a [`StyledNode`] tree.

use crate::dom::{DomNode, ElementNode, Tag};

#[derive(Debug, Clone)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,
    /// Number of equal `1fr` columns for grid containers.
    pub grid_columns: usize,

    pub width: Dimension,
    pub height: Dimension,
    pub min_height: Dimension,

    pub margin: Edges,
    pub padding: Edges,

    pub border_width: f32,
    pub border_color: Color,
    /// Only the bottom edge is stroked (table rows, dividers).
    pub border_bottom_only: bool,
    pub border_radius: f32,
    pub box_shadow: Option<BoxShadow>,

    pub font_size: f32,
    pub font_weight: FontWeight,
    /// Builtin family name (`Helvetica`, `Times`, `Courier`).
    pub font_family: String,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub uppercase: bool,

    pub background_color: Color,
    pub background_gradient: Option<LinearGradient>,
    pub opacity: f32,

    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            grid_columns: 1,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_height: Dimension::Auto,
            margin: Edges::ZERO,
            padding: Edges::ZERO,
            border_width: 0.0,
            border_color: Color::BLACK,
            border_bottom_only: false,
            border_radius: 0.0,
            box_shadow: None,
            font_size: 10.0,
            font_weight: FontWeight::Normal,
            font_family: "Helvetica".to_string(),
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            uppercase: false,
            background_color: Color::TRANSPARENT,
            background_gradient: None,
            opacity: 1.0,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// Style for a text run: inherits the text properties of `parent` and
    /// none of its box properties.
    pub fn text_of(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            font_weight: parent.font_weight,
            font_family: parent.font_family.clone(),
            font_style: parent.font_style,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            uppercase: parent.uppercase,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

impl FontWeight {
    /// Builtin faces come in two weights; 600 and up is bold.
    pub fn from_numeric(w: u16) -> Self {
        if w >= 600 {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

/// Four-sided spacing in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub const ZERO: Self = Self::all(0.0);

    pub const fn all(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub const fn xy(x: f32, y: f32) -> Self {
        Self {
            top: y,
            right: x,
            bottom: y,
            left: x,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientAxis {
    Horizontal,
    Vertical,
    Diagonal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGradient {
    pub from: Color,
    pub to: Color,
    pub axis: GradientAxis,
}

/// A drop shadow, emulated by layered offset rectangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShadow {
    pub offset_y: f32,
    pub blur: f32,
    pub color: Color,
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            3 => {
                let mut it = hex.chars().map(|c| channel(&c.to_string().repeat(2)));
                Some(Self::rgb(it.next()??, it.next()??, it.next()??))
            }
            6 | 8 if hex.is_ascii() => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 },
            }),
            _ => None,
        }
    }

    /// Hex form used when writing inline CSS; alpha is emitted only when
    /// the colour is translucent.
    pub fn to_hex(&self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a < 1.0 {
            format!("#{:02x}{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b), c(self.a))
        } else {
            format!("#{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
        }
    }

    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Alpha-composite this colour over an opaque `base`.
    pub fn over(&self, base: &Color) -> Color {
        Color::rgb(
            self.r * self.a + base.r * (1.0 - self.a),
            self.g * self.a + base.g * (1.0 - self.a),
            self.b * self.a + base.b * (1.0 - self.a),
        )
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

// ---------------------------------------------------------------------------
// Inline style resolution (HTML backend)
// ---------------------------------------------------------------------------

/// Resolve the style of an element, inheriting text properties from its
/// parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = match parent {
        Some(p) => ComputedStyle::text_of(p),
        None => ComputedStyle::default(),
    };
    apply_tag_defaults(&mut style, &element.tag);
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 | Tag::H2 | Tag::Strong | Tag::Th => s.font_weight = FontWeight::Bold,
        Tag::Span | Tag::Br => s.display = Display::Inline,
        Tag::Td => s.padding = Edges::xy(4.0, 3.0),
        Tag::Head | Tag::Unknown(_) => s.display = Display::None,
        _ => {}
    }
    if *tag == Tag::Th {
        s.padding = Edges::xy(4.0, 3.0);
    }
}

pub fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        if let Some((prop, val)) = decl.split_once(':') {
            let (prop, val) = (prop.trim(), val.trim());
            if !prop.is_empty() {
                apply_css_property(s, prop, val);
            }
        }
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "grid" => Display::Grid,
                "block" => Display::Block,
                "inline" | "inline-block" => Display::Inline,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = if val == "column" {
                FlexDirection::Column
            } else {
                FlexDirection::Row
            }
        }
        "flex-wrap" => {
            s.flex_wrap = if val == "wrap" {
                FlexWrap::Wrap
            } else {
                FlexWrap::NoWrap
            }
        }
        "flex" => {
            // Only the `flex: <grow>` shorthand is emitted.
            if let Some(grow) = val.split_whitespace().next().and_then(|v| v.parse().ok()) {
                s.flex_grow = grow;
                s.flex_shrink = 1.0;
            }
        }
        "flex-grow" => s.flex_grow = val.parse().unwrap_or(s.flex_grow),
        "justify-content" => {
            s.justify_content = match val {
                "flex-end" | "end" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                _ => JustifyContent::Start,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "flex-start" | "start" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                _ => AlignItems::Stretch,
            }
        }
        "gap" => s.gap = parse_px(val).unwrap_or(s.gap),
        "grid-template-columns" => s.grid_columns = parse_repeat_columns(val).unwrap_or(1),
        "width" => s.width = parse_dimension(val),
        "height" => s.height = parse_dimension(val),
        "min-height" => s.min_height = parse_dimension(val),
        "margin" => s.margin = parse_edges(val).unwrap_or(s.margin),
        "margin-top" => s.margin.top = parse_px(val).unwrap_or(s.margin.top),
        "margin-bottom" => s.margin.bottom = parse_px(val).unwrap_or(s.margin.bottom),
        "padding" => s.padding = parse_edges(val).unwrap_or(s.padding),
        "border" => apply_border(s, val, false),
        "border-bottom" => apply_border(s, val, true),
        "border-radius" => s.border_radius = parse_px(val).unwrap_or(s.border_radius),
        "box-shadow" => s.box_shadow = parse_box_shadow(val),
        "font-size" => s.font_size = parse_px(val).unwrap_or(s.font_size),
        "font-weight" => {
            s.font_weight = match val {
                "bold" => FontWeight::Bold,
                "normal" => FontWeight::Normal,
                n => n.parse().map(FontWeight::from_numeric).unwrap_or(s.font_weight),
            }
        }
        "font-family" => {
            if let Some(first) = val.split(',').next() {
                let name = first.trim().trim_matches(|c| c == '"' || c == '\'');
                if !name.is_empty() {
                    s.font_family = name.to_string();
                }
            }
        }
        "font-style" => {
            s.font_style = if val == "italic" {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            }
        }
        "text-transform" => s.uppercase = val == "uppercase",
        "color" => s.color = Color::from_hex(val).unwrap_or(s.color),
        "background-color" => s.background_color = Color::from_hex(val).unwrap_or(s.background_color),
        "background" => {
            if let Some(g) = parse_linear_gradient(val) {
                s.background_gradient = Some(g);
            } else if let Some(c) = Color::from_hex(val) {
                s.background_color = c;
            }
        }
        "opacity" => s.opacity = val.parse::<f32>().map(|o| o.clamp(0.0, 1.0)).unwrap_or(1.0),
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(px) = parse_px(val) {
                s.line_height = px / s.font_size;
            }
        }
        "break-inside" | "page-break-inside" => s.page_break_inside_avoid = val == "avoid",
        _ => {}
    }
}

fn apply_border(s: &mut ComputedStyle, val: &str, bottom_only: bool) {
    // `<width> solid <color>`
    for part in val.split_whitespace() {
        if let Some(px) = parse_px(part) {
            s.border_width = px;
        } else if let Some(c) = Color::from_hex(part) {
            s.border_color = c;
        }
    }
    s.border_bottom_only = bottom_only;
}

pub fn parse_px(s: &str) -> Option<f32> {
    let s = s.trim();
    s.strip_suffix("px")
        .or_else(|| s.strip_suffix("pt"))
        .unwrap_or(s)
        .parse()
        .ok()
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if s == "auto" {
        Dimension::Auto
    } else if let Some(p) = s.strip_suffix('%') {
        p.parse().map(Dimension::Percent).unwrap_or(Dimension::Auto)
    } else {
        parse_px(s).map(Dimension::Px).unwrap_or(Dimension::Auto)
    }
}

fn parse_edges(val: &str) -> Option<Edges> {
    let parts: Vec<f32> = val.split_whitespace().filter_map(parse_px).collect();
    match parts[..] {
        [a] => Some(Edges::all(a)),
        [y, x] => Some(Edges::xy(x, y)),
        [t, r, b, l] => Some(Edges {
            top: t,
            right: r,
            bottom: b,
            left: l,
        }),
        _ => None,
    }
}

/// `repeat(3, 1fr)` or `1fr 1fr 1fr`.
fn parse_repeat_columns(val: &str) -> Option<usize> {
    if let Some(inner) = val.trim().strip_prefix("repeat(") {
        return inner.split(',').next()?.trim().parse().ok();
    }
    let n = val.split_whitespace().filter(|t| t.ends_with("fr")).count();
    (n > 0).then_some(n)
}

/// `linear-gradient(to right, #a, #b)`; `to bottom` and `to bottom right`
/// are also understood.
fn parse_linear_gradient(val: &str) -> Option<LinearGradient> {
    let inner = val.trim().strip_prefix("linear-gradient(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(str::trim);
    let first = parts.next()?;
    let (axis, from) = match first {
        "to right" => (GradientAxis::Horizontal, parts.next()?),
        "to bottom" => (GradientAxis::Vertical, parts.next()?),
        "to bottom right" | "135deg" => (GradientAxis::Diagonal, parts.next()?),
        colour => (GradientAxis::Vertical, colour),
    };
    Some(LinearGradient {
        from: Color::from_hex(from)?,
        to: Color::from_hex(parts.next()?)?,
        axis,
    })
}

/// `0 <offset-y> <blur> <color>`.
fn parse_box_shadow(val: &str) -> Option<BoxShadow> {
    if val == "none" {
        return None;
    }
    let tokens: Vec<&str> = val.split_whitespace().collect();
    let lengths: Vec<f32> = tokens.iter().filter_map(|t| parse_px(t)).collect();
    let color = tokens.iter().rev().find_map(|t| Color::from_hex(t))?;
    Some(BoxShadow {
        offset_y: *lengths.get(1)?,
        blur: lengths.get(2).copied().unwrap_or(0.0),
        color,
    })
}

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// A node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Image source for `<img>`.
        src: Option<String>,
        /// Carried through to the layout IR so rows can be found after
        /// pagination.
        label: Option<String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Build a styled tree from parsed markup, resolving styles top-down.
pub fn build_styled_tree(nodes: &[DomNode], parent: Option<&ComputedStyle>) -> Vec<StyledNode> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) => {
                let style = resolve_style(e, parent);
                let children = build_styled_tree(&e.children, Some(&style));
                out.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    src: e.src().map(str::to_string),
                    label: e.label().map(str::to_string),
                });
            }
            DomNode::Text(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                let style = parent.map(ComputedStyle::text_of).unwrap_or_default();
                out.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_style_font_and_colour() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-size: 24px; color: #ff0000; font-weight: 600");
        assert_eq!(s.font_size, 24.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
        assert_eq!(s.font_weight, FontWeight::Bold);
    }

    #[test]
    fn medium_weight_is_not_bold() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-weight: 500");
        assert_eq!(s.font_weight, FontWeight::Normal);
    }

    #[test]
    fn hex_forms() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
        let translucent = Color::from_hex("#00000080").unwrap();
        assert!((translucent.a - 0.502).abs() < 0.01);
        assert_eq!(Color::from_hex("red"), None);
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#1e3a5f").unwrap().to_hex(), "#1e3a5f");
    }

    #[test]
    fn gradient_and_shadow_parse() {
        let mut s = ComputedStyle::default();
        apply_inline_style(
            &mut s,
            "background: linear-gradient(to right, #000000, #ffffff); box-shadow: 0 2px 6px #0000001f",
        );
        let g = s.background_gradient.unwrap();
        assert_eq!(g.axis, GradientAxis::Horizontal);
        assert_eq!(g.to, Color::WHITE);
        let shadow = s.box_shadow.unwrap();
        assert_eq!(shadow.offset_y, 2.0);
        assert_eq!(shadow.blur, 6.0);
    }

    #[test]
    fn grid_columns_and_edges() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "display: grid; grid-template-columns: repeat(3, 1fr); padding: 4px 8px");
        assert_eq!(s.display, Display::Grid);
        assert_eq!(s.grid_columns, 3);
        assert_eq!(s.padding, Edges::xy(8.0, 4.0));
    }

    #[test]
    fn text_nodes_do_not_inherit_box_properties() {
        let mut parent = ComputedStyle::default();
        parent.background_color = Color::WHITE;
        parent.padding = Edges::all(10.0);
        parent.font_size = 14.0;
        let text = ComputedStyle::text_of(&parent);
        assert!(text.background_color.is_transparent());
        assert_eq!(text.padding, Edges::ZERO);
        assert_eq!(text.font_size, 14.0);
    }
}
