//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. This is the "frozen" structure that encodes exactly what
//! goes on each page, so two renders of the same inputs can be compared here.

use serde::{Deserialize, Serialize};

use crate::error::{CallsheetError, Result};

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Painted edge to edge before any box on every page.
    pub page_background: Option<[f32; 4]>,
    /// Painted diagonally across every page after all boxes.
    #[serde(default)]
    pub watermark: Option<WatermarkLayer>,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Marker carried from the styled tree (section key, `schedule-row`,
    /// `contact-row`...).
    #[serde(default)]
    pub label: Option<String>,

    pub background_color: Option<[f32; 4]>,
    #[serde(default)]
    pub gradient: Option<GradientFill>,
    pub border: Option<BorderStyle>,
    #[serde(default)]
    pub corner_radius: f32,
    #[serde(default)]
    pub shadow: Option<ShadowStyle>,
    #[serde(default = "LayoutBox::opaque")]
    pub opacity: f32,

    /// Content (mutually exclusive in practice)
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
    /// Stroke only the bottom edge.
    #[serde(default)]
    pub bottom_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GradientAxis {
    Horizontal,
    Vertical,
    Diagonal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientFill {
    pub from: [f32; 4],
    pub to: [f32; 4],
    pub axis: GradientAxis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowStyle {
    pub offset_y: f32,
    pub blur: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    pub text_align: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the text content area
    pub y_offset: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkLayer {
    pub text: String,
    pub font_size: f32,
    pub color: [f32; 4],
}

impl LayoutConfig {
    pub fn new(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            page_background: None,
            watermark: None,
            pages: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CallsheetError::Config(e.to_string()))
    }

    /// Boxes carrying `label` on each page, in page order.
    pub fn count_labels(&self, label: &str) -> Vec<usize> {
        self.pages
            .iter()
            .map(|p| p.boxes.iter().map(|b| b.count_label(label)).sum())
            .collect()
    }

    /// Concatenated text of every box, page by page.
    pub fn all_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            for b in &page.boxes {
                b.collect_text(&mut out);
            }
        }
        out
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            label: None,
            background_color: None,
            gradient: None,
            border: None,
            corner_radius: 0.0,
            shadow: None,
            opacity: 1.0,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    fn opaque() -> f32 {
        1.0
    }

    pub fn count_label(&self, label: &str) -> usize {
        let own = usize::from(self.label.as_deref() == Some(label));
        own + self.children.iter().map(|c| c.count_label(label)).sum::<usize>()
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            for line in &text.lines {
                out.push_str(&line.text);
                out.push('\n');
            }
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Shift this box and all descendants vertically.
    pub fn offset_y(&mut self, dy: f32) {
        self.y += dy;
        for child in &mut self.children {
            child.offset_y(dy);
        }
    }

    /// True when the box paints nothing itself.
    pub fn is_transparent(&self) -> bool {
        self.background_color.is_none()
            && self.gradient.is_none()
            && self.border.is_none()
            && self.shadow.is_none()
            && self.text.is_none()
            && self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_counted_recursively() {
        let mut section = LayoutBox::new(0.0, 0.0, 100.0, 40.0);
        for i in 0..3 {
            let mut row = LayoutBox::new(0.0, i as f32 * 10.0, 100.0, 10.0);
            row.label = Some("contact-row".into());
            section.children.push(row);
        }
        let mut cfg = LayoutConfig::new("t", 595.28, 841.89);
        cfg.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![section],
        });
        assert_eq!(cfg.count_labels("contact-row"), vec![3]);
    }

    #[test]
    fn json_round_trip_keeps_optional_fields() {
        let mut b = LayoutBox::new(1.0, 2.0, 3.0, 4.0);
        b.corner_radius = 6.0;
        b.shadow = Some(ShadowStyle {
            offset_y: 2.0,
            blur: 4.0,
            color: [0.0, 0.0, 0.0, 0.1],
        });
        let mut cfg = LayoutConfig::new("t", 10.0, 10.0);
        cfg.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![b],
        });
        let back = LayoutConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
