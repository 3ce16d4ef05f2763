//! Font registration and text measurement.
//!
//! Drawing always uses the PDF builtin faces, so measurement defaults to
//! builtin metrics. Custom faces supplied as [`FontSource`]s are parsed with
//! `ttf-parser` once per [`FontSession`]; a face that fails to parse is a
//! font error, which the render session answers with a fallback retry.

use std::collections::{HashMap, HashSet};

use base64::Engine;

use crate::customization::Typography;
use crate::error::{CallsheetError, Result};

/// Metrics of a loaded face.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_ascii_lowercase(),
            bold,
            italic,
        }
    }
}

/// Loaded faces keyed by family/bold/italic.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
        }
    }

    /// Load a TTF/OTF face from bytes.
    pub fn load_font(&mut self, family: &str, bold: bool, italic: bool, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|e| CallsheetError::Font {
            family: family.to_string(),
            message: format!("failed to parse font: {e}"),
        })?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            line_gap: face.line_gap() as f32,
            bytes,
        };
        self.fonts.insert(FontKey::new(family, bold, italic), data);
        Ok(())
    }

    pub fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts.get(key)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
    }

    /// Width of `text` at `font_size` points.
    ///
    /// Loaded faces contribute real glyph advances. Builtin faces use an
    /// average-advance heuristic: 0.5 em (0.55 bold), 0.6 em for Courier.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, italic: bool, family: &str) -> f32 {
        let key = FontKey::new(family, bold, italic);
        let Some(data) = self.get(&key).filter(|d| !d.bytes.is_empty()) else {
            return builtin_advance(family, bold) * font_size * text.chars().count() as f32;
        };

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            Err(_) => text.chars().count() as f32 * font_size * 0.5,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_advance(family: &str, bold: bool) -> f32 {
    if family.eq_ignore_ascii_case("courier") {
        0.6
    } else if bold {
        0.55
    } else {
        0.5
    }
}

// ---------------------------------------------------------------------------
// Per-session registration
// ---------------------------------------------------------------------------

/// A custom face offered to a session, as base64-encoded TTF/OTF bytes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FontSource {
    /// Family token matched against `typography.fontFamily`.
    pub family: String,
    #[serde(default = "FontSource::default_weight")]
    pub weight: u16,
    pub data: String,
}

impl FontSource {
    fn default_weight() -> u16 {
        400
    }
}

/// Font registration state owned by one render session.
///
/// Families are registered at most once per session; [`FontSession::reset`]
/// forgets every registration.
#[derive(Default)]
pub struct FontSession {
    sources: Vec<FontSource>,
    registered: HashSet<String>,
    fonts: FontManager,
}

impl FontSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<FontSource>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    pub fn sources(&self) -> &[FontSource] {
        &self.sources
    }

    /// Register every family the typography asks for, including section
    /// overrides. Families without a source need no registration: they
    /// resolve to builtin faces.
    pub fn register(&mut self, typography: &Typography) -> Result<()> {
        let mut families = vec![typography.font_family.to_ascii_lowercase()];
        families.extend(
            typography
                .section_fonts
                .values()
                .filter_map(|o| o.family.as_ref())
                .map(|f| f.to_ascii_lowercase()),
        );

        for family in families {
            if self.registered.contains(&family) {
                continue;
            }
            let matching: Vec<FontSource> = self
                .sources
                .iter()
                .filter(|s| s.family.eq_ignore_ascii_case(&family))
                .cloned()
                .collect();
            for source in &matching {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(source.data.trim())
                    .map_err(|e| CallsheetError::Font {
                        family: family.clone(),
                        message: format!("font data is not base64: {e}"),
                    })?;
                self.fonts.load_font(&family, source.weight >= 600, false, bytes)?;
            }
            if !matching.is_empty() {
                log::debug!("registered {} face(s) for font family {family}", matching.len());
            }
            self.registered.insert(family);
        }
        Ok(())
    }

    pub fn is_registered(&self, family: &str) -> bool {
        self.registered.contains(&family.to_ascii_lowercase())
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    /// Forget all registrations. Sources stay configured.
    pub fn reset(&mut self) {
        self.registered.clear();
        self.fonts.clear();
    }
}

/// Word-wrap text to fit within `max_width` points. Returns the lines.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    italic: bool,
    family: &str,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold, italic, family);
            if w > max_width && !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customization::{FontOverride, PdfCustomization};

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, false, false, "Helvetica");
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let mono = mgr.measure_text_width("Hello", 10.0, false, false, "Courier");
        assert!((mono - 30.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, false, false, "Helvetica", 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
    }

    #[test]
    fn families_without_sources_register_as_builtin() {
        let mut session = FontSession::new();
        let typography = PdfCustomization::default().typography;
        session.register(&typography).unwrap();
        assert!(session.is_registered("inter"));
        assert!(session.fonts().is_empty());
    }

    #[test]
    fn broken_source_is_a_font_error() {
        let mut session = FontSession::with_sources(vec![FontSource {
            family: "inter".into(),
            weight: 400,
            data: "bm90IGEgZm9udA==".into(),
        }]);
        let typography = PdfCustomization::default().typography;
        let err = session.register(&typography).unwrap_err();
        assert!(err.is_font_error(), "{err:?}");
        assert!(!session.is_registered("inter"));
    }

    #[test]
    fn section_override_families_are_registered() {
        let mut typography = PdfCustomization::default().typography;
        typography.section_fonts.insert(
            "schedule".into(),
            FontOverride {
                family: Some("Courier".into()),
                ..Default::default()
            },
        );
        let mut session = FontSession::new();
        session.register(&typography).unwrap();
        assert!(session.is_registered("courier"));
        assert_eq!(session.registered_count(), 2);
    }

    #[test]
    fn reset_clears_registrations() {
        let mut session = FontSession::new();
        session.register(&PdfCustomization::default().typography).unwrap();
        assert!(session.registered_count() > 0);
        session.reset();
        assert_eq!(session.registered_count(), 0);
    }
}
