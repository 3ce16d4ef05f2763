//! Style and font resolution: typography, colour and visual tokens from a
//! [`PdfCustomization`] turned into concrete primitives every backend can
//! emit.
//!
//! Only the PDF builtin families are drawable, so every family token maps
//! onto one of them. An unknown token never fails a render.

use crate::customization::{
    CardStyle, Colors, DividerStyle, FontWeight, GradientDirection, HeaderBackground,
    PdfCustomization, SectionKey, ShadowIntensity, TextRole, Typography, DEFAULT_CORNER_RADIUS,
};
use crate::style::{Color, GradientAxis, LinearGradient};

/// Fallback family used by the retry path.
pub const FALLBACK_FAMILY: &str = "helvetica";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFamily {
    Helvetica,
    Times,
    Courier,
}

impl BuiltinFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinFamily::Helvetica => "Helvetica",
            BuiltinFamily::Times => "Times",
            BuiltinFamily::Courier => "Courier",
        }
    }
}

const SANS: &[&str] = &[
    "inter", "helvetica", "poppins", "montserrat", "roboto", "arial", "open-sans", "open sans",
    "lato", "sans-serif", "system-ui",
];
const SERIF: &[&str] = &["times", "times new roman", "georgia", "playfair", "merriweather", "serif"];
const MONO: &[&str] = &["courier", "courier new", "mono", "monospace", "jetbrains mono", "fira code"];

/// Map a family token onto a builtin family.
pub fn resolve_family(token: &str) -> BuiltinFamily {
    let t = token.trim().to_ascii_lowercase();
    if SANS.contains(&t.as_str()) {
        BuiltinFamily::Helvetica
    } else if SERIF.contains(&t.as_str()) {
        BuiltinFamily::Times
    } else if MONO.contains(&t.as_str()) {
        BuiltinFamily::Courier
    } else {
        log::debug!("unknown font family {token:?}; using Helvetica");
        BuiltinFamily::Helvetica
    }
}

pub fn weight_value(weight: FontWeight) -> u16 {
    match weight {
        FontWeight::Normal => 400,
        FontWeight::Medium => 500,
        FontWeight::Semibold => 600,
        FontWeight::Bold => 700,
    }
}

/// Numeric weight for a token such as `"semibold"` or `"600"`.
pub fn parse_weight(token: &str) -> u16 {
    match token.trim().to_ascii_lowercase().as_str() {
        "normal" | "regular" => 400,
        "medium" => 500,
        "semibold" | "semi-bold" => 600,
        "bold" => 700,
        n => n.parse().unwrap_or(400),
    }
}

/// Builtin faces come in two weights.
pub fn is_bold(weight: u16) -> bool {
    weight >= 600
}

/// A concrete font for one run of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFont {
    pub family: BuiltinFamily,
    pub size: f32,
    pub weight: u16,
    /// Multiplier of `size`.
    pub line_height: f32,
}

impl ResolvedFont {
    pub fn bold(&self) -> bool {
        is_bold(self.weight)
    }

    pub fn line_pt(&self) -> f32 {
        self.size * self.line_height
    }
}

/// Font for `role` inside `section`, honouring `sectionFonts` overrides.
pub fn section_font(typography: &Typography, section: Option<SectionKey>, role: TextRole) -> ResolvedFont {
    let base = ResolvedFont {
        family: resolve_family(&typography.font_family),
        size: typography.size_for(role),
        weight: weight_value(typography.weight_for(role)),
        line_height: typography.line_height_for(role),
    };
    let Some(over) = section.and_then(|k| typography.section_fonts.get(k.as_str())) else {
        return base;
    };
    ResolvedFont {
        family: over.family.as_deref().map_or(base.family, resolve_family),
        // Overrides resize the body role; other roles keep their ratio to it.
        size: match over.size {
            Some(s) if s.is_finite() && s > 0.0 => base.size * s / typography.font_size.body,
            _ => base.size,
        },
        weight: match (over.weight, role) {
            (Some(w), TextRole::Body | TextRole::Small) => weight_value(w),
            _ => base.weight,
        },
        line_height: base.line_height,
    }
}

/// Parse a configured colour, falling back to black.
pub fn color(hex: &str) -> Color {
    Color::from_hex(hex).unwrap_or_else(|| {
        log::warn!("invalid colour {hex:?}; using black");
        Color::BLACK
    })
}

/// The palette as concrete colours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub text: Color,
    pub background: Color,
    pub surface: Color,
    pub border: Color,
    pub header_text: Color,
    pub header_background: Color,
    pub gradient: Option<LinearGradient>,
}

impl Palette {
    pub fn new(c: &Colors) -> Self {
        Self {
            primary: color(&c.primary),
            secondary: color(&c.secondary),
            accent: color(&c.accent),
            text: color(&c.text),
            background: color(&c.background),
            surface: color(&c.surface),
            border: color(&c.border),
            header_text: color(&c.header_text),
            header_background: color(&c.header_background),
            gradient: c.gradient.as_ref().map(|g| LinearGradient {
                from: color(&g.from),
                to: color(&g.to),
                axis: gradient_axis(g.direction),
            }),
        }
    }

    /// Secondary text: the body colour washed halfway toward the background.
    pub fn muted(&self) -> Color {
        self.text.lerp(&self.background, 0.45)
    }
}

pub fn gradient_axis(direction: GradientDirection) -> GradientAxis {
    match direction {
        GradientDirection::ToRight => GradientAxis::Horizontal,
        GradientDirection::ToBottom => GradientAxis::Vertical,
        GradientDirection::ToBottomRight => GradientAxis::Diagonal,
    }
}

/// Corner radius safe to draw with.
pub fn resolve_radius(radius: f32) -> f32 {
    if radius.is_finite() && radius >= 0.0 {
        radius
    } else {
        DEFAULT_CORNER_RADIUS
    }
}

/// One offset rectangle of an emulated drop shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowLayer {
    pub offset_y: f32,
    pub spread: f32,
    pub alpha: f32,
}

/// Layered rectangles for a shadow intensity, furthest first.
pub fn shadow_layers(intensity: ShadowIntensity) -> Vec<ShadowLayer> {
    let (count, base_alpha, step) = match intensity {
        ShadowIntensity::None => return Vec::new(),
        ShadowIntensity::Subtle => (2, 0.06, 1.0),
        ShadowIntensity::Medium => (3, 0.09, 1.5),
        ShadowIntensity::Strong => (4, 0.12, 2.0),
    };
    (0..count)
        .rev()
        .map(|i| ShadowLayer {
            offset_y: step * (i + 1) as f32,
            spread: i as f32 * 0.75,
            alpha: base_alpha / (i + 1) as f32,
        })
        .collect()
}

/// Drawing primitive separating two sections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Divider {
    Line { width: f32, color: Color },
    Gap(f32),
    Bar { height: f32, color: Color },
    None,
}

pub fn divider(style: DividerStyle, palette: &Palette) -> Divider {
    match style {
        DividerStyle::Line => Divider::Line {
            width: 0.75,
            color: palette.border,
        },
        DividerStyle::Space => Divider::Gap(8.0),
        DividerStyle::ColoredBar => Divider::Bar {
            height: 3.0,
            color: palette.accent,
        },
        DividerStyle::None => Divider::None,
    }
}

/// How a surface is filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    None,
    Solid(Color),
    Gradient(LinearGradient),
}

/// Paint of the document header band.
pub fn header_fill(c: &PdfCustomization, palette: &Palette) -> Fill {
    match c.visual.header_background {
        HeaderBackground::None => Fill::None,
        HeaderBackground::Solid => Fill::Solid(palette.header_background),
        HeaderBackground::Gradient => Fill::Gradient(palette.gradient.unwrap_or(LinearGradient {
            from: palette.primary,
            to: palette.secondary,
            axis: GradientAxis::Horizontal,
        })),
    }
}

/// Header text must stay readable when the band is not painted.
pub fn header_text_color(c: &PdfCustomization, palette: &Palette) -> Color {
    match c.visual.header_background {
        HeaderBackground::None => palette.primary,
        _ => palette.header_text,
    }
}

/// Resolved card appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLook {
    pub fill: Fill,
    pub border: Option<(f32, Color)>,
    pub shadows: Vec<ShadowLayer>,
    pub radius: f32,
    /// Colour of the card's title band, when it has one.
    pub band: Option<Color>,
}

pub fn card_look(c: &PdfCustomization, palette: &Palette) -> CardLook {
    let radius = resolve_radius(c.visual.corner_radius);
    let shadows = shadow_layers(c.visual.shadow_intensity);
    match c.visual.card_style {
        CardStyle::Minimal => CardLook {
            fill: Fill::None,
            border: None,
            shadows: Vec::new(),
            radius: 0.0,
            band: None,
        },
        CardStyle::Elevated => CardLook {
            fill: Fill::Solid(palette.surface),
            border: None,
            shadows: if shadows.is_empty() {
                shadow_layers(ShadowIntensity::Subtle)
            } else {
                shadows
            },
            radius,
            band: None,
        },
        CardStyle::Bordered => CardLook {
            fill: Fill::Solid(palette.background),
            border: Some((0.75, palette.border)),
            shadows,
            radius,
            band: Some(palette.surface),
        },
        CardStyle::Gradient => CardLook {
            fill: Fill::Gradient(LinearGradient {
                from: palette.surface,
                to: palette.background,
                axis: GradientAxis::Vertical,
            }),
            border: Some((0.75, palette.border)),
            shadows,
            radius,
            band: Some(palette.primary.lerp(&palette.background, 0.85)),
        },
    }
}

/// Stable tint per department name, for department colour coding.
pub fn department_color(department: &str, palette: &Palette) -> Color {
    const HUES: [Color; 6] = [
        Color::rgb(0.86, 0.15, 0.47),
        Color::rgb(0.15, 0.39, 0.92),
        Color::rgb(0.06, 0.73, 0.51),
        Color::rgb(0.96, 0.62, 0.04),
        Color::rgb(0.55, 0.36, 0.96),
        Color::rgb(0.02, 0.71, 0.83),
    ];
    let key = department.trim().to_ascii_lowercase();
    if key.is_empty() {
        return palette.border;
    }
    let sum: usize = key.bytes().map(usize::from).sum();
    HUES[sum % HUES.len()]
}

/// Everything a backend needs from a customization, resolved once.
#[derive(Debug, Clone)]
pub struct ResolvedStyle {
    pub palette: Palette,
    pub card: CardLook,
    pub divider: Divider,
    pub header: Fill,
    pub header_text: Color,
    typography: Typography,
}

impl ResolvedStyle {
    pub fn new(c: &PdfCustomization) -> Self {
        let palette = Palette::new(&c.colors);
        Self {
            card: card_look(c, &palette),
            divider: divider(c.visual.section_divider, &palette),
            header: header_fill(c, &palette),
            header_text: header_text_color(c, &palette),
            typography: c.typography.clone(),
            palette,
        }
    }

    pub fn font(&self, section: Option<SectionKey>, role: TextRole) -> ResolvedFont {
        section_font(&self.typography, section, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customization::FontOverride;

    #[test]
    fn family_tokens_map_to_builtins() {
        for sans in ["inter", "Helvetica", "poppins", "montserrat"] {
            assert_eq!(resolve_family(sans), BuiltinFamily::Helvetica);
        }
        assert_eq!(resolve_family("Georgia"), BuiltinFamily::Times);
        assert_eq!(resolve_family("courier"), BuiltinFamily::Courier);
        assert_eq!(resolve_family("Comic Neue"), BuiltinFamily::Helvetica);
    }

    #[test]
    fn weights_map_to_numbers() {
        assert_eq!(weight_value(FontWeight::Normal), 400);
        assert_eq!(weight_value(FontWeight::Medium), 500);
        assert_eq!(weight_value(FontWeight::Semibold), 600);
        assert_eq!(weight_value(FontWeight::Bold), 700);
        assert_eq!(parse_weight("semibold"), 600);
        assert_eq!(parse_weight("800"), 800);
        assert!(!is_bold(500));
        assert!(is_bold(600));
    }

    #[test]
    fn section_override_applies_only_to_its_section() {
        let mut c = PdfCustomization::default();
        c.typography.section_fonts.insert(
            "schedule".into(),
            FontOverride {
                family: Some("courier".into()),
                size: Some(8.0),
                weight: Some(FontWeight::Bold),
            },
        );
        let body = c.typography.font_size.body;
        let sched = section_font(&c.typography, Some(SectionKey::Schedule), TextRole::Body);
        assert_eq!(sched.family, BuiltinFamily::Courier);
        assert!((sched.size - 8.0).abs() < 1e-4);
        assert!(sched.bold());
        let cast = section_font(&c.typography, Some(SectionKey::Cast), TextRole::Body);
        assert_eq!(cast.family, BuiltinFamily::Helvetica);
        assert_eq!(cast.size, body);
    }

    #[test]
    fn bad_radius_resolves_to_default() {
        assert_eq!(resolve_radius(f32::NAN), DEFAULT_CORNER_RADIUS);
        assert_eq!(resolve_radius(-1.0), DEFAULT_CORNER_RADIUS);
        assert_eq!(resolve_radius(0.0), 0.0);
    }

    #[test]
    fn shadows_fade_outward() {
        assert!(shadow_layers(ShadowIntensity::None).is_empty());
        let layers = shadow_layers(ShadowIntensity::Strong);
        assert_eq!(layers.len(), 4);
        assert!(layers[0].offset_y > layers[3].offset_y);
        assert!(layers[0].alpha < layers[3].alpha);
    }

    #[test]
    fn dividers_follow_style() {
        let palette = Palette::new(&PdfCustomization::default().colors);
        assert!(matches!(divider(DividerStyle::Line, &palette), Divider::Line { .. }));
        assert!(matches!(divider(DividerStyle::ColoredBar, &palette), Divider::Bar { .. }));
        assert_eq!(divider(DividerStyle::None, &palette), Divider::None);
    }

    #[test]
    fn minimal_cards_paint_nothing() {
        let mut c = PdfCustomization::default();
        c.visual.card_style = CardStyle::Minimal;
        let look = card_look(&c, &Palette::new(&c.colors));
        assert_eq!(look.fill, Fill::None);
        assert!(look.border.is_none());
    }

    #[test]
    fn department_colour_is_stable() {
        let palette = Palette::new(&PdfCustomization::default().colors);
        assert_eq!(department_color("Camera", &palette), department_color("camera", &palette));
    }
}
