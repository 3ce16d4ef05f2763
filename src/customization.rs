//! The customization model: every visual choice a renderer consults.
//!
//! [`PdfCustomization`] is a complete value: no sub-tree is optional once a
//! value exists. Partial configurations only ever exist as JSON and are
//! completed by [`crate::merge`] before they reach a renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CallsheetError, Result};
use crate::style::Color;
use crate::themes::{theme_bundle, ThemeName};

/// Corner radius used whenever the configured one is unusable.
pub const DEFAULT_CORNER_RADIUS: f32 = 8.0;

/// A4 in PDF points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfCustomization {
    pub layout: LayoutSettings,
    pub typography: Typography,
    pub colors: Colors,
    pub visual: Visual,
    pub branding: Branding,
    pub sections: SectionSettings,
    pub theme: ThemeName,
    pub smart: Smart,
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    pub header_style: HeaderStyle,
    pub margins: Margins,
    pub spacing: Spacing,
    pub orientation: Orientation,
    pub template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderStyle {
    Minimal,
    Professional,
    Creative,
    Corporate,
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    pub section_gap: f32,
    pub item_gap: f32,
    pub card_spacing: f32,
    /// Multiplier applied to body font size.
    pub line_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

// ---------------------------------------------------------------------------
// Typography
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    /// Family token such as `"inter"` or `"helvetica"`, resolved per backend.
    pub font_family: String,
    pub font_size: FontSizes,
    pub font_weight: FontWeights,
    pub line_height: LineHeights,
    /// Per-section overrides keyed by section key (`"schedule"`, `"cast"`...).
    #[serde(default)]
    pub section_fonts: BTreeMap<String, FontOverride>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSizes {
    pub title: f32,
    pub header: f32,
    pub body: f32,
    pub small: f32,
    pub caption: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontWeights {
    pub title: FontWeight,
    pub header: FontWeight,
    pub body: FontWeight,
    pub small: FontWeight,
    pub caption: FontWeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineHeights {
    pub title: f32,
    pub header: f32,
    pub body: f32,
    pub small: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontWeight {
    Normal,
    Medium,
    Semibold,
    Bold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontOverride {
    pub family: Option<String>,
    pub size: Option<f32>,
    pub weight: Option<FontWeight>,
}

/// Typographic role of a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Title,
    Header,
    Body,
    Small,
    Caption,
}

impl Typography {
    pub fn size_for(&self, role: TextRole) -> f32 {
        match role {
            TextRole::Title => self.font_size.title,
            TextRole::Header => self.font_size.header,
            TextRole::Body => self.font_size.body,
            TextRole::Small => self.font_size.small,
            TextRole::Caption => self.font_size.caption,
        }
    }

    pub fn weight_for(&self, role: TextRole) -> FontWeight {
        match role {
            TextRole::Title => self.font_weight.title,
            TextRole::Header => self.font_weight.header,
            TextRole::Body => self.font_weight.body,
            TextRole::Small => self.font_weight.small,
            TextRole::Caption => self.font_weight.caption,
        }
    }

    pub fn line_height_for(&self, role: TextRole) -> f32 {
        match role {
            TextRole::Title => self.line_height.title,
            TextRole::Header => self.line_height.header,
            TextRole::Body => self.line_height.body,
            TextRole::Small | TextRole::Caption => self.line_height.small,
        }
    }
}

// ---------------------------------------------------------------------------
// Colors / visual
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Colors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub text: String,
    pub background: String,
    pub surface: String,
    pub border: String,
    pub header_text: String,
    pub header_background: String,
    #[serde(default)]
    pub gradient: Option<Gradient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub from: String,
    pub to: String,
    pub direction: GradientDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GradientDirection {
    ToRight,
    ToBottom,
    ToBottomRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visual {
    pub card_style: CardStyle,
    pub section_divider: DividerStyle,
    pub header_background: HeaderBackground,
    /// Must be finite and non-negative; see [`PdfCustomization::sanitized`].
    pub corner_radius: f32,
    pub shadow_intensity: ShadowIntensity,
    pub icon_style: IconStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardStyle {
    Minimal,
    Elevated,
    Bordered,
    Gradient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DividerStyle {
    Line,
    Space,
    ColoredBar,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderBackground {
    Solid,
    Gradient,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShadowIntensity {
    None,
    Subtle,
    Medium,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IconStyle {
    None,
    Minimal,
    Filled,
    Outlined,
}

// ---------------------------------------------------------------------------
// Branding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub company_name: String,
    #[serde(default)]
    pub primary_logo: Option<Logo>,
    #[serde(default)]
    pub secondary_logo: Option<Logo>,
    pub footer: FooterSettings,
    #[serde(default)]
    pub watermark: Option<Watermark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logo {
    /// Embeddable image reference (`data:image/png;base64,...`).
    pub url: String,
    pub position: LogoPosition,
    pub size: LogoSize,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoPosition {
    TopLeft,
    TopCenter,
    TopRight,
    HeaderLeft,
    HeaderCenter,
    HeaderRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogoSize {
    Small,
    Medium,
    Large,
}

impl LogoSize {
    /// Logo box height in points.
    pub fn height_pt(self) -> f32 {
        match self {
            LogoSize::Small => 24.0,
            LogoSize::Medium => 36.0,
            LogoSize::Large => 52.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FooterSettings {
    pub text: String,
    pub alignment: Alignment,
    pub style: FooterStyle,
    #[serde(default)]
    pub union_compliant: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FooterStyle {
    Minimal,
    Standard,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    pub opacity: f32,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSettings {
    /// Render order of section keys. Unknown keys are ignored.
    pub order: Vec<String>,
    pub visibility: Visibility,
    pub formatting: Formatting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub weather: bool,
    pub emergency_contacts: bool,
    pub schedule: bool,
    pub notes: bool,
    pub company_info: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formatting {
    pub contact_layout: ContactLayout,
    pub compact_schedule: bool,
    pub emergency_prominent: bool,
    pub show_icons: bool,
    pub alternate_row_colors: bool,
    pub department_color_coding: bool,
    pub urgency_highlighting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactLayout {
    Table,
    Cards,
    Compact,
}

/// Keys accepted in `sections.order` and `typography.sectionFonts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKey {
    Header,
    Details,
    Notes,
    Schedule,
    Cast,
    Crew,
    Emergency,
    Footer,
}

impl SectionKey {
    pub const DEFAULT_ORDER: [SectionKey; 8] = [
        SectionKey::Header,
        SectionKey::Details,
        SectionKey::Notes,
        SectionKey::Schedule,
        SectionKey::Cast,
        SectionKey::Crew,
        SectionKey::Emergency,
        SectionKey::Footer,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "header" => Some(SectionKey::Header),
            "details" | "productionDetails" => Some(SectionKey::Details),
            "notes" | "specialNotes" => Some(SectionKey::Notes),
            "schedule" => Some(SectionKey::Schedule),
            "cast" => Some(SectionKey::Cast),
            "crew" => Some(SectionKey::Crew),
            "emergency" | "emergencyContacts" => Some(SectionKey::Emergency),
            "footer" => Some(SectionKey::Footer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::Header => "header",
            SectionKey::Details => "details",
            SectionKey::Notes => "notes",
            SectionKey::Schedule => "schedule",
            SectionKey::Cast => "cast",
            SectionKey::Crew => "crew",
            SectionKey::Emergency => "emergency",
            SectionKey::Footer => "footer",
        }
    }
}

// ---------------------------------------------------------------------------
// Smart production metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Smart {
    pub production_type: ProductionType,
    pub urgency: Urgency,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub episode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductionType {
    Feature,
    Series,
    Commercial,
    MusicVideo,
    Documentary,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Urgency {
    Standard,
    Rush,
    Emergency,
}

// ---------------------------------------------------------------------------
// Defaults and checks
// ---------------------------------------------------------------------------

impl Default for PdfCustomization {
    fn default() -> Self {
        let bundle = theme_bundle(ThemeName::Professional);
        Self {
            layout: LayoutSettings {
                header_style: HeaderStyle::Professional,
                margins: Margins {
                    top: 36.0,
                    bottom: 36.0,
                    left: 36.0,
                    right: 36.0,
                },
                spacing: Spacing {
                    section_gap: 14.0,
                    item_gap: 6.0,
                    card_spacing: 8.0,
                    line_height: 1.4,
                },
                orientation: Orientation::Portrait,
                template: "standard".to_string(),
            },
            typography: bundle.typography,
            colors: bundle.colors,
            visual: bundle.visual,
            branding: Branding {
                company_name: String::new(),
                primary_logo: None,
                secondary_logo: None,
                footer: FooterSettings {
                    text: "Please be on set 15 minutes before your call time.".to_string(),
                    alignment: Alignment::Center,
                    style: FooterStyle::Standard,
                    union_compliant: None,
                },
                watermark: None,
            },
            sections: SectionSettings {
                order: SectionKey::DEFAULT_ORDER
                    .iter()
                    .map(|k| k.as_str().to_string())
                    .collect(),
                visibility: Visibility {
                    weather: true,
                    emergency_contacts: true,
                    schedule: true,
                    notes: true,
                    company_info: true,
                },
                formatting: Formatting {
                    contact_layout: ContactLayout::Table,
                    compact_schedule: false,
                    emergency_prominent: true,
                    show_icons: true,
                    alternate_row_colors: true,
                    department_color_coding: false,
                    urgency_highlighting: true,
                },
            },
            theme: ThemeName::Professional,
            smart: Smart {
                production_type: ProductionType::Feature,
                urgency: Urgency::Standard,
                network: None,
                season: None,
                episode: None,
            },
        }
    }
}

/// True when `r` is usable as a corner radius.
pub fn radius_is_valid(r: f32) -> bool {
    r.is_finite() && r >= 0.0
}

impl PdfCustomization {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str::<Self>(json)?.sanitized())
    }

    /// Replace an unusable corner radius with [`DEFAULT_CORNER_RADIUS`].
    ///
    /// Renderers call this on entry because a configuration can reach them
    /// without going through the merger.
    pub fn sanitized(mut self) -> Self {
        if !radius_is_valid(self.visual.corner_radius) {
            log::warn!(
                "visual.cornerRadius {} is not a finite non-negative number; using {}",
                self.visual.corner_radius,
                DEFAULT_CORNER_RADIUS
            );
            self.visual.corner_radius = DEFAULT_CORNER_RADIUS;
        }
        self
    }

    /// Overwrite colors, typography and visual with a named theme bundle.
    pub fn apply_theme(&mut self, name: ThemeName) {
        let bundle = theme_bundle(name);
        self.colors = bundle.colors;
        self.typography = bundle.typography;
        self.visual = bundle.visual;
        self.theme = name;
    }

    /// Page size in points after applying orientation.
    pub fn page_size_pt(&self) -> (f32, f32) {
        match self.layout.orientation {
            Orientation::Portrait => (A4_WIDTH_PT, A4_HEIGHT_PT),
            Orientation::Landscape => (A4_HEIGHT_PT, A4_WIDTH_PT),
        }
    }

    pub fn content_width(&self) -> f32 {
        let (w, _) = self.page_size_pt();
        w - self.layout.margins.left - self.layout.margins.right
    }

    /// Check the numeric and colour fields renderers rely on.
    pub fn validate(&self) -> Result<()> {
        let sizes = &self.typography.font_size;
        for (field, v) in [
            ("typography.fontSize.title", sizes.title),
            ("typography.fontSize.header", sizes.header),
            ("typography.fontSize.body", sizes.body),
            ("typography.fontSize.small", sizes.small),
            ("typography.fontSize.caption", sizes.caption),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(CallsheetError::validation(field, format!("{v} is not a positive size")));
            }
        }

        let m = &self.layout.margins;
        for (field, v) in [
            ("layout.margins.top", m.top),
            ("layout.margins.bottom", m.bottom),
            ("layout.margins.left", m.left),
            ("layout.margins.right", m.right),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(CallsheetError::validation(field, format!("{v} is not a valid margin")));
            }
        }
        let (w, h) = self.page_size_pt();
        if w - m.left - m.right < 72.0 || h - m.top - m.bottom < 72.0 {
            return Err(CallsheetError::validation(
                "layout.margins",
                "margins leave no printable area",
            ));
        }

        let c = &self.colors;
        let mut colors = vec![
            ("colors.primary", &c.primary),
            ("colors.secondary", &c.secondary),
            ("colors.accent", &c.accent),
            ("colors.text", &c.text),
            ("colors.background", &c.background),
            ("colors.surface", &c.surface),
            ("colors.border", &c.border),
            ("colors.headerText", &c.header_text),
            ("colors.headerBackground", &c.header_background),
        ];
        if let Some(g) = &c.gradient {
            colors.push(("colors.gradient.from", &g.from));
            colors.push(("colors.gradient.to", &g.to));
        }
        for (field, hex) in colors {
            if Color::from_hex(hex).is_none() {
                return Err(CallsheetError::validation(field, format!("{hex:?} is not a hex colour")));
            }
        }
        Ok(())
    }
}
