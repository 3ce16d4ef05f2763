//! Named theme bundles. Selecting a theme overwrites the colors,
//! typography and visual sub-trees of a customization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::customization::{
    CardStyle, Colors, DividerStyle, FontSizes, FontWeight, FontWeights, Gradient,
    GradientDirection, HeaderBackground, IconStyle, LineHeights, ShadowIntensity, Typography,
    Visual, DEFAULT_CORNER_RADIUS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    Professional,
    Modern,
    Minimal,
    Creative,
    Dark,
}

impl ThemeName {
    pub const ALL: [ThemeName; 5] = [
        ThemeName::Professional,
        ThemeName::Modern,
        ThemeName::Minimal,
        ThemeName::Creative,
        ThemeName::Dark,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeName::Professional => "professional",
            ThemeName::Modern => "modern",
            ThemeName::Minimal => "minimal",
            ThemeName::Creative => "creative",
            ThemeName::Dark => "dark",
        }
    }
}

/// The three sub-trees a theme controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeBundle {
    pub colors: Colors,
    pub typography: Typography,
    pub visual: Visual,
}

#[allow(clippy::too_many_arguments)]
fn palette(
    primary: &str,
    secondary: &str,
    accent: &str,
    text: &str,
    background: &str,
    surface: &str,
    border: &str,
    header_text: &str,
    header_background: &str,
) -> Colors {
    Colors {
        primary: primary.to_string(),
        secondary: secondary.to_string(),
        accent: accent.to_string(),
        text: text.to_string(),
        background: background.to_string(),
        surface: surface.to_string(),
        border: border.to_string(),
        header_text: header_text.to_string(),
        header_background: header_background.to_string(),
        gradient: None,
    }
}

fn type_scale(family: &str, title: f32, header_weight: FontWeight) -> Typography {
    Typography {
        font_family: family.to_string(),
        font_size: FontSizes {
            title,
            header: 13.0,
            body: 10.0,
            small: 9.0,
            caption: 8.0,
        },
        font_weight: FontWeights {
            title: FontWeight::Bold,
            header: header_weight,
            body: FontWeight::Normal,
            small: FontWeight::Normal,
            caption: FontWeight::Normal,
        },
        line_height: LineHeights {
            title: 1.2,
            header: 1.3,
            body: 1.4,
            small: 1.3,
        },
        section_fonts: BTreeMap::new(),
    }
}

pub fn theme_bundle(name: ThemeName) -> ThemeBundle {
    match name {
        ThemeName::Professional => ThemeBundle {
            colors: palette(
                "#1e3a5f", "#4a6fa5", "#e8a33d", "#1f2937", "#ffffff", "#f5f7fa", "#d1d5db",
                "#ffffff", "#1e3a5f",
            ),
            typography: type_scale("inter", 24.0, FontWeight::Semibold),
            visual: Visual {
                card_style: CardStyle::Bordered,
                section_divider: DividerStyle::Line,
                header_background: HeaderBackground::Solid,
                corner_radius: DEFAULT_CORNER_RADIUS,
                shadow_intensity: ShadowIntensity::Subtle,
                icon_style: IconStyle::Minimal,
            },
        },
        ThemeName::Modern => {
            let mut colors = palette(
                "#4f46e5", "#7c3aed", "#06b6d4", "#111827", "#ffffff", "#f3f4f6", "#e5e7eb",
                "#ffffff", "#4f46e5",
            );
            colors.gradient = Some(Gradient {
                from: "#4f46e5".to_string(),
                to: "#7c3aed".to_string(),
                direction: GradientDirection::ToRight,
            });
            ThemeBundle {
                colors,
                typography: type_scale("poppins", 26.0, FontWeight::Semibold),
                visual: Visual {
                    card_style: CardStyle::Elevated,
                    section_divider: DividerStyle::Space,
                    header_background: HeaderBackground::Gradient,
                    corner_radius: 12.0,
                    shadow_intensity: ShadowIntensity::Medium,
                    icon_style: IconStyle::Filled,
                },
            }
        }
        ThemeName::Minimal => ThemeBundle {
            colors: palette(
                "#111111", "#555555", "#888888", "#111111", "#ffffff", "#ffffff", "#e0e0e0",
                "#111111", "#ffffff",
            ),
            typography: type_scale("helvetica", 22.0, FontWeight::Medium),
            visual: Visual {
                card_style: CardStyle::Minimal,
                section_divider: DividerStyle::Line,
                header_background: HeaderBackground::None,
                corner_radius: 0.0,
                shadow_intensity: ShadowIntensity::None,
                icon_style: IconStyle::None,
            },
        },
        ThemeName::Creative => {
            let mut colors = palette(
                "#db2777", "#f59e0b", "#10b981", "#1f2937", "#fffdf7", "#fff7ed", "#fcd34d",
                "#ffffff", "#db2777",
            );
            colors.gradient = Some(Gradient {
                from: "#db2777".to_string(),
                to: "#f59e0b".to_string(),
                direction: GradientDirection::ToBottomRight,
            });
            ThemeBundle {
                colors,
                typography: type_scale("montserrat", 28.0, FontWeight::Bold),
                visual: Visual {
                    card_style: CardStyle::Gradient,
                    section_divider: DividerStyle::ColoredBar,
                    header_background: HeaderBackground::Gradient,
                    corner_radius: 16.0,
                    shadow_intensity: ShadowIntensity::Strong,
                    icon_style: IconStyle::Filled,
                },
            }
        }
        ThemeName::Dark => ThemeBundle {
            colors: palette(
                "#38bdf8", "#94a3b8", "#f472b6", "#e2e8f0", "#0f172a", "#1e293b", "#334155",
                "#f8fafc", "#020617",
            ),
            typography: type_scale("roboto", 24.0, FontWeight::Semibold),
            visual: Visual {
                card_style: CardStyle::Bordered,
                section_divider: DividerStyle::ColoredBar,
                header_background: HeaderBackground::Solid,
                corner_radius: 6.0,
                shadow_intensity: ShadowIntensity::None,
                icon_style: IconStyle::Outlined,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customization::PdfCustomization;

    #[test]
    fn every_theme_validates() {
        for name in ThemeName::ALL {
            let mut c = PdfCustomization::default();
            c.apply_theme(name);
            c.validate()
                .unwrap_or_else(|e| panic!("theme {} invalid: {e}", name.as_str()));
            assert_eq!(c.theme, name);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ThemeName::parse("Minimal"), Some(ThemeName::Minimal));
        assert_eq!(ThemeName::parse("neon"), None);
    }
}
