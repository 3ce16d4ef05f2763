//! Section builders shared by all three backends.
//!
//! Each builder is a pure function of the callsheet and the customization
//! that returns an abstract [`SectionBlock`]. Visibility, ordering and
//! empty-text rules are applied here once; backends only translate blocks
//! into their own primitives.

use crate::callsheet::{format_eighths, safe_opt, safe_text, total_eighths, Callsheet, Contact};
use crate::customization::{
    Alignment, ContactLayout, FooterStyle, HeaderStyle, IconStyle, LogoPosition, PdfCustomization,
    ProductionType, SectionKey, Urgency,
};
use crate::error::Result;
use crate::resolve::{department_color, Palette};
use crate::style::Color;

/// A labelled value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    /// `None` when the value is empty or whitespace-only.
    fn new(label: &str, value: &str) -> Option<Self> {
        safe_text(value).map(|v| Self {
            label: label.to_string(),
            value: v.to_string(),
        })
    }
}

/// Section heading with an optional icon marker.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionTitle {
    pub text: String,
    pub icon: Option<IconStyle>,
}

impl SectionTitle {
    /// Heading text with its icon marker. Markers stay inside WinAnsi so
    /// the builtin faces can draw them.
    pub fn display(&self) -> String {
        match self.icon {
            Some(IconStyle::Filled) => format!("\u{2022} {}", self.text),
            Some(IconStyle::Outlined) => format!("\u{00BB} {}", self.text),
            Some(IconStyle::Minimal) => format!("\u{2013} {}", self.text),
            Some(IconStyle::None) | None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogoRef {
    pub url: String,
    pub position: LogoPosition,
    pub height: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock {
    pub title: String,
    pub style: HeaderStyle,
    pub company: Option<String>,
    pub date: String,
    pub call_time: Option<String>,
    /// Network / season / episode, series productions only.
    pub series_line: Option<String>,
    pub urgency: Option<String>,
    pub logos: Vec<LogoRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailsBlock {
    pub title: SectionTitle,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotesBlock {
    pub title: SectionTitle,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub scene: String,
    pub int_ext: String,
    pub description: String,
    pub location: Option<String>,
    pub pages: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleBlock {
    pub title: SectionTitle,
    pub compact: bool,
    pub alternate_rows: bool,
    pub columns: Vec<&'static str>,
    pub rows: Vec<ScheduleRow>,
    /// Page-count total, when any row has a parsable count.
    pub total_pages: Option<String>,
}

impl ScheduleBlock {
    /// Cells of a row in column order.
    pub fn cells<'a>(&self, row: &'a ScheduleRow) -> Vec<&'a str> {
        let opt = |v: &'a Option<String>| v.as_deref().unwrap_or("");
        if self.compact {
            vec![&row.scene, &row.int_ext, &row.description, opt(&row.pages)]
        } else {
            vec![
                &row.scene,
                &row.int_ext,
                &row.description,
                opt(&row.location),
                opt(&row.pages),
                opt(&row.time),
            ]
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactRow {
    pub name: String,
    pub role: Option<String>,
    /// Character (cast) or department (crew).
    pub detail: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Department colour when colour coding is on.
    pub tint: Option<Color>,
}

impl ContactRow {
    /// Non-empty secondary lines, in display order.
    pub fn lines(&self) -> Vec<&str> {
        [&self.role, &self.detail, &self.phone, &self.email]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactBlock {
    pub key: SectionKey,
    pub title: SectionTitle,
    pub layout: ContactLayout,
    /// Emergency contacts drawn with the accent colour and a heavier frame.
    pub prominent: bool,
    pub alternate_rows: bool,
    pub rows: Vec<ContactRow>,
    pub note: Option<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FooterBlock {
    pub text: Option<String>,
    pub alignment: Alignment,
    pub style: FooterStyle,
    pub company: Option<String>,
    pub union_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionBlock {
    Header(HeaderBlock),
    Details(DetailsBlock),
    Notes(NotesBlock),
    Schedule(ScheduleBlock),
    Contacts(ContactBlock),
    Footer(FooterBlock),
}

impl SectionBlock {
    pub fn key(&self) -> SectionKey {
        match self {
            SectionBlock::Header(_) => SectionKey::Header,
            SectionBlock::Details(_) => SectionKey::Details,
            SectionBlock::Notes(_) => SectionKey::Notes,
            SectionBlock::Schedule(_) => SectionKey::Schedule,
            SectionBlock::Contacts(c) => c.key,
            SectionBlock::Footer(_) => SectionKey::Footer,
        }
    }
}

/// Ordered blocks for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPlan {
    pub title: String,
    pub sections: Vec<SectionBlock>,
    pub watermark: Option<(String, f32)>,
}

impl DocumentPlan {
    pub fn keys(&self) -> Vec<SectionKey> {
        self.sections.iter().map(SectionBlock::key).collect()
    }

    pub fn find(&self, key: SectionKey) -> Option<&SectionBlock> {
        self.sections.iter().find(|s| s.key() == key)
    }
}

fn title(text: &str, c: &PdfCustomization) -> SectionTitle {
    let icon = match c.visual.icon_style {
        IconStyle::None => None,
        _ if !c.sections.formatting.show_icons => None,
        style => Some(style),
    };
    SectionTitle {
        text: text.to_string(),
        icon,
    }
}

pub fn build_header(sheet: &Callsheet, c: &PdfCustomization) -> HeaderBlock {
    let smart = &c.smart;
    let series_line = (smart.production_type == ProductionType::Series)
        .then(|| {
            let parts: Vec<String> = [
                safe_opt(&smart.network).map(str::to_string),
                safe_opt(&smart.season).map(|s| format!("Season {s}")),
                safe_opt(&smart.episode).map(|e| format!("Episode {e}")),
            ]
            .into_iter()
            .flatten()
            .collect();
            (!parts.is_empty()).then(|| parts.join(" · "))
        })
        .flatten();

    let urgency = match (c.sections.formatting.urgency_highlighting, smart.urgency) {
        (true, Urgency::Rush) => Some("RUSH".to_string()),
        (true, Urgency::Emergency) => Some("EMERGENCY".to_string()),
        _ => None,
    };

    let logos = [&c.branding.primary_logo, &c.branding.secondary_logo]
        .into_iter()
        .flatten()
        .filter_map(|logo| {
            safe_text(&logo.url).map(|url| LogoRef {
                url: url.to_string(),
                position: logo.position,
                height: logo.size.height_pt(),
                opacity: logo.opacity.clamp(0.0, 1.0),
            })
        })
        .collect();

    HeaderBlock {
        title: sheet.project_title.trim().to_string(),
        style: c.layout.header_style,
        company: c
            .sections
            .visibility
            .company_info
            .then(|| safe_text(&c.branding.company_name).map(str::to_string))
            .flatten(),
        date: sheet.shoot_date.trim().to_string(),
        call_time: safe_text(&sheet.general_call_time).map(|t| format!("General call {t}")),
        series_line,
        urgency,
        logos,
    }
}

pub fn build_details(sheet: &Callsheet, c: &PdfCustomization) -> DetailsBlock {
    let mut fields: Vec<Field> = [
        Field::new("Location", &sheet.location),
        Field::new("Address", &sheet.location_address),
        Field::new("General Call", &sheet.general_call_time),
    ]
    .into_iter()
    .flatten()
    .collect();
    if c.sections.visibility.weather {
        fields.extend(Field::new("Weather", &sheet.weather));
    }
    fields.extend(Field::new("Parking", &sheet.parking_instructions));
    fields.extend(Field::new("Basecamp", &sheet.basecamp_location));
    fields.extend(Field::new("Emergency", &sheet.emergency_number));

    let stats = sheet.stats();
    if stats.cast + stats.crew > 0 {
        fields.extend(Field::new(
            "Headcount",
            &format!("{} cast · {} crew", stats.cast, stats.crew),
        ));
    }

    DetailsBlock {
        title: title("Production Details", c),
        fields,
    }
}

/// `None` when notes are hidden or blank.
pub fn build_notes(sheet: &Callsheet, c: &PdfCustomization) -> Option<NotesBlock> {
    if !c.sections.visibility.notes {
        return None;
    }
    let paragraphs: Vec<String> = sheet
        .special_notes
        .split("\n\n")
        .filter_map(safe_text)
        .map(str::to_string)
        .collect();
    (!paragraphs.is_empty()).then(|| NotesBlock {
        title: title("Special Notes", c),
        paragraphs,
    })
}

/// `None` when the schedule is hidden or empty.
pub fn build_schedule(sheet: &Callsheet, c: &PdfCustomization) -> Option<ScheduleBlock> {
    if !c.sections.visibility.schedule || sheet.schedule.is_empty() {
        return None;
    }
    let compact = c.sections.formatting.compact_schedule;
    let rows = sheet
        .schedule
        .iter()
        .map(|item| ScheduleRow {
            scene: item.scene_number.trim().to_string(),
            int_ext: item.int_ext.label().to_string(),
            description: item.description.trim().to_string(),
            location: safe_text(&item.location).map(str::to_string),
            pages: safe_text(&item.page_count).map(str::to_string),
            time: safe_text(&item.estimated_time).map(str::to_string),
        })
        .collect();

    Some(ScheduleBlock {
        title: title("Shooting Schedule", c),
        compact,
        alternate_rows: c.sections.formatting.alternate_row_colors,
        columns: if compact {
            vec!["Scene", "I/E", "Description", "Pages"]
        } else {
            vec!["Scene", "I/E", "Description", "Location", "Pages", "Time"]
        },
        rows,
        total_pages: total_eighths(&sheet.schedule).map(format_eighths),
    })
}

fn contact_row(contact: &Contact, key: SectionKey, c: &PdfCustomization, palette: &Palette) -> ContactRow {
    let detail = match key {
        SectionKey::Cast => safe_opt(&contact.character).map(|ch| format!("as {ch}")),
        _ => safe_opt(&contact.department).map(str::to_string),
    };
    let tint = match (key, safe_opt(&contact.department)) {
        (SectionKey::Crew, Some(dept)) if c.sections.formatting.department_color_coding => {
            Some(department_color(dept, palette))
        }
        _ => None,
    };
    ContactRow {
        name: contact.name.trim().to_string(),
        role: safe_text(&contact.role).map(str::to_string),
        detail,
        phone: safe_text(&contact.phone).map(str::to_string),
        email: safe_opt(&contact.email).map(str::to_string),
        tint,
    }
}

/// Cast, crew or emergency contacts. `None` when the collection is empty
/// or, for emergency contacts, hidden. Cast and crew have no toggle.
pub fn build_contact_section(sheet: &Callsheet, c: &PdfCustomization, key: SectionKey) -> Option<ContactBlock> {
    let (heading, contacts) = match key {
        SectionKey::Cast => ("Cast", &sheet.cast),
        SectionKey::Crew => ("Crew", &sheet.crew),
        SectionKey::Emergency if c.sections.visibility.emergency_contacts => {
            ("Emergency Contacts", &sheet.emergency_contacts)
        }
        _ => return None,
    };
    if contacts.is_empty() {
        return None;
    }
    let palette = Palette::new(&c.colors);
    let emergency = key == SectionKey::Emergency;
    Some(ContactBlock {
        key,
        title: title(heading, c),
        layout: c.sections.formatting.contact_layout,
        prominent: emergency && c.sections.formatting.emergency_prominent,
        alternate_rows: c.sections.formatting.alternate_row_colors,
        rows: contacts.iter().map(|ct| contact_row(ct, key, c, &palette)).collect(),
        note: if emergency {
            sheet
                .nearest_hospital
                .as_deref()
                .and_then(|h| Field::new("Nearest Hospital", h))
        } else {
            None
        },
    })
}

/// `None` when there is nothing to print.
pub fn build_footer(_sheet: &Callsheet, c: &PdfCustomization) -> Option<FooterBlock> {
    let footer = &c.branding.footer;
    let detailed = footer.style == FooterStyle::Detailed;
    let block = FooterBlock {
        text: safe_text(&footer.text).map(str::to_string),
        alignment: footer.alignment,
        style: footer.style,
        company: (detailed && c.sections.visibility.company_info)
            .then(|| safe_text(&c.branding.company_name).map(str::to_string))
            .flatten(),
        union_line: (footer.union_compliant == Some(true) && footer.style != FooterStyle::Minimal)
            .then(|| "Union-compliant production".to_string()),
    };
    (block.text.is_some() || block.company.is_some() || block.union_line.is_some()).then_some(block)
}

/// Middle sections in render order, exactly as listed in `sections.order`.
/// Unknown keys are ignored and duplicates render once; sections left out of
/// the list are not rendered. Header and footer are excluded.
pub fn section_order(c: &PdfCustomization) -> Vec<SectionKey> {
    let mut out: Vec<SectionKey> = Vec::new();
    let requested = c.sections.order.iter().filter_map(|k| {
        let key = SectionKey::parse(k);
        if key.is_none() {
            log::debug!("ignoring unknown section key {k:?}");
        }
        key
    });
    for key in requested {
        if !matches!(key, SectionKey::Header | SectionKey::Footer) && !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

fn build_section(sheet: &Callsheet, c: &PdfCustomization, key: SectionKey) -> Option<SectionBlock> {
    match key {
        SectionKey::Header => Some(SectionBlock::Header(build_header(sheet, c))),
        SectionKey::Details => Some(SectionBlock::Details(build_details(sheet, c))),
        SectionKey::Notes => build_notes(sheet, c).map(SectionBlock::Notes),
        SectionKey::Schedule => build_schedule(sheet, c).map(SectionBlock::Schedule),
        SectionKey::Cast | SectionKey::Crew | SectionKey::Emergency => {
            build_contact_section(sheet, c, key).map(SectionBlock::Contacts)
        }
        SectionKey::Footer => build_footer(sheet, c).map(SectionBlock::Footer),
    }
}

/// Guard every backend entry point runs before layout or drawing: the
/// callsheet must carry its required fields and the customization is
/// sanitized, then validated.
pub fn checked_inputs(sheet: &Callsheet, c: &PdfCustomization) -> Result<PdfCustomization> {
    sheet.validate()?;
    let c = c.clone().sanitized();
    c.validate()?;
    Ok(c)
}

/// Apply order, visibility and empty-collection rules once for all
/// backends. The header is always first and the footer always last.
pub fn plan_document(sheet: &Callsheet, c: &PdfCustomization) -> DocumentPlan {
    let mut sections = vec![SectionBlock::Header(build_header(sheet, c))];
    sections.extend(
        section_order(c)
            .into_iter()
            .filter_map(|key| build_section(sheet, c, key)),
    );
    sections.extend(build_section(sheet, c, SectionKey::Footer));

    DocumentPlan {
        title: sheet.project_title.trim().to_string(),
        sections,
        watermark: c
            .branding
            .watermark
            .as_ref()
            .and_then(|w| safe_text(&w.text).map(|t| (t.to_string(), w.opacity.clamp(0.0, 1.0)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::sample_callsheet;

    fn contacts(plan: &DocumentPlan, key: SectionKey) -> &ContactBlock {
        match plan.find(key) {
            Some(SectionBlock::Contacts(block)) => block,
            other => panic!("expected {key:?} contacts, got {other:?}"),
        }
    }

    #[test]
    fn default_plan_has_every_section_in_order() {
        let plan = plan_document(&sample_callsheet(), &PdfCustomization::default());
        assert_eq!(plan.keys(), SectionKey::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn blank_email_yields_no_line() {
        let mut sheet = sample_callsheet();
        sheet.cast[0].email = Some(String::new());
        sheet.cast[1].email = Some("   ".into());
        sheet.cast[2].email = Some("lead@example.com".into());
        let plan = plan_document(&sheet, &PdfCustomization::default());
        let block = contacts(&plan, SectionKey::Cast);
        assert_eq!(block.rows[0].email, None);
        assert_eq!(block.rows[1].email, None);
        let with_email: Vec<_> = block.rows[2].lines().into_iter().filter(|l| l.contains('@')).collect();
        assert_eq!(with_email, vec!["lead@example.com"]);
    }

    #[test]
    fn schedule_visibility_flag() {
        let sheet = sample_callsheet();
        let mut c = PdfCustomization::default();
        c.sections.visibility.schedule = false;
        assert!(plan_document(&sheet, &c).find(SectionKey::Schedule).is_none());
        c.sections.visibility.schedule = true;
        assert!(plan_document(&sheet, &c).find(SectionKey::Schedule).is_some());
    }

    #[test]
    fn cast_and_crew_have_no_toggle_but_need_content() {
        let mut sheet = sample_callsheet();
        let mut c = PdfCustomization::default();
        c.sections.visibility = crate::customization::Visibility {
            weather: false,
            emergency_contacts: false,
            schedule: false,
            notes: false,
            company_info: false,
        };
        let plan = plan_document(&sheet, &c);
        assert!(plan.find(SectionKey::Cast).is_some());
        assert!(plan.find(SectionKey::Crew).is_some());
        assert!(plan.find(SectionKey::Emergency).is_none());

        sheet.crew.clear();
        assert!(plan_document(&sheet, &c).find(SectionKey::Crew).is_none());
    }

    #[test]
    fn order_ignores_unknown_and_duplicate_keys() {
        let mut c = PdfCustomization::default();
        c.sections.order = ["footer", "crew", "weather", "crew", "cast", "header"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let keys = plan_document(&sample_callsheet(), &c).keys();
        assert_eq!(keys.first(), Some(&SectionKey::Header));
        assert_eq!(keys.last(), Some(&SectionKey::Footer));
        assert_eq!(keys[1], SectionKey::Crew);
        assert_eq!(keys[2], SectionKey::Cast);
        assert_eq!(keys.iter().filter(|k| **k == SectionKey::Crew).count(), 1);
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn sections_left_out_of_the_order_are_not_rendered() {
        let mut c = PdfCustomization::default();
        c.sections.order = ["header", "details", "cast", "footer"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            plan_document(&sample_callsheet(), &c).keys(),
            vec![SectionKey::Header, SectionKey::Details, SectionKey::Cast, SectionKey::Footer]
        );

        // Header and footer stay pinned even when the order omits them.
        c.sections.order = vec!["crew".into()];
        assert_eq!(
            plan_document(&sample_callsheet(), &c).keys(),
            vec![SectionKey::Header, SectionKey::Crew, SectionKey::Footer]
        );
    }

    #[test]
    fn weather_line_follows_visibility() {
        let sheet = sample_callsheet();
        let mut c = PdfCustomization::default();
        let has_weather = |c: &PdfCustomization| {
            build_details(&sheet, c).fields.iter().any(|f| f.label == "Weather")
        };
        assert!(has_weather(&c));
        c.sections.visibility.weather = false;
        assert!(!has_weather(&c));
    }

    #[test]
    fn series_line_only_for_series() {
        let sheet = sample_callsheet();
        let mut c = PdfCustomization::default();
        c.smart.network = Some("HBO".into());
        c.smart.season = Some("2".into());
        c.smart.episode = Some("5".into());
        assert_eq!(build_header(&sheet, &c).series_line, None);
        c.smart.production_type = ProductionType::Series;
        assert_eq!(
            build_header(&sheet, &c).series_line.as_deref(),
            Some("HBO · Season 2 · Episode 5")
        );
    }

    #[test]
    fn schedule_totals_page_counts() {
        let block = build_schedule(&sample_callsheet(), &PdfCustomization::default()).unwrap();
        assert!(block.total_pages.is_some());
        assert_eq!(block.columns.len(), block.cells(&block.rows[0]).len());
    }

    #[test]
    fn crew_tints_only_with_colour_coding() {
        let sheet = sample_callsheet();
        let mut c = PdfCustomization::default();
        assert!(build_contact_section(&sheet, &c, SectionKey::Crew)
            .unwrap()
            .rows
            .iter()
            .all(|r| r.tint.is_none()));
        c.sections.formatting.department_color_coding = true;
        assert!(build_contact_section(&sheet, &c, SectionKey::Crew)
            .unwrap()
            .rows
            .iter()
            .any(|r| r.tint.is_some()));
    }

    #[test]
    fn empty_footer_is_skipped() {
        let mut c = PdfCustomization::default();
        c.branding.footer.text = "  ".into();
        assert!(build_footer(&sample_callsheet(), &c).is_none());
    }
}
