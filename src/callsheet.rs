//! Call-sheet record consumed by every renderer.
//!
//! The record is produced by the form layer and is read-only here. Field
//! names follow the JSON shape the web application stores (`camelCase`).

use serde::{Deserialize, Serialize};

use crate::error::{CallsheetError, Result};

/// One production day's shoot sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Callsheet {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,

    pub project_title: String,
    pub shoot_date: String,
    pub general_call_time: String,
    pub location: String,
    pub location_address: String,
    pub weather: String,
    pub parking_instructions: String,
    pub basecamp_location: String,
    pub special_notes: String,
    pub emergency_number: String,
    pub nearest_hospital: Option<String>,

    pub schedule: Vec<ScheduleItem>,
    pub cast: Vec<Contact>,
    pub crew: Vec<Contact>,
    pub emergency_contacts: Vec<Contact>,
}

/// Interior / exterior flag of a scheduled scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntExt {
    #[default]
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "EXT")]
    Ext,
    #[serde(rename = "INT/EXT")]
    IntExt,
}

impl IntExt {
    pub fn label(self) -> &'static str {
        match self {
            IntExt::Int => "INT",
            IntExt::Ext => "EXT",
            IntExt::IntExt => "INT/EXT",
        }
    }
}

/// One scene / slot in the day's schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleItem {
    pub scene_number: String,
    pub int_ext: IntExt,
    pub description: String,
    pub location: String,
    /// Free text, usually eighths notation such as `"2 1/8"`.
    pub page_count: String,
    /// Free text, not parsed as a time range.
    pub estimated_time: String,
}

impl ScheduleItem {
    /// Page count in eighths of a page. `"2 1/8"` is 17, `"3/8"` is 3,
    /// `"1"` is 8. Unparsable or overflowing input yields `None`.
    pub fn page_eighths(&self) -> Option<u32> {
        let mut total = 0u32;
        let mut seen = false;
        for part in self.page_count.split_whitespace() {
            if let Some((num, den)) = part.split_once('/') {
                let num: u32 = num.trim().parse().ok()?;
                let den: u32 = den.trim().parse().ok()?;
                if den == 0 || 8 % den != 0 {
                    return None;
                }
                total = total.checked_add(num.checked_mul(8 / den)?)?;
            } else {
                let whole: u32 = part.parse().ok()?;
                total = total.checked_add(whole.checked_mul(8)?)?;
            }
            seen = true;
        }
        seen.then_some(total)
    }
}

/// Sum of the parseable page counts, saturating instead of overflowing.
pub fn total_eighths<'a>(items: impl IntoIterator<Item = &'a ScheduleItem>) -> Option<u32> {
    items
        .into_iter()
        .filter_map(ScheduleItem::page_eighths)
        .reduce(u32::saturating_add)
}

/// Format a number of eighths back into page notation (`17` → `"2 1/8"`).
pub fn format_eighths(eighths: u32) -> String {
    let whole = eighths / 8;
    let rest = eighths % 8;
    match (whole, rest) {
        (0, 0) => "0".to_string(),
        (w, 0) => w.to_string(),
        (0, r) => format!("{r}/8"),
        (w, r) => format!("{w} {r}/8"),
    }
}

/// A person on the call sheet. Whether they are cast, crew or an emergency
/// contact is decided by the collection they sit in, never by which of the
/// optional fields are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    pub name: String,
    pub role: String,
    pub phone: String,
    pub email: Option<String>,
    pub character: Option<String>,
    pub department: Option<String>,
}

/// Headcount summary by collection membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallsheetStats {
    pub cast: usize,
    pub crew: usize,
    pub emergency: usize,
    pub scenes: usize,
    pub page_eighths: u32,
}

impl Callsheet {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Guard run before any layout or drawing work starts.
    pub fn validate(&self) -> Result<()> {
        if safe_text(&self.project_title).is_none() {
            return Err(CallsheetError::validation(
                "projectTitle",
                "a renderable callsheet needs a project title",
            ));
        }
        if safe_text(&self.shoot_date).is_none() {
            return Err(CallsheetError::validation(
                "shootDate",
                "a renderable callsheet needs a shoot date",
            ));
        }
        Ok(())
    }

    pub fn stats(&self) -> CallsheetStats {
        CallsheetStats {
            cast: self.cast.len(),
            crew: self.crew.len(),
            emergency: self.emergency_contacts.len(),
            scenes: self.schedule.len(),
            page_eighths: total_eighths(&self.schedule).unwrap_or(0),
        }
    }
}

/// Trimmed text, or `None` when the input is empty or whitespace-only.
///
/// Every text primitive goes through this helper so an empty field never
/// produces an empty text element.
pub fn safe_text(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// [`safe_text`] for optional fields.
pub fn safe_opt(s: &Option<String>) -> Option<&str> {
    s.as_deref().and_then(safe_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_fails_validation() {
        let sheet = Callsheet {
            shoot_date: "2025-03-14".into(),
            ..Default::default()
        };
        match sheet.validate() {
            Err(CallsheetError::Validation { field, .. }) => assert_eq!(field, "projectTitle"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_date_fails_validation() {
        let sheet = Callsheet {
            project_title: "Night Shift".into(),
            shoot_date: "   ".into(),
            ..Default::default()
        };
        match sheet.validate() {
            Err(CallsheetError::Validation { field, .. }) => assert_eq!(field, "shootDate"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn safe_text_elides_blank() {
        assert_eq!(safe_text(""), None);
        assert_eq!(safe_text("  \t "), None);
        assert_eq!(safe_text("  a@b.c "), Some("a@b.c"));
        assert_eq!(safe_opt(&None), None);
        assert_eq!(safe_opt(&Some("   ".into())), None);
    }

    #[test]
    fn page_eighths_parses_notation() {
        let item = |p: &str| ScheduleItem {
            page_count: p.into(),
            ..Default::default()
        };
        assert_eq!(item("2 1/8").page_eighths(), Some(17));
        assert_eq!(item("3/8").page_eighths(), Some(3));
        assert_eq!(item("1").page_eighths(), Some(8));
        assert_eq!(item("1 1/2").page_eighths(), Some(12));
        assert_eq!(item("lots").page_eighths(), None);
        assert_eq!(item("").page_eighths(), None);
        assert_eq!(format_eighths(17), "2 1/8");
        assert_eq!(format_eighths(3), "3/8");
        assert_eq!(format_eighths(16), "2");
    }

    #[test]
    fn huge_page_counts_do_not_overflow() {
        let item = |p: &str| ScheduleItem {
            page_count: p.into(),
            ..Default::default()
        };
        assert_eq!(item("999999999").page_eighths(), None);
        assert_eq!(item("4294967295/1").page_eighths(), None);
        assert_eq!(item("536870911").page_eighths(), Some(4_294_967_288));

        let sheet = Callsheet {
            schedule: vec![item("536870911"), item("536870911"), item("999999999")],
            ..Default::default()
        };
        assert_eq!(sheet.stats().page_eighths, u32::MAX);
        assert_eq!(total_eighths(&sheet.schedule[2..]), None);
    }

    #[test]
    fn deserializes_camel_case_with_missing_fields() {
        let sheet = Callsheet::from_json(
            r#"{"projectTitle":"Dawn","shootDate":"2025-01-02",
                "schedule":[{"sceneNumber":"4A","intExt":"INT/EXT","pageCount":"1 2/8"}],
                "cast":[{"name":"Ava","role":"Lead","phone":"555","character":"Mara"}]}"#,
        )
        .unwrap();
        assert_eq!(sheet.schedule[0].int_ext, IntExt::IntExt);
        assert_eq!(sheet.cast[0].character.as_deref(), Some("Mara"));
        assert!(sheet.crew.is_empty());
        assert_eq!(sheet.stats().page_eighths, 10);
    }

    #[test]
    fn stats_count_by_collection_only() {
        // A crew member with a character name is still crew.
        let sheet = Callsheet {
            crew: vec![Contact {
                name: "Sam".into(),
                character: Some("Extra".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let stats = sheet.stats();
        assert_eq!(stats.cast, 0);
        assert_eq!(stats.crew, 1);
    }
}
