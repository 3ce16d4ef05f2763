//! Integration tests for the callsheet rendering core.
//!
//! These tests validate:
//! - Customization merging, precedence and corner-radius sanitation
//! - Validation before any drawing work
//! - Section visibility and empty-text omission across backends
//! - Pagination without dropped or duplicated rows
//! - Filename derivation
//! - End-to-end rendering and determinism

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callsheet_forge::customization::{ContactLayout, SectionKey, DEFAULT_CORNER_RADIUS};
use callsheet_forge::draw::{draw_document, RecordingSurface};
use callsheet_forge::fonts::FontManager;
use callsheet_forge::html::{render_html, HtmlOptions};
use callsheet_forge::layout_config::LayoutConfig;
use callsheet_forge::merge::{merge_customization, merge_onto, StaticSettings};
use callsheet_forge::samples::{sample_callsheet, sample_with_crew};
use callsheet_forge::sections::{plan_document, SectionBlock};
use callsheet_forge::themes::ThemeName;
use callsheet_forge::tree::{layout_document, render_tree, CONTACT_ROW, SCHEDULE_ROW};
use callsheet_forge::{
    derive_filename, Backend, Callsheet, CallsheetError, CustomizationMerger, PdfCustomization, RenderSession,
};

// =====================================================================
// Helper
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn layout(sheet: &Callsheet, c: &PdfCustomization) -> LayoutConfig {
    layout_document(sheet, c, &FontManager::default()).unwrap()
}

fn minimal() -> PdfCustomization {
    merge_customization(None, &json!({ "theme": "minimal" })).unwrap()
}

fn digest(config: &LayoutConfig) -> String {
    let json = config.to_json().unwrap();
    Sha256::digest(json.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// =====================================================================
// Merging
// =====================================================================

#[test]
fn merge_with_empty_override_is_identity() {
    let mut full = PdfCustomization::default();
    full.apply_theme(ThemeName::Dark);
    full.branding.company_name = "Northlight Pictures".into();
    full.sections.formatting.contact_layout = ContactLayout::Compact;

    assert_eq!(merge_onto(&full, None, &json!({})).unwrap(), full);
}

#[test]
fn override_leaves_win_over_master() {
    let master = json!({
        "colors": { "primary": "#111111", "accent": "#222222" },
        "branding": { "companyName": "Master Co" },
    });
    let requested = json!({
        "colors": { "primary": "#abcdef" },
        "branding": { "companyName": "Override Co" },
    });
    let merger = CustomizationMerger::with_master(StaticSettings(master));
    let merged = merger.merge(&requested).unwrap();

    assert_eq!(merged.colors.primary, "#abcdef");
    assert_eq!(merged.branding.company_name, "Override Co");
    // Untouched master leaves survive.
    assert_eq!(merged.colors.accent, "#222222");
}

#[test]
fn corner_radius_is_sanitized() {
    let radius = |requested: Value| merge_customization(None, &requested).unwrap().visual.corner_radius;

    // Field absent from the override entirely keeps the default.
    assert_eq!(radius(json!({ "visual": {} })), DEFAULT_CORNER_RADIUS);
    for bad in [json!(null), json!("abc"), Value::from(f64::NAN), json!(-5)] {
        assert_eq!(radius(json!({ "visual": { "cornerRadius": bad } })), DEFAULT_CORNER_RADIUS, "{bad}");
    }
    for good in [0.0_f32, 2.0, 16.0, 120.5] {
        assert_eq!(radius(json!({ "visual": { "cornerRadius": good } })), good);
    }
}

#[test]
fn typed_customization_is_sanitized_by_renderers() {
    let mut c = PdfCustomization::default();
    c.visual.corner_radius = f32::NAN;
    let bytes = RenderSession::new().render(Backend::Direct, &sample_callsheet(), &c).unwrap();
    assert_valid_pdf(&bytes);
}

// =====================================================================
// Validation
// =====================================================================

#[test]
fn missing_required_fields_fail_before_drawing() {
    for field in ["projectTitle", "shootDate"] {
        let mut sheet = sample_callsheet();
        match field {
            "projectTitle" => sheet.project_title = String::new(),
            _ => sheet.shoot_date = "  ".into(),
        }

        let mut surface = RecordingSurface::new();
        let err = draw_document(&mut surface, &sheet, &PdfCustomization::default(), &FontManager::default())
            .unwrap_err();
        assert!(matches!(err, CallsheetError::Validation { field: ref f, .. } if f == field), "{err}");
        assert!(surface.ops.is_empty(), "drew {} primitives", surface.ops.len());

        for backend in Backend::ALL {
            let err = RenderSession::new()
                .render(backend, &sheet, &PdfCustomization::default())
                .unwrap_err();
            assert!(matches!(err, CallsheetError::Validation { .. }), "{backend}: {err}");
        }
    }
}

#[test]
fn backend_entry_points_validate_on_their_own() {
    let mut sheet = sample_callsheet();
    sheet.project_title = String::new();
    sheet.shoot_date = String::new();
    let c = PdfCustomization::default();
    let fonts = FontManager::default();

    let is_validation = |r: callsheet_forge::Result<Vec<u8>>| matches!(r, Err(CallsheetError::Validation { .. }));
    assert!(is_validation(render_tree(&sheet, &c, &fonts)));
    assert!(matches!(layout_document(&sheet, &c, &fonts), Err(CallsheetError::Validation { .. })));

    let live = Arc::new(AtomicUsize::new(0));
    assert!(is_validation(render_html(&sheet, &c, &fonts, &HtmlOptions::default(), &live)));
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

// =====================================================================
// Content policy
// =====================================================================

#[test]
fn blank_email_lines_are_omitted() {
    let mut sheet = sample_callsheet();
    for contact in sheet
        .cast
        .iter_mut()
        .chain(sheet.crew.iter_mut())
        .chain(sheet.emergency_contacts.iter_mut())
    {
        contact.email = Some("   ".into());
    }
    sheet.cast[1].email = Some(String::new());
    let c = PdfCustomization::default();
    assert!(!layout(&sheet, &c).all_text().contains('@'));

    sheet.cast[0].email = Some("lead@example.com".into());
    let text = layout(&sheet, &c).all_text();
    assert_eq!(text.matches('@').count(), 1);
    assert_eq!(text.matches("lead@example.com").count(), 1);
}

#[test]
fn schedule_visibility_toggles_the_section() {
    let sheet = sample_callsheet();
    let mut c = PdfCustomization::default();
    c.sections.visibility.schedule = false;

    assert!(plan_document(&sheet, &c).find(SectionKey::Schedule).is_none());
    let hidden = layout(&sheet, &c);
    assert_eq!(hidden.count_labels(SCHEDULE_ROW).iter().sum::<usize>(), 0);
    assert!(!hidden.all_text().contains("Shooting Schedule"));

    c.sections.visibility.schedule = true;
    match plan_document(&sheet, &c).find(SectionKey::Schedule) {
        Some(SectionBlock::Schedule(block)) => assert_eq!(block.rows.len(), sheet.schedule.len()),
        other => panic!("expected a schedule section, got {other:?}"),
    }
    assert_eq!(
        layout(&sheet, &c).count_labels(SCHEDULE_ROW).iter().sum::<usize>(),
        sheet.schedule.len()
    );
}

// =====================================================================
// Pagination
// =====================================================================

#[test]
fn overflowing_contacts_are_each_emitted_once() {
    let sheet = sample_with_crew(80);
    let total = sheet.cast.len() + sheet.crew.len() + sheet.emergency_contacts.len();

    let config = layout(&sheet, &PdfCustomization::default());
    assert!(config.pages.len() > 1, "expected overflow, got {} page(s)", config.pages.len());
    assert_eq!(config.count_labels(CONTACT_ROW).iter().sum::<usize>(), total);

    let mut surface = RecordingSurface::new();
    let summary = draw_document(&mut surface, &sheet, &PdfCustomization::default(), &FontManager::default()).unwrap();
    assert!(summary.pages > 1);
    let drawn: usize = [SectionKey::Cast, SectionKey::Crew, SectionKey::Emergency]
        .into_iter()
        .map(|k| summary.rows_for(k))
        .sum();
    assert_eq!(drawn, total);
}

#[test]
fn oversized_page_counts_render() {
    let mut sheet = sample_callsheet();
    sheet.schedule[0].page_count = "999999999".into();
    sheet.schedule[1].page_count = "536870911 7/8".into();
    assert_eq!(sheet.schedule[0].page_eighths(), None);

    let stats = sheet.stats();
    assert_eq!(stats.scenes, sheet.schedule.len());
    for backend in Backend::ALL {
        let bytes = RenderSession::new()
            .render(backend, &sheet, &PdfCustomization::default())
            .unwrap();
        assert_valid_pdf(&bytes);
    }
}

// =====================================================================
// Filenames
// =====================================================================

#[test]
fn filename_derivation() {
    assert_eq!(derive_filename("Midnight in Paris!"), "midnight_in_paris__callsheet.pdf");
    assert_eq!(derive_filename("ABC 123"), "abc_123_callsheet.pdf");
}

// =====================================================================
// End to end
// =====================================================================

#[test]
fn minimal_theme_renders_on_every_backend() {
    let sheet = sample_callsheet();
    let c = minimal();
    let mut session = RenderSession::new();
    for backend in Backend::ALL {
        let bytes = session.render(backend, &sheet, &c).unwrap();
        assert_valid_pdf(&bytes);
    }
    assert_eq!(session.live_documents(), 0);
}

#[test]
fn rendering_is_deterministic() {
    let sheet = sample_callsheet();
    let c = minimal();

    let first = layout(&sheet, &c);
    let second = layout(&sheet, &c);
    assert_eq!(digest(&first), digest(&second));

    let mut session = RenderSession::new();
    for backend in Backend::ALL {
        let a = session.render(backend, &sheet, &c).unwrap();
        let b = session.render(backend, &sheet, &c).unwrap();
        assert!(a == b, "{backend}: repeated renders differ");
        // A fresh session must not change the output either.
        assert!(RenderSession::new().render(backend, &sheet, &c).unwrap() == a, "{backend}");
    }
}

#[test]
fn override_render_applies_theme() {
    let bytes = RenderSession::new()
        .render_with_override(
            Backend::Tree,
            &sample_callsheet(),
            &CustomizationMerger::new(),
            &json!({ "theme": "creative", "visual": { "cornerRadius": "abc" } }),
        )
        .unwrap();
    assert_valid_pdf(&bytes);
}

#[test]
fn callsheet_json_round_trip() {
    let sheet = sample_callsheet();
    let json = serde_json::to_string(&sheet).unwrap();
    assert!(json.contains("\"projectTitle\""));
    assert_eq!(Callsheet::from_json(&json).unwrap(), sheet);
}
