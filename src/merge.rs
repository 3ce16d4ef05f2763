//! Customization merger.
//!
//! Layers, lowest first: library default, persisted master settings (optional
//! and fallible), the theme bundle named by the override, the override itself.
//! A theme named by the master settings brings its bundle in underneath the
//! master's own leaves.
//! Merging happens on JSON values so partial inputs can be layered; the
//! result is then deserialized into the complete [`PdfCustomization`] type.

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::customization::{PdfCustomization, DEFAULT_CORNER_RADIUS};
use crate::error::{CallsheetError, Result};
use crate::themes::{theme_bundle, ThemeName};

/// Top-level sub-trees every complete configuration carries.
pub const REQUIRED_SUBTREES: [&str; 8] = [
    "layout",
    "typography",
    "colors",
    "visual",
    "branding",
    "sections",
    "theme",
    "smart",
];

/// Recursively merge `source` into `target`.
///
/// Where both sides hold a plain object at the same key the objects are
/// merged; anything else (arrays, scalars, `null`) in `source` replaces the
/// target value outright. Arrays are never concatenated.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (key, sv) in s {
                match t.get_mut(key) {
                    Some(tv) if tv.is_object() && sv.is_object() => deep_merge(tv, sv),
                    _ => {
                        t.insert(key.clone(), sv.clone());
                    }
                }
            }
        }
        (t, s) => *t = s.clone(),
    }
}

/// Force `visual.cornerRadius` to the default when it is missing, not a
/// number, `null` (how JSON carries NaN) or negative.
pub fn sanitize_corner_radius(value: &mut Value) {
    let Some(root) = value.as_object_mut() else {
        return;
    };
    let visual = root
        .entry("visual")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(visual) = visual.as_object_mut() else {
        return;
    };
    let usable = visual
        .get("cornerRadius")
        .and_then(Value::as_f64)
        .is_some_and(|r| r.is_finite() && r >= 0.0);
    if !usable {
        log::warn!(
            "visual.cornerRadius {:?} is unusable; using {}",
            visual.get("cornerRadius"),
            DEFAULT_CORNER_RADIUS
        );
        visual.insert("cornerRadius".to_string(), json!(DEFAULT_CORNER_RADIUS));
    }
}

fn to_value(c: &PdfCustomization) -> Result<Value> {
    Ok(serde_json::to_value(c)?)
}

fn from_merged(mut merged: Value) -> Result<PdfCustomization> {
    sanitize_corner_radius(&mut merged);
    serde_json::from_value::<PdfCustomization>(merged)
        .map(PdfCustomization::sanitized)
        .map_err(|e| CallsheetError::validation("customization", e.to_string()))
}

/// The theme a layer names, if any.
fn named_theme(layer: &Value) -> Result<Option<ThemeName>> {
    let Some(name) = layer.get("theme") else {
        return Ok(None);
    };
    match name.as_str().and_then(ThemeName::parse) {
        Some(theme) => Ok(Some(theme)),
        None => Err(CallsheetError::validation(
            "theme",
            format!("{name} is not a known theme"),
        )),
    }
}

/// Layer the master settings, bringing in the bundle of a theme they name
/// when it differs from the base. A master naming an unknown theme is
/// skipped like one that failed to load.
fn apply_master(merged: &mut Value, base: ThemeName, master: &Value) -> Result<()> {
    match named_theme(master) {
        Ok(Some(theme)) if theme != base => apply_bundle(merged, theme)?,
        Ok(_) => {}
        Err(e) => {
            log::warn!("skipping master settings: {e}");
            return Ok(());
        }
    }
    deep_merge(merged, master);
    Ok(())
}

/// Overwrite the theme-controlled sub-trees when the override names a theme.
fn apply_requested_theme(merged: &mut Value, requested: &Value) -> Result<()> {
    match named_theme(requested)? {
        Some(theme) => apply_bundle(merged, theme),
        None => Ok(()),
    }
}

fn apply_bundle(merged: &mut Value, theme: ThemeName) -> Result<()> {
    let bundle = theme_bundle(theme);
    if let Some(root) = merged.as_object_mut() {
        root.insert("colors".to_string(), serde_json::to_value(&bundle.colors)?);
        root.insert("typography".to_string(), serde_json::to_value(&bundle.typography)?);
        root.insert("visual".to_string(), serde_json::to_value(&bundle.visual)?);
        root.insert("theme".to_string(), json!(theme.as_str()));
    }
    log::debug!("applied theme {}", theme.as_str());
    Ok(())
}

/// Merge `base ← master ← theme ← requested` into a complete configuration.
pub fn merge_onto(
    base: &PdfCustomization,
    master: Option<&Value>,
    requested: &Value,
) -> Result<PdfCustomization> {
    let mut merged = to_value(base)?;
    if let Some(master) = master {
        apply_master(&mut merged, base.theme, master)?;
    }
    apply_requested_theme(&mut merged, requested)?;
    deep_merge(&mut merged, requested);
    from_merged(merged)
}

/// Merge onto the library default.
pub fn merge_customization(master: Option<&Value>, requested: &Value) -> Result<PdfCustomization> {
    merge_onto(&PdfCustomization::default(), master, requested)
}

/// Accept a configuration handed over as raw JSON without merging.
///
/// Every sub-tree must be present; a missing one is reported by name rather
/// than surfacing later as a deserialization failure.
pub fn require_complete(value: &Value) -> Result<PdfCustomization> {
    let Some(root) = value.as_object() else {
        return Err(CallsheetError::validation("customization", "expected a JSON object"));
    };
    for key in REQUIRED_SUBTREES {
        match root.get(key) {
            None | Some(Value::Null) => {
                return Err(CallsheetError::validation(key, "sub-tree is missing"))
            }
            Some(v) if key != "theme" && !v.is_object() => {
                return Err(CallsheetError::validation(key, "sub-tree must be an object"))
            }
            Some(_) => {}
        }
    }
    from_merged(value.clone())
}

// ---------------------------------------------------------------------------
// Master settings
// ---------------------------------------------------------------------------

/// Where the persisted "master" layer comes from.
pub trait MasterSettingsSource {
    /// `Ok(None)` means there are no master settings.
    fn load(&self) -> Result<Option<Value>>;
}

/// No master layer.
pub struct NoMasterSettings;

impl MasterSettingsSource for NoMasterSettings {
    fn load(&self) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Master settings held in memory.
pub struct StaticSettings(pub Value);

impl MasterSettingsSource for StaticSettings {
    fn load(&self) -> Result<Option<Value>> {
        Ok(Some(self.0.clone()))
    }
}

/// Master settings stored as a JSON file.
pub struct JsonFileSettings {
    pub path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MasterSettingsSource for JsonFileSettings {
    fn load(&self) -> Result<Option<Value>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            CallsheetError::Config(format!("reading {}: {e}", self.path.display()))
        })?;
        let value: Value = serde_json::from_str(&raw)?;
        if !value.is_object() {
            return Err(CallsheetError::Config(format!(
                "{} does not hold a JSON object",
                self.path.display()
            )));
        }
        Ok(Some(value))
    }
}

impl<F> MasterSettingsSource for F
where
    F: Fn() -> Result<Option<Value>>,
{
    fn load(&self) -> Result<Option<Value>> {
        self()
    }
}

/// Merger bound to a master-settings source.
pub struct CustomizationMerger<S> {
    base: PdfCustomization,
    master: S,
}

impl CustomizationMerger<NoMasterSettings> {
    pub fn new() -> Self {
        Self::with_master(NoMasterSettings)
    }
}

impl Default for CustomizationMerger<NoMasterSettings> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MasterSettingsSource> CustomizationMerger<S> {
    pub fn with_master(master: S) -> Self {
        Self {
            base: PdfCustomization::default(),
            master,
        }
    }

    /// Produce the final configuration for one render request.
    ///
    /// A failing master source is logged and skipped.
    pub fn merge(&self, requested: &Value) -> Result<PdfCustomization> {
        let master = match self.master.load() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("master settings unavailable, continuing with defaults: {e}");
                None
            }
        };
        merge_onto(&self.base, master.as_ref(), requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_override_is_identity() {
        let mut full = PdfCustomization::default();
        full.apply_theme(ThemeName::Creative);
        full.visual.corner_radius = 3.0;
        let merged = merge_onto(&full, None, &json!({})).unwrap();
        assert_eq!(merged, full);
    }

    #[test]
    fn override_leaf_wins_over_master() {
        let master = json!({ "colors": { "primary": "#000000" }, "layout": { "template": "m" } });
        let requested = json!({ "colors": { "primary": "#123456" } });
        let merged = merge_customization(Some(&master), &requested).unwrap();
        assert_eq!(merged.colors.primary, "#123456");
        // Siblings from lower layers survive.
        assert_eq!(merged.layout.template, "m");
        assert_eq!(merged.colors.secondary, PdfCustomization::default().colors.secondary);
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let requested = json!({ "sections": { "order": ["crew", "cast"] } });
        let merged = merge_customization(None, &requested).unwrap();
        assert_eq!(merged.sections.order, vec!["crew", "cast"]);
    }

    #[test]
    fn corner_radius_sanitation() {
        for bad in [json!(null), json!("abc"), json!(-5), json!({})] {
            let requested = json!({ "visual": { "cornerRadius": bad } });
            let merged = merge_customization(None, &requested).unwrap();
            assert_eq!(merged.visual.corner_radius, DEFAULT_CORNER_RADIUS, "input {bad}");
        }
        // NaN cannot be represented in JSON; serde_json maps it to null.
        let nan = serde_json::Value::from(f64::NAN);
        let merged =
            merge_customization(None, &json!({ "visual": { "cornerRadius": nan } })).unwrap();
        assert_eq!(merged.visual.corner_radius, DEFAULT_CORNER_RADIUS);

        for good in [0.0, 4.0, 30.5] {
            let requested = json!({ "visual": { "cornerRadius": good } });
            let merged = merge_customization(None, &requested).unwrap();
            assert_eq!(merged.visual.corner_radius, good as f32);
        }
    }

    #[test]
    fn missing_radius_in_base_is_filled() {
        let mut v = json!({ "visual": { "cardStyle": "minimal" } });
        sanitize_corner_radius(&mut v);
        assert_eq!(v["visual"]["cornerRadius"], json!(DEFAULT_CORNER_RADIUS));
    }

    #[test]
    fn theme_overwrites_subtrees_but_override_still_wins() {
        let requested = json!({ "theme": "minimal", "colors": { "accent": "#ff0000" } });
        let merged = merge_customization(None, &requested).unwrap();
        let minimal = theme_bundle(ThemeName::Minimal);
        assert_eq!(merged.theme, ThemeName::Minimal);
        assert_eq!(merged.colors.primary, minimal.colors.primary);
        assert_eq!(merged.colors.accent, "#ff0000");
        assert_eq!(merged.visual.card_style, minimal.visual.card_style);
    }

    #[test]
    fn master_theme_brings_its_bundle() {
        let dark = theme_bundle(ThemeName::Dark);
        let merged = merge_customization(Some(&json!({ "theme": "dark" })), &json!({})).unwrap();
        assert_eq!(merged.theme, ThemeName::Dark);
        assert_eq!(merged.colors.background, dark.colors.background);
        assert_eq!(merged.visual.card_style, dark.visual.card_style);

        // The master's own leaves sit above its theme.
        let master = json!({ "theme": "dark", "colors": { "accent": "#00ff00" } });
        let merged = merge_customization(Some(&master), &json!({})).unwrap();
        assert_eq!(merged.colors.accent, "#00ff00");
        assert_eq!(merged.colors.background, dark.colors.background);

        // An override theme still replaces the master's.
        let merged = merge_customization(Some(&master), &json!({ "theme": "minimal" })).unwrap();
        assert_eq!(merged.theme, ThemeName::Minimal);
        assert_eq!(merged.colors.accent, theme_bundle(ThemeName::Minimal).colors.accent);
    }

    #[test]
    fn master_with_unknown_theme_is_skipped() {
        let master = json!({ "theme": "neon", "branding": { "companyName": "Master Co" } });
        let merged = merge_customization(Some(&master), &json!({})).unwrap();
        assert_eq!(merged, PdfCustomization::default());
    }

    #[test]
    fn unknown_theme_is_a_validation_error() {
        let err = merge_customization(None, &json!({ "theme": "neon" })).unwrap_err();
        assert!(matches!(err, CallsheetError::Validation { ref field, .. } if field == "theme"));
    }

    #[test]
    fn failing_master_source_is_skipped() {
        let failing = || -> Result<Option<Value>> { Err(CallsheetError::Config("offline".into())) };
        let merger = CustomizationMerger::with_master(failing);
        let merged = merger.merge(&json!({ "branding": { "companyName": "Acme" } })).unwrap();
        assert_eq!(merged.branding.company_name, "Acme");
    }

    #[test]
    fn missing_master_file_is_skipped() {
        let merger = CustomizationMerger::with_master(JsonFileSettings::new(
            "/nonexistent/callsheet-master.json",
        ));
        assert!(merger.merge(&json!({})).is_ok());
    }

    #[test]
    fn require_complete_names_missing_subtree() {
        let mut v = serde_json::to_value(PdfCustomization::default()).unwrap();
        v.as_object_mut().unwrap().remove("branding");
        match require_complete(&v) {
            Err(CallsheetError::Validation { field, .. }) => assert_eq!(field, "branding"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn require_complete_sanitizes_radius() {
        let mut v = serde_json::to_value(PdfCustomization::default()).unwrap();
        v["visual"]["cornerRadius"] = json!(-1);
        let c = require_complete(&v).unwrap();
        assert_eq!(c.visual.corner_radius, DEFAULT_CORNER_RADIUS);
    }
}
