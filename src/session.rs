//! Render sessions.
//!
//! A [`RenderSession`] owns the state that outlives a single render: font
//! registrations and the count of live HTML document contexts. Every render
//! validates its inputs first, registers fonts, dispatches to a backend and
//! retries once with the fallback family when font registration fails.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::callsheet::Callsheet;
use crate::customization::PdfCustomization;
use crate::draw::render_direct;
use crate::error::{CallsheetError, Result, Stage};
use crate::fonts::{FontManager, FontSession};
use crate::html::{render_html, HtmlOptions};
use crate::merge::{CustomizationMerger, MasterSettingsSource};
use crate::resolve::FALLBACK_FAMILY;
use crate::sections::checked_inputs;
use crate::tree::render_tree;

/// Which document renderer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Component tree laid out with taffy, paginated, drawn with printpdf.
    #[default]
    Tree,
    /// Generated markup rasterized onto a single page.
    Html,
    /// Primitives drawn at an explicit cursor.
    Direct,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Tree, Backend::Html, Backend::Direct];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Tree => "tree",
            Backend::Html => "html",
            Backend::Direct => "direct",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns a validated callsheet and a complete configuration into PDF bytes.
pub trait DocumentRenderer {
    fn render(&self, sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<Vec<u8>>;
}

pub struct TreeRenderer;

impl DocumentRenderer for TreeRenderer {
    fn render(&self, sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<Vec<u8>> {
        render_tree(sheet, c, fonts)
    }
}

pub struct HtmlRenderer {
    pub options: HtmlOptions,
    live: Arc<AtomicUsize>,
}

impl HtmlRenderer {
    pub fn new(options: HtmlOptions, live: Arc<AtomicUsize>) -> Self {
        Self { options, live }
    }
}

impl DocumentRenderer for HtmlRenderer {
    fn render(&self, sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<Vec<u8>> {
        render_html(sheet, c, fonts, &self.options, &self.live)
    }
}

pub struct DirectRenderer;

impl DocumentRenderer for DirectRenderer {
    fn render(&self, sheet: &Callsheet, c: &PdfCustomization, fonts: &FontManager) -> Result<Vec<u8>> {
        render_direct(sheet, c, fonts)
    }
}

/// Render state owned by one caller. Sessions are independent: nothing is
/// shared between two sessions.
#[derive(Default)]
pub struct RenderSession {
    fonts: FontSession,
    live_documents: Arc<AtomicUsize>,
    html: HtmlOptions,
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fonts(fonts: FontSession) -> Self {
        Self {
            fonts,
            ..Self::default()
        }
    }

    pub fn with_html_options(mut self, options: HtmlOptions) -> Self {
        self.html = options;
        self
    }

    pub fn fonts(&self) -> &FontSession {
        &self.fonts
    }

    /// HTML document contexts currently open. Zero whenever no render is in
    /// flight.
    pub fn live_documents(&self) -> usize {
        self.live_documents.load(Ordering::SeqCst)
    }

    /// Forget font registrations.
    pub fn reset(&mut self) {
        self.fonts.reset();
    }

    pub fn renderer(&self, backend: Backend) -> Box<dyn DocumentRenderer> {
        match backend {
            Backend::Tree => Box::new(TreeRenderer),
            Backend::Html => Box::new(HtmlRenderer::new(self.html.clone(), Arc::clone(&self.live_documents))),
            Backend::Direct => Box::new(DirectRenderer),
        }
    }

    pub fn render(&mut self, backend: Backend, sheet: &Callsheet, c: &PdfCustomization) -> Result<Vec<u8>> {
        let renderer = self.renderer(backend);
        log::debug!("rendering {:?} with the {backend} backend", sheet.project_title);
        self.render_with(renderer.as_ref(), sheet, c)
    }

    /// Validate, register fonts and render with `renderer`.
    ///
    /// A font error triggers exactly one more attempt with the typography
    /// forced to the fallback family; a second failure is returned.
    pub fn render_with(
        &mut self,
        renderer: &dyn DocumentRenderer,
        sheet: &Callsheet,
        c: &PdfCustomization,
    ) -> Result<Vec<u8>> {
        let c = checked_inputs(sheet, c)?;

        match self.attempt(renderer, sheet, &c) {
            Err(e) if e.is_font_error() => {
                log::warn!("{e}; retrying with the {FALLBACK_FAMILY} family");
                let mut fallback = c;
                fallback.typography.font_family = FALLBACK_FAMILY.to_string();
                fallback.typography.section_fonts.clear();
                self.attempt(renderer, sheet, &fallback)
            }
            other => other,
        }
    }

    fn attempt(&mut self, renderer: &dyn DocumentRenderer, sheet: &Callsheet, c: &PdfCustomization) -> Result<Vec<u8>> {
        self.fonts.register(&c.typography)?;
        let bytes = renderer.render(sheet, c, self.fonts.fonts())?;
        if bytes.is_empty() {
            return Err(CallsheetError::Rasterization("backend returned a zero-length document".into()));
        }
        Ok(bytes)
    }

    /// Merge `requested` through `merger`, then render.
    pub fn render_with_override<S: MasterSettingsSource>(
        &mut self,
        backend: Backend,
        sheet: &Callsheet,
        merger: &CustomizationMerger<S>,
        requested: &Value,
    ) -> Result<Vec<u8>> {
        let c = merger.merge(requested)?;
        self.render(backend, sheet, &c)
    }

    /// Render on a worker thread and give up after `timeout`.
    ///
    /// The worker gets its own session with this session's font sources and
    /// shares the live-document counter. A render that times out keeps
    /// running to completion in the background; its result is discarded.
    pub fn render_with_timeout(
        &self,
        backend: Backend,
        sheet: &Callsheet,
        c: &PdfCustomization,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let mut worker = RenderSession {
            fonts: FontSession::with_sources(self.fonts.sources().to_vec()),
            live_documents: Arc::clone(&self.live_documents),
            html: self.html.clone(),
        };
        let (sheet, c) = (sheet.clone(), c.clone());
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let started = Instant::now();
            let result = worker.render(backend, &sheet, &c);
            deliver(&tx, result, started.elapsed());
        });
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("render did not finish within {timeout:?}");
                Err(CallsheetError::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CallsheetError::render(
                Stage::Encode,
                "render worker stopped without a result",
            )),
        }
    }
}

/// Hand a worker's result back to the waiting caller. Returns `false`, with
/// a warning, when the caller already gave up on it.
fn deliver(tx: &mpsc::Sender<Result<Vec<u8>>>, result: Result<Vec<u8>>, elapsed: Duration) -> bool {
    let outcome = match &result {
        Ok(bytes) => format!("{} bytes", bytes.len()),
        Err(e) => format!("error: {e}"),
    };
    if tx.send(result).is_err() {
        log::warn!("render finished after {elapsed:?}, past its deadline; discarding the late result ({outcome})");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontSource;
    use crate::html::SettleStrategy;
    use crate::merge::StaticSettings;
    use crate::samples::sample_callsheet;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    /// Records what it was asked to render and replays a scripted outcome.
    struct SpyRenderer {
        calls: Cell<usize>,
        families: RefCell<Vec<String>>,
        fail_with_font_error: usize,
        output: Vec<u8>,
    }

    impl SpyRenderer {
        fn new(fail_with_font_error: usize, output: &[u8]) -> Self {
            Self {
                calls: Cell::new(0),
                families: RefCell::new(Vec::new()),
                fail_with_font_error,
                output: output.to_vec(),
            }
        }
    }

    impl DocumentRenderer for SpyRenderer {
        fn render(&self, _sheet: &Callsheet, c: &PdfCustomization, _fonts: &FontManager) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.families.borrow_mut().push(c.typography.font_family.clone());
            if self.calls.get() <= self.fail_with_font_error {
                return Err(CallsheetError::Font {
                    family: c.typography.font_family.clone(),
                    message: "embedding failed".into(),
                });
            }
            Ok(self.output.clone())
        }
    }

    fn broken_source(family: &str) -> FontSource {
        FontSource {
            family: family.into(),
            weight: 400,
            data: "not base64 at all!".into(),
        }
    }

    #[test]
    fn backend_names_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(Backend::parse(backend.as_str()), Some(backend));
        }
        assert_eq!(Backend::parse(" HTML "), Some(Backend::Html));
        assert_eq!(Backend::parse("canvas"), None);
    }

    #[test]
    fn validation_runs_before_the_renderer() {
        let spy = SpyRenderer::new(0, b"%PDF-");
        let mut sheet = sample_callsheet();
        sheet.shoot_date = String::new();
        let err = RenderSession::new()
            .render_with(&spy, &sheet, &PdfCustomization::default())
            .unwrap_err();
        assert!(matches!(err, CallsheetError::Validation { ref field, .. } if field == "shootDate"));
        assert_eq!(spy.calls.get(), 0);
    }

    #[test]
    fn font_failure_retries_once_with_fallback() {
        let spy = SpyRenderer::new(1, b"%PDF-1.7");
        let mut c = PdfCustomization::default();
        c.typography.font_family = "poppins".into();
        let bytes = RenderSession::new().render_with(&spy, &sample_callsheet(), &c).unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
        assert_eq!(*spy.families.borrow(), vec!["poppins".to_string(), FALLBACK_FAMILY.to_string()]);
    }

    #[test]
    fn second_font_failure_is_surfaced() {
        let spy = SpyRenderer::new(usize::MAX, b"%PDF-");
        let err = RenderSession::new()
            .render_with(&spy, &sample_callsheet(), &PdfCustomization::default())
            .unwrap_err();
        assert!(err.is_font_error());
        assert_eq!(spy.calls.get(), 2);
    }

    #[test]
    fn registration_failure_falls_back() {
        let mut c = PdfCustomization::default();
        c.typography.font_family = "brokenface".into();
        let mut session = RenderSession::with_fonts(FontSession::with_sources(vec![broken_source("brokenface")]));
        let bytes = session.render(Backend::Tree, &sample_callsheet(), &c).unwrap();
        assert!(!bytes.is_empty());
        assert!(session.fonts().is_registered(FALLBACK_FAMILY));
        assert!(!session.fonts().is_registered("brokenface"));

        session.reset();
        assert_eq!(session.fonts().registered_count(), 0);
    }

    #[test]
    fn empty_output_is_a_rasterization_error() {
        let spy = SpyRenderer::new(0, b"");
        let err = RenderSession::new()
            .render_with(&spy, &sample_callsheet(), &PdfCustomization::default())
            .unwrap_err();
        assert!(matches!(err, CallsheetError::Rasterization(_)));
    }

    #[test]
    fn html_contexts_are_released_on_both_paths() {
        let mut session = RenderSession::new();
        session
            .render(Backend::Html, &sample_callsheet(), &PdfCustomization::default())
            .unwrap();
        assert_eq!(session.live_documents(), 0);

        let mut failing = RenderSession::new().with_html_options(HtmlOptions {
            settle: SettleStrategy::Fail("no paint".into()),
            ..HtmlOptions::default()
        });
        assert!(failing
            .render(Backend::Html, &sample_callsheet(), &PdfCustomization::default())
            .is_err());
        assert_eq!(failing.live_documents(), 0);
    }

    #[test]
    fn override_is_merged_before_rendering() {
        let merger = CustomizationMerger::with_master(StaticSettings(json!({
            "visual": { "cornerRadius": -5 }
        })));
        let mut session = RenderSession::new();
        let bytes = session
            .render_with_override(Backend::Direct, &sample_callsheet(), &merger, &json!({ "theme": "minimal" }))
            .unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn slow_render_times_out() {
        let session = RenderSession::new().with_html_options(HtmlOptions {
            settle: SettleStrategy::FixedDelay(Duration::from_millis(800)),
            ..HtmlOptions::default()
        });
        let err = session
            .render_with_timeout(
                Backend::Html,
                &sample_callsheet(),
                &PdfCustomization::default(),
                Duration::from_millis(20),
            )
            .unwrap_err();
        assert!(matches!(err, CallsheetError::Timeout(_)));
    }

    #[test]
    fn fast_render_beats_the_deadline() {
        let bytes = RenderSession::new()
            .render_with_timeout(
                Backend::Tree,
                &sample_callsheet(),
                &PdfCustomization::default(),
                Duration::from_secs(60),
            )
            .unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn late_results_are_reported_as_discarded() {
        let (tx, rx) = mpsc::channel();
        assert!(deliver(&tx, Ok(vec![1, 2, 3]), Duration::from_millis(5)));
        assert_eq!(rx.recv().unwrap().unwrap(), vec![1, 2, 3]);

        drop(rx);
        assert!(!deliver(&tx, Ok(vec![1]), Duration::from_secs(2)));
        assert!(!deliver(&tx, Err(CallsheetError::Timeout(Duration::from_secs(1))), Duration::from_secs(2)));
    }
}
