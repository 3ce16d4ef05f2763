//! # callsheet-forge – themeable call-sheet PDF generation
//!
//! A production call sheet ([`callsheet::Callsheet`]) plus a customization
//! ([`customization::PdfCustomization`]) becomes PDF bytes through one of
//! three interchangeable backends, selected by [`session::Backend`]:
//!
//! 1. **Tree** – section blocks → styled node tree ([`tree`]) → flexbox/grid
//!    layout with Taffy ([`layout`]) → pagination ([`pagination`]) → printpdf
//!    ([`render`])
//! 2. **Html** – inline-styled markup ([`html`]) → DOM ([`dom`]) and styles
//!    ([`style`]) → layout → first-page bitmap ([`raster`]) → single-page PDF
//! 3. **Direct** – cursor-driven drawing of cards and tables ([`draw`]) on a
//!    [`draw::Surface`]
//!
//! Every backend consumes the same section plan ([`sections`]), so section
//! order, visibility and empty-content rules are decided once.
//! Customizations are layered defaults ← master ← theme ← override by
//! [`merge`]; [`session::RenderSession`] validates, registers fonts and retries
//! once with a fallback family on font errors. Finished documents are saved or
//! previewed through [`download`].
//!
//! A C-compatible FFI surface is exposed via the [`ffi`] module.

pub mod callsheet;
pub mod customization;
pub mod dom;
pub mod download;
pub mod draw;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod html;
pub mod layout;
pub mod layout_config;
pub mod merge;
pub mod painter;
pub mod pagination;
pub mod raster;
pub mod render;
pub mod resolve;
pub mod samples;
pub mod sections;
pub mod session;
pub mod style;
pub mod themes;
pub mod tree;

// Re-exports for convenience
pub use callsheet::Callsheet;
pub use customization::PdfCustomization;
pub use download::derive_filename;
pub use error::{CallsheetError, DownloadError, Result};
pub use merge::CustomizationMerger;
pub use session::{Backend, RenderSession};
