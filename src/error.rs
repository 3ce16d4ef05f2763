//! Error types for the rendering core.
//!
//! Generation errors ([`CallsheetError`]) are kept apart from host errors
//! raised while saving or previewing ([`DownloadError`]) so the boundary
//! layer can tell "fix your data" from "allow popups" from "please retry".

use std::time::Duration;

/// Which pipeline stage a render error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Merge,
    Layout,
    Pagination,
    Raster,
    Encode,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Merge => "merge",
            Stage::Layout => "layout",
            Stage::Pagination => "pagination",
            Stage::Raster => "raster",
            Stage::Encode => "encode",
        };
        f.write_str(s)
    }
}

/// Coarse triage class for an error, used by the boundary layer to pick a
/// user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The callsheet or configuration is incomplete or malformed.
    FixData,
    /// A transient or internal failure; retrying may help.
    Retry,
    /// The host environment refused an action (popups, file system).
    Environment,
}

/// The unified error type returned by every render entry point.
#[derive(Debug, thiserror::Error)]
pub enum CallsheetError {
    /// A required field is missing or invalid. Raised before any drawing.
    #[error("invalid `{field}`: {message}")]
    Validation { field: String, message: String },

    /// A font source could not be decoded or registered.
    #[error("font `{family}` could not be registered: {message}")]
    Font { family: String, message: String },

    /// The backend produced no usable output.
    #[error("rasterization failed: {0}")]
    Rasterization(String),

    /// A pipeline stage failed for a reason other than bad input.
    #[error("{stage} stage failed: {message}")]
    Render { stage: Stage, message: String },

    /// The caller-level deadline elapsed before the render finished.
    #[error("render did not finish within {0:?}")]
    Timeout(Duration),

    /// Reading or parsing configuration input failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CallsheetError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CallsheetError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn render(stage: Stage, message: impl Into<String>) -> Self {
        CallsheetError::Render {
            stage,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CallsheetError::Validation { .. } | CallsheetError::Config(_) => ErrorKind::FixData,
            CallsheetError::Font { .. }
            | CallsheetError::Rasterization(_)
            | CallsheetError::Render { .. }
            | CallsheetError::Timeout(_) => ErrorKind::Retry,
        }
    }

    pub fn is_font_error(&self) -> bool {
        matches!(self, CallsheetError::Font { .. })
    }
}

impl From<serde_json::Error> for CallsheetError {
    fn from(e: serde_json::Error) -> Self {
        CallsheetError::Config(e.to_string())
    }
}

/// Errors raised by the download/preview collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The host refused to open a new viewing context.
    #[error("the viewer window was blocked; allow popups and try again")]
    PopupBlocked,

    #[error("host error: {0}")]
    Host(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::PopupBlocked => ErrorKind::Environment,
            DownloadError::Host(_) | DownloadError::Io(_) => ErrorKind::Environment,
        }
    }
}

pub type Result<T, E = CallsheetError> = std::result::Result<T, E>;
