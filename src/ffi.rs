//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Memory management
//! - Buffers returned by `csf_*` functions are allocated on the Rust heap.
//! - Callers **must** free them with `csf_free_buffer` / `csf_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int`: `0` success, `1` null pointer,
//!   `2` invalid UTF-8, `3` invalid callsheet or customization, `4` render
//!   failure, `5` internal panic (caught; it never unwinds into the caller).
//! - `csf_last_error` returns the message, `csf_last_error_kind` the triage
//!   class ([`CsfErrorKind`]).
//!
//! ## Thread safety
//! - The last error and the render session are thread-local, so every
//!   thread registers its own fonts and sees only its own errors.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lcallsheet_forge
//! // #include "callsheet_forge.h"
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use serde_json::Value;

use crate::callsheet::Callsheet;
use crate::download::derive_filename;
use crate::error::{CallsheetError, ErrorKind};
use crate::merge::{require_complete, CustomizationMerger};
use crate::session::{Backend, RenderSession};

/// Triage class of the last error, mirrored from [`ErrorKind`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsfErrorKind {
    None = 0,
    FixData = 1,
    Retry = 2,
    Environment = 3,
}

impl From<ErrorKind> for CsfErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::FixData => CsfErrorKind::FixData,
            ErrorKind::Retry => CsfErrorKind::Retry,
            ErrorKind::Environment => CsfErrorKind::Environment,
        }
    }
}

/// Backend selector: `0` component tree, `1` HTML/raster, `2` direct drawing.
pub const CSF_BACKEND_TREE: u32 = 0;
pub const CSF_BACKEND_HTML: u32 = 1;
pub const CSF_BACKEND_DIRECT: u32 = 2;

thread_local! {
    static LAST_ERROR: RefCell<Option<(CString, CsfErrorKind)>> = const { RefCell::new(None) };
    static SESSION: RefCell<RenderSession> = RefCell::new(RenderSession::new());
}

fn set_last_error(msg: &str, kind: CsfErrorKind) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok().map(|cs| (cs, kind));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn fail(err: &CallsheetError) -> c_int {
    set_last_error(&err.to_string(), err.kind().into());
    match err.kind() {
        ErrorKind::FixData => 3,
        _ => 4,
    }
}

/// Read a null-terminated UTF-8 string.
///
/// # Safety
/// `s` must be a valid null-terminated string.
unsafe fn read_str<'a>(s: *const c_char) -> Result<&'a str, c_int> {
    CStr::from_ptr(s).to_str().map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"), CsfErrorKind::FixData);
        2
    })
}

fn backend_from_c(backend: u32) -> Result<Backend, c_int> {
    match backend {
        CSF_BACKEND_TREE => Ok(Backend::Tree),
        CSF_BACKEND_HTML => Ok(Backend::Html),
        CSF_BACKEND_DIRECT => Ok(Backend::Direct),
        other => {
            set_last_error(&format!("Unknown backend {other}"), CsfErrorKind::FixData);
            Err(3)
        }
    }
}

/// Hand PDF bytes over to the caller.
///
/// # Safety
/// `out_buf` and `out_len` must be valid pointers.
unsafe fn write_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut u32) {
    let len = bytes.len() as u32;
    let buf = bytes.into_boxed_slice();
    *out_buf = Box::into_raw(buf) as *mut u8;
    *out_len = len;
}

/// Run a render, catching panics so they never cross the C boundary. A
/// panic leaves a fresh session behind for the next call on this thread.
///
/// # Safety
/// `out_buf` and `out_len` must be valid pointers.
unsafe fn guarded<F>(run: F, out_buf: *mut *mut u8, out_len: *mut u32) -> c_int
where
    F: FnOnce() -> Result<Vec<u8>, c_int>,
{
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(bytes)) => {
            write_buffer(bytes, out_buf, out_len);
            0
        }
        Ok(Err(code)) => code,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("render panicked: {detail}");
            set_last_error(&format!("Internal error: {detail}"), CsfErrorKind::Environment);
            SESSION.with(|s| *s.borrow_mut() = RenderSession::new());
            5
        }
    }
}

fn parse_callsheet(json: &str) -> Result<Callsheet, c_int> {
    Callsheet::from_json(json).map_err(|e| fail(&e))
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Render a callsheet to PDF.
///
/// # Parameters
/// - `callsheet_json`: null-terminated callsheet JSON
/// - `override_json`: null-terminated partial customization JSON, merged
///   over the library defaults; `NULL` renders the defaults
/// - `backend`: one of the `CSF_BACKEND_*` constants
/// - `out_buf`, `out_len`: on success, the PDF bytes
///
/// # Returns
/// `0` on success, non-zero on error. On error, call `csf_last_error`.
///
/// # Safety
/// - String arguments must be valid null-terminated strings (or `NULL` for
///   `override_json`).
/// - `out_buf` and `out_len` must be valid pointers.
/// - The caller must free `*out_buf` by calling `csf_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn csf_render_pdf(
    callsheet_json: *const c_char,
    override_json: *const c_char,
    backend: u32,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    clear_last_error();
    if callsheet_json.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument", CsfErrorKind::FixData);
        return 1;
    }

    let run = || -> Result<Vec<u8>, c_int> {
        let backend = backend_from_c(backend)?;
        let sheet = parse_callsheet(read_str(callsheet_json)?)?;
        let requested: Value = if override_json.is_null() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(read_str(override_json)?).map_err(|e| fail(&CallsheetError::from(e)))?
        };
        SESSION.with(|s| {
            s.borrow_mut()
                .render_with_override(backend, &sheet, &CustomizationMerger::new(), &requested)
                .map_err(|e| fail(&e))
        })
    };

    guarded(run, out_buf, out_len)
}

/// Render a callsheet with a complete customization, skipping the merge.
///
/// Every customization sub-tree must be present; a missing one is reported
/// by name.
///
/// # Safety
/// Same as `csf_render_pdf`; `config_json` must not be `NULL`.
#[no_mangle]
pub unsafe extern "C" fn csf_render_pdf_complete(
    callsheet_json: *const c_char,
    config_json: *const c_char,
    backend: u32,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    clear_last_error();
    if callsheet_json.is_null() || config_json.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument", CsfErrorKind::FixData);
        return 1;
    }

    let run = || -> Result<Vec<u8>, c_int> {
        let backend = backend_from_c(backend)?;
        let sheet = parse_callsheet(read_str(callsheet_json)?)?;
        let config: Value = serde_json::from_str(read_str(config_json)?).map_err(|e| fail(&CallsheetError::from(e)))?;
        let c = require_complete(&config).map_err(|e| fail(&e))?;
        SESSION.with(|s| s.borrow_mut().render(backend, &sheet, &c).map_err(|e| fail(&e)))
    };

    guarded(run, out_buf, out_len)
}

/// Derive the download filename for a project title.
///
/// Returns `NULL` on invalid input. Free the result with `csf_free_string`.
///
/// # Safety
/// `title` must be a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn csf_derive_filename(title: *const c_char) -> *mut c_char {
    clear_last_error();
    if title.is_null() {
        set_last_error("Null pointer argument", CsfErrorKind::FixData);
        return ptr::null_mut();
    }
    match read_str(title) {
        Ok(t) => CString::new(derive_filename(t)).map_or(ptr::null_mut(), CString::into_raw),
        Err(_) => ptr::null_mut(),
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a PDF buffer returned by `csf_render_pdf`.
///
/// # Safety
/// `buf` must have been returned by a previous `csf_render_pdf` (or similar)
/// call, and `len` must be the corresponding length.
#[no_mangle]
pub unsafe extern "C" fn csf_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned by `csf_derive_filename`.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn csf_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `csf_*` call on the same
/// thread. The caller should **not** free this pointer – it is managed
/// internally.
///
/// Returns null if the last call succeeded.
#[no_mangle]
pub extern "C" fn csf_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some((cs, _)) => cs.as_ptr(),
        None => ptr::null(),
    })
}

/// Triage class of the last error: `0` none, `1` fix the data, `2` retry,
/// `3` environment.
#[no_mangle]
pub extern "C" fn csf_last_error_kind() -> CsfErrorKind {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(CsfErrorKind::None, |(_, kind)| *kind))
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn csf_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customization::PdfCustomization;
    use crate::samples::sample_callsheet;

    fn sample_json() -> CString {
        CString::new(serde_json::to_string(&sample_callsheet()).unwrap()).unwrap()
    }

    fn last_error() -> String {
        unsafe { CStr::from_ptr(csf_last_error()) }.to_str().unwrap().to_string()
    }

    #[test]
    fn ffi_render_pdf() {
        let sheet = sample_json();
        let theme = CString::new(r#"{"theme":"minimal"}"#).unwrap();
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;

        for backend in [CSF_BACKEND_TREE, CSF_BACKEND_HTML, CSF_BACKEND_DIRECT] {
            let rc = unsafe { csf_render_pdf(sheet.as_ptr(), theme.as_ptr(), backend, &mut out_buf, &mut out_len) };
            assert_eq!(rc, 0, "backend {backend}");
            assert!(csf_last_error().is_null());
            let bytes = unsafe { slice::from_raw_parts(out_buf, out_len as usize) };
            assert_eq!(&bytes[0..5], b"%PDF-");
            unsafe { csf_free_buffer(out_buf, out_len) };
        }
    }

    #[test]
    fn ffi_null_input() {
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;
        let rc = unsafe { csf_render_pdf(ptr::null(), ptr::null(), 0, &mut out_buf, &mut out_len) };
        assert_eq!(rc, 1);
        assert!(out_buf.is_null());
    }

    #[test]
    fn ffi_validation_error_is_fix_data() {
        let mut sheet = sample_callsheet();
        sheet.shoot_date.clear();
        let json = CString::new(serde_json::to_string(&sheet).unwrap()).unwrap();
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;

        let rc = unsafe { csf_render_pdf(json.as_ptr(), ptr::null(), 0, &mut out_buf, &mut out_len) };
        assert_eq!(rc, 3);
        assert_eq!(csf_last_error_kind(), CsfErrorKind::FixData);
        assert!(last_error().contains("shootDate"), "{}", last_error());
    }

    #[test]
    fn ffi_unknown_backend() {
        let sheet = sample_json();
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;
        let rc = unsafe { csf_render_pdf(sheet.as_ptr(), ptr::null(), 7, &mut out_buf, &mut out_len) };
        assert_eq!(rc, 3);
        assert!(last_error().contains("backend"));
    }

    #[test]
    fn ffi_complete_config_names_missing_subtree() {
        let sheet = sample_json();
        let mut value = serde_json::to_value(PdfCustomization::default()).unwrap();
        value.as_object_mut().unwrap().remove("branding");
        let config = CString::new(value.to_string()).unwrap();
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;

        let rc = unsafe { csf_render_pdf_complete(sheet.as_ptr(), config.as_ptr(), 2, &mut out_buf, &mut out_len) };
        assert_eq!(rc, 3);
        assert!(last_error().contains("branding"));
    }

    #[test]
    fn ffi_derive_filename() {
        let title = CString::new("My Film: Part 2").unwrap();
        let name = unsafe { csf_derive_filename(title.as_ptr()) };
        assert!(!name.is_null());
        let s = unsafe { CStr::from_ptr(name) }.to_str().unwrap().to_string();
        assert_eq!(s, "my_film__part_2_callsheet.pdf");
        unsafe { csf_free_string(name) };
    }

    #[test]
    fn ffi_panic_is_caught() {
        let mut buf: *mut u8 = ptr::null_mut();
        let mut len: u32 = 0;
        let code = unsafe { guarded(|| panic!("layout exploded"), &mut buf, &mut len) };
        assert_eq!(code, 5);
        assert!(buf.is_null());
        assert_eq!(csf_last_error_kind(), CsfErrorKind::Environment);
        assert!(last_error().contains("layout exploded"), "{}", last_error());

        // The thread can still render afterwards.
        let sheet = sample_json();
        let code = unsafe { csf_render_pdf(sheet.as_ptr(), ptr::null(), CSF_BACKEND_DIRECT, &mut buf, &mut len) };
        assert_eq!(code, 0);
        unsafe { csf_free_buffer(buf, len) };
    }

    #[test]
    fn ffi_version() {
        let v = csf_version();
        let version = unsafe { CStr::from_ptr(v) }.to_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
