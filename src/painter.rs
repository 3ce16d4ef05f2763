//! printpdf drawing primitives shared by the component-tree renderer and the
//! direct-drawing backend.
//!
//! Callers work in top-left page coordinates (points); [`PageOps`] flips to
//! PDF's bottom-left origin. Curves are approximated with polygon segments.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;
use sha2::{Digest, Sha256};

use crate::error::{CallsheetError, Result};

/// RGBA colour (0.0 – 1.0).
pub type Rgba = [f32; 4];

/// Segments per quarter circle.
const ARC_SEGMENTS: usize = 6;

/// Ops for one page.
pub struct PageOps {
    ops: Vec<Op>,
    height: f32,
}

impl PageOps {
    pub fn new(page_height: f32) -> Self {
        Self {
            ops: Vec::new(),
            height: page_height,
        }
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn point(&self, x: f32, y: f32) -> LinePoint {
        LinePoint {
            p: Point {
                x: Pt(x),
                y: Pt(self.height - y),
            },
            bezier: false,
        }
    }

    pub fn fill_polygon(&mut self, points: &[(f32, f32)], color: Rgba) {
        if points.len() < 3 {
            return;
        }
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        let points = points.iter().map(|&(x, y)| self.point(x, y)).collect();
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing { points }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    pub fn stroke_path(&mut self, points: &[(f32, f32)], closed: bool, width: f32, color: Rgba) {
        if points.len() < 2 {
            return;
        }
        self.ops.push(Op::SetOutlineColor { col: rgb(color) });
        self.ops.push(Op::SetOutlineThickness { pt: Pt(width) });
        let points = points.iter().map(|&(x, y)| self.point(x, y)).collect();
        self.ops.push(Op::DrawLine {
            line: Line {
                points,
                is_closed: closed,
            },
        });
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        self.fill_polygon(&[(x, y), (x + w, y), (x + w, y + h), (x, y + h)], color);
    }

    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, color: Rgba) {
        self.fill_polygon(&rounded_rect_path(x, y, w, h, r, false), color);
    }

    /// Rounded top corners, square bottom ones (card header bands).
    pub fn fill_top_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, color: Rgba) {
        self.fill_polygon(&rounded_rect_path(x, y, w, h, r, true), color);
    }

    pub fn stroke_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, width: f32, color: Rgba) {
        self.stroke_path(&rounded_rect_path(x, y, w, h, r, false), true, width, color);
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgba) {
        self.stroke_path(&[(x1, y1), (x2, y2)], false, width, color);
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: Rgba) {
        self.fill_polygon(&circle_path(cx, cy, r), color);
    }

    /// Linear gradient emulated by solid bands, clipped to the rounded
    /// outline.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32, from: Rgba, to: Rgba, vertical: bool) {
        for (poly, color) in gradient_bands(x, y, w, h, r, from, to, vertical, 24) {
            self.fill_polygon(&poly, color);
        }
    }

    /// One line of text whose top edge sits at `y`.
    pub fn text(&mut self, x: f32, y: f32, text: &str, font: BuiltinFont, size: f32, color: Rgba) {
        if text.trim().is_empty() {
            return;
        }
        // Baseline ≈ top of line + ascender (0.75 em).
        let baseline = self.height - y - size * 0.75;
        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(x),
                y: Pt(baseline),
            },
        });
        self.ops.push(Op::SetFontSizeBuiltinFont { size: Pt(size), font });
        self.ops.push(Op::SetLineHeight { lh: Pt(size * 1.2) });
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_winlatin(text))],
            font,
        });
        self.ops.push(Op::EndTextSection);
    }

    /// Place a registered image in the box `(x, y, w, h)`.
    pub fn image(&mut self, res: &ImageResource, x: f32, y: f32, w: f32, h: f32) {
        // At dpi=72 printpdf renders 1 px = 1 pt, so scale = desired_pt / px.
        let scale_x = if res.px_width > 0 { w / res.px_width as f32 } else { 1.0 };
        let scale_y = if res.px_height > 0 { h / res.px_height as f32 } else { 1.0 };
        self.ops.push(Op::UseXobject {
            id: res.xobj_id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(self.height - y - h)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        });
    }
}

pub fn rgb(c: Rgba) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

/// Composite `color` at `alpha` over an opaque `backdrop`. PDF fills here
/// carry no alpha channel, so translucency is flattened.
pub fn blend(color: Rgba, alpha: f32, backdrop: Rgba) -> Rgba {
    let a = (color[3] * alpha).clamp(0.0, 1.0);
    [
        color[0] * a + backdrop[0] * (1.0 - a),
        color[1] * a + backdrop[1] * (1.0 - a),
        color[2] * a + backdrop[2] * (1.0 - a),
        1.0,
    ]
}

pub fn lerp(from: Rgba, to: Rgba, t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    [
        from[0] + (to[0] - from[0]) * t,
        from[1] + (to[1] - from[1]) * t,
        from[2] + (to[2] - from[2]) * t,
        from[3] + (to[3] - from[3]) * t,
    ]
}

/// Pick the builtin face for a family name.
pub fn builtin_font(family: &str, bold: bool, italic: bool) -> BuiltinFont {
    match (family.to_ascii_lowercase().as_str(), bold, italic) {
        ("times", true, true) => BuiltinFont::TimesBoldItalic,
        ("times", true, false) => BuiltinFont::TimesBold,
        ("times", false, true) => BuiltinFont::TimesItalic,
        ("times", false, false) => BuiltinFont::TimesRoman,
        ("courier", true, true) => BuiltinFont::CourierBoldOblique,
        ("courier", true, false) => BuiltinFont::CourierBold,
        ("courier", false, true) => BuiltinFont::CourierOblique,
        ("courier", false, false) => BuiltinFont::Courier,
        (_, true, true) => BuiltinFont::HelveticaBoldOblique,
        (_, true, false) => BuiltinFont::HelveticaBold,
        (_, false, true) => BuiltinFont::HelveticaOblique,
        (_, false, false) => BuiltinFont::Helvetica,
    }
}

/// Outline of a rounded rectangle, clockwise from the top-left corner.
/// The radius is clamped to half the shorter side.
pub fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, r: f32, square_bottom: bool) -> Vec<(f32, f32)> {
    let r = r.max(0.0).min(w / 2.0).min(h / 2.0);
    if r < 0.5 {
        return vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
    }
    let mut pts = Vec::with_capacity(4 * (ARC_SEGMENTS + 1));
    // (centre, start angle) per corner, angles in PDF-agnostic screen space.
    let corners = [
        (x + r, y + r, std::f32::consts::PI),
        (x + w - r, y + r, 1.5 * std::f32::consts::PI),
        (x + w - r, y + h - r, 0.0),
        (x + r, y + h - r, 0.5 * std::f32::consts::PI),
    ];
    for (i, &(cx, cy, start)) in corners.iter().enumerate() {
        if square_bottom && i >= 2 {
            pts.push(if i == 2 { (x + w, y + h) } else { (x, y + h) });
            continue;
        }
        for s in 0..=ARC_SEGMENTS {
            let a = start + s as f32 / ARC_SEGMENTS as f32 * std::f32::consts::FRAC_PI_2;
            pts.push((cx + r * a.cos(), cy + r * a.sin()));
        }
    }
    pts
}

pub fn circle_path(cx: f32, cy: f32, r: f32) -> Vec<(f32, f32)> {
    let n = ARC_SEGMENTS * 4;
    (0..n)
        .map(|i| {
            let a = i as f32 / n as f32 * std::f32::consts::TAU;
            (cx + r * a.cos(), cy + r * a.sin())
        })
        .collect()
}

/// How far a rounded edge is pulled in at distance `d` from the corner.
fn corner_inset(d: f32, r: f32) -> f32 {
    if r <= 0.0 || d >= r {
        return 0.0;
    }
    let d = d.max(0.0);
    r - (r * r - (r - d) * (r - d)).sqrt()
}

/// Solid bands approximating a linear gradient over a rounded box.
/// `vertical` bands run top to bottom; otherwise left to right.
#[allow(clippy::too_many_arguments)]
pub fn gradient_bands(
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    r: f32,
    from: Rgba,
    to: Rgba,
    vertical: bool,
    steps: usize,
) -> Vec<(Vec<(f32, f32)>, Rgba)> {
    let r = r.max(0.0).min(w / 2.0).min(h / 2.0);
    let steps = steps.max(1);
    let edge = |pos: f32, len: f32| corner_inset(pos.min(len - pos), r);
    (0..steps)
        .map(|i| {
            let t0 = i as f32 / steps as f32;
            let t1 = (i + 1) as f32 / steps as f32;
            let color = lerp(from, to, (t0 + t1) / 2.0);
            let poly = if vertical {
                let (y0, y1) = (y + h * t0, y + h * t1);
                let (i0, i1) = (edge(h * t0, h), edge(h * t1, h));
                vec![(x + i0, y0), (x + w - i0, y0), (x + w - i1, y1), (x + i1, y1)]
            } else {
                let (x0, x1) = (x + w * t0, x + w * t1);
                let (i0, i1) = (edge(w * t0, w), edge(w * t1, w));
                vec![(x0, y + i0), (x1, y + i1), (x1, y + h - i1), (x0, y + h - i0)]
            };
            (poly, color)
        })
        .collect()
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
pub fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0xFF; printpdf passes these
    // bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

/// Decode a `data:<mime>;base64,<data>` URI.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, &'static str> {
    let rest = src
        .strip_prefix("data:")
        .ok_or("image source is not a data URI")?;
    let (header, data) = rest.split_once(',').ok_or("data URI has no `,` separator")?;
    if !header.contains(";base64") {
        return Err("only base64 data URIs are supported");
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|_| "data URI payload is not valid base64")
}

/// Serialize `doc` with a trailer `/ID` derived from the document body.
///
/// printpdf fills the trailer ids from a process-wide counter, so two saves
/// of the same document would otherwise differ.
pub fn save_document(doc: &PdfDocument) -> Result<Vec<u8>> {
    let mut bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    if bytes.is_empty() {
        return Err(CallsheetError::Rasterization("printpdf produced no bytes".into()));
    }
    stamp_trailer_id(&mut bytes);
    Ok(bytes)
}

/// Overwrite both trailer id strings in place with hex digests of the body.
/// Lengths are preserved, so the xref offsets stay valid.
fn stamp_trailer_id(bytes: &mut [u8]) {
    let Some(trailer) = rfind(bytes, b"trailer") else {
        log::warn!("saved PDF has no trailer; ids left as written");
        return;
    };
    let digest = Sha256::digest(&bytes[..trailer]);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let Some(id_at) = find(&bytes[trailer..], b"/ID").map(|i| trailer + i) else {
        return;
    };

    let mut cursor = id_at;
    for half in [&hex[..32], &hex[32..]] {
        let Some(open) = bytes[cursor..].iter().position(|&b| b == b'(').map(|i| cursor + i + 1) else {
            return;
        };
        let Some(close) = bytes[open..].iter().position(|&b| b == b')').map(|i| open + i) else {
            return;
        };
        if close - open == half.len() {
            bytes[open..close].copy_from_slice(half.as_bytes());
        }
        cursor = close + 1;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// A printpdf XObject together with the pixel dimensions of the source image.
pub struct ImageResource {
    pub xobj_id: XObjectId,
    pub px_width: u32,
    pub px_height: u32,
}

/// Add encoded PNG/JPEG bytes to `doc` as an XObject.
pub fn embed_image(doc: &mut PdfDocument, bytes: &[u8]) -> Option<ImageResource> {
    let dyn_img = match ::image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("skipping image: decode error: {e}");
            return None;
        }
    };
    let mut warnings = Vec::new();
    let raw = match RawImage::decode_from_bytes(bytes, &mut warnings) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("skipping image: PDF encode error: {e}");
            return None;
        }
    };
    // Sequential ids keep the content streams stable across renders.
    let xobj_id = XObjectId(format!("Im{}", doc.resources.xobjects.map.len()));
    doc.resources.xobjects.map.insert(xobj_id.clone(), XObject::Image(raw));
    Some(ImageResource {
        xobj_id,
        px_width: dyn_img.width(),
        px_height: dyn_img.height(),
    })
}

/// Images registered with one document, keyed by source. Sources that fail
/// to decode are skipped with a warning.
#[derive(Default)]
pub struct ImageRegistry {
    images: HashMap<String, ImageResource>,
}

impl ImageRegistry {
    pub fn register(&mut self, doc: &mut PdfDocument, src: &str) -> Option<&ImageResource> {
        if !self.images.contains_key(src) {
            let bytes = match decode_data_uri(src) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("skipping image: {e}");
                    return None;
                }
            };
            let res = embed_image(doc, &bytes)?;
            self.images.insert(src.to_string(), res);
        }
        self.images.get(src)
    }

    pub fn get(&self, src: &str) -> Option<&ImageResource> {
        self.images.get(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_page_doc() -> PdfDocument {
        let mut doc = PdfDocument::new("stable");
        let mut page = PageOps::new(100.0);
        page.fill_rect(0.0, 0.0, 50.0, 50.0, [0.2, 0.4, 0.6, 1.0]);
        doc.with_pages(vec![PdfPage::new(Mm(100.0), Mm(100.0), page.into_ops())]);
        doc
    }

    #[test]
    fn saving_twice_gives_identical_bytes() {
        let doc = one_page_doc();
        let first = save_document(&doc).unwrap();
        let second = save_document(&doc).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, save_document(&one_page_doc()).unwrap());
    }

    #[test]
    fn trailer_ids_are_body_digests() {
        let body = b"%PDF-1.3\n1 0 obj\n<<>>\nendobj\n".to_vec();
        let mut bytes = body.clone();
        bytes.extend_from_slice(b"trailer\n<</Root 1 0 R/ID[(");
        bytes.extend_from_slice(&[b'A'; 32]);
        bytes.extend_from_slice(b")(");
        bytes.extend_from_slice(&[b'B'; 32]);
        bytes.extend_from_slice(b")]/Size 2>>\nstartxref\n0\n%%EOF");
        let len = bytes.len();

        stamp_trailer_id(&mut bytes);
        let hex: String = Sha256::digest(&body).iter().map(|b| format!("{b:02x}")).collect();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.len(), len);
        assert!(text.contains(&format!("/ID[({})({})]", &hex[..32], &hex[32..])), "{text}");
    }

    #[test]
    fn zero_radius_is_a_plain_rectangle() {
        assert_eq!(rounded_rect_path(0.0, 0.0, 10.0, 5.0, 0.0, false).len(), 4);
    }

    #[test]
    fn rounded_path_stays_inside_its_box() {
        let pts = rounded_rect_path(10.0, 20.0, 100.0, 40.0, 8.0, false);
        assert!(pts.len() > 4);
        for (x, y) in pts {
            assert!((10.0 - 1e-3..=110.0 + 1e-3).contains(&x));
            assert!((20.0 - 1e-3..=60.0 + 1e-3).contains(&y));
        }
    }

    #[test]
    fn square_bottom_keeps_bottom_corners() {
        let pts = rounded_rect_path(0.0, 0.0, 100.0, 40.0, 8.0, true);
        assert!(pts.contains(&(100.0, 40.0)));
        assert!(pts.contains(&(0.0, 40.0)));
    }

    #[test]
    fn radius_is_clamped_to_half_the_short_side() {
        let pts = rounded_rect_path(0.0, 0.0, 100.0, 10.0, 50.0, false);
        let max_y = pts.iter().map(|p| p.1).fold(f32::MIN, f32::max);
        assert!(max_y <= 10.0 + 1e-3);
    }

    #[test]
    fn gradient_bands_cover_both_ends() {
        let bands = gradient_bands(0.0, 0.0, 100.0, 20.0, 0.0, [0.0; 4], [1.0; 4], false, 10);
        assert_eq!(bands.len(), 10);
        assert!(bands[0].1[0] < 0.1);
        assert!(bands[9].1[0] > 0.9);
    }

    #[test]
    fn blend_flattens_alpha() {
        let c = blend([0.0, 0.0, 0.0, 1.0], 0.25, [1.0, 1.0, 1.0, 1.0]);
        assert!((c[0] - 0.75).abs() < 1e-4);
    }

    #[test]
    fn winlatin_maps_typographic_quotes() {
        assert_eq!(to_winlatin("a\u{2019}b").as_bytes(), &[b'a', 0x92, b'b']);
    }

    #[test]
    fn data_uri_rejects_remote_urls() {
        assert!(decode_data_uri("https://example.com/logo.png").is_err());
        assert_eq!(decode_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
    }

    #[test]
    fn builtin_font_maps_families() {
        assert!(matches!(builtin_font("Times", true, false), BuiltinFont::TimesBold));
        assert!(matches!(builtin_font("Helvetica", false, false), BuiltinFont::Helvetica));
        assert!(matches!(builtin_font("courier", false, true), BuiltinFont::CourierOblique));
    }
}
