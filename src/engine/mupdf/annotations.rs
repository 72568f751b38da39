//! Native PDF annotation extraction
//!
//! Reads `/Annots` straight from the page dictionaries: the binding does not
//! expose annotation enumeration, but the object model is enough to recover
//! type, comment, author, color and geometry.

use chrono::{FixedOffset, NaiveDate, TimeZone};
use mupdf::pdf::{PdfDocument, PdfObject};

use crate::engine::{Annotation, AnnotationKind, EngineResult, NormalizedRect, PageSize};

/// Guard against cyclic or absurdly deep page trees
const MAX_TREE_DEPTH: usize = 64;

/// Extra page-tree nodes visited beyond the page count before giving up
const NODE_ALLOWANCE: usize = 256;

/// Annotations of one page, or of every page when `page_index` is `None`
pub fn extract(
    pdf: &PdfDocument,
    page_sizes: &[PageSize],
    page_index: Option<usize>,
) -> EngineResult<Vec<Annotation>> {
    let pages = page_objects(pdf, page_sizes.len())?;
    let mut annotations = Vec::new();

    for (index, page) in pages.iter().enumerate() {
        if page_index.is_some_and(|wanted| wanted != index) {
            continue;
        }
        let Some(size) = page_sizes.get(index).copied() else {
            break;
        };

        let Some(annots) = page.get_dict("Annots")? else {
            continue;
        };

        let count = annots.len().unwrap_or(0);
        for i in 0..count {
            if let Ok(Some(annot)) = annots.get_array(i as i32) {
                if let Some(annotation) = read_annotation(&annot, index, size)? {
                    annotations.push(annotation);
                }
            }
        }
    }

    Ok(annotations)
}

/// Leaf page dictionaries in document order, at most `page_count` of them.
///
/// Kids arrays may share nodes, so the walk also stops after a fixed number
/// of visited nodes rather than trusting the tree's shape.
fn page_objects(pdf: &PdfDocument, page_count: usize) -> EngineResult<Vec<PdfObject>> {
    let trailer = pdf.trailer()?;
    let Some(root) = trailer.get_dict("Root")? else {
        return Ok(Vec::new());
    };
    let Some(pages) = root.get_dict("Pages")? else {
        return Ok(Vec::new());
    };

    let mut walk = PageWalk {
        wanted: page_count,
        budget: page_count.saturating_mul(4).saturating_add(NODE_ALLOWANCE),
        out: Vec::with_capacity(page_count),
    };
    walk.visit(pages, 0)?;
    Ok(walk.out)
}

struct PageWalk {
    wanted: usize,
    budget: usize,
    out: Vec<PdfObject>,
}

impl PageWalk {
    fn done(&self) -> bool {
        self.out.len() >= self.wanted || self.budget == 0
    }

    fn visit(&mut self, node: PdfObject, depth: usize) -> EngineResult<()> {
        if depth > MAX_TREE_DEPTH || self.done() {
            return Ok(());
        }
        self.budget -= 1;

        let is_page = name_of(&node, "Type").as_deref() == Some("Page");
        let kids = if is_page { None } else { node.get_dict("Kids")? };

        match kids {
            Some(kids) => {
                let count = kids.len().unwrap_or(0);
                for i in 0..count {
                    if self.done() {
                        break;
                    }
                    if let Ok(Some(kid)) = kids.get_array(i as i32) {
                        self.visit(kid, depth + 1)?;
                    }
                }
            }
            None => self.out.push(node),
        }

        Ok(())
    }
}

fn read_annotation(
    annot: &PdfObject,
    page_index: usize,
    size: PageSize,
) -> EngineResult<Option<Annotation>> {
    let Some(subtype) = name_of(annot, "Subtype") else {
        return Ok(None);
    };
    let Some(kind) = AnnotationKind::from_subtype(&subtype) else {
        return Ok(None);
    };

    let rect = numbers(annot, "Rect")?;
    let rect = if rect.len() >= 4 {
        normalize_rect([rect[0], rect[1], rect[2], rect[3]], size)
    } else {
        NormalizedRect {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    };

    Ok(Some(Annotation {
        kind,
        subtype,
        page_index,
        comment: string_of(annot, "Contents"),
        author: string_of(annot, "T"),
        color: color_to_hex(&numbers(annot, "C")?),
        rect,
        quads: quads_from_points(&numbers(annot, "QuadPoints")?, size),
        modified_date: string_of(annot, "M").map(|raw| parse_pdf_date(&raw).unwrap_or(raw)),
    }))
}

fn name_of(obj: &PdfObject, key: &str) -> Option<String> {
    let value = obj.get_dict(key).ok()??;
    let name = value.as_name().ok()?;
    Some(String::from_utf8_lossy(name).into_owned())
}

fn string_of(obj: &PdfObject, key: &str) -> Option<String> {
    let value = obj.get_dict(key).ok()??;
    let text = value.as_string().ok()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn numbers(obj: &PdfObject, key: &str) -> EngineResult<Vec<f32>> {
    let Some(array) = obj.get_dict(key)? else {
        return Ok(Vec::new());
    };

    // non-arrays report a length of zero
    let count = array.len().unwrap_or(0);
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        if let Ok(Some(item)) = array.get_array(i as i32) {
            values.push(item.as_float().unwrap_or(0.0));
        }
    }
    Ok(values)
}

/// Convert a PDF rectangle (bottom-left origin, any corner order) into a
/// top-left normalized rectangle
pub fn normalize_rect(coords: [f32; 4], size: PageSize) -> NormalizedRect {
    if size.width <= 0.0 || size.height <= 0.0 {
        return NormalizedRect {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        };
    }

    let [x0, y0, x1, y1] = coords;
    let left = x0.min(x1);
    let right = x0.max(x1);
    let bottom = y0.min(y1);
    let top = y0.max(y1);

    let x = (left / size.width).clamp(0.0, 1.0);
    let y = ((size.height - top) / size.height).clamp(0.0, 1.0);
    let width = ((right - left) / size.width).clamp(0.0, 1.0 - x);
    let height = ((top - bottom) / size.height).clamp(0.0, 1.0 - y);

    NormalizedRect {
        x,
        y,
        width,
        height,
    }
}

/// Bounding box of each 8-number quad in a `/QuadPoints` array
pub fn quads_from_points(points: &[f32], size: PageSize) -> Vec<NormalizedRect> {
    points
        .chunks_exact(8)
        .map(|quad| {
            let xs = [quad[0], quad[2], quad[4], quad[6]];
            let ys = [quad[1], quad[3], quad[5], quad[7]];
            let min = |v: [f32; 4]| v.into_iter().fold(f32::MAX, f32::min);
            let max = |v: [f32; 4]| v.into_iter().fold(f32::MIN, f32::max);
            normalize_rect([min(xs), min(ys), max(xs), max(ys)], size)
        })
        .collect()
}

/// `/C` components (grey, RGB or CMYK, each `0..=1`) as `#RRGGBB`
pub fn color_to_hex(components: &[f32]) -> Option<String> {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

    let (r, g, b) = match components {
        [grey] => (*grey, *grey, *grey),
        [r, g, b] => (*r, *g, *b),
        [c, m, y, k] => (
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        ),
        _ => return None,
    };

    Some(format!("#{:02X}{:02X}{:02X}", channel(r), channel(g), channel(b)))
}

/// Parse a PDF date (`D:YYYYMMDDHHmmSSOHH'mm'`) into RFC 3339.
///
/// Every component after the year is optional; a missing offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix("D:").unwrap_or(trimmed);

    let digits: String = body.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, default: u32| -> u32 {
        digits
            .get(start..start + 2)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };

    let year: i32 = digits[..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 1), field(6, 1))?;
    let naive = date.and_hms_opt(field(8, 0), field(10, 0), field(12, 0))?;

    let offset = FixedOffset::east_opt(parse_offset(&body[digits.len()..]))?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.to_rfc3339())
}

/// Seconds east of UTC for a PDF offset suffix (`Z`, `+05'30'`, `-08`)
fn parse_offset(suffix: &str) -> i32 {
    let mut chars = suffix.chars();
    let sign = match chars.next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return 0,
    };

    let digits: Vec<u32> = chars.filter_map(|c| c.to_digit(10)).collect();
    let pair = |i: usize| -> i32 {
        match (digits.get(i), digits.get(i + 1)) {
            (Some(a), Some(b)) => (a * 10 + b) as i32,
            _ => 0,
        }
    };

    sign * (pair(0) * 3600 + pair(2) * 60)
}
