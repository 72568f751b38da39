//! Engine request and result types
//!
//! Serialized field names are camelCase, matching the JSON the viewer
//! client consumes.

use serde::{Deserialize, Serialize};

/// Summary returned when a document is first loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Page sizes in points, one per page
    pub page_sizes: Vec<PageSize>,
    pub metadata: DocumentMetadata,
    pub has_text_layer: bool,
    /// Orientation of the first page
    pub orientation: PageOrientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn orientation(&self) -> PageOrientation {
        if self.width > self.height {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Page rasterization request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRenderRequest {
    /// 0-indexed; the engine renders the first page when absent
    pub page_index: Option<usize>,
    pub zoom_factor: f32,
    /// Target resolution; the engine picks its own default when absent
    pub dpi: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub page_index: usize,
    pub zoom_factor: f32,
    /// Page size in points
    pub page_width: f32,
    pub page_height: f32,
    /// Image size in pixels
    pub width: u32,
    pub height: u32,
    /// Data URL
    pub image: String,
}

/// Thumbnail range request; bounds are inclusive and 0-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThumbnailRequest {
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
    /// Longest edge in pixels
    pub size: Option<u32>,
}

/// A rendered page image (thumbnails, print images)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    /// Lines joined with `\n`
    pub text: String,
    pub lines: Vec<TextLine>,
}

/// A line of text, positioned in page points with a top-left origin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub title: String,
    /// 0-indexed target page; `None` for external or unresolved targets
    pub page_index: Option<usize>,
    pub children: Vec<Bookmark>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Underline,
    StrikeOut,
    Squiggly,
    /// Sticky note
    Text,
    FreeText,
    Ink,
    Square,
    Circle,
    Line,
    Stamp,
    Unknown,
}

impl AnnotationKind {
    /// Map a PDF `/Subtype` name. Returns `None` for subtypes that are not
    /// user comments (links, form widgets, popups).
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        let kind = match subtype {
            "Highlight" => AnnotationKind::Highlight,
            "Underline" => AnnotationKind::Underline,
            "StrikeOut" => AnnotationKind::StrikeOut,
            "Squiggly" => AnnotationKind::Squiggly,
            "Text" => AnnotationKind::Text,
            "FreeText" => AnnotationKind::FreeText,
            "Ink" => AnnotationKind::Ink,
            "Square" => AnnotationKind::Square,
            "Circle" => AnnotationKind::Circle,
            "Line" => AnnotationKind::Line,
            "Stamp" => AnnotationKind::Stamp,
            "Link" | "Widget" | "Popup" => return None,
            _ => AnnotationKind::Unknown,
        };
        Some(kind)
    }
}

/// Rectangle relative to the page, each coordinate in `0..=1`, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// Raw PDF subtype name
    pub subtype: String,
    pub page_index: usize,
    pub comment: Option<String>,
    pub author: Option<String>,
    /// `#RRGGBB`
    pub color: Option<String>,
    pub rect: NormalizedRect,
    pub quads: Vec<NormalizedRect>,
    /// RFC 3339 when the PDF date parses, raw otherwise
    pub modified_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationStats {
    pub total: usize,
    pub highlights: usize,
    pub underlines: usize,
    pub strike_outs: usize,
    pub squiggly: usize,
    pub text_notes: usize,
    pub free_text: usize,
    pub other: usize,
}

impl AnnotationStats {
    pub fn from_annotations(annotations: &[Annotation]) -> Self {
        let mut stats = AnnotationStats {
            total: annotations.len(),
            ..Default::default()
        };

        for annotation in annotations {
            match annotation.kind {
                AnnotationKind::Highlight => stats.highlights += 1,
                AnnotationKind::Underline => stats.underlines += 1,
                AnnotationKind::StrikeOut => stats.strike_outs += 1,
                AnnotationKind::Squiggly => stats.squiggly += 1,
                AnnotationKind::Text => stats.text_notes += 1,
                AnnotationKind::FreeText => stats.free_text += 1,
                _ => stats.other += 1,
            }
        }

        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSet {
    pub page_count: usize,
    pub annotations: Vec<Annotation>,
    pub stats: AnnotationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(kind: AnnotationKind) -> Annotation {
        Annotation {
            kind,
            subtype: format!("{:?}", kind),
            page_index: 0,
            comment: None,
            author: None,
            color: None,
            rect: NormalizedRect {
                x: 0.0,
                y: 0.0,
                width: 0.1,
                height: 0.1,
            },
            quads: Vec::new(),
            modified_date: None,
        }
    }

    #[test]
    fn test_subtype_mapping_skips_non_comments() {
        assert_eq!(
            AnnotationKind::from_subtype("Highlight"),
            Some(AnnotationKind::Highlight)
        );
        assert_eq!(
            AnnotationKind::from_subtype("Polygon"),
            Some(AnnotationKind::Unknown)
        );
        assert_eq!(AnnotationKind::from_subtype("Link"), None);
        assert_eq!(AnnotationKind::from_subtype("Popup"), None);
    }

    #[test]
    fn test_stats_count_by_kind() {
        let annotations = vec![
            annotation(AnnotationKind::Highlight),
            annotation(AnnotationKind::Highlight),
            annotation(AnnotationKind::Text),
            annotation(AnnotationKind::Ink),
        ];

        let stats = AnnotationStats::from_annotations(&annotations);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.highlights, 2);
        assert_eq!(stats.text_notes, 1);
        assert_eq!(stats.other, 1);
    }

    #[test]
    fn test_orientation_from_size() {
        let portrait = PageSize {
            width: 612.0,
            height: 792.0,
        };
        let landscape = PageSize {
            width: 792.0,
            height: 612.0,
        };
        assert_eq!(portrait.orientation(), PageOrientation::Portrait);
        assert_eq!(landscape.orientation(), PageOrientation::Landscape);
    }

    #[test]
    fn test_annotation_kind_serializes_as_type() {
        let json = serde_json::to_value(annotation(AnnotationKind::StrikeOut)).unwrap();
        assert_eq!(json["type"], "strikeout");
        assert_eq!(json["pageIndex"], 0);
    }
}
