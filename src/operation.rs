//! Typed operation requests
//!
//! Requests arrive as flat JSON objects whose scalar values may be strings,
//! numbers or booleans. [`Params`] normalizes every scalar to a string;
//! [`Operation::from_params`] then applies the per-operation field rules.

use std::collections::HashMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::engine::ThumbnailRequest;
use crate::error::{AppError, Result};
use crate::resolver::DocumentDescriptor;

/// Flat request parameters, all values as strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Value for `key`, treating blank strings as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| AppError::InvalidParameter(format!("`{}` is required", key)))
    }

    fn index(&self, key: &str) -> Result<Option<usize>> {
        self.get(key).map(|raw| parse_index(key, raw)).transpose()
    }

    fn number(&self, key: &str) -> Result<Option<f32>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| invalid(key, raw))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(raw) if raw.eq_ignore_ascii_case("true") || raw == "1" => Ok(true),
            Some(raw) if raw.eq_ignore_ascii_case("false") || raw == "0" => Ok(false),
            Some(raw) => Err(invalid(key, raw)),
        }
    }
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, Value>::deserialize(deserializer)?;
        let mut params = HashMap::with_capacity(raw.len());

        for (key, value) in raw {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(de::Error::custom(format!(
                        "field `{}` must be a string, number or boolean",
                        key
                    )))
                }
            };
            params.insert(key, value);
        }

        Ok(Params(params))
    }
}

fn invalid(key: &str, raw: &str) -> AppError {
    AppError::InvalidParameter(format!("`{}` has an invalid value: {:?}", key, raw))
}

/// Non-negative integer, also accepting integral floats such as `2.0`
fn parse_index(key: &str, raw: &str) -> Result<usize> {
    if let Ok(value) = raw.parse::<usize>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
            Ok(value as usize)
        }
        _ => Err(invalid(key, raw)),
    }
}

/// Serialization formats accepted by ExportAnnotations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Load,
    RenderPages,
    RenderThumbnails,
    RenderTexts,
    Bookmarks,
    AnnotationComments,
    PrintImages,
    Download,
    Unload,
    ImportAnnotations,
    ExportAnnotations,
    Status,
}

impl OperationKind {
    /// Action name as exposed over HTTP
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Load => "Load",
            OperationKind::RenderPages => "RenderPdfPages",
            OperationKind::RenderThumbnails => "RenderThumbnailImages",
            OperationKind::RenderTexts => "RenderPdfTexts",
            OperationKind::Bookmarks => "Bookmarks",
            OperationKind::AnnotationComments => "RenderAnnotationComments",
            OperationKind::PrintImages => "PrintImages",
            OperationKind::Download => "Download",
            OperationKind::Unload => "Unload",
            OperationKind::ImportAnnotations => "ImportAnnotations",
            OperationKind::ExportAnnotations => "ExportAnnotations",
            OperationKind::Status => "GetStatus",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request against the viewer. Tokens are kept raw; a token that does
/// not parse is simply a cache miss.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Load {
        descriptor: DocumentDescriptor,
    },
    RenderPages {
        token: String,
        page_index: Option<usize>,
        zoom_factor: f32,
        dpi: Option<f32>,
    },
    RenderThumbnails {
        token: String,
        request: ThumbnailRequest,
    },
    RenderTexts {
        token: String,
        page_index: Option<usize>,
    },
    Bookmarks {
        token: String,
    },
    AnnotationComments {
        token: String,
        page_index: Option<usize>,
    },
    PrintImages {
        token: String,
        page_index: Option<usize>,
    },
    Download {
        token: String,
    },
    Unload {
        token: Option<String>,
    },
    ImportAnnotations {
        file_name: String,
    },
    ExportAnnotations {
        token: String,
        format: ExportFormat,
    },
    Status,
}

/// Zoom applied when RenderPdfPages omits `zoomFactor`
pub const DEFAULT_ZOOM_FACTOR: f32 = 1.0;

impl Operation {
    pub fn from_params(kind: OperationKind, params: &Params) -> Result<Self> {
        // No token at all is reported the same way as an unknown one
        let token = || {
            params
                .get("document")
                .map(str::to_string)
                .ok_or(AppError::TokenNotFound)
        };

        let operation = match kind {
            OperationKind::Load => {
                let content = params.required("document")?.to_string();
                let descriptor = if params.flag("isFileName")? {
                    DocumentDescriptor::FileName(content)
                } else {
                    DocumentDescriptor::Inline(content)
                };
                Operation::Load { descriptor }
            }
            OperationKind::RenderPages => Operation::RenderPages {
                token: token()?,
                page_index: params.index("pageIndex")?,
                zoom_factor: params
                    .number("zoomFactor")?
                    .unwrap_or(DEFAULT_ZOOM_FACTOR),
                dpi: params.number("dpi")?,
            },
            OperationKind::RenderThumbnails => Operation::RenderThumbnails {
                token: token()?,
                request: ThumbnailRequest {
                    start_index: params.index("startIndex")?,
                    end_index: params.index("endIndex")?,
                    size: params
                        .index("thumbnailSize")?
                        .map(|size| size.min(u32::MAX as usize) as u32),
                },
            },
            OperationKind::RenderTexts => Operation::RenderTexts {
                token: token()?,
                page_index: params.index("pageIndex")?,
            },
            OperationKind::Bookmarks => Operation::Bookmarks { token: token()? },
            OperationKind::AnnotationComments => Operation::AnnotationComments {
                token: token()?,
                page_index: params.index("pageIndex")?,
            },
            OperationKind::PrintImages => Operation::PrintImages {
                token: token()?,
                page_index: params.index("pageIndex")?,
            },
            OperationKind::Download => Operation::Download { token: token()? },
            OperationKind::Unload => Operation::Unload {
                token: params.get("document").map(str::to_string),
            },
            OperationKind::ImportAnnotations => Operation::ImportAnnotations {
                file_name: params.required("fileName")?.to_string(),
            },
            OperationKind::ExportAnnotations => {
                let format = match params.get("annotationDataFormat") {
                    None => ExportFormat::Json,
                    Some(raw) if raw.eq_ignore_ascii_case("json") => ExportFormat::Json,
                    Some(raw) => {
                        return Err(AppError::InvalidParameter(format!(
                            "unsupported annotationDataFormat {:?}",
                            raw
                        )))
                    }
                };
                Operation::ExportAnnotations {
                    token: token()?,
                    format,
                }
            }
            OperationKind::Status => Operation::Status,
        };

        Ok(operation)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Load { .. } => OperationKind::Load,
            Operation::RenderPages { .. } => OperationKind::RenderPages,
            Operation::RenderThumbnails { .. } => OperationKind::RenderThumbnails,
            Operation::RenderTexts { .. } => OperationKind::RenderTexts,
            Operation::Bookmarks { .. } => OperationKind::Bookmarks,
            Operation::AnnotationComments { .. } => OperationKind::AnnotationComments,
            Operation::PrintImages { .. } => OperationKind::PrintImages,
            Operation::Download { .. } => OperationKind::Download,
            Operation::Unload { .. } => OperationKind::Unload,
            Operation::ImportAnnotations { .. } => OperationKind::ImportAnnotations,
            Operation::ExportAnnotations { .. } => OperationKind::ExportAnnotations,
            Operation::Status => OperationKind::Status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: &str) -> Params {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_scalars_are_normalized_to_strings() {
        let p = params(r#"{"a": "x", "b": 2, "c": 1.5, "d": true, "e": null}"#);
        assert_eq!(p.get("a"), Some("x"));
        assert_eq!(p.get("b"), Some("2"));
        assert_eq!(p.get("c"), Some("1.5"));
        assert_eq!(p.get("d"), Some("true"));
        assert_eq!(p.get("e"), None);
    }

    #[test]
    fn test_nested_values_are_rejected() {
        assert!(serde_json::from_str::<Params>(r#"{"a": [1, 2]}"#).is_err());
        assert!(serde_json::from_str::<Params>(r#"{"a": {"b": 1}}"#).is_err());
    }

    #[test]
    fn test_load_defaults_to_inline() {
        let op = Operation::from_params(OperationKind::Load, &params(r#"{"document": "JVBERi0="}"#))
            .unwrap();
        assert_eq!(
            op,
            Operation::Load {
                descriptor: DocumentDescriptor::Inline("JVBERi0=".into())
            }
        );
    }

    #[test]
    fn test_load_file_name_flag_accepts_string_and_bool() {
        for body in [
            r#"{"document": "a.pdf", "isFileName": true}"#,
            r#"{"document": "a.pdf", "isFileName": "True"}"#,
            r#"{"document": "a.pdf", "isFileName": "true"}"#,
        ] {
            let op = Operation::from_params(OperationKind::Load, &params(body)).unwrap();
            assert_eq!(
                op,
                Operation::Load {
                    descriptor: DocumentDescriptor::FileName("a.pdf".into())
                },
                "{}",
                body
            );
        }

        let err = Operation::from_params(
            OperationKind::Load,
            &params(r#"{"document": "a.pdf", "isFileName": "maybe"}"#),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn test_load_requires_document() {
        for body in [r#"{}"#, r#"{"document": "  "}"#] {
            let err = Operation::from_params(OperationKind::Load, &params(body)).unwrap_err();
            assert!(matches!(err, AppError::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_render_pages_defaults_zoom_to_one() {
        let without = Operation::from_params(
            OperationKind::RenderPages,
            &params(r#"{"document": "t", "pageIndex": "0"}"#),
        )
        .unwrap();
        let with = Operation::from_params(
            OperationKind::RenderPages,
            &params(r#"{"document": "t", "pageIndex": 0, "zoomFactor": "1"}"#),
        )
        .unwrap();
        assert_eq!(without, with);
    }

    #[test]
    fn test_render_pages_page_index_is_optional() {
        let op = Operation::from_params(
            OperationKind::RenderPages,
            &params(r#"{"document": "t"}"#),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::RenderPages {
                token: "t".into(),
                page_index: None,
                zoom_factor: 1.0,
                dpi: None,
            }
        );
    }

    #[test]
    fn test_numeric_fields_reject_garbage() {
        for body in [
            r#"{"document": "t", "pageIndex": "one"}"#,
            r#"{"document": "t", "pageIndex": -1}"#,
            r#"{"document": "t", "pageIndex": 1.5}"#,
            r#"{"document": "t", "pageIndex": 0, "zoomFactor": "big"}"#,
        ] {
            let err = Operation::from_params(OperationKind::RenderPages, &params(body)).unwrap_err();
            assert!(matches!(err, AppError::InvalidParameter(_)), "{}", body);
        }
    }

    #[test]
    fn test_integral_float_index_is_accepted() {
        let op = Operation::from_params(
            OperationKind::RenderTexts,
            &params(r#"{"document": "t", "pageIndex": 2.0}"#),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::RenderTexts {
                token: "t".into(),
                page_index: Some(2)
            }
        );
    }

    #[test]
    fn test_thumbnail_fields() {
        let op = Operation::from_params(
            OperationKind::RenderThumbnails,
            &params(r#"{"document": "t", "startIndex": 1, "endIndex": "3", "thumbnailSize": 120}"#),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::RenderThumbnails {
                token: "t".into(),
                request: ThumbnailRequest {
                    start_index: Some(1),
                    end_index: Some(3),
                    size: Some(120),
                },
            }
        );
    }

    #[test]
    fn test_unload_never_requires_a_token() {
        let op = Operation::from_params(OperationKind::Unload, &Params::new()).unwrap();
        assert_eq!(op, Operation::Unload { token: None });
    }

    #[test]
    fn test_token_operations_without_document_are_misses() {
        for kind in [
            OperationKind::RenderPages,
            OperationKind::Bookmarks,
            OperationKind::Download,
            OperationKind::PrintImages,
            OperationKind::RenderTexts,
            OperationKind::AnnotationComments,
            OperationKind::RenderThumbnails,
            OperationKind::ExportAnnotations,
        ] {
            let err = Operation::from_params(kind, &Params::new()).unwrap_err();
            assert!(matches!(err, AppError::TokenNotFound), "{}", kind);
        }
    }

    #[test]
    fn test_import_requires_file_name() {
        assert!(Operation::from_params(OperationKind::ImportAnnotations, &Params::new()).is_err());

        let op = Operation::from_params(
            OperationKind::ImportAnnotations,
            &Params::new().with("fileName", "notes.json"),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::ImportAnnotations {
                file_name: "notes.json".into()
            }
        );
    }

    #[test]
    fn test_export_format() {
        let base = Params::new().with("document", "t");

        let op = Operation::from_params(OperationKind::ExportAnnotations, &base).unwrap();
        assert_eq!(
            op,
            Operation::ExportAnnotations {
                token: "t".into(),
                format: ExportFormat::Json
            }
        );

        let xfdf = base.clone().with("annotationDataFormat", "xfdf");
        assert!(matches!(
            Operation::from_params(OperationKind::ExportAnnotations, &xfdf),
            Err(AppError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kind_round_trips() {
        let op = Operation::from_params(OperationKind::Status, &Params::new()).unwrap();
        assert_eq!(op.kind(), OperationKind::Status);
        assert_eq!(OperationKind::RenderPages.as_str(), "RenderPdfPages");
    }
}
