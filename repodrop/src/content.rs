//! Content classification for submitted payloads.
//!
//! A submission declares a content type through its `Content-Type` header. That value picks the
//! file extension the payload is stored under, and decides whether the payload is opaque text or
//! structured data that must be parsed and re-serialized before it is written.

use crate::errors::{Error, Result};

/// Content type assumed when a request carries no `Content-Type` header.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Extension used for structured content types that have no entry in [`EXTENSIONS`].
pub const DEFAULT_STRUCTURED_EXTENSION: &str = "json";

/// Extension used for every other content type without an entry in [`EXTENSIONS`].
pub const DEFAULT_TEXT_EXTENSION: &str = "txt";

/// Media type → file extension table. Extend as new types need first-class extensions.
pub const EXTENSIONS: &[(&str, &str)] = &[
    ("application/json", "json"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/css", "css"),
    ("application/javascript", "js"),
    ("text/x-c++src", "cpp"),
    ("text/x-csrc", "c"),
    ("application/x-sh", "sh"),
];

/// How a payload is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// JSON-like data, parsed and re-serialized before storage.
    Structured,
    /// Anything else, stored verbatim as UTF-8 text.
    PlainText,
}

impl ContentKind {
    /// Classify a media type essence (lowercase, parameters stripped).
    pub fn of(essence: &str) -> Self {
        if essence == "application/json" || essence == "text/json" || essence.ends_with("+json") {
            ContentKind::Structured
        } else {
            ContentKind::PlainText
        }
    }

    fn default_extension(self) -> &'static str {
        match self {
            ContentKind::Structured => DEFAULT_STRUCTURED_EXTENSION,
            ContentKind::PlainText => DEFAULT_TEXT_EXTENSION,
        }
    }
}

/// Payload bytes ready for upload, with the extension they should be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedContent {
    pub kind: ContentKind,
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Strip parameters and whitespace from a content type and lowercase it.
///
/// `"Application/JSON; charset=utf-8"` becomes `"application/json"`.
pub fn essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Look up the table extension for a media type essence.
pub fn mapped_extension(essence: &str) -> Option<&'static str> {
    EXTENSIONS.iter().find(|(mime, _)| *mime == essence).map(|(_, ext)| *ext)
}

/// Turn raw submitted data into storable bytes according to its declared content type.
///
/// Structured payloads must parse as JSON; the parsed value is written back compactly with
/// non-ASCII characters kept as-is. Everything else is stored as the UTF-8 text it arrived as.
/// Types missing from [`EXTENSIONS`] fall back to `json` or `txt` depending on their kind.
pub fn classify(content_type: &str, raw_data: &str) -> Result<ClassifiedContent> {
    let essence = essence(content_type);
    let kind = ContentKind::of(&essence);
    let extension = mapped_extension(&essence).unwrap_or_else(|| kind.default_extension());

    let bytes = match kind {
        ContentKind::Structured => {
            let value: serde_json::Value = serde_json::from_str(raw_data).map_err(|e| {
                tracing::debug!(error = %e, "Submitted data is not valid JSON");
                Error::BadRequest {
                    message: "Invalid JSON format for 'data' field.".to_string(),
                }
            })?;
            serde_json::to_vec(&value).map_err(|e| Error::Other(e.into()))?
        }
        ContentKind::PlainText => raw_data.as_bytes().to_vec(),
    };

    Ok(ClassifiedContent { kind, bytes, extension })
}

/// Path a submission is written to inside the remote repository.
///
/// Components are joined verbatim; separators inside them are not escaped.
pub fn storage_path(project_name: &str, user_name: &str, directory: &str, extension: &str) -> String {
    format!("data/{project_name}/{user_name}/{directory}.{extension}")
}
