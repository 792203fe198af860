use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::source::SourceMedia;

/// The file-like result handed back to the caller.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub last_modified: DateTime<Utc>,
}

impl OutputArtifact {
    pub fn new(name: String, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name,
            mime_type: mime_type.into(),
            bytes,
            last_modified: Utc::now(),
        }
    }

    /// The unmodified input, used when every encoding tier failed.
    pub fn pass_through(source: &SourceMedia) -> Self {
        Self {
            name: source.name.clone(),
            mime_type: source.mime_type.clone(),
            bytes: source.bytes.clone(),
            last_modified: source.last_modified,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// `explicit` when given, otherwise `<base>-compressed.<extension>` where
/// `<base>` is `source_name` without its last extension.
pub fn pick_output_name(source_name: &str, extension: &str, explicit: Option<&str>) -> String {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let base = match source_name.rfind('.') {
        Some(i) if i + 1 < source_name.len() => &source_name[..i],
        _ => source_name,
    };
    format!("{}-compressed.{}", base, extension)
}
