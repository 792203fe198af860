use std::fmt::{Display, Formatter};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// An input video handed over by the caller. The pipeline never mutates it;
/// hosts open decode sessions against it.
#[derive(Debug, Clone)]
pub struct SourceMedia {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub last_modified: DateTime<Utc>,
}

impl SourceMedia {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
            last_modified: Utc::now(),
        }
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Metadata a decode session reports for its source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    // None if the container does not declare it
    pub duration: Option<Duration>,
}

impl Display for SourceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self.duration {
            Some(d) => write!(f, "{}x{}, {:.3}s", self.width, self.height, d.as_secs_f64()),
            None => write!(f, "{}x{}, duration N/A", self.width, self.height),
        }
    }
}
