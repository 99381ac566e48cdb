use std::string::FromUtf8Error;

use chrono::{DateTime, Utc};
use wasm_bindgen::JsValue;

/// A field of the parse tree that could not be turned into the typed model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value at '{path}': expected {expected}")]
pub struct ValidationError {
    /// Dotted path from the document root, with sequence indices
    /// (`TrainingCenterDatabase.Courses.Course[0].Lap[1].DistanceMeters`).
    pub path: String,
    pub expected: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
        }
    }

    /// Re-root a path that was relative to the element at `prefix`.
    pub fn under(self, prefix: &str) -> Self {
        Self {
            path: format!("{prefix}.{}", self.path),
            expected: self.expected,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TcxError {
    #[error("Malformed XML: {0}")]
    MalformedXml(#[from] quick_xml::Error),

    #[error("Malformed XML: <{0}> is never closed")]
    UnclosedElement(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No track point recorded at {0}")]
    NotFound(DateTime<Utc>),

    #[error("Course '{0}' has no track")]
    NoTrack(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialized XML is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, TcxError>;

impl From<TcxError> for JsValue {
    fn from(e: TcxError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
