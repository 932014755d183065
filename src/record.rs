//! The record threaded through every pipeline stage.
use crate::documents::{DocumentInput, DocumentKind};
use crate::error::StageError;
use serde::Serialize;
use std::path::PathBuf;

/// Evolving state for one document run: input, draft, validated text, artifact.
///
/// Once `error` is set the record is frozen; stages executed through
/// [`crate::pipeline::step`] pass it through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub kind: DocumentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<DocumentInput>,
    pub draft: String,
    pub validated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl Record {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            input: None,
            draft: String::new(),
            validated: String::new(),
            artifact: None,
            error: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&StageError> {
        self.error.as_ref()
    }

    /// Surface the first unrecovered error, or hand back the finished record.
    pub fn into_result(self) -> Result<Record, StageError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}
