//! Pipeline errors
//!
//! Every failure carries a machine-readable [`ErrorCode`] and, when known, the
//! stage it happened in. The code decides the HTTP status the API answers with.

use crate::types::ProcessingStage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileTooLarge,
    InvalidFileType,
    PdfParsingFailed,
    SectionExtractionFailed,
    LlmExtractionFailed,
    ValidationFailed,
    Timeout,
    NetworkError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::InvalidFileType => "INVALID_FILE_TYPE",
            ErrorCode::PdfParsingFailed => "PDF_PARSING_FAILED",
            ErrorCode::SectionExtractionFailed => "SECTION_EXTRACTION_FAILED",
            ErrorCode::LlmExtractionFailed => "LLM_EXTRACTION_FAILED",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status code reported for this error
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::FileTooLarge | ErrorCode::InvalidFileType => 400,
            ErrorCode::PdfParsingFailed
            | ErrorCode::SectionExtractionFailed
            | ErrorCode::LlmExtractionFailed
            | ErrorCode::ValidationFailed => 422,
            ErrorCode::Timeout => 408,
            ErrorCode::NetworkError => 503,
            ErrorCode::UnknownError => 500,
        }
    }
}

/// Error raised by any pipeline stage
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{message}")]
pub struct MedskyError {
    pub message: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ProcessingStage>,
}

impl MedskyError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            stage: None,
        }
    }

    pub fn at(mut self, stage: ProcessingStage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        let json = serde_json::to_value(ErrorCode::PdfParsingFailed).unwrap();
        assert_eq!(json, "PDF_PARSING_FAILED");
        assert_eq!(ErrorCode::LlmExtractionFailed.as_str(), "LLM_EXTRACTION_FAILED");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::FileTooLarge.http_status(), 400);
        assert_eq!(ErrorCode::SectionExtractionFailed.http_status(), 422);
        assert_eq!(ErrorCode::Timeout.http_status(), 408);
        assert_eq!(ErrorCode::NetworkError.http_status(), 503);
        assert_eq!(ErrorCode::UnknownError.http_status(), 500);
    }

    #[test]
    fn test_error_carries_stage() {
        let err = MedskyError::new(ErrorCode::InvalidFileType, "bad file").at(ProcessingStage::Uploading);
        assert_eq!(err.to_string(), "bad file");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_FILE_TYPE");
        assert_eq!(json["stage"], "uploading");
    }
}
