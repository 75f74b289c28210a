//! PDF → text through LlamaCloud
//!
//! Parsing is a three-step job: upload the file, poll the job until it
//! finishes, then fetch the text result. Whole attempts are retried with
//! exponential backoff; authentication failures and timeouts are not retried.

use crate::error::{ErrorCode, MedskyError};
use crate::types::ProcessingStage;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const MIN_FILE_SIZE: usize = 1024;

const LLAMA_HEALTH_URL: &str = "https://api.llamaindex.ai/health";
const MAX_RESULT_ATTEMPTS: u32 = 5;

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// PDF by MIME type or by extension
    pub fn is_pdf(&self) -> bool {
        self.content_type == "application/pdf" || self.name.to_lowercase().ends_with(".pdf")
    }
}

/// Reject files LlamaCloud should never see
pub fn validate_file(file: &UploadedFile) -> Result<(), MedskyError> {
    if !file.is_pdf() {
        return Err(MedskyError::new(
            ErrorCode::InvalidFileType,
            "Invalid file type. Only PDF files are supported.",
        )
        .at(ProcessingStage::Uploading));
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(MedskyError::new(
            ErrorCode::FileTooLarge,
            "File too large. Maximum size is 10MB.",
        )
        .at(ProcessingStage::Uploading));
    }
    if file.size() < MIN_FILE_SIZE {
        return Err(MedskyError::new(
            ErrorCode::InvalidFileType,
            "File too small. Please ensure the PDF contains content.",
        )
        .at(ProcessingStage::Uploading));
    }
    Ok(())
}

/// Turns an uploaded PDF into plain text
#[async_trait]
pub trait PdfParser: Send + Sync {
    async fn parse(&self, file: &UploadedFile) -> Result<String, MedskyError>;

    /// Reachability probe used by health checks
    async fn probe(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Stand-in used when no LlamaCloud key is configured
///
/// Uploads are already refused by the configuration check; this keeps the
/// service constructible and reports the parser as unreachable.
#[derive(Debug, Default)]
pub struct UnconfiguredParser;

#[async_trait]
impl PdfParser for UnconfiguredParser {
    async fn parse(&self, _file: &UploadedFile) -> Result<String, MedskyError> {
        Err(MedskyError::new(
            ErrorCode::PdfParsingFailed,
            "LlamaCloud API key is not configured",
        ))
    }

    async fn probe(&self) -> Result<(), String> {
        Err("LlamaCloud API key is not configured".to_string())
    }
}

// ============================================================================
// LlamaCloud client
// ============================================================================

/// Parse options and retry timings
#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub api_key: String,
    pub base_url: String,
    pub parse_mode: String,
    pub high_res_ocr: bool,
    pub adaptive_long_table: bool,
    pub outlined_table_extraction: bool,
    pub output_tables_as_html: bool,
    /// Upload request timeout
    pub timeout: Duration,
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl PdfConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            parse_mode: "parse_page_without_llm".to_string(),
            high_res_ocr: true,
            adaptive_long_table: false,
            outlined_table_extraction: true,
            output_tables_as_html: true,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 30,
        }
    }
}

#[derive(Debug, Error)]
enum LlamaError {
    #[error("upload timed out")]
    Timeout,

    #[error("authentication failed ({0})")]
    Unauthorized(u16),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Api(String),

    #[error("Result not ready yet: {0}")]
    NotReady(String),

    #[error("{0}")]
    Content(String),
}

impl LlamaError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlamaError::Timeout
        } else {
            LlamaError::Network(e.to_string())
        }
    }
}

fn check_auth(status: reqwest::StatusCode) -> Result<(), LlamaError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(LlamaError::Unauthorized(status.as_u16()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ParsedPage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of `/result/text`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ParseResult {
    #[serde(default)]
    pub pages: Option<Vec<ParsedPage>>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Concatenate non-blank page texts; fall back to the flat `text` field
pub fn extract_text(result: &ParseResult) -> Result<String, MedskyError> {
    let from_pages = result
        .pages
        .as_deref()
        .filter(|pages| !pages.is_empty())
        .map(|pages| {
            pages
                .iter()
                .filter_map(|p| p.text.as_deref())
                .filter(|t| !t.trim().is_empty())
                .collect::<String>()
        });

    let text = match from_pages {
        Some(text) => text,
        None => result
            .text
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_default(),
    };

    if text.is_empty() {
        return Err(MedskyError::new(
            ErrorCode::PdfParsingFailed,
            "No text content found in parsing result",
        )
        .at(ProcessingStage::Parsing));
    }
    Ok(text)
}

pub struct LlamaCloudClient {
    http_client: reqwest::Client,
    config: PdfConfig,
}

impl LlamaCloudClient {
    pub fn new(config: PdfConfig) -> Result<Self, MedskyError> {
        if config.api_key.trim().is_empty() {
            return Err(MedskyError::new(
                ErrorCode::UnknownError,
                "LlamaCloud API key is required",
            ));
        }
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| MedskyError::new(ErrorCode::NetworkError, e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn upload(&self, file: &UploadedFile) -> Result<String, LlamaError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str("application/pdf")
            .map_err(|e| LlamaError::Network(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("parse_mode", self.config.parse_mode.clone())
            .text("high_res_ocr", self.config.high_res_ocr.to_string())
            .text("adaptive_long_table", self.config.adaptive_long_table.to_string())
            .text(
                "outlined_table_extraction",
                self.config.outlined_table_extraction.to_string(),
            )
            .text("output_tables_as_HTML", self.config.output_tables_as_html.to_string());

        let response = self
            .http_client
            .post(self.url("/api/v1/parsing/upload"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(LlamaError::from_reqwest)?;

        let status = response.status();
        check_auth(status)?;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlamaError::Api(format!(
                "LlamaCloud upload error ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| LlamaError::Content(e.to_string()))?;
        upload
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LlamaError::Content("No job ID returned from LlamaCloud upload".to_string()))
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, LlamaError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/v1/parsing/job/{}", job_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(LlamaError::from_reqwest)?;

        let status = response.status();
        check_auth(status)?;
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlamaError::Api(format!(
                "Job status check failed ({}): {}",
                status.as_u16(),
                body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| LlamaError::Content(e.to_string()))
    }

    /// Poll until the job succeeds, then fetch its result
    async fn wait_for_result(&self, job_id: &str) -> Result<ParseResult, LlamaError> {
        let max = self.config.max_poll_attempts;
        for attempt in 1..=max {
            match self.job_status(job_id).await {
                Ok(job) if job.status == "SUCCESS" => {
                    // The result endpoint lags the status endpoint slightly
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    return self.fetch_result(job_id).await;
                }
                Ok(job) if job.status == "ERROR" => {
                    return Err(LlamaError::Api(format!(
                        "Parsing job failed: {}",
                        job.error.unwrap_or_else(|| "Unknown error".to_string())
                    )));
                }
                Ok(job) => debug!(job_id, status = %job.status, attempt, "Parsing job pending"),
                Err(e @ LlamaError::Unauthorized(_)) => return Err(e),
                Err(e) => {
                    warn!(job_id, attempt, "Job status check failed: {}", e);
                    if attempt == max {
                        return Err(e);
                    }
                }
            }
            if attempt < max {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Err(LlamaError::Api(format!(
            "Job {} did not complete within {} seconds",
            job_id,
            self.config.poll_interval.as_secs() * max as u64
        )))
    }

    /// A 404 means the result is not published yet; wait 5s, 10s, 15s, 20s
    async fn fetch_result(&self, job_id: &str) -> Result<ParseResult, LlamaError> {
        let url = self.url(&format!("/api/v1/parsing/job/{}/result/text", job_id));
        let mut last_error = None;

        for attempt in 0..MAX_RESULT_ATTEMPTS {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(LlamaError::from_reqwest)?;

            let status = response.status();
            check_auth(status)?;

            if status == reqwest::StatusCode::NOT_FOUND {
                let body = response.text().await.unwrap_or_default();
                warn!(job_id, attempt = attempt + 1, "Parse result not ready");
                last_error = Some(LlamaError::NotReady(body));
                if attempt + 1 < MAX_RESULT_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(5 * (attempt as u64 + 1))).await;
                }
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlamaError::Api(format!("API error ({}): {}", status.as_u16(), body)));
            }

            let result: ParseResult = response
                .json()
                .await
                .map_err(|e| LlamaError::Content(e.to_string()))?;
            if result.pages.is_none() && result.text.is_none() {
                return Err(LlamaError::Content("No text content in response".to_string()));
            }
            return Ok(result);
        }

        Err(last_error.unwrap_or_else(|| {
            LlamaError::Api(format!(
                "Failed to get job result after {} attempts",
                MAX_RESULT_ATTEMPTS
            ))
        }))
    }

    async fn attempt(&self, file: &UploadedFile) -> Result<String, LlamaError> {
        let job_id = self.upload(file).await?;
        info!(job_id = %job_id, "Created parsing job");

        let result = self.wait_for_result(&job_id).await?;
        let text = extract_text(&result).map_err(|e| LlamaError::Content(e.message))?;
        if text.trim().is_empty() {
            return Err(LlamaError::Content("PDF parsing resulted in empty text".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl PdfParser for LlamaCloudClient {
    async fn parse(&self, file: &UploadedFile) -> Result<String, MedskyError> {
        validate_file(file)?;

        let max = self.config.max_retries;
        let mut last_error = String::new();

        for attempt in 1..=max {
            debug!(attempt, max, file = %file.name, "PDF parsing attempt");
            match self.attempt(file).await {
                Ok(text) => {
                    info!(
                        attempt,
                        characters = text.chars().count(),
                        "PDF parsing successful"
                    );
                    return Ok(text);
                }
                Err(LlamaError::Timeout) => {
                    return Err(MedskyError::new(ErrorCode::Timeout, "PDF parsing timeout")
                        .at(ProcessingStage::Parsing));
                }
                Err(LlamaError::Unauthorized(_)) => {
                    return Err(MedskyError::new(
                        ErrorCode::NetworkError,
                        "LlamaCloud authentication failed",
                    )
                    .at(ProcessingStage::Parsing));
                }
                Err(e) => {
                    warn!(attempt, max, "PDF parsing attempt failed: {}", e);
                    last_error = e.to_string();
                    if attempt < max {
                        tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                }
            }
        }

        Err(MedskyError::new(
            ErrorCode::PdfParsingFailed,
            format!("PDF parsing failed after {} attempts: {}", max, last_error),
        )
        .at(ProcessingStage::Parsing))
    }

    async fn probe(&self) -> Result<(), String> {
        let response = self
            .http_client
            .get(LLAMA_HEALTH_URL)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", response.status().as_u16()))
        }
    }
}

// ============================================================================
// Record checks
// ============================================================================

const REQUIRED_MARKERS: [&str; 3] = ["창의적 체험활동상황", "교과학습발달상황", "세부능력 및 특기사항"];
const OPTIONAL_MARKERS: [&str; 2] = ["독서활동상황", "행동특성 및 종합의견"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidation {
    pub is_valid: bool,
    /// 0.0-1.0, two decimals
    pub confidence: f64,
    pub missing_elements: Vec<String>,
}

/// Does the parsed text look like a Korean school record?
///
/// Valid when at least two of the three core headings appear.
pub fn validate_student_record(text: &str) -> RecordValidation {
    let missing_elements: Vec<String> = REQUIRED_MARKERS
        .iter()
        .filter(|m| !text.contains(*m))
        .map(|m| m.to_string())
        .collect();
    let found_required = REQUIRED_MARKERS.len() - missing_elements.len();
    let found_optional = OPTIONAL_MARKERS.iter().filter(|m| text.contains(*m)).count();

    let confidence = (found_required as f64 / REQUIRED_MARKERS.len() as f64) * 0.8
        + (found_optional as f64 / OPTIONAL_MARKERS.len() as f64) * 0.2;

    RecordValidation {
        is_valid: found_required >= 2,
        confidence: (confidence * 100.0).round() / 100.0,
        missing_elements,
    }
}

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"성\s*명\s*[:：]\s*([가-힣]{2,4})").unwrap());
static SCHOOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([가-힣]+(?:초등학교|중학교|고등학교))").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})\s*학년도").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub student_name: String,
    pub school_name: String,
    pub academic_year: String,
    pub document_type: String,
    pub page_count: usize,
    pub text_length: usize,
}

pub fn extract_document_metadata(text: &str) -> DocumentMetadata {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    let document_type = if text.contains("학교생활기록부") {
        "학교생활기록부"
    } else if text.contains("생활기록부") {
        "생활기록부"
    } else {
        ""
    };

    let text_length = text.chars().count();
    DocumentMetadata {
        student_name: capture(&NAME),
        school_name: capture(&SCHOOL),
        academic_year: capture(&YEAR),
        document_type: document_type.to_string(),
        page_count: text_length.div_ceil(2000),
        text_length,
    }
}
