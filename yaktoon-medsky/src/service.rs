//! Analysis sessions and the processing pipeline
//!
//! A session is created when a PDF is accepted. The pipeline then runs in a
//! background task: parse → section extraction → (structured extraction ∥
//! review feedback). Each step records a [`ProcessingStatus`] that clients
//! poll or receive over SSE.
//!
//! Sessions live in memory and are mirrored best-effort to the store so a
//! restarted or different process can still answer status queries.

use crate::error::{ErrorCode, MedskyError};
use crate::llm::{self, ChatModel};
use crate::pdf::{validate_student_record, PdfParser, UploadedFile};
use crate::text_parser::{clean_all_sections, parse_all_sections, validate_parsed_sections};
use crate::types::{
    ExtractedData, ProcessingResult, ProcessingStage, ProcessingStatus, TextSections,
    ValidationAnalysis,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use yaktoon_common::events::{EventBus, YaktoonEvent};
use yaktoon_common::store::DAY_SECS;
use yaktoon_common::{ids, keys, Store};

/// Admin copies of completed analyses are kept for 30 days
const ADMIN_ANALYSIS_TTL_SECS: u64 = 30 * DAY_SECS;
/// Session lifetimes and cleanup ages are capped at a century
const MAX_SESSION_HOURS: u64 = 100 * 365 * 24;

/// Who requested the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub analyzed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSession {
    pub id: String,
    pub status: ProcessingStatus,
    pub result: ProcessingResult,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAvailability {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStates {
    pub llama_cloud: ServiceAvailability,
    pub openai: ServiceAvailability,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub services: ServiceStates,
    pub errors: Vec<String>,
}

fn availability(probe: &Result<(), String>) -> ServiceAvailability {
    if probe.is_ok() {
        ServiceAvailability::Available
    } else {
        ServiceAvailability::Unavailable
    }
}

fn status_changed(
    session_id: &str,
    status: &ProcessingStatus,
    timestamp: DateTime<Utc>,
) -> YaktoonEvent {
    YaktoonEvent::MedskyStatusChanged {
        session_id: session_id.to_string(),
        stage: status.stage.as_str().to_string(),
        progress: status.progress,
        message: status.message.clone(),
        error: status.error.clone(),
        timestamp,
    }
}

pub struct MedskyService {
    sessions: RwLock<HashMap<String, ProcessingSession>>,
    store: Arc<dyn Store>,
    pdf: Arc<dyn PdfParser>,
    llm: Arc<dyn ChatModel>,
    events: EventBus,
    credential_errors: Vec<String>,
    session_ttl_secs: u64,
}

impl MedskyService {
    pub fn new(
        store: Arc<dyn Store>,
        pdf: Arc<dyn PdfParser>,
        llm: Arc<dyn ChatModel>,
        events: EventBus,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            pdf,
            llm,
            events,
            credential_errors: Vec::new(),
            session_ttl_secs: DAY_SECS,
        }
    }

    /// Problems reported by [`validate_configuration`](Self::validate_configuration)
    pub fn with_credential_errors(mut self, errors: Vec<String>) -> Self {
        self.credential_errors = errors;
        self
    }

    pub fn with_session_ttl_hours(mut self, hours: u64) -> Self {
        self.session_ttl_secs = hours.min(MAX_SESSION_HOURS) * 60 * 60;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The PDF text extractor, shared with other document jobs
    pub fn pdf_parser(&self) -> Arc<dyn PdfParser> {
        self.pdf.clone()
    }

    // ------------------------------------------------------------------
    // Session bookkeeping
    // ------------------------------------------------------------------

    async fn persist(&self, session: &ProcessingSession) {
        let key = keys::medsky_session(&session.id);
        if let Err(e) = self
            .store
            .set_json_ex(&key, session, self.session_ttl_secs)
            .await
        {
            warn!(session_id = %session.id, "Failed to persist session: {}", e);
        }
    }

    pub async fn create_session(&self) -> String {
        let id = ids::medsky_session_id();
        let status = ProcessingStatus::new(ProcessingStage::Uploading, 0, "파일 업로드 준비 중...");
        let now = Utc::now();
        let session = ProcessingSession {
            id: id.clone(),
            result: ProcessingResult::new(status.clone()),
            status,
            start_time: now,
            last_update: now,
            user_info: None,
        };

        self.sessions.write().await.insert(id.clone(), session.clone());
        self.persist(&session).await;
        debug!(session_id = %id, "Created analysis session");
        id
    }

    pub async fn set_user_info(&self, session_id: &str, user_info: UserInfo) {
        let snapshot = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                Some(session) => {
                    session.user_info = Some(user_info);
                    session.clone()
                }
                None => return,
            }
        };
        self.persist(&snapshot).await;
    }

    /// Record a new status; a completed session never changes again
    pub async fn update_status(&self, session_id: &str, status: ProcessingStatus) {
        let snapshot = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return;
            };
            if session.status.stage == ProcessingStage::Completed {
                return;
            }
            session.status = status.clone();
            session.result.status = status.clone();
            session.last_update = Utc::now();
            session.clone()
        };

        self.persist(&snapshot).await;
        self.events
            .emit(status_changed(session_id, &status, snapshot.last_update));

        if status.stage == ProcessingStage::Completed {
            self.store_analysis_for_admin(&snapshot).await;
        }
    }

    async fn update_result<F>(&self, session_id: &str, apply: F)
    where
        F: FnOnce(&mut ProcessingResult),
    {
        let snapshot = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return;
            };
            apply(&mut session.result);
            session.last_update = Utc::now();
            session.clone()
        };
        self.persist(&snapshot).await;
    }

    async fn load_from_store(&self, session_id: &str) -> Option<ProcessingSession> {
        let key = keys::medsky_session(session_id);
        match self.store.get_json::<ProcessingSession>(&key).await {
            Ok(Some(session)) => {
                self.sessions
                    .write()
                    .await
                    .insert(session_id.to_string(), session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(session_id, "Failed to load session from store: {}", e);
                None
            }
        }
    }

    /// In-memory session, falling back to the persisted copy
    pub async fn get_session(&self, session_id: &str) -> Option<ProcessingSession> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Some(session.clone());
        }
        self.load_from_store(session_id).await
    }

    pub async fn get_status(&self, session_id: &str) -> Option<ProcessingStatus> {
        self.get_session(session_id).await.map(|s| s.status)
    }

    /// Current status in the shape of a bus event, for late subscribers
    pub async fn status_event(&self, session_id: &str) -> Option<YaktoonEvent> {
        self.get_session(session_id)
            .await
            .map(|s| status_changed(session_id, &s.status, s.last_update))
    }

    pub async fn get_result(&self, session_id: &str) -> Option<ProcessingResult> {
        self.get_session(session_id).await.map(|s| s.result)
    }

    pub async fn is_complete(&self, session_id: &str) -> bool {
        self.get_status(session_id)
            .await
            .map_or(false, |s| s.stage.is_terminal())
    }

    /// Drop in-memory sessions idle for longer than `max_age_hours`
    pub async fn cleanup_old_sessions(&self, max_age_hours: u64) -> usize {
        let max_age = ChronoDuration::hours(max_age_hours.min(MAX_SESSION_HOURS) as i64);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_update >= cutoff);
        let cleaned = before - sessions.len();
        if cleaned > 0 {
            info!(cleaned, "Cleaned up old analysis sessions");
        }
        cleaned
    }

    // ------------------------------------------------------------------
    // Pipeline steps
    // ------------------------------------------------------------------

    async fn fail(&self, session_id: &str, err: &MedskyError) {
        error!(session_id, code = err.code.as_str(), "Analysis step failed: {}", err);
        self.update_status(session_id, ProcessingStatus::failed(err.message.clone()))
            .await;
    }

    pub async fn process_pdf_upload(
        &self,
        file: &UploadedFile,
        session_id: &str,
    ) -> Result<String, MedskyError> {
        self.update_status(
            session_id,
            ProcessingStatus::new(ProcessingStage::Parsing, 10, "PDF 파일 파싱 중..."),
        )
        .await;

        let outcome = async {
            let text = self.pdf.parse(file).await?;
            let check = validate_student_record(&text);
            if !check.is_valid {
                return Err(MedskyError::new(
                    ErrorCode::InvalidFileType,
                    format!(
                        "업로드된 파일이 학생생활기록부가 아닌 것 같습니다. 확신도: {:.0}%",
                        check.confidence * 100.0
                    ),
                )
                .at(ProcessingStage::Parsing));
            }
            Ok(text)
        }
        .await;

        match outcome {
            Ok(text) => {
                let stored = text.clone();
                self.update_result(session_id, |r| r.parsed_text = Some(stored))
                    .await;
                self.update_status(
                    session_id,
                    ProcessingStatus::new(
                        ProcessingStage::Extracting,
                        25,
                        "PDF 파싱 완료. 텍스트 섹션 추출 준비 중...",
                    ),
                )
                .await;
                Ok(text)
            }
            Err(e) => {
                self.fail(session_id, &e).await;
                Err(e)
            }
        }
    }

    pub async fn process_text_extraction(
        &self,
        parsed_text: &str,
        session_id: &str,
    ) -> Result<TextSections, MedskyError> {
        self.update_status(
            session_id,
            ProcessingStatus::new(ProcessingStage::Extracting, 40, "텍스트 섹션 추출 중..."),
        )
        .await;

        let sections = clean_all_sections(&parse_all_sections(parsed_text));
        let missing = validate_parsed_sections(&sections);
        if !missing.is_empty() {
            let err = MedskyError::new(
                ErrorCode::SectionExtractionFailed,
                format!("필수 섹션을 찾을 수 없습니다: {}", missing.join(", ")),
            )
            .at(ProcessingStage::Extracting);
            self.fail(session_id, &err).await;
            return Err(err);
        }

        let stored = sections.clone();
        self.update_result(session_id, |r| r.text_sections = Some(stored))
            .await;
        self.update_status(
            session_id,
            ProcessingStatus::new(
                ProcessingStage::Analyzing,
                55,
                "텍스트 섹션 추출 완료. LLM 데이터 분석 준비 중...",
            ),
        )
        .await;
        Ok(sections)
    }

    pub async fn process_data_extraction(
        &self,
        sections: &TextSections,
        session_id: &str,
    ) -> Result<ExtractedData, MedskyError> {
        self.update_status(
            session_id,
            ProcessingStatus::new(ProcessingStage::Analyzing, 70, "LLM을 사용한 데이터 구조화 중..."),
        )
        .await;

        match llm::extract_all_data(self.llm.as_ref(), sections).await {
            Ok(data) => {
                let stored = data.clone();
                self.update_result(session_id, |r| r.extracted_data = Some(stored))
                    .await;
                self.update_status(
                    session_id,
                    ProcessingStatus::new(
                        ProcessingStage::Validating,
                        85,
                        "데이터 추출 완료. 검증 분석 중...",
                    ),
                )
                .await;
                Ok(data)
            }
            Err(e) => {
                self.fail(session_id, &e).await;
                Err(e)
            }
        }
    }

    pub async fn process_validation(
        &self,
        sections: &TextSections,
        session_id: &str,
    ) -> Result<ValidationAnalysis, MedskyError> {
        self.update_status(
            session_id,
            ProcessingStatus::new(ProcessingStage::Validating, 95, "종합 검증 분석 진행 중..."),
        )
        .await;

        if !validate_parsed_sections(sections).is_empty() {
            let err = MedskyError::new(
                ErrorCode::ValidationFailed,
                "Incomplete text sections - cannot proceed with validation",
            )
            .at(ProcessingStage::Validating);
            self.fail(session_id, &err).await;
            return Err(err);
        }

        let analysis = llm::run_comprehensive_validation(self.llm.as_ref(), sections).await;
        let stored = analysis.clone();
        self.update_result(session_id, |r| r.validation_analysis = Some(stored))
            .await;
        Ok(analysis)
    }

    /// Completed once both the tables and the feedback are present
    pub async fn mark_completed_if_all_done(&self, session_id: &str) {
        let done = self.get_result(session_id).await.map_or(false, |r| {
            r.extracted_data.is_some() && r.validation_analysis.is_some()
        });
        if done {
            self.update_status(
                session_id,
                ProcessingStatus::new(ProcessingStage::Completed, 100, "모든 분석이 완료되었습니다!"),
            )
            .await;
        }
    }

    /// Every step for one session, in the calling task
    pub async fn run_pipeline(
        &self,
        session_id: &str,
        file: &UploadedFile,
    ) -> Result<ProcessingResult, MedskyError> {
        let parsed_text = self.process_pdf_upload(file, session_id).await?;
        let sections = self.process_text_extraction(&parsed_text, session_id).await?;

        // The first failure drops the other branch so it cannot overwrite the error
        tokio::try_join!(
            self.process_data_extraction(&sections, session_id),
            self.process_validation(&sections, session_id),
        )?;

        self.mark_completed_if_all_done(session_id).await;
        self.get_result(session_id).await.ok_or_else(|| {
            MedskyError::new(ErrorCode::UnknownError, "Session lost during processing")
        })
    }

    /// Create a session and run the whole pipeline, waiting for the result
    pub async fn process_complete_analysis(
        &self,
        file: &UploadedFile,
    ) -> Result<(String, ProcessingResult), MedskyError> {
        let session_id = self.create_session().await;
        let result = self.run_pipeline(&session_id, file).await?;
        Ok((session_id, result))
    }

    /// Run the pipeline for an existing session in a background task
    pub async fn start_processing_pipeline(
        self: &Arc<Self>,
        session_id: &str,
        file: UploadedFile,
        user_info: Option<UserInfo>,
    ) {
        if let Some(info) = user_info {
            self.set_user_info(session_id, info).await;
        }

        let service = Arc::clone(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            match service.run_pipeline(&session_id, &file).await {
                Ok(_) => info!(session_id = %session_id, "Analysis pipeline completed"),
                Err(e) => warn!(session_id = %session_id, "Analysis pipeline stopped: {}", e),
            }
        });
    }

    /// Resume a session from the first missing piece of its result
    pub async fn retry_processing(
        &self,
        session_id: &str,
        file: Option<&UploadedFile>,
    ) -> Result<ProcessingResult, MedskyError> {
        let session = self
            .get_session(session_id)
            .await
            .ok_or_else(|| MedskyError::new(ErrorCode::UnknownError, "Session not found"))?;
        let mut result = session.result;

        if result.parsed_text.is_none() {
            if let Some(file) = file {
                result.parsed_text = Some(self.process_pdf_upload(file, session_id).await?);
            }
        }
        if result.text_sections.is_none() {
            if let Some(text) = &result.parsed_text {
                result.text_sections = Some(self.process_text_extraction(text, session_id).await?);
            }
        }
        if let Some(sections) = result.text_sections.clone() {
            if result.extracted_data.is_none() {
                result.extracted_data = Some(self.process_data_extraction(&sections, session_id).await?);
            }
            if result.validation_analysis.is_none() {
                result.validation_analysis = Some(self.process_validation(&sections, session_id).await?);
            }
        }

        self.mark_completed_if_all_done(session_id).await;
        Ok(self.get_result(session_id).await.unwrap_or(result))
    }

    /// Keep a copy of a completed, attributed analysis for the admin console
    async fn store_analysis_for_admin(&self, session: &ProcessingSession) {
        let result = &session.result;
        let (Some(user), Some(extracted), Some(validation), Some(sections)) = (
            &session.user_info,
            &result.extracted_data,
            &result.validation_analysis,
            &result.text_sections,
        ) else {
            return;
        };

        let completed_at = yaktoon_common::time::now_iso();
        let analysis = json!({
            "sessionId": session.id,
            "userInfo": user,
            "completedAt": completed_at,
            "result": {
                "textSections": sections,
                "extractedData": extracted,
                "validationAnalysis": validation,
                "status": result.status,
            },
            "processingTime": (session.last_update - session.start_time).num_milliseconds(),
        });
        let metadata = json!({
            "sessionId": session.id,
            "productId": user.product_id,
            "userId": user.id,
            "name": user.name,
            "email": user.email,
            "createdAt": yaktoon_common::time::to_iso(&session.start_time),
            "completedAt": completed_at,
        });

        let store = self.store.as_ref();
        let outcome = async {
            store
                .set_json_ex(
                    &keys::analysis_data(keys::ADMIN_NAMESPACE, &session.id),
                    &analysis,
                    ADMIN_ANALYSIS_TTL_SECS,
                )
                .await?;
            store.sadd(keys::ANALYSIS_SESSIONS, &session.id).await?;
            store
                .set_json_ex(
                    &keys::analysis_metadata(&session.id),
                    &metadata,
                    ADMIN_ANALYSIS_TTL_SECS,
                )
                .await
        }
        .await;

        match outcome {
            Ok(()) => info!(session_id = %session.id, user_id = %user.id, "Stored analysis for admin"),
            Err(e) => error!(session_id = %session.id, "Failed to store analysis data for admin: {}", e),
        }
    }

    // ------------------------------------------------------------------
    // Configuration and health
    // ------------------------------------------------------------------

    pub fn validate_configuration(&self) -> ConfigurationCheck {
        ConfigurationCheck {
            is_valid: self.credential_errors.is_empty(),
            errors: self.credential_errors.clone(),
        }
    }

    /// Probe LlamaCloud and the LLM endpoint concurrently
    pub async fn health_check(&self) -> HealthReport {
        let (llama, openai) = tokio::join!(self.pdf.probe(), self.llm.probe());

        let mut errors = Vec::new();
        if let Err(e) = &llama {
            errors.push(format!("LlamaCloud: {}", e));
        }
        if let Err(e) = &openai {
            errors.push(format!("OpenAI: {}", e));
        }

        let services = ServiceStates {
            llama_cloud: availability(&llama),
            openai: availability(&openai),
        };
        let status = match [llama.is_ok(), openai.is_ok()].iter().filter(|ok| **ok).count() {
            2 => HealthStatus::Healthy,
            1 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        };

        HealthReport {
            status,
            services,
            errors,
        }
    }
}
