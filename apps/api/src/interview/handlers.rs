use anyhow::Context;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::evaluation::EvaluationReport;
use crate::interview::onboarding::{extract_resume_text, validate_answer, validate_config};
use crate::interview::profile::{self, ResumeProfile};
use crate::interview::prompts::supported_domains;
use crate::interview::session::{InterviewController, Phase, SessionState, TurnOutcome};
use crate::state::AppState;
use crate::voice::{clean_for_speech, MAX_SPEECH_CHARS};

#[derive(Serialize)]
pub struct DomainsResponse {
    pub domains: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct ResumeExtractResponse {
    pub resume_text: String,
    pub profile: ResumeProfile,
}

#[derive(Deserialize)]
pub struct CreateInterviewRequest {
    pub domain: String,
    #[serde(default)]
    pub resume_text: String,
    pub max_questions: Option<u32>,
}

#[derive(Serialize)]
pub struct CreateInterviewResponse {
    pub session_id: Uuid,
    pub question: String,
    pub question_number: u32,
    pub max_questions: u32,
    pub phase: Phase,
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub answer: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerResponse {
    Question {
        question: String,
        question_number: u32,
        max_questions: u32,
        phase: Phase,
        awaiting_retry: bool,
    },
    Completed {
        report: EvaluationReport,
    },
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub domain: String,
    pub phase: Phase,
    pub question_number: u32,
    pub max_questions: u32,
    pub awaiting_retry: bool,
    pub current_question: String,
    pub completed: bool,
    pub ended_early: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<EvaluationReport>,
}

#[derive(Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

/// 1-based number of the question currently on the table.
fn question_number(state: &SessionState) -> u32 {
    (state.question_index + 1).min(state.max_questions)
}

async fn load_controller(state: &AppState, id: Uuid) -> Result<InterviewController, AppError> {
    let snapshot = state
        .sessions
        .load(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;
    Ok(InterviewController::restore(state.llm.clone(), snapshot))
}

async fn save_controller(
    state: &AppState,
    id: Uuid,
    controller: &InterviewController,
) -> Result<(), AppError> {
    let snapshot = controller
        .snapshot()
        .context("controller has no session state to save")?;
    state.sessions.save(id, &snapshot).await?;
    Ok(())
}

/// GET /api/v1/domains
pub async fn handle_list_domains() -> Json<DomainsResponse> {
    Json(DomainsResponse {
        domains: supported_domains(),
    })
}

/// POST /api/v1/resume/extract
/// Multipart upload with a `file` field holding a PDF resume.
pub async fn handle_extract_resume(
    mut multipart: Multipart,
) -> Result<Json<ResumeExtractResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;

        let resume_text = extract_resume_text(bytes.to_vec()).await?;
        let profile = profile::extract(&resume_text);
        info!(
            "Resume extracted: {} chars, {} skills",
            resume_text.len(),
            profile.key_skills.len()
        );
        return Ok(Json(ResumeExtractResponse {
            resume_text,
            profile,
        }));
    }

    Err(AppError::Validation("multipart field 'file' is required".to_string()))
}

/// POST /api/v1/interviews
pub async fn handle_create_interview(
    State(state): State<AppState>,
    Json(req): Json<CreateInterviewRequest>,
) -> Result<(StatusCode, Json<CreateInterviewResponse>), AppError> {
    let config = validate_config(
        &req.domain,
        &req.resume_text,
        req.max_questions,
        state.config.default_max_questions,
    )?;

    let mut controller = InterviewController::new(state.llm.clone());
    let question = controller
        .initialize(&config.domain, &config.resume_text, config.max_questions)
        .await?;

    let session_id = Uuid::new_v4();
    save_controller(&state, session_id, &controller).await?;
    info!("Interview session {session_id} started");

    Ok((
        StatusCode::CREATED,
        Json(CreateInterviewResponse {
            session_id,
            question,
            question_number: 1,
            max_questions: config.max_questions,
            phase: Phase::Opening,
        }),
    ))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let controller = load_controller(&state, id).await?;
    let session = controller
        .state()
        .context("restored controller has no session state")?;

    Ok(Json(SessionStatusResponse {
        session_id: id,
        domain: session.domain.clone(),
        phase: session.phase,
        question_number: question_number(session),
        max_questions: session.max_questions,
        awaiting_retry: session.awaiting_retry,
        current_question: session.current_question.clone(),
        completed: session.completed,
        ended_early: session.ended_early,
        started_at: session.started_at,
        updated_at: session.updated_at,
        report: controller.report().cloned(),
    }))
}

/// POST /api/v1/interviews/:id/answers
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    validate_answer(&req.answer)?;
    let mut controller = load_controller(&state, id).await?;

    // On error the controller has rolled back and nothing is saved.
    let outcome = controller.submit_answer(&req.answer).await?;

    let response = match outcome {
        TurnOutcome::Question(_) if controller.is_complete() => {
            info!("Session {id}: model signalled completion, evaluating");
            AnswerResponse::Completed {
                report: controller.evaluate().await?,
            }
        }
        TurnOutcome::Question(question) => {
            let session = controller
                .state()
                .context("controller lost its session state")?;
            AnswerResponse::Question {
                question,
                question_number: question_number(session),
                max_questions: session.max_questions,
                phase: session.phase,
                awaiting_retry: session.awaiting_retry,
            }
        }
        TurnOutcome::Evaluation(report) => AnswerResponse::Completed { report },
    };

    save_controller(&state, id, &controller).await?;
    Ok(Json(response))
}

/// POST /api/v1/interviews/:id/end
pub async fn handle_end_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EvaluationReport>, AppError> {
    let mut controller = load_controller(&state, id).await?;
    let report = controller.end_early().await?;
    save_controller(&state, id, &controller).await?;
    Ok(Json(report))
}

/// DELETE /api/v1/interviews/:id
pub async fn handle_delete_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.clear(id).await?;
    info!("Interview session {id} cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/transcriptions
/// Raw audio body; returns the batch transcript.
pub async fn handle_transcribe(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let transcriber = state.transcriber.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Batch transcription is not configured".to_string())
    })?;
    if body.is_empty() {
        return Err(AppError::Validation("audio body is empty".to_string()));
    }

    let text = transcriber.transcribe(&body).await?;
    Ok(Json(TranscriptionResponse { text }))
}

/// POST /api/v1/speech
/// Renders interviewer text to MP3 audio for the browser to play.
pub async fn handle_synthesize(
    State(state): State<AppState>,
    Json(req): Json<SpeechRequest>,
) -> Result<Response, AppError> {
    let synthesizer = state.synthesizer.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Speech synthesis is not configured".to_string())
    })?;
    let text = clean_for_speech(&req.text);
    if text.is_empty() {
        return Err(AppError::Validation("text is empty".to_string()));
    }
    if text.chars().count() > MAX_SPEECH_CHARS {
        return Err(AppError::Validation(format!(
            "text must be at most {MAX_SPEECH_CHARS} characters"
        )));
    }

    let audio = synthesizer.synthesize(&text, req.voice.as_deref()).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::test_config;
    use crate::interview::store::InMemorySessionStore;
    use crate::llm_client::testing::ScriptedGeneration;
    use crate::llm_client::LlmError;
    use crate::routes::build_router;
    use crate::state::AppState;
    use crate::voice::{AudioSynthesizer, BatchTranscriber, VoiceError};

    const RESUME: &str = "Mid-level data analyst with 4 years of experience at Northwind Inc. \
        Built dashboards in Tableau and SQL. Increased retention by 12% through cohort analysis.";

    struct EchoTranscriber;

    #[async_trait]
    impl BatchTranscriber for EchoTranscriber {
        async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
            Ok(format!("{} bytes", audio.len()))
        }
    }

    /// Returns an ID3 header followed by the text, and records the requested voice.
    #[derive(Default)]
    struct FakeSynthesizer {
        requests: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl AudioSynthesizer for FakeSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            voice: Option<&str>,
        ) -> Result<Vec<u8>, VoiceError> {
            self.requests
                .lock()
                .unwrap()
                .push((text.to_string(), voice.map(str::to_string)));
            Ok([b"ID3".as_slice(), text.as_bytes()].concat())
        }
    }

    fn base_state(fake: &Arc<ScriptedGeneration>) -> AppState {
        AppState {
            llm: fake.clone(),
            sessions: Arc::new(InMemorySessionStore::new()),
            transcriber: None,
            synthesizer: None,
            config: test_config(),
        }
    }

    fn app(fake: &Arc<ScriptedGeneration>) -> Router {
        build_router(base_state(fake))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn answer(app: &Router, id: &str, text: &str) -> (StatusCode, Value) {
        let uri = format!("/api/v1/interviews/{id}/answers");
        send(app, Method::POST, &uri, Some(json!({ "answer": text }))).await
    }

    async fn start(app: &Router, max_questions: u32) -> String {
        let payload = json!({
            "domain": "Data Analyst",
            "resume_text": RESUME,
            "max_questions": max_questions,
        });
        let (status, body) = send(app, Method::POST, "/api/v1/interviews", Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_domains() {
        let app = app(&Arc::new(ScriptedGeneration::new()));

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, Method::GET, "/api/v1/domains", None).await;
        assert_eq!(status, StatusCode::OK);
        let domains = body["domains"].as_array().unwrap();
        assert!(domains.iter().any(|d| d == "Data Analyst"));
    }

    #[tokio::test]
    async fn test_full_interview_over_http() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "What got you into analytics?",
            "How did you build the retention dashboard?",
            "What do you want to learn next?",
            r#"{"score": {"overall": 72}, "summary": "Good.", "strengths": ["a", "b"],
                "weaknesses": ["c", "d"],
                "questions": [{"question": "q1"}, {"question": "q2"}, {"question": "q3"}]}"#,
        ]));
        let app = app(&fake);
        let id = start(&app, 3).await;

        let (status, body) = answer(&app, &id, "I loved puzzles with data.").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "question");
        assert_eq!(body["question_number"], 2);
        assert_eq!(body["phase"], "resume_deep_dive");

        answer(&app, &id, "Cohort queries in SQL feeding Tableau.").await;
        let (status, body) = answer(&app, &id, "Causal inference.").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["report"]["score"]["overall"], 72.0);
        assert_eq!(body["report"]["questions"].as_array().unwrap().len(), 3);

        let uri = format!("/api/v1/interviews/{id}");
        let (_, status_body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status_body["completed"], true);
        assert!(status_body["report"].is_object());

        let (status, body) = answer(&app, &id, "One more").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_model_self_evaluation_triggers_report() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "What got you into analytics?",
            "Overall score 8/10. Strengths: clear structure. Weaknesses: light on metrics.",
            r#"{"score": {"overall": 80}, "summary": "Solid.", "strengths": ["structure"],
                "weaknesses": ["metrics"], "questions": [{"question": "q1"}]}"#,
        ]));
        let app = app(&fake);
        let id = start(&app, 8).await;

        let (status, body) = answer(&app, &id, "I loved puzzles with data.").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["report"]["score"]["overall"], 80.0);

        let calls = fake.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.last().unwrap().structured);

        let uri = format!("/api/v1/interviews/{id}");
        let (_, status_body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status_body["completed"], true);
        assert_eq!(status_body["report"]["score"]["overall"], 80.0);
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_400() {
        let app = app(&Arc::new(ScriptedGeneration::new()));
        for payload in [
            json!({"domain": "Astronaut", "resume_text": RESUME}),
            json!({"domain": "", "resume_text": RESUME}),
            json!({"domain": "Sales", "resume_text": RESUME, "max_questions": 50}),
        ] {
            let (status, body) =
                send(&app, Method::POST, "/api/v1/interviews", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let app = app(&Arc::new(ScriptedGeneration::new()));
        let uri = format!("/api/v1/interviews/{}", uuid::Uuid::new_v4());
        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generation_failure_is_retryable_502() {
        let fake = Arc::new(ScriptedGeneration::with_responses(["Tell me about yourself?"]));
        fake.push_err(LlmError::RateLimited { retries: 3 });
        let app = app(&fake);
        let id = start(&app, 5).await;

        let (status, body) = answer(&app, &id, "I build data pipelines.").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "LLM_ERROR");

        let uri = format!("/api/v1/interviews/{id}");
        let (_, status_body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status_body["question_number"], 1);

        let (status, body) = answer(&app, &id, "I build data pipelines.").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question_number"], 2);
    }

    #[tokio::test]
    async fn test_oversized_answer_rejected() {
        let fake = Arc::new(ScriptedGeneration::new());
        let app = app(&fake);
        let id = start(&app, 5).await;
        let long = "a".repeat(20_001);
        let (status, _) = answer(&app, &id, &long).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_end_early_and_delete() {
        let fake = Arc::new(ScriptedGeneration::new());
        let app = app(&fake);
        let id = start(&app, 5).await;

        let end = format!("/api/v1/interviews/{id}/end");
        let (status, report) = send(&app, Method::POST, &end, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["score"]["overall"], 0.0);
        assert_eq!(report["questions"], json!([]));
        assert_eq!(fake.call_count(), 1);

        let uri = format!("/api/v1/interviews/{id}");
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transcription_disabled_is_503() {
        let app = app(&Arc::new(ScriptedGeneration::new()));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/transcriptions")
            .body(Body::from(vec![1u8, 2, 3]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_transcription_passes_audio_through() {
        let app = build_router(AppState {
            transcriber: Some(Arc::new(EchoTranscriber)),
            ..base_state(&Arc::new(ScriptedGeneration::new()))
        });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/transcriptions")
            .body(Body::from(vec![0u8; 16]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["text"], "16 bytes");
    }

    // ─── Speech synthesis ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_speech_disabled_is_503() {
        let app = app(&Arc::new(ScriptedGeneration::new()));
        let payload = json!({ "text": "Tell me about yourself?" });
        let (status, body) = send(&app, Method::POST, "/api/v1/speech", Some(payload)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_speech_returns_mp3_of_cleaned_text() {
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let app = build_router(AppState {
            synthesizer: Some(synthesizer.clone()),
            ..base_state(&Arc::new(ScriptedGeneration::new()))
        });
        let payload = json!({ "text": "**Great.** Why C#?", "voice": "en-US-Neural2-F" });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/speech")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ID3Great. Why C#?");

        let requests = synthesizer.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            ("Great. Why C#?".to_string(), Some("en-US-Neural2-F".to_string()))
        );
    }

    #[tokio::test]
    async fn test_speech_rejects_empty_and_oversized_text() {
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let app = build_router(AppState {
            synthesizer: Some(synthesizer.clone()),
            ..base_state(&Arc::new(ScriptedGeneration::new()))
        });
        let long = "a ".repeat(crate::voice::MAX_SPEECH_CHARS);
        for text in ["** __ ``", long.as_str()] {
            let payload = json!({ "text": text });
            let (status, _) = send(&app, Method::POST, "/api/v1/speech", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert!(synthesizer.requests.lock().unwrap().is_empty());
    }
}
