//! Onboarding: resume text from uploaded PDFs and validation of the session
//! configuration before a controller ever sees it.

use crate::errors::AppError;
use crate::interview::prompts::is_valid_domain;
use crate::interview::session::{MAX_QUESTIONS, MIN_QUESTIONS};

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_ANSWER_CHARS: usize = 20_000;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Validated session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewConfig {
    pub domain: String,
    pub resume_text: String,
    pub max_questions: u32,
}

/// Rejects empty or unsupported domains and question budgets outside 3–20.
pub fn validate_config(
    domain: &str,
    resume_text: &str,
    max_questions: Option<u32>,
    default_max_questions: u32,
) -> Result<InterviewConfig, AppError> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(AppError::Validation("domain is required".to_string()));
    }
    if !is_valid_domain(domain) {
        return Err(AppError::Validation(format!(
            "Unsupported interview domain: {domain}"
        )));
    }

    let max_questions = max_questions.unwrap_or(default_max_questions);
    if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&max_questions) {
        return Err(AppError::Validation(format!(
            "max_questions must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}"
        )));
    }

    Ok(InterviewConfig {
        domain: domain.to_string(),
        resume_text: resume_text.trim().to_string(),
        max_questions,
    })
}

pub fn validate_answer(answer: &str) -> Result<(), AppError> {
    if answer.chars().count() > MAX_ANSWER_CHARS {
        return Err(AppError::Validation(format!(
            "answer must be at most {MAX_ANSWER_CHARS} characters"
        )));
    }
    Ok(())
}

/// Extracts plain text from an uploaded PDF resume.
///
/// Extraction is best effort: the PDF parser runs on the blocking pool so a
/// panic on a malformed file becomes an error instead of taking down the worker.
pub async fn extract_resume_text(bytes: Vec<u8>) -> Result<String, AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    if bytes.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation(format!(
            "resume must be at most {} MB",
            MAX_RESUME_BYTES / (1024 * 1024)
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::Validation("uploaded file is not a PDF".to_string()));
    }

    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AppError::UnprocessableEntity(format!("PDF could not be parsed: {e}")))?
        .map_err(|e| AppError::UnprocessableEntity(format!("PDF could not be parsed: {e}")))?;

    let text = normalize_pdf_text(&extracted);
    if text.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "no text could be extracted from the PDF".to_string(),
        ));
    }
    Ok(text)
}

/// Joins pages, trims every line and drops blank runs.
fn normalize_pdf_text(raw: &str) -> String {
    raw.split('\x0c')
        .flat_map(str::lines)
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
