//! Evaluation report parsing.
//!
//! The Generation Service is untrusted: its output goes through a
//! parse-fallback chain that always ends in a well-formed report.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::llm_client::strip_json_fences;
use crate::models::transcript::{QaPair, Role, Turn};

const EMPTY_SUMMARY: &str = "No valid answers were provided during this interview, so no evaluation \
could be generated. Answer at least one question to receive feedback.";

const FALLBACK_SUMMARY: &str = "The automated evaluation could not be generated for this interview. \
Your answers are listed below so you can review them.";

const ENDED_EARLY_FALLBACK_SUMMARY: &str = "The interview ended early and the automated evaluation \
could not be generated. Your answers so far are listed below so you can review them.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    #[serde(default, deserialize_with = "score_out_of_100")]
    pub overall: f64,
    #[serde(default, deserialize_with = "score_out_of_100")]
    pub communication: f64,
    #[serde(default, deserialize_with = "score_out_of_100")]
    pub technical: f64,
    #[serde(default, deserialize_with = "score_out_of_100")]
    pub problem_solving: f64,
    #[serde(default, deserialize_with = "score_out_of_100")]
    pub behavioral: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub your_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_score_out_of_10",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<f64>,
}

/// Terminal artifact of a session. Built once, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(default)]
    pub score: ScoreBreakdown,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub questions: Vec<QuestionFeedback>,
}

/// Why a model response could not be turned into a report. Never leaves this module's callers.
#[derive(Debug, Error)]
pub enum EvaluationParseError {
    #[error("no JSON object found in response")]
    NoObject,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response has no questions field")]
    MissingQuestions,
}

// ─── Lenient numbers ──────────────────────────────────────────────────────────

/// Accepts numbers and numeric strings ("85", "85%", "7/10").
fn lenient_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%');
            let s = s.split('/').next().unwrap_or(s).trim();
            s.parse::<f64>().ok()
        }
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn score_out_of_100<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_number(&value).unwrap_or(0.0).clamp(0.0, 100.0))
}

fn optional_score_out_of_10<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(lenient_number)
        .map(|n| n.clamp(0.0, 10.0)))
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// True when at least one candidate turn carries a real answer.
pub fn has_answers(transcript: &[Turn]) -> bool {
    transcript
        .iter()
        .any(|t| t.role == Role::Candidate && !t.is_empty_answer())
}

/// Zero-score report for a session without usable answers.
pub fn empty_report() -> EvaluationReport {
    EvaluationReport {
        summary: EMPTY_SUMMARY.to_string(),
        ..EvaluationReport::default()
    }
}

/// Deterministic report built from the transcript when the model output is unusable.
pub fn fallback_report(pairs: &[QaPair], ended_early: bool) -> EvaluationReport {
    let summary = if ended_early {
        ENDED_EARLY_FALLBACK_SUMMARY
    } else {
        FALLBACK_SUMMARY
    };

    EvaluationReport {
        score: ScoreBreakdown::default(),
        summary: summary.to_string(),
        strengths: Vec::new(),
        weaknesses: Vec::new(),
        questions: pairs
            .iter()
            .map(|pair| QuestionFeedback {
                question: pair.question.clone(),
                your_answer: pair.answer.clone(),
                suggested_answer: Some(String::new()),
                notes: Some(String::new()),
                score: Some(0.0),
            })
            .collect(),
    }
}

/// Direct parse, then the first balanced `{...}` block. A `questions` field is required.
pub fn parse_report(raw: &str) -> Result<EvaluationReport, EvaluationParseError> {
    let text = strip_json_fences(raw.trim());

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            let block = first_json_object(text).ok_or(EvaluationParseError::NoObject)?;
            serde_json::from_str(block)?
        }
    };

    match value.get("questions") {
        Some(Value::Array(_)) => {}
        _ => return Err(EvaluationParseError::MissingQuestions),
    }

    Ok(serde_json::from_value(value)?)
}

/// Turns a raw model response into a report, falling back on any parse failure.
pub fn evaluation_from_response(
    raw: &str,
    pairs: &[QaPair],
    ended_early: bool,
) -> EvaluationReport {
    match parse_report(raw) {
        Ok(mut report) => {
            // Models sometimes omit the candidate's own words; restore them from the transcript.
            for (feedback, pair) in report.questions.iter_mut().zip(pairs) {
                if feedback.question.trim().is_empty() {
                    feedback.question = pair.question.clone();
                }
                if feedback.your_answer.trim().is_empty() {
                    feedback.your_answer = pair.answer.clone();
                }
            }
            report
        }
        Err(e) => {
            tracing::warn!("Evaluation response unusable ({e}); synthesizing fallback report");
            fallback_report(pairs, ended_early)
        }
    }
}

/// Returns the first balanced top-level `{...}` slice, ignoring braces inside strings.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transcript::qa_pairs;

    const VALID: &str = r#"{
        "score": {"overall": 78, "communication": 80, "technical": 75, "problemSolving": 70, "behavioral": 85},
        "summary": "Solid interview with clear answers.",
        "strengths": ["Clear communication", "Concrete examples"],
        "weaknesses": ["Light on metrics", "Rushed the design question"],
        "questions": [
            {"question": "Tell me about yourself?", "yourAnswer": "I build backends.", "suggestedAnswer": "Lead with impact.", "notes": "Good start", "score": 7}
        ]
    }"#;

    fn sample_pairs() -> Vec<QaPair> {
        qa_pairs(&[
            Turn::interviewer("Tell me about yourself?"),
            Turn::candidate("I build backends."),
        ])
    }

    #[test]
    fn test_parse_valid_report() {
        let report = parse_report(VALID).unwrap();
        assert_eq!(report.score.overall, 78.0);
        assert_eq!(report.score.problem_solving, 70.0);
        assert_eq!(report.strengths.len(), 2);
        assert_eq!(report.questions[0].score, Some(7.0));
        assert_eq!(
            report.questions[0].suggested_answer.as_deref(),
            Some("Lead with impact.")
        );
    }

    #[test]
    fn test_parse_report_wrapped_in_prose_and_fences() {
        let raw = format!("Here is the evaluation:\n```json\n{VALID}\n```\nLet me know!");
        let report = parse_report(&raw).unwrap();
        assert_eq!(report.score.overall, 78.0);
    }

    #[test]
    fn test_braces_inside_strings_do_not_end_block() {
        let raw = r#"Result: {"summary": "Used {curly} braces", "questions": []} trailing"#;
        let report = parse_report(raw).unwrap();
        assert_eq!(report.summary, "Used {curly} braces");
    }

    #[test]
    fn test_missing_questions_is_rejected() {
        let err = parse_report(r#"{"summary": "ok"}"#).unwrap_err();
        assert!(matches!(err, EvaluationParseError::MissingQuestions));
    }

    #[test]
    fn test_malformed_output_yields_fallback() {
        let pairs = sample_pairs();
        for raw in ["not json at all", "{broken json"] {
            let report = evaluation_from_response(raw, &pairs, false);
            assert_eq!(report.score.overall, 0.0);
            assert!(!report.summary.is_empty());
            assert_eq!(report.questions.len(), 1);
            assert_eq!(report.questions[0].your_answer, "I build backends.");
            assert_eq!(report.questions[0].suggested_answer.as_deref(), Some(""));
        }
    }

    #[test]
    fn test_fallback_summary_mentions_early_end() {
        let report = fallback_report(&sample_pairs(), true);
        assert!(report.summary.contains("ended early"));
    }

    #[test]
    fn test_scores_are_clamped_and_lenient() {
        let raw = r#"{"score": {"overall": "140", "technical": -5, "communication": "82%"},
                      "questions": [{"question": "Q", "yourAnswer": "A", "score": "7/10"},
                                    {"question": "Q2", "yourAnswer": "B", "score": 42}]}"#;
        let report = parse_report(raw).unwrap();
        assert_eq!(report.score.overall, 100.0);
        assert_eq!(report.score.technical, 0.0);
        assert_eq!(report.score.communication, 82.0);
        assert_eq!(report.score.behavioral, 0.0);
        assert_eq!(report.questions[0].score, Some(7.0));
        assert_eq!(report.questions[1].score, Some(10.0));
    }

    #[test]
    fn test_missing_answer_restored_from_transcript() {
        let raw = r#"{"summary": "s", "questions": [{"question": "", "suggestedAnswer": "x"}]}"#;
        let report = evaluation_from_response(raw, &sample_pairs(), false);
        assert_eq!(report.questions[0].question, "Tell me about yourself?");
        assert_eq!(report.questions[0].your_answer, "I build backends.");
    }

    #[test]
    fn test_has_answers_ignores_placeholders() {
        assert!(!has_answers(&[]));
        assert!(!has_answers(&[
            Turn::interviewer("Q?"),
            Turn::candidate("(No response)"),
            Turn::candidate("   "),
        ]));
        assert!(has_answers(&[Turn::interviewer("Q?"), Turn::candidate("Yes")]));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = parse_report(VALID).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["score"]["problemSolving"].is_number());
        assert!(json["questions"][0]["yourAnswer"].is_string());
    }

    #[test]
    fn test_empty_report_shape() {
        let report = empty_report();
        assert_eq!(report.score.overall, 0.0);
        assert!(report.questions.is_empty());
        assert!(report.summary.starts_with("No valid answers"));
    }
}
