//! Interview Session Controller.
//!
//! Owns `SessionState` for one interview: phase transitions, turn counting,
//! weak-answer retries, question dedup and the evaluation protocol.
//!
//! Caller contract: operations are single-flight. The host must not call
//! `submit_answer` while a previous call on the same session is pending.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::InterviewError;
use crate::interview::classifier::AnswerClassifier;
use crate::interview::evaluation::{
    empty_report, evaluation_from_response, fallback_report, has_answers, EvaluationReport,
};
use crate::interview::profile::{self, ResumeProfile};
use crate::interview::prompts::{
    build_evaluation_prompt, build_interview_prompt, distinct_question_instruction,
    is_valid_domain, phase_instruction, retry_instruction,
};
use crate::interview::question::extract_question;
use crate::interview::store::SessionSnapshot;
use crate::llm_client::{CompletionOptions, GenerationService, LlmError};
use crate::models::transcript::{qa_pairs, Turn, NO_RESPONSE};

pub const MIN_QUESTIONS: u32 = 3;
pub const MAX_QUESTIONS: u32 = 20;
pub const DEFAULT_MAX_QUESTIONS: u32 = 8;

/// Rephrase attempts per question before a weak answer is accepted anyway.
pub const MAX_RETRIES_PER_QUESTION: u32 = 2;

/// Word-set similarity at or above which two questions count as the same.
const DUPLICATE_SIMILARITY: f64 = 0.8;

const EVALUATION_SIGNALS: &[&str] = &[
    "score",
    "strengths",
    "weaknesses",
    "evaluation",
    "recommendation",
];

/// "8/10", "85%", "7 out of 10".
static SCORE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d+)?\s*(?:/\s*(?:10|100)\b|%|out\s+of\s+(?:10|100)\b)")
        .expect("valid regex")
});

/// Ordered interview stages. Never regresses within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening,
    ResumeDeepDive,
    DomainSpecific,
    Behavioral,
    Closing,
}

impl Phase {
    /// Phase of the question asked after `index` accepted answers.
    ///
    /// First question opens, the last one closes; in between roughly 25% goes to
    /// the resume, 40% to the domain and the rest to behavioral questions.
    pub fn for_question(index: u32, max_questions: u32) -> Self {
        if index == 0 {
            return Phase::Opening;
        }
        if index + 1 >= max_questions {
            return Phase::Closing;
        }
        let max = f64::from(max_questions);
        let resume_end = 1 + ((max * 0.25).round() as u32).max(1);
        let domain_end = resume_end + (max * 0.40).round() as u32;

        if index < resume_end {
            Phase::ResumeDeepDive
        } else if index < domain_end {
            Phase::DomainSpecific
        } else {
            Phase::Behavioral
        }
    }
}

/// The controller's mutable core. Serializable so hosts can persist it between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub question_index: u32,
    pub max_questions: u32,
    pub awaiting_retry: bool,
    pub retries_for_question: u32,
    pub current_question: String,
    pub asked_question_keys: BTreeSet<String>,
    pub domain: String,
    pub resume_profile: ResumeProfile,
    pub transcript: Vec<Turn>,
    pub system_prompt: String,
    pub last_raw_response: String,
    pub completed: bool,
    pub ended_early: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Question(String),
    Evaluation(EvaluationReport),
}

pub struct InterviewController {
    llm: Arc<dyn GenerationService>,
    classifier: AnswerClassifier,
    state: Option<SessionState>,
    report: Option<EvaluationReport>,
}

impl InterviewController {
    pub fn new(llm: Arc<dyn GenerationService>) -> Self {
        Self {
            llm,
            classifier: AnswerClassifier::default(),
            state: None,
            report: None,
        }
    }

    pub fn restore(llm: Arc<dyn GenerationService>, snapshot: SessionSnapshot) -> Self {
        Self {
            llm,
            classifier: AnswerClassifier::default(),
            state: Some(snapshot.state),
            report: snapshot.report,
        }
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        self.report.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.state.clone().map(|state| SessionSnapshot {
            state,
            report: self.report.clone(),
        })
    }

    /// Starts a new interview and returns the opening question.
    pub async fn initialize(
        &mut self,
        domain: &str,
        resume_text: &str,
        max_questions: u32,
    ) -> Result<String, InterviewError> {
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&max_questions) {
            return Err(InterviewError::Configuration(format!(
                "max_questions must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}, got {max_questions}"
            )));
        }
        let domain = domain.trim();
        if !is_valid_domain(domain) {
            return Err(InterviewError::InvalidDomain(domain.to_string()));
        }

        let resume_profile = profile::extract(resume_text);
        let system_prompt = build_interview_prompt(domain, &resume_profile, max_questions)?;
        let now = Utc::now();

        let mut state = SessionState {
            phase: Phase::Opening,
            question_index: 0,
            max_questions,
            awaiting_retry: false,
            retries_for_question: 0,
            current_question: String::new(),
            asked_question_keys: BTreeSet::new(),
            domain: domain.to_string(),
            resume_profile,
            transcript: Vec::new(),
            system_prompt,
            last_raw_response: String::new(),
            completed: false,
            ended_early: false,
            started_at: now,
            updated_at: now,
        };

        let instruction = phase_instruction(Phase::Opening, domain);
        let question = request_question(self.llm.as_ref(), &mut state, &instruction).await?;
        commit_question(&mut state, question.clone());

        info!(
            "Interview initialized: domain={domain}, max_questions={max_questions}, level={}",
            state.resume_profile.experience_level.label()
        );

        self.state = Some(state);
        self.report = None;
        Ok(question)
    }

    /// Records an answer and returns either the next question or the final report.
    ///
    /// On a Generation Service error the session is left exactly as it was
    /// before the call, so the caller can resubmit the same answer.
    pub async fn submit_answer(&mut self, answer: &str) -> Result<TurnOutcome, InterviewError> {
        let checkpoint = {
            let state = self.state.as_ref().ok_or(InterviewError::NotInitialized)?;
            if state.completed {
                return Err(InterviewError::Completed);
            }
            state.clone()
        };

        match self.advance(answer).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Answer submission failed, session rolled back: {e}");
                self.state = Some(checkpoint);
                Err(e)
            }
        }
    }

    async fn advance(&mut self, answer: &str) -> Result<TurnOutcome, InterviewError> {
        let llm = Arc::clone(&self.llm);
        let state = self.state.as_mut().ok_or(InterviewError::NotInitialized)?;

        let answer = match answer.trim() {
            "" => NO_RESPONSE,
            trimmed => trimmed,
        };
        state.transcript.push(Turn::candidate(answer));
        state.updated_at = Utc::now();

        let weak = self.classifier.is_weak(answer);
        if weak && state.retries_for_question < MAX_RETRIES_PER_QUESTION {
            state.retries_for_question += 1;
            state.awaiting_retry = true;
            warn!(
                "Weak answer on question {} (retry {}/{MAX_RETRIES_PER_QUESTION})",
                state.question_index + 1,
                state.retries_for_question
            );

            let instruction = retry_instruction(state.phase, &state.domain);
            let question = request_question(llm.as_ref(), state, &instruction).await?;
            commit_question(state, question.clone());
            return Ok(TurnOutcome::Question(question));
        }
        if weak {
            warn!(
                "Accepting weak answer on question {} after {MAX_RETRIES_PER_QUESTION} retries",
                state.question_index + 1
            );
        }

        state.awaiting_retry = false;
        state.retries_for_question = 0;
        state.question_index += 1;

        let next_phase = Phase::for_question(state.question_index, state.max_questions);
        if next_phase != state.phase {
            info!("Interview phase {:?} -> {:?}", state.phase, next_phase);
            state.phase = next_phase;
        }

        if state.question_index >= state.max_questions {
            let report = run_evaluation(llm.as_ref(), state, false).await;
            self.report = Some(report.clone());
            return Ok(TurnOutcome::Evaluation(report));
        }

        let question = next_distinct_question(llm.as_ref(), state).await?;
        Ok(TurnOutcome::Question(question))
    }

    /// Ends the interview now and evaluates only the answers given so far.
    pub async fn end_early(&mut self) -> Result<EvaluationReport, InterviewError> {
        self.finish(true).await
    }

    /// Evaluates a session whose questions are exhausted, or whose model already
    /// started evaluating on its own. Returns the stored report if already done.
    pub async fn evaluate(&mut self) -> Result<EvaluationReport, InterviewError> {
        self.finish(false).await
    }

    async fn finish(&mut self, ended_early: bool) -> Result<EvaluationReport, InterviewError> {
        let llm = Arc::clone(&self.llm);
        let state = self.state.as_mut().ok_or(InterviewError::NotInitialized)?;
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }

        let report = run_evaluation(llm.as_ref(), state, ended_early).await;
        self.report = Some(report.clone());
        Ok(report)
    }

    /// True once the question budget is spent (and no retry is pending), or when
    /// the last model response already reads like an evaluation.
    pub fn is_complete(&self) -> bool {
        let Some(state) = &self.state else {
            return false;
        };
        state.completed
            || (state.question_index >= state.max_questions && !state.awaiting_retry)
            || contains_evaluation_signals(&state.last_raw_response)
    }
}

// ─── Turn helpers ─────────────────────────────────────────────────────────────

/// Asks the service for a question over the full transcript. Does not touch the transcript.
async fn request_question(
    llm: &dyn GenerationService,
    state: &mut SessionState,
    instruction: &str,
) -> Result<String, InterviewError> {
    let raw = llm
        .complete(
            &state.transcript,
            instruction,
            CompletionOptions::question(&state.system_prompt),
        )
        .await?;

    let question = extract_question(&raw);
    state.last_raw_response = raw;
    if question.is_empty() {
        return Err(LlmError::EmptyContent.into());
    }
    Ok(question)
}

async fn next_distinct_question(
    llm: &dyn GenerationService,
    state: &mut SessionState,
) -> Result<String, InterviewError> {
    let instruction = phase_instruction(state.phase, &state.domain);
    let mut question = request_question(llm, state, &instruction).await?;

    if is_near_duplicate(&state.asked_question_keys, &question) {
        warn!("Model repeated an earlier question; requesting a different one");
        let instruction = distinct_question_instruction(state.phase, &state.domain, &question);
        question = request_question(llm, state, &instruction).await?;
    }

    commit_question(state, question.clone());
    Ok(question)
}

fn commit_question(state: &mut SessionState, question: String) {
    state.asked_question_keys.insert(question_key(&question));
    state.transcript.push(Turn::interviewer(question.clone()));
    state.current_question = question;
    state.updated_at = Utc::now();
}

async fn run_evaluation(
    llm: &dyn GenerationService,
    state: &mut SessionState,
    ended_early: bool,
) -> EvaluationReport {
    let report = if !has_answers(&state.transcript) {
        info!("No usable answers; skipping evaluation call");
        empty_report()
    } else {
        let pairs = qa_pairs(&state.transcript);
        let prompt = build_evaluation_prompt(
            &state.transcript,
            &state.domain,
            &state.resume_profile,
            ended_early,
        );
        match llm.complete(&[], &prompt, CompletionOptions::structured()).await {
            Ok(raw) => evaluation_from_response(&raw, &pairs, ended_early),
            Err(e) => {
                warn!("Evaluation call failed ({e}); synthesizing fallback report");
                fallback_report(&pairs, ended_early)
            }
        }
    };

    state.completed = true;
    state.ended_early = ended_early;
    state.awaiting_retry = false;
    state.updated_at = Utc::now();
    info!(
        "Interview evaluated: overall={}, questions={}, ended_early={ended_early}",
        report.score.overall,
        report.questions.len()
    );
    report
}

// ─── Dedup ────────────────────────────────────────────────────────────────────

/// Lower-cased alphanumeric words, single-spaced.
fn question_key(question: &str) -> String {
    question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_near_duplicate(asked: &BTreeSet<String>, question: &str) -> bool {
    let key = question_key(question);
    if asked.contains(&key) {
        return true;
    }
    let words: BTreeSet<&str> = key.split(' ').collect();
    asked.iter().any(|previous| {
        let previous: BTreeSet<&str> = previous.split(' ').collect();
        let union = words.union(&previous).count();
        let shared = words.intersection(&previous).count();
        union > 0 && shared as f64 / union as f64 >= DUPLICATE_SIMILARITY
    })
}

/// Two or more distinct evaluation keywords, plus either a numeric score or text
/// that does not read as a question. "What are your strengths and weaknesses?"
/// is an interview question, not a verdict.
fn contains_evaluation_signals(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    let keywords = EVALUATION_SIGNALS
        .iter()
        .filter(|signal| lower.contains(*signal))
        .count();
    if keywords < 2 {
        return false;
    }
    SCORE_PATTERN.is_match(&lower) || !extract_question(raw).ends_with('?')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedGeneration;

    const RESUME: &str = "Senior software engineer with 8 years of experience at Acme Corp. \
        Built a distributed job scheduler in Rust and PostgreSQL. \
        Reduced infrastructure costs by 30% through autoscaling.";

    const REPORT_JSON: &str = r#"{
        "score": {"overall": 81, "communication": 85, "technical": 80, "problemSolving": 78, "behavioral": 82},
        "summary": "Strong candidate with clear answers.",
        "strengths": ["Clear", "Concrete"],
        "weaknesses": ["Brief", "Few metrics"],
        "questions": [
            {"question": "Q1", "yourAnswer": "A1", "suggestedAnswer": "S1", "notes": "N1", "score": 8},
            {"question": "Q2", "yourAnswer": "A2", "suggestedAnswer": "S2", "notes": "N2", "score": 7},
            {"question": "Q3", "yourAnswer": "A3", "suggestedAnswer": "S3", "notes": "N3", "score": 9}
        ]
    }"#;

    const GOOD_ANSWER: &str = "I designed the scheduler around a leader-elected queue in Postgres.";

    fn controller(fake: &Arc<ScriptedGeneration>) -> InterviewController {
        InterviewController::new(fake.clone())
    }

    fn state(c: &InterviewController) -> &SessionState {
        c.state().unwrap()
    }

    #[test]
    fn test_phase_progression_for_every_budget() {
        for max in MIN_QUESTIONS..=MAX_QUESTIONS {
            let phases: Vec<Phase> = (0..max).map(|i| Phase::for_question(i, max)).collect();
            assert!(phases.windows(2).all(|w| w[0] <= w[1]), "non-monotonic for {max}");
            assert_eq!(phases.iter().filter(|p| **p == Phase::Opening).count(), 1);
            assert_eq!(phases.iter().filter(|p| **p == Phase::Closing).count(), 1);
            assert_eq!(phases[(max - 1) as usize], Phase::Closing);
        }
    }

    #[test]
    fn test_phase_split_for_default_budget() {
        let phases: Vec<Phase> = (0..8).map(|i| Phase::for_question(i, 8)).collect();
        assert_eq!(
            phases,
            vec![
                Phase::Opening,
                Phase::ResumeDeepDive,
                Phase::ResumeDeepDive,
                Phase::DomainSpecific,
                Phase::DomainSpecific,
                Phase::DomainSpecific,
                Phase::Behavioral,
                Phase::Closing,
            ]
        );
    }

    #[tokio::test]
    async fn test_initialize_returns_clean_first_question() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "Question 1: Great, let's begin. What drew you to backend engineering?",
        ]));
        let mut c = controller(&fake);

        let question = c.initialize("Software Engineer", RESUME, 5).await.unwrap();
        assert_eq!(question, "What drew you to backend engineering?");

        let s = state(&c);
        assert_eq!(s.phase, Phase::Opening);
        assert_eq!(s.question_index, 0);
        assert_eq!(s.transcript, vec![Turn::interviewer(question.clone())]);
        assert!(s.system_prompt.contains("Software Engineer interview"));

        let calls = fake.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].turns.is_empty());
        assert!(!calls[0].structured);
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_configuration() {
        let fake = Arc::new(ScriptedGeneration::new());
        let mut c = controller(&fake);

        let err = c.initialize("Astronaut", RESUME, 8).await.unwrap_err();
        assert!(matches!(err, InterviewError::InvalidDomain(_)));

        let err = c.initialize("Sales", RESUME, 2).await.unwrap_err();
        assert!(matches!(err, InterviewError::Configuration(_)));

        let err = c.initialize("Sales", RESUME, 21).await.unwrap_err();
        assert!(matches!(err, InterviewError::Configuration(_)));

        assert_eq!(fake.call_count(), 0);
        assert!(c.state().is_none());
    }

    #[tokio::test]
    async fn test_three_accepted_answers_produce_report() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "Tell me about your background?",
            "How did you design the job scheduler?",
            "Where do you want to grow next?",
            REPORT_JSON,
        ]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 3).await.unwrap();

        let first = c.submit_answer(GOOD_ANSWER).await.unwrap();
        assert!(matches!(first, TurnOutcome::Question(_)));
        let second = c.submit_answer(GOOD_ANSWER).await.unwrap();
        assert_eq!(
            second,
            TurnOutcome::Question("Where do you want to grow next?".to_string())
        );
        assert_eq!(state(&c).phase, Phase::Closing);

        match c.submit_answer(GOOD_ANSWER).await.unwrap() {
            TurnOutcome::Evaluation(report) => {
                assert_eq!(report.questions.len(), 3);
                assert_eq!(report.score.overall, 81.0);
            }
            other => panic!("expected evaluation, got {other:?}"),
        }

        assert!(c.is_complete());
        assert!(state(&c).completed);
        let calls = fake.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[3].structured);
        assert!(calls[3].instruction.contains("Q3:"));
    }

    #[tokio::test]
    async fn test_end_early_without_answers_skips_service() {
        let fake = Arc::new(ScriptedGeneration::with_responses(["Tell me about yourself?"]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 5).await.unwrap();

        let report = c.end_early().await.unwrap();
        assert_eq!(report.score.overall, 0.0);
        assert!(report.questions.is_empty());
        assert!(!report.summary.is_empty());
        assert_eq!(fake.call_count(), 1);
        assert!(c.is_complete());
    }

    #[tokio::test]
    async fn test_end_early_flags_prompt() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "Tell me about yourself?",
            "What did you build at Acme?",
            REPORT_JSON,
        ]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 8).await.unwrap();
        c.submit_answer(GOOD_ANSWER).await.unwrap();

        c.end_early().await.unwrap();
        let calls = fake.calls();
        assert!(calls[2].instruction.contains("ended early"));
        assert!(state(&c).ended_early);

        // A second call returns the stored report without another request.
        c.end_early().await.unwrap();
        assert_eq!(fake.call_count(), 3);
    }

    #[tokio::test]
    async fn test_weak_answer_retries_without_advancing() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "How would you shard a large table?",
            "No problem. Could you describe how you'd split data across databases?",
        ]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 5).await.unwrap();

        let outcome = c.submit_answer("I'm not sure, sorry").await.unwrap();
        let rephrased = "Could you describe how you'd split data across databases?";
        assert_eq!(outcome, TurnOutcome::Question(rephrased.to_string()));

        let s = state(&c);
        assert_eq!(s.question_index, 0);
        assert!(s.awaiting_retry);
        assert_eq!(s.phase, Phase::Opening);
        assert!(fake.calls()[1].instruction.contains("Rephrase"));
        assert!(!c.is_complete());
    }

    #[tokio::test]
    async fn test_weak_answers_accepted_after_retry_cap() {
        let fake = Arc::new(ScriptedGeneration::new());
        let mut c = controller(&fake);
        c.initialize("Sales", RESUME, 5).await.unwrap();

        for _ in 0..MAX_RETRIES_PER_QUESTION {
            c.submit_answer("pass").await.unwrap();
            assert_eq!(state(&c).question_index, 0);
        }
        c.submit_answer("pass").await.unwrap();

        let s = state(&c);
        assert_eq!(s.question_index, 1);
        assert!(!s.awaiting_retry);
        assert_eq!(s.retries_for_question, 0);
    }

    #[tokio::test]
    async fn test_empty_answer_recorded_as_placeholder() {
        let fake = Arc::new(ScriptedGeneration::new());
        let mut c = controller(&fake);
        c.initialize("Marketing", RESUME, 5).await.unwrap();

        c.submit_answer("   ").await.unwrap();
        let s = state(&c);
        assert_eq!(s.transcript[1], Turn::candidate(NO_RESPONSE));
        assert!(s.awaiting_retry);
    }

    #[tokio::test]
    async fn test_generation_error_leaves_state_unchanged() {
        let fake = Arc::new(ScriptedGeneration::with_responses(["Tell me about yourself?"]));
        fake.push_err(LlmError::Api {
            status: 500,
            message: "overloaded".to_string(),
        });
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 5).await.unwrap();
        let before = state(&c).clone();

        let err = c.submit_answer(GOOD_ANSWER).await.unwrap_err();
        assert!(matches!(err, InterviewError::Generation(_)));

        let after = state(&c);
        assert_eq!(after.question_index, before.question_index);
        assert_eq!(after.transcript, before.transcript);
        assert_eq!(after.phase, before.phase);

        // Resubmitting the same answer succeeds once the service recovers.
        assert!(matches!(
            c.submit_answer(GOOD_ANSWER).await.unwrap(),
            TurnOutcome::Question(_)
        ));
        assert_eq!(state(&c).question_index, 1);
    }

    #[tokio::test]
    async fn test_evaluation_failure_yields_fallback_report() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "Tell me about yourself?",
            "What did you build at Acme?",
            "Where do you want to grow?",
        ]));
        fake.push_err(LlmError::Timeout(std::time::Duration::from_secs(120)));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 3).await.unwrap();
        c.submit_answer(GOOD_ANSWER).await.unwrap();
        c.submit_answer(GOOD_ANSWER).await.unwrap();

        match c.submit_answer(GOOD_ANSWER).await.unwrap() {
            TurnOutcome::Evaluation(report) => {
                assert_eq!(report.score.overall, 0.0);
                assert_eq!(report.questions.len(), 3);
                assert_eq!(report.questions[0].question, "Tell me about yourself?");
                assert_eq!(report.questions[0].your_answer, GOOD_ANSWER);
            }
            other => panic!("expected evaluation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_after_completion_is_rejected() {
        let fake = Arc::new(ScriptedGeneration::with_responses(["Tell me about yourself?"]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 3).await.unwrap();
        c.end_early().await.unwrap();

        let err = c.submit_answer(GOOD_ANSWER).await.unwrap_err();
        assert!(matches!(err, InterviewError::Completed));
    }

    #[tokio::test]
    async fn test_submit_before_initialize_is_rejected() {
        let fake = Arc::new(ScriptedGeneration::new());
        let mut c = controller(&fake);
        let err = c.submit_answer(GOOD_ANSWER).await.unwrap_err();
        assert!(matches!(err, InterviewError::NotInitialized));
    }

    #[tokio::test]
    async fn test_duplicate_question_requests_another() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "What drew you to engineering?",
            "So, what drew you to engineering?",
            "Which project at Acme are you proudest of?",
        ]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 5).await.unwrap();

        let outcome = c.submit_answer(GOOD_ANSWER).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Question("Which project at Acme are you proudest of?".to_string())
        );
        assert_eq!(fake.call_count(), 3);
        assert!(fake.calls()[2].instruction.contains("clearly different"));
    }

    #[tokio::test]
    async fn test_model_self_evaluation_marks_complete() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "Tell me about yourself?",
            "Thanks! Overall score: 8/10. Strengths: clarity. Weaknesses: depth.",
        ]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 8).await.unwrap();
        assert!(!c.is_complete());

        c.submit_answer(GOOD_ANSWER).await.unwrap();
        assert!(c.is_complete());
    }

    #[tokio::test]
    async fn test_restore_from_snapshot_continues_session() {
        let fake = Arc::new(ScriptedGeneration::with_responses(["Tell me about yourself?"]));
        let mut c = controller(&fake);
        c.initialize("Data Analyst", RESUME, 4).await.unwrap();
        let snapshot = c.snapshot().unwrap();

        let json = serde_json::to_string(&snapshot).unwrap();
        let snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored = InterviewController::restore(fake.clone(), snapshot);
        restored.submit_answer(GOOD_ANSWER).await.unwrap();
        let s = state(&restored);
        assert_eq!(s.question_index, 1);
        assert_eq!(s.phase, Phase::ResumeDeepDive);
        assert_eq!(s.transcript.len(), 3);
    }

    #[test]
    fn test_near_duplicate_detection() {
        let mut asked = BTreeSet::new();
        asked.insert(question_key("How do you handle conflict in a team?"));
        assert!(is_near_duplicate(&asked, "How do you handle conflict in a team?"));
        assert!(is_near_duplicate(&asked, "how do you handle conflict in a team"));
        assert!(!is_near_duplicate(&asked, "What is your favourite database and why?"));
    }

    #[test]
    fn test_single_keyword_is_not_an_evaluation() {
        assert!(!contains_evaluation_signals("How would you score leads in a CRM?"));
        assert!(contains_evaluation_signals("Strengths: clear. Weaknesses: vague."));
    }

    #[test]
    fn test_strengths_and_weaknesses_question_is_not_an_evaluation() {
        assert!(!contains_evaluation_signals(
            "Great. What are your greatest strengths and weaknesses?"
        ));
        assert!(contains_evaluation_signals(
            "Score: 7/10. Strengths: focus. Weaknesses: depth. Any questions for me?"
        ));
    }

    #[tokio::test]
    async fn test_behavioral_strengths_question_keeps_interview_running() {
        let fake = Arc::new(ScriptedGeneration::with_responses([
            "Tell me about yourself?",
            "Thanks. What would you say are your greatest strengths and weaknesses?",
        ]));
        let mut c = controller(&fake);
        c.initialize("Software Engineer", RESUME, 8).await.unwrap();

        c.submit_answer(GOOD_ANSWER).await.unwrap();
        assert!(!c.is_complete());
        assert_eq!(state(&c).question_index, 1);
    }
}
