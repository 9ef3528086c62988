use serde::{Deserialize, Serialize};

/// Placeholder recorded when the candidate submits nothing.
pub const NO_RESPONSE: &str = "(No response)";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Interviewer,
    Candidate,
}

/// One exchange in the interview. The ordered list of turns is the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn interviewer(text: impl Into<String>) -> Self {
        Self {
            role: Role::Interviewer,
            text: text.into(),
        }
    }

    pub fn candidate(text: impl Into<String>) -> Self {
        Self {
            role: Role::Candidate,
            text: text.into(),
        }
    }

    /// True for candidate turns that carry no usable answer.
    pub fn is_empty_answer(&self) -> bool {
        let text = self.text.trim();
        text.is_empty() || text == NO_RESPONSE
    }
}

/// A question paired with the candidate answer that followed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Pairs every candidate turn with the most recent interviewer turn before it.
/// A retried question therefore appears once per attempt.
pub fn qa_pairs(transcript: &[Turn]) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut last_question = "";

    for turn in transcript {
        match turn.role {
            Role::Interviewer => last_question = &turn.text,
            Role::Candidate => pairs.push(QaPair {
                question: last_question.to_string(),
                answer: turn.text.clone(),
            }),
        }
    }

    pairs
}
