//! Question Extractor: reduces a raw model response to one natural question.
//!
//! Order matters: labels first, then filler openers, then sentence selection.
//! Best effort over unpredictable output: non-empty input always yields
//! non-empty output.

use std::sync::LazyLock;

use regex::Regex;

/// Leading enumeration and label artifacts
/// ("Question 3:", "1.", "Q2)", "Here's your next question:").
const LABEL_PATTERNS: &[&str] = &[
    r"(?i)^\**\s*question\b\s*#?\s*\d*\s*(?:of\s*\d+)?\s*\**\s*[:.)\-–—]*\s*",
    r"(?i)^q\d+\s*[:.)\-–—]+\s*",
    r"^\d+\s*[:.)\-–—]+\s*",
    r"(?i)^(?:here(?:'|’)?s|here\s+is|now|next|let(?:'|’)?s\s+move\s+on|moving\s+on)[^:?]{0,40}?(?:question|one)\s*[:.\-–—]+\s*",
];

/// Acknowledgement openers ("Great,", "Thanks,", "Okay so").
const FILLER_PATTERN: &str = r"(?i)^(?:(?:great|good|nice|thanks|thank\s+you|alright|all\s+right|okay|ok|so|well|sure|excellent|perfect|awesome|got\s+it|understood|i\s+see|that(?:'|’)?s\s+(?:a\s+)?(?:great|good|helpful|interesting|solid)(?:\s+\w+)?)\b[\s,.!\-–—]*)+";

const INTERROGATIVE: &str = r"(?i)\b(how|what|why|when|where|which|who|can|could|would|should)\b";

/// A sentence ends at terminal punctuation followed by whitespace or the end of
/// text, so "Node.js", ".NET" and "3.11" stay whole.
const SENTENCE: &str = r"(?s).+?(?:[.!?]+(?:\s+|$)|$)";

/// Abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &["e.g.", "i.e.", "etc.", "vs.", "approx.", "mr.", "ms.", "dr."];

/// Markdown that wraps words, as (pattern, replacement). In-word `#` and `_`
/// ("C#", "snake_case", "__init__") are left alone.
const MARKDOWN_PATTERNS: &[(&str, &str)] = &[
    (r"(?m)^\s*#{1,6}\s+", ""),
    (r"\*\*([^*]+)\*\*", "${1}"),
    (r"\*([^*\s](?:[^*]*[^*\s])?)\*", "${1}"),
    (r"(^|[\s(])_([^_\s](?:[^_]*[^_\s])?)_([\s.,!?:;)]|$)", "${1}${2}${3}"),
    (r"`+", ""),
    (r"\*", ""),
];

struct QuestionRules {
    labels: Vec<Regex>,
    filler: Regex,
    interrogative: Regex,
    sentence: Regex,
    dash: Regex,
    markdown: Vec<(Regex, &'static str)>,
}

static RULES: LazyLock<QuestionRules> = LazyLock::new(|| QuestionRules {
    labels: LABEL_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect(),
    filler: Regex::new(FILLER_PATTERN).expect("valid regex"),
    interrogative: Regex::new(INTERROGATIVE).expect("valid regex"),
    sentence: Regex::new(SENTENCE).expect("valid regex"),
    dash: Regex::new(r"\s+[—–]\s+|\s+-{1,2}\s+").expect("valid regex"),
    markdown: MARKDOWN_PATTERNS
        .iter()
        .map(|(p, r)| (Regex::new(p).expect("valid regex"), *r))
        .collect(),
});

/// Extracts a single clean question sentence from model output.
pub fn extract_question(raw_model_text: &str) -> String {
    let rules = &*RULES;
    let raw = raw_model_text.trim();
    if raw.is_empty() {
        return String::new();
    }

    let mut cleaned = strip_markdown(raw, &rules.markdown);
    cleaned = strip_leading(&cleaned, &rules.labels);
    cleaned = strip_leading(&cleaned, std::slice::from_ref(&rules.filler));
    // A label can also follow the acknowledgement ("Great. Question 2: ...").
    cleaned = strip_leading(&cleaned, &rules.labels);

    // Dashes join clauses within one sentence; treat them as sentence breaks so
    // "tell me — what's X?" yields the interrogative clause alone.
    let segmented = rules.dash.replace_all(&cleaned, ". ");
    let sentences: Vec<String> = split_sentences(&segmented, &rules.sentence)
        .into_iter()
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(|s| strip_leading(&s, std::slice::from_ref(&rules.filler)))
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(question) = sentences.iter().find(|s| s.ends_with('?')) {
        return question.clone();
    }
    if let Some(question) = sentences.iter().find(|s| rules.interrogative.is_match(s)) {
        return question.clone();
    }

    let fallback = cleaned.trim();
    if fallback.is_empty() {
        raw.to_string()
    } else {
        fallback.to_string()
    }
}

/// Repeatedly removes any matching leading pattern.
fn strip_leading(text: &str, patterns: &[Regex]) -> String {
    let mut current = text.trim().to_string();
    loop {
        let before = current.len();
        for pattern in patterns {
            if let Some(m) = pattern.find(&current) {
                if m.start() == 0 && m.end() > 0 {
                    current = current[m.end()..].trim_start().to_string();
                }
            }
        }
        if current.len() == before {
            return current;
        }
    }
}

fn split_sentences(text: &str, sentence: &Regex) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    let mut carry = false;
    for m in sentence.find_iter(text) {
        let part = m.as_str().trim();
        if part.is_empty() {
            continue;
        }
        match sentences.last_mut() {
            Some(last) if carry => {
                last.push(' ');
                last.push_str(part);
            }
            _ => sentences.push(part.to_string()),
        }
        carry = ends_with_abbreviation(part);
    }
    sentences
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    ABBREVIATIONS.iter().any(|abbr| {
        lower.ends_with(abbr)
            && !lower[..lower.len() - abbr.len()]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric)
    })
}

fn strip_markdown(text: &str, patterns: &[(Regex, &str)]) -> String {
    let mut cleaned = text.to_string();
    for (pattern, replacement) in patterns {
        cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
    }
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
