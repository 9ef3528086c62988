//! Resume Profile Extractor: turns raw resume text into a capped, structured profile.
//!
//! Pure keyword/regex scans, no LLM call. Every table lives in `ProfileRules`
//! so tests can swap in fixtures. Never fails: short or unreadable input yields
//! the default empty profile.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Resumes shorter than this (trimmed, in chars) are treated as empty.
pub const MIN_RESUME_CHARS: usize = 50;

pub const MAX_SKILLS: usize = 8;
pub const MAX_PROJECTS: usize = 6;
pub const MAX_COMPANIES: usize = 4;
pub const MAX_ACHIEVEMENTS: usize = 4;
pub const MAX_INDUSTRIES: usize = 3;

/// Seniority inferred from the resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    #[default]
    Entry,
    Junior,
    Mid,
    Senior,
}

impl ExperienceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry-level",
            ExperienceLevel::Junior => "junior-level",
            ExperienceLevel::Mid => "mid-level",
            ExperienceLevel::Senior => "senior-level",
        }
    }

    /// How the interviewer should pitch questions for this level.
    pub fn guidance(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => {
                "Focus on learning, projects, and motivation. Avoid expecting deep work experience."
            }
            ExperienceLevel::Junior => "Ask about hands-on experience, learning curve, and teamwork.",
            ExperienceLevel::Mid => "Explore ownership, problem-solving, and mentoring experiences.",
            ExperienceLevel::Senior => "Ask about architecture, leadership, and strategic decisions.",
        }
    }

    fn from_years(years: u32) -> Self {
        match years {
            y if y >= 7 => ExperienceLevel::Senior,
            y if y >= 3 => ExperienceLevel::Mid,
            y if y >= 1 => ExperienceLevel::Junior,
            _ => ExperienceLevel::Entry,
        }
    }
}

/// Structured view of a resume, computed once per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub experience_level: ExperienceLevel,
    pub key_skills: Vec<String>,
    pub projects: Vec<String>,
    pub companies: Vec<String>,
    pub achievements: Vec<String>,
    pub industries: Vec<String>,
}

impl ResumeProfile {
    pub fn is_empty(&self) -> bool {
        self.key_skills.is_empty()
            && self.projects.is_empty()
            && self.companies.is_empty()
            && self.achievements.is_empty()
            && self.industries.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

const SKILL_TABLE: &[(&str, &[&str])] = &[
    (
        "programming",
        &["javascript", "typescript", "python", "java", "c++", "c#", "go", "rust", "php", "ruby"],
    ),
    (
        "frontend",
        &["react", "vue", "angular", "html", "css", "sass", "webpack", "next.js", "nuxt"],
    ),
    (
        "backend",
        &["node.js", "express", "django", "flask", "spring", "asp.net", "rails", "laravel"],
    ),
    (
        "database",
        &["sql", "mysql", "postgresql", "mongodb", "redis", "elasticsearch", "oracle", "sqlite"],
    ),
    (
        "cloud",
        &["aws", "azure", "gcp", "docker", "kubernetes", "terraform", "serverless"],
    ),
    (
        "data",
        &["pandas", "numpy", "tensorflow", "pytorch", "scikit-learn", "tableau", "power bi"],
    ),
    (
        "mobile",
        &["react native", "flutter", "ios", "android", "swift", "kotlin"],
    ),
    ("tools", &["git", "jenkins", "jira", "confluence", "figma"]),
];

const INDUSTRY_TABLE: &[(&str, &[&str])] = &[
    ("fintech", &["fintech", "finance", "banking", "payments", "trading", "investment"]),
    ("healthcare", &["healthcare", "medical", "hospital", "pharma", "biotech"]),
    ("e-commerce", &["e-commerce", "ecommerce", "retail", "shopping", "marketplace"]),
    ("saas", &["saas", "b2b", "subscription", "enterprise software"]),
    ("gaming", &["gaming", "games", "console", "unity", "unreal"]),
    ("education", &["education", "edtech", "e-learning", "university", "school"]),
];

const SENIOR_MARKERS: &str =
    r"\b(senior|sr\.?|lead|principal|staff|architect|director|head\s+of|vp|vice\s+president)\b";
const MID_MARKERS: &str = r"\b(mid|mid-level|intermediate)\b";
const JUNIOR_MARKERS: &str = r"\b(junior|jr\.?|associate|intern|trainee|graduate)\b";
const YEARS_PATTERN: &str = r"\b(\d{1,2})\s*\+?\s*(?:-\s*\d{1,2}\s*)?(?:years?|yrs?)\b";

const COMPANY_AFTER_INDICATOR: &str = r"(?:\b(?i:worked\s+at|employed\s+by|joined|at|with|for))\s+([A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*){0,3})";
const COMPANY_WITH_SUFFIX: &str = r"\b([A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*){0,3}\s+(?:Inc|LLC|Corp|Ltd|Co|Company|Technologies|Solutions|Systems|Group|Labs)\b\.?)";

const PROJECT_VERBS: &str = r"(?i)\b(built|developed|created|designed|implemented|engineered|launched|architected|shipped|prototyped)\b";
const ACHIEVEMENT_VERBS: &str = r"(?i)\b(increased|improved|boosted|grew|reduced|decreased|cut|saved|generated|achieved|exceeded|delivered|scaled)\b";
const QUANTIFIER: &str = r"(?i)(\d+(?:\.\d+)?\s*%|\b\d+(?:\.\d+)?x\b|\$\s?\d[\d,.]*\s*(?:k|m|bn|million|billion)?|\b\d[\d,]*\s*(?:million|thousand|users|customers|clients|leads|projects|requests|transactions)\b)";

/// Sentence boundary: terminal punctuation followed by whitespace/end, or a line break.
const SENTENCE_BREAK: &str = r"[.!?]+(?:\s+|$)|[\r\n]+|\s[•·▪]\s";

const PROJECT_LEN: (usize, usize) = (30, 200);
const ACHIEVEMENT_LEN: (usize, usize) = (20, 200);
const COMPANY_LEN: (usize, usize) = (3, 50);

/// Words that look like capitalized company names after "at"/"for" but are not.
const COMPANY_STOPWORDS: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "The", "A", "An", "Present", "Scale", "Least",
];

/// A compiled keyword table entry.
#[derive(Debug)]
struct Keyword {
    label: String,
    pattern: Regex,
}

/// All regexes and keyword tables used by the extractor.
#[derive(Debug)]
pub struct ProfileRules {
    skills: Vec<Keyword>,
    industries: Vec<(String, Vec<Keyword>)>,
    senior: Regex,
    mid: Regex,
    junior: Regex,
    years: Regex,
    company_patterns: Vec<Regex>,
    project_verbs: Regex,
    achievement_verbs: Regex,
    quantifier: Regex,
    sentence_break: Regex,
}

static DEFAULT_RULES: LazyLock<ProfileRules> =
    LazyLock::new(|| ProfileRules::new(SKILL_TABLE, INDUSTRY_TABLE));

impl ProfileRules {
    /// Compiles the given skill and industry tables together with the fixed
    /// seniority, company, project and achievement patterns.
    pub fn new(skill_table: &[(&str, &[&str])], industry_table: &[(&str, &[&str])]) -> Self {
        let skills = skill_table
            .iter()
            .flat_map(|(_, skills)| skills.iter())
            .map(|skill| keyword(skill))
            .collect();

        let industries = industry_table
            .iter()
            .map(|(industry, words)| {
                (
                    industry.to_string(),
                    words.iter().map(|w| keyword(w)).collect(),
                )
            })
            .collect();

        Self {
            skills,
            industries,
            senior: compile(SENIOR_MARKERS),
            mid: compile(MID_MARKERS),
            junior: compile(JUNIOR_MARKERS),
            years: compile(YEARS_PATTERN),
            company_patterns: vec![compile(COMPANY_AFTER_INDICATOR), compile(COMPANY_WITH_SUFFIX)],
            project_verbs: compile(PROJECT_VERBS),
            achievement_verbs: compile(ACHIEVEMENT_VERBS),
            quantifier: compile(QUANTIFIER),
            sentence_break: compile(SENTENCE_BREAK),
        }
    }
}

impl Default for ProfileRules {
    fn default() -> Self {
        Self::new(SKILL_TABLE, INDUSTRY_TABLE)
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

/// Matches a keyword on non-alphanumeric boundaries so "go" never matches "good"
/// and "java" never matches "javascript".
fn keyword(word: &str) -> Keyword {
    let pattern = format!(r"(?:^|[^a-z0-9]){}(?:$|[^a-z0-9+#])", regex::escape(word));
    Keyword {
        label: word.to_string(),
        pattern: compile(&pattern),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

/// Extracts a profile using the built-in tables.
pub fn extract(resume_text: &str) -> ResumeProfile {
    extract_with(resume_text, &DEFAULT_RULES)
}

/// Extracts a profile using caller-supplied rules.
pub fn extract_with(resume_text: &str, rules: &ProfileRules) -> ResumeProfile {
    let trimmed = resume_text.trim();
    if trimmed.chars().count() < MIN_RESUME_CHARS {
        return ResumeProfile::default();
    }

    let lower = trimmed.to_lowercase();
    let sentences: Vec<&str> = rules
        .sentence_break
        .split(trimmed)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    ResumeProfile {
        experience_level: detect_experience(&lower, rules),
        key_skills: detect_skills(&lower, rules),
        projects: collect_sentences(&sentences, PROJECT_LEN, MAX_PROJECTS, |s| {
            rules.project_verbs.is_match(s)
        }),
        companies: detect_companies(trimmed, rules),
        achievements: collect_sentences(&sentences, ACHIEVEMENT_LEN, MAX_ACHIEVEMENTS, |s| {
            rules.achievement_verbs.is_match(s) && rules.quantifier.is_match(s)
        }),
        industries: detect_industries(&lower, rules),
    }
}

/// Takes the max of the explicit "N years" mention and the keyword-implied level.
fn detect_experience(lower: &str, rules: &ProfileRules) -> ExperienceLevel {
    let max_years = rules
        .years
        .captures_iter(lower)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    let keyword_level = if rules.senior.is_match(lower) {
        ExperienceLevel::Senior
    } else if rules.mid.is_match(lower) {
        ExperienceLevel::Mid
    } else if rules.junior.is_match(lower) {
        ExperienceLevel::Junior
    } else {
        ExperienceLevel::Entry
    };

    keyword_level.max(ExperienceLevel::from_years(max_years))
}

fn detect_skills(lower: &str, rules: &ProfileRules) -> Vec<String> {
    let mut skills = Vec::new();
    for skill in &rules.skills {
        if skill.pattern.is_match(lower) {
            push_unique(&mut skills, skill.label.clone(), MAX_SKILLS);
        }
    }
    skills
}

fn detect_industries(lower: &str, rules: &ProfileRules) -> Vec<String> {
    let mut industries = Vec::new();
    for (industry, words) in &rules.industries {
        if words.iter().any(|w| w.pattern.is_match(lower)) {
            push_unique(&mut industries, industry.clone(), MAX_INDUSTRIES);
        }
    }
    industries
}

fn detect_companies(original: &str, rules: &ProfileRules) -> Vec<String> {
    let mut companies = Vec::new();

    for pattern in &rules.company_patterns {
        for captures in pattern.captures_iter(original) {
            let Some(name) = captures.get(1) else {
                continue;
            };
            let name = name.as_str().trim().trim_end_matches(',').to_string();
            let len = name.chars().count();
            if len < COMPANY_LEN.0 || len > COMPANY_LEN.1 {
                continue;
            }
            if COMPANY_STOPWORDS.contains(&name.as_str()) || is_skill_name(&name, rules) {
                continue;
            }
            push_unique(&mut companies, name, MAX_COMPANIES);
        }
    }

    companies
}

fn is_skill_name(name: &str, rules: &ProfileRules) -> bool {
    let lower = name.to_lowercase();
    rules.skills.iter().any(|s| s.label == lower)
}

fn collect_sentences<F>(sentences: &[&str], len: (usize, usize), cap: usize, keep: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut out = Vec::new();
    for sentence in sentences {
        let chars = sentence.chars().count();
        if chars >= len.0 && chars <= len.1 && keep(sentence) {
            push_unique(&mut out, sentence.to_string(), cap);
        }
    }
    out
}

/// Appends when not already present (exact match) and below the cap.
fn push_unique(list: &mut Vec<String>, item: String, cap: usize) {
    if list.len() < cap && !list.contains(&item) {
        list.push(item);
    }
}
