//! Prompt Builder: every prompt the interview sends to the Generation Service.
//!
//! Pure functions of their inputs: no randomness, no I/O.

use crate::errors::InterviewError;
use crate::interview::profile::ResumeProfile;
use crate::interview::session::Phase;
use crate::llm_client::prompts::ONE_QUESTION_RULES;
use crate::models::transcript::{qa_pairs, Turn};

/// Persona and focus for a domain the interviewer knows well.
#[derive(Debug, Clone, Copy)]
pub struct DomainTemplate {
    pub domain: &'static str,
    pub focus: &'static str,
    pub style: &'static str,
    pub scenarios: &'static [&'static str],
}

const GENERIC_FOCUS: &str = "relevant skills and professional experience";
const GENERIC_STYLE: &str =
    "be professional yet conversational, showing genuine interest in their background";

pub const DOMAIN_TEMPLATES: &[DomainTemplate] = &[
    DomainTemplate {
        domain: "Software Engineer",
        focus: "system design, code quality, debugging, technical decisions, scalability, and architecture",
        style: "act like a senior tech lead who values clean code, smart solutions, and practical engineering",
        scenarios: &[
            "How would you design a system to handle 1 million concurrent users?",
            "A service is responding slowly in production. Walk me through your debugging process.",
            "You need to migrate a legacy monolith to microservices. What's your approach?",
        ],
    },
    DomainTemplate {
        domain: "Data Analyst",
        focus: "data interpretation, statistical thinking, business insights, visualization, and analytical frameworks",
        style: "be like a curious data detective who loves uncovering stories in numbers and driving business impact",
        scenarios: &[
            "Sales dropped 25% last month. How would you investigate the root cause?",
            "Design an A/B test to improve website conversion rates. What would you measure?",
            "You find conflicting data from two different sources. How do you resolve this?",
        ],
    },
    DomainTemplate {
        domain: "Product Manager",
        focus: "user empathy, strategic thinking, prioritization, cross-functional leadership, and business impact",
        style: "think like a strategic product leader who balances user needs with business goals and technical constraints",
        scenarios: &[
            "Engineering says a feature will take 6 months, but sales needs it in 2. How do you handle this?",
            "User retention dropped 15% after your last release. How do you investigate and respond?",
            "You have limited engineering resources. How do you prioritize new features against technical debt?",
        ],
    },
    DomainTemplate {
        domain: "Consultant",
        focus: "structured problem-solving, client communication, analytical frameworks, and business impact",
        style: "approach like a strategic advisor who breaks complex problems into clear, actionable solutions",
        scenarios: &[
            "A retail client's profits dropped 30% and you have 2 weeks to present initial findings. What's your approach?",
            "The client's CEO disagrees with your data-driven recommendation. How do you handle this?",
            "How would you help a company decide between building in-house, buying, or partnering?",
        ],
    },
    DomainTemplate {
        domain: "Marketing",
        focus: "customer insights, campaign strategy, growth metrics, creative execution, and ROI optimization",
        style: "think like a growth-focused marketer who combines creative storytelling with data-driven optimization",
        scenarios: &[
            "Customer acquisition costs increased 50% overnight. How do you diagnose and respond?",
            "Launch a new product in a saturated market with a limited budget. What's your strategy?",
            "How do you balance brand building with performance marketing when budgets are tight?",
        ],
    },
    DomainTemplate {
        domain: "Sales",
        focus: "relationship building, deal strategy, objection handling, pipeline management, and revenue growth",
        style: "engage like a consultative sales leader who builds trust through deep customer understanding",
        scenarios: &[
            "A qualified prospect goes silent after 3 months of engagement. What's your approach?",
            "You're 40% behind quota with 2 months left in the year. What's your plan?",
            "A long-term customer wants to cancel their contract. How do you handle the conversation?",
        ],
    },
];

/// Tracks offered at onboarding that use the generic persona.
const GENERIC_DOMAINS: &[&str] = &[
    "Software Engineering",
    "Data Science",
    "Product Management",
    "UI/UX Design",
    "Cybersecurity",
    "Cloud Computing",
    "DevOps",
    "Machine Learning",
    "AI Research",
];

const CONVERSATION_STARTERS: &[&str] = &[
    "I'm excited to learn about your background. Tell me your story and what drew you to this role.",
    "Let's start with you. I'd love to hear about your journey and what interests you about this opportunity.",
    "Before we dive into the details, help me understand your background and motivation.",
    "I've reviewed your resume and I'm curious. Walk me through your career journey so far.",
    "Tell me about yourself and what excites you most about the work you do.",
];

/// Every domain accepted at onboarding, templated domains first.
pub fn supported_domains() -> Vec<&'static str> {
    DOMAIN_TEMPLATES
        .iter()
        .map(|t| t.domain)
        .chain(GENERIC_DOMAINS.iter().copied())
        .collect()
}

pub fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.trim();
    DOMAIN_TEMPLATES.iter().any(|t| t.domain == domain) || GENERIC_DOMAINS.contains(&domain)
}

pub fn domain_template(domain: &str) -> Option<&'static DomainTemplate> {
    DOMAIN_TEMPLATES.iter().find(|t| t.domain == domain.trim())
}

/// Opening line picked by domain so the prompt stays a pure function.
fn conversation_starter(domain: &str) -> &'static str {
    let index = domain.bytes().map(usize::from).sum::<usize>() % CONVERSATION_STARTERS.len();
    CONVERSATION_STARTERS[index]
}

fn numbered_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        return fallback.to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn joined_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

/// Builds the interviewer system prompt for a domain and resume profile.
pub fn build_interview_prompt(
    domain: &str,
    profile: &ResumeProfile,
    max_questions: u32,
) -> Result<String, InterviewError> {
    if !is_valid_domain(domain) {
        return Err(InterviewError::InvalidDomain(domain.to_string()));
    }
    let domain = domain.trim();

    let (focus, style) = domain_template(domain)
        .map(|t| (t.focus, t.style))
        .unwrap_or((GENERIC_FOCUS, GENERIC_STYLE));

    let level = profile.experience_level;
    let scenarios = domain_template(domain)
        .map(|t| {
            t.scenarios
                .iter()
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "- Practical, role-specific problems the candidate is likely to face".to_string());

    Ok(format!(
        r#"You are conducting a {domain} interview. {style}.

CANDIDATE PROFILE:
Experience Level: {level_label} ({guidance})
Key Skills: {skills}
Companies: {companies}
Industries: {industries}

PROJECTS TO REFERENCE:
{projects}

ACHIEVEMENTS TO EXPLORE:
{achievements}

INTERVIEW STRATEGY:
Focus Areas: {focus}
Example scenarios for the domain phase (adapt, do not read verbatim):
{scenarios}

PHASE STRUCTURE:
1. OPENING: "{starter}"
2. RESUME DEEP DIVE: projects, technologies, companies, or achievements from the profile
3. DOMAIN EXPERTISE: role-specific scenarios
4. BEHAVIORAL: leadership, teamwork, handling challenges
5. CLOSING: career goals and the candidate's own questions

CONVERSATION STYLE:
- Briefly acknowledge the previous answer before asking, and vary the acknowledgement.
- Avoid repeating the same project or skill.
- For a minimal resume, ask about coursework, personal projects and motivation.
- Sound genuinely curious, not robotic.

{rules}
- You have a strict limit of {max_questions} questions. Cover every phase within it and stop after question {max_questions}."#,
        level_label = level.label(),
        guidance = level.guidance(),
        skills = joined_or(&profile.key_skills, "Various technologies"),
        companies = joined_or(&profile.companies, "Previous work experience"),
        industries = joined_or(&profile.industries, "Cross-industry experience"),
        projects = numbered_or(&profile.projects, "Various projects mentioned in background"),
        achievements = numbered_or(&profile.achievements, "Professional accomplishments"),
        starter = conversation_starter(domain),
        rules = ONE_QUESTION_RULES,
    ))
}

/// Natural-language instruction for the next question. Phase names are never
/// shown to the model.
pub fn phase_instruction(phase: Phase, domain: &str) -> String {
    match phase {
        Phase::Opening => {
            "Start the interview: greet the candidate briefly and ask a friendly question about their background or motivation.".to_string()
        }
        Phase::ResumeDeepDive => {
            "Ask about a project, skill, or achievement mentioned in their background.".to_string()
        }
        Phase::DomainSpecific => {
            format!("Ask a practical question about {domain} or problem-solving in that field.")
        }
        Phase::Behavioral => {
            "Ask about teamwork, leadership, or how they handled challenges.".to_string()
        }
        Phase::Closing => {
            "Ask a closing question about their future goals or whether they have any questions.".to_string()
        }
    }
}

/// Instruction used after a weak answer: same phase, simpler wording.
pub fn retry_instruction(phase: Phase, domain: &str) -> String {
    format!(
        "The candidate could not answer the last question. Do not move on. {} Rephrase the previous question more simply, or ask an easier question on the same topic, and encourage them to give it a try.",
        phase_instruction(phase, domain)
    )
}

/// Instruction used when the model repeated an earlier question.
pub fn distinct_question_instruction(phase: Phase, domain: &str, repeated: &str) -> String {
    format!(
        "{} You already asked: \"{repeated}\". Ask a clearly different question.",
        phase_instruction(phase, domain)
    )
}

/// Builds the evaluation request: the Q/A transcript plus a strict JSON schema.
pub fn build_evaluation_prompt(
    transcript: &[Turn],
    domain: &str,
    profile: &ResumeProfile,
    ended_early: bool,
) -> String {
    let brief = qa_pairs(transcript)
        .iter()
        .enumerate()
        .map(|(i, pair)| format!("Q{}: {}\nAnswer: {}", i + 1, pair.question, pair.answer))
        .collect::<Vec<_>>()
        .join("\n\n");

    let early_note = if ended_early {
        "\nThe interview ended early. Judge ONLY the answers provided below; do not penalise unanswered phases.\n"
    } else {
        ""
    };

    format!(
        r#"You are an experienced {domain} interviewer and coach.
The candidate is {level}. Review the candidate's answers below.
Respond ONLY with strict JSON (no markdown, no commentary) matching this schema:
{{
  "score": {{
    "overall": number,
    "communication": number,
    "technical": number,
    "problemSolving": number,
    "behavioral": number
  }},
  "summary": string,
  "strengths": [string],
  "weaknesses": [string],
  "questions": [
    {{ "question": string, "yourAnswer": string, "suggestedAnswer": string, "notes": string, "score": number }}
  ]
}}

Rules:
- Fill all fields.
- "overall" and every category score are 0-100. Per-question "score" is 0-10.
- "summary" is 3-5 sentences of feedback.
- "strengths" and "weaknesses" contain at least 2 items each.
- "questions" has exactly one entry per answer below, in order.
- "suggestedAnswer" is a short, improved version of the candidate's answer.
- Output pure JSON with no surrounding prose.
{early_note}
Answers:
{brief}"#,
        level = profile.experience_level.label(),
    )
}
