use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::interview::session::{DEFAULT_MAX_QUESTIONS, MAX_QUESTIONS, MIN_QUESTIONS};
use crate::voice::TtsProvider;

/// Speed range accepted by the OpenAI speech endpoint.
const TTS_SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Unset → sessions live in process memory.
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
    /// Unset → batch transcription is disabled.
    pub openai_api_key: Option<String>,
    pub transcription_model: String,
    pub tts_provider: TtsProvider,
    /// Unset → the provider's default voice.
    pub tts_voice: Option<String>,
    /// Unset → the provider's default model.
    pub tts_model: Option<String>,
    pub tts_speed: f32,
    /// Required only when `TTS_PROVIDER=elevenlabs`.
    pub elevenlabs_api_key: Option<String>,
    pub default_max_questions: u32,
    pub question_timeout: Duration,
    pub evaluation_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let default_max_questions = parse_env("DEFAULT_MAX_QUESTIONS", DEFAULT_MAX_QUESTIONS)?;
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&default_max_questions) {
            bail!("DEFAULT_MAX_QUESTIONS must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}");
        }

        let tts_provider = match optional_env("TTS_PROVIDER") {
            Some(name) => TtsProvider::from_name(&name).with_context(|| {
                format!("TTS_PROVIDER must be 'openai' or 'elevenlabs', got '{name}'")
            })?,
            None => TtsProvider::OpenAi,
        };
        let tts_speed: f32 = parse_env("TTS_SPEED", 1.0)?;
        if !TTS_SPEED_RANGE.contains(&tts_speed) {
            bail!("TTS_SPEED must be between 0.25 and 4.0");
        }

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            redis_url: optional_env("REDIS_URL"),
            session_ttl: Duration::from_secs(parse_env("SESSION_TTL_SECS", 86_400)?),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            transcription_model: optional_env("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_provider,
            tts_voice: optional_env("TTS_VOICE"),
            tts_model: optional_env("TTS_MODEL"),
            tts_speed,
            elevenlabs_api_key: optional_env("ELEVENLABS_API_KEY"),
            default_max_questions,
            question_timeout: Duration::from_secs(parse_env("QUESTION_TIMEOUT_SECS", 30)?),
            evaluation_timeout: Duration::from_secs(parse_env("EVALUATION_TIMEOUT_SECS", 120)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Set and non-blank, otherwise `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        anthropic_api_key: "test-key".to_string(),
        port: 0,
        rust_log: "info".to_string(),
        redis_url: None,
        session_ttl: Duration::from_secs(60),
        openai_api_key: None,
        transcription_model: "whisper-1".to_string(),
        tts_provider: TtsProvider::OpenAi,
        tts_voice: None,
        tts_model: None,
        tts_speed: 1.0,
        elevenlabs_api_key: None,
        default_max_questions: DEFAULT_MAX_QUESTIONS,
        question_timeout: Duration::from_secs(30),
        evaluation_timeout: Duration::from_secs(120),
    }
}
