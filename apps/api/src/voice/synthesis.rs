//! Server-side text-to-speech over OpenAI or ElevenLabs.
//!
//! The browser plays the returned MP3; nothing is written to disk.

use async_trait::async_trait;
use serde::Serialize;

use super::{AudioSynthesizer, VoiceError};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_SPEECH_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

pub const DEFAULT_OPENAI_VOICE: &str = "alloy";
pub const DEFAULT_OPENAI_MODEL: &str = "tts-1";
pub const DEFAULT_ELEVENLABS_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_monolingual_v1";

/// Longest text accepted in one synthesis request.
pub const MAX_SPEECH_CHARS: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAi,
    ElevenLabs,
}

impl TtsProvider {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "elevenlabs" => Some(Self::ElevenLabs),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct OpenAiSpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

#[derive(Serialize)]
struct ElevenLabsSpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    pub fn new_openai(
        api_key: String,
        voice: Option<String>,
        model: Option<String>,
        speed: f32,
    ) -> Result<Self, VoiceError> {
        Self::build(
            TtsProvider::OpenAi,
            api_key,
            voice.unwrap_or_else(|| DEFAULT_OPENAI_VOICE.to_string()),
            model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            speed,
        )
    }

    /// ElevenLabs has no speed control; `voice` is a voice id.
    pub fn new_elevenlabs(
        api_key: String,
        voice: Option<String>,
        model: Option<String>,
    ) -> Result<Self, VoiceError> {
        Self::build(
            TtsProvider::ElevenLabs,
            api_key,
            voice.unwrap_or_else(|| DEFAULT_ELEVENLABS_VOICE.to_string()),
            model.unwrap_or_else(|| DEFAULT_ELEVENLABS_MODEL.to_string()),
            1.0,
        )
    }

    fn build(
        provider: TtsProvider,
        api_key: String,
        voice: String,
        model: String,
        speed: f32,
    ) -> Result<Self, VoiceError> {
        if api_key.trim().is_empty() {
            return Err(VoiceError::Unavailable(format!(
                "{provider:?} API key required for speech synthesis"
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider,
        })
    }

    pub fn provider(&self) -> TtsProvider {
        self.provider
    }

    fn openai_request<'a>(&'a self, text: &'a str, voice: &'a str) -> OpenAiSpeechRequest<'a> {
        OpenAiSpeechRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
        }
    }

    async fn synthesize_openai(&self, text: &str, voice: &str) -> Result<Vec<u8>, VoiceError> {
        let response = self
            .client
            .post(OPENAI_SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.openai_request(text, voice))
            .send()
            .await?;
        read_audio(response).await
    }

    async fn synthesize_elevenlabs(&self, text: &str, voice: &str) -> Result<Vec<u8>, VoiceError> {
        let request = ElevenLabsSpeechRequest {
            text,
            model_id: &self.model,
        };
        let response = self
            .client
            .post(format!("{ELEVENLABS_SPEECH_URL}/{voice}"))
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        read_audio(response).await
    }
}

async fn read_audio(response: reqwest::Response) -> Result<Vec<u8>, VoiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "speech synthesis API error");
        return Err(VoiceError::Synthesis(format!("synthesis API error {status}")));
    }
    let audio = response.bytes().await?;
    if audio.is_empty() {
        return Err(VoiceError::Synthesis("synthesis returned no audio".to_string()));
    }
    Ok(audio.to_vec())
}

#[async_trait]
impl AudioSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, VoiceError> {
        let voice = voice
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.voice.as_str());
        tracing::debug!(
            chars = text.len(),
            provider = ?self.provider,
            voice,
            "synthesizing speech"
        );

        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text, voice).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text, voice).await,
        }
    }
}
