//! Batch transcription over an OpenAI Whisper-compatible endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::{BatchTranscriber, VoiceError};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: String, model: String) -> Result<Self, VoiceError> {
        if api_key.trim().is_empty() {
            return Err(VoiceError::Unavailable(
                "API key required for batch transcription".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Points the adapter at another Whisper-compatible server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Guesses a file name from the container magic so the server picks the right decoder.
fn audio_file_name(audio: &[u8]) -> (&'static str, &'static str) {
    match audio {
        [b'R', b'I', b'F', b'F', ..] => ("audio.wav", "audio/wav"),
        [b'O', b'g', b'g', b'S', ..] => ("audio.ogg", "audio/ogg"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => ("audio.webm", "audio/webm"),
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] => ("audio.mp3", "audio/mpeg"),
        _ => ("audio.webm", "audio/webm"),
    }
}

#[async_trait]
impl BatchTranscriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        tracing::debug!(audio_bytes = audio.len(), "starting batch transcription");

        let (file_name, mime) = audio_file_name(audio);
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(file_name)
                    .mime_str(mime)
                    .map_err(|e| VoiceError::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(VoiceError::Transcription(format!(
                "transcription API error {status}"
            )));
        }

        let result: WhisperResponse = response.json().await?;
        tracing::debug!(chars = result.text.len(), "transcription complete");
        Ok(result.text.trim().to_string())
    }
}
