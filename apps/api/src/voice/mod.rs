//! Voice I/O
//!
//! Speech playback, live recognition with a batch transcription pass, and the
//! coordinator arbitrating between them. Engines sit behind traits so hosts
//! can plug in whatever the platform provides. The HTTP server wires batch
//! transcription and speech synthesis; the coordinator runs in the client host.

#![allow(dead_code)]

pub mod coordinator;
mod synthesis;
mod transcription;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use coordinator::clean_for_speech;
pub use synthesis::{TextToSpeech, TtsProvider, MAX_SPEECH_CHARS};
pub use transcription::WhisperTranscriber;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Audio capture error: {0}")]
    Capture(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Voice backend unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Text emitted by a live recognizer. Final segments are committed; partials
/// replace the previous partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Partial(String),
    Final(String),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Resolves when playback ends or is cancelled.
    async fn speak(&self, text: &str) -> Result<(), VoiceError>;
    /// Stops current playback. A pending `speak` must resolve promptly.
    fn cancel(&self);
}

#[async_trait]
pub trait LiveRecognizer: Send + Sync {
    /// Starts a recognition session; events arrive until `stop` is called.
    async fn start(&self) -> Result<mpsc::Receiver<RecognitionEvent>, VoiceError>;
    async fn stop(&self);
}

#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn start(&self) -> Result<(), VoiceError>;
    /// Stops capturing and returns the audio recorded since `start`.
    async fn stop(&self) -> Result<Vec<u8>, VoiceError>;
}

/// Higher-accuracy transcription over a complete recording.
#[async_trait]
pub trait BatchTranscriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError>;
}

/// Renders text to encoded audio (MP3) for playback on another device.
#[async_trait]
pub trait AudioSynthesizer: Send + Sync {
    /// `voice` overrides the configured voice for this request.
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, VoiceError>;
}
