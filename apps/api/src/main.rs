mod config;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod state;
mod voice;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::interview::store::{InMemorySessionStore, RedisSessionStore, SessionStore};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::voice::{
    AudioSynthesizer, BatchTranscriber, TextToSpeech, TtsProvider, WhisperTranscriber,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.question_timeout,
        config.evaluation_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Session store: Redis when configured, otherwise process memory
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis session store initialized (ttl: {:?})", config.session_ttl);
            Arc::new(RedisSessionStore::new(client, config.session_ttl))
        }
        None => {
            info!("REDIS_URL not set; sessions are kept in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    // Batch transcription is optional
    let transcriber: Option<Arc<dyn BatchTranscriber>> = match &config.openai_api_key {
        Some(key) => {
            let whisper = WhisperTranscriber::new(key.clone(), config.transcription_model.clone())?;
            info!("Batch transcription enabled (model: {})", config.transcription_model);
            Some(Arc::new(whisper))
        }
        None => {
            info!("OPENAI_API_KEY not set; batch transcription disabled");
            None
        }
    };

    // Server-side speech synthesis is optional
    let synthesizer: Option<Arc<dyn AudioSynthesizer>> = match build_synthesizer(&config)? {
        Some(tts) => {
            info!("Speech synthesis enabled (provider: {:?})", tts.provider());
            Some(Arc::new(tts))
        }
        None => {
            info!("No API key for {:?}; speech synthesis disabled", config.tts_provider);
            None
        }
    };

    // Build app state
    let state = AppState {
        llm: Arc::new(llm),
        sessions,
        transcriber,
        synthesizer,
        config: config.clone(),
    };

    // Build router
    // TODO: restrict origins once the web client has a fixed host
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_synthesizer(config: &Config) -> Result<Option<TextToSpeech>> {
    let tts = match config.tts_provider {
        TtsProvider::OpenAi => match &config.openai_api_key {
            Some(key) => Some(TextToSpeech::new_openai(
                key.clone(),
                config.tts_voice.clone(),
                config.tts_model.clone(),
                config.tts_speed,
            )?),
            None => None,
        },
        TtsProvider::ElevenLabs => match &config.elevenlabs_api_key {
            Some(key) => Some(TextToSpeech::new_elevenlabs(
                key.clone(),
                config.tts_voice.clone(),
                config.tts_model.clone(),
            )?),
            None => None,
        },
    };
    Ok(tts)
}
