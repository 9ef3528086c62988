//! Voice I/O coordinator.
//!
//! Arbitrates between speech playback and capture:
//! `Idle → Speaking → Idle` on `speak`, `Idle → Listening → Transcribing → Idle`
//! on `listen` + `stop`. At most one listen session exists at a time; a new
//! `listen` fully tears down the previous one (cancel + await) before starting,
//! so a dangling recognizer can never double-emit partial text.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use regex::Regex;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{
    AudioCapture, BatchTranscriber, LiveRecognizer, RecognitionEvent, SpeechSynthesizer,
    VoiceError,
};

pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(120);

/// Receives the running transcript while the candidate is speaking.
pub type PartialCallback = Arc<dyn Fn(&str) + Send + Sync>;

static FILLER_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:um+|uh+)\b[,.]?").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VoicePhase {
    #[default]
    Idle,
    Speaking,
    Listening,
    Transcribing,
}

/// Snapshot exposed to the UI. Never both speaking and listening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub speaking: bool,
    pub listening: bool,
    pub transcript: String,
    pub last_error: Option<String>,
}

enum StopReason {
    Stop,
    Cancel,
    Timeout,
}

struct StopRequest {
    reason: StopReason,
    reply: oneshot::Sender<String>,
}

#[derive(Default)]
struct Inner {
    phase: VoicePhase,
    transcript: String,
    last_error: Option<String>,
    speech_epoch: u64,
    listen_epoch: u64,
    /// Taken by whoever ends the session first: `stop`, a teardown, or the timeout.
    stop_tx: Option<(u64, oneshot::Sender<StopRequest>)>,
    session_task: Option<JoinHandle<()>>,
}

struct Shared {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn LiveRecognizer>,
    capture: Arc<dyn AudioCapture>,
    transcriber: Option<Arc<dyn BatchTranscriber>>,
    listen_timeout: Duration,
    inner: Mutex<Inner>,
}

#[derive(Clone)]
pub struct VoiceCoordinator {
    shared: Arc<Shared>,
    /// Serializes teardown-then-start so overlapping calls cannot interleave.
    gate: Arc<AsyncMutex<()>>,
}

impl VoiceCoordinator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn LiveRecognizer>,
        capture: Arc<dyn AudioCapture>,
        transcriber: Option<Arc<dyn BatchTranscriber>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                synthesizer,
                recognizer,
                capture,
                transcriber,
                listen_timeout: DEFAULT_LISTEN_TIMEOUT,
                inner: Mutex::new(Inner::default()),
            }),
            gate: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Must be called before the coordinator is cloned or used.
    pub fn with_listen_timeout(mut self, timeout: Duration) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.listen_timeout = timeout;
        }
        self
    }

    pub fn phase(&self) -> VoicePhase {
        self.shared.lock().phase
    }

    pub fn state(&self) -> VoiceState {
        let inner = self.shared.lock();
        VoiceState {
            speaking: inner.phase == VoicePhase::Speaking,
            listening: inner.phase == VoicePhase::Listening,
            transcript: inner.transcript.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    /// Speaks `text`, cancelling any speech or listening in flight. Resolves when
    /// playback ends. Playback errors are logged and recorded, never returned.
    pub async fn speak(&self, text: &str) {
        let text = clean_for_speech(text);
        if text.is_empty() {
            return;
        }
        let epoch = {
            let _gate = self.gate.lock().await;
            self.teardown_listen().await;
            self.shared.begin_speech()
        };

        // A listen or stop that slipped in after the gate was released owns the
        // devices now; its cancel has already fired and would not reach us.
        if self.shared.lock().speech_epoch != epoch {
            debug!("Speech superseded before playback started");
            return;
        }
        let result = self.shared.synthesizer.speak(&text).await;
        self.shared.end_speech(epoch, result.err());
    }

    pub fn stop_speaking(&self) {
        self.shared.synthesizer.cancel();
        let mut inner = self.shared.lock();
        inner.speech_epoch += 1;
        if inner.phase == VoicePhase::Speaking {
            inner.phase = VoicePhase::Idle;
        }
    }

    /// Listens until `stop`, a newer `listen`, a teardown, or the timeout.
    ///
    /// Returns the authoritative transcript: the batch transcription after
    /// `stop`, otherwise the last live text. Failures fall back to partial text
    /// or an empty string.
    pub async fn listen(&self, on_partial: PartialCallback) -> String {
        let result_rx = {
            let _gate = self.gate.lock().await;
            self.teardown_listen().await;
            self.stop_speaking();

            let events = match self.shared.recognizer.start().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Live recognizer failed to start: {e}");
                    self.shared.record_error(&e);
                    return String::new();
                }
            };
            if let Err(e) = self.shared.capture.start().await {
                warn!("Audio capture failed to start, live text only: {e}");
                self.shared.record_error(&e);
            }

            Shared::begin_session(&self.shared, events, on_partial)
        };

        result_rx.await.unwrap_or_default()
    }

    /// Ends the active listen session and returns its authoritative transcript.
    /// Returns an empty string when nothing is being listened to.
    pub async fn stop(&self) -> String {
        let Some(stop_tx) = self.shared.take_stop_handle(None) else {
            return String::new();
        };
        let (reply, reply_rx) = oneshot::channel();
        if stop_tx
            .send(StopRequest {
                reason: StopReason::Stop,
                reply,
            })
            .is_err()
        {
            return String::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Cancels speech and listening. Idempotent and safe from `Idle`.
    pub async fn teardown(&self) {
        self.stop_speaking();
        let _gate = self.gate.lock().await;
        self.teardown_listen().await;
    }

    /// Cancels the current listen session, if any, and waits until it is gone.
    async fn teardown_listen(&self) {
        if let Some(stop_tx) = self.shared.take_stop_handle(None) {
            let (reply, reply_rx) = oneshot::channel();
            if stop_tx
                .send(StopRequest {
                    reason: StopReason::Cancel,
                    reply,
                })
                .is_ok()
            {
                let _ = reply_rx.await;
            }
        }
        let task = self.shared.lock().session_task.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_error(&self, error: &VoiceError) {
        self.lock().last_error = Some(error.to_string());
    }

    fn begin_speech(&self) -> u64 {
        self.synthesizer.cancel();
        let mut inner = self.lock();
        inner.speech_epoch += 1;
        inner.phase = VoicePhase::Speaking;
        inner.speech_epoch
    }

    fn end_speech(&self, epoch: u64, error: Option<VoiceError>) {
        let mut inner = self.lock();
        if let Some(e) = error {
            warn!("Speech playback failed: {e}");
            inner.last_error = Some(e.to_string());
        }
        // A newer speak or listen owns the phase now.
        if inner.speech_epoch == epoch && inner.phase == VoicePhase::Speaking {
            inner.phase = VoicePhase::Idle;
        }
    }

    fn begin_session(
        shared: &Arc<Self>,
        events: mpsc::Receiver<RecognitionEvent>,
        on_partial: PartialCallback,
    ) -> oneshot::Receiver<String> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();

        let mut inner = shared.lock();
        inner.listen_epoch += 1;
        let epoch = inner.listen_epoch;
        inner.phase = VoicePhase::Listening;
        inner.transcript.clear();
        inner.stop_tx = Some((epoch, stop_tx));
        inner.session_task = Some(tokio::spawn(run_session(
            Arc::clone(shared),
            epoch,
            events,
            stop_rx,
            result_tx,
            on_partial,
        )));
        debug!("Listen session {epoch} started");

        result_rx
    }

    /// Takes the stop handle, optionally only if it belongs to `epoch`.
    fn take_stop_handle(&self, epoch: Option<u64>) -> Option<oneshot::Sender<StopRequest>> {
        let mut inner = self.lock();
        if let (Some((owner, _)), Some(epoch)) = (&inner.stop_tx, epoch) {
            if *owner != epoch {
                return None;
            }
        }
        inner.stop_tx.take().map(|(_, tx)| tx)
    }

    fn set_live_transcript(&self, epoch: u64, text: &str) {
        let mut inner = self.lock();
        if inner.listen_epoch == epoch {
            inner.transcript = text.to_string();
        }
    }

    fn set_transcribing(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.listen_epoch == epoch {
            inner.phase = VoicePhase::Transcribing;
        }
    }

    fn finish_session(&self, epoch: u64, transcript: &str) {
        let mut inner = self.lock();
        if inner.listen_epoch != epoch {
            return;
        }
        inner.transcript = transcript.to_string();
        if matches!(inner.phase, VoicePhase::Listening | VoicePhase::Transcribing) {
            inner.phase = VoicePhase::Idle;
        }
    }

    /// Batch transcription of the captured audio, falling back to `partial`.
    async fn authoritative_transcript(&self, partial: String) -> String {
        let audio = match self.capture.stop().await {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Audio capture failed, using live transcript: {e}");
                self.record_error(&e);
                return partial;
            }
        };
        let Some(transcriber) = &self.transcriber else {
            return partial;
        };
        if audio.is_empty() {
            return partial;
        }

        match transcriber.transcribe(&audio).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!("Batch transcription empty, using live transcript");
                partial
            }
            Err(e) => {
                warn!("Batch transcription failed, using live transcript: {e}");
                self.record_error(&e);
                partial
            }
        }
    }
}

/// Committed final segments plus the current interim guess.
#[derive(Default)]
struct Heard {
    finalized: String,
    interim: String,
}

impl Heard {
    fn apply(&mut self, event: RecognitionEvent) -> String {
        match event {
            RecognitionEvent::Partial(text) => self.interim = text,
            RecognitionEvent::Final(text) => {
                if !self.finalized.is_empty() {
                    self.finalized.push(' ');
                }
                self.finalized.push_str(text.trim());
                self.interim.clear();
            }
        }
        self.text()
    }

    fn text(&self) -> String {
        [self.finalized.trim(), self.interim.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

enum Wake {
    Request(Option<StopRequest>),
    Timeout,
}

async fn run_session(
    shared: Arc<Shared>,
    epoch: u64,
    mut events: mpsc::Receiver<RecognitionEvent>,
    mut stop_rx: oneshot::Receiver<StopRequest>,
    result_tx: oneshot::Sender<String>,
    on_partial: PartialCallback,
) {
    let heard = Arc::new(Mutex::new(Heard::default()));

    let pump = {
        let shared = Arc::clone(&shared);
        let heard = Arc::clone(&heard);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let text = heard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(event);
                shared.set_live_transcript(epoch, &text);
                on_partial(&text);
            }
        })
    };

    let wake = tokio::select! {
        request = &mut stop_rx => Wake::Request(request.ok()),
        _ = tokio::time::sleep(shared.listen_timeout) => Wake::Timeout,
    };
    let request = match wake {
        Wake::Request(request) => request,
        Wake::Timeout => {
            if shared.take_stop_handle(Some(epoch)).is_some() {
                debug!("Listen session {epoch} timed out");
                None
            } else {
                // A stop or teardown raced the timeout; serve it.
                stop_rx.await.ok()
            }
        }
    };

    // No partial callbacks may fire once the session is being torn down.
    pump.abort();
    let _ = pump.await;
    shared.recognizer.stop().await;

    let partial = heard.lock().unwrap_or_else(PoisonError::into_inner).text();
    let (reason, reply) = match request {
        Some(request) => (request.reason, Some(request.reply)),
        None => (StopReason::Timeout, None),
    };

    let transcript = match reason {
        StopReason::Stop => {
            shared.set_transcribing(epoch);
            shared.authoritative_transcript(partial).await
        }
        StopReason::Cancel | StopReason::Timeout => {
            if let Err(e) = shared.capture.stop().await {
                shared.record_error(&e);
            }
            partial
        }
    };
    let transcript = normalize_transcript(&transcript);

    shared.finish_session(epoch, &transcript);
    debug!("Listen session {epoch} finished ({} chars)", transcript.len());
    if let Some(reply) = reply {
        let _ = reply.send(transcript.clone());
    }
    let _ = result_tx.send(transcript);
}

/// Drops spoken fillers (um, uh) and collapses whitespace.
pub fn normalize_transcript(text: &str) -> String {
    FILLER_WORDS
        .replace_all(text, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strips markdown emphasis so the synthesizer does not read symbols aloud.
/// Markers are removed where they wrap a word; "C#" and "snake_case" survive.
pub fn clean_for_speech(text: &str) -> String {
    text.split_whitespace()
        .filter_map(clean_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_word(word: &str) -> Option<String> {
    let word = word.trim_start_matches(['*', '_', '`', '~', '#']);
    let core_len = word.trim_end_matches(['.', ',', '!', '?', ':', ';', ')']).len();
    let (core, tail) = word.split_at(core_len);
    let core = core.trim_end_matches(['*', '_', '`', '~']);
    let cleaned: String = core
        .chars()
        .filter(|c| !matches!(c, '*' | '`' | '~'))
        .chain(tail.chars())
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
