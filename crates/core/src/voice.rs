//! Voice Session
//!
//! Coordinates the two audio channels of one connected client: capture with
//! speech recognition, and speech synthesis. Each channel has at most one
//! operation in flight. A new listen while one is active is rejected, never
//! queued, so every transcript belongs to exactly one request.
//!
//! The platform primitives sit behind [`SpeechRecognizer`] and
//! [`SpeechSynthesizer`]. This crate ships no implementation of either: the
//! browser or desktop host that owns the microphone and speaker supplies
//! them and drives the session. The HTTP service never creates one.
//!
//! Completion is delivered exactly once: through the callbacks given to
//! [`VoiceSession::start_listening`], or through the [`SpeechHandle`]
//! returned by [`VoiceSession::speak`]. Cancelling a channel
//! drops the in-flight future, which is how implementations observe a stop.
//!
//! Operations spawn onto the ambient Tokio runtime.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};

/// Which channel the session is currently busy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceSessionState {
    #[default]
    Idle,
    Listening,
    Speaking,
}

impl fmt::Display for VoiceSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSessionState::Idle => write!(f, "Idle"),
            VoiceSessionState::Listening => write!(f, "Listening"),
            VoiceSessionState::Speaking => write!(f, "Speaking"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Recognition,
    Synthesis,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Recognition => write!(f, "speech recognition"),
            Channel::Synthesis => write!(f, "speech synthesis"),
        }
    }
}

/// Why a voice operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("{0} is not supported on this platform")]
    Unsupported(Channel),
    #[error("voice session is busy ({0})")]
    Busy(VoiceSessionState),
}

/// Classified recognition failure, as reported to `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("no speech was detected")]
    NoSpeech,
    #[error("recognition was aborted")]
    Aborted,
    #[error("audio capture failed")]
    AudioCapture,
    #[error("network error during recognition")]
    Network,
    #[error("microphone permission denied")]
    NotAllowed,
    #[error("language is not supported")]
    LanguageNotSupported,
    #[error("speech recognition is not supported")]
    Unsupported,
    #[error("recognition failed: {0}")]
    Other(String),
}

impl RecognitionError {
    /// Maps a platform error code such as `no-speech` or `not-allowed`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => RecognitionError::NoSpeech,
            "aborted" => RecognitionError::Aborted,
            "audio-capture" => RecognitionError::AudioCapture,
            "network" => RecognitionError::Network,
            "not-allowed" | "service-not-allowed" => RecognitionError::NotAllowed,
            "language-not-supported" => RecognitionError::LanguageNotSupported,
            other => RecognitionError::Other(other.to_string()),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RecognitionError::NoSpeech
                | RecognitionError::Aborted
                | RecognitionError::Network
                | RecognitionError::Other(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// Voice parameters for one utterance. Missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            lang: "en-US".to_string(),
        }
    }
}

impl SpeechOptions {
    /// Clamps values into the ranges synthesis engines accept; zero or NaN
    /// rate and pitch fall back to the defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.rate > 0.0) {
            self.rate = defaults.rate;
        }
        if !(self.pitch > 0.0) {
            self.pitch = defaults.pitch;
        }
        if self.volume.is_nan() {
            self.volume = defaults.volume;
        }
        self.rate = self.rate.clamp(0.1, 10.0);
        self.pitch = self.pitch.clamp(0.0, 2.0);
        self.volume = self.volume.clamp(0.0, 1.0);
        if self.lang.trim().is_empty() {
            self.lang = defaults.lang;
        }
        self
    }
}

/// Platform speech-to-text. One call captures one utterance.
///
/// Dropping the returned future must stop the capture.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, lang: &str) -> Result<String, RecognitionError>;
}

/// Platform text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Plays `text`, resolving when playback finishes.
    async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<(), SynthesisError>;
    /// Silences any playback immediately.
    fn cancel(&self);
}

/// Which platform primitives were available when the session was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCapabilities {
    pub recognition: bool,
    pub synthesis: bool,
}

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEnd {
    Completed,
    Failed(SynthesisError),
    Cancelled,
}

/// Completion signal for one call to [`VoiceSession::speak`].
#[derive(Debug)]
pub struct SpeechHandle {
    done: oneshot::Receiver<Result<(), SynthesisError>>,
}

impl SpeechHandle {
    pub async fn finished(self) -> SpeechEnd {
        match self.done.await {
            Ok(Ok(())) => SpeechEnd::Completed,
            Ok(Err(e)) => SpeechEnd::Failed(e),
            Err(_) => SpeechEnd::Cancelled,
        }
    }
}

struct Flight {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Channels {
    listening: Option<Flight>,
    speaking: Option<Flight>,
    last_id: u64,
}

impl Channels {
    fn state(&self) -> VoiceSessionState {
        if self.listening.is_some() {
            VoiceSessionState::Listening
        } else if self.speaking.is_some() {
            VoiceSessionState::Speaking
        } else {
            VoiceSessionState::Idle
        }
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Voice state for one connected client.
pub struct VoiceSession {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    capabilities: VoiceCapabilities,
    recognition_lang: String,
    channels: Arc<Mutex<Channels>>,
}

impl VoiceSession {
    /// Builds a session from whichever primitives the platform offers.
    pub fn new(
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        let capabilities = VoiceCapabilities {
            recognition: recognizer.is_some(),
            synthesis: synthesizer.is_some(),
        };
        info!(?capabilities, "Voice session created");
        Self {
            recognizer,
            synthesizer,
            capabilities,
            recognition_lang: "en-US".to_string(),
            channels: Arc::new(Mutex::new(Channels::default())),
        }
    }

    pub fn with_recognition_lang(mut self, lang: impl Into<String>) -> Self {
        self.recognition_lang = lang.into();
        self
    }

    pub fn capabilities(&self) -> VoiceCapabilities {
        self.capabilities
    }

    pub fn state(&self) -> VoiceSessionState {
        self.channels.lock().state()
    }

    pub fn is_listening(&self) -> bool {
        self.channels.lock().listening.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.channels.lock().speaking.is_some()
    }

    /// Starts capturing one utterance.
    ///
    /// Only accepted from `Idle`. Exactly one of the callbacks fires when
    /// recognition ends, after the session is back to `Idle`; neither fires
    /// if the capture is stopped first. When recognition is unsupported,
    /// `on_error` receives [`RecognitionError::Unsupported`] as well.
    pub fn start_listening<R, E>(&self, on_result: R, on_error: E) -> Result<(), VoiceError>
    where
        R: FnOnce(String) + Send + 'static,
        E: FnOnce(RecognitionError) + Send + 'static,
    {
        let Some(recognizer) = self.recognizer.clone() else {
            on_error(RecognitionError::Unsupported);
            return Err(VoiceError::Unsupported(Channel::Recognition));
        };

        let mut channels = self.channels.lock();
        let state = channels.state();
        if state != VoiceSessionState::Idle {
            debug!(%state, "Rejected start_listening while busy");
            return Err(VoiceError::Busy(state));
        }

        let id = channels.next_id();
        let shared = self.channels.clone();
        let lang = self.recognition_lang.clone();
        let handle = tokio::spawn(async move {
            let outcome = recognizer.recognize(&lang).await;
            // Only the capture that still owns the channel may report.
            let owned = {
                let mut channels = shared.lock();
                if channels.listening.as_ref().map(|f| f.id) == Some(id) {
                    channels.listening = None;
                    true
                } else {
                    false
                }
            };
            if !owned {
                return;
            }
            match outcome {
                Ok(transcript) => {
                    debug!(chars = transcript.len(), "Recognition produced a transcript");
                    on_result(transcript)
                }
                Err(e) => {
                    warn!(error = %e, "Recognition failed");
                    on_error(e)
                }
            }
        });
        channels.listening = Some(Flight { id, handle });
        info!("Listening started");
        Ok(())
    }

    /// Cancels the in-flight capture, if any. No callback fires for it.
    pub fn stop_listening(&self) {
        let flight = self.channels.lock().listening.take();
        if let Some(flight) = flight {
            flight.handle.abort();
            info!("Listening stopped");
        }
    }

    /// Speaks `text`. Accepted in any state; an utterance already playing is
    /// cancelled and replaced.
    pub fn speak(&self, text: &str, options: SpeechOptions) -> Result<SpeechHandle, VoiceError> {
        let Some(synthesizer) = self.synthesizer.clone() else {
            return Err(VoiceError::Unsupported(Channel::Synthesis));
        };
        let options = options.normalized();
        let text = text.to_string();
        let (done_tx, done_rx) = oneshot::channel();

        let mut channels = self.channels.lock();
        if let Some(previous) = channels.speaking.take() {
            previous.handle.abort();
            synthesizer.cancel();
        }

        let id = channels.next_id();
        let shared = self.channels.clone();
        let handle = tokio::spawn(async move {
            let outcome = synthesizer.speak(&text, &options).await;
            {
                let mut channels = shared.lock();
                if channels.speaking.as_ref().map(|f| f.id) == Some(id) {
                    channels.speaking = None;
                } else {
                    return;
                }
            }
            if let Err(e) = &outcome {
                warn!(error = %e, "Speech synthesis failed");
            }
            let _ = done_tx.send(outcome);
        });
        channels.speaking = Some(Flight { id, handle });
        Ok(SpeechHandle { done: done_rx })
    }

    /// Silences synthesis immediately. A no-op when nothing is playing.
    pub fn stop_speaking(&self) {
        let flight = self.channels.lock().speaking.take();
        if let Some(flight) = flight {
            flight.handle.abort();
            if let Some(synthesizer) = &self.synthesizer {
                synthesizer.cancel();
            }
            info!("Speaking stopped");
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        let mut channels = self.channels.lock();
        for flight in [channels.listening.take(), channels.speaking.take()]
            .into_iter()
            .flatten()
        {
            flight.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{Mutex as AsyncMutex, mpsc};

    /// Recognizer whose results are pushed by the test.
    struct ScriptedRecognizer {
        outcomes: AsyncMutex<mpsc::UnboundedReceiver<Result<String, RecognitionError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<String, RecognitionError>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let recognizer = Arc::new(Self {
                outcomes: AsyncMutex::new(rx),
                calls: AtomicUsize::new(0),
            });
            (recognizer, tx)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn recognize(&self, _lang: &str) -> Result<String, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().await;
            outcomes
                .recv()
                .await
                .unwrap_or(Err(RecognitionError::Aborted))
        }
    }

    /// Synthesizer that "plays" until released by the test.
    struct GatedSynthesizer {
        release: tokio::sync::Notify,
        cancels: AtomicUsize,
        spoken: parking_lot::Mutex<Vec<(String, SpeechOptions)>>,
    }

    impl GatedSynthesizer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                release: tokio::sync::Notify::new(),
                cancels: AtomicUsize::new(0),
                spoken: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for GatedSynthesizer {
        async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<(), SynthesisError> {
            self.spoken.lock().push((text.to_string(), options.clone()));
            self.release.notified().await;
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn transcript_sink() -> (
        impl FnOnce(String) + Send + 'static,
        impl FnOnce(RecognitionError) + Send + 'static,
        mpsc::UnboundedReceiver<Result<String, RecognitionError>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let err_tx = tx.clone();
        (
            move |text| {
                let _ = tx.send(Ok(text));
            },
            move |err| {
                let _ = err_tx.send(Err(err));
            },
            rx,
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_single_flight_listening() {
        let (recognizer, script) = ScriptedRecognizer::new();
        let session = VoiceSession::new(Some(recognizer.clone()), None);
        assert_eq!(session.state(), VoiceSessionState::Idle);

        let (on_result, on_error, mut events) = transcript_sink();
        session.start_listening(on_result, on_error).unwrap();
        assert_eq!(session.state(), VoiceSessionState::Listening);

        let rejected = session.start_listening(|_| panic!("must not fire"), |_| panic!("must not fire"));
        assert_eq!(rejected, Err(VoiceError::Busy(VoiceSessionState::Listening)));

        script.send(Ok("tell me about rust".to_string())).unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered, Ok("tell me about rust".to_string()));
        assert_eq!(session.state(), VoiceSessionState::Idle);

        let (on_result, on_error, _events) = transcript_sink();
        assert!(session.start_listening(on_result, on_error).is_ok());
        settle().await;
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recognition_error_returns_to_idle() {
        let (recognizer, script) = ScriptedRecognizer::new();
        let session = VoiceSession::new(Some(recognizer), None);
        let (on_result, on_error, mut events) = transcript_sink();
        session.start_listening(on_result, on_error).unwrap();

        script.send(Err(RecognitionError::from_code("no-speech"))).unwrap();
        let delivered = events.recv().await.unwrap();
        assert_eq!(delivered, Err(RecognitionError::NoSpeech));
        assert!(!session.is_listening());
    }

    #[tokio::test]
    async fn test_stop_listening_cancels_without_callbacks() {
        let (recognizer, script) = ScriptedRecognizer::new();
        let session = VoiceSession::new(Some(recognizer), None);
        let (on_result, on_error, mut events) = transcript_sink();
        session.start_listening(on_result, on_error).unwrap();
        settle().await;

        session.stop_listening();
        assert_eq!(session.state(), VoiceSessionState::Idle);
        // A late result from the platform is not attributed to anyone.
        let _ = script.send(Ok("late".to_string()));
        settle().await;
        assert!(events.try_recv().is_err());

        session.stop_listening();
        assert_eq!(session.state(), VoiceSessionState::Idle);
    }

    #[tokio::test]
    async fn test_unsupported_capabilities() {
        let session = VoiceSession::new(None, None);
        assert_eq!(
            session.capabilities(),
            VoiceCapabilities {
                recognition: false,
                synthesis: false
            }
        );

        let (on_result, on_error, mut events) = transcript_sink();
        assert_eq!(
            session.start_listening(on_result, on_error),
            Err(VoiceError::Unsupported(Channel::Recognition))
        );
        assert_eq!(events.recv().await.unwrap(), Err(RecognitionError::Unsupported));
        assert_eq!(
            session.speak("hello", SpeechOptions::default()).unwrap_err(),
            VoiceError::Unsupported(Channel::Synthesis)
        );
        session.stop_speaking();
        assert_eq!(session.state(), VoiceSessionState::Idle);
    }

    #[tokio::test]
    async fn test_speak_and_complete() {
        let synthesizer = GatedSynthesizer::new();
        let session = VoiceSession::new(None, Some(synthesizer.clone()));
        let handle = session
            .speak("Great answer!", SpeechOptions {
                rate: 0.0,
                lang: String::new(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(session.state(), VoiceSessionState::Speaking);
        settle().await;

        let (text, options) = synthesizer.spoken.lock()[0].clone();
        assert_eq!(text, "Great answer!");
        assert_eq!(options, SpeechOptions::default());

        synthesizer.release.notify_one();
        assert_eq!(handle.finished().await, SpeechEnd::Completed);
        assert_eq!(session.state(), VoiceSessionState::Idle);
    }

    #[tokio::test]
    async fn test_stop_speaking_cancels_and_is_idempotent() {
        let synthesizer = GatedSynthesizer::new();
        let session = VoiceSession::new(None, Some(synthesizer.clone()));

        session.stop_speaking();
        assert_eq!(synthesizer.cancels.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), VoiceSessionState::Idle);

        let handle = session.speak("Long answer", SpeechOptions::default()).unwrap();
        settle().await;
        session.stop_speaking();
        assert_eq!(handle.finished().await, SpeechEnd::Cancelled);
        assert_eq!(synthesizer.cancels.load(Ordering::SeqCst), 1);
        assert!(!session.is_speaking());

        session.stop_speaking();
        assert_eq!(synthesizer.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listening_is_refused_while_speaking() {
        let (recognizer, _script) = ScriptedRecognizer::new();
        let synthesizer = GatedSynthesizer::new();
        let session = VoiceSession::new(Some(recognizer), Some(synthesizer.clone()));

        let _handle = session.speak("Question one", SpeechOptions::default()).unwrap();
        let (on_result, on_error, _events) = transcript_sink();
        assert_eq!(
            session.start_listening(on_result, on_error),
            Err(VoiceError::Busy(VoiceSessionState::Speaking))
        );
        session.stop_speaking();
        let (on_result, on_error, _events) = transcript_sink();
        assert!(session.start_listening(on_result, on_error).is_ok());
    }

    #[tokio::test]
    async fn test_new_utterance_replaces_current() {
        let synthesizer = GatedSynthesizer::new();
        let session = VoiceSession::new(None, Some(synthesizer.clone()));
        let first = session.speak("one", SpeechOptions::default()).unwrap();
        let second = session.speak("two", SpeechOptions::default()).unwrap();
        assert_eq!(first.finished().await, SpeechEnd::Cancelled);
        assert_eq!(synthesizer.cancels.load(Ordering::SeqCst), 1);

        settle().await;
        synthesizer.release.notify_one();
        assert_eq!(second.finished().await, SpeechEnd::Completed);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RecognitionError::from_code("not-allowed"), RecognitionError::NotAllowed);
        assert_eq!(
            RecognitionError::from_code("service-not-allowed"),
            RecognitionError::NotAllowed
        );
        assert_eq!(
            RecognitionError::from_code("bad-grammar"),
            RecognitionError::Other("bad-grammar".into())
        );
        assert!(RecognitionError::NoSpeech.is_transient());
        assert!(!RecognitionError::NotAllowed.is_transient());
    }

    #[test]
    fn test_speech_options_defaults_from_partial_json() {
        let options: SpeechOptions = serde_json::from_str(r#"{"rate": 1.5}"#).unwrap();
        assert_eq!(options.rate, 1.5);
        assert_eq!(options.lang, "en-US");
        let clamped = SpeechOptions {
            volume: 4.0,
            pitch: 9.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(clamped.volume, 1.0);
        assert_eq!(clamped.pitch, 2.0);
    }
}
