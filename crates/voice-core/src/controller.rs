//! The session controller owns every live resource and is the only writer of
//! agent state, transcript and error. Device callbacks and provider tasks talk
//! to it exclusively through the event queue returned by [`SessionController::new`].

use crate::capture::{CaptureConfig, CapturePipeline};
use crate::codec::{decode_base64_audio, encode_chunk};
use crate::error::VoiceError;
use crate::events::{SessionEvent, SessionEventKind, SessionId, SessionSink};
use crate::generic_types::{AudioChunk, LiveConfig, RemoteEvent, ServerContent};
use crate::platform::{AudioInput, AudioPlatform, OutputContext};
use crate::playback::PlaybackScheduler;
use crate::realtime_api::{LiveSession, RealtimeConnector};
use crate::state::{transition, AgentState, StateEvent};
use crate::transcript::{AgentFinality, Message, Speaker, TranscriptAggregator};
use crate::{EVENT_QUEUE_CAPACITY, OUTPUT_SAMPLE_RATE};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub live: LiveConfig,
    pub capture: CaptureConfig,
    pub output_sample_rate: u32,
    pub agent_finality: AgentFinality,
}

impl ControllerSettings {
    pub fn new(live: LiveConfig) -> Self {
        Self {
            live,
            capture: CaptureConfig::default(),
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            agent_finality: AgentFinality::default(),
        }
    }
}

/// Everything the rendering layer needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub agent_state: AgentState,
    pub transcript: Vec<Message>,
    pub error: Option<String>,
}

/// Resources that only exist while a session runs. Dropping it releases all of them.
struct ActiveSession<I: AudioInput, O: OutputContext> {
    id: SessionId,
    session: Box<dyn LiveSession>,
    capture: CapturePipeline<I>,
    playback: PlaybackScheduler<O>,
}

pub struct SessionController<C, P: AudioPlatform> {
    connector: C,
    platform: P,
    settings: ControllerSettings,
    state: AgentState,
    transcript: TranscriptAggregator,
    error: Option<String>,
    active: Option<ActiveSession<P::Input, P::Output>>,
    events_tx: mpsc::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl<C, P> SessionController<C, P>
where
    C: RealtimeConnector,
    P: AudioPlatform,
{
    /// Builds an idle controller and the receiving end of its event queue.
    /// The caller drives the controller by passing every received event to
    /// [`SessionController::handle_event`].
    pub fn new(
        connector: C,
        platform: P,
        settings: ControllerSettings,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        let controller = Self {
            connector,
            platform,
            transcript: TranscriptAggregator::new(settings.agent_finality),
            settings,
            state: AgentState::Idle,
            error: None,
            active: None,
            events_tx,
            snapshot_tx,
        };
        (controller, events_rx)
    }

    /// Starts a session from `Idle`/`Error`, stops the running one otherwise.
    pub async fn toggle(&mut self) {
        if self.state.toggle_starts() {
            // Failures are already recorded in the published error.
            let _ = self.start().await;
        } else {
            self.stop().await;
        }
    }

    /// Acquires the microphone, opens the output and the remote session, then
    /// starts capture. Any failure leaves nothing open and the state in `Error`.
    pub async fn start(&mut self) -> Result<(), VoiceError> {
        if !self.state.toggle_starts() {
            tracing::debug!(state = %self.state, "start ignored, session already running");
            return Ok(());
        }

        self.error = None;
        self.transcript.reset();

        match self.open_session().await {
            Ok(active) => {
                tracing::info!(session = %active.id, model = %self.settings.live.model, "voice session started");
                self.active = Some(active);
                self.apply(StateEvent::Started);
                self.publish();
                Ok(())
            }
            Err(err) => {
                tracing::error!("failed to start voice session: {}", err);
                self.error = Some(err.user_message());
                self.apply(StateEvent::StartFailed);
                self.publish();
                Err(err)
            }
        }
    }

    async fn open_session(&mut self) -> Result<ActiveSession<P::Input, P::Output>, VoiceError> {
        let id = SessionId::new();
        let sink = SessionSink::new(id, self.events_tx.clone());

        let mut capture = CapturePipeline::acquire(&self.platform, self.settings.capture)
            .map_err(|e| {
                if e.is_permission() {
                    VoiceError::Permission(e.to_string())
                } else {
                    VoiceError::Audio(e)
                }
            })?;

        let ended_sink = sink.clone();
        let output = self.platform.open_output(
            self.settings.output_sample_rate,
            Arc::new(move |unit| {
                ended_sink.try_playback_ended(unit);
            }),
        )?;
        let playback = PlaybackScheduler::new(output);

        let mut session = self
            .connector
            .open(&self.settings.live, sink.clone())
            .await
            .map_err(|e| VoiceError::SessionOpen(format!("{:#}", e)))?;

        let capture_sink = sink;
        if let Err(e) = capture.start(move |block| {
            capture_sink.try_capture(block);
        }) {
            if let Err(close_err) = session.close().await {
                tracing::warn!("failed to close session after capture error: {:#}", close_err);
            }
            return Err(VoiceError::Audio(e));
        }

        Ok(ActiveSession {
            id,
            session,
            capture,
            playback,
        })
    }

    /// Stops the running session. Every non-final message is frozen final.
    pub async fn stop(&mut self) {
        self.teardown(StateEvent::StopRequested).await;
    }

    /// Releases everything. Active states end in `Idle`; `Error` is kept.
    pub async fn shutdown(&mut self) {
        self.teardown(StateEvent::StopRequested).await;
        tracing::debug!(state = %self.state, "controller shut down");
    }

    async fn teardown(&mut self, reason: StateEvent) {
        if let Some(mut active) = self.active.take() {
            active.capture.stop();
            active.playback.close();
            if let Err(e) = active.session.close().await {
                tracing::warn!(session = %active.id, "failed to close session: {:#}", e);
            }
            tracing::info!(session = %active.id, ?reason, "voice session stopped");
        }
        self.transcript.finalize_all();
        self.apply(reason);
        self.publish();
    }

    /// Applies one queued event. Events from any session but the current one are dropped.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        if self.current_session() != Some(event.session) {
            tracing::debug!(session = %event.session, "dropping event from stale session");
            return;
        }

        match event.kind {
            SessionEventKind::Capture(samples) => self.send_capture(&samples).await,
            SessionEventKind::PlaybackEnded(unit) => {
                if let Some(active) = self.active.as_mut() {
                    active.playback.unit_ended(unit);
                }
            }
            SessionEventKind::Remote(RemoteEvent::Opened) => {
                tracing::info!(session = %event.session, "remote session opened");
            }
            SessionEventKind::Remote(RemoteEvent::Content(content)) => {
                self.apply_content(content);
                self.publish();
            }
            SessionEventKind::Remote(RemoteEvent::Error(message)) => {
                tracing::error!(session = %event.session, "remote session error: {}", message);
                self.error = Some(VoiceError::SessionRuntime(message).user_message());
                self.teardown(StateEvent::RemoteError).await;
            }
            SessionEventKind::Remote(RemoteEvent::Closed(reason)) => {
                tracing::info!(session = %event.session, reason = ?reason, "remote session closed");
                self.teardown(StateEvent::RemoteClosed).await;
            }
        }
    }

    async fn send_capture(&mut self, samples: &[f32]) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let chunk = AudioChunk::pcm16(encode_chunk(samples));
        if let Err(e) = active.session.send_audio(chunk).await {
            tracing::warn!(session = %active.id, "failed to send audio chunk: {:#}", e);
        }
    }

    fn apply_content(&mut self, content: ServerContent) {
        if let Some(fragment) = content.input_transcription {
            self.transcript
                .apply_fragment(Speaker::User, &fragment.text, fragment.is_final);
            self.apply(StateEvent::InputFragment);
        }
        if let Some(fragment) = content.output_transcription {
            self.transcript
                .apply_fragment(Speaker::Agent, &fragment.text, fragment.is_final);
            self.apply(StateEvent::OutputFragment);
        }

        if content.interrupted {
            if let Some(active) = self.active.as_mut() {
                tracing::debug!(session = %active.id, "agent interrupted, clearing playback");
                active.playback.stop_all();
            }
        }

        if content.turn_complete {
            self.apply(StateEvent::TurnComplete);
        }

        for audio in content.audio {
            let Some(active) = self.active.as_mut() else {
                return;
            };
            let session = active.id;
            let scheduled = decode_base64_audio(&audio.data, audio.sample_rate(), 1)
                .map_err(VoiceError::from)
                .and_then(|buffer| active.playback.schedule(buffer).map_err(VoiceError::from));
            match scheduled {
                Ok(_) => self.apply(StateEvent::AudioReceived),
                Err(e) => tracing::warn!(%session, "dropping audio unit: {}", e),
            }
        }
    }

    fn apply(&mut self, event: StateEvent) {
        let next = transition(self.state, event);
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, ?event, "agent state changed");
            self.state = next;
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            agent_state: self.state,
            transcript: self.transcript.messages().to_vec(),
            error: self.error.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn agent_state(&self) -> AgentState {
        self.state
    }

    pub fn transcript(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|active| active.id)
    }
}
