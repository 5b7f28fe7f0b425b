use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_live::types::{
    AudioTranscriptionConfig, Content, LiveServerContent, Modality, ServerTranscription, Setup,
    SpeechConfig,
};
use gemini_live::{ClientConfig, GeminiClient, LiveEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voice_core::generic_types::{
    AudioChunk, InlineAudio, LiveConfig, RemoteEvent, ResponseModality, ServerContent,
    TranscriptFragment,
};
use voice_core::realtime_api::{LiveSession, RealtimeConnector};
use voice_core::SessionSink;

/// Opens Gemini Live sessions for the session controller.
pub struct GeminiConnector {
    config: ClientConfig,
}

impl GeminiConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

/// An adapter that implements the generic `LiveSession` trait for a `GeminiClient`.
pub struct GeminiSession {
    client: GeminiClient,
    forwarder: JoinHandle<()>,
}

pub fn build_setup(config: &LiveConfig) -> Setup {
    let mut setup = Setup::new(config.model.clone());
    setup.generation_config.response_modalities = vec![match config.response_modality {
        ResponseModality::Audio => Modality::Audio,
        ResponseModality::Text => Modality::Text,
    }];
    setup.generation_config.speech_config = config.voice.as_deref().map(SpeechConfig::prebuilt);
    if !config.system_instruction.is_empty() {
        setup.system_instruction = Some(Content::text(config.system_instruction.clone()));
    }
    if config.input_transcription {
        setup.input_audio_transcription = Some(AudioTranscriptionConfig::default());
    }
    if config.output_transcription {
        setup.output_audio_transcription = Some(AudioTranscriptionConfig::default());
    }
    setup
}

#[async_trait]
impl RealtimeConnector for GeminiConnector {
    async fn open(&self, config: &LiveConfig, sink: SessionSink) -> Result<Box<dyn LiveSession>> {
        let (client, events) = gemini_live::connect(&self.config, build_setup(config))
            .await
            .context("Failed to open Gemini Live session")?;

        sink.remote(RemoteEvent::Opened).await;
        let forwarder = tokio::spawn(forward_events(events, sink));
        Ok(Box::new(GeminiSession { client, forwarder }))
    }
}

#[async_trait]
impl LiveSession for GeminiSession {
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<()> {
        self.client.send_audio(&chunk.mime_type, chunk.data).await
    }

    async fn close(&mut self) -> Result<()> {
        self.forwarder.abort();
        self.client.close().await
    }
}

impl Drop for GeminiSession {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn forward_events(mut events: mpsc::Receiver<LiveEvent>, sink: SessionSink) {
    let mut tracker = FinalityTracker::default();
    while let Some(event) = events.recv().await {
        let Some(mut remote) = translate(event) else {
            continue;
        };
        if let RemoteEvent::Content(content) = &mut remote {
            tracker.apply(content);
        }
        if !sink.remote(remote).await {
            tracing::debug!("Session controller gone, stopping Gemini event forwarding.");
            break;
        }
    }
}

/// Translates one Gemini client event into the generic remote event, if any.
pub fn translate(event: LiveEvent) -> Option<RemoteEvent> {
    match event {
        LiveEvent::Message(message) => {
            if let Some(go_away) = &message.go_away {
                tracing::warn!(
                    "Gemini server is closing the session soon (time left: {}).",
                    go_away.time_left.as_deref().unwrap_or("unknown")
                );
            }
            if let Some(usage) = &message.usage_metadata {
                tracing::debug!(
                    "total_tokens: {:?}, prompt_tokens: {:?}, response_tokens: {:?}",
                    usage.total_token_count,
                    usage.prompt_token_count,
                    usage.response_token_count
                );
            }
            message
                .server_content
                .map(|content| RemoteEvent::Content(translate_content(content)))
        }
        LiveEvent::Closed { reason } => Some(RemoteEvent::Closed(reason)),
        LiveEvent::Failed(message) => Some(RemoteEvent::Error(message)),
    }
}

fn fragment(transcription: ServerTranscription) -> TranscriptFragment {
    TranscriptFragment {
        text: transcription.text,
        is_final: transcription.finished.unwrap_or(false),
    }
}

fn translate_content(content: LiveServerContent) -> ServerContent {
    let audio = content
        .model_turn
        .map(|turn| turn.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.inline_data)
        .filter(|blob| blob.mime_type.is_empty() || blob.mime_type.starts_with("audio/"))
        .map(|blob| InlineAudio {
            mime_type: blob.mime_type,
            data: blob.data,
        })
        .collect();

    ServerContent {
        input_transcription: content.input_transcription.map(fragment),
        output_transcription: content.output_transcription.map(fragment),
        audio,
        turn_complete: content.turn_complete == Some(true),
        interrupted: content.interrupted == Some(true),
    }
}

/// Gemini streams transcription as deltas and rarely marks them finished.
/// The user's utterance is closed once the agent starts answering, and the
/// agent's once the turn completes, by adding an empty final fragment.
#[derive(Debug, Default)]
struct FinalityTracker {
    user_open: bool,
    agent_open: bool,
}

impl FinalityTracker {
    fn apply(&mut self, content: &mut ServerContent) {
        if let Some(input) = &content.input_transcription {
            self.user_open = !input.is_final;
        }

        let agent_active = content.output_transcription.is_some() || !content.audio.is_empty();
        if agent_active && self.user_open && content.input_transcription.is_none() {
            content.input_transcription = Some(TranscriptFragment {
                text: String::new(),
                is_final: true,
            });
            self.user_open = false;
        }

        if let Some(output) = &content.output_transcription {
            self.agent_open = !output.is_final;
        }
        if content.interrupted {
            self.agent_open = false;
        }

        if content.turn_complete {
            match content.output_transcription.as_mut() {
                Some(output) => output.is_final = true,
                None if self.agent_open => {
                    content.output_transcription = Some(TranscriptFragment {
                        text: String::new(),
                        is_final: true,
                    });
                }
                None => {}
            }
            self.agent_open = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_live::types::ServerMessage;
    use voice_core::events::{SessionEventKind, SessionId};
    use voice_core::transcript::{Speaker, TranscriptAggregator};

    fn message(json: &str) -> LiveEvent {
        let message: ServerMessage = serde_json::from_str(json).unwrap();
        LiveEvent::Message(message)
    }

    fn content_of(event: Option<RemoteEvent>) -> ServerContent {
        match event {
            Some(RemoteEvent::Content(content)) => content,
            other => panic!("expected content, got {:?}", other),
        }
    }

    #[test]
    fn test_setup_reflects_live_config() {
        let config = LiveConfig::new("models/live")
            .with_system_instruction("Be brief.")
            .with_voice(Some("Puck".into()));

        let setup = build_setup(&config);

        assert_eq!(setup.model, "models/live");
        assert_eq!(setup.generation_config.response_modalities, vec![Modality::Audio]);
        assert!(setup.generation_config.speech_config.is_some());
        assert_eq!(setup.system_instruction, Some(Content::text("Be brief.")));
        assert!(setup.input_audio_transcription.is_some());
        assert!(setup.output_audio_transcription.is_some());
    }

    #[test]
    fn test_translation_of_transcription_and_audio() {
        let content = content_of(translate(message(
            r#"{"serverContent": {
                "inputTranscription": {"text": "Hello world"},
                "modelTurn": {"parts": [
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}},
                    {"text": "thinking out loud"},
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "BBBB"}}
                ]}
            }}"#,
        )));

        assert_eq!(
            content.input_transcription,
            Some(TranscriptFragment {
                text: "Hello world".into(),
                is_final: false
            })
        );
        let data: Vec<&str> = content.audio.iter().map(|a| a.data.as_str()).collect();
        assert_eq!(data, vec!["AAAA", "BBBB"]);
        assert_eq!(content.audio[0].sample_rate(), 24000);
        assert!(!content.turn_complete);
    }

    #[test]
    fn test_translation_of_turn_signals() {
        let content = content_of(translate(message(
            r#"{"serverContent": {"turnComplete": true, "interrupted": true}}"#,
        )));

        assert!(content.turn_complete);
        assert!(content.interrupted);
    }

    #[test]
    fn test_translation_of_close_and_failure() {
        assert_eq!(
            translate(LiveEvent::Closed {
                reason: Some("bye".into())
            }),
            Some(RemoteEvent::Closed(Some("bye".into())))
        );
        assert_eq!(
            translate(LiveEvent::Failed("reset by peer".into())),
            Some(RemoteEvent::Error("reset by peer".into()))
        );
    }

    #[test]
    fn test_messages_without_content_are_skipped() {
        assert_eq!(translate(message(r#"{"goAway": {"timeLeft": "5s"}}"#)), None);
        assert_eq!(
            translate(message(r#"{"usageMetadata": {"totalTokenCount": 42}}"#)),
            None
        );
    }

    fn run_transcript(stream: &[&str]) -> Vec<(Speaker, String, bool)> {
        let mut tracker = FinalityTracker::default();
        let mut aggregator = TranscriptAggregator::default();
        for json in stream {
            let mut content = content_of(translate(message(json)));
            tracker.apply(&mut content);
            if let Some(f) = content.input_transcription {
                aggregator.apply_fragment(Speaker::User, &f.text, f.is_final);
            }
            if let Some(f) = content.output_transcription {
                aggregator.apply_fragment(Speaker::Agent, &f.text, f.is_final);
            }
        }
        aggregator
            .messages()
            .iter()
            .map(|m| (m.speaker, m.text.clone(), m.is_final))
            .collect()
    }

    #[test]
    fn test_tracker_closes_utterances_at_turn_boundaries() {
        let messages = run_transcript(&[
            r#"{"serverContent": {"inputTranscription": {"text": "What time"}}}"#,
            r#"{"serverContent": {"inputTranscription": {"text": " is it?"}}}"#,
            r#"{"serverContent": {"outputTranscription": {"text": "It is"}}}"#,
            r#"{"serverContent": {"outputTranscription": {"text": " noon."}}}"#,
            r#"{"serverContent": {"turnComplete": true}}"#,
            r#"{"serverContent": {"inputTranscription": {"text": "Thanks"}}}"#,
        ]);

        assert_eq!(
            messages,
            vec![
                (Speaker::User, "What time is it?".to_string(), true),
                (Speaker::Agent, "It is noon.".to_string(), true),
                (Speaker::User, "Thanks".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_interrupted_reply_is_not_repeated_at_turn_complete() {
        let messages = run_transcript(&[
            r#"{"serverContent": {"inputTranscription": {"text": "Tell me a story"}}}"#,
            r#"{"serverContent": {"outputTranscription": {"text": "Once upon"}}}"#,
            r#"{"serverContent": {"inputTranscription": {"text": "Stop"}, "interrupted": true}}"#,
            r#"{"serverContent": {"turnComplete": true}}"#,
        ]);

        assert_eq!(
            messages,
            vec![
                (Speaker::User, "Tell me a story".to_string(), true),
                (Speaker::Agent, "Once upon".to_string(), true),
                (Speaker::User, "Stop".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_forwarding_tags_events_with_the_session() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let (sink_tx, mut sink_rx) = mpsc::channel(8);
        let session = SessionId::new();
        let sink = SessionSink::new(session, sink_tx);

        events_tx
            .send(message(r#"{"serverContent": {"turnComplete": true}}"#))
            .await
            .unwrap();
        events_tx
            .send(LiveEvent::Closed { reason: None })
            .await
            .unwrap();
        drop(events_tx);
        forward_events(events_rx, sink).await;

        let first = sink_rx.recv().await.unwrap();
        assert_eq!(first.session, session);
        assert!(matches!(
            first.kind,
            SessionEventKind::Remote(RemoteEvent::Content(ServerContent { turn_complete: true, .. }))
        ));
        let second = sink_rx.recv().await.unwrap();
        assert_eq!(second.kind, SessionEventKind::Remote(RemoteEvent::Closed(None)));
    }
}
