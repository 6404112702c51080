//! Round orchestration over an explicit session
//!
//! A round runs prompt -> streamed lyrics -> album cover strictly in
//! sequence. Progress is reported through a [`RoundSink`] so any front end can
//! render fragments as they arrive.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::cover::AlbumCover;
use crate::error::Error;
use crate::prompt::SongRequest;
use crate::state::{ChatMessage, ConversationLog};
use crate::stream::TokenStream;

/// Produces lyrics as a stream of fragments, given the whole conversation
#[async_trait]
pub trait LyricsGenerator: Send + Sync {
    async fn stream_lyrics(&self, messages: &[ChatMessage]) -> Result<TokenStream, Error>;
}

/// Produces encoded image bytes for a prompt
#[async_trait]
pub trait CoverGenerator: Send + Sync {
    async fn generate_cover(&self, prompt: &str) -> Result<Vec<u8>, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundState {
    #[default]
    Idle,
    PromptReady,
    AwaitingLyrics,
    LyricsStreaming,
    LyricsComplete,
    AwaitingCover,
    CoverReady,
    Failed,
}

impl RoundState {
    pub fn description(&self) -> &'static str {
        match self {
            RoundState::Idle => "idle",
            RoundState::PromptReady => "preparing prompt",
            RoundState::AwaitingLyrics => "requesting lyrics",
            RoundState::LyricsStreaming => "streaming lyrics",
            RoundState::LyricsComplete => "finishing lyrics",
            RoundState::AwaitingCover => "generating album cover",
            RoundState::CoverReady => "displaying album cover",
            RoundState::Failed => "failed",
        }
    }

    /// True while a round is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, RoundState::Idle | RoundState::Failed)
    }
}

/// Progress notifications emitted during a round
#[derive(Debug, Clone)]
pub enum RoundEvent {
    StateChanged(RoundState),
    /// The user entry was appended to the log
    UserPrompt(SongRequest),
    Fragment(String),
    /// The assistant entry was appended to the log
    Lyrics(String),
    Cover(AlbumCover),
    Failed { stage: RoundState, message: String },
}

/// Receiver of round progress
pub trait RoundSink {
    fn on_event(&mut self, event: RoundEvent);
}

impl RoundSink for Vec<RoundEvent> {
    fn on_event(&mut self, event: RoundEvent) {
        self.push(event);
    }
}

impl RoundSink for UnboundedSender<RoundEvent> {
    fn on_event(&mut self, event: RoundEvent) {
        // Receiver gone means the UI is shutting down
        let _ = self.send(event);
    }
}

#[derive(Debug)]
pub struct CompletedRound {
    pub request: SongRequest,
    pub lyrics: String,
    pub cover: AlbumCover,
}

#[derive(Debug)]
pub enum RoundOutcome {
    /// Artist or theme was empty; nothing was requested
    Skipped,
    Completed(CompletedRound),
}

/// A round that ended in `Failed`, with the stage it failed in
#[derive(Debug)]
pub struct RoundError {
    pub stage: RoundState,
    pub source: Error,
}

impl RoundError {
    fn new(stage: RoundState, source: Error) -> Self {
        Self { stage, source }
    }
}

impl fmt::Display for RoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage.description(), self.source)
    }
}

impl std::error::Error for RoundError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Session-scoped state: created on start-up, dropped on quit.
#[derive(Debug, Default)]
pub struct Session {
    log: ConversationLog,
    state: RoundState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Run one round for the given inputs.
    ///
    /// Empty inputs return `Skipped` without touching the log or the state.
    pub async fn submit<L, C, S>(
        &mut self,
        artist: &str,
        theme: &str,
        lyrics: &L,
        covers: &C,
        sink: &mut S,
    ) -> Result<RoundOutcome, RoundError>
    where
        L: LyricsGenerator + ?Sized,
        C: CoverGenerator + ?Sized,
        S: RoundSink + Send + ?Sized,
    {
        let Some(request) = SongRequest::new(artist, theme) else {
            debug!("artist or theme empty, round skipped");
            return Ok(RoundOutcome::Skipped);
        };

        info!(artist = request.artist(), theme = request.theme(), "starting round");
        self.transition(RoundState::PromptReady, sink);

        match self.run(&request, lyrics, covers, sink).await {
            Ok((lyrics, cover)) => {
                self.transition(RoundState::Idle, sink);
                info!(log_len = self.log.len(), "round complete");
                Ok(RoundOutcome::Completed(CompletedRound {
                    request,
                    lyrics,
                    cover,
                }))
            }
            Err(err) => {
                warn!(stage = ?err.stage, error = %err.source, "round failed");
                self.transition(RoundState::Failed, sink);
                sink.on_event(RoundEvent::Failed {
                    stage: err.stage,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run<L, C, S>(
        &mut self,
        request: &SongRequest,
        lyrics: &L,
        covers: &C,
        sink: &mut S,
    ) -> Result<(String, AlbumCover), RoundError>
    where
        L: LyricsGenerator + ?Sized,
        C: CoverGenerator + ?Sized,
        S: RoundSink + Send + ?Sized,
    {
        self.log.push(ChatMessage::user(request.lyric_prompt()));
        sink.on_event(RoundEvent::UserPrompt(request.clone()));

        self.transition(RoundState::AwaitingLyrics, sink);
        let mut tokens = lyrics
            .stream_lyrics(self.log.messages())
            .await
            .map_err(|e| RoundError::new(RoundState::AwaitingLyrics, e))?;

        self.transition(RoundState::LyricsStreaming, sink);
        let mut completion = String::new();
        while let Some(fragment) = tokens.next().await {
            let fragment = fragment.map_err(|e| RoundError::new(RoundState::LyricsStreaming, e))?;
            completion.push_str(&fragment);
            sink.on_event(RoundEvent::Fragment(fragment));
        }

        self.log.push(ChatMessage::assistant(completion.clone()));
        self.transition(RoundState::LyricsComplete, sink);
        sink.on_event(RoundEvent::Lyrics(completion.clone()));

        self.transition(RoundState::AwaitingCover, sink);
        let bytes = covers
            .generate_cover(&request.image_prompt())
            .await
            .map_err(|e| RoundError::new(RoundState::AwaitingCover, e))?;
        let cover = AlbumCover::decode(bytes, request.caption())
            .map_err(|e| RoundError::new(RoundState::AwaitingCover, e))?;

        self.transition(RoundState::CoverReady, sink);
        sink.on_event(RoundEvent::Cover(cover.clone()));

        Ok((completion, cover))
    }

    fn transition<S: RoundSink + ?Sized>(&mut self, next: RoundState, sink: &mut S) {
        debug!(from = ?self.state, to = ?next, "round state");
        self.state = next;
        sink.on_event(RoundEvent::StateChanged(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;
    use futures_util::stream;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    /// Replays canned fragments and records the context it was given
    struct ScriptedLyrics {
        fragments: Vec<Result<String, ()>>,
        fail_to_open: bool,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLyrics {
        fn new(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|f| Ok(f.to_string())).collect(),
                fail_to_open: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LyricsGenerator for ScriptedLyrics {
        async fn stream_lyrics(&self, messages: &[ChatMessage]) -> Result<TokenStream, Error> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if self.fail_to_open {
                return Err(Error::Status {
                    service: "Workers AI",
                    status: reqwest::StatusCode::UNAUTHORIZED,
                    body: "bad token".to_string(),
                });
            }
            let items: Vec<Result<String, Error>> = self
                .fragments
                .iter()
                .map(|f| match f {
                    Ok(text) => Ok(text.clone()),
                    Err(()) => Err(serde_json::from_str::<serde_json::Value>("{")
                        .unwrap_err()
                        .into()),
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }

    struct FixedCover {
        bytes: Vec<u8>,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedCover {
        fn png() -> Self {
            Self {
                bytes: PNG.to_vec(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CoverGenerator for FixedCover {
        async fn generate_cover(&self, prompt: &str) -> Result<Vec<u8>, Error> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.bytes.clone())
        }
    }

    fn states(events: &[RoundEvent]) -> Vec<RoundState> {
        events
            .iter()
            .filter_map(|e| match e {
                RoundEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_completed_round() {
        let lyrics = ScriptedLyrics::new(&["Beep", " boop", " love"]);
        let covers = FixedCover::png();
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        let outcome = session
            .submit("Daft Punk", "robots falling in love", &lyrics, &covers, &mut events)
            .await
            .unwrap();

        let RoundOutcome::Completed(round) = outcome else {
            panic!("expected a completed round");
        };
        assert_eq!(round.lyrics, "Beep boop love");
        assert_eq!(round.cover.caption(), "Album Cover for Daft Punk - robots falling in love");

        let log = session.log().messages();
        assert_eq!(
            log,
            &[
                ChatMessage::user(
                    "Write a song in the style of Daft Punk about robots falling in love."
                ),
                ChatMessage::assistant("Beep boop love"),
            ]
        );
        assert_eq!(
            covers.prompts.lock().unwrap().as_slice(),
            &["Album cover for Daft Punk with a theme of robots falling in love, \
               highly artistic and visually captivating."]
        );
        assert_eq!(session.state(), RoundState::Idle);

        assert_eq!(
            states(&events),
            vec![
                RoundState::PromptReady,
                RoundState::AwaitingLyrics,
                RoundState::LyricsStreaming,
                RoundState::LyricsComplete,
                RoundState::AwaitingCover,
                RoundState::CoverReady,
                RoundState::Idle,
            ]
        );
        let fragments: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RoundEvent::Fragment(f) => Some(f.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(fragments, vec!["Beep", " boop", " love"]);
    }

    #[tokio::test]
    async fn test_empty_input_skips_round() {
        let lyrics = ScriptedLyrics::new(&["never"]);
        let covers = FixedCover::png();
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        for (artist, theme) in [("", "rain"), ("Adele", ""), ("", "")] {
            let outcome = session
                .submit(artist, theme, &lyrics, &covers, &mut events)
                .await
                .unwrap();
            assert!(matches!(outcome, RoundOutcome::Skipped));
        }

        assert!(session.log().is_empty());
        assert!(events.is_empty());
        assert!(lyrics.seen.lock().unwrap().is_empty());
        assert!(covers.prompts.lock().unwrap().is_empty());
        assert_eq!(session.state(), RoundState::Idle);
    }

    #[tokio::test]
    async fn test_whole_log_sent_as_context() {
        let lyrics = ScriptedLyrics::new(&["la"]);
        let covers = FixedCover::png();
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        session.submit("Adele", "rain", &lyrics, &covers, &mut events).await.unwrap();
        session.submit("Queen", "rhapsody", &lyrics, &covers, &mut events).await.unwrap();

        let seen = lyrics.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[1].len(), 3);
        assert_eq!(seen[1][1], ChatMessage::assistant("la"));
        assert_eq!(
            seen[1][2].content,
            "Write a song in the style of Queen about rhapsody."
        );
        assert_eq!(session.log().len(), 4);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_user_entry_only() {
        let mut lyrics = ScriptedLyrics::new(&[]);
        lyrics.fail_to_open = true;
        let covers = FixedCover::png();
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        let err = session
            .submit("Adele", "rain", &lyrics, &covers, &mut events)
            .await
            .unwrap_err();

        assert_eq!(err.stage, RoundState::AwaitingLyrics);
        assert!(err.to_string().starts_with("requesting lyrics failed: Workers AI API error 401"));
        assert_eq!(session.state(), RoundState::Failed);
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.log().messages()[0].role, ChatRole::User);
        assert!(covers.prompts.lock().unwrap().is_empty());
        assert!(matches!(
            events.last(),
            Some(RoundEvent::Failed { stage: RoundState::AwaitingLyrics, .. })
        ));
    }

    #[tokio::test]
    async fn test_decode_failure_mid_stream() {
        let mut lyrics = ScriptedLyrics::new(&["Hello"]);
        lyrics.fragments.push(Err(()));
        let covers = FixedCover::png();
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        let err = session
            .submit("Adele", "rain", &lyrics, &covers, &mut events)
            .await
            .unwrap_err();

        assert_eq!(err.stage, RoundState::LyricsStreaming);
        assert!(matches!(err.source, Error::Decode(_)));
        assert_eq!(session.log().len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_cover_fails_after_lyrics() {
        let lyrics = ScriptedLyrics::new(&["la"]);
        let covers = FixedCover {
            bytes: b"{\"error\":\"loading\"}".to_vec(),
            prompts: Mutex::new(Vec::new()),
        };
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        let err = session
            .submit("Adele", "rain", &lyrics, &covers, &mut events)
            .await
            .unwrap_err();

        assert_eq!(err.stage, RoundState::AwaitingCover);
        assert!(matches!(err.source, Error::NotAnImage { .. }));
        // Lyrics were already appended before the cover request
        assert_eq!(session.log().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_round_is_followed_by_fresh_round() {
        let mut failing = ScriptedLyrics::new(&[]);
        failing.fail_to_open = true;
        let working = ScriptedLyrics::new(&["again"]);
        let covers = FixedCover::png();
        let mut session = Session::new();
        let mut events: Vec<RoundEvent> = Vec::new();

        assert!(session.submit("A", "B", &failing, &covers, &mut events).await.is_err());
        session.submit("A", "B", &working, &covers, &mut events).await.unwrap();

        let roles: Vec<ChatRole> = session.log().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::User, ChatRole::Assistant]);
        assert_eq!(session.state(), RoundState::Idle);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let lyrics = ScriptedLyrics::new(&["x"]);
        let covers = FixedCover::png();
        let mut session = Session::new();
        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<RoundEvent>();

        session.submit("A", "B", &lyrics, &covers, &mut tx).await.unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event);
        }
        assert!(matches!(
            received.first(),
            Some(RoundEvent::StateChanged(RoundState::PromptReady))
        ));
        assert!(received.iter().any(|e| matches!(e, RoundEvent::Cover(_))));
    }

    #[test]
    fn test_busy_states() {
        assert!(!RoundState::Idle.is_busy());
        assert!(!RoundState::Failed.is_busy());
        assert!(RoundState::LyricsStreaming.is_busy());
        assert!(RoundState::AwaitingCover.is_busy());
    }
}
