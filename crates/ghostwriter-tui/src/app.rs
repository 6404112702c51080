use std::path::{Path, PathBuf};
use std::sync::Arc;

use ghostwriter_core::{
    AlbumCover, CoverGenerator, LyricsGenerator, RoundEvent, RoundOutcome, RoundState, Session,
    SongRequest,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::tui::{AppEvent, RoundFinished, RoundForwarder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Artist,
    Theme,
}

impl InputField {
    pub fn toggle(self) -> Self {
        match self {
            InputField::Artist => InputField::Theme,
            InputField::Theme => InputField::Artist,
        }
    }
}

/// Single-line text input with a character-indexed cursor
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TextInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }
}

/// One block of the chat transcript
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    User { artist: String, theme: String },
    Assistant(String),
    Cover {
        caption: String,
        path: PathBuf,
        mime_type: &'static str,
        size: usize,
    },
    Error(String),
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: InputField,
    pub artist: TextInput,
    pub theme: TextInput,

    // Transcript mirrored from round events
    pub transcript: Vec<TranscriptEntry>,
    pub streaming: Option<String>,
    pub round_state: RoundState,
    current_request: Option<SongRequest>,

    // Held here between rounds, moved into the round task while one runs
    pub session: Option<Session>,

    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub follow_output: bool,
    pub animation_frame: u8,

    pub model: String,
    pub covers_dir: PathBuf,
    lyrics: Arc<dyn LyricsGenerator>,
    covers: Arc<dyn CoverGenerator>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        lyrics: Arc<dyn LyricsGenerator>,
        covers: Arc<dyn CoverGenerator>,
        model: &str,
        covers_dir: PathBuf,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: InputField::Artist,
            artist: TextInput::default(),
            theme: TextInput::default(),
            transcript: Vec::new(),
            streaming: None,
            round_state: RoundState::Idle,
            current_request: None,
            session: Some(Session::new()),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_output: true,
            animation_frame: 0,
            model: model.to_string(),
            covers_dir,
            lyrics,
            covers,
            events,
        }
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        match self.focus {
            InputField::Artist => &mut self.artist,
            InputField::Theme => &mut self.theme,
        }
    }

    /// Start a round in a background task.
    ///
    /// Returns false when nothing was started: an input is empty or a round
    /// is already in flight.
    pub fn submit_round(&mut self) -> bool {
        if SongRequest::new(&self.artist.value, &self.theme.value).is_none() {
            return false;
        }
        let Some(mut session) = self.session.take() else {
            debug!("round already in flight, ignoring submit");
            return false;
        };

        let lyrics = Arc::clone(&self.lyrics);
        let covers = Arc::clone(&self.covers);
        let tx = self.events.clone();
        let artist = self.artist.value.clone();
        let theme = self.theme.value.clone();
        self.follow_output = true;

        tokio::spawn(async move {
            let mut sink = RoundForwarder(tx.clone());
            let result = session
                .submit(&artist, &theme, lyrics.as_ref(), covers.as_ref(), &mut sink)
                .await;
            let _ = tx.send(AppEvent::RoundFinished(Box::new(RoundFinished {
                session,
                result,
            })));
        });
        true
    }

    pub fn apply_round_event(&mut self, event: RoundEvent) {
        match event {
            RoundEvent::StateChanged(state) => self.round_state = state,
            RoundEvent::UserPrompt(request) => {
                self.transcript.push(TranscriptEntry::User {
                    artist: request.artist().to_string(),
                    theme: request.theme().to_string(),
                });
                self.current_request = Some(request);
            }
            RoundEvent::Fragment(text) => {
                self.streaming.get_or_insert_with(String::new).push_str(&text);
            }
            RoundEvent::Lyrics(text) => {
                self.streaming = None;
                self.transcript.push(TranscriptEntry::Assistant(text));
            }
            RoundEvent::Cover(cover) => self.store_cover(&cover),
            RoundEvent::Failed { message, .. } => {
                self.streaming = None;
                self.transcript.push(TranscriptEntry::Error(message));
            }
        }

        if self.follow_output {
            self.scroll_to_bottom();
        }
    }

    fn store_cover(&mut self, cover: &AlbumCover) {
        let stem = self
            .current_request
            .as_ref()
            .map(|r| r.slug())
            .unwrap_or_else(|| "cover".to_string());

        match cover.save_in(&self.covers_dir, &stem) {
            Ok(path) => {
                info!(path = %path.display(), "album cover saved");
                self.transcript.push(TranscriptEntry::Cover {
                    caption: cover.caption().to_string(),
                    path,
                    mime_type: cover.mime_type(),
                    size: cover.bytes().len(),
                });
            }
            Err(e) => {
                warn!(error = %e, "could not save album cover");
                self.transcript
                    .push(TranscriptEntry::Error(format!("Could not save album cover: {}", e)));
            }
        }
    }

    pub fn finish_round(&mut self, finished: RoundFinished) {
        let RoundFinished { session, result } = finished;
        match &result {
            Ok(RoundOutcome::Completed(round)) => {
                info!(lyrics_len = round.lyrics.len(), "round finished")
            }
            Ok(RoundOutcome::Skipped) => {}
            Err(e) => warn!(error = %e, "round ended in failure"),
        }
        self.round_state = session.state();
        self.session = Some(session);
        self.current_request = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.round_state.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Rendered height of the transcript, matching the layout in `ui`
    pub fn transcript_height(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: usize = 0;
        for entry in &self.transcript {
            total += match entry {
                TranscriptEntry::User { artist, theme } => {
                    1 + wrapped_lines(&format!("Artist: {}", artist), width)
                        + wrapped_lines(&format!("Theme: {}", theme), width)
                }
                TranscriptEntry::Assistant(text) | TranscriptEntry::Error(text) => {
                    1 + wrapped_lines(text, width)
                }
                TranscriptEntry::Cover {
                    caption,
                    path,
                    mime_type,
                    size,
                } => {
                    1 + wrapped_lines(caption, width)
                        + wrapped_lines(&cover_details(path, mime_type, *size), width)
                }
            };
            total += 1; // Blank line after entry
        }

        if self.round_state.is_busy() {
            total += 1 + self
                .streaming
                .as_deref()
                .map(|text| wrapped_lines(text, width))
                .unwrap_or(1);
        }

        total.min(u16::MAX as usize) as u16
    }

    pub fn scroll_to_bottom(&mut self) {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_scroll = self.transcript_height().saturating_sub(visible_height);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let visible_height = self.chat_height.max(1);
        let max_scroll = self.transcript_height().saturating_sub(visible_height);
        self.chat_scroll = (self.chat_scroll + lines).min(max_scroll);
        self.follow_output = self.chat_scroll >= max_scroll;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_output = false;
    }
}

/// Second line of a cover entry: where it was saved, its type and size
pub fn cover_details(path: &Path, mime_type: &str, size: usize) -> String {
    format!("{} ({}, {} KB)", path.display(), mime_type, size.div_ceil(1024))
}

/// Number of terminal rows `text` takes when wrapped at `width` columns
pub fn wrapped_lines(text: &str, width: usize) -> usize {
    let width = width.max(1);
    let lines: usize = text
        .lines()
        .map(|line| {
            // Use character count, not byte length, for proper UTF-8 handling
            let chars = line.chars().count();
            if chars == 0 {
                1
            } else {
                chars.div_ceil(width)
            }
        })
        .sum();
    lines.max(1)
}
