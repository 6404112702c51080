pub mod ai;
pub mod config;
pub mod cover;
pub mod error;
pub mod prompt;
pub mod session;
pub mod state;
pub mod stream;

// Re-export main types for convenience
pub use ai::{HuggingFaceClient, WorkersAiClient};
pub use config::{Config, Credentials};
pub use cover::AlbumCover;
pub use error::{Error, ErrorKind};
pub use prompt::SongRequest;
pub use session::{
    CompletedRound, CoverGenerator, LyricsGenerator, RoundError, RoundEvent, RoundOutcome,
    RoundSink, RoundState, Session,
};
pub use state::{ChatMessage, ChatRole, ConversationLog};
pub use stream::{decode_line, iter_tokens, token_stream, StreamEvent, TokenStream};
