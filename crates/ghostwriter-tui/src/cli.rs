//! Non-interactive `write` subcommand: one round streamed to stdout

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::*;
use ghostwriter_core::{
    CoverGenerator, LyricsGenerator, RoundEvent, RoundOutcome, RoundSink, RoundState, Session,
};

/// Prints round progress as it happens and saves the cover to disk
pub struct TerminalSink<W: Write> {
    out: W,
    covers_dir: PathBuf,
    slug: String,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, covers_dir: &Path) -> Self {
        Self {
            out,
            covers_dir: covers_dir.to_path_buf(),
            slug: "cover".to_string(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RoundSink for TerminalSink<W> {
    // Output errors are ignored: a closed stdout must not abort the round
    fn on_event(&mut self, event: RoundEvent) {
        match event {
            RoundEvent::UserPrompt(request) => {
                self.slug = request.slug();
                let _ = writeln!(self.out, "{} {}", "Artist:".bold(), request.artist());
                let _ = writeln!(self.out, "{} {}\n", "Theme:".bold(), request.theme());
            }
            RoundEvent::StateChanged(RoundState::AwaitingLyrics) => {
                let _ = writeln!(self.out, "{}", "🎤 Writing lyrics...".dimmed());
            }
            RoundEvent::StateChanged(RoundState::AwaitingCover) => {
                let _ = writeln!(self.out, "{}", "🎨 Painting the album cover...".dimmed());
            }
            RoundEvent::StateChanged(_) => {}
            RoundEvent::Fragment(text) => {
                let _ = write!(self.out, "{}", text);
                let _ = self.out.flush();
            }
            RoundEvent::Lyrics(_) => {
                let _ = writeln!(self.out, "\n");
            }
            RoundEvent::Cover(cover) => match cover.save_in(&self.covers_dir, &self.slug) {
                Ok(path) => {
                    let _ = writeln!(self.out, "{}", cover.caption().italic());
                    let _ = writeln!(
                        self.out,
                        "{} {} ({})",
                        "Saved to".green(),
                        path.display(),
                        cover.mime_type()
                    );
                }
                Err(e) => {
                    let _ = writeln!(self.out, "{}: {}", "Could not save album cover".red(), e);
                }
            },
            // Reported by the caller through the returned error
            RoundEvent::Failed { .. } => {
                let _ = writeln!(self.out);
            }
        }
    }
}

/// Run a single round, streaming lyrics to `out`
pub async fn write_song<L, C, W>(
    lyrics: &L,
    covers: &C,
    covers_dir: &Path,
    artist: &str,
    theme: &str,
    out: W,
) -> Result<W>
where
    L: LyricsGenerator + ?Sized,
    C: CoverGenerator + ?Sized,
    W: Write + Send,
{
    let mut session = Session::new();
    let mut sink = TerminalSink::new(out, covers_dir);

    match session.submit(artist, theme, lyrics, covers, &mut sink).await? {
        RoundOutcome::Skipped => {
            let _ = writeln!(
                sink.out,
                "{}",
                "Nothing to write: both an artist and a theme are needed".yellow()
            );
        }
        RoundOutcome::Completed(_) => {}
    }

    Ok(sink.into_inner())
}
