//! Prompt templates derived from the artist and theme inputs

/// A validated pair of user inputs for one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    artist: String,
    theme: String,
}

impl SongRequest {
    /// Returns `None` when either field is empty, which suppresses the round.
    pub fn new(artist: &str, theme: &str) -> Option<Self> {
        if artist.is_empty() || theme.is_empty() {
            return None;
        }
        Some(Self {
            artist: artist.to_string(),
            theme: theme.to_string(),
        })
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn lyric_prompt(&self) -> String {
        format!("Write a song in the style of {} about {}.", self.artist, self.theme)
    }

    pub fn image_prompt(&self) -> String {
        format!(
            "Album cover for {} with a theme of {}, highly artistic and visually captivating.",
            self.artist, self.theme
        )
    }

    pub fn caption(&self) -> String {
        format!("Album Cover for {} - {}", self.artist, self.theme)
    }

    /// File-name friendly form of artist and theme, e.g. `daft-punk-robots`
    pub fn slug(&self) -> String {
        let words: Vec<String> = format!("{} {}", self.artist, self.theme)
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_ascii_lowercase())
            .collect();

        if words.is_empty() {
            "cover".to_string()
        } else {
            words.join("-")
        }
    }
}
