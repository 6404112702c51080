//! Album cover images returned by the image-generation API

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use infer::MatcherType;

use crate::error::Error;

/// An encoded image plus the caption it is displayed with
#[derive(Clone)]
pub struct AlbumCover {
    bytes: Vec<u8>,
    mime_type: &'static str,
    extension: &'static str,
    caption: String,
}

impl AlbumCover {
    /// Check that `bytes` hold an encoded image and detect its format.
    pub fn decode(bytes: Vec<u8>, caption: impl Into<String>) -> Result<Self, Error> {
        let kind = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == MatcherType::Image)
            .ok_or(Error::NotAnImage { len: bytes.len() })?;

        Ok(Self {
            mime_type: kind.mime_type(),
            extension: kind.extension(),
            bytes,
            caption: caption.into(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Write the image to `dir` as `{stem}-{timestamp}.{ext}`, creating the
    /// directory if needed.
    pub fn save_in(&self, dir: &Path, stem: &str) -> Result<PathBuf, Error> {
        fs::create_dir_all(dir)?;

        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut path = dir.join(format!("{}-{}.{}", stem, timestamp, self.extension));

        // Two rounds for the same request within one second
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = dir.join(format!("{}-{}-{}.{}", stem, timestamp, n, self.extension));
        }

        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

impl fmt::Debug for AlbumCover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumCover")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .field("caption", &self.caption)
            .finish()
    }
}
