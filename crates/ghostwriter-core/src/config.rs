use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::ai::{huggingface, workers};

pub const ACCOUNT_ID_VAR: &str = "CLOUDFLARE_ACCOUNT_ID";
pub const CLOUDFLARE_TOKEN_VAR: &str = "CLOUDFLARE_API_TOKEN";
pub const HUGGINGFACE_TOKEN_VAR: &str = "HUGGINGFACE_API_TOKEN";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub text_model: Option<String>,
    pub image_model_url: Option<String>,
    pub cloudflare_api_base: Option<String>,
    pub covers_dir: Option<PathBuf>,
    pub cloudflare_account_id: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub huggingface_api_token: Option<String>,
}

/// The three secrets needed for a round
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub cloudflare_account_id: String,
    pub cloudflare_api_token: String,
    pub huggingface_api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("cloudflare_account_id", &self.cloudflare_account_id)
            .field("cloudflare_api_token", &"<redacted>")
            .field("huggingface_api_token", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn text_model(&self) -> &str {
        self.text_model.as_deref().unwrap_or(workers::DEFAULT_MODEL)
    }

    pub fn image_model_url(&self) -> &str {
        self.image_model_url
            .as_deref()
            .unwrap_or(huggingface::DEFAULT_MODEL_URL)
    }

    pub fn cloudflare_api_base(&self) -> &str {
        self.cloudflare_api_base
            .as_deref()
            .unwrap_or(workers::DEFAULT_API_BASE)
    }

    /// Where generated covers are written for viewing
    pub fn covers_dir(&self) -> PathBuf {
        self.covers_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("ghostwriter").join("covers"))
                .unwrap_or_else(|| PathBuf::from("covers"))
        })
    }

    /// Resolve credentials, environment variables first, then the config file
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    pub fn credentials_with<F>(&self, lookup: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |var: &str, fallback: &Option<String>| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .or_else(|| fallback.clone())
                .ok_or_else(|| anyhow!("{} is not set (environment, .env or config file)", var))
        };

        Ok(Credentials {
            cloudflare_account_id: resolve(ACCOUNT_ID_VAR, &self.cloudflare_account_id)?,
            cloudflare_api_token: resolve(CLOUDFLARE_TOKEN_VAR, &self.cloudflare_api_token)?,
            huggingface_api_token: resolve(HUGGINGFACE_TOKEN_VAR, &self.huggingface_api_token)?,
        })
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ghostwriter").join("config.json"))
    }
}
