use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

const OPENAI_KEY_VARS: &[&str] = &["OPENAI_API_KEY"];
const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// API keys for the two providers. `Debug` never prints the values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("openai", &redact(&self.openai))
            .field("gemini", &redact(&self.gemini))
            .finish()
    }
}

impl Credentials {
    pub fn new(openai: impl Into<String>, gemini: impl Into<String>) -> Self {
        Self {
            openai: Some(openai.into()),
            gemini: Some(gemini.into()),
        }
    }

    /// Both keys present and non-blank.
    pub fn is_complete(&self) -> bool {
        let filled = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.openai) && filled(&self.gemini)
    }

    /// Fill from the first non-empty of `OPENAI_API_KEY` and
    /// `GEMINI_API_KEY`/`GOOGLE_API_KEY`.
    pub fn from_env(env: &Env) -> Self {
        let lookup = |keys: &[&str]| keys.iter().find_map(|key| env.get(key));
        Self {
            openai: lookup(OPENAI_KEY_VARS),
            gemini: lookup(GEMINI_KEY_VARS),
        }
    }
}

/// Dotenv-style variables layered over the process environment.
#[derive(Clone, Default)]
pub struct Env {
    pub dotenv: BTreeMap<String, String>,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.dotenv.keys().map(String::as_str).collect();
        f.debug_struct("Env").field("dotenv_keys", &keys).finish()
    }
}

impl Env {
    pub fn parse_dotenv(contents: &str) -> Self {
        let mut dotenv = BTreeMap::<String, String>::new();
        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim();
            let Some((raw_key, raw_value)) = line.split_once('=') else {
                continue;
            };
            let key = raw_key.trim();
            if key.is_empty() {
                continue;
            }

            let mut value = raw_value.trim().to_string();
            if let Some(stripped) = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            {
                value = stripped.to_string();
            }
            if value.trim().is_empty() {
                continue;
            }
            dotenv.insert(key.to_string(), value);
        }
        Self { dotenv }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.dotenv.get(key) {
            return Some(value.clone());
        }
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

/// Persistence boundary for credentials. The core is agnostic to whether
/// the backing store encrypts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Credentials>;
    async fn save(&self, credentials: &Credentials) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Stores credentials as a JSON file at `path`.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Credentials> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Credentials::default());
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(credentials) => Ok(credentials),
            Err(err) => {
                // Corrupted store: drop it rather than fail every load.
                tracing::warn!(path = %self.path.display(), error = %err, "clearing unreadable credential store");
                self.clear().await?;
                Ok(Credentials::default())
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(credentials)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
