//! Bot token storage.

use std::path::{Path, PathBuf};

use ratewatch_protocols::MessagingError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Contents of the credential file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramCredentials {
    pub bot_token: String,
}

impl TelegramCredentials {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into().trim().to_string(),
        }
    }
}

/// TOML file holding the bot token.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the stored credentials. `Ok(None)` when the file does not exist;
    /// an unreadable or malformed file is an error.
    pub fn load(&self) -> Result<Option<TelegramCredentials>, MessagingError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };

        let credentials: TelegramCredentials = toml::from_str(&content).map_err(|e| self.error(e))?;
        if credentials.bot_token.trim().is_empty() {
            return Err(self.error("bot_token is empty"));
        }
        Ok(Some(credentials))
    }

    /// Write credentials, creating parent directories as needed.
    pub fn save(&self, credentials: &TelegramCredentials) -> Result<(), MessagingError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }

        let content = toml::to_string(credentials).map_err(|e| self.error(e))?;
        std::fs::write(&self.path, content).map_err(|e| self.error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.error(e))?;
        }

        info!("Saved bot credentials to {}", self.path.display());
        Ok(())
    }

    fn error(&self, reason: impl std::fmt::Display) -> MessagingError {
        MessagingError::CredentialStore(format!("{}: {}", self.path.display(), reason))
    }
}
