use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "ytup";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com";

const TOKEN_FILE: &str = "token.json";
const CATALOG_FILE: &str = "latest_videos.json";
const CLIENT_SECRET_FILE: &str = "client_secret.json";
const DEFAULTS_FILE: &str = "defaults.json";

/// Where ytup keeps its files and which API endpoint it talks to.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_dir: PathBuf,
    pub api_base_url: String,
}

impl AppConfig {
    /// Resolve the configuration from `YTUP_CONFIG_DIR` and
    /// `YTUP_API_BASE_URL`, falling back to `~/.config/ytup` and the public
    /// API endpoint.
    pub fn from_env() -> Result<Self> {
        let config_dir = match std::env::var_os("YTUP_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .context("Could not determine config directory")?
                .join(APP_DIR),
        };
        let api_base_url = std::env::var("YTUP_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());

        Ok(AppConfig {
            config_dir,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn in_dir(config_dir: impl Into<PathBuf>) -> Self {
        AppConfig {
            config_dir: config_dir.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.config_dir.join(TOKEN_FILE)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.config_dir.join(CATALOG_FILE)
    }

    pub fn client_secret_path(&self) -> PathBuf {
        self.config_dir.join(CLIENT_SECRET_FILE)
    }

    pub fn defaults_path(&self) -> PathBuf {
        self.config_dir.join(DEFAULTS_FILE)
    }

    pub fn load_client_config(&self) -> Result<ClientConfig> {
        ClientConfig::from_file(&self.client_secret_path())
    }
}

/// OAuth client registration, as downloaded from the provider console.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientConfig>,
    web: Option<ClientConfig>,
}

impl ClientConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "OAuth client secret not found at {}\n\n\
                Create an OAuth client of type \"Desktop app\" for the YouTube Data API v3\n\
                and save its JSON download at that path.",
                path.display()
            );
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client secret from {}", path.display()))?;
        Self::from_json(&data)
            .with_context(|| format!("Failed to parse client secret from {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(data)?;
        file.installed
            .or(file.web)
            .context("client secret has neither an `installed` nor a `web` section")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_installed_client_secret() {
        let config = ClientConfig::from_json(
            r#"{"installed":{"client_id":"id.apps","client_secret":"shh",
                "auth_uri":"https://auth.example/auth","token_uri":"https://auth.example/token",
                "redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();

        assert_eq!(config.client_id, "id.apps");
        assert_eq!(config.client_secret.as_deref(), Some("shh"));
        assert_eq!(config.token_uri, "https://auth.example/token");
    }

    #[test]
    fn web_section_and_defaults() {
        let config = ClientConfig::from_json(r#"{"web":{"client_id":"web.apps"}}"#).unwrap();
        assert_eq!(config.auth_uri, default_auth_uri());
        assert_eq!(config.token_uri, default_token_uri());
        assert!(config.redirect_uris.is_empty());
    }

    #[test]
    fn rejects_secret_without_known_section() {
        assert!(ClientConfig::from_json(r#"{"other":{}}"#).is_err());
    }

    #[test]
    fn missing_client_secret_names_the_path() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::in_dir(dir.path());

        let err = config.load_client_config().unwrap_err().to_string();
        assert!(err.contains("client_secret.json"));
    }

    #[test]
    fn file_paths_live_in_config_dir() {
        let config = AppConfig::in_dir("/tmp/ytup-test");
        assert_eq!(config.token_path(), Path::new("/tmp/ytup-test/token.json"));
        assert_eq!(
            config.catalog_path(),
            Path::new("/tmp/ytup-test/latest_videos.json")
        );
    }
}
