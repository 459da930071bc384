use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store;

/// OAuth bearer credential as cached on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Build a token from a token-endpoint response, turning the relative
    /// `expires_in` into an absolute expiry.
    pub fn issued(
        access_token: String,
        token_type: Option<String>,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Token {
            access_token,
            token_type: token_type.unwrap_or_else(default_token_type),
            refresh_token,
            expiry: expires_in
                .and_then(Duration::try_seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime)),
        }
    }

    /// Informational only; nothing refreshes a token ahead of use.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|exp| exp <= now)
    }
}

/// The cached token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `StoreError::NotFound` is the expected first-run answer; only
    /// `Decode` and `Io` indicate something is wrong with the cache.
    pub fn load(&self) -> Result<Token, StoreError> {
        let token: Token = store::read_json(&self.path)?;
        debug!("Loaded cached token from {}", self.path.display());
        Ok(token)
    }

    pub fn save(&self, token: &Token) -> Result<(), StoreError> {
        store::write_json(&self.path, token)?;
        info!("Saved credential file to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted token file at {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No token file found to delete.");
                Ok(())
            }
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_token() -> Token {
        Token {
            access_token: "ya29.access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Some(Utc.with_ymd_and_hms(2030, 5, 1, 12, 30, 15).unwrap()),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("ytup/token.json"));

        let token = sample_token();
        store.save(&token).unwrap();
        assert_eq!(store.load().unwrap(), token);
    }

    #[test]
    fn save_overwrites_previous_token() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&sample_token()).unwrap();
        let newer = Token {
            access_token: "ya29.newer".to_string(),
            refresh_token: None,
            expiry: None,
            ..sample_token()
        };
        store.save(&newer).unwrap();

        assert_eq!(store.load().unwrap(), newer);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        assert!(store.load().unwrap_err().is_not_found());
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{\"access_tok").unwrap();

        let err = TokenStore::new(&path).load().unwrap_err();
        assert!(err.is_decode());
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample_token()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn clear_without_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.clear().unwrap();
        store.save(&sample_token()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap_err().is_not_found());
    }

    #[test]
    fn issued_computes_absolute_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let token = Token::issued("abc".into(), None, None, Some(3600), now);

        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expiry, Some(now + Duration::hours(1)));
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::hours(2)));
    }

    #[test]
    fn out_of_range_lifetime_leaves_expiry_unset() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for secs in [i64::MAX, i64::MIN] {
            let token = Token::issued("abc".into(), None, None, Some(secs), now);
            assert_eq!(token.expiry, None);
            assert!(!token.is_expired(now));
        }
    }

    #[test]
    fn reads_token_without_optional_fields() {
        let token: Token = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.refresh_token, None);
    }
}
