use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::{AuthorizationFlow, AuthorizationServer, CodePrompt};
use crate::error::{ClientError, StoreError};
use crate::token::{Token, TokenStore};

/// The session's credential: a token plus the endpoint it is valid for.
/// Built once per run and handed to every remote operation.
#[derive(Debug, Clone)]
pub struct AuthenticatedHandle {
    token: Token,
    api_base_url: String,
}

impl AuthenticatedHandle {
    pub fn new(token: Token, api_base_url: impl Into<String>) -> Self {
        AuthenticatedHandle {
            token,
            api_base_url: api_base_url.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

/// Cached token first, interactive authorization only when there is none.
pub struct CredentialedClient<S, P> {
    store: TokenStore,
    flow: AuthorizationFlow<S, P>,
    api_base_url: String,
}

impl<S: AuthorizationServer, P: CodePrompt> CredentialedClient<S, P> {
    pub fn new(
        store: TokenStore,
        flow: AuthorizationFlow<S, P>,
        api_base_url: impl Into<String>,
    ) -> Self {
        CredentialedClient {
            store,
            flow,
            api_base_url: api_base_url.into(),
        }
    }

    /// Consumes the client, so the authorization flow runs at most once.
    ///
    /// A cached token is used as-is; an expired one surfaces as an
    /// `Unauthorized` error on the first remote call.
    pub fn acquire(mut self) -> Result<AuthenticatedHandle, ClientError> {
        let token = match self.store.load() {
            Ok(token) => {
                info!("Using cached credentials from {}", self.store.path().display());
                if token.is_expired(Utc::now()) {
                    debug!("Cached access token is past its expiry, using it anyway");
                }
                token
            }
            Err(err @ (StoreError::NotFound(_) | StoreError::Decode { .. })) => {
                if err.is_decode() {
                    warn!("Ignoring unreadable credential cache: {err}");
                }
                let token = self.flow.obtain_token()?;
                self.store.save(&token)?;
                token
            }
            Err(err) => return Err(err.into()),
        };

        Ok(AuthenticatedHandle::new(token, self.api_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use reqwest::Url;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingServer {
        exchanges: Cell<u32>,
    }

    impl AuthorizationServer for CountingServer {
        fn authorization_url(&self, _: &str, _: &str) -> Result<Url, AuthError> {
            Ok(Url::parse("https://auth.test/").unwrap())
        }

        fn exchange_code(&self, code: &str, _: &str) -> Result<Token, AuthError> {
            self.exchanges.set(self.exchanges.get() + 1);
            Ok(Token {
                access_token: format!("fresh-{code}"),
                token_type: "Bearer".into(),
                refresh_token: Some("refresh".into()),
                expiry: None,
            })
        }
    }

    struct FixedPrompt;

    impl CodePrompt for FixedPrompt {
        fn redirect_uri(&self) -> String {
            "urn:test".into()
        }

        fn wait_for_code(&mut self, _: &Url) -> Result<String, AuthError> {
            Ok("code".into())
        }
    }

    fn client<'a>(
        store: &TokenStore,
        server: &'a CountingServer,
    ) -> CredentialedClient<&'a CountingServer, FixedPrompt> {
        CredentialedClient::new(
            store.clone(),
            AuthorizationFlow::new(server, FixedPrompt),
            "https://api.test",
        )
    }

    fn server() -> CountingServer {
        CountingServer {
            exchanges: Cell::new(0),
        }
    }

    #[test]
    fn cached_token_skips_authorization() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let cached = Token {
            access_token: "cached".into(),
            token_type: "Bearer".into(),
            refresh_token: None,
            expiry: None,
        };
        store.save(&cached).unwrap();

        let server = server();
        let handle = client(&store, &server).acquire().unwrap();

        assert_eq!(handle.access_token(), "cached");
        assert_eq!(handle.api_base_url(), "https://api.test");
        assert_eq!(server.exchanges.get(), 0);
    }

    #[test]
    fn missing_token_authorizes_once_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("ytup/token.json"));

        let server = server();
        let handle = client(&store, &server).acquire().unwrap();

        assert_eq!(handle.access_token(), "fresh-code");
        assert_eq!(server.exchanges.get(), 1);
        assert_eq!(store.load().unwrap().access_token, handle.access_token());
    }

    #[test]
    fn corrupt_token_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = TokenStore::new(&path);

        let server = server();
        client(&store, &server).acquire().unwrap();

        assert_eq!(server.exchanges.get(), 1);
        assert_eq!(store.load().unwrap().access_token, "fresh-code");
    }
}
