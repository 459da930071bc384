// Interactive OAuth authorization-code exchange.
//
// The flow builds an authorization URL, hands it to a `CodePrompt` that
// gets the user's one-time code back (pasted at the console or caught on a
// loopback redirect), and trades the code for a `Token`. There is no retry
// loop: any failure ends the run and the user starts over.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};

use chrono::Utc;
use dialoguer::Input;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::token::Token;

pub const SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
const STATE: &str = "state-token";

/// The provider's authorization endpoint and token endpoint.
pub trait AuthorizationServer {
    fn authorization_url(&self, redirect_uri: &str, scope: &str) -> Result<Url, AuthError>;
    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Token, AuthError>;
}

/// Gets the authorization code back from the user.
pub trait CodePrompt {
    fn redirect_uri(&self) -> String;
    fn wait_for_code(&mut self, authorization_url: &Url) -> Result<String, AuthError>;
}

impl<T: AuthorizationServer + ?Sized> AuthorizationServer for &T {
    fn authorization_url(&self, redirect_uri: &str, scope: &str) -> Result<Url, AuthError> {
        (**self).authorization_url(redirect_uri, scope)
    }

    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Token, AuthError> {
        (**self).exchange_code(code, redirect_uri)
    }
}

pub struct AuthorizationFlow<S, P> {
    server: S,
    prompt: P,
}

impl<S: AuthorizationServer, P: CodePrompt> AuthorizationFlow<S, P> {
    pub fn new(server: S, prompt: P) -> Self {
        AuthorizationFlow { server, prompt }
    }

    pub fn obtain_token(&mut self) -> Result<Token, AuthError> {
        let redirect_uri = self.prompt.redirect_uri();
        let url = self.server.authorization_url(&redirect_uri, SCOPE)?;
        info!("Requesting authorization for scope {}", SCOPE);

        let code = self.prompt.wait_for_code(&url)?;
        let token = self.server.exchange_code(&code, &redirect_uri)?;
        info!("Authorization code exchanged for a new token");
        Ok(token)
    }
}

/// `AuthorizationServer` backed by the endpoints in the client secret.
pub struct OAuthServer {
    client: Client,
    config: ClientConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl OAuthServer {
    pub fn new(config: ClientConfig) -> Result<Self, AuthError> {
        let client = Client::builder().build()?;
        Ok(OAuthServer { client, config })
    }
}

impl AuthorizationServer for OAuthServer {
    fn authorization_url(&self, redirect_uri: &str, scope: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.config.auth_uri,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope),
                ("access_type", "offline"),
                ("state", STATE),
            ],
        )
        .map_err(|e| AuthError::Config(format!("bad auth_uri {}: {e}", self.config.auth_uri)))
    }

    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Token, AuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let res = self
            .client
            .post(&self.config.token_uri)
            .form(&params)
            .send()?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => body,
            };
            return Err(AuthError::Exchange(format!("{status}: {reason}")));
        }

        let res: TokenResponse = res.json()?;
        Ok(Token::issued(
            res.access_token,
            res.token_type,
            res.refresh_token,
            res.expires_in,
            Utc::now(),
        ))
    }
}

/// Prints the authorization URL and waits for the code to be pasted back.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl CodePrompt for ConsolePrompt {
    fn redirect_uri(&self) -> String {
        OOB_REDIRECT_URI.to_string()
    }

    fn wait_for_code(&mut self, authorization_url: &Url) -> Result<String, AuthError> {
        println!(
            "Go to the following link in your browser then type the authorization code:\n{}\n",
            authorization_url
        );

        let code: String = Input::new()
            .with_prompt("Authorization code")
            .allow_empty(true)
            .interact_text()
            .map_err(|err| match err.kind() {
                io::ErrorKind::Interrupted => AuthError::Cancelled,
                _ => AuthError::Prompt(err),
            })?;

        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::Cancelled);
        }
        Ok(code.to_string())
    }
}

/// Catches the browser redirect on a local port instead of asking the user
/// to copy the code by hand.
pub struct LoopbackPrompt {
    listener: TcpListener,
    port: u16,
}

impl LoopbackPrompt {
    pub fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        let port = listener.local_addr()?.port();
        Ok(LoopbackPrompt { listener, port })
    }
}

impl CodePrompt for LoopbackPrompt {
    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    fn wait_for_code(&mut self, authorization_url: &Url) -> Result<String, AuthError> {
        println!(
            "Open the following link in your browser to authorize ytup:\n{}\n",
            authorization_url
        );
        info!("Waiting for the authorization redirect on port {}", self.port);

        loop {
            let (stream, _) = self.listener.accept().map_err(AuthError::Prompt)?;
            let target = match request_target(&stream) {
                Ok(target) => target,
                Err(err) => {
                    debug!("Dropping unreadable connection: {err}");
                    continue;
                }
            };

            let outcome = match code_from_redirect(&target) {
                Ok(None) => {
                    debug!("Ignoring request for `{target}` while waiting for the redirect");
                    respond(&stream, "404 Not Found", "Waiting for the authorization redirect.");
                    continue;
                }
                Ok(Some(code)) => Ok(code),
                Err(err) => Err(err),
            };

            let body = match outcome {
                Ok(_) => "Authorization received. You can close this tab and return to the terminal.",
                Err(_) => "Authorization failed. Return to the terminal for details.",
            };
            respond(&stream, "200 OK", body);
            return outcome;
        }
    }
}

/// Request target of an HTTP request line. The headers are drained so the
/// socket is not reset on close. An empty connection reads as `/`.
fn request_target(stream: &TcpStream) -> io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
        let mut header = String::new();
        let read = reader.read_line(&mut header)?;
        if read == 0 || header.trim().is_empty() {
            break;
        }
    }
    Ok(request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string())
}

fn respond(mut stream: &TcpStream, status: &str, body: &str) {
    let reply = write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    if let Err(err) = reply {
        warn!("Could not answer the browser: {err}");
    }
}

/// `None` when the request is not the authorization redirect at all.
fn code_from_redirect(target: &str) -> Result<Option<String>, AuthError> {
    let url = Url::parse("http://127.0.0.1/")
        .and_then(|base| base.join(target))
        .map_err(|e| AuthError::Exchange(format!("malformed redirect `{target}`: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return Ok(None);
    }
    if state.as_deref() != Some(STATE) {
        return Err(AuthError::Exchange("state mismatch".into()));
    }
    if let Some(error) = error {
        warn!("Authorization server redirected with error `{error}`");
        return Err(AuthError::Cancelled);
    }

    code.filter(|c| !c.is_empty())
        .map(Some)
        .ok_or_else(|| AuthError::Exchange("redirect carried no authorization code".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::cell::RefCell;
    use std::io::Read;

    fn client_config() -> ClientConfig {
        ClientConfig {
            client_id: "client.apps".into(),
            client_secret: Some("secret".into()),
            auth_uri: "https://accounts.example.com/o/oauth2/auth".into(),
            token_uri: "https://oauth2.example.com/token".into(),
            redirect_uris: vec![],
        }
    }

    #[test]
    fn authorization_url_carries_offline_access_and_scope() {
        let server = OAuthServer::new(client_config()).unwrap();
        let url = server.authorization_url(OOB_REDIRECT_URI, SCOPE).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(url.as_str().starts_with("https://accounts.example.com/o/oauth2/auth?"));
        assert!(pairs.contains(&("client_id".into(), "client.apps".into())));
        assert!(pairs.contains(&("redirect_uri".into(), OOB_REDIRECT_URI.into())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("scope".into(), SCOPE.into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
    }

    #[test]
    fn bad_auth_uri_is_a_config_error() {
        let mut config = client_config();
        config.auth_uri = "not a url".into();
        let server = OAuthServer::new(config).unwrap();

        let err = server.authorization_url(OOB_REDIRECT_URI, SCOPE).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    struct FakeServer {
        exchanged: RefCell<Vec<(String, String)>>,
    }

    impl AuthorizationServer for FakeServer {
        fn authorization_url(&self, redirect_uri: &str, scope: &str) -> Result<Url, AuthError> {
            Ok(Url::parse_with_params(
                "https://auth.test/",
                &[("redirect_uri", redirect_uri), ("scope", scope)],
            )
            .unwrap())
        }

        fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Token, AuthError> {
            self.exchanged
                .borrow_mut()
                .push((code.to_string(), redirect_uri.to_string()));
            Ok(Token {
                access_token: format!("token-for-{code}"),
                token_type: "Bearer".into(),
                refresh_token: None,
                expiry: None,
            })
        }
    }

    struct ScriptedPrompt(Option<&'static str>);

    impl CodePrompt for ScriptedPrompt {
        fn redirect_uri(&self) -> String {
            "http://127.0.0.1:9".into()
        }

        fn wait_for_code(&mut self, _: &Url) -> Result<String, AuthError> {
            self.0.map(String::from).ok_or(AuthError::Cancelled)
        }
    }

    #[test]
    fn flow_exchanges_the_prompted_code() {
        let server = FakeServer {
            exchanged: RefCell::new(vec![]),
        };
        let mut flow = AuthorizationFlow::new(&server, ScriptedPrompt(Some("4/abc")));

        let token = flow.obtain_token().unwrap();
        assert_eq!(token.access_token, "token-for-4/abc");
        assert_eq!(
            server.exchanged.borrow().as_slice(),
            &[("4/abc".to_string(), "http://127.0.0.1:9".to_string())]
        );
    }

    #[test]
    fn cancelled_prompt_never_exchanges() {
        let server = FakeServer {
            exchanged: RefCell::new(vec![]),
        };
        let mut flow = AuthorizationFlow::new(&server, ScriptedPrompt(None));

        assert!(matches!(flow.obtain_token(), Err(AuthError::Cancelled)));
        assert!(server.exchanged.borrow().is_empty());
    }

    #[test]
    fn redirect_parsing() {
        assert_eq!(
            code_from_redirect("/?state=state-token&code=4%2Fxyz&scope=s").unwrap(),
            Some("4/xyz".to_string())
        );
        assert!(matches!(
            code_from_redirect("/?state=state-token&error=access_denied"),
            Err(AuthError::Cancelled)
        ));
        assert!(matches!(
            code_from_redirect("/?state=state-token&code="),
            Err(AuthError::Exchange(_))
        ));
        assert_eq!(code_from_redirect("/favicon.ico").unwrap(), None);
        assert_eq!(code_from_redirect("/").unwrap(), None);
    }

    #[test]
    fn redirect_with_foreign_state_is_rejected() {
        for target in ["/?state=attacker&code=evil", "/?code=evil", "/?error=access_denied"] {
            match code_from_redirect(target) {
                Err(AuthError::Exchange(reason)) => assert_eq!(reason, "state mismatch"),
                other => panic!("unexpected outcome for {target}: {other:?}"),
            }
        }
    }

    fn send(port: u16, request: &[u8]) -> String {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        stream.write_all(request).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        reply
    }

    #[test]
    fn loopback_prompt_catches_the_redirect() {
        let mut prompt = LoopbackPrompt::bind().unwrap();
        let redirect = prompt.redirect_uri();
        assert!(redirect.starts_with("http://127.0.0.1:"));

        let port = prompt.port;
        let browser = std::thread::spawn(move || {
            send(
                port,
                b"GET /?state=state-token&code=4%2Floop HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n",
            )
        });

        let url = Url::parse("https://auth.test/").unwrap();
        let code = prompt.wait_for_code(&url).unwrap();
        assert_eq!(code, "4/loop");

        let reply = browser.join().unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn loopback_prompt_outlasts_stray_connections() {
        let mut prompt = LoopbackPrompt::bind().unwrap();
        let port = prompt.port;
        let browser = std::thread::spawn(move || {
            drop(TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap());
            let favicon = send(port, b"GET /favicon.ico HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n");
            let redirect = send(
                port,
                b"GET /?state=state-token&code=4%2Flate HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n",
            );
            (favicon, redirect)
        });

        let url = Url::parse("https://auth.test/").unwrap();
        assert_eq!(prompt.wait_for_code(&url).unwrap(), "4/late");

        let (favicon, redirect) = browser.join().unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404 Not Found"));
        assert!(redirect.starts_with("HTTP/1.1 200 OK"));
    }

    fn token_endpoint(server: &mockito::Server) -> OAuthServer {
        let config = ClientConfig {
            token_uri: format!("{}/token", server.url()),
            ..client_config()
        };
        OAuthServer::new(config).unwrap()
    }

    #[test]
    fn exchange_posts_the_code_and_reads_the_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "4/abc".into()),
                Matcher::UrlEncoded("client_id".into(), "client.apps".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
                Matcher::UrlEncoded("redirect_uri".into(), OOB_REDIRECT_URI.into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"ya29.a0","token_type":"Bearer","refresh_token":"1//rt","expires_in":3599}"#,
            )
            .create();

        let before = Utc::now();
        let token = token_endpoint(&server)
            .exchange_code("4/abc", OOB_REDIRECT_URI)
            .unwrap();
        mock.assert();

        assert_eq!(token.access_token, "ya29.a0");
        assert_eq!(token.refresh_token.as_deref(), Some("1//rt"));
        assert!(token.expiry.unwrap() > before);
    }

    #[test]
    fn exchange_failures_carry_the_provider_reason() {
        let mut server = mockito::Server::new();
        let _described = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("code".into(), "stale".into()))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Code was already redeemed."}"#)
            .create();
        let _bare = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("code".into(), "unknown-client".into()))
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create();

        let oauth = token_endpoint(&server);
        match oauth.exchange_code("stale", OOB_REDIRECT_URI) {
            Err(AuthError::Exchange(reason)) => {
                assert!(reason.starts_with("400"), "{reason}");
                assert!(reason.ends_with("Code was already redeemed."), "{reason}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match oauth.exchange_code("unknown-client", OOB_REDIRECT_URI) {
            Err(AuthError::Exchange(reason)) => assert!(reason.ends_with("invalid_client"), "{reason}"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
