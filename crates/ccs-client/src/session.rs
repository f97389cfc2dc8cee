use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ccs_protocol::{login_request, CredentialMode, Credentials, LoginResponse};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::transport::HttpTransport;

/// A session older than this is refreshed before reuse.
pub const DEFAULT_SESSION_FRESHNESS: Duration = Duration::from_secs(3 * 60);

/// An access token and when it was issued.
#[derive(Clone, Debug)]
pub struct Session {
    pub access_token: String,
    pub issued_at: Instant,
    pub mode: CredentialMode,
}

impl Session {
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.issued_at.elapsed() < window
    }
}

/// Owns the access token and the login protocol.
///
/// Logins are single-flight: the current session lives behind an async
/// mutex that is held across the login round trip, so callers that all
/// observe a stale session wait for one login instead of each starting
/// their own.
pub struct SessionManager {
    instance: String,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    freshness: Duration,
    timeout: Duration,
    current: Mutex<Option<Session>>,
    logins: AtomicU64,
}

impl SessionManager {
    pub fn new(instance: impl Into<String>, credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            instance: instance.into().trim_end_matches('/').to_string(),
            credentials,
            transport,
            freshness: DEFAULT_SESSION_FRESHNESS,
            timeout: Duration::from_secs(60),
            current: Mutex::new(None),
            logins: AtomicU64::new(0),
        }
    }

    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.freshness = window;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mode(&self) -> CredentialMode {
        self.credentials.mode()
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Instance URL joined with the credential mode's prefix.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.instance, self.mode().base_prefix())
    }

    /// Number of successful logins performed so far.
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::SeqCst)
    }

    /// The current session, logging in first if it is absent or stale.
    pub async fn login(&self) -> ClientResult<Session> {
        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref().filter(|s| s.is_fresh(self.freshness)) {
            return Ok(session.clone());
        }
        let session = self.perform_login().await?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// Log in again because `expired_token` was rejected.
    ///
    /// If another caller already replaced that token, its session is
    /// returned instead of logging in a second time.
    pub async fn refresh_after_expiry(&self, expired_token: &str) -> ClientResult<Session> {
        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref() {
            if session.access_token != expired_token && session.is_fresh(self.freshness) {
                debug!("session already refreshed by another caller");
                return Ok(session.clone());
            }
        }
        let session = self.perform_login().await?;
        *current = Some(session.clone());
        Ok(session)
    }

    async fn perform_login(&self) -> ClientResult<Session> {
        let request = login_request(&self.instance, &self.credentials, self.timeout);
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(ClientError::LoginFailed { status: response.status });
        }
        let body: LoginResponse = response.parse()?;
        self.logins.fetch_add(1, Ordering::SeqCst);
        info!(
            instance = %self.instance,
            mode = self.credentials.display_name(),
            "logged in"
        );
        Ok(Session {
            access_token: body.access_token,
            issued_at: Instant::now(),
            mode: self.mode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use ccs_types::HttpMethod;
    use serde_json::json;

    const LOGIN_URL: &str = "http://localhost:9080/ccadmin/v1/login/";

    fn manager(mock: Arc<MockTransport>) -> SessionManager {
        SessionManager::new(
            "http://localhost:9080",
            Credentials::ApplicationKey("dummyApplicationId".into()),
            mock,
        )
    }

    #[tokio::test]
    async fn login_posts_client_credentials() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t1"}));
        let sessions = manager(mock.clone());

        let session = sessions.login().await.unwrap();
        assert_eq!(session.access_token, "t1");
        assert_eq!(session.mode, CredentialMode::ApplicationKey);

        let sent = mock.requests_to(HttpMethod::Post, LOGIN_URL);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("authorization"), Some("Bearer dummyApplicationId"));
        assert_eq!(sent[0].body_text().as_deref(), Some("grant_type=client_credentials"));
    }

    #[tokio::test]
    async fn fresh_session_is_reused() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t1"}));
        let sessions = manager(mock.clone());
        sessions.login().await.unwrap();
        sessions.login().await.unwrap();
        assert_eq!(sessions.login_count(), 1);
    }

    #[tokio::test]
    async fn stale_session_is_refreshed() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t1"}))
            .respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t2"}));
        let sessions = manager(mock.clone()).with_freshness(Duration::ZERO);
        assert_eq!(sessions.login().await.unwrap().access_token, "t1");
        assert_eq!(sessions.login().await.unwrap().access_token, "t2");
        assert_eq!(sessions.login_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_login() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t1"}));
        let sessions = Arc::new(manager(mock.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sessions = sessions.clone();
            handles.push(tokio::spawn(async move { sessions.login().await.unwrap().access_token }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "t1");
        }
        assert_eq!(mock.count(HttpMethod::Post, LOGIN_URL), 1);
    }

    #[tokio::test]
    async fn refresh_after_expiry_is_single_flight() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t1"}))
            .respond_json(HttpMethod::Post, LOGIN_URL, json!({"access_token": "t2"}));
        let sessions = manager(mock.clone());
        sessions.login().await.unwrap();

        let first = sessions.refresh_after_expiry("t1").await.unwrap();
        let second = sessions.refresh_after_expiry("t1").await.unwrap();
        assert_eq!(first.access_token, "t2");
        assert_eq!(second.access_token, "t2");
        assert_eq!(sessions.login_count(), 2);
    }

    #[tokio::test]
    async fn rejected_login() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_status(HttpMethod::Post, LOGIN_URL, 401);
        let err = manager(mock).login().await.unwrap_err();
        assert!(matches!(err, ClientError::LoginFailed { status: 401 }));
    }

    #[test]
    fn base_url_follows_mode() {
        let mock = Arc::new(MockTransport::new());
        let password = SessionManager::new(
            "http://h/",
            Credentials::Password { username: "u".into(), password: "p".into() },
            mock.clone(),
        );
        assert_eq!(password.base_url(), "http://h/ccadminui/v1");
        assert_eq!(manager(mock).base_url(), "http://localhost:9080/ccadmin/v1");
    }
}
