use std::time::Duration;

use ccs_protocol::Credentials;

use crate::locale::DEFAULT_NO_SNIPPET_LOCALE;
use crate::session::DEFAULT_SESSION_FRESHNESS;

/// Configuration for connecting to one administration interface.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Instance URL, e.g. `http://localhost:9080`.
    pub instance: String,
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
    /// A session older than this is refreshed before reuse.
    pub session_freshness: Duration,
    /// Work in exactly this locale; must match a catalog entry.
    pub locale: Option<String>,
    /// Work in every locale the server lists.
    pub all_locales: bool,
    /// Targeting a server other than the one the mirror came from.
    pub transfer_mode: bool,
    /// Default locale name that carries no per-locale content of its own.
    pub no_snippet_locale: String,
}

impl ClientConfig {
    pub fn new(instance: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            instance: instance.into().trim_end_matches('/').to_string(),
            credentials,
            timeout: Duration::from_secs(60),
            session_freshness: DEFAULT_SESSION_FRESHNESS,
            locale: None,
            all_locales: false,
            transfer_mode: false,
            no_snippet_locale: DEFAULT_NO_SNIPPET_LOCALE.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_freshness(mut self, window: Duration) -> Self {
        self.session_freshness = window;
        self
    }

    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_all_locales(mut self, all: bool) -> Self {
        self.all_locales = all;
        self
    }

    pub fn with_transfer_mode(mut self, enabled: bool) -> Self {
        self.transfer_mode = enabled;
        self
    }

    pub fn with_no_snippet_locale(mut self, name: impl Into<String>) -> Self {
        self.no_snippet_locale = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_and_overrides() {
        let config = ClientConfig::new("http://localhost:9080/", Credentials::ApplicationKey("k".into()))
            .with_timeout(Duration::from_secs(5))
            .with_locale(Some("de".into()))
            .with_transfer_mode(true);
        assert_eq!(config.instance, "http://localhost:9080");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.session_freshness, Duration::from_secs(180));
        assert_eq!(config.locale.as_deref(), Some("de"));
        assert!(config.transfer_mode);
        assert!(!config.all_locales);
        assert_eq!(config.no_snippet_locale, "en_US");
    }
}
