use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use ccs_types::HttpMethod;
use serde::{Deserialize, Serialize};

use crate::endpoint::{headers, paths};
use crate::request::WireRequest;

/// Which login protocol a set of credentials uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialMode {
    /// `grant_type=password` with a user name and password.
    Password,
    /// `grant_type=client_credentials` with the application key as bearer.
    ApplicationKey,
}

impl CredentialMode {
    /// Prefix every URL of this mode is rooted at.
    pub fn base_prefix(&self) -> &'static str {
        match self {
            Self::Password => "/ccadminui/v1",
            Self::ApplicationKey => "/ccadmin/v1",
        }
    }

    /// Default value of the profile-type header.
    pub fn profile_type(&self) -> &'static str {
        match self {
            Self::Password => "adminUI",
            Self::ApplicationKey => "applicationKey",
        }
    }
}

/// Credentials used to obtain an access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    Password { username: String, password: String },
    ApplicationKey(String),
}

impl Credentials {
    pub fn mode(&self) -> CredentialMode {
        match self {
            Self::Password { .. } => CredentialMode::Password,
            Self::ApplicationKey(_) => CredentialMode::ApplicationKey,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::ApplicationKey(_) => "application-key",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::ApplicationKey(_) => f.debug_tuple("ApplicationKey").field(&"***").finish(),
        }
    }
}

/// Body of a successful login response.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Frame the login request for `instance` with the given credentials.
pub fn login_request(instance: &str, credentials: &Credentials, timeout: Duration) -> WireRequest {
    let url = format!(
        "{}{}{}",
        instance.trim_end_matches('/'),
        credentials.mode().base_prefix(),
        paths::LOGIN
    );

    let mut hdrs = BTreeMap::new();
    hdrs.insert(headers::CONTENT_TYPE.to_string(), headers::FORM.to_string());
    hdrs.insert(headers::ACCEPT.to_string(), headers::JSON.to_string());

    let mut form = url::form_urlencoded::Serializer::new(String::new());
    match credentials {
        Credentials::Password { username, password } => {
            form.append_pair("grant_type", "password")
                .append_pair("username", username)
                .append_pair("password", password);
        }
        Credentials::ApplicationKey(key) => {
            hdrs.insert(headers::AUTHORIZATION.to_string(), format!("Bearer {key}"));
            form.append_pair("grant_type", "client_credentials");
        }
    }

    WireRequest {
        method: HttpMethod::Post,
        url,
        headers: hdrs,
        body: Some(form.finish().into_bytes()),
        timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn application_key_login() {
        let creds = Credentials::ApplicationKey("dummyApplicationId".into());
        let req = login_request("http://localhost:9080", &creds, TIMEOUT);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:9080/ccadmin/v1/login/");
        assert_eq!(req.header("Authorization"), Some("Bearer dummyApplicationId"));
        assert_eq!(req.body_text().as_deref(), Some("grant_type=client_credentials"));
    }

    #[test]
    fn password_login_is_form_encoded() {
        let creds = Credentials::Password { username: "admin@example.com".into(), password: "p&ss w".into() };
        let req = login_request("http://localhost:9080/", &creds, TIMEOUT);
        assert_eq!(req.url, "http://localhost:9080/ccadminui/v1/login/");
        assert!(req.header("authorization").is_none());
        assert_eq!(req.header("content-type"), Some(headers::FORM));
        assert_eq!(
            req.body_text().as_deref(),
            Some("grant_type=password&username=admin%40example.com&password=p%26ss+w")
        );
    }

    #[test]
    fn mode_switches_prefix_and_profile() {
        assert_eq!(CredentialMode::Password.base_prefix(), "/ccadminui/v1");
        assert_eq!(CredentialMode::ApplicationKey.base_prefix(), "/ccadmin/v1");
        assert_eq!(CredentialMode::Password.profile_type(), "adminUI");
    }

    #[test]
    fn debug_redacts_secrets() {
        let creds = Credentials::Password { username: "u".into(), password: "secret".into() };
        assert!(!format!("{creds:?}").contains("secret"));
        let creds = Credentials::ApplicationKey("key123".into());
        assert!(!format!("{creds:?}").contains("key123"));
        assert_eq!(creds.display_name(), "application-key");
    }
}
