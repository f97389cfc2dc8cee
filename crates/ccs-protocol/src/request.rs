//! Per-call request construction.
//!
//! A [`RequestSpec`] accumulates options fluently and is consumed by exactly
//! one logical call. [`RequestSpec::build`] merges those options with the
//! session token, the operation descriptor and the process-wide
//! [`RequestEnv`] into an immutable [`WireRequest`]. `build` borrows the
//! spec so that a call retried after re-login is rebuilt from the same
//! options with the fresh token.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use ccs_types::{EndpointDescriptor, HttpMethod};
use serde_json::Value;

use crate::endpoint::{headers, operations};
use crate::error::{ProtocolError, ProtocolResult};

/// Where the request body comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum BodySource {
    /// An inline JSON value.
    Json(Value),
    /// Inline raw text, sent as is.
    Text(String),
    /// A local file, optionally parsed as JSON, optionally wrapped under a
    /// named field of a JSON object.
    File { path: PathBuf, field: Option<String>, as_json: bool },
}

/// Process-wide inputs to every request.
#[derive(Clone, Debug)]
pub struct RequestEnv {
    /// Suppresses etag headers; set once before any sync work begins.
    pub transfer_mode: bool,
    /// Primary working locale, used when the spec does not override it.
    pub locale: Option<String>,
    pub profile_type: Option<String>,
    pub timeout: Duration,
}

impl Default for RequestEnv {
    fn default() -> Self {
        Self {
            transfer_mode: false,
            locale: None,
            profile_type: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Fluent, option-accumulating description of one outbound call.
#[derive(Clone, Debug, Default)]
pub struct RequestSpec {
    headers: BTreeMap<String, String>,
    locale: Option<String>,
    body: Option<BodySource>,
    ignored_statuses: Vec<u16>,
    replace: Option<(String, String)>,
    etag: Option<String>,
}

impl RequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Override the working locale for this call only.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(BodySource::Json(body));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(BodySource::Text(body.into()));
        self
    }

    /// Read the body from a local file at build time.
    pub fn body_from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = Some(BodySource::File { path: path.into(), field: None, as_json: false });
        self
    }

    /// Wrap the file contents as `{ field: contents }`. No-op for inline bodies.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        if let Some(BodySource::File { field, .. }) = &mut self.body {
            *field = Some(name.into());
        }
        self
    }

    /// Parse the file contents as JSON. No-op for inline bodies.
    pub fn as_json(mut self) -> Self {
        if let Some(BodySource::File { as_json, .. }) = &mut self.body {
            *as_json = true;
        }
        self
    }

    /// Treat `status` as a successful, empty result.
    pub fn ignore_status(mut self, status: u16) -> Self {
        if !self.ignored_statuses.contains(&status) {
            self.ignored_statuses.push(status);
        }
        self
    }

    /// Replace every occurrence of `find` in the body after it is loaded.
    pub fn replace(mut self, find: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.replace = Some((find.into(), replacement.into()));
        self
    }

    /// Attach the last-seen etag. Empty etags are dropped.
    pub fn etag(mut self, etag: Option<impl Into<String>>) -> Self {
        self.etag = etag.map(Into::into).filter(|e: &String| !e.is_empty());
        self
    }

    pub fn ignores(&self, status: u16) -> bool {
        self.ignored_statuses.contains(&status)
    }

    pub fn locale_override(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn etag_value(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn body_source(&self) -> Option<&BodySource> {
        self.body.as_ref()
    }

    /// Produce the wire request for `url`.
    pub fn build(
        &self,
        url: String,
        token: &str,
        descriptor: &EndpointDescriptor,
        env: &RequestEnv,
    ) -> ProtocolResult<WireRequest> {
        let mut hdrs = self.headers.clone();
        hdrs.insert(headers::AUTHORIZATION.to_string(), format!("Bearer {token}"));
        hdrs.entry(headers::ACCEPT.to_string())
            .or_insert_with(|| headers::JSON.to_string());
        hdrs.entry(headers::CONTENT_TYPE.to_string())
            .or_insert_with(|| headers::JSON.to_string());
        if let Some(profile) = &env.profile_type {
            hdrs.entry(headers::PROFILE_TYPE.to_string())
                .or_insert_with(|| profile.clone());
        }

        if descriptor.optimistic_lock && !env.transfer_mode {
            if let Some(etag) = &self.etag {
                hdrs.insert(headers::ETAG.to_string(), etag.clone());
                hdrs.insert(headers::IF_MATCH.to_string(), etag.clone());
            }
        }

        if descriptor.locale_hint.sends_locale() && descriptor.name != operations::LIST_LOCALES {
            if let Some(locale) = self.locale.as_ref().or(env.locale.as_ref()) {
                hdrs.insert(headers::LOCALE.to_string(), locale.clone());
            }
        }

        Ok(WireRequest {
            method: descriptor.method,
            url,
            headers: hdrs,
            body: self.load_body()?,
            timeout: env.timeout,
        })
    }

    fn substitute(&self, text: String) -> String {
        match &self.replace {
            Some((find, replacement)) if !find.is_empty() => text.replace(find.as_str(), replacement),
            _ => text,
        }
    }

    fn load_body(&self) -> ProtocolResult<Option<Vec<u8>>> {
        let Some(source) = &self.body else {
            return Ok(None);
        };
        let bytes = match source {
            BodySource::Json(value) => self.substitute(serde_json::to_string(value)?).into_bytes(),
            BodySource::Text(text) => self.substitute(text.clone()).into_bytes(),
            BodySource::File { path, field, as_json } => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|source| ProtocolError::BodySource { path: path.clone(), source })?;
                let raw = self.substitute(raw);
                match (field, as_json) {
                    (None, false) => raw.into_bytes(),
                    (None, true) => {
                        let value: Value = serde_json::from_str(&raw)?;
                        serde_json::to_vec(&value)?
                    }
                    (Some(field), as_json) => {
                        let value = if *as_json {
                            serde_json::from_str(&raw)?
                        } else {
                            Value::String(raw)
                        };
                        let mut wrapper = serde_json::Map::new();
                        wrapper.insert(field.clone(), value);
                        serde_json::to_vec(&Value::Object(wrapper))?
                    }
                }
            }
        };
        Ok(Some(bytes))
    }
}

/// Immutable, fully-resolved request ready for a transport.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header names are lower-cased.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl WireRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body_text(&self) -> Option<String> {
        self.body.as_ref().map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn body_json(&self) -> Option<Value> {
        self.body.as_ref().and_then(|b| serde_json::from_slice(b).ok())
    }
}
