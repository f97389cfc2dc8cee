use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::endpoint::headers;
use crate::error::ProtocolResult;

/// Response as seen by the invoker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WireResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// Set when the status was declared ignorable by the caller; the body is
    /// then always empty.
    pub ignored: bool,
}

impl WireResponse {
    pub fn new(status: u16) -> Self {
        Self { status, ..Self::default() }
    }

    /// A 200 response carrying `value` as its JSON body.
    pub fn json(value: &Value) -> Self {
        Self::new(200).with_body(value.to_string().into_bytes())
    }

    /// Successful-but-empty stand-in for an ignorable status.
    pub fn ignored(status: u16) -> Self {
        Self { status, ignored: true, ..Self::default() }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_empty(&self) -> bool {
        self.ignored || self.body.is_empty()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn etag(&self) -> Option<&str> {
        self.header(headers::ETAG).filter(|e| !e.is_empty())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body as JSON, or `None` for an empty body.
    pub fn json_value(&self) -> ProtocolResult<Option<Value>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.body)?))
    }

    pub fn parse<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_range() {
        assert!(WireResponse::new(200).is_success());
        assert!(WireResponse::new(204).is_success());
        assert!(!WireResponse::new(304).is_success());
        assert!(!WireResponse::new(401).is_success());
    }

    #[test]
    fn ignored_is_empty() {
        let r = WireResponse::ignored(404);
        assert!(r.is_empty());
        assert_eq!(r.json_value().unwrap(), None);
    }

    #[test]
    fn json_body_and_etag() {
        let r = WireResponse::json(&json!({"id": "w1"})).with_header("ETag", "e1");
        assert_eq!(r.etag(), Some("e1"));
        assert_eq!(r.json_value().unwrap(), Some(json!({"id": "w1"})));
        let v: serde_json::Map<String, Value> = r.parse().unwrap();
        assert_eq!(v["id"], "w1");
    }
}
