use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Placeholder token used in registry URL templates.
pub const PLACEHOLDER: &str = "{}";

/// HTTP method of a registry operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether requests with this method normally carry a body.
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(TypeError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an operation wants to be told which locale the caller is working in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocaleHint {
    /// The operation is locale-agnostic.
    #[default]
    None,
    /// Content is per-locale and a locale must be sent.
    Required,
    /// Content may be per-locale; a locale is sent when known.
    Optional,
    /// The operation reads the locale the way a browser would send it.
    Browser,
}

impl LocaleHint {
    /// Map the registry's `localeHint` string onto a hint.
    ///
    /// Unknown or absent values classify as [`LocaleHint::None`].
    pub fn from_registry(value: Option<&str>) -> Self {
        match value {
            Some("assetLanguageRequired") => Self::Required,
            Some("assetLanguageOptional") => Self::Optional,
            Some("browserLanguage") => Self::Browser,
            _ => Self::None,
        }
    }

    /// Returns `true` if calls classified with this hint carry a locale header.
    pub fn sends_locale(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A named, callable operation taken from the server's registry.
///
/// Descriptors are built once when the registry is loaded and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Operation name, e.g. `getWidget`.
    pub name: String,
    pub method: HttpMethod,
    /// URL template with positional `{}` placeholders.
    pub url_template: String,
    /// Whether the server honours `ETag`/`If-Match` on this operation.
    pub optimistic_lock: bool,
    pub locale_hint: LocaleHint,
}

impl EndpointDescriptor {
    /// Create a descriptor with no optimistic locking and no locale hint.
    pub fn new(name: impl Into<String>, method: HttpMethod, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            url_template: url_template.into(),
            optimistic_lock: false,
            locale_hint: LocaleHint::None,
        }
    }

    pub fn with_optimistic_lock(mut self, enabled: bool) -> Self {
        self.optimistic_lock = enabled;
        self
    }

    pub fn with_locale_hint(mut self, hint: LocaleHint) -> Self {
        self.locale_hint = hint;
        self
    }

    /// Number of `{}` placeholders in the URL template.
    pub fn placeholder_count(&self) -> usize {
        self.url_template.matches(PLACEHOLDER).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!(matches!("TRACE".parse::<HttpMethod>(), Err(TypeError::InvalidMethod(_))));
    }

    #[test]
    fn method_body_classification() {
        assert!(HttpMethod::Put.has_body());
        assert!(!HttpMethod::Get.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }

    #[test]
    fn locale_hint_from_registry() {
        assert_eq!(LocaleHint::from_registry(Some("assetLanguageRequired")), LocaleHint::Required);
        assert_eq!(LocaleHint::from_registry(Some("assetLanguageOptional")), LocaleHint::Optional);
        assert_eq!(LocaleHint::from_registry(Some("browserLanguage")), LocaleHint::Browser);
        assert_eq!(LocaleHint::from_registry(Some("whatever")), LocaleHint::None);
        assert_eq!(LocaleHint::from_registry(None), LocaleHint::None);
        assert!(!LocaleHint::None.sends_locale());
        assert!(LocaleHint::Browser.sends_locale());
    }

    #[test]
    fn placeholder_count() {
        let d = EndpointDescriptor::new("getWidgetLocaleContent", HttpMethod::Get, "/ccadmin/v1/widgets/{}/locale/{}");
        assert_eq!(d.placeholder_count(), 2);
        let d = EndpointDescriptor::new("listWidgets", HttpMethod::Get, "/ccadmin/v1/widgets");
        assert_eq!(d.placeholder_count(), 0);
    }

    #[test]
    fn descriptor_builders() {
        let d = EndpointDescriptor::new("updateWidget", HttpMethod::Put, "/w/{}")
            .with_optimistic_lock(true)
            .with_locale_hint(LocaleHint::Required);
        assert!(d.optimistic_lock);
        assert_eq!(d.locale_hint, LocaleHint::Required);
    }
}
