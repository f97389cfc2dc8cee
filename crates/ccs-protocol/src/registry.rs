//! The server's operation catalog and URL template resolution.
//!
//! The registry response maps operation names onto `{method, url}` pairs.
//! [`EndpointRegistry`] turns that map into immutable
//! [`EndpointDescriptor`]s once at startup; afterwards callers look
//! operations up by name and resolve their URLs with [`resolve_url`].

use std::collections::{BTreeMap, HashMap};

use ccs_types::endpoint::PLACEHOLDER;
use ccs_types::{EndpointDescriptor, HttpMethod, Locale, LocaleCatalog, LocaleHint};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Raw shape of the registry response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPayload {
    #[serde(default)]
    pub endpoint_map: Option<BTreeMap<String, RawEndpoint>>,
}

/// One entry of the registry's `endpointMap`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEndpoint {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub use_optimistic_lock: bool,
    #[serde(default)]
    pub locale_hint: Option<String>,
}

/// Raw shape of the locale listing response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleListing {
    pub default_locale: NamedLocale,
    #[serde(default)]
    pub items: Vec<Locale>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NamedLocale {
    pub name: String,
}

impl LocaleListing {
    pub fn into_catalog(self) -> LocaleCatalog {
        LocaleCatalog::new(self.default_locale.name, self.items)
    }
}

/// Name → descriptor map built from the registry response.
#[derive(Clone, Debug, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointDescriptor>,
}

impl EndpointRegistry {
    /// Build the registry from the server's response body.
    ///
    /// A body without an `endpointMap` means `host` is not an administration
    /// interface at all.
    pub fn load(payload: &Value, host: &str) -> ProtocolResult<Self> {
        let payload: RegistryPayload = serde_json::from_value(payload.clone())
            .map_err(|_| ProtocolError::NotAdministrationInterface { host: host.to_string() })?;
        let map = payload
            .endpoint_map
            .ok_or_else(|| ProtocolError::NotAdministrationInterface { host: host.to_string() })?;

        let mut endpoints = HashMap::with_capacity(map.len());
        for (name, raw) in map {
            let method: HttpMethod = raw.method.parse().map_err(|e: ccs_types::TypeError| {
                ProtocolError::InvalidRegistryEntry { name: name.clone(), reason: e.to_string() }
            })?;
            let descriptor = EndpointDescriptor::new(name.clone(), method, raw.url)
                .with_optimistic_lock(raw.use_optimistic_lock)
                .with_locale_hint(LocaleHint::from_registry(raw.locale_hint.as_deref()));
            endpoints.insert(name, descriptor);
        }
        tracing::debug!(operations = endpoints.len(), "registry loaded");
        Ok(Self { endpoints })
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = EndpointDescriptor>) -> Self {
        Self {
            endpoints: descriptors.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.get(name)
    }

    /// Look up an operation that the caller assumes exists.
    pub fn require(&self, name: &str) -> ProtocolResult<&EndpointDescriptor> {
        self.get(name)
            .ok_or_else(|| ProtocolError::UnknownOperation { name: name.to_string() })
    }

    /// Returns `true` only if every named operation is in the registry.
    pub fn supports(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.endpoints.contains_key(*n))
    }

    /// Operation names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Substitute `{}` placeholders left to right with `params`.
///
/// Returns `None` if there are fewer params than placeholders. Extra params
/// are ignored. Substituted text is never rescanned for placeholders.
pub fn substitute_placeholders(template: &str, params: &[String]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut params = params.iter();
    let mut rest = template;
    while let Some(idx) = rest.find(PLACEHOLDER) {
        out.push_str(&rest[..idx]);
        out.push_str(params.next()?);
        rest = &rest[idx + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    Some(out)
}

fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Resolve the final URL for one call.
///
/// `query_or_url` starting with `?` is appended to the substituted template.
/// Anything else replaces the template entirely: an absolute URL is used as
/// is, and a path is joined onto `base`. This is how links returned by an
/// earlier response (a file's self link, say) are followed.
pub fn resolve_url(
    base: &str,
    descriptor: &EndpointDescriptor,
    path_params: &[String],
    query_or_url: Option<&str>,
) -> ProtocolResult<String> {
    let base = base.trim_end_matches('/');

    if let Some(target) = query_or_url.filter(|t| !t.is_empty() && !t.starts_with('?')) {
        if is_absolute_url(target) {
            url::Url::parse(target).map_err(|e| ProtocolError::InvalidUrl {
                url: target.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(target.to_string());
        }
        let sep = if target.starts_with('/') { "" } else { "/" };
        return Ok(format!("{base}{sep}{target}"));
    }

    let path = substitute_placeholders(&descriptor.url_template, path_params).ok_or_else(|| {
        ProtocolError::MissingPathParams {
            operation: descriptor.name.clone(),
            expected: descriptor.placeholder_count(),
            actual: path_params.len(),
        }
    })?;
    if path_params.len() > descriptor.placeholder_count() {
        tracing::debug!(operation = %descriptor.name, "ignoring surplus path parameters");
    }

    let mut url = if is_absolute_url(&path) {
        path
    } else {
        let sep = if path.starts_with('/') { "" } else { "/" };
        format!("{base}{sep}{path}")
    };
    if let Some(query) = query_or_url.filter(|q| q.starts_with('?')) {
        url.push_str(query);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn params(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    fn registry_body() -> Value {
        json!({
            "endpointMap": {
                "listWidgets": { "method": "GET", "url": "/ccadmin/v1/widgets" },
                "updateWidgetSource": {
                    "method": "put",
                    "url": "/ccadmin/v1/widgets/{}/code/{}",
                    "useOptimisticLock": true,
                    "localeHint": "assetLanguageOptional"
                },
                "listLocales": { "method": "GET", "url": "/ccadmin/v1/locales", "localeHint": "browserLanguage" }
            }
        })
    }

    #[test]
    fn load_builds_descriptors() {
        let reg = EndpointRegistry::load(&registry_body(), "http://localhost:9080").unwrap();
        assert_eq!(reg.len(), 3);
        let d = reg.require("updateWidgetSource").unwrap();
        assert_eq!(d.method, HttpMethod::Put);
        assert!(d.optimistic_lock);
        assert_eq!(d.locale_hint, LocaleHint::Optional);
        assert_eq!(reg.names(), vec!["listLocales", "listWidgets", "updateWidgetSource"]);
    }

    #[test]
    fn load_without_endpoint_map_is_not_admin() {
        let err = EndpointRegistry::load(&json!({"hello": "world"}), "http://shop").unwrap_err();
        assert!(matches!(err, ProtocolError::NotAdministrationInterface { ref host } if host == "http://shop"));
        let err = EndpointRegistry::load(&json!("html page"), "http://shop").unwrap_err();
        assert!(matches!(err, ProtocolError::NotAdministrationInterface { .. }));
    }

    #[test]
    fn load_rejects_bad_method() {
        let body = json!({"endpointMap": {"x": {"method": "BREW", "url": "/x"}}});
        let err = EndpointRegistry::load(&body, "h").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRegistryEntry { ref name, .. } if name == "x"));
    }

    #[test]
    fn supports_requires_every_name() {
        let reg = EndpointRegistry::load(&registry_body(), "h").unwrap();
        assert!(reg.supports(&["listWidgets"]));
        assert!(reg.supports(&["listWidgets", "listLocales"]));
        assert!(!reg.supports(&["listWidgets", "listStacks"]));
        assert!(reg.supports(&[]));
    }

    #[test]
    fn unknown_operation() {
        let reg = EndpointRegistry::default();
        assert!(matches!(reg.require("nope"), Err(ProtocolError::UnknownOperation { .. })));
    }

    #[test]
    fn resolve_substitutes_in_order() {
        let d = EndpointDescriptor::new("op", HttpMethod::Get, "/a/{}/b/{}");
        let url = resolve_url("http://h:1/", &d, &params(&["x", "y"]), None).unwrap();
        assert_eq!(url, "http://h:1/a/x/b/y");
    }

    #[test]
    fn resolve_appends_query() {
        let d = EndpointDescriptor::new("op", HttpMethod::Get, "/a/{}");
        let url = resolve_url("http://h", &d, &params(&["x"]), Some("?fields=id")).unwrap();
        assert_eq!(url, "http://h/a/x?fields=id");
    }

    #[test]
    fn resolve_replaces_template_with_path_or_url() {
        let d = EndpointDescriptor::new("op", HttpMethod::Get, "/a/{}");
        let url = resolve_url("http://h", &d, &[], Some("/file/general/x.css")).unwrap();
        assert_eq!(url, "http://h/file/general/x.css");
        let url = resolve_url("http://h", &d, &[], Some("https://cdn/x.css")).unwrap();
        assert_eq!(url, "https://cdn/x.css");
    }

    #[test]
    fn resolve_missing_params() {
        let d = EndpointDescriptor::new("op", HttpMethod::Get, "/a/{}/b/{}");
        let err = resolve_url("http://h", &d, &params(&["x"]), None).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingPathParams { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn locale_listing_to_catalog() {
        let body = json!({
            "defaultLocale": {"name": "en", "repositoryId": "100"},
            "items": [{"name": "de"}, {"name": "en"}, {"name": "chinese", "aliases": ["traditional chinese"]}]
        });
        let listing: LocaleListing = serde_json::from_value(body).unwrap();
        let catalog = listing.into_catalog();
        assert_eq!(catalog.default_locale, "en");
        assert_eq!(catalog.locales.len(), 3);
        assert_eq!(catalog.find("chinese").unwrap().aliases, vec!["traditional chinese"]);
    }

    proptest! {
        #[test]
        fn substitution_is_positional(segments in proptest::collection::vec("[a-z]{1,8}", 1..6),
                                      values in proptest::collection::vec("[a-zA-Z0-9{}._-]{0,8}", 6)) {
            let template: String = segments.iter().map(|s| format!("/{s}/{{}}")).collect();
            let params: Vec<String> = values[..segments.len()].to_vec();
            let expected: String = segments
                .iter()
                .zip(&params)
                .map(|(s, p)| format!("/{s}/{p}"))
                .collect();
            prop_assert_eq!(substitute_placeholders(&template, &params), Some(expected));
        }
    }
}
