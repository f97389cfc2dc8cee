use serde::{Deserialize, Serialize};

/// A locale known to the server, optionally reachable under alias names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Locale {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), aliases: Vec::new() }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered set of locales plus the server's declared default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleCatalog {
    pub default_locale: String,
    pub locales: Vec<Locale>,
}

impl LocaleCatalog {
    pub fn new(default_locale: impl Into<String>, locales: Vec<Locale>) -> Self {
        Self { default_locale: default_locale.into(), locales }
    }

    /// The entry whose name exactly equals `name`.
    pub fn find(&self, name: &str) -> Option<&Locale> {
        self.locales.iter().find(|l| l.name == name)
    }

    /// The catalog entry for the declared default, if the server listed it.
    pub fn default_entry(&self) -> Option<&Locale> {
        self.find(&self.default_locale)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locales.iter().map(|l| l.name.as_str())
    }
}

/// Language-only form of a locale name: `en_US` and `en-US` both become `en`.
pub fn short_code(name: &str) -> &str {
    name.split(['_', '-']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LocaleCatalog {
        LocaleCatalog::new(
            "en",
            vec![
                Locale::new("de"),
                Locale::new("en"),
                Locale::new("chinese").with_aliases(["traditional chinese"]),
            ],
        )
    }

    #[test]
    fn find_is_exact() {
        let c = catalog();
        assert!(c.find("en").is_some());
        assert!(c.find("EN").is_none());
        assert!(c.find("traditional chinese").is_none());
    }

    #[test]
    fn default_entry() {
        assert_eq!(catalog().default_entry().unwrap().name, "en");
        let c = LocaleCatalog::new("fr", vec![Locale::new("de")]);
        assert!(c.default_entry().is_none());
    }

    #[test]
    fn short_codes() {
        assert_eq!(short_code("en_US"), "en");
        assert_eq!(short_code("pt-BR"), "pt");
        assert_eq!(short_code("de"), "de");
    }

    #[test]
    fn aliases_default_to_empty_on_deserialize() {
        let l: Locale = serde_json::from_str(r#"{"name":"de"}"#).unwrap();
        assert!(l.aliases.is_empty());
        let l: Locale = serde_json::from_str(r#"{"name":"zh","aliases":["a","b"]}"#).unwrap();
        assert_eq!(l.aliases, vec!["a", "b"]);
    }
}
