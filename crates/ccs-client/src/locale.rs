//! Working-locale negotiation and per-locale content fallback.

use std::future::Future;

use ccs_types::{short_code, Locale, LocaleCatalog};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Default locale name that has no per-locale content of its own.
pub const DEFAULT_NO_SNIPPET_LOCALE: &str = "en_US";

/// Outcome of negotiation: the locales to work in and the primary one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocaleSelection {
    pub working: Vec<Locale>,
    /// Sole working locale if there is exactly one, else the catalog default.
    pub primary: String,
}

impl LocaleSelection {
    pub fn names(&self) -> Vec<&str> {
        self.working.iter().map(|l| l.name.as_str()).collect()
    }
}

#[derive(Clone, Debug)]
pub struct LocaleNegotiator {
    no_snippet_locale: String,
}

impl Default for LocaleNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_NO_SNIPPET_LOCALE)
    }
}

impl LocaleNegotiator {
    pub fn new(no_snippet_locale: impl Into<String>) -> Self {
        Self { no_snippet_locale: no_snippet_locale.into() }
    }

    /// Decide the working locale set.
    ///
    /// `all_locales` takes precedence over `override_name`. An override must
    /// match a catalog entry exactly. With neither, the catalog default is
    /// used, except that the no-snippet locale is swapped for the entry
    /// named by its language-only form when the catalog has one.
    pub fn negotiate(
        &self,
        catalog: &LocaleCatalog,
        override_name: Option<&str>,
        all_locales: bool,
    ) -> ClientResult<LocaleSelection> {
        let working = if all_locales {
            catalog.locales.clone()
        } else if let Some(name) = override_name {
            let entry = catalog
                .find(name)
                .ok_or_else(|| ClientError::LocaleNotRecognized { name: name.to_string() })?;
            vec![entry.clone()]
        } else {
            vec![self.default_locale(catalog)]
        };

        let primary = match working.as_slice() {
            [only] => only.name.clone(),
            _ => catalog.default_locale.clone(),
        };
        debug!(primary = %primary, working = working.len(), "locales negotiated");
        Ok(LocaleSelection { working, primary })
    }

    fn default_locale(&self, catalog: &LocaleCatalog) -> Locale {
        let declared = catalog
            .default_entry()
            .cloned()
            .unwrap_or_else(|| Locale::new(catalog.default_locale.clone()));
        if catalog.default_locale != self.no_snippet_locale {
            return declared;
        }
        match catalog.find(short_code(&catalog.default_locale)) {
            Some(short) => short.clone(),
            None => declared,
        }
    }

    /// Names to try, in order, when fetching content for `locale`.
    ///
    /// The first alias (or the bare name if there are none), then the second
    /// alias if there is one. Never more than two.
    pub fn content_candidates(locale: &Locale) -> Vec<String> {
        let mut candidates = vec![locale.aliases.first().unwrap_or(&locale.name).clone()];
        if let Some(second) = locale.aliases.get(1) {
            candidates.push(second.clone());
        }
        candidates
    }

    /// Fetch per-locale content, walking [`Self::content_candidates`].
    ///
    /// Returns the candidate name that produced content, or `None` if no
    /// candidate did.
    pub async fn fetch_with_fallback<T, F, Fut>(locale: &Locale, mut fetch: F) -> ClientResult<Option<(String, T)>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ClientResult<Option<T>>>,
    {
        for candidate in Self::content_candidates(locale) {
            if let Some(content) = fetch(candidate.clone()).await? {
                return Ok(Some((candidate, content)));
            }
            debug!(locale = %locale.name, candidate = %candidate, "no content for locale candidate");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

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
    fn default_without_override() {
        let sel = LocaleNegotiator::default().negotiate(&catalog(), None, false).unwrap();
        assert_eq!(sel.working, vec![Locale::new("en")]);
        assert_eq!(sel.primary, "en");
    }

    #[test]
    fn unknown_override_fails() {
        let err = LocaleNegotiator::default()
            .negotiate(&catalog(), Some("silly"), false)
            .unwrap_err();
        assert!(matches!(err, ClientError::LocaleNotRecognized { ref name } if name == "silly"));
    }

    #[test]
    fn override_matches_exactly() {
        let sel = LocaleNegotiator::default().negotiate(&catalog(), Some("chinese"), false).unwrap();
        assert_eq!(sel.names(), vec!["chinese"]);
        assert_eq!(sel.primary, "chinese");
        assert!(LocaleNegotiator::default()
            .negotiate(&catalog(), Some("traditional chinese"), false)
            .is_err());
    }

    #[test]
    fn all_locales_uses_catalog_default_as_primary() {
        let sel = LocaleNegotiator::default().negotiate(&catalog(), Some("silly"), true).unwrap();
        assert_eq!(sel.names(), vec!["de", "en", "chinese"]);
        assert_eq!(sel.primary, "en");
    }

    #[test]
    fn no_snippet_default_resolves_to_short_form() {
        let c = LocaleCatalog::new("en_US", vec![Locale::new("en_US"), Locale::new("en"), Locale::new("fr")]);
        let sel = LocaleNegotiator::default().negotiate(&c, None, false).unwrap();
        assert_eq!(sel.names(), vec!["en"]);
        assert_eq!(sel.primary, "en");

        let c = LocaleCatalog::new("en_US", vec![Locale::new("en_US"), Locale::new("fr")]);
        let sel = LocaleNegotiator::default().negotiate(&c, None, false).unwrap();
        assert_eq!(sel.names(), vec!["en_US"]);
    }

    #[test]
    fn other_defaults_are_not_shortened() {
        let c = LocaleCatalog::new("pt_BR", vec![Locale::new("pt_BR"), Locale::new("pt")]);
        let sel = LocaleNegotiator::default().negotiate(&c, None, false).unwrap();
        assert_eq!(sel.names(), vec!["pt_BR"]);
    }

    #[test]
    fn content_candidates_chain() {
        assert_eq!(LocaleNegotiator::content_candidates(&Locale::new("de")), vec!["de"]);
        let l = Locale::new("chinese").with_aliases(["zh_Hant", "zh_TW", "zh"]);
        assert_eq!(LocaleNegotiator::content_candidates(&l), vec!["zh_Hant", "zh_TW"]);
        let l = Locale::new("chinese").with_aliases(["traditional chinese"]);
        assert_eq!(LocaleNegotiator::content_candidates(&l), vec!["traditional chinese"]);
    }

    #[tokio::test]
    async fn fallback_tries_second_alias() {
        let l = Locale::new("chinese").with_aliases(["zh_Hant", "zh_TW"]);
        let tried = Mutex::new(Vec::new());
        let found = LocaleNegotiator::fetch_with_fallback(&l, |name| {
            tried.lock().unwrap().push(name.clone());
            async move { Ok(if name == "zh_TW" { Some(42) } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(found, Some(("zh_TW".to_string(), 42)));
        assert_eq!(*tried.lock().unwrap(), vec!["zh_Hant", "zh_TW"]);
    }

    #[tokio::test]
    async fn fallback_reports_no_match() {
        let l = Locale::new("de");
        let found: Option<(String, u8)> =
            LocaleNegotiator::fetch_with_fallback(&l, |_| async { Ok(None) }).await.unwrap();
        assert!(found.is_none());
    }
}
