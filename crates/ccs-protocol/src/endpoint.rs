/// Path suffixes appended to the credential mode's base prefix.
pub mod paths {
    pub const LOGIN: &str = "/login/";
    pub const REGISTRY: &str = "/registry";
}

/// Operation names the client relies on by name.
pub mod operations {
    /// Lists the server's locales. Never receives a locale header.
    pub const LIST_LOCALES: &str = "listLocales";
}

/// Header names, lower-cased. Wire requests store header names lower-cased.
pub mod headers {
    pub const AUTHORIZATION: &str = "authorization";
    pub const ACCEPT: &str = "accept";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const ETAG: &str = "etag";
    pub const IF_MATCH: &str = "if-match";
    pub const LOCALE: &str = "x-ccasset-language";
    pub const PROFILE_TYPE: &str = "x-ccprofiletype";
    pub const SERVER_VERSION: &str = "x-server-version";

    pub const JSON: &str = "application/json";
    pub const FORM: &str = "application/x-www-form-urlencoded";
}
