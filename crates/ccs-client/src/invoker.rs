//! Registry-driven invocation.
//!
//! [`Invoker`] combines the session, the endpoint registry and the
//! process-wide request environment to execute one logical call by
//! operation name. It is built once by [`Invoker::connect`] and then shared
//! read-only (behind an `Arc`) by every in-flight call.

use std::sync::Arc;

use ccs_protocol::{
    headers, operations, paths, resolve_url, EndpointRegistry, LocaleListing, ProtocolError,
    RequestEnv, RequestSpec, WireResponse,
};
use ccs_types::{EndpointDescriptor, HttpMethod, LocaleCatalog};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::locale::{LocaleNegotiator, LocaleSelection};
use crate::session::SessionManager;
use crate::transport::HttpTransport;

/// One positional argument of the compatibility call form.
#[derive(Clone, Debug)]
pub enum InvokeArg {
    PathParams(Vec<String>),
    /// A `?query` string, or a path/URL that replaces the template.
    Query(String),
    Spec(RequestSpec),
}

/// Explicit options for one call.
#[derive(Clone, Debug, Default)]
pub struct InvokeArgs {
    pub path_params: Vec<String>,
    pub query_or_url: Option<String>,
    pub spec: Option<RequestSpec>,
}

impl InvokeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn query(mut self, query_or_url: impl Into<String>) -> Self {
        self.query_or_url = Some(query_or_url.into());
        self
    }

    pub fn spec(mut self, spec: RequestSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Assign positional arguments to roles by their kind.
    ///
    /// Each argument fills the role matching its kind if that role is still
    /// empty; a second argument of an already-filled kind is dropped.
    pub fn from_positional(args: impl IntoIterator<Item = InvokeArg>) -> Self {
        let mut out = Self::default();
        let mut have_params = false;
        for arg in args {
            match arg {
                InvokeArg::PathParams(params) if !have_params => {
                    out.path_params = params;
                    have_params = true;
                }
                InvokeArg::Query(query) if out.query_or_url.is_none() => {
                    out.query_or_url = Some(query);
                }
                InvokeArg::Spec(spec) if out.spec.is_none() => out.spec = Some(spec),
                other => debug!(?other, "dropping duplicate positional argument"),
            }
        }
        out
    }
}

impl From<RequestSpec> for InvokeArgs {
    fn from(spec: RequestSpec) -> Self {
        Self::new().spec(spec)
    }
}

pub struct Invoker {
    instance: String,
    transport: Arc<dyn HttpTransport>,
    session: SessionManager,
    registry: EndpointRegistry,
    env: RequestEnv,
    server_version: Option<String>,
    locales: Option<LocaleSelection>,
}

impl Invoker {
    /// Assemble an invoker from already-loaded parts.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: SessionManager,
        registry: EndpointRegistry,
        env: RequestEnv,
    ) -> Self {
        Self {
            instance: session.instance().to_string(),
            transport,
            session,
            registry,
            env,
            server_version: None,
            locales: None,
        }
    }

    /// Log in, load the registry and negotiate locales.
    ///
    /// Any failure here is fatal to the run: nothing can be synced without a
    /// session, a call surface, and an agreed locale.
    pub async fn connect(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> ClientResult<Self> {
        let session = SessionManager::new(config.instance.clone(), config.credentials.clone(), transport.clone())
            .with_freshness(config.session_freshness)
            .with_timeout(config.timeout);
        let token = session.login().await?.access_token;
        let mode = session.mode();

        let env = RequestEnv {
            transfer_mode: config.transfer_mode,
            locale: None,
            profile_type: Some(mode.profile_type().to_string()),
            timeout: config.timeout,
        };

        let registry_op = EndpointDescriptor::new("getRegistry", HttpMethod::Get, paths::REGISTRY);
        let url = format!("{}{}", session.base_url(), paths::REGISTRY);
        let request = RequestSpec::new().build(url, &token, &registry_op, &env)?;
        let response = transport.send(&request).await?;
        if !response.is_success() {
            return Err(ClientError::Status {
                operation: registry_op.name,
                status: response.status,
                body: response.text(),
            });
        }
        let not_admin = || ProtocolError::NotAdministrationInterface { host: config.instance.clone() };
        let payload = match response.json_value() {
            Ok(Some(value)) => value,
            _ => return Err(not_admin().into()),
        };
        let registry = EndpointRegistry::load(&payload, &config.instance)?;
        let server_version = response.header(headers::SERVER_VERSION).map(str::to_string);
        info!(
            operations = registry.len(),
            server_version = server_version.as_deref().unwrap_or("unknown"),
            "registry loaded"
        );

        let mut invoker = Self::new(transport, session, registry, env);
        invoker.server_version = server_version;

        if invoker.supports(&[operations::LIST_LOCALES]) {
            let catalog = invoker.locale_catalog().await?;
            let selection = LocaleNegotiator::new(config.no_snippet_locale.clone()).negotiate(
                &catalog,
                config.locale.as_deref(),
                config.all_locales,
            )?;
            info!(primary = %selection.primary, working = ?selection.names(), "working locales");
            invoker.env.locale = Some(selection.primary.clone());
            invoker.locales = Some(selection);
        } else {
            warn!("server does not list locales; continuing without a working locale");
        }

        Ok(invoker)
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn env(&self) -> &RequestEnv {
        &self.env
    }

    pub fn transfer_mode(&self) -> bool {
        self.env.transfer_mode
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    pub fn locales(&self) -> Option<&LocaleSelection> {
        self.locales.as_ref()
    }

    pub fn with_locales(mut self, selection: LocaleSelection) -> Self {
        self.env.locale = Some(selection.primary.clone());
        self.locales = Some(selection);
        self
    }

    /// Returns `true` only if every named operation exists on this server.
    pub fn supports(&self, names: &[&str]) -> bool {
        self.registry.supports(names)
    }

    /// Like [`Self::supports`], but warns that `feature` is skipped when not.
    pub fn probe(&self, feature: &str, names: &[&str]) -> bool {
        let supported = self.supports(names);
        if !supported {
            let missing: Vec<&str> = names.iter().copied().filter(|n| !self.supports(&[n])).collect();
            warn!(feature, ?missing, "not supported by this server, skipping");
        }
        supported
    }

    /// Execute one call of operation `name`.
    ///
    /// A 401 is retried exactly once after a forced re-login, with the same
    /// resolved URL and spec. A non-2xx status the spec declared ignorable
    /// comes back as an empty, ignored response; any other non-2xx status is
    /// an error.
    pub async fn invoke(&self, name: &str, args: impl Into<InvokeArgs>) -> ClientResult<WireResponse> {
        let args = args.into();
        let descriptor = self.registry.require(name)?;
        let url = resolve_url(&self.instance, descriptor, &args.path_params, args.query_or_url.as_deref())?;
        let spec = args.spec.unwrap_or_default();

        let session = self.session.login().await?;
        let request = spec.build(url.clone(), &session.access_token, descriptor, &self.env)?;
        debug!(operation = name, method = %request.method, url = %request.url, "invoking");
        let mut response = self.transport.send(&request).await?;

        if response.status == 401 {
            debug!(operation = name, "session expired, logging in again");
            let session = self.session.refresh_after_expiry(&session.access_token).await?;
            let request = spec.build(url, &session.access_token, descriptor, &self.env)?;
            response = self.transport.send(&request).await?;
        }

        if response.is_success() {
            Ok(response)
        } else if spec.ignores(response.status) {
            debug!(operation = name, status = response.status, "ignoring status");
            Ok(WireResponse::ignored(response.status))
        } else {
            Err(ClientError::Status {
                operation: name.to_string(),
                status: response.status,
                body: response.text(),
            })
        }
    }

    /// Positional compatibility form of [`Self::invoke`].
    pub async fn invoke_positional(&self, name: &str, args: Vec<InvokeArg>) -> ClientResult<WireResponse> {
        self.invoke(name, InvokeArgs::from_positional(args)).await
    }

    /// Invoke and decode the body as JSON; `None` for empty or ignored results.
    pub async fn invoke_json(&self, name: &str, args: impl Into<InvokeArgs>) -> ClientResult<Option<Value>> {
        Ok(self.invoke(name, args).await?.json_value()?)
    }

    pub async fn locale_catalog(&self) -> ClientResult<LocaleCatalog> {
        let response = self.invoke(operations::LIST_LOCALES, InvokeArgs::new()).await?;
        let listing: LocaleListing = response.parse()?;
        Ok(listing.into_catalog())
    }
}
