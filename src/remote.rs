//! Client for the remote definition and usage-example service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::Error;
use crate::types::{DefLocator, DescribedDef, Example};

/// Options for fetching a definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefGetOptions {
    /// Include rendered documentation.
    pub doc: bool,
}

/// Options for listing usage examples.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleListOptions {
    /// Ask the service to render snippets as markup.
    pub formatted: bool,
    /// Maximum number of examples to return.
    pub per_page: u32,
}

/// Resolves definitions that are not available locally. Implementations own
/// any timeout and retry policy; callers never retry.
#[async_trait]
pub trait DefinitionService: Send + Sync {
    /// Fetch one definition.
    ///
    /// # Errors
    ///
    /// Returns `Error::DefinitionNotFound` if the service has no such def,
    /// or `Error::Network` on any transport or protocol failure.
    async fn get_definition(&self, locator: &DefLocator, opts: DefGetOptions) -> Result<DescribedDef, Error>;

    /// List usage examples of one definition, in service order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` on any transport or protocol failure.
    async fn list_examples(&self, locator: &DefLocator, opts: ExampleListOptions) -> Result<Vec<Example>, Error>;
}

/// HTTP JSON client for the service.
pub struct HttpDefinitionService {
    /// Base URL ending in `/`.
    base_url: String,
    /// Pooled client carrying the per-request timeout.
    client: reqwest::Client,
}

impl HttpDefinitionService {
    /// Client for the `[remote]` config.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("srcref/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| return Error::Network { reason: e.to_string() })?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        return Ok(Self { base_url, client });
    }

    /// GET a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::DefinitionNotFound` on 404, `Error::Network` otherwise.
    async fn get_json<T: DeserializeOwned>(
        &self,
        locator: &DefLocator,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let network = |e: reqwest::Error| return Error::Network { reason: e.to_string() };

        debug!(%url, "remote request");
        let response = self.client.get(url).query(query).send().await.map_err(network)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::DefinitionNotFound { locator: locator.to_string() });
        }
        let response = response.error_for_status().map_err(network)?;
        return response.json::<T>().await.map_err(network);
    }
}

#[async_trait]
impl DefinitionService for HttpDefinitionService {
    async fn get_definition(&self, locator: &DefLocator, opts: DefGetOptions) -> Result<DescribedDef, Error> {
        let url = def_url(&self.base_url, locator);
        let query = [("Doc", opts.doc.to_string())];
        return self.get_json(locator, &url, &query).await;
    }

    async fn list_examples(&self, locator: &DefLocator, opts: ExampleListOptions) -> Result<Vec<Example>, Error> {
        let url = format!("{}/.examples", def_url(&self.base_url, locator));
        let query = [("Formatted", opts.formatted.to_string()), ("PerPage", opts.per_page.to_string())];
        let examples: Option<Vec<Example>> = self.get_json(locator, &url, &query).await?;
        return Ok(examples.unwrap_or_default());
    }
}

/// Route of a def: `repos/{repo}/.defs/{unitType}/{unit}/.def/{path}`.
/// Each `/`-separated segment is percent-encoded. Empty components are sent
/// as `.` so the route keeps its shape.
pub fn def_url(base_url: &str, locator: &DefLocator) -> String {
    let component = |s: &str| {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return ".".to_string();
        }
        return trimmed
            .split('/')
            .map(|segment| return urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
    };
    return format!(
        "{base_url}repos/{}/.defs/{}/{}/.def/{}",
        component(&locator.repo),
        component(&locator.unit_type),
        component(&locator.unit),
        component(&locator.path),
    );
}
