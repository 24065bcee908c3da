//! Cursor-paginated access to the catalog API.
//!
//! Requests are issued one at a time; each page is awaited before the next is
//! requested. Any non-success status aborts the whole fetch.

use crate::config::{AuthConfig, Credentials};
use crate::entity_ref::EntityRef;
use crate::error::{CatalogError, Result};
use crate::filter::CatalogQuery;
use crate::types::{EntitiesResponse, Entity, PageInfo};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};
use std::path::Path;
use tracing::debug;

pub const QUERY_PATH: &str = "/api/catalog/entities/by-query";
pub const REFS_PATH: &str = "/api/catalog/entities/by-refs";

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request/response seam between the catalog client and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse>;
    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse>;
}

/// `reqwest`-backed transport with the configured credentials attached.
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("backstagectl/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout());

        if let Credentials::ClientCertificate { cert, key } = &credentials {
            let mut pem = std::fs::read(cert)?;
            pem.push(b'\n');
            pem.extend(std::fs::read(key)?);
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            credentials,
        })
    }

    fn attach_credentials(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::ClientCertificate { .. } => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = self.attach_credentials(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        self.send(self.client.get(url)).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse> {
        self.send(self.client.post(url).json(body)).await
    }
}

/// Catalog client for one command invocation.
pub struct CatalogClient<T: Transport = HttpTransport> {
    base_url: String,
    transport: T,
}

impl CatalogClient<HttpTransport> {
    /// Build a client talking HTTP with the credentials from `config`.
    pub fn connect(config: &AuthConfig) -> Result<Self> {
        Ok(Self::new(config.base_url(), HttpTransport::new(config)?))
    }
}

impl<T: Transport> CatalogClient<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn endpoint(&self, path: &str, query: &str, cursor: Option<&str>) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            CatalogError::Config(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }
        Ok(url.to_string())
    }

    /// Every entity matching `query`, all pages concatenated in arrival order.
    pub async fn fetch_by_query(&self, query: &CatalogQuery) -> Result<Vec<Entity>> {
        let query = query.to_query_string();
        let mut entities = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let url = self.endpoint(QUERY_PATH, &query, cursor.as_deref())?;
            debug!(%url, page = pages + 1, "GET by-query");
            let page = parse_page(self.transport.get(&url).await?)?;
            pages += 1;
            entities.extend(page.items);

            match next_cursor(&page.page_info, cursor.as_deref())? {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(pages, entities = entities.len(), "by-query complete");
        Ok(entities)
    }

    /// Resolve `refs` in one batch.
    ///
    /// The result is positional: item `i` answers `refs[i]`, and a ref that does
    /// not exist yields a placeholder entity (empty `kind`).
    pub async fn fetch_by_refs(&self, refs: &[EntityRef], fields: &[&str]) -> Result<Vec<Entity>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let entity_refs: Vec<String> = refs.iter().map(ToString::to_string).collect();
        let body = json!({ "entityRefs": entity_refs, "fields": fields });

        let mut entities = Vec::with_capacity(refs.len());
        let mut cursor: Option<String> = None;

        loop {
            let url = self.endpoint(REFS_PATH, "", cursor.as_deref())?;
            debug!(%url, refs = refs.len(), "POST by-refs");
            let page = parse_page(self.transport.post_json(&url, &body).await?)?;
            entities.extend(page.items);

            match next_cursor(&page.page_info, cursor.as_deref())? {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if entities.len() != refs.len() {
            return Err(CatalogError::MalformedResponse(format!(
                "by-refs returned {} items for {} requested refs",
                entities.len(),
                refs.len()
            )));
        }
        Ok(entities)
    }
}

/// Loaded config plus the client built from it, created once per invocation.
pub struct Session<T: Transport = HttpTransport> {
    pub config: AuthConfig,
    pub client: CatalogClient<T>,
}

impl Session<HttpTransport> {
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = AuthConfig::load(config_path)?;
        let client = CatalogClient::connect(&config)?;
        debug!(base_url = %config.base_url(), "session opened");
        Ok(Self { config, client })
    }
}

fn parse_page(response: RawResponse) -> Result<EntitiesResponse> {
    if !response.is_success() {
        return Err(CatalogError::CatalogRequestFailed {
            status: response.status,
            body: response.body,
        });
    }
    serde_json::from_str(&response.body).map_err(|e| CatalogError::MalformedResponse(e.to_string()))
}

/// The cursor to follow, or `None` on the terminal page.
fn next_cursor(page_info: &PageInfo, current: Option<&str>) -> Result<Option<String>> {
    match page_info.next() {
        None => Ok(None),
        Some(c) if Some(c) == current => Err(CatalogError::MalformedResponse(format!(
            "catalog returned the same cursor '{}' twice",
            c
        ))),
        Some(c) => Ok(Some(c.to_string())),
    }
}
