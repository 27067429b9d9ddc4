//! Client for the remote archive service.
//!
//! Every operation is one HTTP call against the endpoint of the settings
//! snapshot it is given. There is no retry and no timeout beyond the
//! transport default.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{Document, DocumentUpdate};
use crate::settings::Settings;
use crate::{Error, Result};

/// Header carrying the user's API key, when one is configured.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Document search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Empty text means browse the most recent documents
    pub text: String,
    pub semantic: bool,
    pub limit: u32,
    pub offset: u32,
}

impl SearchQuery {
    pub fn is_browse(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if !self.is_browse() {
            params.push(("query", self.text.trim().to_string()));
            params.push(("semantic", self.semantic.to_string()));
        }
        params.push(("limit", self.limit.to_string()));
        params.push(("offset", self.offset.to_string()));
        params
    }
}

/// Operations offered by the archive service.
#[async_trait]
pub trait ArchiveApi: Send + Sync {
    /// Fetch `url`, optionally summarize it, and save it to the archive.
    async fn fetch_and_save(&self, settings: &Settings, url: &str, summarize: bool) -> Result<Document>;

    async fn query(&self, settings: &Settings, query: &SearchQuery) -> Result<Vec<Document>>;

    async fn get_document(&self, settings: &Settings, id: &str) -> Result<Document>;

    async fn update_document(
        &self,
        settings: &Settings,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document>;

    /// Documents close to `id`, each carrying a proximity `score`.
    async fn similar_documents(&self, settings: &Settings, id: &str) -> Result<Vec<Document>>;

    /// Whether the configured endpoint answers its health check.
    async fn health(&self, settings: &Settings) -> Result<bool>;
}

/// HTTP implementation of [`ArchiveApi`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("marchiver-host/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    fn authorized(&self, builder: RequestBuilder, settings: &Settings) -> RequestBuilder {
        match settings.api_key() {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Archive API returned an error");
            return Err(Error::ApiStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

/// Build `{api_base}/{segments...}`, escaping each segment.
pub fn api_url(settings: &Settings, segments: &[&str]) -> Result<Url> {
    let base = settings.api_base();
    let mut url =
        Url::parse(base).map_err(|e| Error::Config(format!("Invalid API endpoint '{}': {}", base, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("API endpoint '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

#[async_trait]
impl ArchiveApi for ApiClient {
    async fn fetch_and_save(&self, settings: &Settings, url: &str, summarize: bool) -> Result<Document> {
        let endpoint = api_url(settings, &["web", "fetch"])?;
        debug!(%endpoint, url, summarize, "Fetching page into archive");

        let summarize = if summarize { "true" } else { "false" };
        let request = self
            .http
            .post(endpoint)
            .query(&[("url", url), ("save", "true"), ("summarize", summarize)]);
        self.send_json(self.authorized(request, settings)).await
    }

    async fn query(&self, settings: &Settings, query: &SearchQuery) -> Result<Vec<Document>> {
        let endpoint = api_url(settings, &["documents"])?;
        debug!(%endpoint, browse = query.is_browse(), semantic = query.semantic, "Querying documents");

        let request = self.http.get(endpoint).query(&query.params());
        self.send_json(self.authorized(request, settings)).await
    }

    async fn get_document(&self, settings: &Settings, id: &str) -> Result<Document> {
        let endpoint = api_url(settings, &["documents", id])?;
        let request = self.http.get(endpoint);
        self.send_json(self.authorized(request, settings)).await
    }

    async fn update_document(
        &self,
        settings: &Settings,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document> {
        let endpoint = api_url(settings, &["documents", id])?;
        let request = self.http.put(endpoint).json(update);
        self.send_json(self.authorized(request, settings)).await
    }

    async fn similar_documents(&self, settings: &Settings, id: &str) -> Result<Vec<Document>> {
        let endpoint = api_url(settings, &["documents", id, "similar"])?;
        let request = self.http.get(endpoint);
        self.send_json(self.authorized(request, settings)).await
    }

    async fn health(&self, settings: &Settings) -> Result<bool> {
        let endpoint = api_url(settings, &["health"])?;
        let request = self.authorized(self.http.get(endpoint), settings);
        let response = request.send().await?;
        Ok(response.status().is_success())
    }
}
