use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::domain::RtvError;
use crate::filter::FilterStore;
use crate::table::{FileEntry, FileTable};

/// Source of the bearer credential attached to every call. Threaded
/// into the client at construction so tests can substitute their own.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> String;
}

/// A fixed token, e.g. from the CLI or environment.
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> String {
        self.0.clone()
    }
}

/// The gateway contract the viewer depends on. One implementation
/// talks HTTP; tests swap in an in-memory fake.
#[async_trait]
pub trait FileApi: Send + Sync {
    async fn list_files(&self) -> Result<Vec<FileEntry>, RtvError>;

    async fn fetch_table(
        &self,
        id: &str,
        page: u32,
        page_size: u32,
        filters: &FilterStore,
    ) -> Result<FileTable, RtvError>;

    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileEntry, RtvError>;
}

/// Normalize a server address into a base URL: a bare `host:port`
/// gets an `http://` scheme, an explicit `http://` / `https://`
/// scheme is authoritative, trailing slashes are stripped.
pub fn normalize_base_url(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

/// Path and query for one table fetch. `filters_json` is the JSON
/// array produced by [`FilterStore::to_query_json`]; it travels
/// URL-encoded as an opaque string.
pub fn table_query(id: &str, page: u32, page_size: u32, filters_json: &str) -> String {
    format!(
        "files/{}/?page={}&page_size={}&filters={}",
        urlencoding::encode(id),
        page,
        page_size,
        urlencoding::encode(filters_json)
    )
}

/// Wire value of the `file_type` upload field, derived from the file
/// name suffix rather than any declared mime type.
pub fn wire_file_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".csv") { "csv" } else { "parquet" }
}

/// HTTP implementation of [`FileApi`] over reqwest.
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    /// Build the client with a request timeout so a hung request can
    /// never pin the loading indicator forever.
    pub fn new(
        addr: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self, RtvError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RtvError::ClientBuild(e.to_string()))?;
        Ok(Self {
            base_url: normalize_base_url(addr),
            client,
            tokens,
        })
    }

    /// GET a JSON payload from `path` with the bearer credential
    /// attached. An empty body is a NoData error, a body that fails
    /// to decode a DecodeError; both are non-fatal to the caller.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, RtvError> {
        let url = format!("{}/{}", self.base_url, path);
        trace!("GET {url}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.tokens.token())
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(RtvError::NoData(format!("empty response from {path}")));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl FileApi for ApiClient {
    async fn list_files(&self) -> Result<Vec<FileEntry>, RtvError> {
        self.get_json("files/").await
    }

    async fn fetch_table(
        &self,
        id: &str,
        page: u32,
        page_size: u32,
        filters: &FilterStore,
    ) -> Result<FileTable, RtvError> {
        let path = table_query(id, page, page_size, &filters.to_query_json());
        self.get_json(&path).await
    }

    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileEntry, RtvError> {
        let url = format!("{}/upload/", self.base_url);
        debug!("POST {url} ({} bytes as {})", bytes.len(), file_name);

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("file_name", file_name.to_string())
            .text("file_type", wire_file_type(file_name));

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.tokens.token())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<FileEntry>().await?)
    }
}
