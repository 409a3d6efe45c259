//! Client for the Eagle app's local HTTP API.
//!
//! Eagle exposes its library on `http://localhost:41595`. Every endpoint
//! wraps its payload in `{"status": ..., "data": ...}`; this module unwraps
//! the envelope and maps the payload onto typed models.
//!
//! # Example
//!
//! ```no_run
//! use eaglelink::eagle::{EagleClient, ListQuery};
//! use eaglelink::config::EagleConfig;
//!
//! # async fn run() -> eaglelink::Result<()> {
//! let client = EagleClient::new(&EagleConfig::default())?;
//! let assets = client.list_items(&ListQuery::with_limit(20)).await?;
//! for asset in assets {
//!     println!("{} ({})", asset.file_name(), asset.display_size());
//! }
//! # Ok(())
//! # }
//! ```

mod models;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::EagleConfig;
use crate::error::{Error, Result};
use crate::filter::{rank, AssetFilter};

pub use models::{
    flatten_folders, resolve_folder_id, ApplicationInfo, Asset, AssetDetail, Folder, LibraryInfo,
    LibraryLocation, ListQuery,
};

use models::Envelope;

const APPLICATION_INFO: &str = "/api/application/info";
const LIBRARY_INFO: &str = "/api/library/info";
const FOLDER_LIST: &str = "/api/folder/list";
const ITEM_LIST: &str = "/api/item/list";
const ITEM_INFO: &str = "/api/item/info";
const ITEM_THUMBNAIL: &str = "/api/item/thumbnail";

/// Page size when a query does not set a limit.
const DEFAULT_PAGE_SIZE: usize = 200;

/// HTTP client for one Eagle instance.
#[derive(Debug, Clone)]
pub struct EagleClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl EagleClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &EagleConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.base_url, config.token.clone()))
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request. The inner `Err` carries the message of an error
    /// envelope that came back with a success status.
    async fn request(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<std::result::Result<Value, String>> {
        let mut params: Vec<(&str, String)> = query.to_vec();
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }

        debug!(endpoint, params = params.len(), "Eagle request");
        let response = self
            .client
            .get(format!("{}{endpoint}", self.base_url))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        trace!(endpoint, %status, body_len = body.len(), "Eagle response");

        let envelope: Option<Envelope<Value>> = serde_json::from_str(&body).ok();
        if !status.is_success() {
            let message = envelope
                .as_ref()
                .and_then(envelope_message)
                .map_or_else(|| format!("HTTP {status}"), |m| format!("{m} (HTTP {status})"));
            return Err(Error::eagle_api(endpoint, message));
        }

        let envelope =
            envelope.ok_or_else(|| Error::eagle_api(endpoint, "response is not an API envelope"))?;
        if envelope.status != "success" {
            return Ok(Err(
                envelope_message(&envelope).unwrap_or_else(|| "request failed".into())
            ));
        }

        envelope
            .data
            .map(Ok)
            .ok_or_else(|| Error::eagle_api(endpoint, "response has no data"))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T> {
        match self.request(endpoint, query).await? {
            Ok(data) => Ok(serde_json::from_value(data)?),
            Err(message) => Err(Error::eagle_api(endpoint, message)),
        }
    }

    /// `GET /api/application/info`.
    ///
    /// # Errors
    ///
    /// Returns an error if Eagle is unreachable or answers with an error.
    pub async fn application_info(&self) -> Result<ApplicationInfo> {
        self.get(APPLICATION_INFO, &[]).await
    }

    /// Whether Eagle answers at all. Never errors.
    pub async fn is_running(&self) -> bool {
        match self.application_info().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Eagle is not reachable");
                false
            }
        }
    }

    /// `GET /api/library/info`.
    ///
    /// # Errors
    ///
    /// Returns an error if Eagle is unreachable or answers with an error.
    pub async fn library_info(&self) -> Result<LibraryInfo> {
        self.get(LIBRARY_INFO, &[]).await
    }

    /// Root directory of the open library, unless overridden.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the library info request
    /// fails.
    pub async fn library_root(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }
        Ok(self.library_info().await?.library.path)
    }

    /// `GET /api/folder/list`.
    ///
    /// # Errors
    ///
    /// Returns an error if Eagle is unreachable or answers with an error.
    pub async fn folder_list(&self) -> Result<Vec<Folder>> {
        self.get(FOLDER_LIST, &[]).await
    }

    /// `GET /api/item/list`.
    ///
    /// # Errors
    ///
    /// Returns an error if Eagle is unreachable or answers with an error.
    pub async fn list_items(&self, query: &ListQuery) -> Result<Vec<Asset>> {
        let items: Vec<Asset> = self.get(ITEM_LIST, &query.to_pairs()).await?;
        debug!(count = items.len(), "Listed Eagle items");
        Ok(items)
    }

    /// Every item matching `query`, fetched page by page.
    ///
    /// `query.limit` is the page size and `query.offset` the first page;
    /// Eagle counts `offset` in pages. Stops at the first short page.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn list_all_items(&self, query: &ListQuery) -> Result<Vec<Asset>> {
        let page_size = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let mut page = query.clone();
        page.limit = Some(page_size);
        let mut offset = query.offset.unwrap_or(0);

        let mut items = Vec::new();
        loop {
            page.offset = Some(offset);
            let batch = self.list_items(&page).await?;
            let last = batch.len() < page_size;
            items.extend(batch);
            if last {
                break;
            }
            offset += 1;
        }
        debug!(count = items.len(), pages = offset + 1, "Listed all Eagle items");
        Ok(items)
    }

    /// Search the library: list, filter, then fuzzy-rank by `keyword`.
    ///
    /// With no keyword and an empty filter a single page of `limit` items is
    /// enough. Otherwise the whole library is paged through in pages of
    /// `base.limit` so that matches past the first page are found. The result
    /// is cut to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if a list request fails.
    pub async fn search(
        &self,
        base: &ListQuery,
        filter: &AssetFilter,
        keyword: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Asset>> {
        let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());

        let assets = if keyword.is_none() && filter.is_empty() {
            let mut query = base.clone();
            query.limit = Some(limit);
            self.list_items(&query).await?
        } else {
            self.list_all_items(base).await?
        };

        let mut assets = filter.apply(assets);
        if let Some(keyword) = keyword {
            assets = rank(keyword, assets);
        }
        assets.truncate(limit);
        Ok(assets)
    }

    /// `GET /api/item/info`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] when Eagle answers with an error
    /// envelope for the id. HTTP failures are passed through.
    pub async fn item_info(&self, id: &str) -> Result<Asset> {
        match self.request(ITEM_INFO, &[("id", id.to_string())]).await? {
            Ok(data) => Ok(serde_json::from_value(data)?),
            Err(message) => {
                debug!(id, %message, "Eagle rejected item id");
                Err(Error::AssetNotFound(id.to_string()))
            }
        }
    }

    /// `GET /api/item/thumbnail`, decoded to a filesystem path.
    ///
    /// # Errors
    ///
    /// Returns an error if Eagle is unreachable or answers with an error.
    pub async fn item_thumbnail(&self, id: &str) -> Result<PathBuf> {
        let raw: String = self
            .get(ITEM_THUMBNAIL, &[("id", id.to_string())])
            .await?;
        let decoded = urlencoding::decode(&raw).map_or(raw.clone(), |cow| cow.into_owned());
        Ok(PathBuf::from(decoded))
    }

    /// Fetch an asset and its thumbnail concurrently.
    ///
    /// A thumbnail failure is not fatal; the detail simply has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the item info request fails.
    pub async fn asset_detail(&self, id: &str) -> Result<AssetDetail> {
        let (asset, thumbnail) = tokio::join!(self.item_info(id), self.item_thumbnail(id));
        let asset = asset?;
        let thumbnail = match thumbnail {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(id, error = %e, "No thumbnail for asset");
                None
            }
        };
        Ok(AssetDetail { asset, thumbnail })
    }
}

fn envelope_message(envelope: &Envelope<Value>) -> Option<String> {
    envelope
        .message
        .clone()
        .or_else(|| envelope.data.as_ref().and_then(Value::as_str).map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> EagleClient {
        EagleClient::with_client(Client::new(), &server.url(), None)
    }

    #[test]
    fn test_with_client_trims_trailing_slash() {
        let client = EagleClient::with_client(Client::new(), "http://localhost:41595/", None);
        assert_eq!(client.base_url(), "http://localhost:41595");
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let config = EagleConfig {
            base_url: "not a url".to_string(),
            ..EagleConfig::default()
        };
        assert!(matches!(EagleClient::new(&config), Err(Error::Url(_))));
    }

    #[tokio::test]
    async fn test_application_info() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", APPLICATION_INFO)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"success","data":{"version":"3.0.0","buildVersion":"20230101","platform":"darwin"}}"#,
            )
            .create_async()
            .await;

        let info = client_for(&server).application_info().await.unwrap();
        assert_eq!(info.version, "3.0.0");
        assert_eq!(info.platform, "darwin");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_items_sends_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/api/item/list".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("ext".into(), "png".into()),
                Matcher::UrlEncoded("tags".into(), "ui,dark".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":[
                    {"id":"A1","name":"button","ext":"png","size":2048,"tags":["ui","dark"]},
                    {"id":"A2","name":"panel","ext":"png","size":4096,"tags":["ui","dark"]}
                ]}"#,
            )
            .create_async()
            .await;

        let query = ListQuery {
            limit: Some(10),
            ext: Some("png".to_string()),
            tags: vec!["ui".to_string(), "dark".to_string()],
            ..ListQuery::default()
        };
        let items = client_for(&server).list_items(&query).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "panel");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_is_appended() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/api/folder/list".to_string()))
            .match_query(Matcher::UrlEncoded("token".into(), "secret".into()))
            .with_status(200)
            .with_body(r#"{"status":"success","data":[]}"#)
            .create_async()
            .await;

        let client =
            EagleClient::with_client(Client::new(), &server.url(), Some("secret".to_string()));
        assert!(client.folder_list().await.unwrap().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_envelope_maps_to_eagle_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", LIBRARY_INFO)
            .with_status(200)
            .with_body(r#"{"status":"error","data":"Library is not loaded"}"#)
            .create_async()
            .await;

        let err = client_for(&server).library_info().await.unwrap_err();
        match err {
            Error::EagleApi { endpoint, message } => {
                assert_eq!(endpoint, LIBRARY_INFO);
                assert_eq!(message, "Library is not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", FOLDER_LIST)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server).folder_list().await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_item_info_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/item/info".to_string()))
            .with_status(200)
            .with_body(r#"{"status":"error","message":"Item does not exist"}"#)
            .create_async()
            .await;

        let err = client_for(&server).item_info("NOPE").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_item_info_server_error_is_not_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/item/info".to_string()))
            .with_status(500)
            .with_body("internal server error")
            .create_async()
            .await;

        let err = client_for(&server).item_info("A1").await.unwrap_err();
        assert!(!err.is_not_found());
        match err {
            Error::EagleApi { endpoint, message } => {
                assert_eq!(endpoint, ITEM_INFO);
                assert!(message.contains("HTTP 500"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    async fn mock_page(
        server: &mut mockito::ServerGuard,
        offset: &str,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", Matcher::Regex(r"^/api/item/list".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "2".into()),
                Matcher::UrlEncoded("offset".into(), offset.into()),
            ]))
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    async fn two_page_library(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
        vec![
            mock_page(
                server,
                "0",
                r#"{"status":"success","data":[
                    {"id":"A1","name":"beach","ext":"jpg"},
                    {"id":"A2","name":"dune","ext":"jpg"}
                ]}"#,
            )
            .await,
            mock_page(
                server,
                "1",
                r#"{"status":"success","data":[{"id":"A3","name":"sunset-hero","ext":"png"}]}"#,
            )
            .await,
        ]
    }

    #[tokio::test]
    async fn test_list_all_items_pages_until_short_page() {
        let mut server = mockito::Server::new_async().await;
        let mocks = two_page_library(&mut server).await;

        let items = client_for(&server)
            .list_all_items(&ListQuery::with_limit(2))
            .await
            .unwrap();
        let ids: Vec<_> = items.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "A3"]);
        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_search_finds_match_past_first_page() {
        let mut server = mockito::Server::new_async().await;
        let mocks = two_page_library(&mut server).await;

        let found = client_for(&server)
            .search(&ListQuery::with_limit(2), &AssetFilter::new(), Some("sunset"), 20)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "A3");
        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_search_filter_spans_pages() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = two_page_library(&mut server).await;

        let found = client_for(&server)
            .search(
                &ListQuery::with_limit(2),
                &AssetFilter::new().extensions(["png"]),
                None,
                20,
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "sunset-hero");
    }

    #[tokio::test]
    async fn test_search_without_criteria_reads_one_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/api/item/list".to_string()))
            .match_query(Matcher::UrlEncoded("limit".into(), "3".into()))
            .with_status(200)
            .with_body(r#"{"status":"success","data":[{"id":"A1","name":"beach","ext":"jpg"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let found = client_for(&server)
            .search(&ListQuery::with_limit(200), &AssetFilter::new(), Some("  "), 3)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_asset_detail_joins_info_and_thumbnail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/item/info".to_string()))
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"id":"A1","name":"hero","ext":"jpg"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex(r"^/api/item/thumbnail".to_string()))
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":"/lib/images/A1.info/hero%20shot_thumbnail.png"}"#,
            )
            .create_async()
            .await;

        let detail = client_for(&server).asset_detail("A1").await.unwrap();
        assert_eq!(detail.asset.name, "hero");
        assert_eq!(
            detail.thumbnail,
            Some(PathBuf::from("/lib/images/A1.info/hero shot_thumbnail.png"))
        );
    }

    #[tokio::test]
    async fn test_asset_detail_without_thumbnail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/item/info".to_string()))
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"id":"A1","name":"doc","ext":"pdf"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex(r"^/api/item/thumbnail".to_string()))
            .with_status(200)
            .with_body(r#"{"status":"error"}"#)
            .create_async()
            .await;

        let detail = client_for(&server).asset_detail("A1").await.unwrap();
        assert!(detail.thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_library_root_override_skips_request() {
        let client = EagleClient::with_client(Client::new(), "http://127.0.0.1:9", None);
        let root = client
            .library_root(Some(Path::new("/tmp/My.library")))
            .await
            .unwrap();
        assert_eq!(root, PathBuf::from("/tmp/My.library"));
    }

    #[tokio::test]
    async fn test_is_running_false_when_unreachable() {
        let client = EagleClient::with_client(Client::new(), "http://127.0.0.1:9", None);
        assert!(!client.is_running().await);
    }
}
