use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::app::{RadarError, Result};
use crate::domain::PictureOfDay;
use crate::fetcher::RemoteFeedClient;

pub const DEFAULT_BASE_URL: &str = "https://api.nasa.gov/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const FEED_PATH: &str = "neo/rest/v1/feed";
const APOD_PATH: &str = "planetary/apod";

pub struct HttpFeedClient {
    client: Client,
    base_url: Url,
}

impl HttpFeedClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("neoradar/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: Self::normalize_base(base_url)?,
        })
    }

    /// Ensure a trailing slash so relative joins keep any path prefix.
    fn normalize_base(base_url: &str) -> Result<Url> {
        let mut url = Url::parse(base_url)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn feed_url(&self, start_date: &str, end_date: &str, api_key: &str) -> Result<Url> {
        let mut url = self.base_url.join(FEED_PATH)?;
        url.query_pairs_mut()
            .append_pair("start_date", start_date)
            .append_pair("end_date", end_date)
            .append_pair("api_key", api_key);
        Ok(url)
    }

    pub fn apod_url(&self, api_key: &str) -> Result<Url> {
        let mut url = self.base_url.join(APOD_PATH)?;
        url.query_pairs_mut().append_pair("api_key", api_key);
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        debug!("GET {}", url.path());
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RemoteFeedClient for HttpFeedClient {
    async fn fetch_objects(
        &self,
        start_date: &str,
        end_date: &str,
        api_key: &str,
    ) -> Result<String> {
        let url = self.feed_url(start_date, end_date, api_key)?;
        self.get_text(url).await
    }

    async fn fetch_featured_image(&self, api_key: &str) -> Result<PictureOfDay> {
        let url = self.apod_url(api_key)?;
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| RadarError::parse("apod", e.to_string()))
    }
}
