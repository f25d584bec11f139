//! Single source of truth for asteroid data.
//!
//! [`SyncRepository`] sits between the remote feed and the local store.
//! Reads are live queries against the store and never touch the network;
//! writes go through [`SyncRepository::refresh`] or
//! [`SyncRepository::replace_window`].

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::app::{RadarError, Result};
use crate::domain::window::format_date;
use crate::domain::{Asteroid, CacheStatus, PictureOfDay, RefreshWindow};
use crate::fetcher::RemoteFeedClient;
use crate::normalizer::Normalizer;
use crate::store::{AsteroidQuery, LiveQuery, Store};

pub struct SyncRepository<S> {
    store: Arc<S>,
    client: Arc<dyn RemoteFeedClient + Send + Sync>,
    normalizer: Normalizer,
    refresh_lock: Mutex<()>,
    picture: watch::Sender<Option<PictureOfDay>>,
    status: watch::Sender<CacheStatus>,
}

impl<S: Store + Send + Sync + 'static> SyncRepository<S> {
    pub fn new(store: Arc<S>, client: Arc<dyn RemoteFeedClient + Send + Sync>) -> Self {
        let (picture, _) = watch::channel(None);
        let (status, _) = watch::channel(CacheStatus::default());
        Self {
            store,
            client,
            normalizer: Normalizer::new(),
            refresh_lock: Mutex::new(()),
            picture,
            status,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // Live queries

    pub fn observe_all(&self) -> LiveQuery<S> {
        LiveQuery::new(self.store.clone(), AsteroidQuery::All)
    }

    pub fn observe_by_date(&self, date: &str) -> LiveQuery<S> {
        LiveQuery::new(self.store.clone(), AsteroidQuery::ByDate(date.to_string()))
    }

    pub fn observe_range(&self, start: &str, end: &str) -> LiveQuery<S> {
        LiveQuery::new(
            self.store.clone(),
            AsteroidQuery::Range {
                start: start.to_string(),
                end: end.to_string(),
            },
        )
    }

    pub fn observe_today(&self, today: NaiveDate) -> LiveQuery<S> {
        self.observe_by_date(&format_date(today))
    }

    pub fn observe_week(&self, window: &RefreshWindow) -> LiveQuery<S> {
        self.observe_range(&window.start, &window.end)
    }

    // Writes

    /// Fetch `[start, end]`, parse it, and upsert the whole batch.
    ///
    /// Nothing is written unless both the fetch and the parse succeed.
    pub async fn refresh(&self, start: &str, end: &str, api_key: &str) -> Result<usize> {
        let _guard = self.refresh_guard()?;
        let asteroids = self.download(start, end, api_key).await?;

        let store = self.store.clone();
        let count = tokio::task::spawn_blocking(move || store.upsert_all(&asteroids)).await??;

        info!("Stored {} asteroids for {}..{}", count, start, end);
        Ok(count)
    }

    /// Like [`SyncRepository::refresh`], but clears the previous cache in the
    /// same transaction. A failed fetch or parse leaves the cache untouched.
    pub async fn replace_window(&self, start: &str, end: &str, api_key: &str) -> Result<usize> {
        let _guard = self.refresh_guard()?;
        let asteroids = self.download(start, end, api_key).await?;

        let store = self.store.clone();
        let count = tokio::task::spawn_blocking(move || store.replace_all(&asteroids)).await??;

        info!("Replaced cache with {} asteroids for {}..{}", count, start, end);
        Ok(count)
    }

    pub async fn clear_all(&self) -> Result<usize> {
        let store = self.store.clone();
        let removed = tokio::task::spawn_blocking(move || store.delete_all()).await??;
        info!("Cleared {} cached asteroids", removed);
        Ok(removed)
    }

    /// Clear, then [`SyncRepository::refresh`], both under the refresh guard
    /// so an overlapping cycle cannot wipe a batch just stored. A failed
    /// fetch leaves the cache empty.
    pub async fn clear_and_refresh(&self, start: &str, end: &str, api_key: &str) -> Result<usize> {
        let _guard = self.refresh_guard()?;
        self.clear_all().await?;
        let asteroids = self.download(start, end, api_key).await?;

        let store = self.store.clone();
        let count = tokio::task::spawn_blocking(move || store.upsert_all(&asteroids)).await??;

        info!("Stored {} asteroids for {}..{}", count, start, end);
        Ok(count)
    }

    fn refresh_guard(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.refresh_lock
            .try_lock()
            .map_err(|_| RadarError::RefreshInProgress)
    }

    async fn download(&self, start: &str, end: &str, api_key: &str) -> Result<Vec<Asteroid>> {
        let body = self.client.fetch_objects(start, end, api_key).await?;
        info!("Received {} bytes from feed", body.len());

        let normalizer = self.normalizer.clone();
        tokio::task::spawn_blocking(move || normalizer.normalize(&body)).await?
    }

    // Featured image

    /// Single remote call; errors go straight back to the caller.
    pub async fn fetch_featured_image(&self, api_key: &str) -> Result<PictureOfDay> {
        self.client.fetch_featured_image(api_key).await
    }

    /// Fetch the featured image and publish the outcome through
    /// [`SyncRepository::status`] and [`SyncRepository::picture_of_day`].
    ///
    /// On failure the previously published image is kept.
    pub async fn load_featured_image(&self, api_key: &str) -> CacheStatus {
        self.status.send_replace(CacheStatus::Loading);

        let status = match self.fetch_featured_image(api_key).await {
            Ok(picture) => {
                self.picture.send_replace(Some(picture));
                CacheStatus::Done
            }
            Err(e) => {
                warn!("Failed to fetch picture of the day: {}", e);
                CacheStatus::Error
            }
        };

        self.status.send_replace(status);
        status
    }

    pub fn picture_of_day(&self) -> watch::Receiver<Option<PictureOfDay>> {
        self.picture.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<CacheStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::asteroid::fixtures::asteroid;
    use crate::fetcher::stub::StubClient;
    use crate::store::SqliteStore;

    const FEED: &str = r#"{"near_earth_objects":{
        "2024-01-02":[{"id":"2","name":"(2) B","close_approach_data":[{"close_approach_date":"2024-01-02","relative_velocity":{"kilometers_per_second":"7.0"},"miss_distance":{"astronomical":"0.2"}}],"absolute_magnitude_h":19.0,"estimated_diameter":{"kilometers":{"estimated_diameter_min":0.5}},"is_potentially_hazardous_asteroid":true}],
        "2024-01-01":[{"id":"1","name":"(1) A","close_approach_data":[{"close_approach_date":"2024-01-01","relative_velocity":{"kilometers_per_second":"5.2"},"miss_distance":{"astronomical":"0.01"}}],"absolute_magnitude_h":20.1,"estimated_diameter":{"kilometers":{"estimated_diameter_min":0.3}},"is_potentially_hazardous_asteroid":false}]
    }}"#;

    fn picture(title: &str) -> PictureOfDay {
        PictureOfDay {
            title: title.into(),
            explanation: String::new(),
            url: format!("https://apod.nasa.gov/{title}.jpg"),
            media_type: "image".into(),
        }
    }

    fn repository(client: StubClient) -> (SyncRepository<SqliteStore>, Arc<StubClient>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let client = Arc::new(client);
        (SyncRepository::new(store, client.clone()), client)
    }

    #[tokio::test]
    async fn test_refresh_stores_parsed_batch() {
        let (repo, client) = repository(StubClient::new());
        client.push_feed(FEED);

        let count = assert_ok!(repo.refresh("2024-01-01", "2024-01-07", "key").await);
        assert_eq!(count, 2);

        let all = repo.observe_all().current().await.unwrap();
        assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_refresh_network_error_propagates_without_write() {
        let (repo, client) = repository(StubClient::new());
        repo.store().upsert_all(&[asteroid(9, "2023-12-31")]).unwrap();
        client.push_feed_error("connection reset");

        let err = repo.refresh("2024-01-01", "2024-01-07", "key").await.unwrap_err();
        assert!(matches!(err, RadarError::Other(ref m) if m == "connection reset"));
        assert_eq!(repo.store().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_parse_error_propagates_without_write() {
        let (repo, client) = repository(StubClient::new());
        client.push_feed(r#"{"near_earth_objects":{"2024-01-01":[{"id":"1"}]}}"#);

        let err = repo.refresh("2024-01-01", "2024-01-07", "key").await.unwrap_err();
        assert!(matches!(err, RadarError::Parse { .. }));
        assert_eq!(repo.store().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_keeps_rows_outside_batch() {
        let (repo, client) = repository(StubClient::new());
        repo.store().upsert_all(&[asteroid(9, "2023-12-31")]).unwrap();
        client.push_feed(FEED);

        repo.refresh("2024-01-01", "2024-01-07", "key").await.unwrap();
        assert_eq!(repo.store().count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_replace_window_drops_stale_rows() {
        let (repo, client) = repository(StubClient::new());
        repo.store().upsert_all(&[asteroid(9, "2023-12-31")]).unwrap();
        client.push_feed(FEED);

        repo.replace_window("2024-01-01", "2024-01-07", "key").await.unwrap();
        let ids: Vec<i64> = repo.store().query_all().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_rejected() {
        let (repo, client) = repository(StubClient::new().with_delay(Duration::from_millis(200)));
        client.push_feed(FEED);
        client.push_feed(FEED);
        let repo = Arc::new(repo);

        let first = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.refresh("2024-01-01", "2024-01-07", "key").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = repo.refresh("2024-01-01", "2024-01-07", "key").await;
        assert!(matches!(second, Err(RadarError::RefreshInProgress)));

        assert_eq!(first.await.unwrap().unwrap(), 2);
        assert_eq!(client.feed_calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_refresh_waits_for_running_refresh() {
        let (repo, client) = repository(StubClient::new().with_delay(Duration::from_millis(200)));
        client.push_feed(FEED);
        client.push_feed(FEED);
        let repo = Arc::new(repo);

        let first = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.refresh("2024-01-01", "2024-01-07", "key").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = repo.clear_and_refresh("2024-01-01", "2024-01-07", "key").await;
        assert!(matches!(second, Err(RadarError::RefreshInProgress)));

        assert_eq!(first.await.unwrap().unwrap(), 2);
        assert_eq!(repo.store().count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_and_refresh_drops_stale_rows() {
        let (repo, client) = repository(StubClient::new());
        repo.store().upsert_all(&[asteroid(9, "2023-12-31")]).unwrap();
        client.push_feed(FEED);

        assert_eq!(repo.clear_and_refresh("2024-01-01", "2024-01-07", "key").await.unwrap(), 2);
        let ids: Vec<i64> = repo.store().query_all().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_refresh_rejects_impossible_date_without_write() {
        let (repo, client) = repository(StubClient::new());
        client.push_feed(&FEED.replace(
            r#""close_approach_date":"2024-01-02""#,
            r#""close_approach_date":"2024-02-31""#,
        ));

        let err = repo.refresh("2024-01-01", "2024-01-07", "key").await.unwrap_err();
        assert!(matches!(err, RadarError::Parse { ref key, .. } if key.ends_with("close_approach_date")));
        assert_eq!(repo.store().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_featured_image_reports_loading_mid_fetch() {
        let (repo, client) = repository(StubClient::new().with_delay(Duration::from_millis(200)));
        client.push_picture(picture("nebula"));
        client.push_picture(picture("comet"));
        let repo = Arc::new(repo);
        let status = repo.status();

        assert_eq!(repo.load_featured_image("key").await, CacheStatus::Done);

        let second = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.load_featured_image("key").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*status.borrow(), CacheStatus::Loading);
        assert_eq!(repo.picture_of_day().borrow().as_ref().unwrap().title, "nebula");

        assert_eq!(second.await.unwrap(), CacheStatus::Done);
        assert_eq!(*status.borrow(), CacheStatus::Done);
        assert_eq!(repo.picture_of_day().borrow().as_ref().unwrap().title, "comet");
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (repo, _) = repository(StubClient::new());
        repo.store()
            .upsert_all(&[asteroid(1, "2024-01-01"), asteroid(2, "2024-01-02")])
            .unwrap();

        assert_eq!(repo.clear_all().await.unwrap(), 2);
        assert!(repo.observe_all().current().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observe_today_and_week() {
        let (repo, _) = repository(StubClient::new());
        let rows: Vec<Asteroid> = (1..=10)
            .map(|day| asteroid(day, &format!("2024-01-{day:02}")))
            .collect();
        repo.store().upsert_all(&rows).unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let today_rows = repo.observe_today(today).current().await.unwrap();
        assert_eq!(today_rows.len(), 1);
        assert_eq!(today_rows[0].id, 3);

        let week = repo
            .observe_week(&RefreshWindow::week_from(today))
            .current()
            .await
            .unwrap();
        assert_eq!(week.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 4, 5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn test_observer_sees_refresh() {
        let (repo, client) = repository(StubClient::new());
        client.push_feed(FEED);

        let mut live = repo.observe_by_date("2024-01-02");
        assert!(live.current().await.unwrap().is_empty());

        repo.refresh("2024-01-01", "2024-01-07", "key").await.unwrap();
        let rows = live.next().await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].codename, "(2) B");
    }

    #[tokio::test]
    async fn test_fetch_featured_image_error_propagates() {
        let (repo, client) = repository(StubClient::new());
        client.push_picture_error("timeout");

        assert_err!(repo.fetch_featured_image("key").await);
    }

    #[tokio::test]
    async fn test_load_featured_image_publishes_status() {
        let (repo, client) = repository(StubClient::new());
        let status = repo.status();
        let picture_rx = repo.picture_of_day();
        client.push_picture(picture("nebula"));

        assert_eq!(repo.load_featured_image("key").await, CacheStatus::Done);
        assert_eq!(*status.borrow(), CacheStatus::Done);
        assert_eq!(picture_rx.borrow().as_ref().unwrap().title, "nebula");
    }

    #[tokio::test]
    async fn test_failed_image_load_keeps_previous_picture() {
        let (repo, client) = repository(StubClient::new());
        client.push_picture(picture("nebula"));
        client.push_picture_error("503");

        repo.load_featured_image("key").await;
        assert_eq!(repo.load_featured_image("key").await, CacheStatus::Error);

        assert_eq!(*repo.status().borrow(), CacheStatus::Error);
        assert_eq!(repo.picture_of_day().borrow().as_ref().unwrap().title, "nebula");
    }
}
