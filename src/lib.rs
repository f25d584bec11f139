//! # neoradar
//!
//! An offline-first cache of near-Earth object close approaches.
//!
//! ## Architecture
//!
//! ```text
//! SyncScheduler → RefreshJob → SyncRepository → RemoteFeedClient → Normalizer → Store
//! ```
//!
//! Readers subscribe to live queries on the [`store`] and are re-notified
//! after every committed write, independent of when refreshes happen.
//!
//! ## Quick Start
//!
//! ```bash
//! # Fill the cache for the coming week
//! neoradar refresh
//!
//! # Show what is cached
//! neoradar list --week
//!
//! # Keep refreshing once a day
//! neoradar daemon start
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// the remote client and the repository.
pub mod app;

/// Configuration loaded from `~/.config/neoradar/config.toml`.
pub mod config;

/// Foreground daemon running the refresh schedule.
///
/// - `neoradar daemon start` - Run the scheduler until interrupted
/// - `neoradar daemon stop` - Stop the daemon
/// - `neoradar daemon status` - Check if daemon is running
pub mod daemon;

/// Command-line interface using clap.
pub mod cli;

/// Core domain models.
///
/// - [`Asteroid`](domain::Asteroid): one close approach, keyed by NeoWs id
/// - [`PictureOfDay`](domain::PictureOfDay): the featured image, never cached
/// - [`CacheStatus`](domain::CacheStatus): featured-image fetch state
/// - [`RefreshWindow`](domain::RefreshWindow): the `[today, today + 6]` range
pub mod domain;

/// Remote NASA endpoints.
///
/// - [`RemoteFeedClient`](fetcher::RemoteFeedClient): Async trait for the two endpoints
/// - [`HttpFeedClient`](fetcher::HttpFeedClient): reqwest-based implementation
pub mod fetcher;

/// Turns the nested NeoWs feed document into flat [`Asteroid`](domain::Asteroid) records.
pub mod normalizer;

/// Orchestrates client, normalizer and store behind one read/write API.
pub mod repository;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
/// - [`LiveQuery`](store::LiveQuery): re-evaluated after every committed write
pub mod store;

/// The refresh job and the in-process scheduler that runs it.
pub mod worker;
