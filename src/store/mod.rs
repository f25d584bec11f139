pub mod live;
pub mod sqlite;

use tokio::sync::watch;

use crate::app::Result;
use crate::domain::Asteroid;

pub use live::{AsteroidQuery, LiveQuery};
pub use sqlite::SqliteStore;

/// Durable asteroid cache.
///
/// Every query returns rows ordered by close-approach date ascending.
/// Writes are all-or-nothing and bump the change counter handed out by
/// [`Store::subscribe`] only once committed.
pub trait Store {
    // Write operations
    fn upsert_all(&self, asteroids: &[Asteroid]) -> Result<usize>;
    fn replace_all(&self, asteroids: &[Asteroid]) -> Result<usize>;
    fn delete_all(&self) -> Result<usize>;

    // Read operations
    fn query_all(&self) -> Result<Vec<Asteroid>>;
    fn query_by_date(&self, date: &str) -> Result<Vec<Asteroid>>;
    fn query_range(&self, start: &str, end: &str) -> Result<Vec<Asteroid>>;
    fn count(&self) -> Result<i64>;

    // Change notification
    fn subscribe(&self) -> watch::Receiver<u64>;
}
