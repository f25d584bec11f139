//! Push-based live queries over a [`Store`].
//!
//! A [`LiveQuery`] holds a change receiver from the store. Every committed
//! write bumps the store's version counter, which wakes the query and makes
//! it re-run against the store. Readers never see a half-applied batch since
//! notification happens only after commit.

use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::app::Result;
use crate::domain::Asteroid;
use crate::store::Store;

/// The query shapes the cache supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsteroidQuery {
    All,
    ByDate(String),
    /// Inclusive on both ends.
    Range { start: String, end: String },
}

impl AsteroidQuery {
    pub fn run<S: Store + ?Sized>(&self, store: &S) -> Result<Vec<Asteroid>> {
        match self {
            AsteroidQuery::All => store.query_all(),
            AsteroidQuery::ByDate(date) => store.query_by_date(date),
            AsteroidQuery::Range { start, end } => store.query_range(start, end),
        }
    }
}

pub struct LiveQuery<S> {
    store: Arc<S>,
    query: AsteroidQuery,
    changes: watch::Receiver<u64>,
}

impl<S: Store + Send + Sync + 'static> LiveQuery<S> {
    pub fn new(store: Arc<S>, query: AsteroidQuery) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            query,
            changes,
        }
    }

    pub fn query(&self) -> &AsteroidQuery {
        &self.query
    }

    /// Evaluate the query now. Changes committed before this call will not
    /// be re-delivered by [`LiveQuery::next`].
    pub async fn current(&mut self) -> Result<Vec<Asteroid>> {
        // Mark before loading so a write racing the load is still delivered.
        self.changes.borrow_and_update();
        self.load().await
    }

    /// Wait for the next committed write and re-evaluate the query.
    ///
    /// The query holds its store, so this waits for as long as no write
    /// lands. `None` only comes from a store that closes its change channel.
    pub async fn next(&mut self) -> Option<Result<Vec<Asteroid>>> {
        self.changes.changed().await.ok()?;
        self.changes.borrow_and_update();
        Some(self.load().await)
    }

    /// The current result followed by one result per committed write.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Asteroid>>> {
        stream::unfold((self, true), |(mut live, first)| async move {
            let item = if first {
                Some(live.current().await)
            } else {
                live.next().await
            };
            item.map(|result| (result, (live, false)))
        })
    }

    async fn load(&self) -> Result<Vec<Asteroid>> {
        let store = self.store.clone();
        let query = self.query.clone();
        tokio::task::spawn_blocking(move || query.run(store.as_ref())).await?
    }
}
