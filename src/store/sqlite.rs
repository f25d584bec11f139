use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, Row, Transaction};
use rusqlite_migration::{Migrations, M};
use tokio::sync::watch;
use tracing::debug;

use crate::app::{RadarError, Result};
use crate::domain::Asteroid;
use crate::store::Store;

const SELECT_COLUMNS: &str = "SELECT id, codename, close_approach_date, absolute_magnitude,
        estimated_diameter_km, relative_velocity_km_s, distance_from_earth_au,
        is_potentially_hazardous
     FROM asteroids";

const ORDER_BY: &str = "ORDER BY close_approach_date ASC, id ASC";

const UPSERT: &str = "INSERT INTO asteroids (id, codename, close_approach_date, absolute_magnitude,
        estimated_diameter_km, relative_velocity_km_s, distance_from_earth_au,
        is_potentially_hazardous)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(id) DO UPDATE SET
        codename = excluded.codename,
        close_approach_date = excluded.close_approach_date,
        absolute_magnitude = excluded.absolute_magnitude,
        estimated_diameter_km = excluded.estimated_diameter_km,
        relative_velocity_km_s = excluded.relative_velocity_km_s,
        distance_from_earth_au = excluded.distance_from_earth_au,
        is_potentially_hazardous = excluded.is_potentially_hazardous";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: watch::Sender<u64>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (changes, _) = watch::channel(0);
        let store = Self {
            conn: Mutex::new(conn),
            changes,
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| RadarError::Other(format!("Migration failed: {e}")))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RadarError::Other(format!("Store lock poisoned: {e}")))
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    fn upsert_in(tx: &Transaction<'_>, asteroids: &[Asteroid]) -> Result<usize> {
        let mut stmt = tx.prepare_cached(UPSERT)?;
        let mut count = 0;

        for asteroid in asteroids {
            count += stmt.execute(params![
                asteroid.id,
                asteroid.codename,
                asteroid.close_approach_date,
                asteroid.absolute_magnitude,
                asteroid.estimated_diameter_km,
                asteroid.relative_velocity_km_s,
                asteroid.distance_from_earth_au,
                asteroid.is_potentially_hazardous,
            ])?;
        }

        Ok(count)
    }

    fn row_to_asteroid(row: &Row<'_>) -> rusqlite::Result<Asteroid> {
        Ok(Asteroid {
            id: row.get(0)?,
            codename: row.get(1)?,
            close_approach_date: row.get(2)?,
            absolute_magnitude: row.get(3)?,
            estimated_diameter_km: row.get(4)?,
            relative_velocity_km_s: row.get(5)?,
            distance_from_earth_au: row.get(6)?,
            is_potentially_hazardous: row.get::<_, i32>(7)? != 0,
        })
    }

    fn select(&self, filter: &str, args: impl rusqlite::Params) -> Result<Vec<Asteroid>> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} {filter} {ORDER_BY}");
        let mut stmt = conn.prepare_cached(&sql)?;

        let asteroids = stmt
            .query_map(args, Self::row_to_asteroid)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(asteroids)
    }
}

impl Store for SqliteStore {
    fn upsert_all(&self, asteroids: &[Asteroid]) -> Result<usize> {
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;
        let count = Self::upsert_in(&tx, asteroids)?;
        tx.commit()?;
        drop(conn);

        debug!("Upserted {} asteroids", count);
        self.notify();
        Ok(count)
    }

    fn replace_all(&self, asteroids: &[Asteroid]) -> Result<usize> {
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM asteroids", [])?;
        let count = Self::upsert_in(&tx, asteroids)?;
        tx.commit()?;
        drop(conn);

        debug!("Replaced {} asteroids with {}", removed, count);
        self.notify();
        Ok(count)
    }

    fn delete_all(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM asteroids", [])?;
        drop(conn);

        debug!("Deleted {} asteroids", removed);
        self.notify();
        Ok(removed)
    }

    fn query_all(&self) -> Result<Vec<Asteroid>> {
        self.select("", [])
    }

    fn query_by_date(&self, date: &str) -> Result<Vec<Asteroid>> {
        self.select("WHERE close_approach_date = ?1", params![date])
    }

    fn query_range(&self, start: &str, end: &str) -> Result<Vec<Asteroid>> {
        self.select(
            "WHERE close_approach_date BETWEEN ?1 AND ?2",
            params![start, end],
        )
    }

    fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM asteroids", [], |row| row.get(0))?;
        Ok(count)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
