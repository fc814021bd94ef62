// src/services/db.rs
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::models::{CacheEntry, Fundamentals, Holding, NewSnapshot, Snapshot, User};
use crate::BoxError;

/// Cached prices go stale after this many seconds.
pub const CACHE_TTL_SECONDS: i64 = 60;

pub struct DbStore {
    pub(crate) pool: SqlitePool,
}

impl DbStore {
    pub async fn new(database_url: &str) -> Result<Self, BoxError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Single-connection in-memory store; used by tests and local tooling.
    pub async fn in_memory() -> Result<Self, BoxError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS holding (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES user(id),
                symbol TEXT NOT NULL,
                purchase_price REAL NOT NULL,
                quantity REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_cache (
                symbol TEXT PRIMARY KEY,
                current_price REAL NOT NULL,
                pe_ratio REAL,
                market_cap TEXT,
                dividend_yield REAL,
                day_high REAL,
                day_low REAL,
                avg_volume TEXT,
                pe_ratio_ttm REAL,
                price_to_book REAL,
                book_value REAL,
                debt_to_equity REAL,
                revenue_ttm REAL,
                ebitda_ttm REAL,
                profit_margin REAL,
                operating_margin REAL,
                return_on_equity REAL,
                return_on_assets REAL,
                sector TEXT,
                industry TEXT,
                prev_close REAL,
                day_range TEXT,
                year_range TEXT,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_snapshot (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                holding_id INTEGER NOT NULL REFERENCES holding(id),
                current_price REAL NOT NULL,
                present_value REAL NOT NULL,
                gain_loss REAL NOT NULL,
                gain_loss_percent REAL,
                pe_ratio REAL,
                dividend_yield REAL,
                day_high REAL,
                day_low REAL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_snapshot_holding_ts \
             ON price_snapshot(holding_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ---- price cache ----

    /// Returns the cache entry for `symbol` if present and unexpired.
    /// An expired entry is deleted on the way out (lazy expiry; there is no
    /// background sweep, stale rows sit until the next read touches them).
    pub async fn get_cached(&self, symbol: &str) -> Result<Option<CacheEntry>, BoxError> {
        let entry = sqlx::query_as::<_, CacheEntry>(
            "SELECT * FROM price_cache WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        if Utc::now() > entry.expires_at {
            info!("cache expired, delete cache {}", symbol);
            sqlx::query("DELETE FROM price_cache WHERE symbol = ?")
                .bind(symbol)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Upserts the cache row for `symbol` and resets both timestamps.
    /// Extras fields that are `None` overwrite whatever was there before;
    /// callers must pass the full known set on every write.
    pub async fn set_cache(
        &self,
        symbol: &str,
        current_price: f64,
        pe_ratio: Option<f64>,
        market_cap: Option<&str>,
        extras: &Fundamentals,
    ) -> Result<(), BoxError> {
        info!("setting cache for: {}", symbol);

        let cached_at = Utc::now();
        let expires_at = cached_at + Duration::seconds(CACHE_TTL_SECONDS);

        sqlx::query(
            r#"
            INSERT INTO price_cache (
                symbol, current_price, pe_ratio, market_cap, dividend_yield,
                day_high, day_low, avg_volume, pe_ratio_ttm, price_to_book,
                book_value, debt_to_equity, revenue_ttm, ebitda_ttm,
                profit_margin, operating_margin, return_on_equity,
                return_on_assets, sector, industry, prev_close, day_range,
                year_range, cached_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (symbol) DO UPDATE SET
                current_price = excluded.current_price,
                pe_ratio = excluded.pe_ratio,
                market_cap = excluded.market_cap,
                dividend_yield = excluded.dividend_yield,
                day_high = excluded.day_high,
                day_low = excluded.day_low,
                avg_volume = excluded.avg_volume,
                pe_ratio_ttm = excluded.pe_ratio_ttm,
                price_to_book = excluded.price_to_book,
                book_value = excluded.book_value,
                debt_to_equity = excluded.debt_to_equity,
                revenue_ttm = excluded.revenue_ttm,
                ebitda_ttm = excluded.ebitda_ttm,
                profit_margin = excluded.profit_margin,
                operating_margin = excluded.operating_margin,
                return_on_equity = excluded.return_on_equity,
                return_on_assets = excluded.return_on_assets,
                sector = excluded.sector,
                industry = excluded.industry,
                prev_close = excluded.prev_close,
                day_range = excluded.day_range,
                year_range = excluded.year_range,
                cached_at = excluded.cached_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(symbol)
        .bind(current_price)
        .bind(pe_ratio)
        .bind(market_cap)
        .bind(extras.dividend_yield)
        .bind(extras.day_high)
        .bind(extras.day_low)
        .bind(extras.avg_volume.as_deref())
        .bind(extras.pe_ratio_ttm)
        .bind(extras.price_to_book)
        .bind(extras.book_value)
        .bind(extras.debt_to_equity)
        .bind(extras.revenue_ttm)
        .bind(extras.ebitda_ttm)
        .bind(extras.profit_margin)
        .bind(extras.operating_margin)
        .bind(extras.return_on_equity)
        .bind(extras.return_on_assets)
        .bind(extras.sector.as_deref())
        .bind(extras.industry.as_deref())
        .bind(extras.prev_close)
        .bind(extras.day_range.as_deref())
        .bind(extras.year_range.as_deref())
        .bind(cached_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Idempotent; returns whether a row existed.
    pub async fn delete_cache(&self, symbol: &str) -> Result<bool, BoxError> {
        let result = sqlx::query("DELETE FROM price_cache WHERE symbol = ?")
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Operational cache flush; returns the number of entries removed.
    pub async fn reset_cache(&self) -> Result<u64, BoxError> {
        warn!("clearing entire price cache");
        let result = sqlx::query("DELETE FROM price_cache")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- snapshots ----

    pub async fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<Snapshot, BoxError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO price_snapshot (
                holding_id, current_price, present_value, gain_loss,
                gain_loss_percent, pe_ratio, dividend_yield, day_high,
                day_low, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.holding_id)
        .bind(snapshot.current_price)
        .bind(snapshot.present_value)
        .bind(snapshot.gain_loss)
        .bind(snapshot.gain_loss_percent)
        .bind(snapshot.pe_ratio)
        .bind(snapshot.dividend_yield)
        .bind(snapshot.day_high)
        .bind(snapshot.day_low)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, Snapshot>("SELECT * FROM price_snapshot WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Batch write for the bulk refresh pass; all rows land in one
    /// transaction so a partial pass never leaves half a batch behind.
    pub async fn insert_snapshots(&self, snapshots: &[NewSnapshot]) -> Result<(), BoxError> {
        let mut tx = self.pool.begin().await?;
        let timestamp = Utc::now();

        for snapshot in snapshots {
            sqlx::query(
                r#"
                INSERT INTO price_snapshot (
                    holding_id, current_price, present_value, gain_loss,
                    gain_loss_percent, pe_ratio, dividend_yield, day_high,
                    day_low, timestamp
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(snapshot.holding_id)
            .bind(snapshot.current_price)
            .bind(snapshot.present_value)
            .bind(snapshot.gain_loss)
            .bind(snapshot.gain_loss_percent)
            .bind(snapshot.pe_ratio)
            .bind(snapshot.dividend_yield)
            .bind(snapshot.day_high)
            .bind(snapshot.day_low)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn latest_snapshot(&self, holding_id: i64) -> Result<Option<Snapshot>, BoxError> {
        let row = sqlx::query_as::<_, Snapshot>(
            "SELECT * FROM price_snapshot WHERE holding_id = ? \
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(holding_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn snapshots_between(
        &self,
        holding_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, BoxError> {
        let rows = sqlx::query_as::<_, Snapshot>(
            "SELECT * FROM price_snapshot \
             WHERE holding_id = ? AND timestamp >= ? AND timestamp <= ? \
             ORDER BY timestamp ASC LIMIT 1000",
        )
        .bind(holding_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes snapshots older than `cutoff`; returns how many went away.
    pub async fn delete_snapshots_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, BoxError> {
        let result = sqlx::query("DELETE FROM price_snapshot WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- holdings / users (owned by the CRUD layer, read-only here) ----

    pub async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, BoxError> {
        let rows = sqlx::query_as::<_, Holding>(
            "SELECT * FROM holding WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_holding(
        &self,
        user_id: i64,
        holding_id: i64,
    ) -> Result<Option<Holding>, BoxError> {
        let row = sqlx::query_as::<_, Holding>(
            "SELECT * FROM holding WHERE id = ? AND user_id = ?",
        )
        .bind(holding_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, BoxError> {
        let rows = sqlx::query_as::<_, User>("SELECT * FROM user ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn insert_user(&self, username: &str) -> Result<i64, BoxError> {
        let result = sqlx::query("INSERT INTO user (username) VALUES (?)")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_holding(
        &self,
        user_id: i64,
        symbol: &str,
        purchase_price: f64,
        quantity: f64,
    ) -> Result<i64, BoxError> {
        let result = sqlx::query(
            "INSERT INTO holding (user_id, symbol, purchase_price, quantity) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(symbol)
        .bind(purchase_price)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_fresh_entry() {
        let db = DbStore::in_memory().await.unwrap();
        db.set_cache("AAPL", 187.5, Some(29.1), Some("2.9T"), &Fundamentals::default())
            .await
            .unwrap();

        let entry = db.get_cached("AAPL").await.unwrap().expect("entry");
        assert_eq!(entry.current_price, 187.5);
        assert_eq!(entry.pe_ratio, Some(29.1));
        assert_eq!(entry.market_cap.as_deref(), Some("2.9T"));
        assert!(entry.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn expired_entry_is_deleted_on_read() {
        let db = DbStore::in_memory().await.unwrap();
        db.set_cache("TCS.NS", 3500.0, None, None, &Fundamentals::default())
            .await
            .unwrap();

        // Age the row past its TTL.
        let past = Utc::now() - Duration::seconds(CACHE_TTL_SECONDS + 5);
        sqlx::query("UPDATE price_cache SET expires_at = ? WHERE symbol = ?")
            .bind(past)
            .bind("TCS.NS")
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(db.get_cached("TCS.NS").await.unwrap().is_none());
        // Expiry is terminal: a second read is still a miss.
        assert!(db.get_cached("TCS.NS").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_unsupplied_extras_with_null() {
        let db = DbStore::in_memory().await.unwrap();
        let extras = Fundamentals {
            sector: Some("Tech".to_string()),
            dividend_yield: Some(1.2),
            ..Default::default()
        };
        db.set_cache("INFY", 1500.0, Some(24.0), None, &extras)
            .await
            .unwrap();

        // A later price-only write drops the previously known extras.
        db.set_cache("INFY", 1510.0, Some(24.1), None, &Fundamentals::default())
            .await
            .unwrap();

        let entry = db.get_cached("INFY").await.unwrap().unwrap();
        assert_eq!(entry.current_price, 1510.0);
        assert!(entry.sector.is_none());
        assert!(entry.dividend_yield.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_reset_counts() {
        let db = DbStore::in_memory().await.unwrap();
        db.set_cache("A", 1.0, None, None, &Fundamentals::default())
            .await
            .unwrap();
        db.set_cache("B", 2.0, None, None, &Fundamentals::default())
            .await
            .unwrap();

        assert!(db.delete_cache("A").await.unwrap());
        assert!(!db.delete_cache("A").await.unwrap());

        assert_eq!(db.reset_cache().await.unwrap(), 1);
        assert_eq!(db.reset_cache().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn snapshot_roundtrip_and_latest_ordering() {
        let db = DbStore::in_memory().await.unwrap();
        let user = db.insert_user("alice").await.unwrap();
        let holding = db.insert_holding(user, "AAPL", 100.0, 10.0).await.unwrap();

        for price in [110.0, 120.0] {
            db.insert_snapshot(&NewSnapshot {
                holding_id: holding,
                current_price: price,
                present_value: price * 10.0,
                gain_loss: price * 10.0 - 1000.0,
                gain_loss_percent: Some(10.0),
                pe_ratio: None,
                dividend_yield: None,
                day_high: None,
                day_low: None,
            })
            .await
            .unwrap();
        }

        let latest = db.latest_snapshot(holding).await.unwrap().unwrap();
        assert_eq!(latest.current_price, 120.0);

        let rows = db
            .snapshots_between(
                holding,
                Utc::now() - Duration::days(1),
                Utc::now() + Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp <= rows[1].timestamp);
    }

    #[tokio::test]
    async fn cleanup_deletes_only_old_rows() {
        let db = DbStore::in_memory().await.unwrap();
        let user = db.insert_user("bob").await.unwrap();
        let holding = db.insert_holding(user, "MSFT", 50.0, 4.0).await.unwrap();

        let snap = db
            .insert_snapshot(&NewSnapshot {
                holding_id: holding,
                current_price: 60.0,
                present_value: 240.0,
                gain_loss: 40.0,
                gain_loss_percent: Some(20.0),
                pe_ratio: None,
                dividend_yield: None,
                day_high: None,
                day_low: None,
            })
            .await
            .unwrap();

        // Backdate the row past the retention window.
        let old = Utc::now() - Duration::days(120);
        sqlx::query("UPDATE price_snapshot SET timestamp = ? WHERE id = ?")
            .bind(old)
            .bind(snap.id)
            .execute(&db.pool)
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::days(90);
        assert_eq!(db.delete_snapshots_before(cutoff).await.unwrap(), 1);
        assert_eq!(db.delete_snapshots_before(cutoff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn holdings_are_scoped_to_owner() {
        let db = DbStore::in_memory().await.unwrap();
        let alice = db.insert_user("alice").await.unwrap();
        let bob = db.insert_user("bob").await.unwrap();
        let holding = db.insert_holding(alice, "AAPL", 100.0, 1.0).await.unwrap();

        assert!(db.get_holding(alice, holding).await.unwrap().is_some());
        assert!(db.get_holding(bob, holding).await.unwrap().is_none());
        assert_eq!(db.list_holdings(alice).await.unwrap().len(), 1);
        assert_eq!(db.list_users().await.unwrap().len(), 2);
    }
}
