use crate::{
    config::DatabaseConfig,
    error::{ExchangeError, Result},
    model::{CriticalReport, Exchange, ExchangeStatus},
    store::ExchangeStore,
    ExchangeId,
};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::str::FromStr;

// JSON body plus the columns needed for lookups and the version check
#[derive(Clone)]
pub struct SqliteExchangeStore {
    pool: SqlitePool,
}

impl SqliteExchangeStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, None).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(&config.url, config.max_connections).await
    }

    async fn connect(database_url: &str, max_connections: Option<u32>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS exchanges (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                buyer_id TEXT NOT NULL,
                exchange_date DATETIME NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS critical_reports (
                id TEXT PRIMARY KEY,
                exchange_id TEXT NOT NULL,
                reporter_id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (exchange_id) REFERENCES exchanges(id)
            );

            CREATE INDEX IF NOT EXISTS idx_exchanges_status ON exchanges(status);
            CREATE INDEX IF NOT EXISTS idx_exchanges_seller ON exchanges(seller_id);
            CREATE INDEX IF NOT EXISTS idx_exchanges_buyer ON exchanges(buyer_id);
            CREATE INDEX IF NOT EXISTS idx_reports_exchange ON critical_reports(exchange_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stored_version(&self, id: ExchangeId) -> Result<Option<u64>> {
        let row = sqlx::query("SELECT version FROM exchanges WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<i64, _>("version").map(|v| v as u64))
            .transpose()
            .map_err(Into::into)
    }
}

fn decode_exchange(row: &sqlx::sqlite::SqliteRow) -> Result<Exchange> {
    let body: String = row.try_get("body")?;
    let version: i64 = row.try_get("version")?;
    let mut exchange: Exchange = serde_json::from_str(&body)?;
    exchange.version = version as u64;
    Ok(exchange)
}

#[async_trait]
impl ExchangeStore for SqliteExchangeStore {
    async fn insert(&self, exchange: &Exchange) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO exchanges (id, status, seller_id, buyer_id, exchange_date, version, body, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(exchange.id.to_string())
        .bind(exchange.status.as_str())
        .bind(exchange.seller_id.to_string())
        .bind(exchange.buyer_id.to_string())
        .bind(exchange.exchange_date)
        .bind(exchange.version as i64)
        .bind(serde_json::to_string(exchange)?)
        .bind(exchange.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, id: ExchangeId) -> Result<Exchange> {
        let row = sqlx::query("SELECT body, version FROM exchanges WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => decode_exchange(&row),
            None => Err(ExchangeError::NotFound(id)),
        }
    }

    async fn save(&self, exchange: &Exchange) -> Result<Exchange> {
        let mut saved = exchange.clone();
        saved.version = exchange.version + 1;

        let result = sqlx::query(
            r#"
            UPDATE exchanges
            SET status = ?, version = ?, body = ?, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(saved.status.as_str())
        .bind(saved.version as i64)
        .bind(serde_json::to_string(&saved)?)
        .bind(saved.updated_at)
        .bind(exchange.id.to_string())
        .bind(exchange.version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.stored_version(exchange.id).await? {
                Some(found) => Err(ExchangeError::StaleVersion { expected: exchange.version, found }),
                None => Err(ExchangeError::NotFound(exchange.id)),
            };
        }

        Ok(saved)
    }

    async fn list_by_status(&self, status: ExchangeStatus) -> Result<Vec<Exchange>> {
        let rows = sqlx::query(
            "SELECT body, version FROM exchanges WHERE status = ? ORDER BY exchange_date ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_exchange).collect()
    }

    async fn insert_report(&self, report: &CriticalReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO critical_reports (id, exchange_id, reporter_id, body, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.exchange_id.to_string())
        .bind(report.reporter_id.to_string())
        .bind(serde_json::to_string(report)?)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reports_for(&self, exchange_id: ExchangeId) -> Result<Vec<CriticalReport>> {
        let rows = sqlx::query(
            "SELECT body FROM critical_reports WHERE exchange_id = ? ORDER BY created_at ASC",
        )
        .bind(exchange_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<CriticalReport> {
                let body: String = row.try_get("body")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{tests::{approved_exchange, pending_exchange}, CompletionPolicy};
    use chrono::{Duration, Utc};
    use tempfile::NamedTempFile;

    async fn temp_store() -> (NamedTempFile, SqliteExchangeStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_url = format!("sqlite://{}", temp_file.path().to_string_lossy());
        let store = SqliteExchangeStore::new(&db_url).await.unwrap();
        (temp_file, store)
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let (_file, store) = temp_store().await;
        let exchange = pending_exchange(Utc::now(), Duration::days(1));
        store.insert(&exchange).await.unwrap();

        let loaded = store.load(exchange.id).await.unwrap();
        assert_eq!(loaded, exchange);
    }

    #[tokio::test]
    async fn test_versioned_save() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let (_file, store) = temp_store().await;
        let exchange = pending_exchange(now, Duration::days(1));
        store.insert(&exchange).await.unwrap();

        let approved = exchange.submit_decision(exchange.seller_id, true, now, &policy).unwrap();
        let saved = store.save(&approved).await.unwrap();
        assert_eq!(saved.version, 1);

        let reloaded = store.load(exchange.id).await.unwrap();
        assert_eq!(reloaded.status, ExchangeStatus::Approved);
        assert_eq!(reloaded.version, 1);

        // writing from the original read is stale now
        let stale = store.save(&exchange.cancel(exchange.buyer_id, now, &policy).unwrap()).await;
        assert!(matches!(stale, Err(ExchangeError::StaleVersion { expected: 0, found: 1 })));
    }

    #[tokio::test]
    async fn test_save_unknown_exchange() {
        let (_file, store) = temp_store().await;
        let exchange = pending_exchange(Utc::now(), Duration::days(1));
        assert!(matches!(store.save(&exchange).await, Err(ExchangeError::NotFound(_))));
        assert!(matches!(store.load(exchange.id).await, Err(ExchangeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_reports() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let (_file, store) = temp_store().await;

        let approved = approved_exchange(now, Duration::days(1));
        let pending = pending_exchange(now, Duration::days(1));
        store.insert(&approved).await.unwrap();
        store.insert(&pending).await.unwrap();

        let listed = store.list_by_status(ExchangeStatus::Approved).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, approved.id);

        let report = approved.escalate(approved.buyer_id, "broken on arrival", now, &policy).unwrap();
        store.insert_report(&report).await.unwrap();

        let reports = store.reports_for(approved.id).await.unwrap();
        assert_eq!(reports, vec![report]);
        assert!(store.reports_for(pending.id).await.unwrap().is_empty());
    }
}
