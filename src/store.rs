//! Persistence seam with optimistic concurrency.
//!
//! Writes for one exchange must be serialized. Every saved exchange carries the
//! version it was loaded at; a save is refused with `StaleVersion` when the
//! stored copy has moved on since then.

use crate::{
    error::{ExchangeError, Result},
    model::{CriticalReport, Exchange, ExchangeStatus},
    ExchangeId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[async_trait]
pub trait ExchangeStore: Send + Sync {
    async fn insert(&self, exchange: &Exchange) -> Result<()>;

    async fn load(&self, id: ExchangeId) -> Result<Exchange>;

    /// Persists `exchange` if the stored version still equals `exchange.version`.
    /// Returns the saved copy with its version bumped.
    async fn save(&self, exchange: &Exchange) -> Result<Exchange>;

    async fn list_by_status(&self, status: ExchangeStatus) -> Result<Vec<Exchange>>;

    async fn insert_report(&self, report: &CriticalReport) -> Result<()>;

    async fn reports_for(&self, exchange_id: ExchangeId) -> Result<Vec<CriticalReport>>;
}

#[derive(Default)]
pub struct InMemoryExchangeStore {
    exchanges: Mutex<HashMap<ExchangeId, Exchange>>,
    reports: Mutex<Vec<CriticalReport>>,
}

impl InMemoryExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExchangeStore for InMemoryExchangeStore {
    async fn insert(&self, exchange: &Exchange) -> Result<()> {
        let mut exchanges = self.exchanges.lock();
        if exchanges.contains_key(&exchange.id) {
            return Err(ExchangeError::validation(format!("Exchange {} already exists", exchange.id)));
        }
        exchanges.insert(exchange.id, exchange.clone());
        Ok(())
    }

    async fn load(&self, id: ExchangeId) -> Result<Exchange> {
        self.exchanges
            .lock()
            .get(&id)
            .cloned()
            .ok_or(ExchangeError::NotFound(id))
    }

    async fn save(&self, exchange: &Exchange) -> Result<Exchange> {
        let mut exchanges = self.exchanges.lock();
        let stored = exchanges
            .get_mut(&exchange.id)
            .ok_or(ExchangeError::NotFound(exchange.id))?;

        if stored.version != exchange.version {
            return Err(ExchangeError::StaleVersion {
                expected: exchange.version,
                found: stored.version,
            });
        }

        let mut saved = exchange.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn list_by_status(&self, status: ExchangeStatus) -> Result<Vec<Exchange>> {
        let mut matching: Vec<Exchange> = self
            .exchanges
            .lock()
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.exchange_date);
        Ok(matching)
    }

    async fn insert_report(&self, report: &CriticalReport) -> Result<()> {
        self.reports.lock().push(report.clone());
        Ok(())
    }

    async fn reports_for(&self, exchange_id: ExchangeId) -> Result<Vec<CriticalReport>> {
        Ok(self
            .reports
            .lock()
            .iter()
            .filter(|r| r.exchange_id == exchange_id)
            .cloned()
            .collect())
    }
}
