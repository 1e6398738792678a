use crate::{error::Result, model::{Item, Place}, ItemId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn get_item(&self, id: ItemId) -> Result<Item>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve_place(&self, address_or_place_id: &str) -> Result<Place>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, local_image: &str) -> Result<String>;
}

pub trait Identity: Send + Sync {
    fn current_user(&self) -> UserId;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticIdentity(pub UserId);

impl Identity for StaticIdentity {
    fn current_user(&self) -> UserId {
        self.0
    }
}
