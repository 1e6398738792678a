//! # Swapmeet - peer-to-peer item exchange engine
//!
//! Rules for trading physical items between two private users, optionally with
//! a cash adjustment, from proposal to a terminal outcome.
//!
//! ## Architecture
//!
//! - **Money**: integer parsing/formatting of user-entered prices
//! - **Proposal**: draft builder and submission into a `Pending` exchange
//! - **Logistics**: exchange method selection and geocoded locations
//! - **Negotiation**: bounded counter-offers after approval
//! - **Lifecycle**: status transitions and the date-based completion gate
//! - **Evidence**: dual-party proof of completion
//! - **Dispute**: critical reports against an exchange
//! - **Service**: async command/result orchestration over a versioned store
//!
//! The transition functions are pure and synchronous. Collaborators (catalog,
//! geocoding, image upload, identity, clock, persistence) sit behind the traits
//! in [`ports`] and [`store`].

pub mod config;
pub mod database;
pub mod dispute;
pub mod error;
pub mod evidence;
pub mod geocoding;
pub mod lifecycle;
pub mod logistics;
pub mod model;
pub mod money;
pub mod negotiation;
pub mod ports;
pub mod proposal;
pub mod service;
pub mod store;
pub mod telemetry;

pub use config::AppConfig;
pub use database::SqliteExchangeStore;
pub use error::{ExchangeError, Result};
pub use evidence::EvidenceView;
pub use lifecycle::CompletionPolicy;
pub use model::{
    CriticalReport, Exchange, ExchangeHistory, ExchangeMethod, ExchangeProposal, ExchangeStatus, Item, Party, Place,
};
pub use ports::{Clock, Geocoder, Identity, ImageUploader, ItemCatalog, ManualClock, StaticIdentity, SystemClock};
pub use service::ExchangeService;
pub use store::{ExchangeStore, InMemoryExchangeStore};

pub type ExchangeId = uuid::Uuid;
pub type UserId = uuid::Uuid;
pub type ItemId = uuid::Uuid;
