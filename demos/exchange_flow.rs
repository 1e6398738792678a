//! Walks one exchange from proposal to completion against in-memory collaborators.
//!
//! Run with `cargo run --example exchange_flow`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use swapmeet::{
    config::LoggingConfig,
    error::{ExchangeError, Result},
    model::ItemStatus,
    money::format_amount,
    telemetry::init_tracing,
    AppConfig, Clock, ExchangeMethod, ExchangeService, Geocoder, ImageUploader, InMemoryExchangeStore, Item,
    ItemCatalog, ManualClock, Place, StaticIdentity,
};
use uuid::Uuid;

struct Shelf(HashMap<Uuid, Item>);

#[async_trait]
impl ItemCatalog for Shelf {
    async fn get_item(&self, id: Uuid) -> Result<Item> {
        self.0
            .get(&id)
            .cloned()
            .ok_or_else(|| ExchangeError::Validation(format!("no item {}", id)))
    }
}

struct Gazetteer;

#[async_trait]
impl Geocoder for Gazetteer {
    async fn resolve_place(&self, address: &str) -> Result<Place> {
        Ok(Place {
            place_id: format!("demo-{}", address.len()),
            formatted_address: address.to_string(),
            lat: 0.0,
            lng: 0.0,
        })
    }
}

struct LocalUploads;

#[async_trait]
impl ImageUploader for LocalUploads {
    async fn upload(&self, local_image: &str) -> Result<String> {
        Ok(format!("file://{}", local_image))
    }
}

fn listing(owner_id: Uuid, name: &str, price: i64) -> Item {
    Item {
        id: Uuid::new_v4(),
        owner_id,
        name: name.to_string(),
        price,
        status: ItemStatus::Available,
        address: Some("42 Harbour Road".to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&LoggingConfig::default());

    let config = AppConfig::default();
    let seller = StaticIdentity(Uuid::new_v4());
    let buyer = StaticIdentity(Uuid::new_v4());
    let bike = listing(seller.0, "Road bike", 250_000);
    let guitar = listing(buyer.0, "Acoustic guitar", 180_000);

    let shelf = Shelf([(bike.id, bike.clone()), (guitar.id, guitar.clone())].into_iter().collect());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = ExchangeService::new(
        &config.engine,
        Arc::new(InMemoryExchangeStore::new()),
        Arc::new(shelf),
        Arc::new(Gazetteer),
        Arc::new(LocalUploads),
        clock.clone(),
    );

    let proposal = service
        .draft(&buyer, bike.id, Some(guitar.id), ExchangeMethod::PickUpInPerson, "Can bring a pump")
        .await?
        .set_schedule(clock.now() + Duration::days(3))?;
    println!("Pick-up at {}", proposal.location);

    let exchange = service.submit(&buyer, proposal).await?;
    service.decide(&seller, exchange.id, true).await?;
    let digits = config.engine.minor_unit_digits;
    println!("Approved, buyer tops up {}", format_amount(exchange.final_price, digits));

    let countered = service.counter_offer_text(&buyer, exchange.id, "60,000", None).await?;
    println!(
        "Counter-offer {} ({} left)",
        format_amount(countered.final_price, digits),
        countered.number_of_offer
    );

    clock.advance(Duration::days(3));
    service.submit_evidence(&seller, exchange.id, "handover-seller.jpg", "Bike handed over").await?;
    service.submit_evidence(&buyer, exchange.id, "handover-buyer.jpg", "Guitar handed over").await?;

    println!("Final status: {}", service.status(exchange.id).await?.as_str());
    Ok(())
}
