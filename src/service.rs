use crate::{
    config::EngineConfig,
    error::{ExchangeError, Result},
    evidence::{upload_and_submit, EvidenceView},
    lifecycle::CompletionPolicy,
    logistics,
    model::{CriticalReport, Exchange, ExchangeMethod, ExchangeProposal, ExchangeStatus, ItemStatus},
    money::parse_amount,
    ports::{Clock, Geocoder, Identity, ImageUploader, ItemCatalog},
    store::ExchangeStore,
    ExchangeId, ItemId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct ExchangeService {
    store: Arc<dyn ExchangeStore>,
    catalog: Arc<dyn ItemCatalog>,
    geocoder: Arc<dyn Geocoder>,
    uploader: Arc<dyn ImageUploader>,
    clock: Arc<dyn Clock>,
    policy: CompletionPolicy,
    max_counter_offers: u32,
    minor_unit_digits: u32,
}

impl ExchangeService {
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn ExchangeStore>,
        catalog: Arc<dyn ItemCatalog>,
        geocoder: Arc<dyn Geocoder>,
        uploader: Arc<dyn ImageUploader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            geocoder,
            uploader,
            clock,
            policy: CompletionPolicy::from(config),
            max_counter_offers: config.max_counter_offers,
            minor_unit_digits: config.minor_unit_digits,
        }
    }

    pub fn policy(&self) -> &CompletionPolicy {
        &self.policy
    }

    // a failed pick-up geocode keeps the draft with no location
    pub async fn draft(
        &self,
        identity: &dyn Identity,
        seller_item_id: ItemId,
        buyer_item_id: Option<ItemId>,
        method: ExchangeMethod,
        additional_notes: &str,
    ) -> Result<ExchangeProposal> {
        let seller_item = self.catalog.get_item(seller_item_id).await?;
        if seller_item.status != ItemStatus::Available {
            return Err(ExchangeError::validation("Requested item is no longer available"));
        }
        let buyer_item = match buyer_item_id {
            Some(id) => Some(self.catalog.get_item(id).await?),
            None => None,
        };

        let mut proposal = ExchangeProposal::new(
            identity.current_user(),
            seller_item,
            buyer_item,
            additional_notes,
            self.clock.now(),
        )?
        .seed_estimate();

        if let Err(e) = self.choose_method(&mut proposal, method).await {
            match e {
                ExchangeError::PlaceNotFound(_) | ExchangeError::Network(_) => {
                    tracing::warn!(error = %e, "Draft kept without a pick-up location");
                }
                other => return Err(other),
            }
        }

        Ok(proposal)
    }

    pub async fn choose_method(&self, proposal: &mut ExchangeProposal, method: ExchangeMethod) -> Result<()> {
        match method {
            ExchangeMethod::PickUpInPerson => logistics::select_pick_up(self.geocoder.as_ref(), proposal).await,
            _ => logistics::select_method(proposal, method).map(|_| ()),
        }
    }

    pub async fn choose_meeting_place(&self, proposal: &mut ExchangeProposal, query: &str) -> Result<()> {
        logistics::select_meeting_place(self.geocoder.as_ref(), proposal, query).await
    }

    pub async fn submit(&self, identity: &dyn Identity, proposal: ExchangeProposal) -> Result<Exchange> {
        if identity.current_user() != proposal.buyer_id {
            return Err(ExchangeError::Unauthorized("only the proposer may submit a proposal".to_string()));
        }

        let seller_item = self.catalog.get_item(proposal.seller_item_id()).await?;
        if seller_item.owner_id != proposal.seller_id {
            return Err(ExchangeError::validation("Requested item changed owner"));
        }
        if let Some(id) = proposal.buyer_item_id() {
            if self.catalog.get_item(id).await?.owner_id != proposal.buyer_id {
                return Err(ExchangeError::validation("Counter-item is not owned by the proposing buyer"));
            }
        }

        let exchange = proposal.submit(self.clock.now(), self.max_counter_offers)?;
        self.store.insert(&exchange).await?;
        Ok(exchange)
    }

    pub async fn exchange(&self, id: ExchangeId) -> Result<Exchange> {
        let exchange = self.store.load(id).await?;
        Ok(exchange.resolved(self.clock.now(), &self.policy))
    }

    pub async fn status(&self, id: ExchangeId) -> Result<ExchangeStatus> {
        Ok(self.exchange(id).await?.status)
    }

    pub async fn decide(&self, identity: &dyn Identity, id: ExchangeId, accept: bool) -> Result<Exchange> {
        let actor = identity.current_user();
        self.apply(id, None, "decide", |exchange, now| {
            exchange.submit_decision(actor, accept, now, &self.policy)
        })
        .await
    }

    pub async fn counter_offer(
        &self,
        identity: &dyn Identity,
        id: ExchangeId,
        negotiated_price: i64,
        seen_version: Option<u64>,
    ) -> Result<Exchange> {
        let actor = identity.current_user();
        self.apply(id, seen_version, "counter_offer", |exchange, now| {
            exchange.propose_counter_offer(actor, negotiated_price, now, &self.policy)
        })
        .await
    }

    pub async fn counter_offer_text(
        &self,
        identity: &dyn Identity,
        id: ExchangeId,
        price: &str,
        seen_version: Option<u64>,
    ) -> Result<Exchange> {
        let amount = parse_amount(price, self.minor_unit_digits)?;
        self.counter_offer(identity, id, amount, seen_version).await
    }

    pub async fn submit_evidence(
        &self,
        identity: &dyn Identity,
        id: ExchangeId,
        local_image: &str,
        notes: &str,
    ) -> Result<Exchange> {
        let actor = identity.current_user();
        let current = self.store.load(id).await?;
        let now = self.clock.now();

        let next = upload_and_submit(self.uploader.as_ref(), &current, actor, local_image, notes, now, &self.policy)
            .await
            .inspect_err(|e| tracing::warn!(exchange_id = %id, error = %e, "Evidence refused"))?;

        self.store.save(&next).await
    }

    pub async fn confirm_completion(&self, identity: &dyn Identity, id: ExchangeId) -> Result<Exchange> {
        let actor = identity.current_user();
        self.apply(id, None, "confirm_completion", |exchange, now| {
            exchange.confirm_completion(actor, now, &self.policy)
        })
        .await
    }

    pub async fn counterpart_evidence(&self, identity: &dyn Identity, id: ExchangeId) -> Result<EvidenceView> {
        self.store.load(id).await?.counterpart_evidence(identity.current_user())
    }

    pub async fn cancel(&self, identity: &dyn Identity, id: ExchangeId) -> Result<Exchange> {
        let actor = identity.current_user();
        self.apply(id, None, "cancel", |exchange, now| exchange.cancel(actor, now, &self.policy))
            .await
    }

    pub async fn escalate(&self, identity: &dyn Identity, id: ExchangeId, reason: &str) -> Result<CriticalReport> {
        let exchange = self.store.load(id).await?;
        let report = exchange.escalate(identity.current_user(), reason, self.clock.now(), &self.policy)?;
        self.store.insert_report(&report).await?;
        Ok(report)
    }

    pub async fn reports(&self, id: ExchangeId) -> Result<Vec<CriticalReport>> {
        self.store.reports_for(id).await
    }

    pub async fn sweep(&self) -> Result<usize> {
        sweep_approved(self.store.as_ref(), self.clock.now(), &self.policy).await
    }

    async fn apply<F>(&self, id: ExchangeId, seen_version: Option<u64>, command: &str, transition: F) -> Result<Exchange>
    where
        F: FnOnce(&Exchange, DateTime<Utc>) -> Result<Exchange>,
    {
        let current = self.store.load(id).await?;
        if let Some(seen) = seen_version {
            if seen != current.version {
                return Err(ExchangeError::StaleVersion { expected: seen, found: current.version });
            }
        }

        let next = transition(&current, self.clock.now()).inspect_err(|e| {
            tracing::warn!(exchange_id = %id, command, error = %e, "Command refused");
        })?;

        self.store.save(&next).await
    }
}

// exchanges written concurrently are skipped until the next sweep
pub async fn sweep_approved(store: &dyn ExchangeStore, now: DateTime<Utc>, policy: &CompletionPolicy) -> Result<usize> {
    let mut resolved = 0;

    for exchange in store.list_by_status(ExchangeStatus::Approved).await? {
        let next = exchange.resolved(now, policy);
        if next.status == exchange.status {
            continue;
        }
        match store.save(&next).await {
            Ok(_) => resolved += 1,
            Err(ExchangeError::StaleVersion { .. }) => {
                tracing::debug!(exchange_id = %exchange.id, "Exchange changed during sweep, skipping");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(resolved, "Sweep finished");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, Place};
    use crate::ports::{ManualClock, MockGeocoder, MockImageUploader, MockItemCatalog, StaticIdentity};
    use crate::store::InMemoryExchangeStore;
    use chrono::Duration;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct Fixture {
        service: ExchangeService,
        clock: Arc<ManualClock>,
        seller: StaticIdentity,
        buyer: StaticIdentity,
        seller_item: Item,
        buyer_item: Item,
    }

    fn item(owner_id: Uuid, price: i64) -> Item {
        Item {
            id: Uuid::new_v4(),
            owner_id,
            name: "Guitar".to_string(),
            price,
            status: ItemStatus::Available,
            address: Some("123 Main St".to_string()),
        }
    }

    fn fixture(geocoder: MockGeocoder, uploader: MockImageUploader) -> Fixture {
        let seller = StaticIdentity(Uuid::new_v4());
        let buyer = StaticIdentity(Uuid::new_v4());
        let seller_item = item(seller.0, 1000);
        let buyer_item = item(buyer.0, 400);

        let items: HashMap<ItemId, Item> =
            [(seller_item.id, seller_item.clone()), (buyer_item.id, buyer_item.clone())].into_iter().collect();
        let mut catalog = MockItemCatalog::new();
        catalog.expect_get_item().returning(move |id| {
            items.get(&id).cloned().ok_or_else(|| ExchangeError::validation("unknown item"))
        });

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = ExchangeService::new(
            &EngineConfig::default(),
            Arc::new(InMemoryExchangeStore::new()),
            Arc::new(catalog),
            Arc::new(geocoder),
            Arc::new(uploader),
            clock.clone(),
        );

        Fixture { service, clock, seller, buyer, seller_item, buyer_item }
    }

    async fn submitted(f: &Fixture) -> Exchange {
        let proposal = f
            .service
            .draft(&f.buyer, f.seller_item.id, Some(f.buyer_item.id), ExchangeMethod::Delivery, "")
            .await
            .unwrap()
            .set_schedule(f.clock.now() + Duration::days(1))
            .unwrap();
        f.service.submit(&f.buyer, proposal).await.unwrap()
    }

    #[tokio::test]
    async fn test_draft_with_pick_up() {
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_resolve_place().returning(|_| {
            Ok(Place {
                place_id: "p1".to_string(),
                formatted_address: "123 Main St, City".to_string(),
                lat: 0.0,
                lng: 0.0,
            })
        });
        let f = fixture(geocoder, MockImageUploader::new());

        let proposal = f
            .service
            .draft(&f.buyer, f.seller_item.id, Some(f.buyer_item.id), ExchangeMethod::PickUpInPerson, "")
            .await
            .unwrap();
        assert_eq!(proposal.location, "p1//123 Main St, City");
        assert_eq!(proposal.estimate_price, 600);
        assert_eq!(proposal.paid_by_user_id, Some(f.buyer.0));
    }

    #[tokio::test]
    async fn test_draft_survives_geocode_failure() {
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_resolve_place()
            .returning(|a| Err(ExchangeError::PlaceNotFound(a.to_string())));
        let f = fixture(geocoder, MockImageUploader::new());

        let proposal = f
            .service
            .draft(&f.buyer, f.seller_item.id, None, ExchangeMethod::PickUpInPerson, "notes")
            .await
            .unwrap();
        assert!(proposal.location.is_empty());
        assert_eq!(proposal.additional_notes, "notes");
    }

    #[tokio::test]
    async fn test_submit_only_by_proposer() {
        let f = fixture(MockGeocoder::new(), MockImageUploader::new());
        let proposal = f
            .service
            .draft(&f.buyer, f.seller_item.id, None, ExchangeMethod::Delivery, "")
            .await
            .unwrap()
            .set_schedule(f.clock.now() + Duration::days(1))
            .unwrap();

        let result = f.service.submit(&f.seller, proposal).await;
        assert!(matches!(result, Err(ExchangeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_full_flow_to_success() {
        let mut uploader = MockImageUploader::new();
        uploader.expect_upload().returning(|p| Ok(format!("https://img{}", p)));
        let f = fixture(MockGeocoder::new(), uploader);

        let exchange = submitted(&f).await;
        let approved = f.service.decide(&f.seller, exchange.id, true).await.unwrap();
        assert_eq!(approved.version, 1);

        let countered = f.service.counter_offer_text(&f.buyer, exchange.id, "550", Some(1)).await.unwrap();
        assert_eq!(countered.final_price, 550);
        assert_eq!(countered.number_of_offer, 2);

        f.clock.advance(Duration::days(2));
        f.service.submit_evidence(&f.buyer, exchange.id, "/b.jpg", "ok").await.unwrap();
        assert_eq!(
            f.service.counterpart_evidence(&f.seller, exchange.id).await.unwrap(),
            EvidenceView::Available { image_url: Some("https://img/b.jpg".to_string()), notes: Some("ok".to_string()) }
        );
        assert_eq!(
            f.service.counterpart_evidence(&f.buyer, exchange.id).await.unwrap(),
            EvidenceView::NotYetAvailable
        );

        f.service.submit_evidence(&f.seller, exchange.id, "/s.jpg", "ok").await.unwrap();
        assert_eq!(f.service.status(exchange.id).await.unwrap(), ExchangeStatus::Successful);
    }

    #[tokio::test]
    async fn test_stale_counter_offer_rejected() {
        let f = fixture(MockGeocoder::new(), MockImageUploader::new());
        let exchange = submitted(&f).await;
        f.service.decide(&f.seller, exchange.id, true).await.unwrap();

        f.service.counter_offer(&f.seller, exchange.id, 500, Some(1)).await.unwrap();
        let stale = f.service.counter_offer(&f.buyer, exchange.id, 450, Some(1)).await;
        assert!(matches!(stale, Err(ExchangeError::StaleVersion { expected: 1, found: 2 })));

        let current = f.service.exchange(exchange.id).await.unwrap();
        assert_eq!(current.final_price, 500);
        assert_eq!(current.number_of_offer, 2);
    }

    #[tokio::test]
    async fn test_sweep_fails_unconfirmed() {
        let f = fixture(MockGeocoder::new(), MockImageUploader::new());
        let exchange = submitted(&f).await;
        f.service.decide(&f.seller, exchange.id, true).await.unwrap();
        f.clock.advance(Duration::days(2));
        f.service.confirm_completion(&f.buyer, exchange.id).await.unwrap();

        assert_eq!(f.service.sweep().await.unwrap(), 0);

        f.clock.advance(Duration::days(7));
        assert_eq!(f.service.sweep().await.unwrap(), 1);
        assert_eq!(f.service.exchange(exchange.id).await.unwrap().status, ExchangeStatus::Failed);

        let report = f.service.escalate(&f.buyer, exchange.id, "seller never showed").await.unwrap();
        assert_eq!(report.snapshot.status, ExchangeStatus::Failed);
        assert_eq!(f.service.reports(exchange.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_then_decide() {
        let f = fixture(MockGeocoder::new(), MockImageUploader::new());
        let exchange = submitted(&f).await;

        f.service.cancel(&f.buyer, exchange.id).await.unwrap();
        let result = f.service.decide(&f.seller, exchange.id, true).await;
        assert!(matches!(result, Err(ExchangeError::InvalidStateTransition(_))));
        assert_eq!(f.service.status(exchange.id).await.unwrap(), ExchangeStatus::Canceled);
    }
}
