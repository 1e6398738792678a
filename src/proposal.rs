use crate::{
    error::{ExchangeError, Result},
    model::{Exchange, ExchangeHistory, ExchangeMethod, ExchangeProposal, ExchangeStatus, Item},
    money::price_difference,
    UserId,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl ExchangeProposal {
    pub fn new(
        buyer_id: UserId,
        seller_item: Item,
        buyer_item: Option<Item>,
        additional_notes: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if seller_item.owner_id == buyer_id {
            return Err(ExchangeError::validation("Cannot propose an exchange for your own item"));
        }
        ensure_listed_price(&seller_item)?;

        let proposal = Self {
            seller_id: seller_item.owner_id,
            buyer_id,
            seller_item,
            buyer_item: None,
            paid_by_user_id: None,
            exchange_date: None,
            method: ExchangeMethod::NoMethod,
            location: String::new(),
            estimate_price: 0,
            additional_notes: additional_notes.into(),
            created_at: now,
        };

        match buyer_item {
            Some(item) => proposal.attach_counter_item(item),
            None => Ok(proposal),
        }
    }

    pub fn attach_counter_item(mut self, item: Item) -> Result<Self> {
        if item.owner_id == self.seller_item.owner_id {
            return Err(ExchangeError::validation(
                "Counter-item belongs to the owner of the requested item",
            ));
        }
        if item.id == self.seller_item.id {
            return Err(ExchangeError::validation("An item cannot be exchanged for itself"));
        }
        ensure_listed_price(&item)?;
        self.buyer_item = Some(item);
        Ok(self)
    }

    pub fn clear_counter_item(mut self) -> Self {
        self.buyer_item = None;
        self
    }

    pub fn seed_estimate(mut self) -> Self {
        let seller_price = self.seller_item.price;
        let buyer_price = self.buyer_item.as_ref().map_or(0, |item| item.price);

        self.estimate_price = price_difference(seller_price, buyer_price);
        self.paid_by_user_id = if seller_price > buyer_price {
            Some(self.buyer_id)
        } else if buyer_price > seller_price {
            Some(self.seller_id)
        } else {
            None
        };
        self
    }

    pub fn set_estimate_price(mut self, amount: i64) -> Result<Self> {
        if amount < 0 {
            return Err(ExchangeError::InvalidAmount(format!("estimate price {} is negative", amount)));
        }
        self.estimate_price = amount;
        Ok(self)
    }

    pub fn set_paid_by(mut self, user_id: Option<UserId>) -> Result<Self> {
        if let Some(id) = user_id {
            if id != self.buyer_id && id != self.seller_id {
                return Err(ExchangeError::validation("Payer must be one of the two parties"));
            }
        }
        self.paid_by_user_id = user_id;
        Ok(self)
    }

    pub fn set_schedule(mut self, exchange_date: DateTime<Utc>) -> Result<Self> {
        if exchange_date <= self.created_at {
            return Err(ExchangeError::validation("Exchange date must be after the proposal was created"));
        }
        self.exchange_date = Some(exchange_date);
        Ok(self)
    }

    pub fn set_notes(mut self, notes: impl Into<String>) -> Self {
        self.additional_notes = notes.into();
        self
    }

    pub fn submit(self, now: DateTime<Utc>, max_counter_offers: u32) -> Result<Exchange> {
        self.validate(now)?;

        let exchange_date = self
            .exchange_date
            .ok_or_else(|| ExchangeError::validation("Exchange date is required"))?;

        let exchange = Exchange {
            id: Uuid::new_v4(),
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
            seller_item_id: self.seller_item.id,
            buyer_item_id: self.buyer_item.as_ref().map(|item| item.id),
            paid_by_user_id: self.paid_by_user_id,
            exchange_date,
            method: self.method,
            location: self.location,
            estimate_price: self.estimate_price,
            additional_notes: self.additional_notes,
            status: ExchangeStatus::Pending,
            final_price: self.estimate_price,
            number_of_offer: max_counter_offers,
            buyer_confirmation: false,
            seller_confirmation: false,
            history: ExchangeHistory::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        tracing::info!(
            exchange_id = %exchange.id,
            seller_id = %exchange.seller_id,
            buyer_id = %exchange.buyer_id,
            "Exchange proposed"
        );

        Ok(exchange)
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.seller_id == self.buyer_id {
            return Err(ExchangeError::validation("Seller and buyer must be different users"));
        }
        if self.seller_item.owner_id != self.seller_id {
            return Err(ExchangeError::validation("Requested item is not owned by the seller"));
        }
        if let Some(item) = &self.buyer_item {
            if item.owner_id != self.buyer_id {
                return Err(ExchangeError::validation("Counter-item is not owned by the proposing buyer"));
            }
        }
        match self.exchange_date {
            None => return Err(ExchangeError::validation("Exchange date is required")),
            Some(date) if date <= self.created_at || date <= now => {
                return Err(ExchangeError::validation("Exchange date must be in the future"));
            }
            Some(_) => {}
        }
        if self.method.requires_place() && self.location.is_empty() {
            return Err(ExchangeError::validation("Selected exchange method requires a location"));
        }
        if self.estimate_price < 0 {
            return Err(ExchangeError::InvalidAmount(format!(
                "estimate price {} is negative",
                self.estimate_price
            )));
        }
        Ok(())
    }
}

fn ensure_listed_price(item: &Item) -> Result<()> {
    if item.price < 0 {
        return Err(ExchangeError::InvalidAmount(format!("item {} has negative price {}", item.id, item.price)));
    }
    Ok(())
}
