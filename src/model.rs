use crate::{error::{ExchangeError, Result}, ExchangeId, ItemId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOCATION_SEPARATOR: &str = "//";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Buyer,
    Seller,
}

impl Party {
    pub fn counterpart(self) -> Party {
        match self {
            Party::Buyer => Party::Seller,
            Party::Seller => Party::Buyer,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeMethod {
    #[default]
    NoMethod,
    PickUpInPerson,
    Delivery,
    MeetAtGivenLocation,
}

impl ExchangeMethod {
    pub fn requires_place(self) -> bool {
        matches!(self, ExchangeMethod::PickUpInPerson | ExchangeMethod::MeetAtGivenLocation)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Pending,
    Approved,
    Rejected,
    Successful,
    Failed,
    Canceled,
}

impl ExchangeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExchangeStatus::Pending | ExchangeStatus::Approved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Approved => "approved",
            ExchangeStatus::Rejected => "rejected",
            ExchangeStatus::Successful => "successful",
            ExchangeStatus::Failed => "failed",
            ExchangeStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    #[default]
    AwaitingEvidence,
    PartiallyConfirmed,
    Confirmed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    Reserved,
    Exchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub owner_id: UserId,
    pub name: String,
    pub price: i64,
    pub status: ItemStatus,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub place_id: String,
    pub formatted_address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.place_id, LOCATION_SEPARATOR, self.formatted_address)
    }
}

pub fn decode_location(location: &str) -> Option<(&str, &str)> {
    location
        .split_once(LOCATION_SEPARATOR)
        .filter(|(place_id, _)| !place_id.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeProposal {
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub seller_item: Item,
    pub buyer_item: Option<Item>,
    pub paid_by_user_id: Option<UserId>,
    pub exchange_date: Option<DateTime<Utc>>,
    pub method: ExchangeMethod,
    pub location: String,
    pub estimate_price: i64,
    pub additional_notes: String,
    pub created_at: DateTime<Utc>,
}

impl ExchangeProposal {
    pub fn seller_item_id(&self) -> ItemId {
        self.seller_item.id
    }

    pub fn buyer_item_id(&self) -> Option<ItemId> {
        self.buyer_item.as_ref().map(|item| item.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExchangeHistory {
    pub buyer_confirmation: bool,
    pub seller_confirmation: bool,
    pub buyer_image_url: Option<String>,
    pub seller_image_url: Option<String>,
    pub buyer_additional_notes: Option<String>,
    pub seller_additional_notes: Option<String>,
    pub status: HistoryStatus,
}

impl ExchangeHistory {
    pub fn confirmation(&self, party: Party) -> bool {
        match party {
            Party::Buyer => self.buyer_confirmation,
            Party::Seller => self.seller_confirmation,
        }
    }

    pub(crate) fn refresh_status(&mut self) {
        self.status = match (self.buyer_confirmation, self.seller_confirmation) {
            (true, true) => HistoryStatus::Confirmed,
            (false, false) => HistoryStatus::AwaitingEvidence,
            _ => HistoryStatus::PartiallyConfirmed,
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exchange {
    pub id: ExchangeId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub seller_item_id: ItemId,
    pub buyer_item_id: Option<ItemId>,
    pub paid_by_user_id: Option<UserId>,
    pub exchange_date: DateTime<Utc>,
    pub method: ExchangeMethod,
    pub location: String,
    pub estimate_price: i64,
    pub additional_notes: String,
    pub status: ExchangeStatus,
    pub final_price: i64,
    pub number_of_offer: u32,
    pub buyer_confirmation: bool,
    pub seller_confirmation: bool,
    pub history: ExchangeHistory,
    // bumped by the store on every save
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exchange {
    pub fn role_of(&self, user_id: UserId) -> Result<Party> {
        if user_id == self.seller_id {
            Ok(Party::Seller)
        } else if user_id == self.buyer_id {
            Ok(Party::Buyer)
        } else {
            Err(ExchangeError::Unauthorized(format!(
                "user {} is not a participant of exchange {}",
                user_id, self.id
            )))
        }
    }

    pub fn participant(&self, party: Party) -> UserId {
        match party {
            Party::Buyer => self.buyer_id,
            Party::Seller => self.seller_id,
        }
    }

    pub fn confirmation(&self, party: Party) -> bool {
        match party {
            Party::Buyer => self.buyer_confirmation,
            Party::Seller => self.seller_confirmation,
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.buyer_confirmation && self.seller_confirmation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeSnapshot {
    pub exchange_id: ExchangeId,
    pub status: ExchangeStatus,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub seller_item_id: ItemId,
    pub buyer_item_id: Option<ItemId>,
    pub final_price: i64,
    pub exchange_date: DateTime<Utc>,
}

impl From<&Exchange> for ExchangeSnapshot {
    fn from(exchange: &Exchange) -> Self {
        Self {
            exchange_id: exchange.id,
            status: exchange.status,
            seller_id: exchange.seller_id,
            buyer_id: exchange.buyer_id,
            seller_item_id: exchange.seller_item_id,
            buyer_item_id: exchange.buyer_item_id,
            final_price: exchange.final_price,
            exchange_date: exchange.exchange_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalReport {
    pub id: Uuid,
    pub exchange_id: ExchangeId,
    pub reporter_id: UserId,
    pub reported_user_id: UserId,
    pub reason: String,
    pub snapshot: ExchangeSnapshot,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_round_trip() {
        let place = Place {
            place_id: "ChIJ123".to_string(),
            formatted_address: "123 Main St, City".to_string(),
            lat: 10.0,
            lng: 106.0,
        };
        let encoded = place.encode();
        assert_eq!(encoded, "ChIJ123//123 Main St, City");
        assert_eq!(decode_location(&encoded), Some(("ChIJ123", "123 Main St, City")));
        assert_eq!(decode_location("123 Main St"), None);
        assert_eq!(decode_location("//nowhere"), None);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ExchangeStatus::Pending.is_terminal());
        assert!(!ExchangeStatus::Approved.is_terminal());
        for status in [
            ExchangeStatus::Rejected,
            ExchangeStatus::Successful,
            ExchangeStatus::Failed,
            ExchangeStatus::Canceled,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_history_status_derivation() {
        let mut history = ExchangeHistory::default();
        history.refresh_status();
        assert_eq!(history.status, HistoryStatus::AwaitingEvidence);

        history.seller_confirmation = true;
        history.refresh_status();
        assert_eq!(history.status, HistoryStatus::PartiallyConfirmed);

        history.buyer_confirmation = true;
        history.refresh_status();
        assert_eq!(history.status, HistoryStatus::Confirmed);
    }

    #[test]
    fn test_method_serializes_like_source_constants() {
        let json = serde_json::to_string(&ExchangeMethod::MeetAtGivenLocation).unwrap();
        assert_eq!(json, "\"MEET_AT_GIVEN_LOCATION\"");
        assert!(ExchangeMethod::PickUpInPerson.requires_place());
        assert!(!ExchangeMethod::Delivery.requires_place());
    }
}
