use crate::{
    error::{ExchangeError, Result},
    lifecycle::CompletionPolicy,
    model::{Exchange, ExchangeStatus},
    UserId,
};
use chrono::{DateTime, Utc};

impl Exchange {
    pub fn current_price(&self) -> i64 {
        match self.status {
            ExchangeStatus::Pending => self.estimate_price,
            _ => self.final_price,
        }
    }

    pub fn price_delta(&self) -> i64 {
        self.final_price - self.estimate_price
    }

    pub fn offers_remaining(&self) -> u32 {
        self.number_of_offer
    }

    pub fn propose_counter_offer(
        &self,
        actor: UserId,
        negotiated_price: i64,
        now: DateTime<Utc>,
        policy: &CompletionPolicy,
    ) -> Result<Exchange> {
        let mut next = self.resolved(now, policy);
        next.ensure_status(ExchangeStatus::Approved, "negotiate")?;
        let party = next.role_of(actor)?;

        if next.number_of_offer == 0 {
            return Err(ExchangeError::NegotiationExhausted);
        }
        if negotiated_price < 0 {
            return Err(ExchangeError::InvalidAmount(format!(
                "negotiated price {} is negative",
                negotiated_price
            )));
        }

        let previous = next.final_price;
        next.final_price = negotiated_price;
        next.number_of_offer -= 1;
        next.updated_at = now;

        tracing::info!(
            exchange_id = %next.id,
            ?party,
            previous,
            negotiated_price,
            remaining = next.number_of_offer,
            "Counter-offer accepted"
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::{approved_exchange, pending_exchange};
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn test_counter_offer_updates_price_and_budget() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let approved = approved_exchange(now, Duration::days(1));

        let next = approved.propose_counter_offer(approved.buyer_id, 250, now, &policy).unwrap();
        assert_eq!(next.final_price, 250);
        assert_eq!(next.number_of_offer, approved.number_of_offer - 1);
        assert_eq!(next.status, ExchangeStatus::Approved);
        assert_eq!(next.price_delta(), -50);
    }

    #[test]
    fn test_budget_of_three_then_exhausted() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let mut exchange = approved_exchange(now, Duration::days(1));
        assert_eq!(exchange.offers_remaining(), 3);

        for (i, price) in [280, 260, 240].into_iter().enumerate() {
            let actor = if i % 2 == 0 { exchange.buyer_id } else { exchange.seller_id };
            exchange = exchange.propose_counter_offer(actor, price, now, &policy).unwrap();
        }
        assert_eq!(exchange.offers_remaining(), 0);

        let fourth = exchange.propose_counter_offer(exchange.buyer_id, 100, now, &policy);
        assert!(matches!(fourth, Err(ExchangeError::NegotiationExhausted)));
        assert_eq!(exchange.final_price, 240);
    }

    #[test]
    fn test_exhausted_wins_over_invalid_amount() {
        let now = Utc::now();
        let mut exchange = approved_exchange(now, Duration::days(1));
        exchange.number_of_offer = 0;

        let result = exchange.propose_counter_offer(exchange.buyer_id, -1, now, &CompletionPolicy::default());
        assert!(matches!(result, Err(ExchangeError::NegotiationExhausted)));
    }

    #[test]
    fn test_negative_price_rejected() {
        let now = Utc::now();
        let exchange = approved_exchange(now, Duration::days(1));

        let result = exchange.propose_counter_offer(exchange.seller_id, -10, now, &CompletionPolicy::default());
        assert!(matches!(result, Err(ExchangeError::InvalidAmount(_))));
    }

    #[test]
    fn test_only_after_approval() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let pending = pending_exchange(now, Duration::days(1));
        assert_eq!(pending.current_price(), pending.estimate_price);

        let result = pending.propose_counter_offer(pending.buyer_id, 100, now, &policy);
        assert!(matches!(result, Err(ExchangeError::InvalidStateTransition(_))));

        let canceled = pending.cancel(pending.buyer_id, now, &policy).unwrap();
        let result = canceled.propose_counter_offer(canceled.buyer_id, 100, now, &policy);
        assert!(matches!(result, Err(ExchangeError::InvalidStateTransition(_))));
    }

    #[test]
    fn test_outsider_cannot_negotiate() {
        let now = Utc::now();
        let exchange = approved_exchange(now, Duration::days(1));

        let result = exchange.propose_counter_offer(Uuid::new_v4(), 100, now, &CompletionPolicy::default());
        assert!(matches!(result, Err(ExchangeError::Unauthorized(_))));
    }

    #[test]
    fn test_every_terminal_state_refuses() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let pending = pending_exchange(now, Duration::days(1));
        let rejected = pending.submit_decision(pending.seller_id, false, now, &policy).unwrap();

        let mut successful = approved_exchange(now, Duration::days(1));
        successful.status = ExchangeStatus::Successful;
        let mut failed = approved_exchange(now, Duration::days(1));
        failed.status = ExchangeStatus::Failed;

        for exchange in [rejected, successful, failed] {
            let result = exchange.propose_counter_offer(exchange.buyer_id, 100, now, &policy);
            assert!(matches!(result, Err(ExchangeError::InvalidStateTransition(_))));
        }
    }

    #[test]
    fn test_gate_resolved_exchange_refuses() {
        let now = Utc::now();
        let policy = CompletionPolicy::default();
        let approved = approved_exchange(now, Duration::days(1));

        let mut confirmed = approved.clone();
        confirmed.buyer_confirmation = true;
        confirmed.seller_confirmation = true;
        let after_date = now + Duration::days(2);
        assert_eq!(confirmed.status, ExchangeStatus::Approved);
        let result = confirmed.propose_counter_offer(confirmed.seller_id, 100, after_date, &policy);
        assert!(matches!(result, Err(ExchangeError::InvalidStateTransition(_))));

        let past_grace = now + Duration::days(1) + policy.failure_grace;
        assert_eq!(approved.resolved_status(past_grace, &policy), ExchangeStatus::Failed);
        let result = approved.propose_counter_offer(approved.buyer_id, 100, past_grace, &policy);
        assert!(matches!(result, Err(ExchangeError::InvalidStateTransition(_))));
        assert_eq!(approved.final_price, 300);
    }
}
