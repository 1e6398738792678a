//! Exchange status transitions.
//!
//! ```text
//! Pending ──accept──> Approved ──(date reached, both confirmed)──> Successful
//!    │                   │  └────(date + grace, not both confirmed)──> Failed
//!    ├──reject──> Rejected
//!    └──cancel──> Canceled <──cancel── Approved
//! ```
//!
//! Every command takes the current aggregate by reference and returns the next
//! one; nothing is changed when a command is refused. The date-based gate out of
//! `Approved` lives only in [`Exchange::resolved_status`].

use crate::{
    config::EngineConfig,
    error::{ExchangeError, Result},
    model::{Exchange, ExchangeStatus, Party},
    UserId,
};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPolicy {
    pub failure_grace: Duration,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self { failure_grace: Duration::days(7) }
    }
}

impl From<&EngineConfig> for CompletionPolicy {
    fn from(config: &EngineConfig) -> Self {
        let failure_grace = Duration::try_hours(config.failure_grace_hours).unwrap_or(Duration::MAX);
        Self { failure_grace }
    }
}

impl Exchange {
    pub fn resolved_status(&self, now: DateTime<Utc>, policy: &CompletionPolicy) -> ExchangeStatus {
        if self.status != ExchangeStatus::Approved || now < self.exchange_date {
            return self.status;
        }
        if self.both_confirmed() {
            ExchangeStatus::Successful
        } else if self.failure_deadline(policy).is_some_and(|deadline| now >= deadline) {
            ExchangeStatus::Failed
        } else {
            ExchangeStatus::Approved
        }
    }

    // None when the grace period runs past the representable range
    fn failure_deadline(&self, policy: &CompletionPolicy) -> Option<DateTime<Utc>> {
        self.exchange_date.checked_add_signed(policy.failure_grace)
    }

    pub fn resolved(&self, now: DateTime<Utc>, policy: &CompletionPolicy) -> Exchange {
        let mut next = self.clone();
        let status = self.resolved_status(now, policy);
        if status != self.status {
            tracing::info!(
                exchange_id = %self.id,
                from = self.status.as_str(),
                to = status.as_str(),
                "Exchange resolved"
            );
            next.status = status;
            next.updated_at = now;
        }
        next
    }

    pub(crate) fn ensure_not_terminal(&self, operation: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(ExchangeError::transition(format!(
                "cannot {} an exchange that is {}",
                operation,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_status(&self, expected: ExchangeStatus, operation: &str) -> Result<()> {
        self.ensure_not_terminal(operation)?;
        if self.status != expected {
            return Err(ExchangeError::transition(format!(
                "cannot {} while the exchange is {}",
                operation,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn submit_decision(
        &self,
        actor: UserId,
        accept: bool,
        now: DateTime<Utc>,
        policy: &CompletionPolicy,
    ) -> Result<Exchange> {
        let mut next = self.resolved(now, policy);
        next.ensure_status(ExchangeStatus::Pending, "decide on")?;

        if next.role_of(actor)? != Party::Seller {
            return Err(ExchangeError::Unauthorized(
                "only the receiving party may decide on an exchange".to_string(),
            ));
        }

        if accept && now >= next.exchange_date {
            return Err(ExchangeError::validation("Exchange date has already passed"));
        }

        next.status = if accept { ExchangeStatus::Approved } else { ExchangeStatus::Rejected };
        next.updated_at = now;

        tracing::info!(exchange_id = %next.id, accept, "Exchange decision submitted");
        Ok(next)
    }

    pub fn cancel(&self, actor: UserId, now: DateTime<Utc>, policy: &CompletionPolicy) -> Result<Exchange> {
        let mut next = self.resolved(now, policy);
        let party = next.role_of(actor)?;
        next.ensure_not_terminal("cancel")?;

        next.status = ExchangeStatus::Canceled;
        next.updated_at = now;

        tracing::info!(exchange_id = %next.id, ?party, "Exchange canceled");
        Ok(next)
    }
}
