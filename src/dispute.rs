use crate::{
    error::{ExchangeError, Result},
    lifecycle::CompletionPolicy,
    model::{CriticalReport, Exchange, ExchangeSnapshot, ExchangeStatus},
    UserId,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl Exchange {
    pub fn disputable(status: ExchangeStatus) -> bool {
        matches!(
            status,
            ExchangeStatus::Approved | ExchangeStatus::Successful | ExchangeStatus::Failed
        )
    }

    pub fn escalate(
        &self,
        reporter_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
        policy: &CompletionPolicy,
    ) -> Result<CriticalReport> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ExchangeError::validation("A reason is required to escalate"));
        }

        let party = self.role_of(reporter_id)?;
        let current = self.resolved(now, policy);
        if !Self::disputable(current.status) {
            return Err(ExchangeError::transition(format!(
                "cannot escalate an exchange that is {}",
                current.status.as_str()
            )));
        }

        let report = CriticalReport {
            id: Uuid::new_v4(),
            exchange_id: current.id,
            reporter_id,
            reported_user_id: current.participant(party.counterpart()),
            reason: reason.to_string(),
            snapshot: ExchangeSnapshot::from(&current),
            created_at: now,
        };

        tracing::warn!(
            exchange_id = %current.id,
            report_id = %report.id,
            ?party,
            status = current.status.as_str(),
            "Exchange escalated"
        );
        Ok(report)
    }
}
