use crate::{
    error::{ExchangeError, Result},
    lifecycle::CompletionPolicy,
    model::{Exchange, ExchangeStatus, Party},
    ports::ImageUploader,
    UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EvidenceView {
    Available { image_url: Option<String>, notes: Option<String> },
    NotYetAvailable,
}

impl Exchange {
    pub fn evidence_open(&self, now: DateTime<Utc>, policy: &CompletionPolicy) -> bool {
        self.resolved_status(now, policy) == ExchangeStatus::Approved && now >= self.exchange_date
    }

    fn ensure_evidence_window(&self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(ExchangeStatus::Approved, "confirm")?;
        if now < self.exchange_date {
            return Err(ExchangeError::transition(format!(
                "evidence opens at {}",
                self.exchange_date.to_rfc3339()
            )));
        }
        Ok(())
    }

    pub fn submit_evidence(
        &self,
        actor: UserId,
        image_url: impl Into<String>,
        notes: impl Into<String>,
        now: DateTime<Utc>,
        policy: &CompletionPolicy,
    ) -> Result<Exchange> {
        let image_url = image_url.into();
        if image_url.trim().is_empty() {
            return Err(ExchangeError::validation("Evidence image is required"));
        }

        let mut next = self.resolved(now, policy);
        let party = next.role_of(actor)?;
        next.ensure_evidence_window(now)?;

        let notes = Some(notes.into());
        let history = &mut next.history;
        match party {
            Party::Buyer => {
                history.buyer_image_url = Some(image_url);
                history.buyer_additional_notes = notes;
                history.buyer_confirmation = true;
                next.buyer_confirmation = true;
            }
            Party::Seller => {
                history.seller_image_url = Some(image_url);
                history.seller_additional_notes = notes;
                history.seller_confirmation = true;
                next.seller_confirmation = true;
            }
        }
        next.history.refresh_status();
        next.updated_at = now;

        tracing::info!(
            exchange_id = %next.id,
            ?party,
            history_status = ?next.history.status,
            "Evidence submitted"
        );
        Ok(next.resolved(now, policy))
    }

    pub fn confirm_completion(&self, actor: UserId, now: DateTime<Utc>, policy: &CompletionPolicy) -> Result<Exchange> {
        let mut next = self.resolved(now, policy);
        let party = next.role_of(actor)?;
        next.ensure_evidence_window(now)?;

        match party {
            Party::Buyer => next.buyer_confirmation = true,
            Party::Seller => next.seller_confirmation = true,
        }
        next.updated_at = now;

        tracing::info!(exchange_id = %next.id, ?party, "Completion confirmed");
        Ok(next.resolved(now, policy))
    }

    pub fn counterpart_evidence(&self, actor: UserId) -> Result<EvidenceView> {
        let other = self.role_of(actor)?.counterpart();
        if !self.history.confirmation(other) {
            return Ok(EvidenceView::NotYetAvailable);
        }

        let history = &self.history;
        let (image_url, notes) = match other {
            Party::Buyer => (&history.buyer_image_url, &history.buyer_additional_notes),
            Party::Seller => (&history.seller_image_url, &history.seller_additional_notes),
        };
        Ok(EvidenceView::Available { image_url: image_url.clone(), notes: notes.clone() })
    }
}

// eligibility is checked before the upload
pub async fn upload_and_submit<U>(
    uploader: &U,
    exchange: &Exchange,
    actor: UserId,
    local_image: &str,
    notes: &str,
    now: DateTime<Utc>,
    policy: &CompletionPolicy,
) -> Result<Exchange>
where
    U: ImageUploader + ?Sized,
{
    let current = exchange.resolved(now, policy);
    current.role_of(actor)?;
    current.ensure_evidence_window(now)?;

    let url = uploader.upload(local_image).await.map_err(|e| match e {
        ExchangeError::UploadFailed(msg) => ExchangeError::UploadFailed(msg),
        other => ExchangeError::UploadFailed(other.to_string()),
    })?;

    exchange.submit_evidence(actor, url, notes, now, policy)
}
