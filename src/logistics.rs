use crate::{
    error::{ExchangeError, Result},
    model::{decode_location, ExchangeMethod, ExchangeProposal, Place},
    ports::Geocoder,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGeocode {
    pub address: String,
}

pub fn select_method(proposal: &mut ExchangeProposal, method: ExchangeMethod) -> Result<Option<PendingGeocode>> {
    if method == proposal.method {
        proposal.method = ExchangeMethod::NoMethod;
        proposal.location.clear();
        tracing::debug!(?method, "Exchange method toggled off");
        return Ok(None);
    }

    match method {
        ExchangeMethod::PickUpInPerson => {
            let address = proposal
                .seller_item
                .address
                .clone()
                .filter(|a| !a.trim().is_empty())
                .ok_or_else(|| ExchangeError::validation("Seller has no registered pick-up address"))?;

            proposal.method = method;
            proposal.location = address.clone();
            Ok(Some(PendingGeocode { address }))
        }
        ExchangeMethod::NoMethod | ExchangeMethod::Delivery | ExchangeMethod::MeetAtGivenLocation => {
            proposal.method = method;
            proposal.location.clear();
            Ok(None)
        }
    }
}

pub fn select_location(proposal: &mut ExchangeProposal, place: &Place) -> Result<()> {
    if !proposal.method.requires_place() {
        return Err(ExchangeError::validation("Current exchange method does not take a location"));
    }
    proposal.location = place.encode();
    Ok(())
}

// false when the ticket is stale (method or location changed meanwhile).
pub fn reconcile(proposal: &mut ExchangeProposal, ticket: &PendingGeocode, place: &Place) -> bool {
    if !is_current(proposal, ticket) {
        tracing::debug!(address = %ticket.address, "Ignoring stale geocode result");
        return false;
    }
    proposal.location = place.encode();
    true
}

pub fn abandon(proposal: &mut ExchangeProposal, ticket: &PendingGeocode) {
    if is_current(proposal, ticket) {
        proposal.location.clear();
    }
}

fn is_current(proposal: &ExchangeProposal, ticket: &PendingGeocode) -> bool {
    proposal.method == ExchangeMethod::PickUpInPerson && proposal.location == ticket.address
}

// If pick-up is already selected but its location never resolved, the geocode
// is retried instead of toggling the method off.
pub async fn select_pick_up<G>(geocoder: &G, proposal: &mut ExchangeProposal) -> Result<()>
where
    G: Geocoder + ?Sized,
{
    let unresolved = proposal.method == ExchangeMethod::PickUpInPerson && decode_location(&proposal.location).is_none();
    if unresolved {
        proposal.method = ExchangeMethod::NoMethod;
    }

    let Some(ticket) = select_method(proposal, ExchangeMethod::PickUpInPerson)? else {
        return Ok(());
    };

    match geocoder.resolve_place(&ticket.address).await {
        Ok(place) => {
            reconcile(proposal, &ticket, &place);
            Ok(())
        }
        Err(e) => {
            tracing::warn!(address = %ticket.address, error = %e, "Pick-up address could not be geocoded");
            abandon(proposal, &ticket);
            Err(e)
        }
    }
}

pub async fn select_meeting_place<G>(geocoder: &G, proposal: &mut ExchangeProposal, query: &str) -> Result<()>
where
    G: Geocoder + ?Sized,
{
    if proposal.method != ExchangeMethod::MeetAtGivenLocation {
        select_method(proposal, ExchangeMethod::MeetAtGivenLocation)?;
    }

    match geocoder.resolve_place(query).await {
        Ok(place) => select_location(proposal, &place),
        Err(e) => {
            proposal.location.clear();
            Err(e)
        }
    }
}
