use tracing::{Level, event, instrument};

use super::{
    ExchangeContext, await_state,
    request::{AcceptOfferRequest, accept_offer_path},
    submit
};
use crate::{
    domain::{
        constant::flow,
        error::IssuanceError,
        event::{CredentialFormat, EventPayload, IssuedCredential, ProtocolEvent},
        memory::keys,
        state::ProtocolState
    },
    port::agent::{Method, status}
};

/// Wait for the offer and remember the holder-side record id
#[instrument(level = "debug", skip_all, fields(holder = %ctx.holder.name()))]
pub async fn receive_offer(ctx: &ExchangeContext) -> Result<ProtocolEvent, IssuanceError> {
    let offer = await_state(ctx, ProtocolState::OfferReceived, "receive the credential offer from").await?;

    ctx.holder.actor.remember(keys::RECORD_ID, &offer.record_id)?;

    event!(Level::INFO, event = flow::OFFER_RECEIVED, holder = %ctx.holder.name(), thid = %offer.thid,
           record_id = %offer.record_id);
    Ok(offer)
}

/// Accept the remembered offer
///
/// JWT acceptance names the holder's long-form DID as subject; AnonCreds
/// acceptance sends an empty body.
#[instrument(level = "debug", skip_all, fields(holder = %ctx.holder.name(), format = %format))]
pub async fn accept_offer(ctx: &ExchangeContext, format: CredentialFormat) -> Result<(), IssuanceError> {
    let record_id = ctx.holder.actor.recall_text(keys::RECORD_ID)?;
    let request = match format {
        CredentialFormat::Jwt => {
            AcceptOfferRequest { subject_id: Some(ctx.holder.actor.recall_text(keys::LONG_FORM_DID)?) }
        }
        CredentialFormat::AnonCreds => AcceptOfferRequest::default()
    };
    let body = serde_json::to_value(&request)?;

    submit(&ctx.holder, Method::Post, &accept_offer_path(&record_id), Some(&body), status::OK).await?;

    event!(Level::INFO, event = flow::OFFER_ACCEPTED, holder = %ctx.holder.name(), record_id = %record_id);
    Ok(())
}

/// Wait for the credential and remember it as `issuedCredential`
#[instrument(level = "debug", skip_all, fields(holder = %ctx.holder.name()))]
pub async fn receive_credential(ctx: &ExchangeContext) -> Result<IssuedCredential, IssuanceError> {
    let received = await_state(ctx, ProtocolState::CredentialReceived, "receive the credential from").await?;

    let EventPayload::CredentialReceived(credential) = received.payload else {
        return Err(IssuanceError::Ingestion(format!("event {} carries no credential", received.metadata.event_id)));
    };

    ctx.holder.actor.remember(keys::ISSUED_CREDENTIAL, &credential)?;

    event!(Level::INFO, event = flow::CREDENTIAL_RECEIVED, holder = %ctx.holder.name(), thid = %credential.thid,
           record_id = %credential.record_id);
    Ok(credential)
}
