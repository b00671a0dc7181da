use tracing::{Level, event, instrument};

use super::{
    ExchangeContext, Party, await_state,
    request::{
        CREDENTIAL_OFFERS_PATH, ConnectionRef, CreatedRecord, CredentialDefinitionInput, CredentialOfferRequest,
        CredentialSchemaInput, DEFINITIONS_PATH, RegistryResource, SCHEMAS_PATH, issue_credential_path
    },
    submit
};
use crate::{
    domain::{
        constant::flow,
        error::IssuanceError,
        memory::keys,
        state::ProtocolState
    },
    port::{
        agent::{Method, status},
        identity::DidForm
    }
};

fn connection_id(ctx: &ExchangeContext) -> Result<String, IssuanceError> {
    let connection: ConnectionRef = ctx.issuer.actor.recall(&keys::connection_with(ctx.holder.name()))?;
    Ok(connection.connection_id)
}

/// Submit an offer and hand the thread id to both sides
async fn offer(ctx: &ExchangeContext, request: CredentialOfferRequest) -> Result<String, IssuanceError> {
    let body = serde_json::to_value(&request)?;
    let response = submit(&ctx.issuer, Method::Post, CREDENTIAL_OFFERS_PATH, Some(&body), status::CREATED).await?;
    let record: CreatedRecord = response.json()?;

    ctx.issuer.actor.remember(keys::THID, &record.thid)?;
    ctx.holder.actor.remember(keys::THID, &record.thid)?;

    event!(Level::INFO, event = flow::OFFER_SUBMITTED, issuer = %ctx.issuer.name(), holder = %ctx.holder.name(),
           thid = %record.thid, format = %request.credential_format);
    Ok(record.thid)
}

/// Offer a JWT credential signed with the issuer's DID in `did_form`
#[instrument(level = "debug", skip_all, fields(issuer = %ctx.issuer.name(), did_form = ?did_form))]
pub async fn offer_jwt_credential(ctx: &ExchangeContext, did_form: DidForm) -> Result<String, IssuanceError> {
    let did = ctx.issuer.actor.recall_text(did_form.memory_key())?;
    let request = CredentialOfferRequest::jwt(did, connection_id(ctx)?);
    offer(ctx, request).await
}

/// Offer an AnonCreds credential against the remembered credential definition
#[instrument(level = "debug", skip_all, fields(issuer = %ctx.issuer.name()))]
pub async fn offer_anoncreds_credential(ctx: &ExchangeContext) -> Result<String, IssuanceError> {
    let definition: RegistryResource = ctx.issuer.actor.recall(keys::ANONCREDS_CREDENTIAL_DEFINITION)?;
    let did = ctx.issuer.actor.recall_text(keys::SHORT_FORM_DID)?;
    let request = CredentialOfferRequest::anoncreds(definition.guid, did, connection_id(ctx)?);
    offer(ctx, request).await
}

#[instrument(level = "debug", skip_all, fields(issuer = %issuer.name()))]
pub async fn create_anoncreds_schema(issuer: &Party) -> Result<RegistryResource, IssuanceError> {
    let author = issuer.actor.recall_text(keys::SHORT_FORM_DID)?;
    let body = serde_json::to_value(CredentialSchemaInput::student(&author))?;

    let response = submit(issuer, Method::Post, SCHEMAS_PATH, Some(&body), status::CREATED).await?;
    let schema: RegistryResource = response.json()?;
    issuer.actor.remember(keys::ANONCREDS_SCHEMA, &response.body)?;

    event!(Level::DEBUG, event = flow::SCHEMA_CREATED, issuer = %issuer.name(), guid = %schema.guid);
    Ok(schema)
}

/// Register a credential definition for the remembered schema
///
/// The schema is referenced by its absolute location as the issuer's agent reaches it.
#[instrument(level = "debug", skip_all, fields(issuer = %issuer.name()))]
pub async fn create_credential_definition(issuer: &Party) -> Result<RegistryResource, IssuanceError> {
    let schema: RegistryResource = issuer.actor.recall(keys::ANONCREDS_SCHEMA)?;
    let author = issuer.actor.recall_text(keys::SHORT_FORM_DID)?;
    let schema_id = format!("{}/{}/schema", issuer.agent.resolve_internal(SCHEMAS_PATH), schema.guid);
    let body = serde_json::to_value(CredentialDefinitionInput::student(schema_id, &author))?;

    let response = submit(issuer, Method::Post, DEFINITIONS_PATH, Some(&body), status::CREATED).await?;
    let definition: RegistryResource = response.json()?;
    issuer.actor.remember(keys::ANONCREDS_CREDENTIAL_DEFINITION, &response.body)?;

    event!(Level::DEBUG, event = flow::DEFINITION_CREATED, issuer = %issuer.name(), guid = %definition.guid);
    Ok(definition)
}

/// Issue once the holder's request arrived, then wait for the issuer-side terminal state
#[instrument(level = "debug", skip_all, fields(issuer = %ctx.issuer.name()))]
pub async fn issue_credential(ctx: &ExchangeContext) -> Result<(), IssuanceError> {
    let request = await_state(ctx, ProtocolState::RequestReceived, "receive the credential request from").await?;

    event!(Level::DEBUG, event = flow::REQUEST_RECEIVED, issuer = %ctx.issuer.name(), thid = %request.thid,
           record_id = %request.record_id);

    submit(&ctx.issuer, Method::Post, &issue_credential_path(&request.record_id), None, status::OK).await?;

    let sent = await_state(ctx, ProtocolState::CredentialSent, "issue the credential to").await?;

    event!(Level::INFO, event = flow::CREDENTIAL_ISSUED, issuer = %ctx.issuer.name(), thid = %sent.thid,
           record_id = %sent.record_id);
    Ok(())
}
