//! Flow orchestrator
//!
//! Drives an issuer and a holder through offer, accept, issue and receive. Every
//! hand-off between the two sides goes through a poll on the receiving side's
//! ledger. Submissions are checked against the expected status and never retried;
//! only polls retry, and only against asynchronous delivery.

mod holder;
mod issuer;
pub mod request;

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event, instrument};

pub use self::{
    holder::{accept_offer, receive_credential, receive_offer},
    issuer::{
        create_anoncreds_schema, create_credential_definition, issue_credential, offer_anoncreds_credential,
        offer_jwt_credential
    }
};
use crate::{
    domain::{
        constant::{agent, flow},
        error::IssuanceError,
        event::{CredentialFormat, IssuedCredential, ProtocolEvent},
        memory::{Actor, keys},
        poll::{PollOptions, poll_for},
        state::{ProtocolState, Role}
    },
    port::{
        agent::{AgentClient, AgentResponse, Method},
        identity::{DidForm, IdentityResolver},
        ledger::Ledger
    }
};

/// An actor together with the agent acting on its behalf
#[derive(Clone)]
pub struct Party {
    pub actor: Arc<Actor>,
    pub agent: Arc<dyn AgentClient>
}

impl Party {
    pub fn new(actor: Arc<Actor>, agent: Arc<dyn AgentClient>) -> Self {
        Self { actor, agent }
    }

    pub fn name(&self) -> &str {
        self.actor.name()
    }
}

/// Everything one exchange needs, passed explicitly to each step
#[derive(Clone)]
pub struct ExchangeContext {
    pub issuer: Party,
    pub holder: Party,
    pub ledger: Arc<dyn Ledger>,
    pub poll:   PollOptions,
    pub cancel: CancellationToken
}

impl ExchangeContext {
    pub fn new(issuer: Party, holder: Party, ledger: Arc<dyn Ledger>) -> Self {
        Self { issuer, holder, ledger, poll: PollOptions::default(), cancel: CancellationToken::new() }
    }

    pub fn with_poll(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn party(&self, role: Role) -> &Party {
        match role {
            Role::Issuer => &self.issuer,
            Role::Holder => &self.holder
        }
    }
}

/// Submit a request and insist on `expected`
pub(crate) async fn submit(
    party: &Party,
    method: Method,
    path: &str,
    body: Option<&Value>,
    expected: u16
) -> Result<AgentResponse, IssuanceError> {
    let response = party.agent.submit(method, path, body).await?;

    if response.status != expected {
        event!(Level::WARN, event = agent::UNEXPECTED_STATUS, actor = %party.name(), method = %method, path = %path,
               expected = expected, actual = response.status);
        return Err(IssuanceError::Submission {
            method: method.to_string(),
            path: path.to_string(),
            expected,
            actual: response.status,
            body: response.body.to_string()
        });
    }

    Ok(response)
}

/// Wait until the freshest event of the remembered thread is exactly in `target`
///
/// The ledger watched is the one of the side that observes `target`. Only the
/// most recent event of the thread is inspected, so a later state already recorded
/// keeps the wait from succeeding. The thread id is recalled on every check, so a
/// missing `thid` fails the wait at once with a precondition error.
pub(crate) async fn await_state(
    ctx: &ExchangeContext,
    target: ProtocolState,
    action: &str
) -> Result<ProtocolEvent, IssuanceError> {
    let role = target.observer();
    let party = ctx.party(role);
    let counterpart = ctx.party(role.counterpart());
    let message = format!(
        "{} {} was unable to {} {} {}: protocol state did not reach {}",
        role,
        party.name(),
        action,
        role.counterpart(),
        counterpart.name(),
        target
    );

    let check = || -> Result<Option<ProtocolEvent>, IssuanceError> {
        let thid = party.actor.recall_text(keys::THID)?;
        Ok(ctx.ledger.last_for(party.name(), &thid).filter(|event| event.state().matches(target)))
    };

    poll_for(check, ctx.poll, &message, &ctx.cancel.child_token()).await
}

/// Store both forms of the party's DID in its memory
#[instrument(level = "debug", skip_all, fields(actor = %party.name()))]
pub async fn resolve_identifiers(party: &Party, resolver: &dyn IdentityResolver) -> Result<(), IssuanceError> {
    let short = resolver.short_form_did(party.name()).await?;
    let long = resolver.long_form_did(party.name()).await?;

    party.actor.remember(keys::SHORT_FORM_DID, &short)?;
    party.actor.remember(keys::LONG_FORM_DID, &long)?;

    event!(Level::DEBUG, event = flow::IDENTIFIERS_RESOLVED, actor = %party.name(), short_form_did = %short);
    Ok(())
}

/// Run a whole exchange for `format`
///
/// Expects identifiers resolved for both parties and the issuer's connection with
/// the holder remembered. `did_form` only applies to JWT offers; AnonCreds offers
/// always use the short form.
#[instrument(level = "info", skip_all, fields(issuer = %ctx.issuer.name(), holder = %ctx.holder.name(), format = %format))]
pub async fn run_exchange(
    ctx: &ExchangeContext,
    format: CredentialFormat,
    did_form: DidForm
) -> Result<IssuedCredential, IssuanceError> {
    let thid = match format {
        CredentialFormat::Jwt => offer_jwt_credential(ctx, did_form).await?,
        CredentialFormat::AnonCreds => {
            create_anoncreds_schema(&ctx.issuer).await?;
            create_credential_definition(&ctx.issuer).await?;
            offer_anoncreds_credential(ctx).await?
        }
    };

    receive_offer(ctx).await?;
    accept_offer(ctx, format).await?;
    issue_credential(ctx).await?;
    let credential = receive_credential(ctx).await?;

    event!(Level::INFO, event = flow::EXCHANGE_COMPLETED, thid = %thid, format = %format,
           record_id = %credential.record_id);
    Ok(credential)
}
