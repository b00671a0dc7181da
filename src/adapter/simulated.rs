//! Simulated cloud agents
//!
//! An in-process stand-in for a pair of connected agents. Submissions are answered
//! synchronously like an HTTP API would answer them, while protocol progress is
//! pushed to the webhook ingestor after a configurable latency: the sending side
//! observes its state after one latency, the receiving side after two. Faults can
//! be injected per path and deliveries to an actor can be muted.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{Level, event};
use uuid::Uuid;

use crate::{
    adapter::webhook::{CredentialRecord, Notification, WebhookIngestor},
    domain::{constant::ingest, error::IssuanceError, event::CredentialFormat, state::Role},
    port::{
        agent::{AgentClient, AgentResponse, Method, status},
        identity::IdentityResolver
    }
};

/// Connection between two actors' agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connection_id: String,
    pub inviter:       String,
    pub invitee:       String
}

#[derive(Debug, Clone)]
struct SimRecord {
    record_id:                String,
    thid:                     String,
    owner:                    String,
    role:                     Role,
    state:                    &'static str,
    format:                   CredentialFormat,
    claims:                   Value,
    issuing_did:              Option<String>,
    subject_id:               Option<String>,
    schema_id:                Option<String>,
    credential_definition_id: Option<String>,
    credential:               Option<String>
}

impl SimRecord {
    fn to_record(&self) -> CredentialRecord {
        CredentialRecord {
            record_id:                self.record_id.clone(),
            thid:                     self.thid.clone(),
            protocol_state:           self.state.to_string(),
            credential_format:        self.format,
            claims:                   self.claims.clone(),
            issuing_did:              self.issuing_did.clone(),
            subject_id:               self.subject_id.clone(),
            schema_id:                self.schema_id.clone(),
            credential_definition_id: self.credential_definition_id.clone(),
            credential:               self.credential.clone()
        }
    }
}

struct NetworkState {
    ingestor:    WebhookIngestor,
    latency:     Duration,
    connections: Mutex<HashMap<String, Connection>>,
    records:     Mutex<HashMap<String, SimRecord>>,
    schemas:     Mutex<HashSet<String>>,
    definitions: Mutex<HashSet<String>>,
    muted:       Mutex<HashSet<String>>,
    faults:      Mutex<Vec<(String, u16)>>
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn text(body: Option<&Value>, field: &str) -> Option<String> {
    body.and_then(|b| b.get(field)).and_then(Value::as_str).map(str::to_string)
}

fn reply(status: u16, detail: impl Into<String>) -> AgentResponse {
    AgentResponse::new(status, json!({ "status": status, "detail": detail.into() }))
}

fn hex(value: &str) -> String {
    value.bytes().map(|b| format!("{:02x}", b)).collect()
}

/// A pair (or more) of connected agents living inside the test process
#[derive(Clone)]
pub struct SimulatedNetwork {
    state: Arc<NetworkState>
}

impl SimulatedNetwork {
    pub fn new(ingestor: WebhookIngestor, latency: Duration) -> Self {
        Self {
            state: Arc::new(NetworkState {
                ingestor,
                latency,
                connections: Mutex::new(HashMap::new()),
                records: Mutex::new(HashMap::new()),
                schemas: Mutex::new(HashSet::new()),
                definitions: Mutex::new(HashSet::new()),
                muted: Mutex::new(HashSet::new()),
                faults: Mutex::new(Vec::new())
            })
        }
    }

    /// Agent client acting on behalf of `actor`
    pub fn agent(&self, actor: &str) -> Arc<dyn AgentClient> {
        Arc::new(SimulatedAgent { actor: actor.to_string(), state: self.state.clone() })
    }

    /// Establish a connection where `inviter` will later issue to `invitee`
    pub fn connect(&self, inviter: &str, invitee: &str) -> Connection {
        let connection = Connection {
            connection_id: Uuid::new_v4().to_string(),
            inviter:       inviter.to_string(),
            invitee:       invitee.to_string()
        };
        lock(&self.state.connections).insert(connection.connection_id.clone(), connection.clone());
        connection
    }

    /// Drop webhook deliveries addressed to `actor` from now on
    pub fn mute(&self, actor: &str) {
        lock(&self.state.muted).insert(actor.to_string());
    }

    pub fn unmute(&self, actor: &str) {
        lock(&self.state.muted).remove(actor);
    }

    /// Answer the next submission whose path ends with `path_suffix` with `status`
    pub fn fail_next(&self, path_suffix: &str, status: u16) {
        lock(&self.state.faults).push((path_suffix.to_string(), status));
    }
}

#[async_trait]
impl IdentityResolver for SimulatedNetwork {
    async fn short_form_did(&self, actor: &str) -> Result<String, IssuanceError> {
        Ok(format!("did:prism:{}", hex(actor)))
    }

    async fn long_form_did(&self, actor: &str) -> Result<String, IssuanceError> {
        Ok(format!("did:prism:{}:{}", hex(actor), hex(&format!("long-form-{}", actor))))
    }
}

struct SimulatedAgent {
    actor: String,
    state: Arc<NetworkState>
}

#[async_trait]
impl AgentClient for SimulatedAgent {
    async fn submit(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>
    ) -> Result<AgentResponse, IssuanceError> {
        if let Some(status) = self.take_fault(path) {
            return Ok(reply(status, "injected failure"));
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let response = match (method, segments.as_slice()) {
            (Method::Get, ["_system", "health"]) => AgentResponse::new(status::OK, json!({ "version": "simulated" })),
            (Method::Post, ["issue-credentials", "credential-offers"]) => self.create_offer(body),
            (Method::Get, ["issue-credentials", "records", record_id]) => self.get_record(record_id),
            (Method::Post, ["issue-credentials", "records", record_id, "accept-offer"]) => {
                self.accept_offer(record_id, body)
            }
            (Method::Post, ["issue-credentials", "records", record_id, "issue-credential"]) => {
                self.issue_credential(record_id)
            }
            (Method::Post, ["schema-registry", "schemas"]) => self.create_schema(body),
            (Method::Post, ["credential-definition-registry", "definitions"]) => self.create_definition(body),
            _ => reply(status::NOT_FOUND, format!("no route for {} {}", method, path))
        };

        Ok(response)
    }

    fn resolve(&self, path: &str) -> String {
        format!("http://{}.agent.local/{}", self.actor.to_lowercase(), path.trim_start_matches('/'))
    }
}

impl SimulatedAgent {
    fn take_fault(&self, path: &str) -> Option<u16> {
        let mut faults = lock(&self.state.faults);
        let index = faults.iter().position(|(suffix, _)| path.ends_with(suffix.as_str()))?;
        Some(faults.remove(index).1)
    }

    fn create_offer(&self, body: Option<&Value>) -> AgentResponse {
        let Some(connection_id) = text(body, "connectionId") else {
            return reply(status::BAD_REQUEST, "connectionId is required");
        };
        let Some(connection) = lock(&self.state.connections).get(&connection_id).cloned() else {
            return reply(status::NOT_FOUND, format!("connection {} not found", connection_id));
        };
        if connection.inviter != self.actor {
            return reply(status::NOT_FOUND, format!("connection {} not found", connection_id));
        }

        let format = match body.and_then(|b| b.get("credentialFormat")).cloned() {
            Some(value) => match serde_json::from_value::<CredentialFormat>(value) {
                Ok(format) => format,
                Err(e) => return reply(status::BAD_REQUEST, format!("unsupported credential format: {}", e))
            },
            None => CredentialFormat::Jwt
        };
        let issuing_did = text(body, "issuingDID");
        let credential_definition_id = text(body, "credentialDefinitionId");

        match format {
            CredentialFormat::Jwt if issuing_did.is_none() => {
                return reply(status::BAD_REQUEST, "issuingDID is required for JWT offers");
            }
            CredentialFormat::AnonCreds => {
                let known = credential_definition_id
                    .as_ref()
                    .is_some_and(|id| lock(&self.state.definitions).contains(id));
                if !known {
                    return reply(status::BAD_REQUEST, "unknown credentialDefinitionId");
                }
            }
            CredentialFormat::Jwt => {}
        }

        let thid = Uuid::new_v4().to_string();
        let issuer_record = SimRecord {
            record_id: Uuid::new_v4().to_string(),
            thid: thid.clone(),
            owner: self.actor.clone(),
            role: Role::Issuer,
            state: "OfferPending",
            format,
            claims: body.and_then(|b| b.get("claims")).cloned().unwrap_or(Value::Null),
            issuing_did,
            subject_id: None,
            schema_id: text(body, "schemaId"),
            credential_definition_id,
            credential: None
        };
        let response = issuer_record.to_record();
        lock(&self.state.records).insert(issuer_record.record_id.clone(), issuer_record.clone());

        let latency = self.state.latency;
        let issuer_id = issuer_record.record_id.clone();
        self.schedule(&self.actor, latency, move |records| {
            let record = records.get_mut(&issuer_id)?;
            record.state = "OfferSent";
            Some(record.to_record())
        });

        let holder = connection.invitee.clone();
        let owner = holder.clone();
        self.schedule(&holder, latency * 2, move |records| {
            let record = SimRecord {
                record_id: Uuid::new_v4().to_string(),
                owner,
                role: Role::Holder,
                state: "OfferReceived",
                ..issuer_record
            };
            let delivered = record.to_record();
            records.insert(record.record_id.clone(), record);
            Some(delivered)
        });

        match serde_json::to_value(&response) {
            Ok(body) => AgentResponse::new(status::CREATED, body),
            Err(e) => reply(500, e.to_string())
        }
    }

    fn get_record(&self, record_id: &str) -> AgentResponse {
        let records = lock(&self.state.records);
        match records.get(record_id).filter(|record| record.owner == self.actor) {
            Some(record) => AgentResponse::new(status::OK, json!(record.to_record())),
            None => reply(status::NOT_FOUND, format!("record {} not found", record_id))
        }
    }

    fn accept_offer(&self, record_id: &str, body: Option<&Value>) -> AgentResponse {
        let (thid, format) = {
            let records = lock(&self.state.records);
            let Some(record) = records.get(record_id).filter(|r| r.owner == self.actor && r.role == Role::Holder)
            else {
                return reply(status::NOT_FOUND, format!("record {} not found", record_id));
            };
            if record.state != "OfferReceived" {
                return reply(status::BAD_REQUEST, format!("record {} is in state {}", record_id, record.state));
            }
            (record.thid.clone(), record.format)
        };

        let subject_id = text(body, "subjectId");
        match format {
            CredentialFormat::Jwt => {
                let long_form = subject_id.as_ref().is_some_and(|did| did.matches(':').count() >= 3);
                if !long_form {
                    return reply(status::BAD_REQUEST, "a long-form subjectId is required for JWT credentials");
                }
            }
            CredentialFormat::AnonCreds if subject_id.is_some() => {
                return reply(status::BAD_REQUEST, "AnonCreds acceptance takes no subjectId");
            }
            CredentialFormat::AnonCreds => {}
        }

        if let Some(record) = lock(&self.state.records).get_mut(record_id) {
            record.state = "RequestPending";
            record.subject_id = subject_id.clone();
        }

        let latency = self.state.latency;
        let holder_id = record_id.to_string();
        self.schedule(&self.actor, latency, move |records| {
            let record = records.get_mut(&holder_id)?;
            record.state = "RequestSent";
            Some(record.to_record())
        });

        let issuer = self.counterpart_owner(&thid, Role::Issuer);
        if let Some(issuer) = issuer {
            let thid = thid.clone();
            self.schedule(&issuer, latency * 2, move |records| {
                let record = records.values_mut().find(|r| r.thid == thid && r.role == Role::Issuer)?;
                record.state = "RequestReceived";
                record.subject_id = subject_id;
                Some(record.to_record())
            });
        }

        self.get_record(record_id)
    }

    fn issue_credential(&self, record_id: &str) -> AgentResponse {
        let thid = {
            let mut records = lock(&self.state.records);
            let Some(record) = records.get_mut(record_id).filter(|r| r.owner == self.actor && r.role == Role::Issuer)
            else {
                return reply(status::NOT_FOUND, format!("record {} not found", record_id));
            };
            if record.state != "RequestReceived" {
                return reply(status::BAD_REQUEST, format!("record {} is in state {}", record_id, record.state));
            }
            record.state = "CredentialPending";
            record.thid.clone()
        };

        let latency = self.state.latency;
        let issuer_id = record_id.to_string();
        self.schedule(&self.actor, latency, move |records| {
            let record = records.get_mut(&issuer_id)?;
            record.state = "CredentialSent";
            Some(record.to_record())
        });

        if let Some(holder) = self.counterpart_owner(&thid, Role::Holder) {
            self.schedule(&holder, latency * 2, move |records| {
                let record = records.values_mut().find(|r| r.thid == thid && r.role == Role::Holder)?;
                record.state = "CredentialReceived";
                record.credential = Some(format!(
                    "{}.{}.{}",
                    record.format.as_str().to_lowercase(),
                    hex(&record.thid),
                    hex(record.subject_id.as_deref().unwrap_or("anonymous"))
                ));
                Some(record.to_record())
            });
        }

        self.get_record(record_id)
    }

    fn create_schema(&self, body: Option<&Value>) -> AgentResponse {
        let Some(Value::Object(fields)) = body.cloned() else {
            return reply(status::BAD_REQUEST, "schema input is required");
        };
        if !fields.contains_key("schema") {
            return reply(status::BAD_REQUEST, "schema is required");
        }

        let guid = Uuid::new_v4().to_string();
        lock(&self.state.schemas).insert(guid.clone());

        let mut created = fields;
        created.insert("guid".to_string(), json!(guid));
        AgentResponse::new(status::CREATED, Value::Object(created))
    }

    fn create_definition(&self, body: Option<&Value>) -> AgentResponse {
        let Some(schema_id) = text(body, "schemaId") else {
            return reply(status::BAD_REQUEST, "schemaId is required");
        };
        let known = schema_id
            .trim_end_matches("/schema")
            .rsplit('/')
            .next()
            .is_some_and(|guid| lock(&self.state.schemas).contains(guid));
        if !known {
            return reply(status::BAD_REQUEST, format!("schema {} cannot be resolved", schema_id));
        }

        let guid = Uuid::new_v4().to_string();
        lock(&self.state.definitions).insert(guid.clone());

        let mut created = body.cloned().unwrap_or_else(|| json!({}));
        if let Value::Object(fields) = &mut created {
            fields.insert("guid".to_string(), json!(guid));
        }
        AgentResponse::new(status::CREATED, created)
    }

    fn counterpart_owner(&self, thid: &str, role: Role) -> Option<String> {
        let connections = lock(&self.state.connections);
        let records = lock(&self.state.records);

        if let Some(record) = records.values().find(|r| r.thid == thid && r.role == role) {
            return Some(record.owner.clone());
        }

        // The holder record only exists once the offer has been delivered
        let issuer = records.values().find(|r| r.thid == thid && r.role == Role::Issuer)?;
        connections
            .values()
            .find(|c| c.inviter == issuer.owner)
            .map(|c| if role == Role::Holder { c.invitee.clone() } else { c.inviter.clone() })
    }

    /// Apply `update` after `delay` and push the resulting record to `actor`'s webhook
    fn schedule<F>(&self, actor: &str, delay: Duration, update: F)
    where
        F: FnOnce(&mut HashMap<String, SimRecord>) -> Option<CredentialRecord> + Send + 'static
    {
        let state = self.state.clone();
        let actor = actor.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(record) = update(&mut lock(&state.records)) else {
                return;
            };

            if lock(&state.muted).contains(&actor) {
                event!(Level::DEBUG, event = ingest::DELIVERY_DROPPED, actor = %actor, thid = %record.thid,
                       state = %record.protocol_state);
                return;
            }

            let payload = match Notification::credential_state_changed(&record).and_then(|n| {
                serde_json::to_string(&n).map_err(IssuanceError::from)
            }) {
                Ok(payload) => payload,
                Err(e) => {
                    event!(Level::WARN, event = ingest::MALFORMED_PAYLOAD, actor = %actor, error = %e);
                    return;
                }
            };

            if let Err(e) = state.ingestor.ingest(&actor, &payload) {
                event!(Level::WARN, event = ingest::MALFORMED_PAYLOAD, actor = %actor, error = %e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapter::ledger::InMemoryLedger, domain::state::ProtocolState, port::ledger::Ledger};

    fn network() -> (Arc<InMemoryLedger>, SimulatedNetwork) {
        let ledger = Arc::new(InMemoryLedger::new());
        let network = SimulatedNetwork::new(WebhookIngestor::new(ledger.clone()), Duration::from_millis(50));
        (ledger, network)
    }

    fn jwt_offer(connection: &Connection) -> Value {
        json!({
            "connectionId": connection.connection_id,
            "credentialFormat": "JWT",
            "issuingDID": "did:prism:acme",
            "claims": {"firstName": "FirstName"}
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_is_delivered_to_both_sides() {
        let (ledger, network) = network();
        let connection = network.connect("acme", "bob");
        let acme = network.agent("acme");

        let response = acme
            .submit(Method::Post, "/issue-credentials/credential-offers", Some(&jwt_offer(&connection)))
            .await
            .unwrap();
        assert_eq!(response.status, status::CREATED);
        let record: CredentialRecord = response.json().unwrap();

        // Nothing is visible before the latency elapses
        assert_eq!(ledger.len("acme"), 0);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(ledger.last_for("acme", &record.thid).unwrap().state(), ProtocolState::OfferSent);
        assert_eq!(ledger.last_for("bob", &record.thid).unwrap().state(), ProtocolState::OfferReceived);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offer_on_unknown_connection_is_rejected() {
        let (_, network) = network();
        let acme = network.agent("acme");

        let body = json!({"connectionId": "missing", "issuingDID": "did:prism:acme"});
        let response = acme.submit(Method::Post, "/issue-credentials/credential-offers", Some(&body)).await.unwrap();
        assert_eq!(response.status, status::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_actor_receives_nothing() {
        let (ledger, network) = network();
        let connection = network.connect("acme", "bob");
        network.mute("bob");

        network
            .agent("acme")
            .submit(Method::Post, "/issue-credentials/credential-offers", Some(&jwt_offer(&connection)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(ledger.len("acme"), 1);
        assert_eq!(ledger.len("bob"), 0);
    }

    #[tokio::test]
    async fn test_injected_fault_answers_once() {
        let (_, network) = network();
        network.fail_next("/schemas", 500);
        let acme = network.agent("acme");
        let body = json!({"schema": {}});

        let first = acme.submit(Method::Post, "/schema-registry/schemas", Some(&body)).await.unwrap();
        let second = acme.submit(Method::Post, "/schema-registry/schemas", Some(&body)).await.unwrap();

        assert_eq!(first.status, 500);
        assert_eq!(second.status, status::CREATED);
    }

    #[tokio::test]
    async fn test_unknown_route_and_resolve() {
        let (_, network) = network();
        let acme = network.agent("Acme");

        let response = acme.submit(Method::Get, "/nowhere", None).await.unwrap();
        assert_eq!(response.status, status::NOT_FOUND);
        assert_eq!(acme.resolve("/schema-registry/schemas"), "http://acme.agent.local/schema-registry/schemas");
    }

    #[tokio::test]
    async fn test_identifiers_have_short_and_long_forms() {
        let (_, network) = network();
        let short = network.short_form_did("bob").await.unwrap();
        let long = network.long_form_did("bob").await.unwrap();

        assert_eq!(short.matches(':').count(), 2);
        assert!(long.starts_with(&short));
        assert_eq!(long.matches(':').count(), 3);
    }
}
