//! Webhook ingestion - push-event delivery into the ledger
//!
//! Agents notify each registered webhook with an envelope
//! `{ "type", "id", "ts", "data" }`. Credential records carried by
//! `IssueCredentialRecordProtocolStateChanged` notifications become protocol
//! events on the addressed actor's log; every other notification type is ignored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    domain::{
        constant::ingest,
        error::IssuanceError,
        event::{CredentialFormat, EventMetadata, EventPayload, IssuedCredential, OfferDetails, ProtocolEvent},
        state::ProtocolState
    },
    port::ledger::Ledger
};

/// Notification type carrying credential record state changes
pub const CREDENTIAL_STATE_CHANGED: &str = "IssueCredentialRecordProtocolStateChanged";

/// Webhook envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id:   Option<String>,
    #[serde(default)]
    pub ts:   Option<String>,
    pub data: serde_json::Value
}

impl Notification {
    pub fn credential_state_changed(record: &CredentialRecord) -> Result<Self, IssuanceError> {
        Ok(Self {
            kind: CREDENTIAL_STATE_CHANGED.to_string(),
            id:   Some(uuid::Uuid::new_v4().to_string()),
            ts:   Some(chrono::Utc::now().to_rfc3339()),
            data: serde_json::to_value(record)?
        })
    }
}

/// Credential record as exchanged with agents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub record_id:                String,
    pub thid:                     String,
    pub protocol_state:           String,
    #[serde(default)]
    pub credential_format:        CredentialFormat,
    #[serde(default)]
    pub claims:                   serde_json::Value,
    #[serde(default, rename = "issuingDID")]
    pub issuing_did:              Option<String>,
    #[serde(default)]
    pub subject_id:               Option<String>,
    #[serde(default)]
    pub schema_id:                Option<String>,
    #[serde(default)]
    pub credential_definition_id: Option<String>,
    #[serde(default)]
    pub credential:               Option<String>
}

impl CredentialRecord {
    /// Protocol state of the record, when it is one the flow tracks
    pub fn state(&self) -> Option<ProtocolState> {
        ProtocolState::parse(&self.protocol_state)
    }

    fn offer(&self) -> OfferDetails {
        OfferDetails {
            format:                   self.credential_format,
            claims:                   self.claims.clone(),
            issuing_did:              self.issuing_did.clone(),
            schema_id:                self.schema_id.clone(),
            credential_definition_id: self.credential_definition_id.clone()
        }
    }

    /// Convert into a protocol event; `None` for untracked states
    pub fn to_event(&self) -> Option<ProtocolEvent> {
        let payload = match self.state()? {
            ProtocolState::OfferSent => EventPayload::OfferSent(self.offer()),
            ProtocolState::OfferReceived => EventPayload::OfferReceived(self.offer()),
            ProtocolState::RequestSent => EventPayload::RequestSent { subject_id: self.subject_id.clone() },
            ProtocolState::RequestReceived => EventPayload::RequestReceived { subject_id: self.subject_id.clone() },
            ProtocolState::CredentialSent => EventPayload::CredentialSent { format: self.credential_format },
            ProtocolState::CredentialReceived => EventPayload::CredentialReceived(IssuedCredential {
                record_id:  self.record_id.clone(),
                thid:       self.thid.clone(),
                format:     self.credential_format,
                claims:     self.claims.clone(),
                credential: self.credential.clone()
            })
        };

        Some(ProtocolEvent::new(&self.thid, &self.record_id, payload))
    }
}

/// Decodes webhook payloads and appends the resulting events to a ledger
#[derive(Clone)]
pub struct WebhookIngestor {
    ledger: Arc<dyn Ledger>
}

impl WebhookIngestor {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }

    /// Record an already decoded event for `actor`
    pub fn deliver(&self, actor: &str, event: ProtocolEvent) {
        self.ledger.append(actor, event);
    }

    /// Ingest one raw webhook payload addressed to `actor`
    ///
    /// Returns the state that was recorded, or `None` when the notification is
    /// not a tracked credential state change.
    pub fn ingest(&self, actor: &str, payload: &str) -> Result<Option<ProtocolState>, IssuanceError> {
        let notification: Notification = serde_json::from_str(payload).map_err(|e| {
            event!(Level::WARN, event = ingest::MALFORMED_PAYLOAD, actor = %actor, error = %e);
            IssuanceError::Ingestion(format!("malformed notification for '{}': {}", actor, e))
        })?;

        event!(Level::TRACE, event = ingest::NOTIFICATION_RECEIVED, actor = %actor, kind = %notification.kind);

        if notification.kind != CREDENTIAL_STATE_CHANGED {
            event!(Level::TRACE, event = ingest::NOTIFICATION_IGNORED, actor = %actor, kind = %notification.kind);
            return Ok(None);
        }

        let record: CredentialRecord = serde_json::from_value(notification.data).map_err(|e| {
            event!(Level::WARN, event = ingest::MALFORMED_PAYLOAD, actor = %actor, error = %e);
            IssuanceError::Ingestion(format!("malformed credential record for '{}': {}", actor, e))
        })?;

        let Some(mut event) = record.to_event() else {
            event!(Level::WARN, event = ingest::UNKNOWN_STATE, actor = %actor, thid = %record.thid,
                   state = %record.protocol_state);
            return Ok(None);
        };

        if let Some(id) = notification.id {
            event.metadata = EventMetadata::new().with_event_id(id);
        }

        let state = event.state();
        self.deliver(actor, event);
        Ok(Some(state))
    }

    /// Drain raw payloads for `actor` until the channel closes or `cancel` fires
    ///
    /// Malformed payloads are logged and skipped. Returns the number of events
    /// recorded.
    pub async fn pump(&self, actor: String, mut receiver: mpsc::Receiver<String>, cancel: CancellationToken) -> usize {
        let mut recorded = 0;

        loop {
            let payload = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = receiver.recv() => match received {
                    Some(payload) => payload,
                    None => break
                }
            };

            if let Ok(Some(_)) = self.ingest(&actor, &payload) {
                recorded += 1;
            }
        }

        event!(Level::DEBUG, event = ingest::PUMP_STOPPED, actor = %actor, recorded = recorded);
        recorded
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapter::ledger::InMemoryLedger;

    fn ingestor() -> (Arc<InMemoryLedger>, WebhookIngestor) {
        let ledger = Arc::new(InMemoryLedger::new());
        (ledger.clone(), WebhookIngestor::new(ledger))
    }

    fn notification(state: &str) -> String {
        json!({
            "type": CREDENTIAL_STATE_CHANGED,
            "id": "evt-1",
            "ts": "2024-01-01T00:00:00Z",
            "data": {
                "recordId": "rec-1",
                "thid": "thid-1",
                "protocolState": state,
                "credentialFormat": "JWT",
                "claims": {"firstName": "FirstName"},
                "credential": "eyJhbGciOiJFUzI1NksifQ"
            }
        })
        .to_string()
    }

    #[test]
    fn test_ingest_records_tracked_state() {
        let (ledger, ingestor) = ingestor();

        let state = ingestor.ingest("bob", &notification("CredentialReceived")).unwrap();
        assert_eq!(state, Some(ProtocolState::CredentialReceived));

        let event = ledger.last_for("bob", "thid-1").unwrap();
        assert_eq!(event.metadata.event_id, "evt-1");
        let EventPayload::CredentialReceived(credential) = event.payload else {
            panic!("expected a received credential");
        };
        assert_eq!(credential.record_id, "rec-1");
        assert_eq!(credential.credential.as_deref(), Some("eyJhbGciOiJFUzI1NksifQ"));
    }

    #[test]
    fn test_ingest_ignores_other_notifications_and_states() {
        let (ledger, ingestor) = ingestor();

        let other = json!({"type": "ConnectionUpdated", "data": {}}).to_string();
        assert_eq!(ingestor.ingest("bob", &other).unwrap(), None);
        assert_eq!(ingestor.ingest("bob", &notification("ProblemReportPending")).unwrap(), None);
        assert_eq!(ledger.len("bob"), 0);
    }

    #[test]
    fn test_ingest_rejects_malformed_payloads() {
        let (_, ingestor) = ingestor();

        let err = ingestor.ingest("bob", "{not json").unwrap_err();
        assert!(matches!(err, IssuanceError::Ingestion(_)));

        let broken = json!({"type": CREDENTIAL_STATE_CHANGED, "data": {"thid": 7}}).to_string();
        assert!(matches!(ingestor.ingest("bob", &broken).unwrap_err(), IssuanceError::Ingestion(_)));
    }

    #[test]
    fn test_record_maps_request_payload() {
        let record = CredentialRecord {
            record_id: "rec-2".to_string(),
            thid: "thid-2".to_string(),
            protocol_state: "RequestReceived".to_string(),
            subject_id: Some("did:prism:holder:long".to_string()),
            ..Default::default()
        };

        let event = record.to_event().unwrap();
        assert_eq!(event.payload, EventPayload::RequestReceived { subject_id: Some("did:prism:holder:long".to_string()) });
    }

    #[tokio::test]
    async fn test_pump_drains_until_channel_closes() {
        let (ledger, ingestor) = ingestor();
        let (sender, receiver) = mpsc::channel(8);

        sender.send(notification("OfferReceived")).await.unwrap();
        sender.send("garbage".to_string()).await.unwrap();
        sender.send(notification("CredentialReceived")).await.unwrap();
        drop(sender);

        let recorded = ingestor.pump("bob".to_string(), receiver, CancellationToken::new()).await;

        assert_eq!(recorded, 2);
        assert_eq!(ledger.len("bob"), 2);
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancellation() {
        let (_, ingestor) = ingestor();
        let (_sender, receiver) = mpsc::channel::<String>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(ingestor.pump("bob".to_string(), receiver, cancel).await, 0);
    }
}
