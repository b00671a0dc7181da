//! Protocol events observed by one actor
//!
//! Each event is immutable once recorded. The payload is a tagged variant keyed
//! by protocol state, so an event's state can never disagree with its content.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

use crate::domain::state::ProtocolState;

/// Credential format of an exchange
///
/// Only the offer and acceptance payloads depend on the format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum
)]
pub enum CredentialFormat {
    #[default]
    #[serde(rename = "JWT")]
    #[value(name = "jwt")]
    Jwt,
    #[serde(rename = "AnonCreds")]
    #[value(name = "anoncreds")]
    AnonCreds
}

impl CredentialFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialFormat::Jwt => "JWT",
            CredentialFormat::AnonCreds => "AnonCreds"
        }
    }
}

impl Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Offer content as seen by either side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDetails {
    pub format:                   CredentialFormat,
    pub claims:                   serde_json::Value,
    pub issuing_did:              Option<String>,
    pub schema_id:                Option<String>,
    pub credential_definition_id: Option<String>
}

/// The artifact a holder ends up with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub record_id:  String,
    pub thid:       String,
    pub format:     CredentialFormat,
    pub claims:     serde_json::Value,
    /// Encoded credential as delivered by the holder's agent
    pub credential: Option<String>
}

/// State-specific event content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocolState", content = "details")]
pub enum EventPayload {
    OfferSent(OfferDetails),
    OfferReceived(OfferDetails),
    RequestSent {
        #[serde(rename = "subjectId")]
        subject_id: Option<String>
    },
    RequestReceived {
        #[serde(rename = "subjectId")]
        subject_id: Option<String>
    },
    CredentialSent {
        format: CredentialFormat
    },
    CredentialReceived(IssuedCredential)
}

impl EventPayload {
    pub fn state(&self) -> ProtocolState {
        match self {
            EventPayload::OfferSent(_) => ProtocolState::OfferSent,
            EventPayload::OfferReceived(_) => ProtocolState::OfferReceived,
            EventPayload::RequestSent { .. } => ProtocolState::RequestSent,
            EventPayload::RequestReceived { .. } => ProtocolState::RequestReceived,
            EventPayload::CredentialSent { .. } => ProtocolState::CredentialSent,
            EventPayload::CredentialReceived(_) => ProtocolState::CredentialReceived
        }
    }
}

/// Delivery metadata attached when an event enters a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Unique event identifier
    pub event_id:    String,
    /// Time the event was recorded
    pub received_at: DateTime<Utc>
}

impl EventMetadata {
    pub fn new() -> Self {
        Self { event_id: Uuid::new_v4().to_string(), received_at: Utc::now() }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// One asynchronously observed state change of a credential exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolEvent {
    /// Correlation (thread) id, shared by both sides for the whole exchange
    pub thid:      String,
    /// Protocol-instance identifier on the observing side
    pub record_id: String,
    pub payload:   EventPayload,
    pub metadata:  EventMetadata
}

impl ProtocolEvent {
    pub fn new(thid: impl Into<String>, record_id: impl Into<String>, payload: EventPayload) -> Self {
        Self { thid: thid.into(), record_id: record_id.into(), payload, metadata: EventMetadata::new() }
    }

    pub fn state(&self) -> ProtocolState {
        self.payload.state()
    }

    pub fn is_for(&self, thid: &str) -> bool {
        self.thid == thid
    }

    pub fn matches(&self, thid: &str, state: ProtocolState) -> bool {
        self.is_for(thid) && self.state().matches(state)
    }

    /// Table row for display
    pub fn row(&self, actor: &str) -> EventRow {
        EventRow {
            actor:       actor.to_string(),
            step:        format!("{}/{}", self.state().ordinal() + 1, ProtocolState::CANONICAL_PATH.len()),
            state:       self.state().to_string(),
            thid:        self.thid.clone(),
            record_id:   self.record_id.clone(),
            received_at: self.metadata.received_at.format("%H:%M:%S%.3f").to_string()
        }
    }
}

impl Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [thid={}, record={}]", self.state(), self.thid, self.record_id)
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct EventRow {
    #[tabled(rename = "Actor")]
    pub actor:       String,
    #[tabled(rename = "Step")]
    pub step:        String,
    #[tabled(rename = "State")]
    pub state:       String,
    #[tabled(rename = "Thread ID")]
    pub thid:        String,
    #[tabled(rename = "Record ID")]
    pub record_id:   String,
    #[tabled(rename = "Received")]
    pub received_at: String
}

#[cfg(test)]
mod tests {
    use insta::assert_yaml_snapshot;
    use serde_json::json;

    use super::*;

    fn offer() -> OfferDetails {
        OfferDetails {
            format:                   CredentialFormat::AnonCreds,
            claims:                   json!({"name": "Bob", "age": "21"}),
            issuing_did:              Some("did:prism:issuer".to_string()),
            schema_id:                None,
            credential_definition_id: Some("5b1a2e5c-0000-4000-8000-000000000001".to_string())
        }
    }

    #[test]
    fn test_state_follows_payload() {
        let event = ProtocolEvent::new("thid-1", "rec-1", EventPayload::OfferReceived(offer()));
        assert_eq!(event.state(), ProtocolState::OfferReceived);
        assert!(event.matches("thid-1", ProtocolState::OfferReceived));
        assert!(!event.matches("thid-2", ProtocolState::OfferReceived));
        assert!(!event.matches("thid-1", ProtocolState::OfferSent));
    }

    #[test]
    fn test_serialized_shape() {
        let event = ProtocolEvent::new("thid-1", "rec-1", EventPayload::OfferReceived(offer()));

        assert_yaml_snapshot!(event, {
            ".metadata.eventId" => "[event_id]",
            ".metadata.receivedAt" => "[received_at]",
        }, @r###"
        thid: thid-1
        recordId: rec-1
        payload:
          protocolState: OfferReceived
          details:
            format: AnonCreds
            claims:
              age: "21"
              name: Bob
            issuingDid: "did:prism:issuer"
            schemaId: ~
            credentialDefinitionId: 5b1a2e5c-0000-4000-8000-000000000001
        metadata:
          eventId: "[event_id]"
          receivedAt: "[received_at]"
        "###);
    }

    #[test]
    fn test_payload_round_trips_request_variant() {
        let payload = EventPayload::RequestReceived { subject_id: Some("did:prism:holder:long".to_string()) };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"protocolState": "RequestReceived", "details": {"subjectId": "did:prism:holder:long"}}));

        let decoded: EventPayload = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.state(), ProtocolState::RequestReceived);
    }

    #[test]
    fn test_row_and_display() {
        let event = ProtocolEvent::new("thid-9", "rec-9", EventPayload::CredentialSent { format: CredentialFormat::Jwt });
        let row = event.row("acme");
        assert_eq!(row.actor, "acme");
        assert_eq!(row.state, "CREDENTIAL_SENT");
        assert_eq!(row.step, "5/6");
        assert_eq!(event.to_string(), "CREDENTIAL_SENT [thid=thid-9, record=rec-9]");
    }
}
