//! Credential issuance protocol states
//!
//! A passive definition of the states an issuance exchange moves through. The
//! states carry a total order along the canonical successful path, but events are
//! always matched against a target state by equality: transports may skip
//! intermediate states or deliver them late, so "at least" comparisons would change
//! which polls succeed.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Side of a credential exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Issuer,
    Holder
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Issuer => "Issuer",
            Role::Holder => "Holder"
        }
    }

    pub fn counterpart(&self) -> Role {
        match self {
            Role::Issuer => Role::Holder,
            Role::Holder => Role::Issuer
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Protocol state of one side of a credential exchange
///
/// Declaration order is the canonical successful path, so the derived `Ord`
/// is the path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolState {
    #[serde(rename = "OfferSent", alias = "OFFER_SENT")]
    OfferSent,
    #[serde(rename = "OfferReceived", alias = "OFFER_RECEIVED")]
    OfferReceived,
    #[serde(rename = "RequestSent", alias = "REQUEST_SENT")]
    RequestSent,
    #[serde(rename = "RequestReceived", alias = "REQUEST_RECEIVED")]
    RequestReceived,
    #[serde(rename = "CredentialSent", alias = "CREDENTIAL_SENT")]
    CredentialSent,
    #[serde(rename = "CredentialReceived", alias = "CREDENTIAL_RECEIVED")]
    CredentialReceived
}

impl ProtocolState {
    /// All known states along the canonical successful path
    pub const CANONICAL_PATH: [ProtocolState; 6] = [
        ProtocolState::OfferSent,
        ProtocolState::OfferReceived,
        ProtocolState::RequestSent,
        ProtocolState::RequestReceived,
        ProtocolState::CredentialSent,
        ProtocolState::CredentialReceived
    ];

    /// Position on the canonical path
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolState::OfferSent => "OFFER_SENT",
            ProtocolState::OfferReceived => "OFFER_RECEIVED",
            ProtocolState::RequestSent => "REQUEST_SENT",
            ProtocolState::RequestReceived => "REQUEST_RECEIVED",
            ProtocolState::CredentialSent => "CREDENTIAL_SENT",
            ProtocolState::CredentialReceived => "CREDENTIAL_RECEIVED"
        }
    }

    /// Name used by agents on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            ProtocolState::OfferSent => "OfferSent",
            ProtocolState::OfferReceived => "OfferReceived",
            ProtocolState::RequestSent => "RequestSent",
            ProtocolState::RequestReceived => "RequestReceived",
            ProtocolState::CredentialSent => "CredentialSent",
            ProtocolState::CredentialReceived => "CredentialReceived"
        }
    }

    /// Parses either the wire name or the upper snake case name
    pub fn parse(value: &str) -> Option<Self> {
        Self::CANONICAL_PATH.into_iter().find(|state| state.wire_name() == value || state.as_str() == value)
    }

    /// The side of the exchange on which this state is observed
    pub fn observer(&self) -> Role {
        match self {
            ProtocolState::OfferSent | ProtocolState::RequestReceived | ProtocolState::CredentialSent => Role::Issuer,
            ProtocolState::OfferReceived | ProtocolState::RequestSent | ProtocolState::CredentialReceived => {
                Role::Holder
            }
        }
    }

    /// Terminal state of a successful exchange for the given side
    pub fn terminal_for(role: Role) -> ProtocolState {
        match role {
            Role::Issuer => ProtocolState::CredentialSent,
            Role::Holder => ProtocolState::CredentialReceived
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::terminal_for(self.observer())
    }

    /// Exact match against a target state
    pub fn matches(&self, target: ProtocolState) -> bool {
        *self == target
    }
}

impl Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_path_order() {
        let ordinals: Vec<usize> = ProtocolState::CANONICAL_PATH.iter().map(|s| s.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4, 5]);
        assert!(ProtocolState::OfferSent < ProtocolState::CredentialReceived);
    }

    #[test]
    fn test_observers_alternate_between_sides() {
        use ProtocolState::*;

        assert_eq!(OfferSent.observer(), Role::Issuer);
        assert_eq!(OfferReceived.observer(), Role::Holder);
        assert_eq!(RequestSent.observer(), Role::Holder);
        assert_eq!(RequestReceived.observer(), Role::Issuer);
        assert_eq!(CredentialSent.observer(), Role::Issuer);
        assert_eq!(CredentialReceived.observer(), Role::Holder);
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<ProtocolState> =
            ProtocolState::CANONICAL_PATH.into_iter().filter(ProtocolState::is_terminal).collect();
        assert_eq!(terminal, vec![ProtocolState::CredentialSent, ProtocolState::CredentialReceived]);
        assert_eq!(ProtocolState::terminal_for(Role::Holder), ProtocolState::CredentialReceived);
    }

    #[test]
    fn test_matching_is_exact() {
        // A later state never satisfies an earlier target
        assert!(!ProtocolState::CredentialSent.matches(ProtocolState::RequestReceived));
        assert!(ProtocolState::RequestReceived.matches(ProtocolState::RequestReceived));
    }

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!(ProtocolState::parse("OfferReceived"), Some(ProtocolState::OfferReceived));
        assert_eq!(ProtocolState::parse("CREDENTIAL_SENT"), Some(ProtocolState::CredentialSent));
        assert_eq!(ProtocolState::parse("ProblemReportPending"), None);

        let parsed: ProtocolState = serde_json::from_str("\"REQUEST_RECEIVED\"").unwrap();
        assert_eq!(parsed, ProtocolState::RequestReceived);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"RequestReceived\"");
    }

    #[test]
    fn test_display() {
        assert_eq!(ProtocolState::OfferReceived.to_string(), "OFFER_RECEIVED");
        assert_eq!(Role::Holder.counterpart().to_string(), "Issuer");
    }
}
