//! Request and response bodies exchanged with agents

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::event::CredentialFormat;

pub const CREDENTIAL_OFFERS_PATH: &str = "/issue-credentials/credential-offers";
pub const SCHEMAS_PATH: &str = "/schema-registry/schemas";
pub const DEFINITIONS_PATH: &str = "/credential-definition-registry/definitions";

/// Validity of offered credentials in seconds
pub const VALIDITY_PERIOD_SECS: f64 = 3600.0;

pub fn accept_offer_path(record_id: &str) -> String {
    format!("/issue-credentials/records/{}/accept-offer", record_id)
}

pub fn issue_credential_path(record_id: &str) -> String {
    format!("/issue-credentials/records/{}/issue-credential", record_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOfferRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id:                Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_definition_id: Option<String>,
    pub claims:                   Value,
    #[serde(rename = "issuingDID")]
    pub issuing_did:              String,
    pub connection_id:            String,
    pub validity_period:          f64,
    pub credential_format:        CredentialFormat,
    pub automatic_issuance:       bool
}

impl CredentialOfferRequest {
    pub fn jwt(issuing_did: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            schema_id:                None,
            credential_definition_id: None,
            claims:                   json!({ "firstName": "FirstName", "lastName": "LastName" }),
            issuing_did:              issuing_did.into(),
            connection_id:            connection_id.into(),
            validity_period:          VALIDITY_PERIOD_SECS,
            credential_format:        CredentialFormat::Jwt,
            automatic_issuance:       false
        }
    }

    pub fn anoncreds(
        credential_definition_id: impl Into<String>,
        issuing_did: impl Into<String>,
        connection_id: impl Into<String>
    ) -> Self {
        Self {
            schema_id:                None,
            credential_definition_id: Some(credential_definition_id.into()),
            claims:                   json!({ "name": "Bob", "age": "21" }),
            issuing_did:              issuing_did.into(),
            connection_id:            connection_id.into(),
            validity_period:          VALIDITY_PERIOD_SECS,
            credential_format:        CredentialFormat::AnonCreds,
            automatic_issuance:       false
        }
    }
}

/// Acceptance body; AnonCreds acceptance serializes to `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOfferRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnoncredsSchema {
    pub name:       String,
    pub version:    String,
    pub issuer_id:  String,
    pub attr_names: Vec<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSchemaInput {
    pub author:      String,
    pub name:        String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind:        String,
    pub schema:      AnoncredsSchema,
    pub tags:        Vec<String>,
    pub version:     String
}

impl CredentialSchemaInput {
    /// Student credential schema authored by `author`
    pub fn student(author: &str) -> Self {
        Self {
            author:      author.to_string(),
            name:        Uuid::new_v4().to_string(),
            description: "Simple student credentials schema".to_string(),
            kind:        "AnoncredSchemaV1".to_string(),
            schema:      AnoncredsSchema {
                name:       "StudentCredential".to_string(),
                version:    "1.0".to_string(),
                issuer_id:  author.to_string(),
                attr_names: vec!["name".to_string(), "age".to_string()]
            },
            tags:        vec!["school".to_string(), "students".to_string()],
            version:     "1.0.0".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinitionInput {
    pub name:               String,
    pub version:            String,
    pub schema_id:          String,
    pub description:        String,
    pub author:             String,
    pub signature_type:     String,
    pub tag:                String,
    pub support_revocation: bool
}

impl CredentialDefinitionInput {
    pub fn student(schema_id: impl Into<String>, author: &str) -> Self {
        Self {
            name:               "StudentCredential".to_string(),
            version:            "1.0.0".to_string(),
            schema_id:          schema_id.into(),
            description:        "Simple student credentials definition".to_string(),
            author:             author.to_string(),
            signature_type:     "CL".to_string(),
            tag:                "student".to_string(),
            support_revocation: false
        }
    }
}

/// Any registry resource; only the guid matters to the flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryResource {
    pub guid: String
}

/// Credential record returned when an offer is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecord {
    pub thid:      String,
    #[serde(default)]
    pub record_id: Option<String>
}

/// The part of a remembered connection the flow needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRef {
    pub connection_id: String
}
