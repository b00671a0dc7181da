use async_trait::async_trait;

use crate::domain::{error::IssuanceError, memory::keys};

/// Form of a decentralized identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum DidForm {
    Short,
    #[default]
    Long
}

impl DidForm {
    /// Memory key under which an actor keeps this form of its DID
    pub fn memory_key(&self) -> &'static str {
        match self {
            DidForm::Short => keys::SHORT_FORM_DID,
            DidForm::Long => keys::LONG_FORM_DID
        }
    }
}

/// Port for looking up an actor's published identifiers
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn short_form_did(&self, actor: &str) -> Result<String, IssuanceError>;

    async fn long_form_did(&self, actor: &str) -> Result<String, IssuanceError>;
}
