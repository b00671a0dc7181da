//! # Issuance Sync
//!
//! Synchronizes two-party credential issuance exchanges whose protocol progress is
//! delivered asynchronously.
//!
//! This crate provides:
//! - Per-actor memory and an append-only per-actor event ledger
//! - A bounded, cancellable poll-until engine
//! - A flow orchestrator driving issuer and holder through JWT and AnonCreds exchanges
//! - Webhook ingestion, an HTTP agent client and an in-process simulated agent network

pub mod adapter;
pub mod config;
pub mod domain;
pub mod flow;
pub mod port;

// Re-export commonly used types
pub use adapter::{ledger::InMemoryLedger, simulated::SimulatedNetwork, webhook::WebhookIngestor};
pub use config::AppConfig;
pub use domain::{
    error::IssuanceError,
    event::{CredentialFormat, IssuedCredential, ProtocolEvent},
    memory::Actor,
    poll::{PollOptions, poll_for, poll_until},
    state::{ProtocolState, Role}
};
pub use flow::{ExchangeContext, Party, run_exchange};
pub use port::{identity::DidForm, ledger::Ledger};
