#![allow(dead_code)]

use std::{
    sync::{Arc, Once},
    time::Duration
};

use issuance_sync::{
    adapter::{ledger::InMemoryLedger, simulated::SimulatedNetwork, webhook::WebhookIngestor},
    domain::{
        memory::{Actor, keys},
        poll::PollOptions
    },
    flow::{ExchangeContext, Party, resolve_identifiers}
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const LATENCY: Duration = Duration::from_millis(100);

static INIT: Once = Once::new();

pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}

pub fn poll_options() -> PollOptions {
    PollOptions::new(Duration::from_secs(5), Duration::from_millis(50))
}

/// A ledger and simulated network shared by any number of exchanges
pub struct World {
    pub ledger:  Arc<InMemoryLedger>,
    pub network: SimulatedNetwork
}

impl World {
    pub fn new() -> Self {
        init_tracer();
        let ledger = Arc::new(InMemoryLedger::new());
        let network = SimulatedNetwork::new(WebhookIngestor::new(ledger.clone()), LATENCY);
        Self { ledger, network }
    }

    /// Connected issuer and holder with both DID forms resolved
    pub async fn exchange(&self, issuer: &str, holder: &str) -> ExchangeContext {
        let issuer_party = Party::new(Arc::new(Actor::new(issuer)), self.network.agent(issuer));
        let holder_party = Party::new(Arc::new(Actor::new(holder)), self.network.agent(holder));

        resolve_identifiers(&issuer_party, &self.network).await.expect("issuer identifiers");
        resolve_identifiers(&holder_party, &self.network).await.expect("holder identifiers");

        let connection = self.network.connect(issuer, holder);
        issuer_party.actor.remember(keys::connection_with(holder), &connection).expect("connection remembered");

        ExchangeContext::new(issuer_party, holder_party, self.ledger.clone()).with_poll(poll_options())
    }
}
