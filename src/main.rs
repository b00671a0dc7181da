//! # Issuance Sync CLI
//!
//! Runs a complete credential issuance exchange between two simulated agents, or
//! checks that configured real agents are reachable.
//!
//! ```bash
//! # JWT exchange with the issuer's long-form DID
//! issuance-sync run
//!
//! # AnonCreds exchange, listing every recorded event afterwards
//! issuance-sync run --format anoncreds --events
//!
//! # Health check of the agents named in the config file
//! issuance-sync --config agents.yaml ping
//! ```
//!
//! `RUST_LOG` controls log output (default `info`).

use std::{path::Path, sync::Arc, time::Duration};

use clap::Parser;
use issuance_sync::{
    adapter::{http::HttpAgent, ledger::InMemoryLedger, simulated::SimulatedNetwork, webhook::WebhookIngestor},
    config::{AgentSettings, AppConfig},
    domain::{
        command::{IssuanceCli, IssuanceCommand},
        error::IssuanceError,
        event::CredentialFormat,
        memory::{Actor, keys}
    },
    flow::{ExchangeContext, Party, resolve_identifiers, run_exchange},
    port::{
        agent::{AgentClient, Method},
        identity::DidForm,
        ledger::Ledger
    }
};
use tabled::Table;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};
use tracing_subscriber::EnvFilter;

const ISSUER: &str = "Acme";
const HOLDER: &str = "Bob";

#[tokio::main]
async fn main() -> Result<(), IssuanceError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = IssuanceCli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        IssuanceCommand::Run { format, did_form, latency_ms, events } => {
            run(&config, format, did_form, Duration::from_millis(latency_ms), events).await
        }
        IssuanceCommand::Ping => ping(&config, cli.config.as_deref()).await
    }
}

async fn run(
    config: &AppConfig,
    format: CredentialFormat,
    did_form: DidForm,
    latency: Duration,
    show_events: bool
) -> Result<(), IssuanceError> {
    let ledger = Arc::new(InMemoryLedger::new());
    let network = SimulatedNetwork::new(WebhookIngestor::new(ledger.clone()), latency);

    let issuer = Party::new(Arc::new(Actor::new(ISSUER)), network.agent(ISSUER));
    let holder = Party::new(Arc::new(Actor::new(HOLDER)), network.agent(HOLDER));
    resolve_identifiers(&issuer, &network).await?;
    resolve_identifiers(&holder, &network).await?;

    let connection = network.connect(ISSUER, HOLDER);
    issuer.actor.remember(keys::connection_with(HOLDER), &connection)?;
    holder.actor.remember(keys::connection_with(ISSUER), &connection)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            event!(Level::WARN, "interrupted, cancelling exchange");
            on_interrupt.cancel();
        }
    });

    let ctx = ExchangeContext::new(issuer, holder, ledger.clone())
        .with_poll(config.poll.options())
        .with_cancellation(cancel);

    let result = run_exchange(&ctx, format, did_form).await;

    if show_events {
        let rows: Vec<_> = ledger
            .actors()
            .iter()
            .flat_map(|actor| ledger.events(actor).into_iter().map(move |event| event.row(actor)))
            .collect();
        eprintln!("{}", Table::new(rows));
    }

    let credential = result?;
    println!("{}", serde_json::to_string_pretty(&credential)?);
    Ok(())
}

async fn ping(config: &AppConfig, path: Option<&Path>) -> Result<(), IssuanceError> {
    let agents: Vec<(&str, &AgentSettings)> = [("issuer", config.issuer.as_ref()), ("holder", config.holder.as_ref())]
        .into_iter()
        .filter_map(|(role, settings)| settings.map(|settings| (role, settings)))
        .collect();

    if agents.is_empty() {
        let location = path.map(|p| p.display().to_string()).unwrap_or_else(|| "the default config file".to_string());
        return Err(IssuanceError::Configuration(format!("no agents configured in {}", location)));
    }

    for (role, settings) in agents {
        let agent = HttpAgent::new(settings)?;
        let response = agent.submit(Method::Get, "/_system/health", None).await?;
        println!("{:<8} {} -> {}", role, agent.resolve("/_system/health"), response.status);
    }

    Ok(())
}
