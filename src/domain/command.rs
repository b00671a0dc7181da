use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{domain::event::CredentialFormat, port::identity::DidForm};

/// Drive two-party credential issuance exchanges
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct IssuanceCli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: IssuanceCommand
}

#[derive(Subcommand, Debug)]
pub enum IssuanceCommand {
    /// Run a full exchange between simulated agents
    Run {
        /// Credential format to issue
        #[arg(long, value_enum, default_value_t = CredentialFormat::Jwt)]
        format:     CredentialFormat,
        /// Form of the issuer DID used for JWT offers
        #[arg(long, value_enum, default_value_t = DidForm::Long)]
        did_form:   DidForm,
        /// Simulated delivery latency in milliseconds
        #[arg(long, default_value_t = 200)]
        latency_ms: u64,
        /// Print every recorded protocol event after the run
        #[arg(long)]
        events:     bool
    },
    /// Check that the configured agents answer
    Ping
}
