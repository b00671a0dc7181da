//! In-memory event ledger
//!
//! One log per actor, each behind its own lock, so deliveries for one actor never
//! contend with lookups for another. Logs live for the whole run.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock}
};

use tracing::{Level, event};

use crate::{
    domain::{constant::ledger, event::ProtocolEvent},
    port::ledger::Ledger
};

type ActorLog = Arc<RwLock<Vec<ProtocolEvent>>>;

/// In-Memory Ledger Implementation
///
/// Events are stored by actor name in delivery order. Locks are only held while
/// copying in or out, and poisoned locks are recovered because the logs are
/// append-only.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    logs: RwLock<HashMap<String, ActorLog>>
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all actors with at least one recorded event
    pub fn actors(&self) -> Vec<String> {
        let mut actors: Vec<String> = self.logs.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        actors.sort();
        actors
    }

    fn log(&self, actor: &str) -> Option<ActorLog> {
        self.logs.read().unwrap_or_else(PoisonError::into_inner).get(actor).cloned()
    }

    fn log_or_create(&self, actor: &str) -> ActorLog {
        if let Some(log) = self.log(actor) {
            return log;
        }

        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        logs.entry(actor.to_string())
            .or_insert_with(|| {
                event!(Level::TRACE, event = ledger::LOG_CREATED, actor = %actor);
                Arc::new(RwLock::new(Vec::new()))
            })
            .clone()
    }
}

impl Ledger for InMemoryLedger {
    fn append(&self, actor: &str, event: ProtocolEvent) {
        let log = self.log_or_create(actor);
        let mut entries = log.write().unwrap_or_else(PoisonError::into_inner);

        event!(Level::DEBUG, event = ledger::EVENT_APPENDED, actor = %actor, thid = %event.thid,
               record_id = %event.record_id, state = %event.state(), sequence = entries.len());

        entries.push(event);
    }

    fn last_matching(&self, actor: &str, predicate: &dyn Fn(&ProtocolEvent) -> bool) -> Option<ProtocolEvent> {
        let log = self.log(actor)?;
        let entries = log.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().find(|event| predicate(event)).cloned()
    }

    fn events(&self, actor: &str) -> Vec<ProtocolEvent> {
        match self.log(actor) {
            Some(log) => log.read().unwrap_or_else(PoisonError::into_inner).clone(),
            None => Vec::new()
        }
    }

    fn len(&self, actor: &str) -> usize {
        self.log(actor).map(|log| log.read().unwrap_or_else(PoisonError::into_inner).len()).unwrap_or(0)
    }
}
