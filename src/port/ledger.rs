use crate::domain::{event::ProtocolEvent, state::ProtocolState};

/// Ledger abstraction for per-actor protocol events
///
/// One append-only log per actor name. Append order is delivery order; nothing is
/// reordered, deduplicated or removed during a run. Lookups never block on
/// delivery, which is why they are synchronous: poll checks call them directly.
pub trait Ledger: Send + Sync {
    /// Append an event to the actor's log
    fn append(&self, actor: &str, event: ProtocolEvent);

    /// Most recently appended event of the actor that satisfies `predicate`
    fn last_matching(&self, actor: &str, predicate: &dyn Fn(&ProtocolEvent) -> bool) -> Option<ProtocolEvent>;

    /// Snapshot of the actor's log in append order
    fn events(&self, actor: &str) -> Vec<ProtocolEvent>;

    /// Number of events recorded for the actor
    fn len(&self, actor: &str) -> usize {
        self.events(actor).len()
    }

    /// Freshest event for a correlation id, whatever its state
    fn last_for(&self, actor: &str, thid: &str) -> Option<ProtocolEvent> {
        self.last_matching(actor, &|event: &ProtocolEvent| event.is_for(thid))
    }

    /// Freshest event for a correlation id in exactly `state`
    fn last_in_state(&self, actor: &str, thid: &str, state: ProtocolState) -> Option<ProtocolEvent> {
        self.last_matching(actor, &|event: &ProtocolEvent| event.matches(thid, state))
    }
}
