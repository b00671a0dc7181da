//! Domain Events - Structured event names for tracing

/// Actor memory events
pub mod memory {
    pub const REMEMBERED: &str = "memory.remembered";
    pub const RECALL_MISSED: &str = "memory.recall_missed";
}

/// Event ledger events
pub mod ledger {
    pub const EVENT_APPENDED: &str = "ledger.event_appended";
    pub const LOG_CREATED: &str = "ledger.log_created";
}

/// Poll-until engine events
pub mod poll {
    pub const STARTED: &str = "poll.started";
    pub const SATISFIED: &str = "poll.satisfied";
    pub const CHECK_FAILED: &str = "poll.check_failed";
    pub const TIMED_OUT: &str = "poll.timed_out";
    pub const CANCELLED: &str = "poll.cancelled";
}

/// Flow orchestrator events
pub mod flow {
    pub const OFFER_SUBMITTED: &str = "flow.offer_submitted";
    pub const OFFER_RECEIVED: &str = "flow.offer_received";
    pub const OFFER_ACCEPTED: &str = "flow.offer_accepted";
    pub const REQUEST_RECEIVED: &str = "flow.request_received";
    pub const CREDENTIAL_ISSUED: &str = "flow.credential_issued";
    pub const CREDENTIAL_RECEIVED: &str = "flow.credential_received";
    pub const SCHEMA_CREATED: &str = "flow.schema_created";
    pub const DEFINITION_CREATED: &str = "flow.definition_created";
    pub const IDENTIFIERS_RESOLVED: &str = "flow.identifiers_resolved";
    pub const EXCHANGE_COMPLETED: &str = "flow.exchange_completed";
}

/// Agent submission events
pub mod agent {
    pub const REQUEST_SENT: &str = "agent.request_sent";
    pub const UNEXPECTED_STATUS: &str = "agent.unexpected_status";
    pub const REQUEST_FAILED: &str = "agent.request_failed";
}

/// Push-event ingestion events
pub mod ingest {
    pub const NOTIFICATION_RECEIVED: &str = "ingest.notification_received";
    pub const NOTIFICATION_IGNORED: &str = "ingest.notification_ignored";
    pub const UNKNOWN_STATE: &str = "ingest.unknown_state";
    pub const MALFORMED_PAYLOAD: &str = "ingest.malformed_payload";
    pub const PUMP_STOPPED: &str = "ingest.pump_stopped";
    pub const DELIVERY_DROPPED: &str = "ingest.delivery_dropped";
}
