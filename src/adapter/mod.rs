pub mod http;
pub mod ledger;
pub mod simulated;
pub mod webhook;
