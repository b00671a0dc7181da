pub mod agent;
pub mod identity;
pub mod ledger;
