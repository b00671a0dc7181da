pub mod command;
pub mod constant;
pub mod error;
pub mod event;
pub mod memory;
pub mod poll;
pub mod state;
