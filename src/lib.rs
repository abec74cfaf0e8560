pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fees;
pub mod fleet;
pub mod ledger;
pub mod notify;
pub mod server;
pub mod settlement;
