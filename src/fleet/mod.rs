pub mod client;
pub mod models;
pub mod retry;

pub use client::{FleetApi, FleetClient};
pub use models::{DriverIdentity, TopupOrder};
