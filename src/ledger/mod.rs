pub mod models;
pub mod repository;

pub use models::{NewPayment, Payment, PaymentStatus, UpsertOutcome};
pub use repository::LedgerRepository;
