pub mod category;
pub mod orchestrator;

pub use category::resolve_category_id;
pub use orchestrator::{SettlementOrchestrator, SettlementOutcome, SettlementRequest};
