pub mod checkin;
pub mod code_resolver;
pub mod eligibility;
pub mod ownership;
pub mod refund;

pub use checkin::{BatchScanResult, ScanInput, ScanRejection, TicketScanResult, TicketStateMachine};
pub use code_resolver::{ScanCode, TicketCodeResolver};
pub use eligibility::{validate_event_schedule, EligibilityWindowResolver, EventScheduleDraft};
pub use ownership::OwnershipGuard;
pub use refund::{RefundOutcome, RefundRequest, RefundTransactionCoordinator};
