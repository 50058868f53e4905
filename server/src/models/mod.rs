pub mod event;
pub mod report;
pub mod ticket;
pub mod user;

pub use event::{Event, EventWindow, OffsetOverride};
pub use report::{Report, ReportAction, ReportDecision, ReportStatus};
pub use ticket::{ScanDirection, ScanTarget, Ticket, TicketCategory, TicketStatus};
pub use user::User;
