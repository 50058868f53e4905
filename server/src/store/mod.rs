//! Persistent store contract for the check-in and refund workflows.
//!
//! Storage is the only synchronisation point between scanning stations:
//! ticket transitions are conditional writes, and refunds run inside one
//! [`RefundUnit`] holding row locks on a report and its ticket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{ReportDecision, ReportStatus, ScanDirection, ScanTarget, TicketStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgTicketStore;

/// Postgres `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("timed out waiting for a row lock")]
    LockTimeout,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
                StoreError::LockTimeout
            }
            _ => StoreError::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A report row as read under its exclusive lock.
#[derive(Debug, Clone)]
pub struct LockedReport {
    pub id: i64,
    pub user_id: i64,
    pub ticket_id: i64,
    pub status: ReportStatus,
}

/// A ticket row as read under its exclusive lock.
#[derive(Debug, Clone)]
pub struct LockedTicket {
    pub id: i64,
    pub status: TicketStatus,
    pub category_id: i64,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn find_ticket_by_code(&self, code: &str) -> StoreResult<Option<i64>>;

    async fn find_ticket_by_seat(
        &self,
        event_id: i64,
        seat_id: i64,
        bill_id: i64,
    ) -> StoreResult<Option<i64>>;

    /// Unlocked read of a ticket and its event window. May be stale by the
    /// time the caller acts on it.
    async fn load_scan_target(&self, ticket_id: i64) -> StoreResult<Option<ScanTarget>>;

    /// Requester of the approved request that created the event, if any.
    async fn event_organizer(&self, event_id: i64) -> StoreResult<Option<i64>>;

    /// Moves the ticket along `direction` and stamps `at`, only if its stored
    /// status is still `direction.from_status()`. Returns whether this call
    /// performed the transition.
    async fn transition_ticket(
        &self,
        ticket_id: i64,
        direction: ScanDirection,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Opens the atomic unit used to settle one report.
    async fn begin_refund(&self) -> StoreResult<Box<dyn RefundUnit>>;
}

/// One all-or-nothing unit of work over reports, tickets and wallets.
///
/// Mutating methods return the number of rows they affected. Dropping the
/// unit without [`RefundUnit::commit`] discards every change.
#[async_trait]
pub trait RefundUnit: Send {
    async fn lock_report(&mut self, report_id: i64) -> StoreResult<Option<LockedReport>>;

    async fn lock_ticket(&mut self, ticket_id: i64) -> StoreResult<Option<LockedTicket>>;

    async fn category_price(&mut self, category_id: i64) -> StoreResult<Option<Decimal>>;

    async fn credit_wallet(&mut self, user_id: i64, amount: Decimal) -> StoreResult<u64>;

    /// `CHECKED_IN → REFUNDED`, guarded on the current status.
    async fn mark_ticket_refunded(&mut self, ticket_id: i64) -> StoreResult<u64>;

    async fn reject_report(&mut self, report_id: i64, decision: &ReportDecision)
        -> StoreResult<u64>;

    async fn approve_report(
        &mut self,
        report_id: i64,
        refund_amount: Decimal,
        decision: &ReportDecision,
    ) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

fn parse_status<T>(raw: &str) -> StoreResult<T>
where
    T: std::str::FromStr<Err = crate::models::ticket::UnknownStatus>,
{
    raw.parse::<T>().map_err(|e| StoreError::Corrupt(e.to_string()))
}
