//! Postgres-backed [`TicketStore`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::debug;

use super::{
    parse_status, LockedReport, LockedTicket, RefundUnit, StoreResult, TicketStore,
};
use crate::models::{EventWindow, OffsetOverride, ReportDecision, ScanDirection, ScanTarget};

#[derive(FromRow)]
struct ScanTargetRow {
    ticket_id: i64,
    status: String,
    check_in_time: Option<DateTime<Utc>>,
    check_out_time: Option<DateTime<Utc>>,
    event_id: i64,
    event_name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    checkin_offset_minutes: Option<i32>,
    checkout_offset_minutes: Option<i32>,
}

impl ScanTargetRow {
    fn into_target(self) -> StoreResult<ScanTarget> {
        Ok(ScanTarget {
            ticket_id: self.ticket_id,
            status: parse_status(&self.status)?,
            check_in_time: self.check_in_time,
            check_out_time: self.check_out_time,
            event_id: self.event_id,
            event_name: self.event_name,
            window: EventWindow {
                start_time: self.start_time,
                end_time: self.end_time,
                checkin_override: OffsetOverride::from_raw(self.checkin_offset_minutes),
                checkout_override: OffsetOverride::from_raw(self.checkout_offset_minutes),
            },
        })
    }
}

#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgTicketStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Starts a transaction whose lock waits are bounded by `lock_timeout`.
    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        // SET cannot take bind parameters; the value is an integer we own.
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement).execute(&mut *tx).await?;
        Ok(tx)
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn find_ticket_by_code(&self, code: &str) -> StoreResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM tickets WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn find_ticket_by_seat(
        &self,
        event_id: i64,
        seat_id: i64,
        bill_id: i64,
    ) -> StoreResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM tickets
            WHERE event_id = $1 AND seat_id = $2 AND bill_id = $3
            "#,
        )
        .bind(event_id)
        .bind(seat_id)
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn load_scan_target(&self, ticket_id: i64) -> StoreResult<Option<ScanTarget>> {
        let row = sqlx::query_as::<_, ScanTargetRow>(
            r#"
            SELECT t.id AS ticket_id, t.status, t.check_in_time, t.check_out_time,
                   e.id AS event_id, e.name AS event_name, e.start_time, e.end_time,
                   e.checkin_offset_minutes, e.checkout_offset_minutes
            FROM tickets t
            JOIN events e ON e.id = t.event_id
            WHERE t.id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScanTargetRow::into_target).transpose()
    }

    async fn event_organizer(&self, event_id: i64) -> StoreResult<Option<i64>> {
        let organizer = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT requester_id
            FROM event_requests
            WHERE created_event_id = $1 AND status = 'APPROVED'
            ORDER BY processed_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(organizer)
    }

    async fn transition_ticket(
        &self,
        ticket_id: i64,
        direction: ScanDirection,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let statement = match direction {
            ScanDirection::CheckIn => {
                "UPDATE tickets SET status = $2, check_in_time = $3 WHERE id = $1 AND status = $4"
            }
            ScanDirection::CheckOut => {
                "UPDATE tickets SET status = $2, check_out_time = $3 WHERE id = $1 AND status = $4"
            }
        };

        let mut tx = self.begin().await?;
        let result = sqlx::query(statement)
            .bind(ticket_id)
            .bind(direction.to_status().as_str())
            .bind(at)
            .bind(direction.from_status().as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(ticket_id, rows = result.rows_affected(), "Conditional ticket transition");
        Ok(result.rows_affected() == 1)
    }

    async fn begin_refund(&self) -> StoreResult<Box<dyn RefundUnit>> {
        let tx = self.begin().await?;
        Ok(Box::new(PgRefundUnit { tx }))
    }
}

struct PgRefundUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RefundUnit for PgRefundUnit {
    async fn lock_report(&mut self, report_id: i64) -> StoreResult<Option<LockedReport>> {
        let row = sqlx::query_as::<_, (i64, i64, String)>(
            r#"
            SELECT user_id, ticket_id, status
            FROM reports
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(report_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|(user_id, ticket_id, status)| -> StoreResult<LockedReport> {
            Ok(LockedReport {
                id: report_id,
                user_id,
                ticket_id,
                status: parse_status(&status)?,
            })
        })
        .transpose()
    }

    async fn lock_ticket(&mut self, ticket_id: i64) -> StoreResult<Option<LockedTicket>> {
        let row = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, category_id
            FROM tickets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|(status, category_id)| -> StoreResult<LockedTicket> {
            Ok(LockedTicket {
                id: ticket_id,
                status: parse_status(&status)?,
                category_id,
            })
        })
        .transpose()
    }

    async fn category_price(&mut self, category_id: i64) -> StoreResult<Option<Decimal>> {
        let price = sqlx::query_scalar::<_, Decimal>(
            "SELECT price FROM ticket_categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(price)
    }

    async fn credit_wallet(&mut self, user_id: i64, amount: Decimal) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE users SET wallet_balance = wallet_balance + $2 WHERE id = $1",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_ticket_refunded(&mut self, ticket_id: i64) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'REFUNDED' WHERE id = $1 AND status = 'CHECKED_IN'",
        )
        .bind(ticket_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn reject_report(
        &mut self,
        report_id: i64,
        decision: &ReportDecision,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'REJECTED', processed_by = $2, processed_at = $3, staff_note = $4
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(report_id)
        .bind(decision.processed_by)
        .bind(decision.processed_at)
        .bind(decision.staff_note.as_deref())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn approve_report(
        &mut self,
        report_id: i64,
        refund_amount: Decimal,
        decision: &ReportDecision,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'APPROVED', refund_amount = $2,
                processed_by = $3, processed_at = $4, staff_note = $5
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(report_id)
        .bind(refund_amount)
        .bind(decision.processed_by)
        .bind(decision.processed_at)
        .bind(decision.staff_note.as_deref())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
