//! In-process [`TicketStore`] with the same transition and transaction
//! semantics as Postgres. One mutex stands in for row locks, so refund
//! units are serialised against every other write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use super::{
    parse_status, LockedReport, LockedTicket, RefundUnit, StoreError, StoreResult, TicketStore,
};
use crate::models::{
    Event, Report, ReportDecision, ReportStatus, ScanDirection, ScanTarget, Ticket,
    TicketCategory, TicketStatus, User,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    events: HashMap<i64, Event>,
    organizers: HashMap<i64, i64>,
    categories: HashMap<i64, TicketCategory>,
    users: HashMap<i64, User>,
    tickets: HashMap<i64, Ticket>,
    reports: HashMap<i64, Report>,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    async fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        tokio::time::timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| StoreError::LockTimeout)
    }

    async fn lock_owned(&self) -> StoreResult<OwnedMutexGuard<MemoryState>> {
        tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)
    }

    /// Registers an event and, when given, the organizer whose approved
    /// request created it.
    pub async fn insert_event(&self, event: Event, organizer_id: Option<i64>) {
        let mut state = self.state.lock().await;
        if let Some(organizer_id) = organizer_id {
            state.organizers.insert(event.id, organizer_id);
        }
        state.events.insert(event.id, event);
    }

    pub async fn insert_category(&self, category: TicketCategory) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    pub async fn set_category_price(&self, category_id: i64, price: Decimal) {
        if let Some(category) = self.state.lock().await.categories.get_mut(&category_id) {
            category.price = price;
        }
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_ticket(&self, ticket: Ticket) {
        self.state.lock().await.tickets.insert(ticket.id, ticket);
    }

    pub async fn insert_report(&self, report: Report) {
        self.state.lock().await.reports.insert(report.id, report);
    }

    pub async fn ticket(&self, id: i64) -> Option<Ticket> {
        self.state.lock().await.tickets.get(&id).cloned()
    }

    pub async fn report(&self, id: i64) -> Option<Report> {
        self.state.lock().await.reports.get(&id).cloned()
    }

    pub async fn user(&self, id: i64) -> Option<User> {
        self.state.lock().await.users.get(&id).cloned()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn find_ticket_by_code(&self, code: &str) -> StoreResult<Option<i64>> {
        let state = self.lock().await?;
        Ok(state
            .tickets
            .values()
            .find(|ticket| ticket.code == code)
            .map(|ticket| ticket.id))
    }

    async fn find_ticket_by_seat(
        &self,
        event_id: i64,
        seat_id: i64,
        bill_id: i64,
    ) -> StoreResult<Option<i64>> {
        let state = self.lock().await?;
        Ok(state
            .tickets
            .values()
            .find(|ticket| {
                ticket.event_id == event_id
                    && ticket.seat_id == Some(seat_id)
                    && ticket.bill_id == Some(bill_id)
            })
            .map(|ticket| ticket.id))
    }

    async fn load_scan_target(&self, ticket_id: i64) -> StoreResult<Option<ScanTarget>> {
        let state = self.lock().await?;
        let Some(ticket) = state.tickets.get(&ticket_id) else {
            return Ok(None);
        };
        let Some(event) = state.events.get(&ticket.event_id) else {
            return Ok(None);
        };

        Ok(Some(ScanTarget {
            ticket_id,
            status: parse_status(&ticket.status)?,
            check_in_time: ticket.check_in_time,
            check_out_time: ticket.check_out_time,
            event_id: event.id,
            event_name: event.name.clone(),
            window: event.window(),
        }))
    }

    async fn event_organizer(&self, event_id: i64) -> StoreResult<Option<i64>> {
        Ok(self.lock().await?.organizers.get(&event_id).copied())
    }

    async fn transition_ticket(
        &self,
        ticket_id: i64,
        direction: ScanDirection,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.lock().await?;
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(false);
        };
        if ticket.status != direction.from_status().as_str() {
            return Ok(false);
        }

        ticket.status = direction.to_status().as_str().to_string();
        match direction {
            ScanDirection::CheckIn => ticket.check_in_time = Some(at),
            ScanDirection::CheckOut => ticket.check_out_time = Some(at),
        }
        Ok(true)
    }

    async fn begin_refund(&self) -> StoreResult<Box<dyn RefundUnit>> {
        let guard = self.lock_owned().await?;
        let working = (*guard).clone();
        Ok(Box::new(MemoryRefundUnit { guard, working }))
    }
}

/// Holds the store mutex for its whole lifetime and mutates a private copy
/// that only replaces the shared state on commit.
struct MemoryRefundUnit {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl RefundUnit for MemoryRefundUnit {
    async fn lock_report(&mut self, report_id: i64) -> StoreResult<Option<LockedReport>> {
        self.working
            .reports
            .get(&report_id)
            .map(|report| -> StoreResult<LockedReport> {
                Ok(LockedReport {
                    id: report.id,
                    user_id: report.user_id,
                    ticket_id: report.ticket_id,
                    status: parse_status(&report.status)?,
                })
            })
            .transpose()
    }

    async fn lock_ticket(&mut self, ticket_id: i64) -> StoreResult<Option<LockedTicket>> {
        self.working
            .tickets
            .get(&ticket_id)
            .map(|ticket| -> StoreResult<LockedTicket> {
                Ok(LockedTicket {
                    id: ticket.id,
                    status: parse_status(&ticket.status)?,
                    category_id: ticket.category_id,
                })
            })
            .transpose()
    }

    async fn category_price(&mut self, category_id: i64) -> StoreResult<Option<Decimal>> {
        Ok(self
            .working
            .categories
            .get(&category_id)
            .map(|category| category.price))
    }

    async fn credit_wallet(&mut self, user_id: i64, amount: Decimal) -> StoreResult<u64> {
        match self.working.users.get_mut(&user_id) {
            Some(user) => {
                user.wallet_balance += amount;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_ticket_refunded(&mut self, ticket_id: i64) -> StoreResult<u64> {
        match self.working.tickets.get_mut(&ticket_id) {
            Some(ticket) if ticket.status == TicketStatus::CheckedIn.as_str() => {
                ticket.status = TicketStatus::Refunded.as_str().to_string();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn reject_report(
        &mut self,
        report_id: i64,
        decision: &ReportDecision,
    ) -> StoreResult<u64> {
        Ok(settle(&mut self.working, report_id, ReportStatus::Rejected, None, decision))
    }

    async fn approve_report(
        &mut self,
        report_id: i64,
        refund_amount: Decimal,
        decision: &ReportDecision,
    ) -> StoreResult<u64> {
        Ok(settle(
            &mut self.working,
            report_id,
            ReportStatus::Approved,
            Some(refund_amount),
            decision,
        ))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryRefundUnit { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

fn settle(
    state: &mut MemoryState,
    report_id: i64,
    status: ReportStatus,
    refund_amount: Option<Decimal>,
    decision: &ReportDecision,
) -> u64 {
    match state.reports.get_mut(&report_id) {
        Some(report) if report.status == ReportStatus::Pending.as_str() => {
            report.status = status.as_str().to_string();
            report.refund_amount = refund_amount;
            report.processed_by = Some(decision.processed_by);
            report.processed_at = Some(decision.processed_at);
            report.staff_note = decision.staff_note.clone();
            1
        }
        _ => 0,
    }
}
