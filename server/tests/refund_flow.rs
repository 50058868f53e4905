mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use checkin_server::models::{ReportAction, TicketStatus};
use checkin_server::services::{RefundRequest, RefundTransactionCoordinator};
use checkin_server::store::{MemoryStore, RefundUnit, TicketStore};
use checkin_server::utils::error::AppError;

use common::*;

const REPORT: i64 = 7;
const TICKET: i64 = 42;

fn coordinator(store: &MemoryStore) -> RefundTransactionCoordinator {
    RefundTransactionCoordinator::new(Arc::new(store.clone()))
}

fn request(action: ReportAction) -> RefundRequest {
    RefundRequest {
        report_id: REPORT,
        staff_id: STAFF,
        action,
        staff_note: Some("Khách không vào được khu vực ghế".to_string()),
    }
}

async fn store_with_report(ticket_status: TicketStatus) -> MemoryStore {
    let store = seeded_store().await;
    store.insert_ticket(ticket(TICKET, CONCERT, ticket_status)).await;
    store.insert_report(pending_report(REPORT, TICKET)).await;
    store
}

async fn assert_untouched(store: &MemoryStore, ticket_status: &str) {
    assert_eq!(store.user(ATTENDEE).await.unwrap().wallet_balance, Decimal::ZERO);
    assert_eq!(store.ticket(TICKET).await.unwrap().status, ticket_status);
    let report = store.report(REPORT).await.unwrap();
    assert_eq!(report.status, "PENDING");
    assert_eq!(report.refund_amount, None);
    assert_eq!(report.processed_by, None);
}

#[tokio::test]
async fn test_approve_checked_in_ticket_credits_category_price() {
    let store = store_with_report(TicketStatus::CheckedIn).await;

    let outcome = coordinator(&store)
        .process(request(ReportAction::Approve), at(20, 0))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.refund_amount, Some(price()));
    assert_eq!(store.user(ATTENDEE).await.unwrap().wallet_balance, price());
    assert_eq!(store.ticket(TICKET).await.unwrap().status, "REFUNDED");

    let report = store.report(REPORT).await.unwrap();
    assert_eq!(report.status, "APPROVED");
    assert_eq!(report.refund_amount, Some(Decimal::new(150_000, 0)));
    assert_eq!(report.processed_by, Some(STAFF));
    assert_eq!(report.processed_at, Some(at(20, 0)));
    assert_eq!(
        report.staff_note.as_deref(),
        Some("Khách không vào được khu vực ghế")
    );
}

#[tokio::test]
async fn test_refund_uses_price_at_approval_time_and_adds_to_balance() {
    let store = store_with_report(TicketStatus::CheckedIn).await;
    let mut user = store.user(ATTENDEE).await.unwrap();
    user.wallet_balance = Decimal::new(25_000, 0);
    store.insert_user(user).await;
    store
        .set_category_price(STANDARD_CATEGORY, Decimal::new(180_000, 0))
        .await;

    let outcome = coordinator(&store)
        .process(request(ReportAction::Approve), at(20, 0))
        .await
        .unwrap();

    assert_eq!(outcome.refund_amount, Some(Decimal::new(180_000, 0)));
    assert_eq!(
        store.user(ATTENDEE).await.unwrap().wallet_balance,
        Decimal::new(205_000, 0)
    );
}

#[tokio::test]
async fn test_approve_requires_checked_in_ticket() {
    for status in [
        TicketStatus::Booked,
        TicketStatus::CheckedOut,
        TicketStatus::Cancelled,
        TicketStatus::Refunded,
    ] {
        let store = store_with_report(status).await;

        let outcome = coordinator(&store)
            .process(request(ReportAction::Approve), at(20, 0))
            .await
            .unwrap();

        assert!(!outcome.success, "approval must fail for {status}");
        assert_eq!(outcome.message, "Chỉ vé đã check-in mới được hoàn tiền");
        assert_eq!(outcome.refund_amount, None);
        assert_untouched(&store, status.as_str()).await;
    }
}

#[tokio::test]
async fn test_reject_touches_only_the_report() {
    let store = store_with_report(TicketStatus::CheckedIn).await;

    let outcome = coordinator(&store)
        .process(request(ReportAction::Reject), at(20, 0))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.refund_amount, None);
    assert_eq!(store.user(ATTENDEE).await.unwrap().wallet_balance, Decimal::ZERO);
    assert_eq!(store.ticket(TICKET).await.unwrap().status, "CHECKED_IN");

    let report = store.report(REPORT).await.unwrap();
    assert_eq!(report.status, "REJECTED");
    assert_eq!(report.refund_amount, None);
    assert_eq!(report.processed_by, Some(STAFF));
}

#[tokio::test]
async fn test_processed_report_cannot_be_processed_again() {
    for first in [ReportAction::Approve, ReportAction::Reject] {
        let store = store_with_report(TicketStatus::CheckedIn).await;
        let refunds = coordinator(&store);
        refunds.process(request(first), at(20, 0)).await.unwrap();

        let wallet = store.user(ATTENDEE).await.unwrap().wallet_balance;
        let report = store.report(REPORT).await.unwrap();
        let ticket_status = store.ticket(TICKET).await.unwrap().status;

        for second in [ReportAction::Approve, ReportAction::Reject] {
            let outcome = refunds.process(request(second), at(21, 0)).await.unwrap();
            assert!(!outcome.success);
            assert_eq!(outcome.message, "Báo cáo đã được xử lý trước đó");
        }

        assert_eq!(store.user(ATTENDEE).await.unwrap().wallet_balance, wallet);
        assert_eq!(store.ticket(TICKET).await.unwrap().status, ticket_status);
        let after = store.report(REPORT).await.unwrap();
        assert_eq!(after.status, report.status);
        assert_eq!(after.processed_at, report.processed_at);
    }
}

#[tokio::test]
async fn test_unknown_report_is_refused() {
    let store = seeded_store().await;
    let mut req = request(ReportAction::Approve);
    req.report_id = 999;

    let outcome = coordinator(&store).process(req, at(20, 0)).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Không tìm thấy báo cáo");
}

#[tokio::test]
async fn test_failed_step_rolls_back_earlier_writes() {
    // The ticket is refundable, but the report was filed by a user without a
    // wallet row, so crediting affects zero rows.
    let store = store_with_report(TicketStatus::CheckedIn).await;
    let mut orphan = pending_report(REPORT, TICKET);
    orphan.user_id = 404;
    store.insert_report(orphan).await;

    let outcome = coordinator(&store)
        .process(request(ReportAction::Approve), at(20, 0))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.message, "Không thể cộng tiền vào ví người dùng");
    assert_untouched(&store, "CHECKED_IN").await;
}

#[tokio::test]
async fn test_lock_timeout_is_a_retryable_failure_without_writes() {
    let store = store_with_report(TicketStatus::CheckedIn).await;

    // Another coordinator is mid-transaction on the same rows.
    let held = store.begin_refund().await.unwrap();

    let err = coordinator(&store)
        .process(request(ReportAction::Approve), at(20, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
    assert!(err.is_retryable());

    held.rollback().await.unwrap();
    assert_untouched(&store, "CHECKED_IN").await;
}

#[tokio::test]
async fn test_concurrent_approvals_credit_once() {
    let store = store_with_report(TicketStatus::CheckedIn).await;
    let refunds = coordinator(&store);

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let refunds = refunds.clone();
            tokio::spawn(async move { refunds.process(request(ReportAction::Approve), at(20, 0)).await })
        })
        .collect();

    let mut approved = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(outcome) if outcome.success => approved += 1,
            Ok(_) | Err(AppError::Unavailable(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(approved, 1);
    assert_eq!(store.user(ATTENDEE).await.unwrap().wallet_balance, price());
}
