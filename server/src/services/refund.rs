//! Settlement of refund reports.
//!
//! A report is decided exactly once. Approval credits the reporter's wallet
//! with the ticket's current category price, marks the ticket refunded and
//! the report approved, all inside one [`RefundUnit`]: either every write
//! lands or none does.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{ReportAction, ReportDecision, ReportStatus, TicketStatus};
use crate::store::{RefundUnit, StoreResult, TicketStore};
use crate::utils::error::AppError;

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub report_id: i64,
    pub staff_id: i64,
    pub action: ReportAction,
    pub staff_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Decimal>,
}

impl RefundOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            refund_amount: None,
        }
    }
}

#[derive(Clone)]
pub struct RefundTransactionCoordinator {
    store: Arc<dyn TicketStore>,
}

impl RefundTransactionCoordinator {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Business refusals come back as an unsuccessful [`RefundOutcome`] with
    /// nothing written. Storage failures, including lock timeouts, are errors;
    /// the unit is dropped uncommitted and rolls back.
    pub async fn process(
        &self,
        request: RefundRequest,
        now: DateTime<Utc>,
    ) -> Result<RefundOutcome, AppError> {
        let mut unit = self.store.begin_refund().await?;

        let Some(report) = unit.lock_report(request.report_id).await? else {
            return abort(unit, request.report_id, "Không tìm thấy báo cáo").await;
        };
        if report.status != ReportStatus::Pending {
            return abort(unit, report.id, "Báo cáo đã được xử lý trước đó").await;
        }

        let decision = ReportDecision {
            processed_by: request.staff_id,
            processed_at: now,
            staff_note: request.staff_note,
        };

        match request.action {
            ReportAction::Reject => {
                if unit.reject_report(report.id, &decision).await? == 0 {
                    return abort(unit, report.id, "Không thể cập nhật trạng thái báo cáo").await;
                }
                unit.commit().await?;
                info!(report_id = report.id, staff_id = decision.processed_by, "Report rejected");
                Ok(RefundOutcome {
                    success: true,
                    message: "Đã từ chối báo cáo".to_string(),
                    refund_amount: None,
                })
            }
            ReportAction::Approve => {
                let Some(ticket) = unit.lock_ticket(report.ticket_id).await? else {
                    return abort(unit, report.id, "Không tìm thấy vé của báo cáo").await;
                };
                if !ticket.status.can_transition_to(TicketStatus::Refunded) {
                    return abort(
                        unit,
                        report.id,
                        "Chỉ vé đã check-in mới được hoàn tiền",
                    )
                    .await;
                }
                let Some(amount) = unit.category_price(ticket.category_id).await? else {
                    return abort(unit, report.id, "Không tìm thấy hạng vé để tính tiền hoàn").await;
                };

                if unit.credit_wallet(report.user_id, amount).await? == 0 {
                    return abort(unit, report.id, "Không thể cộng tiền vào ví người dùng").await;
                }
                if unit.mark_ticket_refunded(ticket.id).await? == 0 {
                    return abort(unit, report.id, "Không thể cập nhật trạng thái vé").await;
                }
                if unit.approve_report(report.id, amount, &decision).await? == 0 {
                    return abort(unit, report.id, "Không thể cập nhật trạng thái báo cáo").await;
                }
                unit.commit().await?;

                info!(
                    report_id = report.id,
                    ticket_id = ticket.id,
                    user_id = report.user_id,
                    staff_id = decision.processed_by,
                    %amount,
                    "Report approved and refund credited"
                );
                Ok(RefundOutcome {
                    success: true,
                    message: format!("Đã duyệt báo cáo và hoàn {amount} vào ví người dùng"),
                    refund_amount: Some(amount),
                })
            }
        }
    }
}

async fn abort(
    unit: Box<dyn RefundUnit>,
    report_id: i64,
    message: &str,
) -> Result<RefundOutcome, AppError> {
    rollback_quietly(unit).await;
    info!(report_id, reason = message, "Report processing refused");
    Ok(RefundOutcome::failed(message))
}

/// Rollback failures are logged only; the outcome is already decided.
async fn rollback_quietly(unit: Box<dyn RefundUnit>) {
    let result: StoreResult<()> = unit.rollback().await;
    if let Err(e) = result {
        warn!(error = %e, "Rollback of refund unit failed");
    }
}
