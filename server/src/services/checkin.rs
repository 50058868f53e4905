//! Check-in/check-out transition engine.
//!
//! A scan runs in two phases. Every ticket is first judged on reads alone,
//! so a storage failure there fails the request before anything is written.
//! Eligible tickets are then committed one by one: a batch may partially
//! succeed. The read that produces a precise rejection message is advisory;
//! the conditional write is what decides the winner when several stations
//! scan the same ticket at once.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::CheckinWindowStore;
use crate::models::{ScanDirection, ScanTarget, TicketStatus};
use crate::services::code_resolver::{ScanCode, TicketCodeResolver};
use crate::services::eligibility::{EligibilityWindowResolver, WindowCheck};
use crate::services::ownership::OwnershipGuard;
use crate::store::{StoreError, TicketStore};
use crate::utils::error::AppError;

/// Timestamps in messages are shown in Vietnam time (UTC+7, no DST).
const DISPLAY_OFFSET_SECS: i32 = 7 * 3600;

/// What a scanning station submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    Code(String),
    TicketId(i64),
}

/// Why a single ticket was not transitioned. Display text is shown to the
/// station operator as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanRejection {
    #[error("Không tìm thấy vé")]
    NotFound,

    #[error("Bạn không phải ban tổ chức của sự kiện \"{event_name}\", không thể xử lý vé này")]
    Forbidden { event_name: String },

    #[error("{reason}")]
    InvalidState { reason: String },

    #[error("{}", already_processed_message(.direction, .at))]
    AlreadyProcessed {
        direction: ScanDirection,
        at: Option<DateTime<Utc>>,
    },

    #[error("Chưa đến giờ {}, vui lòng quay lại sau {remaining_minutes} phút", label_of(.direction))]
    TooEarly {
        direction: ScanDirection,
        remaining_minutes: i64,
    },

    #[error("Sự kiện đã kết thúc")]
    EventEnded,

    #[error("Vé vừa được xử lý bởi một thiết bị khác, vui lòng quét lại để kiểm tra trạng thái")]
    RaceLost,

    /// Storage failed after earlier tickets of the same batch were committed.
    #[error("Lỗi hệ thống khi cập nhật vé, vui lòng quét lại vé này")]
    StorageFailure,
}

impl ScanRejection {
    pub fn code(&self) -> &'static str {
        match self {
            ScanRejection::NotFound => "NOT_FOUND",
            ScanRejection::Forbidden { .. } => "FORBIDDEN",
            ScanRejection::InvalidState { .. } => "INVALID_STATE",
            ScanRejection::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            ScanRejection::TooEarly { .. } => "TOO_EARLY",
            ScanRejection::EventEnded => "EVENT_ENDED",
            ScanRejection::RaceLost => "RACE_LOST",
            ScanRejection::StorageFailure => "INFRASTRUCTURE_ERROR",
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        ScanRejection::InvalidState {
            reason: reason.into(),
        }
    }
}

fn label_of(direction: &ScanDirection) -> &'static str {
    direction.label()
}

fn already_processed_message(direction: &ScanDirection, at: &Option<DateTime<Utc>>) -> String {
    match *at {
        Some(at) => format!("Vé đã {} lúc {}", direction.label(), display_time(at)),
        None => format!("Vé đã {} trước đó", direction.label()),
    }
}

pub fn display_time(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(DISPLAY_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset).format("%H:%M %d/%m/%Y").to_string(),
        None => at.format("%H:%M %d/%m/%Y UTC").to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketScanResult {
    pub ticket_id: i64,
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
    #[serde(skip)]
    pub rejection: Option<ScanRejection>,
}

impl TicketScanResult {
    fn accepted(
        ticket_id: i64,
        direction: ScanDirection,
        check_in_time: Option<DateTime<Utc>>,
        check_out_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            ticket_id,
            success: true,
            code: "SUCCESS",
            message: format!("{} thành công", capitalized(direction)),
            check_in_time,
            check_out_time,
            remaining_minutes: None,
            rejection: None,
        }
    }

    fn rejected(ticket_id: i64, rejection: ScanRejection, target: Option<&ScanTarget>) -> Self {
        let remaining_minutes = match &rejection {
            ScanRejection::TooEarly {
                remaining_minutes, ..
            } => Some(*remaining_minutes),
            _ => None,
        };
        Self {
            ticket_id,
            success: false,
            code: rejection.code(),
            message: rejection.to_string(),
            check_in_time: target.and_then(|t| t.check_in_time),
            check_out_time: target.and_then(|t| t.check_out_time),
            remaining_minutes,
            rejection: Some(rejection),
        }
    }
}

fn capitalized(direction: ScanDirection) -> &'static str {
    match direction {
        ScanDirection::CheckIn => "Check-in",
        ScanDirection::CheckOut => "Check-out",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScanResult {
    pub results: Vec<TicketScanResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchScanResult {
    fn from_results(results: Vec<TicketScanResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;
        Self {
            results,
            success_count,
            failure_count,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0 && !self.results.is_empty()
    }

    /// One-line summary for the response envelope.
    pub fn summary(&self, direction: ScanDirection) -> String {
        match (self.results.as_slice(), self.failure_count) {
            ([single], _) => single.message.clone(),
            (_, 0) => format!(
                "{} thành công {} vé",
                capitalized(direction),
                self.success_count
            ),
            (all, _) => format!(
                "{}/{} vé {} thành công",
                self.success_count,
                all.len(),
                direction.label()
            ),
        }
    }
}

#[derive(Clone)]
pub struct TicketStateMachine {
    store: Arc<dyn TicketStore>,
    windows: Arc<CheckinWindowStore>,
    codes: TicketCodeResolver,
    ownership: OwnershipGuard,
}

impl TicketStateMachine {
    pub fn new(store: Arc<dyn TicketStore>, windows: Arc<CheckinWindowStore>) -> Self {
        Self {
            codes: TicketCodeResolver::new(store.clone()),
            ownership: OwnershipGuard::new(store.clone()),
            store,
            windows,
        }
    }

    pub async fn check_in(
        &self,
        actor_id: i64,
        input: &ScanInput,
        now: DateTime<Utc>,
    ) -> Result<BatchScanResult, AppError> {
        self.scan(ScanDirection::CheckIn, actor_id, input, now).await
    }

    pub async fn check_out(
        &self,
        actor_id: i64,
        input: &ScanInput,
        now: DateTime<Utc>,
    ) -> Result<BatchScanResult, AppError> {
        self.scan(ScanDirection::CheckOut, actor_id, input, now).await
    }

    /// Business rejections become per-ticket results. An unrecognised code,
    /// malformed input or a storage failure before the first commit fails the
    /// whole request; a storage failure after it is reported per ticket.
    pub async fn scan(
        &self,
        direction: ScanDirection,
        actor_id: i64,
        input: &ScanInput,
        now: DateTime<Utc>,
    ) -> Result<BatchScanResult, AppError> {
        let ticket_ids = match input {
            ScanInput::TicketId(id) if *id > 0 => vec![*id],
            ScanInput::TicketId(id) => {
                return Err(AppError::ValidationError(format!("ID vé không hợp lệ: {id}")))
            }
            ScanInput::Code(raw) => {
                let code = ScanCode::parse(raw)
                    .map_err(|e| AppError::ValidationError(e.to_string()))?;
                self.codes.resolve(&code).await?
            }
        };
        if ticket_ids.is_empty() {
            return Err(AppError::NotFound(
                "Không tìm thấy vé ứng với mã đã quét".to_string(),
            ));
        }

        // One snapshot of the global defaults for the whole batch.
        let resolver = EligibilityWindowResolver::new(self.windows.snapshot());

        let mut verdicts = Vec::with_capacity(ticket_ids.len());
        for ticket_id in ticket_ids {
            verdicts.push(self.judge(direction, actor_id, ticket_id, &resolver, now).await?);
        }

        let mut results = Vec::with_capacity(verdicts.len());
        let mut committed = 0usize;
        for verdict in verdicts {
            let target = match verdict {
                Verdict::Rejected(result) => {
                    results.push(result);
                    continue;
                }
                Verdict::Eligible(target) => target,
            };
            match self.commit(direction, actor_id, &target, now).await {
                Ok(result) => {
                    committed += usize::from(result.success);
                    results.push(result);
                }
                Err(e) if committed == 0 => return Err(e.into()),
                Err(e) => {
                    error!(
                        ticket_id = target.ticket_id,
                        error = %e,
                        "Ticket update failed after part of the batch was committed"
                    );
                    results.push(TicketScanResult::rejected(
                        target.ticket_id,
                        ScanRejection::StorageFailure,
                        None,
                    ));
                }
            }
        }

        let batch = BatchScanResult::from_results(results);
        info!(
            actor_id,
            direction = direction.label(),
            succeeded = batch.success_count,
            failed = batch.failure_count,
            "Processed ticket scan"
        );
        Ok(batch)
    }

    /// Read-only judgement of one ticket.
    async fn judge(
        &self,
        direction: ScanDirection,
        actor_id: i64,
        ticket_id: i64,
        resolver: &EligibilityWindowResolver,
        now: DateTime<Utc>,
    ) -> Result<Verdict, StoreError> {
        let Some(target) = self.store.load_scan_target(ticket_id).await? else {
            return Ok(Verdict::rejected(ticket_id, ScanRejection::NotFound, None));
        };

        if !self.ownership.verify(actor_id, target.event_id).await? {
            let rejection = ScanRejection::Forbidden {
                event_name: target.event_name.clone(),
            };
            return Ok(Verdict::rejected(ticket_id, rejection, None));
        }

        if let Err(rejection) = check_status(direction, &target) {
            return Ok(Verdict::rejected(ticket_id, rejection, Some(&target)));
        }

        let rejection = match resolver.window_for(direction, &target.window).check(now) {
            WindowCheck::Open => return Ok(Verdict::Eligible(target)),
            WindowCheck::TooEarly { remaining_minutes } => ScanRejection::TooEarly {
                direction,
                remaining_minutes,
            },
            WindowCheck::Ended => ScanRejection::EventEnded,
        };
        Ok(Verdict::rejected(ticket_id, rejection, Some(&target)))
    }

    async fn commit(
        &self,
        direction: ScanDirection,
        actor_id: i64,
        target: &ScanTarget,
        now: DateTime<Utc>,
    ) -> Result<TicketScanResult, StoreError> {
        let ticket_id = target.ticket_id;
        if !self.store.transition_ticket(ticket_id, direction, now).await? {
            warn!(
                ticket_id,
                actor_id,
                direction = direction.label(),
                "Conditional ticket update lost to a concurrent scan"
            );
            return Ok(TicketScanResult::rejected(ticket_id, ScanRejection::RaceLost, None));
        }

        info!(ticket_id, actor_id, direction = direction.label(), "Ticket transitioned");
        let result = match direction {
            ScanDirection::CheckIn => TicketScanResult::accepted(ticket_id, direction, Some(now), None),
            ScanDirection::CheckOut => {
                TicketScanResult::accepted(ticket_id, direction, target.check_in_time, Some(now))
            }
        };
        Ok(result)
    }
}

enum Verdict {
    Eligible(ScanTarget),
    Rejected(TicketScanResult),
}

impl Verdict {
    fn rejected(ticket_id: i64, rejection: ScanRejection, target: Option<&ScanTarget>) -> Self {
        Verdict::Rejected(TicketScanResult::rejected(ticket_id, rejection, target))
    }
}

/// Lifecycle precondition of a scan, judged on a possibly stale read.
fn check_status(direction: ScanDirection, target: &ScanTarget) -> Result<(), ScanRejection> {
    use ScanDirection::{CheckIn, CheckOut};
    use TicketStatus::*;

    if target.status.can_transition_to(direction.to_status()) {
        return Ok(());
    }
    match (direction, target.status) {
        (_, Cancelled) => Err(ScanRejection::invalid("Vé đã bị hủy")),
        (_, Refunded) => Err(ScanRejection::invalid("Vé đã được hoàn tiền")),
        (CheckIn, CheckedIn) => Err(ScanRejection::AlreadyProcessed {
            direction,
            at: target.check_in_time,
        }),
        (CheckIn, CheckedOut) => Err(ScanRejection::invalid(
            "Vé đã check-out khỏi sự kiện, không thể check-in lại",
        )),
        (CheckOut, CheckedOut) => Err(ScanRejection::AlreadyProcessed {
            direction,
            at: target.check_out_time,
        }),
        (CheckOut, Booked) => Err(ScanRejection::invalid("Vé chưa check-in, không thể check-out")),
        (_, status) => Err(ScanRejection::invalid(format!(
            "Trạng thái vé không hợp lệ: {status}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventWindow, OffsetOverride};
    use chrono::TimeZone;

    fn target(status: TicketStatus) -> ScanTarget {
        let start = Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap();
        ScanTarget {
            ticket_id: 1,
            status,
            check_in_time: Some(Utc.with_ymd_and_hms(2026, 6, 1, 6, 5, 0).unwrap()),
            check_out_time: None,
            event_id: 1,
            event_name: "Hòa nhạc".to_string(),
            window: EventWindow {
                start_time: start,
                end_time: start + chrono::Duration::hours(4),
                checkin_override: OffsetOverride::from_raw(None),
                checkout_override: None,
            },
        }
    }

    #[test]
    fn test_check_in_preconditions() {
        assert!(check_status(ScanDirection::CheckIn, &target(TicketStatus::Booked)).is_ok());
        assert_eq!(
            check_status(ScanDirection::CheckIn, &target(TicketStatus::CheckedIn))
                .unwrap_err()
                .code(),
            "ALREADY_PROCESSED"
        );
        for status in [
            TicketStatus::Cancelled,
            TicketStatus::CheckedOut,
            TicketStatus::Refunded,
        ] {
            assert_eq!(
                check_status(ScanDirection::CheckIn, &target(status)).unwrap_err().code(),
                "INVALID_STATE"
            );
        }
    }

    #[test]
    fn test_check_out_preconditions() {
        assert!(check_status(ScanDirection::CheckOut, &target(TicketStatus::CheckedIn)).is_ok());
        assert_eq!(
            check_status(ScanDirection::CheckOut, &target(TicketStatus::CheckedOut))
                .unwrap_err()
                .code(),
            "ALREADY_PROCESSED"
        );
        assert_eq!(
            check_status(ScanDirection::CheckOut, &target(TicketStatus::Booked))
                .unwrap_err()
                .code(),
            "INVALID_STATE"
        );
    }

    #[test]
    fn test_duplicate_message_shows_prior_time_in_local_time() {
        let rejection =
            check_status(ScanDirection::CheckIn, &target(TicketStatus::CheckedIn)).unwrap_err();
        assert_eq!(rejection.to_string(), "Vé đã check-in lúc 13:05 01/06/2026");
    }

    #[test]
    fn test_too_early_message_has_countdown() {
        let rejection = ScanRejection::TooEarly {
            direction: ScanDirection::CheckIn,
            remaining_minutes: 1,
        };
        assert_eq!(
            rejection.to_string(),
            "Chưa đến giờ check-in, vui lòng quay lại sau 1 phút"
        );
    }
}
