//! Check-in/check-out time windows and the event schedule rules that keep
//! those windows meaningful.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::checkin_window::{CheckinWindowConfig, MAX_WINDOW_MINUTES};
use crate::models::{EventWindow, OffsetOverride, ScanDirection};

const MAX_EVENT_DURATION_DAYS: i64 = 7;

/// Resolves effective window offsets from a snapshot of the global defaults.
/// A positive per-event override always wins; otherwise the default applies.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityWindowResolver {
    defaults: CheckinWindowConfig,
}

impl EligibilityWindowResolver {
    pub fn new(defaults: CheckinWindowConfig) -> Self {
        Self { defaults }
    }

    pub fn resolve_checkin_offset(&self, event_override: Option<OffsetOverride>) -> u32 {
        event_override
            .map(|o| o.minutes())
            .unwrap_or(self.defaults.checkin_allowed_before_start_minutes)
    }

    pub fn resolve_checkout_offset(&self, event_override: Option<OffsetOverride>) -> u32 {
        event_override
            .map(|o| o.minutes())
            .unwrap_or(self.defaults.min_minutes_after_start_for_checkout)
    }

    /// `[start - checkin offset, end]`
    pub fn checkin_window(&self, event: &EventWindow) -> TimeWindow {
        let offset = self.resolve_checkin_offset(event.checkin_override);
        TimeWindow {
            opens_at: event.start_time - minutes(offset),
            closes_at: event.end_time,
        }
    }

    /// `[start + checkout offset, end]`
    pub fn checkout_window(&self, event: &EventWindow) -> TimeWindow {
        let offset = self.resolve_checkout_offset(event.checkout_override);
        TimeWindow {
            opens_at: event.start_time + minutes(offset),
            closes_at: event.end_time,
        }
    }

    pub fn window_for(&self, direction: ScanDirection, event: &EventWindow) -> TimeWindow {
        match direction {
            ScanDirection::CheckIn => self.checkin_window(event),
            ScanDirection::CheckOut => self.checkout_window(event),
        }
    }
}

fn minutes(m: u32) -> Duration {
    Duration::minutes(i64::from(m))
}

/// Closed interval during which a scan is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCheck {
    Open,
    TooEarly { remaining_minutes: i64 },
    Ended,
}

impl TimeWindow {
    pub fn check(&self, now: DateTime<Utc>) -> WindowCheck {
        if now < self.opens_at {
            WindowCheck::TooEarly {
                remaining_minutes: minutes_until(now, self.opens_at),
            }
        } else if now > self.closes_at {
            WindowCheck::Ended
        } else {
            WindowCheck::Open
        }
    }
}

/// Whole minutes left until `then`, rounded up so a countdown never shows 0
/// while the window is still closed.
fn minutes_until(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    let millis = (then - now).num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}

/// Schedule submitted when an event is created or rescheduled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventScheduleDraft {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub checkin_offset_minutes: Option<i32>,
    #[serde(default)]
    pub checkout_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Thời gian kết thúc phải sau thời gian bắt đầu")]
    EndNotAfterStart,

    #[error("Thời gian bắt đầu không được ở trong quá khứ")]
    StartsInPast,

    #[error("Sự kiện không được kéo dài quá {0} ngày")]
    TooLong(i64),

    #[error("Số phút cho phép check-in sớm phải nằm trong khoảng 0-{max}, nhận được {value}")]
    CheckinOffsetOutOfRange { value: i32, max: i64 },

    #[error("Số phút tối thiểu trước khi check-out phải nằm trong khoảng 0-{max}, nhận được {value}")]
    CheckoutOffsetOutOfRange { value: i32, max: i64 },

    #[error("Check-out mở sau {offset} phút nhưng sự kiện chỉ kéo dài {duration} phút")]
    CheckoutNeverOpens { offset: u32, duration: i64 },
}

/// Validates a schedule against the same window semantics used at scan
/// time and returns the normalised window facet.
pub fn validate_event_schedule(
    draft: &EventScheduleDraft,
    resolver: &EligibilityWindowResolver,
    now: DateTime<Utc>,
) -> Result<EventWindow, ScheduleError> {
    if draft.end_time <= draft.start_time {
        return Err(ScheduleError::EndNotAfterStart);
    }
    if draft.start_time < now {
        return Err(ScheduleError::StartsInPast);
    }
    let duration = draft.end_time - draft.start_time;
    if duration > Duration::days(MAX_EVENT_DURATION_DAYS) {
        return Err(ScheduleError::TooLong(MAX_EVENT_DURATION_DAYS));
    }

    if let Some(value) = draft.checkin_offset_minutes.filter(|v| i64::from(*v) > MAX_WINDOW_MINUTES) {
        return Err(ScheduleError::CheckinOffsetOutOfRange {
            value,
            max: MAX_WINDOW_MINUTES,
        });
    }
    if let Some(value) = draft.checkout_offset_minutes.filter(|v| i64::from(*v) > MAX_WINDOW_MINUTES) {
        return Err(ScheduleError::CheckoutOffsetOutOfRange {
            value,
            max: MAX_WINDOW_MINUTES,
        });
    }

    let window = EventWindow {
        start_time: draft.start_time,
        end_time: draft.end_time,
        checkin_override: OffsetOverride::from_raw(draft.checkin_offset_minutes),
        checkout_override: OffsetOverride::from_raw(draft.checkout_offset_minutes),
    };

    let checkout_offset = resolver.resolve_checkout_offset(window.checkout_override);
    if minutes(checkout_offset) >= duration {
        return Err(ScheduleError::CheckoutNeverOpens {
            offset: checkout_offset,
            duration: duration.num_minutes(),
        });
    }

    Ok(window)
}
