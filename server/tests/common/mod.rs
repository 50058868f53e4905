#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use checkin_server::config::{CheckinWindowConfig, CheckinWindowStore};
use checkin_server::models::{Event, Report, Ticket, TicketCategory, TicketStatus, User};
use checkin_server::store::MemoryStore;

pub const ORGANIZER: i64 = 100;
pub const OTHER_ORGANIZER: i64 = 101;
pub const ATTENDEE: i64 = 200;
pub const STAFF: i64 = 300;

pub const CONCERT: i64 = 1;
pub const OTHER_EVENT: i64 = 2;
pub const NO_OVERRIDE_EVENT: i64 = 3;

pub const STANDARD_CATEGORY: i64 = 10;

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap()
}

pub fn price() -> Decimal {
    Decimal::new(150_000, 0)
}

pub fn event(id: i64, name: &str, checkin: Option<i32>, checkout: Option<i32>) -> Event {
    Event {
        id,
        name: name.to_string(),
        start_time: at(14, 0),
        end_time: at(18, 0),
        checkin_offset_minutes: checkin,
        checkout_offset_minutes: checkout,
    }
}

pub fn ticket(id: i64, event_id: i64, status: TicketStatus) -> Ticket {
    Ticket {
        id,
        code: format!("QR-{id:04}"),
        event_id,
        user_id: ATTENDEE,
        category_id: STANDARD_CATEGORY,
        seat_id: Some(id * 10),
        bill_id: Some(9000 + id),
        status: status.as_str().to_string(),
        check_in_time: match status {
            TicketStatus::CheckedIn | TicketStatus::CheckedOut => Some(at(13, 30)),
            _ => None,
        },
        check_out_time: match status {
            TicketStatus::CheckedOut => Some(at(16, 0)),
            _ => None,
        },
    }
}

pub fn pending_report(id: i64, ticket_id: i64) -> Report {
    Report {
        id,
        user_id: ATTENDEE,
        ticket_id,
        status: "PENDING".to_string(),
        refund_amount: None,
        processed_by: None,
        processed_at: None,
        staff_note: None,
    }
}

/// Two events on 2026-06-01 14:00-18:00 UTC owned by different organizers,
/// a 150000 ticket category and an attendee with an empty wallet.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new(Duration::from_millis(200));
    store
        .insert_event(event(CONCERT, "Đêm nhạc Trịnh", None, None), Some(ORGANIZER))
        .await;
    store
        .insert_event(event(OTHER_EVENT, "Hội chợ sách", None, None), Some(OTHER_ORGANIZER))
        .await;
    store
        .insert_category(TicketCategory {
            id: STANDARD_CATEGORY,
            event_id: CONCERT,
            name: "Standard".to_string(),
            price: price(),
        })
        .await;
    store
        .insert_user(User {
            id: ATTENDEE,
            name: "Nguyễn Văn A".to_string(),
            email: "a@example.com".to_string(),
            wallet_balance: Decimal::ZERO,
        })
        .await;
    store
}

pub fn default_windows() -> Arc<CheckinWindowStore> {
    Arc::new(CheckinWindowStore::with_config(
        std::env::temp_dir().join("checkin-server-tests-unused.json"),
        CheckinWindowConfig::default(),
    ))
}
