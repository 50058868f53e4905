use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::event::EventWindow;

/// Lifecycle of an admission ticket.
///
/// `Booked → CheckedIn → CheckedOut` is the attendance path. `Cancelled`
/// and `Refunded` are absorbing; a refund is only granted from `CheckedIn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Booked,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Booked => "BOOKED",
            TicketStatus::CheckedIn => "CHECKED_IN",
            TicketStatus::CheckedOut => "CHECKED_OUT",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Refunded => "REFUNDED",
        }
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Booked, TicketStatus::CheckedIn)
                | (TicketStatus::CheckedIn, TicketStatus::CheckedOut)
                | (TicketStatus::Booked, TicketStatus::Cancelled)
                | (TicketStatus::CheckedIn, TicketStatus::Cancelled)
                | (TicketStatus::CheckedIn, TicketStatus::Refunded)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOKED" => Ok(TicketStatus::Booked),
            "CHECKED_IN" => Ok(TicketStatus::CheckedIn),
            "CHECKED_OUT" => Ok(TicketStatus::CheckedOut),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            "REFUNDED" => Ok(TicketStatus::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The two attendance transitions a scanning station can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanDirection {
    CheckIn,
    CheckOut,
}

impl ScanDirection {
    /// Status the ticket must hold for the transition to apply.
    pub fn from_status(&self) -> TicketStatus {
        match self {
            ScanDirection::CheckIn => TicketStatus::Booked,
            ScanDirection::CheckOut => TicketStatus::CheckedIn,
        }
    }

    pub fn to_status(&self) -> TicketStatus {
        match self {
            ScanDirection::CheckIn => TicketStatus::CheckedIn,
            ScanDirection::CheckOut => TicketStatus::CheckedOut,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanDirection::CheckIn => "check-in",
            ScanDirection::CheckOut => "check-out",
        }
    }
}

/// Price tier of a ticket. The price is read at refund time, never cached.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketCategory {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub code: String,
    pub event_id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub seat_id: Option<i64>,
    pub bill_id: Option<i64>,
    pub status: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
}

/// Everything a scanning station needs to judge one ticket: the ticket's
/// lifecycle facet and the time-window facet of its event.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub ticket_id: i64,
    pub status: TicketStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub event_id: i64,
    pub event_name: String,
    pub window: EventWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            TicketStatus::Booked,
            TicketStatus::CheckedIn,
            TicketStatus::CheckedOut,
            TicketStatus::Cancelled,
            TicketStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
        assert!("USED".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_scan_directions_follow_lifecycle_edges() {
        for direction in [ScanDirection::CheckIn, ScanDirection::CheckOut] {
            assert!(direction.from_status().can_transition_to(direction.to_status()));
        }
    }

    #[test]
    fn test_refund_only_from_checked_in() {
        assert!(TicketStatus::CheckedIn.can_transition_to(TicketStatus::Refunded));
        assert!(!TicketStatus::Booked.can_transition_to(TicketStatus::Refunded));
        assert!(!TicketStatus::CheckedOut.can_transition_to(TicketStatus::Refunded));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [
            TicketStatus::CheckedOut,
            TicketStatus::Cancelled,
            TicketStatus::Refunded,
        ] {
            assert!(!terminal.can_transition_to(TicketStatus::Booked));
            assert!(!terminal.can_transition_to(TicketStatus::CheckedIn));
            assert!(!terminal.can_transition_to(TicketStatus::CheckedOut));
        }
    }
}
