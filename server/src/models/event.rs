use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A per-event window override in minutes. Only strictly positive values
/// exist; zero, negative and NULL all mean "use the global default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OffsetOverride(u32);

impl OffsetOverride {
    pub fn from_raw(raw: Option<i32>) -> Option<Self> {
        match raw {
            Some(minutes) if minutes > 0 => Some(Self(minutes as u32)),
            _ => None,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub checkin_offset_minutes: Option<i32>,
    pub checkout_offset_minutes: Option<i32>,
}

impl Event {
    pub fn window(&self) -> EventWindow {
        EventWindow {
            start_time: self.start_time,
            end_time: self.end_time,
            checkin_override: OffsetOverride::from_raw(self.checkin_offset_minutes),
            checkout_override: OffsetOverride::from_raw(self.checkout_offset_minutes),
        }
    }
}

/// Time-window facet of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub checkin_override: Option<OffsetOverride>,
    pub checkout_override: Option<OffsetOverride>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_overrides_are_unset() {
        assert_eq!(OffsetOverride::from_raw(None), None);
        assert_eq!(OffsetOverride::from_raw(Some(0)), None);
        assert_eq!(OffsetOverride::from_raw(Some(-15)), None);
        assert_eq!(OffsetOverride::from_raw(Some(30)).map(|o| o.minutes()), Some(30));
    }
}
