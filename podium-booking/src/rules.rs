use chrono::{Duration, Timelike};
use podium_core::slot::TimeWindow;
use podium_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotRuleViolation {
    #[error("Session must last exactly {expected_minutes} minutes (got {actual_minutes})")]
    Duration {
        expected_minutes: i64,
        actual_minutes: i64,
    },
    #[error("Session must fall between {open:02}:00 and {close:02}:00 UTC on a single day")]
    OutsideBusinessHours { open: u32, close: u32 },
    #[error("Session must start and end on the hour")]
    NotOnTheHour,
}

impl From<SlotRuleViolation> for CoreError {
    fn from(violation: SlotRuleViolation) -> Self {
        CoreError::ValidationError(violation.to_string())
    }
}

/// Business-day constraints a speaker slot must satisfy before any write.
#[derive(Debug, Clone)]
pub struct SlotRules {
    open_hour: u32,
    close_hour: u32,
    duration: Duration,
}

impl Default for SlotRules {
    fn default() -> Self {
        Self::new(9, 16, 60)
    }
}

impl SlotRules {
    pub fn new(open_hour: u32, close_hour: u32, duration_minutes: i64) -> Self {
        Self {
            open_hour,
            close_hour,
            duration: Duration::minutes(duration_minutes),
        }
    }

    /// Checks, in order: exact duration, business hours, on-the-hour.
    /// The first violated rule is reported.
    pub fn check(&self, window: &TimeWindow) -> Result<(), SlotRuleViolation> {
        // 1. Duration
        let actual = window.duration();
        if actual != self.duration {
            return Err(SlotRuleViolation::Duration {
                expected_minutes: self.duration.num_minutes(),
                actual_minutes: actual.num_minutes(),
            });
        }

        // 2. Business day
        let same_day = window.start.date_naive() == window.end.date_naive();
        if !same_day || window.start.hour() < self.open_hour || window.end.hour() > self.close_hour {
            return Err(SlotRuleViolation::OutsideBusinessHours {
                open: self.open_hour,
                close: self.close_hour,
            });
        }

        // 3. Hour boundaries
        let on_the_hour = |t: &chrono::DateTime<chrono::Utc>| {
            t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0
        };
        if !on_the_hour(&window.start) || !on_the_hour(&window.end) {
            return Err(SlotRuleViolation::NotOnTheHour);
        }

        Ok(())
    }
}
