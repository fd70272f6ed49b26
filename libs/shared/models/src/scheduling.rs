use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::time::{TimeOfDay, MINUTES_PER_DAY};

pub const DEFAULT_SLOT_DURATION_MINUTES: u16 = 30;
pub const MIN_SLOT_DURATION_MINUTES: u16 = 15;
pub const MAX_SLOT_DURATION_MINUTES: u16 = 120;

/// Day of week as stored on schedules: 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn day_name(day_of_week: u8) -> &'static str {
    match day_of_week {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidDayOfWeek(u8),

    #[error("Start time {start} must be before end time {end}")]
    EmptyWindow { start: TimeOfDay, end: TimeOfDay },

    #[error("Slot duration must be between 15 and 120 minutes, got {0}")]
    InvalidSlotDuration(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty_id: Uuid,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A doctor's recurring weekly working window for one day of the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default = "default_slot_duration")]
    pub slot_duration_minutes: u16,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Schedule {
    pub fn new(
        doctor_id: Uuid,
        day_of_week: u8,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        slot_duration_minutes: u16,
    ) -> Result<Self, ScheduleError> {
        let schedule = Self {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week,
            start_time,
            end_time,
            slot_duration_minutes,
            is_active: true,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.day_of_week > 6 {
            return Err(ScheduleError::InvalidDayOfWeek(self.day_of_week));
        }
        if self.start_time >= self.end_time {
            return Err(ScheduleError::EmptyWindow {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if !(MIN_SLOT_DURATION_MINUTES..=MAX_SLOT_DURATION_MINUTES)
            .contains(&self.slot_duration_minutes)
        {
            return Err(ScheduleError::InvalidSlotDuration(self.slot_duration_minutes));
        }
        Ok(())
    }

    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.is_active && self.day_of_week == day_of_week(date)
    }

    /// True when `start` falls in `[start_time, end_time)`.
    pub fn contains_start(&self, start: TimeOfDay) -> bool {
        start >= self.start_time && start < self.end_time
    }

    /// True when `start` lies a whole number of slots after the window start.
    pub fn is_aligned(&self, start: TimeOfDay) -> bool {
        let offset = start.minutes_since(self.start_time);
        offset >= 0 && offset % i64::from(self.slot_duration_minutes) == 0
    }

    pub fn slot_end(&self, start: TimeOfDay) -> TimeOfDay {
        start.add_minutes(i64::from(self.slot_duration_minutes))
    }
}

/// A one-off period on a specific date during which a doctor takes no bookings.
///
/// Both bounds absent means the whole day is blocked; a missing start or end
/// extends the block to the start or end of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedPeriod {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub blocked_date: NaiveDate,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub reason: Option<String>,
}

impl BlockedPeriod {
    pub fn whole_day(doctor_id: Uuid, blocked_date: NaiveDate, reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            blocked_date,
            start_time: None,
            end_time: None,
            reason,
        }
    }

    pub fn is_whole_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// Whether a slot `[start, start + duration)` overlaps this block.
    pub fn blocks(&self, start: TimeOfDay, duration_minutes: u16) -> bool {
        let block_start = self.start_time.map(|t| t.to_minutes()).unwrap_or(0);
        let block_end = self.end_time.map(|t| t.to_minutes()).unwrap_or(MINUTES_PER_DAY);
        let slot_start = start.to_minutes();
        let slot_end = start.add_minutes_unwrapped(u32::from(duration_minutes));

        slot_start < block_end && slot_end > block_start
    }
}

fn default_true() -> bool {
    true
}

fn default_slot_duration() -> u16 {
    DEFAULT_SLOT_DURATION_MINUTES
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).unwrap()
    }

    #[test]
    fn day_of_week_starts_on_sunday() {
        // 2025-11-30 is a Sunday, 2025-12-01 a Monday.
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 11, 30).unwrap()), 0);
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()), 1);
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2025, 12, 6).unwrap()), 6);
        assert_eq!(day_name(3), "Wednesday");
    }

    #[test]
    fn schedule_construction_enforces_invariants() {
        let doctor = Uuid::new_v4();
        assert!(Schedule::new(doctor, 1, t("09:00"), t("17:00"), 30).is_ok());
        assert_eq!(
            Schedule::new(doctor, 7, t("09:00"), t("17:00"), 30),
            Err(ScheduleError::InvalidDayOfWeek(7))
        );
        assert!(matches!(
            Schedule::new(doctor, 1, t("17:00"), t("17:00"), 30),
            Err(ScheduleError::EmptyWindow { .. })
        ));
        assert_eq!(
            Schedule::new(doctor, 1, t("09:00"), t("17:00"), 10),
            Err(ScheduleError::InvalidSlotDuration(10))
        );
    }

    #[test]
    fn window_membership_and_alignment() {
        let schedule = Schedule::new(Uuid::new_v4(), 1, t("09:00"), t("11:00"), 30).unwrap();
        assert!(schedule.contains_start(t("09:00")));
        assert!(schedule.contains_start(t("10:59")));
        assert!(!schedule.contains_start(t("11:00")));
        assert!(!schedule.contains_start(t("08:30")));

        assert!(schedule.is_aligned(t("10:30")));
        assert!(!schedule.is_aligned(t("09:15")));
        assert!(!schedule.is_aligned(t("08:30")));
    }

    #[test]
    fn schedule_deserializes_with_defaults() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "day_of_week": 2,
            "start_time": "08:00:00",
            "end_time": "12:00"
        });
        let schedule: Schedule = serde_json::from_value(json).unwrap();
        assert_eq!(schedule.slot_duration_minutes, DEFAULT_SLOT_DURATION_MINUTES);
        assert!(schedule.is_active);
        assert_eq!(schedule.start_time, t("08:00"));
    }

    #[test]
    fn blocked_period_overlap() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let doctor = Uuid::new_v4();
        let whole = BlockedPeriod::whole_day(doctor, date, None);
        assert!(whole.is_whole_day());
        assert!(whole.blocks(t("00:00"), 30));
        assert!(whole.blocks(t("23:30"), 30));

        let lunch = BlockedPeriod {
            start_time: Some(t("12:00")),
            end_time: Some(t("13:00")),
            ..BlockedPeriod::whole_day(doctor, date, Some("lunch".into()))
        };
        assert!(!lunch.blocks(t("11:30"), 30));
        assert!(lunch.blocks(t("11:45"), 30));
        assert!(lunch.blocks(t("12:30"), 30));
        assert!(!lunch.blocks(t("13:00"), 30));

        let afternoon_off = BlockedPeriod {
            start_time: Some(t("14:00")),
            ..BlockedPeriod::whole_day(doctor, date, None)
        };
        assert!(afternoon_off.blocks(t("16:30"), 30));
        assert!(!afternoon_off.blocks(t("13:30"), 30));
    }
}
