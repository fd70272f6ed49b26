use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::{SchedulingStore, StoreError};
use shared_models::scheduling::day_of_week;
use shared_models::{Schedule, TimeOfDay};

use crate::models::TimeSlot;

/// Lazily walks a schedule window in `slot_duration_minutes` steps.
///
/// A slot is emitted while its start lies before the window end; the last
/// slot's end is not clipped to the window.
#[derive(Debug, Clone)]
pub struct SlotIter {
    doctor_id: Uuid,
    date: NaiveDate,
    cursor: u32,
    end: u32,
    step: u32,
}

impl SlotIter {
    fn empty(doctor_id: Uuid, date: NaiveDate) -> Self {
        Self {
            doctor_id,
            date,
            cursor: 0,
            end: 0,
            step: 1,
        }
    }
}

impl Iterator for SlotIter {
    type Item = TimeSlot;

    fn next(&mut self) -> Option<TimeSlot> {
        if self.cursor >= self.end {
            return None;
        }

        let start_time = TimeOfDay::from_minutes(self.cursor);
        self.cursor += self.step;

        Some(TimeSlot {
            doctor_id: self.doctor_id,
            date: self.date,
            start_time,
            end_time: start_time.add_minutes(i64::from(self.step)),
            available: true,
            appointment_id: None,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.cursor >= self.end {
            0
        } else {
            ((self.end - self.cursor).div_ceil(self.step)) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SlotIter {}

/// Candidate slots of `schedule` on `date`; empty unless the schedule is
/// active and falls on that weekday.
pub fn generate_slots(schedule: &Schedule, date: NaiveDate) -> SlotIter {
    if !schedule.applies_to(date) || schedule.slot_duration_minutes == 0 {
        return SlotIter::empty(schedule.doctor_id, date);
    }

    SlotIter {
        doctor_id: schedule.doctor_id,
        date,
        cursor: schedule.start_time.to_minutes(),
        end: schedule.end_time.to_minutes(),
        step: u32::from(schedule.slot_duration_minutes),
    }
}

/// Slots of the doctor's active schedule for `date`'s weekday, with the schedule itself.
pub async fn doctor_slots(
    store: &dyn SchedulingStore,
    doctor_id: Uuid,
    date: NaiveDate,
) -> Result<Option<(Schedule, Vec<TimeSlot>)>, StoreError> {
    let Some(schedule) = store.schedule_for_day(doctor_id, day_of_week(date)).await? else {
        return Ok(None);
    };
    let slots = generate_slots(&schedule, date).collect();
    Ok(Some((schedule, slots)))
}
