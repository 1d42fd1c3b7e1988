//! Working-day and working-hour rules applied to a requested slot.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::models::ScheduleSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyViolation {
    ClosedDay(Weekday),
    OutsideHours { start: NaiveTime, end: NaiveTime },
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::ClosedDay(day) => {
                write!(f, "Clinic is closed on {}s.", weekday_name(*day))
            }
            PolicyViolation::OutsideHours { start, end } => write!(
                f,
                "Clinic hours are {} to {}.",
                start.format("%-I:%M %p"),
                end.format("%-I:%M %p")
            ),
        }
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone)]
pub struct SlotPolicy {
    closed_days: Vec<Weekday>,
    stored_working_days: Option<Vec<Weekday>>,
    settings: ScheduleSettings,
}

impl SlotPolicy {
    /// `stored` is the doctor's saved settings row, if any. Its working days
    /// narrow the open days; the clinic closed days always apply.
    pub fn new(doctor_id: &str, closed_days: &[Weekday], stored: Option<ScheduleSettings>) -> Self {
        let stored_working_days = stored.as_ref().map(|s| s.working_days.clone());
        let settings = stored.unwrap_or_else(|| ScheduleSettings::defaults_for(doctor_id));

        Self {
            closed_days: closed_days.to_vec(),
            stored_working_days,
            settings,
        }
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        let day = date.weekday();
        if self.closed_days.contains(&day) {
            return false;
        }
        match &self.stored_working_days {
            Some(days) => days.contains(&day),
            None => true,
        }
    }

    /// Closed-day check first, then `[start_time, end_time)`.
    pub fn check(&self, at: &NaiveDateTime) -> Result<(), PolicyViolation> {
        if !self.is_open_on(at.date()) {
            return Err(PolicyViolation::ClosedDay(at.weekday()));
        }

        let time = at.time();
        if time < self.settings.start_time || time >= self.settings.end_time {
            return Err(PolicyViolation::OutsideHours {
                start: self.settings.start_time,
                end: self.settings.end_time,
            });
        }

        Ok(())
    }

    /// Candidate appointment starts for a date, skipping any slot that
    /// overlaps the break window. Empty on closed days.
    pub fn slot_grid(&self, date: NaiveDate) -> Vec<NaiveDateTime> {
        if !self.is_open_on(date) || self.settings.appointment_duration <= 0 {
            return Vec::new();
        }

        let step = self.settings.appointment_duration;
        let start = minutes_of(self.settings.start_time);
        let end = minutes_of(self.settings.end_time);
        let break_start = minutes_of(self.settings.break_start_time);
        let break_end = minutes_of(self.settings.break_end_time);

        let mut slots = Vec::new();
        let mut cursor = start;
        while cursor + step <= end {
            let overlaps_break = cursor < break_end && cursor + step > break_start;
            if !overlaps_break {
                if let Some(time) = NaiveTime::from_hms_opt((cursor / 60) as u32, (cursor % 60) as u32, 0) {
                    slots.push(date.and_time(time));
                }
            }
            cursor += step;
        }
        slots
    }
}

fn minutes_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight() / 60)
}
