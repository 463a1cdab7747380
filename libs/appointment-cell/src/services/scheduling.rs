// libs/appointment-cell/src/services/scheduling.rs
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday};
use tracing::{debug, warn};

use shared_config::{AppConfig, DEFAULT_CLINIC_UTC_OFFSET_MINUTES};

use crate::models::{AppointmentError, DateRejection, parse_slot};

pub const SLOT_STEP_MINUTES: i64 = 30;

pub fn first_slot() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN)
}

/// Which (date, time) combinations may be booked.
///
/// Slots run every 30 minutes from 09:30 up to and including `last_slot`.
/// The closed weekday is read off the calendar date itself, so a date maps to
/// the same weekday no matter which timezone the caller sits in. "Today" is the
/// clinic's civil date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingPolicy {
    last_slot: NaiveTime,
    closed_weekday: Option<Weekday>,
    clinic_offset: FixedOffset,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            last_slot: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
            closed_weekday: Some(Weekday::Sun),
            clinic_offset: offset_from_minutes(DEFAULT_CLINIC_UTC_OFFSET_MINUTES),
        }
    }
}

impl SchedulingPolicy {
    pub fn new(last_slot: NaiveTime, closed_weekday: Option<Weekday>, clinic_offset: FixedOffset) -> Result<Self, AppointmentError> {
        if last_slot < first_slot() {
            return Err(AppointmentError::InvalidInput(format!(
                "last slot {} is before the first slot {}",
                last_slot.format("%H:%M"),
                first_slot().format("%H:%M")
            )));
        }
        if (last_slot - first_slot()).num_minutes() % SLOT_STEP_MINUTES != 0 {
            return Err(AppointmentError::InvalidInput(format!(
                "last slot {} is not on the {}-minute grid",
                last_slot.format("%H:%M"),
                SLOT_STEP_MINUTES
            )));
        }

        Ok(Self { last_slot, closed_weekday, clinic_offset })
    }

    /// Build from deployment settings. Unusable values are logged and replaced
    /// by the defaults (15:30 last slot, closed Sunday).
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();

        let last_slot = match parse_slot(&config.clinic_last_slot) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Ignoring CLINIC_LAST_SLOT: {}", e);
                defaults.last_slot
            }
        };

        let closed_weekday = match config.clinic_closed_weekday.trim().to_ascii_lowercase().as_str() {
            "" | "none" => None,
            raw => match raw.parse::<Weekday>() {
                Ok(day) => Some(day),
                Err(_) => {
                    warn!("Ignoring CLINIC_CLOSED_WEEKDAY '{}'", raw);
                    defaults.closed_weekday
                }
            },
        };

        let clinic_offset = offset_from_minutes(config.clinic_utc_offset_minutes);

        Self::new(last_slot, closed_weekday, clinic_offset).unwrap_or_else(|e| {
            warn!("Falling back to default clinic hours: {}", e);
            Self { closed_weekday, clinic_offset, ..defaults }
        })
    }

    pub fn closed_weekday(&self) -> Option<Weekday> {
        self.closed_weekday
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_offset
    }

    /// The clinic's daily opening window, in booking order.
    pub fn offerable_slots(&self) -> Vec<NaiveTime> {
        let count = (self.last_slot - first_slot()).num_minutes() / SLOT_STEP_MINUTES + 1;
        (0..count)
            .map(|step| first_slot() + Duration::minutes(step * SLOT_STEP_MINUTES))
            .collect()
    }

    pub fn slot_labels(&self) -> Vec<String> {
        self.offerable_slots()
            .iter()
            .map(|slot| slot.format("%H:%M").to_string())
            .collect()
    }

    pub fn is_offerable(&self, time: NaiveTime) -> bool {
        self.offerable_slots().contains(&time)
    }

    /// Current calendar date at the clinic.
    pub fn today(&self) -> NaiveDate {
        self.today_at(Utc::now())
    }

    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.clinic_offset).date_naive()
    }

    pub fn validate_date(&self, candidate: NaiveDate, today: NaiveDate) -> Result<NaiveDate, DateRejection> {
        if candidate < today {
            debug!("Rejecting past date {} (today {})", candidate, today);
            return Err(DateRejection::PastDate { date: candidate, today });
        }

        let weekday = candidate.weekday();
        if self.closed_weekday == Some(weekday) {
            debug!("Rejecting {} - clinic closed on {:?}", candidate, weekday);
            return Err(DateRejection::ClosedDay { date: candidate, weekday });
        }

        Ok(candidate)
    }

    /// Combine a booking date and slot into an instant in clinic time.
    pub fn compose_date_time(
        &self,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> Result<DateTime<FixedOffset>, AppointmentError> {
        let date = date.ok_or_else(|| AppointmentError::InvalidInput("a date is required".to_string()))?;
        let time = time.ok_or_else(|| AppointmentError::InvalidInput("a time slot is required".to_string()))?;

        if !self.is_offerable(time) {
            return Err(AppointmentError::InvalidInput(format!(
                "{} is not an offered time slot",
                time.format("%H:%M")
            )));
        }

        self.clinic_offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .ok_or_else(|| AppointmentError::InvalidInput(format!("{} {} is not a valid local time", date, time)))
    }
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
        warn!("UTC offset of {} minutes is out of range, using UTC", minutes);
        Utc.fix()
    })
}
