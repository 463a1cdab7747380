// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde_json::{json, Value};
use std::fmt;

/// Reason stored when the client leaves it blank.
pub const DEFAULT_REASON: &str = "Examen de la Vista";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_name: String,
    pub client_phone: String,
    pub date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// The appointment instant in the clinic's civil time.
    pub fn local_date_time(&self, clinic_offset: FixedOffset) -> DateTime<FixedOffset> {
        self.date_time.with_timezone(&clinic_offset)
    }
}

fn default_reason() -> String {
    DEFAULT_REASON.to_string()
}

/// Booking lifecycle. Wire values are the clinic's Spanish status names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "completada")]
    Completed,
    #[serde(rename = "cancelada")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pendiente",
            AppointmentStatus::Completed => "completada",
            AppointmentStatus::Cancelled => "cancelada",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated booking, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub client_name: String,
    pub client_phone: String,
    pub date_time: DateTime<FixedOffset>,
    pub status: AppointmentStatus,
    pub reason: String,
}

impl AppointmentDraft {
    pub fn to_row(&self) -> Value {
        json!({
            "client_name": self.client_name,
            "client_phone": self.client_phone,
            "date_time": self.date_time.to_rfc3339(),
            "status": self.status.as_str(),
            "reason": self.reason,
        })
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Booking form as submitted by a client or typed in by staff. Date and time
/// arrive as the raw `YYYY-MM-DD` / `HH:MM` strings the form produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub client_name: String,
    pub client_phone: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub available: bool,
    pub reason: Option<String>,
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotsResponse {
    pub slots: Vec<String>,
    pub closed_weekday: Option<Weekday>,
    pub utc_offset_minutes: i32,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Why a candidate booking date was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRejection {
    PastDate { date: NaiveDate, today: NaiveDate },
    ClosedDay { date: NaiveDate, weekday: Weekday },
}

impl fmt::Display for DateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRejection::PastDate { date, .. } => {
                write!(f, "{} is in the past; please choose today or a later date", date)
            }
            DateRejection::ClosedDay { weekday, .. } => {
                write!(f, "The clinic is closed on {}; please choose another day", weekday_name(*weekday))
            }
        }
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mondays",
        Weekday::Tue => "Tuesdays",
        Weekday::Wed => "Wednesdays",
        Weekday::Thu => "Thursdays",
        Weekday::Fri => "Fridays",
        Weekday::Sat => "Saturdays",
        Weekday::Sun => "Sundays",
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("{0}")]
    RejectedDate(DateRejection),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Parse a booking date from the form's `YYYY-MM-DD` value.
pub fn parse_booking_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppointmentError::ValidationError(format!("'{}' is not a date (expected YYYY-MM-DD)", raw)))
}

/// Parse a slot label, `HH:MM` or `HH:MM:SS`.
pub fn parse_slot(raw: &str) -> Result<NaiveTime, AppointmentError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppointmentError::ValidationError(format!("'{}' is not a time (expected HH:MM)", raw)))
}
