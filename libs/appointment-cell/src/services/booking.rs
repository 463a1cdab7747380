// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SortOrder, SupabaseClient};

use crate::models::{
    parse_booking_date, parse_slot, Appointment, AppointmentDraft, AppointmentError,
    AppointmentStatus, AvailabilityResponse, BookAppointmentRequest, DEFAULT_REASON,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::scheduling::SchedulingPolicy;

const APPOINTMENTS_TABLE: &str = "appointments";

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    lifecycle_service: AppointmentLifecycleService,
    policy: SchedulingPolicy,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_policy(config, SchedulingPolicy::from_config(config))
    }

    pub fn with_policy(config: &AppConfig, policy: SchedulingPolicy) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            lifecycle_service: AppointmentLifecycleService::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Turn a submitted booking form into a draft, without touching the store.
    ///
    /// Order of checks: contact fields, presence of date and time, the date
    /// against `today`, then the slot itself.
    pub fn prepare_booking(
        &self,
        request: &BookAppointmentRequest,
        today: NaiveDate,
    ) -> Result<AppointmentDraft, AppointmentError> {
        let client_name = request.client_name.trim();
        if client_name.is_empty() {
            return Err(AppointmentError::ValidationError("client name is required".to_string()));
        }
        let client_phone = request.client_phone.trim();
        if client_phone.is_empty() {
            return Err(AppointmentError::ValidationError("client phone is required".to_string()));
        }

        let date = non_blank(&request.date).map(parse_booking_date).transpose()?;
        let time = non_blank(&request.time).map(parse_slot).transpose()?;

        if date.is_none() || time.is_none() {
            return Err(AppointmentError::InvalidInput("Please select a date and a time".to_string()));
        }

        let date = date
            .map(|date| self.policy.validate_date(date, today))
            .transpose()
            .map_err(AppointmentError::RejectedDate)?;

        let date_time = self.policy.compose_date_time(date, time)?;

        let reason = non_blank(&request.reason).unwrap_or(DEFAULT_REASON).to_string();

        Ok(AppointmentDraft {
            client_name: client_name.to_string(),
            client_phone: client_phone.to_string(),
            date_time,
            status: self.lifecycle_service.initial_status(),
            reason,
        })
    }

    /// Book an appointment. `auth_token` is `None` for self-service bookings
    /// and the staff token for manual entries.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let draft = self.prepare_booking(&request, self.policy.today())?;
        debug!("Booking appointment for {} at {}", draft.client_name, draft.date_time);

        let row = self.supabase
            .insert(APPOINTMENTS_TABLE, draft.to_row(), auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = parse_appointment(row)?;

        info!(
            "Appointment {} booked for {}",
            appointment.id,
            appointment.local_date_time(self.policy.clinic_offset()).format("%Y-%m-%d %H:%M")
        );
        Ok(appointment)
    }

    /// Staff dashboard listing, soonest first.
    pub async fn list_appointments(&self, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments");

        let rows = self.supabase
            .select(APPOINTMENTS_TABLE, &[], Some(("date_time", SortOrder::Ascending)), Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(parse_appointment).collect()
    }

    /// Get appointment by ID
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let rows = self.supabase
            .select(APPOINTMENTS_TABLE, &[("id", format!("eq.{}", appointment_id))], None, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
            .and_then(parse_appointment)
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.transition_status(appointment_id, AppointmentStatus::Completed, auth_token).await
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.transition_status(appointment_id, AppointmentStatus::Cancelled, auth_token).await
    }

    /// Move a pending appointment to `new_status`.
    ///
    /// The update only matches rows that are still pending, so a second
    /// transition (or a concurrent one) updates nothing. In that case the row
    /// is re-read to tell a missing appointment from a finished one.
    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let pending = AppointmentStatus::Pending;
        self.lifecycle_service.validate_status_transition(&pending, &new_status)?;

        let updated = self.supabase
            .update_by_id(
                APPOINTMENTS_TABLE,
                &appointment_id.to_string(),
                &[("status", format!("eq.{}", pending))],
                json!({ "status": new_status.as_str() }),
                Some(auth_token),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        match updated.into_iter().next() {
            Some(row) => {
                let appointment = parse_appointment(row)?;
                info!("Appointment {} is now {}", appointment.id, appointment.status);
                Ok(appointment)
            }
            None => {
                let current = self.get_appointment(appointment_id, auth_token).await?;
                warn!(
                    "Appointment {} is {}, refusing to mark it {}",
                    appointment_id, current.status, new_status
                );
                Err(AppointmentError::InvalidStatusTransition(current.status))
            }
        }
    }

    /// Whether a raw `YYYY-MM-DD` date can be booked, with the slots to offer.
    pub fn check_availability(&self, raw_date: &str, today: NaiveDate) -> Result<AvailabilityResponse, AppointmentError> {
        let date = parse_booking_date(raw_date)?;

        let response = match self.policy.validate_date(date, today) {
            Ok(date) => AvailabilityResponse {
                date,
                available: true,
                reason: None,
                slots: self.policy.slot_labels(),
            },
            Err(rejection) => AvailabilityResponse {
                date,
                available: false,
                reason: Some(rejection.to_string()),
                slots: Vec::new(),
            },
        };

        Ok(response)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_appointment(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Weekday;
    use crate::models::DateRejection;

    fn service() -> AppointmentBookingService {
        AppointmentBookingService::new(&AppConfig::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(date: Option<&str>, time: Option<&str>) -> BookAppointmentRequest {
        BookAppointmentRequest {
            client_name: "  Juan Pérez ".to_string(),
            client_phone: "33 1234 5678".to_string(),
            date: date.map(str::to_string),
            time: time.map(str::to_string),
            reason: None,
        }
    }

    #[test]
    fn test_prepare_booking_builds_pending_draft() {
        let draft = service()
            .prepare_booking(&request(Some("2025-06-10"), Some("10:00")), date(2025, 6, 10))
            .unwrap();

        assert_eq!(draft.client_name, "Juan Pérez");
        assert_eq!(draft.status, AppointmentStatus::Pending);
        assert_eq!(draft.reason, DEFAULT_REASON);
        assert_eq!(draft.date_time.to_rfc3339(), "2025-06-10T10:00:00-06:00");
    }

    #[test]
    fn test_prepare_booking_keeps_custom_reason() {
        let mut req = request(Some("2025-06-11"), Some("15:30"));
        req.reason = Some("Ajuste de armazón".to_string());
        let draft = service().prepare_booking(&req, date(2025, 6, 10)).unwrap();
        assert_eq!(draft.reason, "Ajuste de armazón");
    }

    #[test]
    fn test_prepare_booking_requires_date_and_time() {
        let service = service();
        let today = date(2025, 6, 10);

        assert_matches!(service.prepare_booking(&request(None, Some("10:00")), today), Err(AppointmentError::InvalidInput(_)));
        assert_matches!(service.prepare_booking(&request(Some("2025-06-11"), Some("  ")), today), Err(AppointmentError::InvalidInput(_)));
    }

    #[test]
    fn test_prepare_booking_rejects_past_and_closed_days() {
        let service = service();
        let today = date(2025, 6, 10);

        assert_matches!(
            service.prepare_booking(&request(Some("2025-06-09"), Some("10:00")), today),
            Err(AppointmentError::RejectedDate(DateRejection::PastDate { .. }))
        );
        assert_matches!(
            service.prepare_booking(&request(Some("2025-06-15"), Some("10:00")), today),
            Err(AppointmentError::RejectedDate(DateRejection::ClosedDay { weekday: Weekday::Sun, .. }))
        );
    }

    #[test]
    fn test_prepare_booking_rejects_off_grid_slot_and_blank_name() {
        let service = service();
        let today = date(2025, 6, 10);

        assert_matches!(
            service.prepare_booking(&request(Some("2025-06-11"), Some("16:00")), today),
            Err(AppointmentError::InvalidInput(_))
        );

        let mut req = request(Some("2025-06-11"), Some("10:00"));
        req.client_name = "   ".to_string();
        assert_matches!(service.prepare_booking(&req, today), Err(AppointmentError::ValidationError(_)));
    }

    #[test]
    fn test_check_availability() {
        let service = service();
        let today = date(2025, 6, 10);

        let open = service.check_availability("2025-06-12", today).unwrap();
        assert!(open.available);
        assert_eq!(open.slots.len(), 13);

        let closed = service.check_availability("2025-06-15", today).unwrap();
        assert!(!closed.available);
        assert!(closed.slots.is_empty());
        assert_eq!(
            closed.reason.as_deref(),
            Some("The clinic is closed on Sundays; please choose another day")
        );

        assert_matches!(service.check_availability("15/06/2025", today), Err(AppointmentError::ValidationError(_)));
    }
}
