// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentError, AvailabilityQuery, BookAppointmentRequest, SlotsResponse};
use crate::services::booking::AppointmentBookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::RejectedDate(rejection) => AppError::BadRequest(rejection.to_string()),
        AppointmentError::InvalidInput(msg) => AppError::BadRequest(msg),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::InvalidStatusTransition(status) => {
            AppError::Conflict(format!("Appointment is already {}", status))
        }
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn get_slots(State(state): State<Arc<AppConfig>>) -> Json<SlotsResponse> {
    let booking_service = AppointmentBookingService::new(&state);
    let policy = booking_service.policy();

    Json(SlotsResponse {
        slots: policy.slot_labels(),
        closed_weekday: policy.closed_weekday(),
        utc_offset_minutes: policy.clinic_offset().local_minus_utc() / 60,
    })
}

pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let today = booking_service.policy().today();

    let availability = booking_service
        .check_availability(&query.date, today)
        .map_err(map_appointment_error)?;

    Ok(Json(json!(availability)))
}

/// Self-service booking from the public site.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(request, None)
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    }))))
}

// ==============================================================================
// STAFF HANDLERS
// ==============================================================================

/// Manual entry by staff, same rules as self-service.
#[axum::debug_handler]
pub async fn book_appointment_manual(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("Manual booking entered by {}", user.staff_id());
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(request, Some(auth.token()))
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    }))))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Appointment list requested by {}", user.staff_id());
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .list_appointments(auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("{} completing appointment {}", user.staff_id(), appointment_id);
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .complete_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as completed"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("{} cancelling appointment {}", user.staff_id(), appointment_id);
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .cancel_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use crate::models::{AppointmentStatus, DateRejection};

    #[test]
    fn test_error_mapping() {
        let rejection = DateRejection::ClosedDay {
            date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            weekday: Weekday::Sun,
        };
        assert_eq!(
            map_appointment_error(AppointmentError::RejectedDate(rejection)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_appointment_error(AppointmentError::InvalidStatusTransition(AppointmentStatus::Completed)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            map_appointment_error(AppointmentError::ValidationError("x".to_string())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(map_appointment_error(AppointmentError::NotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            map_appointment_error(AppointmentError::DatabaseError("down".to_string())).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
