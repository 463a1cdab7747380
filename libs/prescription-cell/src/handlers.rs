// libs/prescription-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
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

use crate::models::{PrescriptionError, PrescriptionRecord, SaveOperation, SavePreview};
use crate::services::record::{decide_save_operation, preview, PrescriptionService};

fn map_prescription_error(e: PrescriptionError) -> AppError {
    match e {
        PrescriptionError::ValidationError(msg) => AppError::ValidationError(msg),
        PrescriptionError::AuthRequired => AppError::Auth(e.to_string()),
        PrescriptionError::Persistence(msg) => AppError::Database(msg),
        PrescriptionError::NotFound => AppError::NotFound(e.to_string()),
        PrescriptionError::ReadOnly => AppError::Conflict(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Prescription history requested by {}", user.staff_id());
    let service = PrescriptionService::new(&state);

    let prescriptions = service
        .list(auth.token())
        .await
        .map_err(map_prescription_error)?;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppConfig>>,
    Path(prescription_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<PrescriptionRecord>, AppError> {
    let service = PrescriptionService::new(&state);

    let prescription = service
        .get(prescription_id, auth.token())
        .await
        .map_err(map_prescription_error)?;

    Ok(Json(prescription))
}

/// Normalize a draft without saving it.
pub async fn preview_prescription(Json(record): Json<PrescriptionRecord>) -> Json<SavePreview> {
    Json(preview(&record))
}

#[axum::debug_handler]
pub async fn save_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(record): Json<PrescriptionRecord>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = PrescriptionService::new(&state);
    let status = match decide_save_operation(&record) {
        SaveOperation::Create => StatusCode::CREATED,
        SaveOperation::Update(_) => StatusCode::OK,
    };

    let saved = service
        .save(&record, Some(&user), auth.token())
        .await
        .map_err(map_prescription_error)?;

    Ok((status, Json(json!({
        "success": true,
        "prescription": saved,
        "message": "Prescription saved successfully"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            map_prescription_error(PrescriptionError::ValidationError("x".to_string())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(map_prescription_error(PrescriptionError::AuthRequired).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            map_prescription_error(PrescriptionError::Persistence("boom".to_string())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(map_prescription_error(PrescriptionError::NotFound).status_code(), StatusCode::NOT_FOUND);
    }
}
