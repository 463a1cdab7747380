// libs/prescription-cell/src/services/record.rs
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SortOrder, SupabaseClient};
use shared_models::auth::User;

use crate::models::{AxisInput, PrescriptionError, PrescriptionRecord, SaveOperation, SavePreview};
use crate::services::optics::{normalize_axis, parse_diopter, parse_measurement};

const PRESCRIPTIONS_TABLE: &str = "prescriptions";

const AXIS_COLUMNS: [&str; 4] = ["prev_axis_od", "prev_axis_oi", "axis_od", "axis_oi"];
const MEASUREMENT_COLUMNS: [&str; 4] = ["va_od", "va_oi", "pupillary_distance", "eye_height"];
const POWER_COLUMNS: [&str; 11] = [
    "prev_sph_od",
    "prev_cyl_od",
    "prev_add_od",
    "prev_sph_oi",
    "prev_cyl_oi",
    "prev_add_oi",
    "sph_od",
    "cyl_od",
    "sph_oi",
    "cyl_oi",
    "add_power",
];

fn clean_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Copy of `record` in the shape it is persisted: blank text becomes `None`,
/// dependent answers follow their parents and the lens summary is recomputed.
pub fn prepare_for_save(record: &PrescriptionRecord) -> PrescriptionRecord {
    let mut prepared = record.clone();

    prepared.patient_name = clean_text(&record.patient_name);
    prepared.address = clean_text(&record.address);
    prepared.phone = clean_text(&record.phone);
    prepared.age = clean_text(&record.age);
    prepared.occupation = clean_text(&record.occupation);
    prepared.tint_tone = clean_text(&record.tint_tone);
    prepared.notes = clean_text(&record.notes);

    for tags in [&mut prepared.lens_type, &mut prepared.lens_material] {
        tags.retain(|tag| !tag.trim().is_empty());
    }

    prepared.enforce_dependencies();
    prepared.refresh_material_final();
    prepared
}

/// No id means the record has never been stored.
pub fn decide_save_operation(record: &PrescriptionRecord) -> SaveOperation {
    match record.id {
        Some(id) => SaveOperation::Update(id),
        None => SaveOperation::Create,
    }
}

pub fn preview(record: &PrescriptionRecord) -> SavePreview {
    let prepared = prepare_for_save(record);
    SavePreview {
        material_final: prepared.material_final.clone(),
        operation: decide_save_operation(&prepared),
        record: prepared,
    }
}

pub struct PrescriptionService {
    supabase: SupabaseClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Persist an exam, creating or updating it by id.
    ///
    /// Nothing is sent to the store unless the record has a patient name and a
    /// staff member is signed in. `record` itself is never modified; the stored
    /// version is returned.
    pub async fn save(
        &self,
        record: &PrescriptionRecord,
        staff: Option<&User>,
        auth_token: &str,
    ) -> Result<PrescriptionRecord, PrescriptionError> {
        let mut prepared = prepare_for_save(record);

        if prepared.patient_name.is_none() {
            return Err(PrescriptionError::ValidationError("patient name is required".to_string()));
        }
        let staff = staff.ok_or(PrescriptionError::AuthRequired)?;
        prepared.created_by = Some(staff.staff_id().to_string());

        let row = prepared.to_row()?;

        let stored = match decide_save_operation(&prepared) {
            SaveOperation::Create => {
                debug!("Creating prescription for {:?}", prepared.patient_name);
                self.supabase
                    .insert(PRESCRIPTIONS_TABLE, row, Some(auth_token))
                    .await
                    .map_err(persistence_error)?
            }
            SaveOperation::Update(id) => {
                debug!("Updating prescription {}", id);
                self.supabase
                    .update_by_id(PRESCRIPTIONS_TABLE, &id.to_string(), &[], row, Some(auth_token))
                    .await
                    .map_err(persistence_error)?
                    .into_iter()
                    .next()
                    .ok_or(PrescriptionError::NotFound)?
            }
        };

        let stored = parse_record(stored)?;
        info!("Prescription {:?} saved by {}", stored.id, staff.staff_id());
        Ok(stored)
    }

    /// Exam history, newest first.
    pub async fn list(&self, auth_token: &str) -> Result<Vec<PrescriptionRecord>, PrescriptionError> {
        debug!("Listing prescriptions");

        let rows = self.supabase
            .select(PRESCRIPTIONS_TABLE, &[], Some(("created_at", SortOrder::Descending)), Some(auth_token))
            .await
            .map_err(persistence_error)?;

        rows.into_iter().map(parse_record).collect()
    }

    pub async fn get(&self, id: Uuid, auth_token: &str) -> Result<PrescriptionRecord, PrescriptionError> {
        debug!("Fetching prescription {}", id);

        let rows = self.supabase
            .select(PRESCRIPTIONS_TABLE, &[("id", format!("eq.{}", id))], None, Some(auth_token))
            .await
            .map_err(persistence_error)?;

        rows.into_iter()
            .next()
            .ok_or(PrescriptionError::NotFound)
            .and_then(parse_record)
    }
}

fn persistence_error(e: anyhow::Error) -> PrescriptionError {
    error!("Prescription store call failed: {}", e);
    PrescriptionError::Persistence(e.to_string())
}

fn parse_record(mut row: Value) -> Result<PrescriptionRecord, PrescriptionError> {
    blank_unreadable_columns(&mut row);
    serde_json::from_value(row)
        .map_err(|e| PrescriptionError::Persistence(format!("Failed to parse prescription: {}", e)))
}

fn column_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => number.as_f64().map(|v| v.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

/// Older rows were written without input checks. An optical value that would
/// be refused on entry is read back as blank so the rest of the exam survives.
fn blank_unreadable_columns(row: &mut Value) {
    let Some(columns) = row.as_object_mut() else {
        return;
    };
    let id = columns.get("id").and_then(Value::as_str).unwrap_or("<no id>").to_string();

    let checks: [(&[&str], fn(&str) -> bool); 3] = [
        (&AXIS_COLUMNS, |raw| normalize_axis(raw) != AxisInput::Rejected),
        (&MEASUREMENT_COLUMNS, |raw| parse_measurement(raw).is_ok()),
        (&POWER_COLUMNS, |raw| parse_diopter(raw).is_ok()),
    ];

    for (names, readable) in checks {
        for name in names {
            let Some(value) = columns.get_mut(*name) else {
                continue;
            };
            if value.is_null() || column_text(value).is_some_and(|raw| readable(&raw)) {
                continue;
            }
            warn!("Prescription {} has unreadable {} {}, reading it as blank", id, name, value);
            *value = Value::Null;
        }
    }
}
