// libs/prescription-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::services::material::derive_material_summary;
use crate::services::optics::{apply_axis_edit, parse_diopter, parse_measurement};

// ==============================================================================
// OPTICAL VALUE TYPES
// ==============================================================================

/// A lens power, held as a whole number of quarter diopters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Diopter(i32);

/// How a power is written out. Additions always carry their sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiopterKind {
    Sphere,
    Cylinder,
    Addition,
}

impl Diopter {
    pub fn from_quarters(quarters: i32) -> Self {
        Self(quarters)
    }

    pub fn quarters(&self) -> i32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 4.0
    }

    /// `1.25`, `-0.50`, `0.00`; additions above zero as `+2.00`.
    pub fn render(&self, kind: DiopterKind) -> String {
        let hundredths = i64::from(self.0) * 25;
        let sign = if hundredths < 0 {
            "-"
        } else if hundredths > 0 && kind == DiopterKind::Addition {
            "+"
        } else {
            ""
        };
        let magnitude = hundredths.abs();
        format!("{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

/// Cylinder axis in degrees, 0 through 180.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Axis(u16);

impl Axis {
    pub const MAX_DEGREES: u16 = 180;

    pub fn new(degrees: u16) -> Option<Self> {
        (degrees <= Self::MAX_DEGREES).then_some(Self(degrees))
    }

    pub fn degrees(&self) -> u16 {
        self.0
    }
}

/// Outcome of reading an axis keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisInput {
    Unset,
    Value(Axis),
    Rejected,
}

// ==============================================================================
// PRESCRIPTION RECORD
// ==============================================================================

/// One eye exam, as stored in `prescriptions`.
///
/// Powers, axes and measurements are normalized when the record is read, so a
/// value held here is always in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRecord {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub id: Option<Uuid>,

    // Patient
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub exam_date: Option<NaiveDate>,

    // Clinical history
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_hypertension: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_hypotension: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_condition_controlled: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_diabetes: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_diabetes_controlled: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_headache: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_eye_injury: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_tearing: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_burning: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub history_itching: bool,

    // Acuity and measurements
    #[serde(default, with = "measurement_serde")]
    pub va_od: Option<u32>,
    #[serde(default, with = "measurement_serde")]
    pub va_oi: Option<u32>,
    #[serde(default, with = "measurement_serde")]
    pub pupillary_distance: Option<u32>,
    #[serde(default, with = "measurement_serde")]
    pub eye_height: Option<u32>,

    // Previous prescription
    #[serde(default, with = "power_serde")]
    pub prev_sph_od: Option<Diopter>,
    #[serde(default, with = "power_serde")]
    pub prev_cyl_od: Option<Diopter>,
    #[serde(default, with = "axis_serde")]
    pub prev_axis_od: Option<Axis>,
    #[serde(default, with = "addition_serde")]
    pub prev_add_od: Option<Diopter>,
    #[serde(default, with = "power_serde")]
    pub prev_sph_oi: Option<Diopter>,
    #[serde(default, with = "power_serde")]
    pub prev_cyl_oi: Option<Diopter>,
    #[serde(default, with = "axis_serde")]
    pub prev_axis_oi: Option<Axis>,
    #[serde(default, with = "addition_serde")]
    pub prev_add_oi: Option<Diopter>,

    // Current prescription
    #[serde(default, with = "power_serde")]
    pub sph_od: Option<Diopter>,
    #[serde(default, with = "power_serde")]
    pub cyl_od: Option<Diopter>,
    #[serde(default, with = "axis_serde")]
    pub axis_od: Option<Axis>,
    #[serde(default, with = "power_serde")]
    pub sph_oi: Option<Diopter>,
    #[serde(default, with = "power_serde")]
    pub cyl_oi: Option<Diopter>,
    #[serde(default, with = "axis_serde")]
    pub axis_oi: Option<Axis>,
    #[serde(default, with = "addition_serde")]
    pub add_power: Option<Diopter>,

    // Lens configuration
    #[serde(default, with = "tag_list")]
    pub lens_type: Vec<String>,
    #[serde(default, with = "tag_list")]
    pub lens_material: Vec<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub antiblue: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub tint: bool,
    #[serde(default)]
    pub tint_tone: Option<String>,
    #[serde(default)]
    pub material_final: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PrescriptionRecord {
    /// Empty exam dated `today`.
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            exam_date: Some(today),
            ..Self::default()
        }
    }

    /// Column values for an insert or update. Store-managed columns are left out.
    pub fn to_row(&self) -> Result<Value, PrescriptionError> {
        let mut row = serde_json::to_value(self)
            .map_err(|e| PrescriptionError::Persistence(format!("Failed to encode prescription: {}", e)))?;

        if let Some(columns) = row.as_object_mut() {
            columns.remove("id");
            columns.remove("created_at");
        }

        Ok(row)
    }

    /// Recompute the cached lens summary.
    pub fn refresh_material_final(&mut self) {
        let summary = derive_material_summary(
            &self.lens_type,
            &self.lens_material,
            self.antiblue,
            self.tint,
            self.tint_tone.as_deref(),
        );
        self.material_final = (!summary.is_empty()).then_some(summary);
    }

    /// Clear every dependent answer whose parent is off.
    pub fn enforce_dependencies(&mut self) {
        if !self.history_diabetes {
            self.history_diabetes_controlled = false;
        }
        if !self.history_hypertension && !self.history_hypotension {
            self.history_condition_controlled = false;
        }
        if !self.tint {
            self.tint_tone = None;
        }
    }

    /// Apply one form edit.
    ///
    /// Dependent answers follow their parents in the same step, and the lens
    /// summary is refreshed. A rejected edit leaves the record untouched.
    pub fn apply(&mut self, update: RecordUpdate) -> Result<(), PrescriptionError> {
        match update {
            RecordUpdate::Text(field, raw) => {
                if field == TextField::TintTone && !self.tint {
                    return Ok(());
                }
                *self.text_mut(field) = Some(raw);
            }
            RecordUpdate::ExamDate(date) => self.exam_date = date,
            RecordUpdate::Flag(flag, value) => self.set_flag(flag, value),
            RecordUpdate::Measurement(field, raw) => {
                *self.measurement_mut(field) = parse_measurement(&raw)?;
            }
            RecordUpdate::Power(field, raw) => {
                *self.power_mut(field) = parse_diopter(&raw)?;
            }
            RecordUpdate::Axis(field, raw) => {
                let current = *self.axis_mut(field);
                *self.axis_mut(field) = apply_axis_edit(current, &raw);
            }
            RecordUpdate::LensType { tag, selected } => toggle_tag(&mut self.lens_type, tag, selected),
            RecordUpdate::Treatment { tag, selected } => toggle_tag(&mut self.lens_material, tag, selected),
            RecordUpdate::Antiblue(value) => self.antiblue = value,
            RecordUpdate::Tint(value) => self.tint = value,
        }

        self.enforce_dependencies();
        self.refresh_material_final();
        Ok(())
    }

    fn set_flag(&mut self, flag: HistoryFlag, value: bool) {
        match flag {
            HistoryFlag::Hypertension => self.history_hypertension = value,
            HistoryFlag::Hypotension => self.history_hypotension = value,
            HistoryFlag::ConditionControlled => {
                self.history_condition_controlled =
                    value && (self.history_hypertension || self.history_hypotension);
            }
            HistoryFlag::Diabetes => self.history_diabetes = value,
            HistoryFlag::DiabetesControlled => {
                self.history_diabetes_controlled = value && self.history_diabetes;
            }
            HistoryFlag::Headache => self.history_headache = value,
            HistoryFlag::EyeInjury => self.history_eye_injury = value,
            HistoryFlag::Tearing => self.history_tearing = value,
            HistoryFlag::Burning => self.history_burning = value,
            HistoryFlag::Itching => self.history_itching = value,
        }
    }

    fn text_mut(&mut self, field: TextField) -> &mut Option<String> {
        match field {
            TextField::PatientName => &mut self.patient_name,
            TextField::Address => &mut self.address,
            TextField::Phone => &mut self.phone,
            TextField::Age => &mut self.age,
            TextField::Occupation => &mut self.occupation,
            TextField::TintTone => &mut self.tint_tone,
            TextField::Notes => &mut self.notes,
        }
    }

    fn measurement_mut(&mut self, field: MeasurementField) -> &mut Option<u32> {
        match field {
            MeasurementField::VaOd => &mut self.va_od,
            MeasurementField::VaOi => &mut self.va_oi,
            MeasurementField::PupillaryDistance => &mut self.pupillary_distance,
            MeasurementField::EyeHeight => &mut self.eye_height,
        }
    }

    fn power_mut(&mut self, field: PowerField) -> &mut Option<Diopter> {
        match field {
            PowerField::PrevSphOd => &mut self.prev_sph_od,
            PowerField::PrevCylOd => &mut self.prev_cyl_od,
            PowerField::PrevAddOd => &mut self.prev_add_od,
            PowerField::PrevSphOi => &mut self.prev_sph_oi,
            PowerField::PrevCylOi => &mut self.prev_cyl_oi,
            PowerField::PrevAddOi => &mut self.prev_add_oi,
            PowerField::SphOd => &mut self.sph_od,
            PowerField::CylOd => &mut self.cyl_od,
            PowerField::SphOi => &mut self.sph_oi,
            PowerField::CylOi => &mut self.cyl_oi,
            PowerField::AddPower => &mut self.add_power,
        }
    }

    fn axis_mut(&mut self, field: AxisField) -> &mut Option<Axis> {
        match field {
            AxisField::PrevAxisOd => &mut self.prev_axis_od,
            AxisField::PrevAxisOi => &mut self.prev_axis_oi,
            AxisField::AxisOd => &mut self.axis_od,
            AxisField::AxisOi => &mut self.axis_oi,
        }
    }
}

fn toggle_tag(tags: &mut Vec<String>, tag: String, selected: bool) {
    let present = tags.iter().any(|t| *t == tag);
    if selected && !present {
        tags.push(tag);
    } else if !selected {
        tags.retain(|t| *t != tag);
    }
}

// ==============================================================================
// FORM EDITS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    PatientName,
    Address,
    Phone,
    Age,
    Occupation,
    TintTone,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFlag {
    Hypertension,
    Hypotension,
    ConditionControlled,
    Diabetes,
    DiabetesControlled,
    Headache,
    EyeInjury,
    Tearing,
    Burning,
    Itching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementField {
    VaOd,
    VaOi,
    PupillaryDistance,
    EyeHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerField {
    PrevSphOd,
    PrevCylOd,
    PrevAddOd,
    PrevSphOi,
    PrevCylOi,
    PrevAddOi,
    SphOd,
    CylOd,
    SphOi,
    CylOi,
    AddPower,
}

impl PowerField {
    pub fn kind(&self) -> DiopterKind {
        match self {
            PowerField::PrevSphOd | PowerField::PrevSphOi | PowerField::SphOd | PowerField::SphOi => {
                DiopterKind::Sphere
            }
            PowerField::PrevCylOd | PowerField::PrevCylOi | PowerField::CylOd | PowerField::CylOi => {
                DiopterKind::Cylinder
            }
            PowerField::PrevAddOd | PowerField::PrevAddOi | PowerField::AddPower => DiopterKind::Addition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisField {
    PrevAxisOd,
    PrevAxisOi,
    AxisOd,
    AxisOi,
}

/// A single change made on the exam form. Raw values are the text as typed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordUpdate {
    Text(TextField, String),
    ExamDate(Option<NaiveDate>),
    Flag(HistoryFlag, bool),
    Measurement(MeasurementField, String),
    Power(PowerField, String),
    Axis(AxisField, String),
    LensType { tag: String, selected: bool },
    Treatment { tag: String, selected: bool },
    Antiblue(bool),
    Tint(bool),
}

// ==============================================================================
// SAVE ROUTING
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "id", rename_all = "snake_case")]
pub enum SaveOperation {
    Create,
    Update(Uuid),
}

/// Normalized draft returned by the preview endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SavePreview {
    pub record: PrescriptionRecord,
    pub material_final: Option<String>,
    pub operation: SaveOperation,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PrescriptionError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("You must be signed in to save prescriptions")]
    AuthRequired,

    #[error("{0}")]
    Persistence(String),

    #[error("Prescription not found")]
    NotFound,

    #[error("Prescription is open read-only; start editing first")]
    ReadOnly,
}

// ==============================================================================
// STORE ENCODING
// ==============================================================================

/// Store rows and API clients send powers and measurements either as numbers
/// or as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Forms send a cleared field as `""`; that means no value.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    use serde::de::Error;

    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

fn serialize_power<S>(value: &Option<Diopter>, kind: DiopterKind, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(diopter) => serializer.serialize_str(&diopter.render(kind)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_power<'de, D>(deserializer: D) -> Result<Option<Diopter>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(value)) => parse_diopter(&value.to_string()).map_err(D::Error::custom),
        Some(NumberOrText::Text(raw)) => parse_diopter(&raw).map_err(D::Error::custom),
    }
}

mod power_serde {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Diopter>, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_power(value, DiopterKind::Sphere, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Diopter>, D::Error> {
        deserialize_power(deserializer)
    }
}

mod addition_serde {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Diopter>, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_power(value, DiopterKind::Addition, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Diopter>, D::Error> {
        deserialize_power(deserializer)
    }
}

mod axis_serde {
    use super::*;
    use serde::de::Error;
    use crate::services::optics::normalize_axis;

    pub fn serialize<S: Serializer>(value: &Option<Axis>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(axis) => serializer.serialize_u16(axis.degrees()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Axis>, D::Error> {
        let raw = match Option::<NumberOrText>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(NumberOrText::Number(value)) => value.to_string(),
            Some(NumberOrText::Text(raw)) => raw,
        };

        match normalize_axis(&raw) {
            AxisInput::Unset => Ok(None),
            AxisInput::Value(axis) => Ok(Some(axis)),
            AxisInput::Rejected => Err(D::Error::custom(format!("axis '{}' must be a whole number from 0 to 180", raw))),
        }
    }
}

mod measurement_serde {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_u32(*v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        match Option::<NumberOrText>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberOrText::Number(value)) => parse_measurement(&value.to_string()).map_err(D::Error::custom),
            Some(NumberOrText::Text(raw)) => parse_measurement(&raw).map_err(D::Error::custom),
        }
    }
}

/// Tag sets travel as one `", "`-joined column, `null` when empty.
mod tag_list {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    pub fn serialize<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        if tags.is_empty() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str(&tags.join(", "))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let tags = match Option::<Tags>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(Tags::List(list)) => list,
            Some(Tags::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        };

        Ok(tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect())
    }
}
