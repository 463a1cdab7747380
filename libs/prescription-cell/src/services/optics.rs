// libs/prescription-cell/src/services/optics.rs
use tracing::debug;

use crate::models::{Axis, AxisInput, Diopter, DiopterKind, PrescriptionError};

/// Largest power magnitude accepted, in diopters.
const MAX_POWER: f64 = 40.0;

/// Read a typed power. Blank means unset. Decimal commas are accepted.
pub fn parse_diopter(raw: &str) -> Result<Option<Diopter>, PrescriptionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| PrescriptionError::ValidationError(format!("'{}' is not a number", trimmed)))?;

    if !value.is_finite() || value.abs() > MAX_POWER {
        return Err(PrescriptionError::ValidationError(format!(
            "'{}' is outside ±{:.2} D",
            trimmed, MAX_POWER
        )));
    }

    // f64::round breaks ties away from zero.
    let quarters = (value * 4.0).round() as i32;
    Ok(Some(Diopter::from_quarters(quarters)))
}

/// Snap a power to the nearest quarter and render it with two decimals.
pub fn normalize_diopter(raw: &str, kind: DiopterKind) -> Result<Option<String>, PrescriptionError> {
    let normalized = parse_diopter(raw)?.map(|diopter| diopter.render(kind));
    debug!("Normalized {:?} power '{}' -> {:?}", kind, raw, normalized);
    Ok(normalized)
}

/// Only a blank field or a plain integer from 0 to 180 is a valid axis.
pub fn normalize_axis(raw: &str) -> AxisInput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return AxisInput::Unset;
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return AxisInput::Rejected;
    }

    let digits = match trimmed.trim_start_matches('0') {
        "" => "0",
        significant => significant,
    };
    if digits.len() > 3 {
        return AxisInput::Rejected;
    }

    digits
        .parse::<u16>()
        .ok()
        .and_then(Axis::new)
        .map_or(AxisInput::Rejected, AxisInput::Value)
}

/// Result of typing `raw` into an axis field holding `current`.
pub fn apply_axis_edit(current: Option<Axis>, raw: &str) -> Option<Axis> {
    match normalize_axis(raw) {
        AxisInput::Unset => None,
        AxisInput::Value(axis) => Some(axis),
        AxisInput::Rejected => {
            debug!("Rejected axis input '{}', keeping {:?}", raw, current);
            current
        }
    }
}

/// Acuity denominators and distances: blank or a non-negative whole number.
pub fn parse_measurement(raw: &str) -> Result<Option<u32>, PrescriptionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| PrescriptionError::ValidationError(format!("'{}' is not a whole number", trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_quarter_rounding() {
        assert_eq!(normalize_diopter("1.1", DiopterKind::Sphere).unwrap().as_deref(), Some("1.00"));
        assert_eq!(normalize_diopter("1.13", DiopterKind::Sphere).unwrap().as_deref(), Some("1.25"));
        assert_eq!(normalize_diopter("-0.6", DiopterKind::Cylinder).unwrap().as_deref(), Some("-0.50"));
        assert_eq!(normalize_diopter("-0.63", DiopterKind::Cylinder).unwrap().as_deref(), Some("-0.75"));
        assert_eq!(normalize_diopter("2", DiopterKind::Sphere).unwrap().as_deref(), Some("2.00"));
        assert_eq!(normalize_diopter("1,75", DiopterKind::Sphere).unwrap().as_deref(), Some("1.75"));
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        assert_eq!(normalize_diopter("1.125", DiopterKind::Sphere).unwrap().as_deref(), Some("1.25"));
        assert_eq!(normalize_diopter("-1.125", DiopterKind::Sphere).unwrap().as_deref(), Some("-1.25"));
    }

    #[test]
    fn test_addition_sign() {
        assert_eq!(normalize_diopter("0.5", DiopterKind::Addition).unwrap().as_deref(), Some("+0.50"));
        assert_eq!(normalize_diopter("+2.25", DiopterKind::Addition).unwrap().as_deref(), Some("+2.25"));
        assert_eq!(normalize_diopter("0.1", DiopterKind::Addition).unwrap().as_deref(), Some("0.00"));
        assert_eq!(normalize_diopter("0.5", DiopterKind::Sphere).unwrap().as_deref(), Some("0.50"));
    }

    #[test]
    fn test_blank_and_garbage() {
        assert_eq!(normalize_diopter("", DiopterKind::Sphere).unwrap(), None);
        assert_eq!(normalize_diopter("   ", DiopterKind::Addition).unwrap(), None);
        assert_matches!(normalize_diopter("abc", DiopterKind::Sphere), Err(PrescriptionError::ValidationError(_)));
        assert_matches!(normalize_diopter("NaN", DiopterKind::Sphere), Err(PrescriptionError::ValidationError(_)));
        assert_matches!(normalize_diopter("1e9", DiopterKind::Sphere), Err(PrescriptionError::ValidationError(_)));
    }

    #[test]
    fn test_power_range() {
        assert_eq!(normalize_diopter("40", DiopterKind::Sphere).unwrap().as_deref(), Some("40.00"));
        assert_eq!(normalize_diopter("-40", DiopterKind::Sphere).unwrap().as_deref(), Some("-40.00"));
        assert_matches!(normalize_diopter("45", DiopterKind::Sphere), Err(PrescriptionError::ValidationError(_)));
        assert_matches!(normalize_diopter("-40.5", DiopterKind::Cylinder), Err(PrescriptionError::ValidationError(_)));
    }

    #[test]
    fn test_axis_input() {
        assert_eq!(normalize_axis(""), AxisInput::Unset);
        assert_eq!(normalize_axis("0"), AxisInput::Value(Axis::new(0).unwrap()));
        assert_eq!(normalize_axis("180"), AxisInput::Value(Axis::new(180).unwrap()));
        assert_eq!(normalize_axis("181"), AxisInput::Rejected);
        assert_eq!(normalize_axis("-5"), AxisInput::Rejected);
        assert_eq!(normalize_axis("12.5"), AxisInput::Rejected);
        assert_eq!(normalize_axis("+90"), AxisInput::Rejected);
    }

    #[test]
    fn test_axis_leading_zeros_are_ignored() {
        let ninety = AxisInput::Value(Axis::new(90).unwrap());
        assert_eq!(normalize_axis("090"), ninety);
        assert_eq!(normalize_axis("0090"), ninety);
        assert_eq!(normalize_axis("000"), AxisInput::Value(Axis::new(0).unwrap()));
        assert_eq!(normalize_axis("0181"), AxisInput::Rejected);
        assert_eq!(normalize_axis("00001000"), AxisInput::Rejected);
    }

    #[test]
    fn test_axis_edit_keeps_previous_on_rejection() {
        let ninety = Axis::new(90);
        assert_eq!(apply_axis_edit(ninety, "9x"), ninety);
        assert_eq!(apply_axis_edit(ninety, "200"), ninety);
        assert_eq!(apply_axis_edit(ninety, "45"), Axis::new(45));
        assert_eq!(apply_axis_edit(ninety, ""), None);
    }

    #[test]
    fn test_measurements() {
        assert_eq!(parse_measurement("20").unwrap(), Some(20));
        assert_eq!(parse_measurement("").unwrap(), None);
        assert_matches!(parse_measurement("-3"), Err(PrescriptionError::ValidationError(_)));
        assert_matches!(parse_measurement("6.5"), Err(PrescriptionError::ValidationError(_)));
    }
}
