// libs/prescription-cell/src/services/document.rs
use chrono::NaiveDate;
use tracing::debug;

use crate::models::{PrescriptionError, PrescriptionRecord, RecordUpdate};

/// An exam as it sits on screen: either read-only or being edited.
///
/// `Editing` keeps the record it was opened from (`saved`) so that cancelling
/// can put it back. A brand-new exam has nothing saved yet.
#[derive(Debug, Clone, PartialEq)]
pub enum PrescriptionDocument {
    Viewing {
        record: PrescriptionRecord,
    },
    Editing {
        saved: Option<PrescriptionRecord>,
        draft: PrescriptionRecord,
    },
}

impl PrescriptionDocument {
    /// Open a prior exam read-only, or start a blank one dated `today`.
    pub fn open(existing: Option<PrescriptionRecord>, today: NaiveDate) -> Self {
        match existing {
            Some(record) => PrescriptionDocument::Viewing { record },
            None => PrescriptionDocument::Editing {
                saved: None,
                draft: PrescriptionRecord::blank(today),
            },
        }
    }

    pub fn record(&self) -> &PrescriptionRecord {
        match self {
            PrescriptionDocument::Viewing { record } => record,
            PrescriptionDocument::Editing { draft, .. } => draft,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, PrescriptionDocument::Editing { .. })
    }

    pub fn begin_edit(self) -> Self {
        match self {
            PrescriptionDocument::Viewing { record } => PrescriptionDocument::Editing {
                saved: Some(record.clone()),
                draft: record,
            },
            editing => editing,
        }
    }

    /// Drop the draft. Returns `None` when the exam was never saved, since
    /// there is nothing left to show.
    pub fn cancel(self) -> Option<Self> {
        match self {
            PrescriptionDocument::Editing { saved, .. } => {
                saved.map(|record| PrescriptionDocument::Viewing { record })
            }
            viewing => Some(viewing),
        }
    }

    pub fn apply(&mut self, update: RecordUpdate) -> Result<(), PrescriptionError> {
        match self {
            PrescriptionDocument::Viewing { .. } => {
                debug!("Ignoring edit on read-only prescription: {:?}", update);
                Err(PrescriptionError::ReadOnly)
            }
            PrescriptionDocument::Editing { draft, .. } => draft.apply(update),
        }
    }

    /// The store accepted the draft; show what it returned.
    pub fn mark_saved(self, stored: PrescriptionRecord) -> Self {
        PrescriptionDocument::Viewing { record: stored }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;
    use crate::models::{HistoryFlag, TextField};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn stored(name: &str) -> PrescriptionRecord {
        PrescriptionRecord {
            id: Some(Uuid::new_v4()),
            patient_name: Some(name.to_string()),
            ..PrescriptionRecord::default()
        }
    }

    #[test]
    fn test_blank_document_starts_in_edit_mode() {
        let document = PrescriptionDocument::open(None, today());
        assert!(document.is_editing());
        assert_eq!(document.record().exam_date, Some(today()));
        assert!(document.record().id.is_none());
        assert!(!document.record().history_diabetes);
        assert!(document.record().sph_od.is_none());
    }

    #[test]
    fn test_existing_record_is_read_only() {
        let mut document = PrescriptionDocument::open(Some(stored("Luis")), today());
        assert!(!document.is_editing());
        assert_matches!(
            document.apply(RecordUpdate::Flag(HistoryFlag::Headache, true)),
            Err(PrescriptionError::ReadOnly)
        );
        assert!(!document.record().history_headache);
    }

    #[test]
    fn test_cancel_restores_snapshot() {
        let original = stored("Luis");
        let mut document = PrescriptionDocument::open(Some(original.clone()), today()).begin_edit();
        document
            .apply(RecordUpdate::Text(TextField::PatientName, "Luis Ramírez".to_string()))
            .unwrap();
        assert_eq!(document.record().patient_name.as_deref(), Some("Luis Ramírez"));

        let document = document.cancel().unwrap();
        assert_eq!(document, PrescriptionDocument::Viewing { record: original });
    }

    #[test]
    fn test_cancel_unsaved_draft_discards_it() {
        assert!(PrescriptionDocument::open(None, today()).cancel().is_none());
    }

    #[test]
    fn test_mark_saved_shows_stored_record() {
        let document = PrescriptionDocument::open(None, today());
        let saved = stored("Ana");
        let document = document.mark_saved(saved.clone());
        assert_eq!(document.record(), &saved);
        assert!(!document.is_editing());
    }
}
