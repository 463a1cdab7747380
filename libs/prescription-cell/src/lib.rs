pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{PrescriptionError, PrescriptionRecord, RecordUpdate, SaveOperation};
pub use router::prescription_routes;

pub mod api {
    pub use crate::services::document::PrescriptionDocument;
    pub use crate::services::record::PrescriptionService;
}
