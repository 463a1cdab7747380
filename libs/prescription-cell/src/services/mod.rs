pub mod document;
pub mod material;
pub mod optics;
pub mod record;
