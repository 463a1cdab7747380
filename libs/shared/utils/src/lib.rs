#![recursion_limit = "256"]

pub mod extractor;
pub mod jwt;
pub mod test_utils;
