pub mod admin;
pub mod extractor;
