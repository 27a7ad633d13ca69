//! Output stage: the processed workspace as JSON or as plain text.
pub mod json;
pub mod text;
