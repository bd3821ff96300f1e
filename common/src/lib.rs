//! Data model shared by the validator library and its binary.
//!
//! `model` holds the sheet-side view of a form submission and the directory-side
//! view of an account; `jobs` holds the bookkeeping produced by a validation run.

pub mod jobs;
pub mod model;
