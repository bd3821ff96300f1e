//! Validates data access form responses against an identity directory.
//!
//! The binary in `main.rs` wires the pieces together for one scheduled run:
//! [`config`] loads the run settings, [`services`] provides the sheet, the
//! directory session, the notice texts and the result log, and
//! [`validation::ResponseValidator`] walks the sheet.

pub mod cli;
pub mod config;
pub mod services;
pub mod validation;

pub use config::ValidatorConfig;
pub use validation::ResponseValidator;
