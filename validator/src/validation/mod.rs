//! # Response validation run
//!
//! One run walks the whole sheet once, in order:
//!
//! 1.  **Read**: every row is fetched from the [`SheetStore`](crate::services::sheet::SheetStore).
//!     Rows whose status cell is already terminal are counted and left alone; they
//!     cause no directory call and no write.
//!
//! 2.  **Decide**: each unprocessed row is checked against the identity directory.
//!     A malformed or unknown username resolves to `invalid_username`; a known
//!     account that is not registered for the configured challenge resolves to
//!     `not_registered`; otherwise the row is `valid`. When an access team is
//!     configured the access flow runs instead (already a member, open
//!     invitation, or a fresh invitation).
//!
//! 3.  **Write**: the computed status is written to the row's status cell, then
//!     the submitter is sent a notice if the access flow calls for one, and the
//!     outcome is appended to the result log.
//!
//! A row whose directory lookup or status write fails stays unprocessed and is
//! picked up by the next run. Such a failure never stops the rows after it.

pub mod response;
pub mod username;

pub use response::ResponseValidator;
