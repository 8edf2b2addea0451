//! OnlyValidEmails domain core.
//!
//! Pure domain logic with no I/O: identifiers, the job status model and
//! progress arithmetic, the relay wire protocol, credit and promo-code
//! rules, CSV export helpers and webhook signing. Shared by the database,
//! event, API and client crates.

pub mod credits;
pub mod error;
pub mod export;
pub mod job;
pub mod job_events;
pub mod promo;
pub mod signing;
pub mod types;
