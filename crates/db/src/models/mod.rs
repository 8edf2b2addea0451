//! Row structs and request DTOs.
//!
//! Each submodule pairs a `FromRow` + `Serialize` entity struct with the
//! `Deserialize` DTOs used to create it.

pub mod credit_transaction;
pub mod job;
pub mod job_result;
pub mod promo_code;
pub mod stats;
pub mod user;
