pub mod admin;
pub mod engine;
pub mod jobs;
pub mod users;
