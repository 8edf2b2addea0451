//! Delivery of job events outside the platform.

pub mod webhook;
