//! Verification job status model and progress arithmetic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

/// Lifecycle status of a verification job.
///
/// `Completed` and `Failed` are terminal. Stored in the database as the
/// upper-case string returned by [`JobStatus::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Whether no further events are expected for a job in this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status '{s}'")))
    }
}

/// Counters reported by the verification engine for one job.
///
/// `unknown` covers both undeliverable-unknown and risky (catch-all,
/// disposable, role) addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JobCounters {
    #[ts(type = "number")]
    pub total: i64,
    #[ts(type = "number")]
    pub processed: i64,
    #[ts(type = "number")]
    pub valid: i64,
    #[ts(type = "number")]
    pub invalid: i64,
    #[ts(type = "number")]
    pub unknown: i64,
}

impl JobCounters {
    /// Reject snapshots that cannot describe a real batch.
    ///
    /// All counters must be non-negative and `processed` may not exceed
    /// `total`. Per-outcome counts are taken as reported: the engine may
    /// classify an address before counting it as processed.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("total", self.total),
            ("processed", self.processed),
            ("valid", self.valid),
            ("invalid", self.invalid),
            ("unknown", self.unknown),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| *value < 0) {
            return Err(CoreError::Validation(format!("{name} must not be negative")));
        }
        if self.processed > self.total {
            return Err(CoreError::Validation(format!(
                "processed ({}) exceeds total ({})",
                self.processed, self.total
            )));
        }
        Ok(())
    }

    /// Completion percentage for this snapshot. See [`percentage`].
    pub fn percentage(&self) -> u8 {
        percentage(self.processed, self.total)
    }
}

/// Classification of a single verified address, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum VerificationOutcome {
    Valid,
    Invalid,
    /// Deliverable but catch-all, disposable or role-based.
    Risky,
    Unknown,
}

impl VerificationOutcome {
    pub const ALL: [VerificationOutcome; 4] = [
        VerificationOutcome::Valid,
        VerificationOutcome::Invalid,
        VerificationOutcome::Risky,
        VerificationOutcome::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationOutcome::Valid => "valid",
            VerificationOutcome::Invalid => "invalid",
            VerificationOutcome::Risky => "risky",
            VerificationOutcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerificationOutcome::ALL
            .into_iter()
            .find(|outcome| outcome.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Validation(format!("Unknown verification outcome '{s}'")))
    }
}

/// `round(processed / total * 100)`, rounding halves up, or 0 when `total`
/// is not positive.
///
/// Integer arithmetic keeps every consumer bit-identical; the result is
/// clamped to `0..=100`.
pub fn percentage(processed: i64, total: i64) -> u8 {
    if total <= 0 {
        return 0;
    }
    let processed = i128::from(processed.clamp(0, total));
    let total = i128::from(total);
    let rounded = (processed * 200 + total) / (2 * total);
    rounded.clamp(0, 100) as u8
}
