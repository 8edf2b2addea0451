//! Wire protocol of the job progress relay.
//!
//! Server-to-client frames are [`JobEvent`]s, client-to-server frames are
//! [`ClientMessage`]s. Both are JSON objects tagged by `"type"`. The
//! TypeScript definitions for the dashboard are generated from these types
//! (`cargo test` writes them to `bindings/`), so the names below are the
//! only ones in use end to end.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::job::{JobCounters, JobStatus};
use crate::types::{JobId, Timestamp};

/// Progress snapshot during verification.
pub const EVENT_JOB_PROGRESS: &str = "job-progress";

/// Job finished; carries the final counters.
pub const EVENT_JOB_COMPLETED: &str = "job-completed";

/// Job aborted with an error.
pub const EVENT_JOB_FAILED: &str = "job-failed";

/// Client asks to receive events for a job.
pub const MSG_JOIN_JOB: &str = "join-job";

/// Client stops receiving events for a job.
pub const MSG_LEAVE_JOB: &str = "leave-job";

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// An event relayed to every subscriber of a job's channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum JobEvent {
    #[serde(rename = "job-progress")]
    Progress(ProgressEvent),
    #[serde(rename = "job-completed")]
    Completed(CompletedEvent),
    #[serde(rename = "job-failed")]
    Failed(FailedEvent),
}

/// Point-in-time progress of a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProgressEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub counters: JobCounters,
    /// Derived once from `processed / total`; subscribers never recompute it.
    pub percentage: u8,
    pub timestamp: Timestamp,
}

/// Final snapshot of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompletedEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub counters: JobCounters,
    pub percentage: u8,
    pub completed_at: Timestamp,
}

/// Terminal failure of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FailedEvent {
    pub job_id: JobId,
    pub error: String,
    pub failed_at: Timestamp,
}

impl JobEvent {
    /// Build a progress event, deriving the percentage from the counters.
    pub fn progress(job_id: JobId, counters: JobCounters) -> Self {
        JobEvent::Progress(ProgressEvent {
            job_id,
            counters,
            percentage: counters.percentage(),
            timestamp: Utc::now(),
        })
    }

    /// Build a completion event from the final counters.
    pub fn completed(job_id: JobId, counters: JobCounters) -> Self {
        JobEvent::Completed(CompletedEvent {
            job_id,
            counters,
            percentage: counters.percentage(),
            completed_at: Utc::now(),
        })
    }

    /// Build a failure event.
    pub fn failed(job_id: JobId, error: impl Into<String>) -> Self {
        JobEvent::Failed(FailedEvent {
            job_id,
            error: error.into(),
            failed_at: Utc::now(),
        })
    }

    /// The job (and relay channel) this event belongs to.
    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::Progress(e) => &e.job_id,
            JobEvent::Completed(e) => &e.job_id,
            JobEvent::Failed(e) => &e.job_id,
        }
    }

    /// Wire name of the event (the `"type"` tag).
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Progress(_) => EVENT_JOB_PROGRESS,
            JobEvent::Completed(_) => EVENT_JOB_COMPLETED,
            JobEvent::Failed(_) => EVENT_JOB_FAILED,
        }
    }

    /// Job status implied by this event.
    pub fn status(&self) -> JobStatus {
        match self {
            JobEvent::Progress(_) => JobStatus::Processing,
            JobEvent::Completed(_) => JobStatus::Completed,
            JobEvent::Failed(_) => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Parse a relay frame received from the server.
pub fn parse_job_event(text: &str) -> Result<JobEvent, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Control message sent by a subscriber over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum ClientMessage {
    #[serde(rename = "join-job")]
    JoinJob { job_id: JobId },
    #[serde(rename = "leave-job")]
    LeaveJob { job_id: JobId },
}

impl ClientMessage {
    pub fn job_id(&self) -> &JobId {
        match self {
            ClientMessage::JoinJob { job_id } | ClientMessage::LeaveJob { job_id } => job_id,
        }
    }
}

/// Parse a control frame received from a client.
///
/// Returns `Err` for malformed JSON or unknown `type` values; callers log
/// and ignore those.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn counters() -> JobCounters {
        JobCounters {
            total: 3,
            processed: 2,
            valid: 2,
            invalid: 0,
            unknown: 1,
        }
    }

    #[test]
    fn progress_event_derives_percentage() {
        let event = JobEvent::progress("job-42".into(), counters());
        assert_matches!(&event, JobEvent::Progress(p) if p.percentage == 67);
        assert_eq!(event.status(), JobStatus::Processing);
        assert!(!event.is_terminal());
    }

    #[test]
    fn progress_event_serializes_flat_with_type_tag() {
        let event = JobEvent::progress("job-42".into(), counters());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], EVENT_JOB_PROGRESS);
        assert_eq!(json["job_id"], "job-42");
        assert_eq!(json["total"], 3);
        assert_eq!(json["processed"], 2);
        assert_eq!(json["valid"], 2);
        assert_eq!(json["invalid"], 0);
        assert_eq!(json["unknown"], 1);
        assert_eq!(json["percentage"], 67);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn wire_names_match_constants() {
        let completed = JobEvent::completed("j".into(), counters());
        let failed = JobEvent::failed("j".into(), "SMTP pool exhausted");

        let completed_json = serde_json::to_value(&completed).unwrap();
        let failed_json = serde_json::to_value(&failed).unwrap();

        assert_eq!(completed_json["type"], EVENT_JOB_COMPLETED);
        assert_eq!(completed.name(), EVENT_JOB_COMPLETED);
        assert_eq!(failed_json["type"], EVENT_JOB_FAILED);
        assert_eq!(failed.name(), EVENT_JOB_FAILED);
        assert_eq!(failed_json["error"], "SMTP pool exhausted");
        assert!(failed_json["failed_at"].is_string());
    }

    #[test]
    fn events_parse_back() {
        let original = JobEvent::completed("job-7".into(), counters());
        let text = serde_json::to_string(&original).unwrap();
        let parsed = parse_job_event(&text).unwrap();
        assert_eq!(parsed, original);
        assert!(parsed.is_terminal());
    }

    #[test]
    fn legacy_event_names_are_rejected() {
        let text = r#"{"type":"job-complete","job_id":"j","error":"x","failed_at":"2026-01-01T00:00:00Z"}"#;
        assert!(parse_job_event(text).is_err());
        let text = r#"{"type":"job-error","job_id":"j","error":"x","failed_at":"2026-01-01T00:00:00Z"}"#;
        assert!(parse_job_event(text).is_err());
    }

    #[test]
    fn parse_join_and_leave() {
        let join = parse_client_message(r#"{"type":"join-job","job_id":"job-1"}"#).unwrap();
        assert_eq!(join, ClientMessage::JoinJob { job_id: "job-1".into() });

        let leave = parse_client_message(r#"{"type":"leave-job","job_id":"job-1"}"#).unwrap();
        assert_eq!(leave.job_id().as_str(), "job-1");
    }

    #[test]
    fn client_message_serializes_with_constants() {
        let json = serde_json::to_value(ClientMessage::JoinJob { job_id: "a".into() }).unwrap();
        assert_eq!(json["type"], MSG_JOIN_JOB);
        let json = serde_json::to_value(ClientMessage::LeaveJob { job_id: "a".into() }).unwrap();
        assert_eq!(json["type"], MSG_LEAVE_JOB);
    }

    #[test]
    fn malformed_client_messages_are_errors() {
        assert!(parse_client_message("not json").is_err());
        assert!(parse_client_message(r#"{"type":"subscribe","job_id":"x"}"#).is_err());
        assert!(parse_client_message(r#"{"type":"join-job"}"#).is_err());
    }
}
