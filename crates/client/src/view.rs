//! Latest known state of a watched job.

use onlyvalid_core::job::{JobCounters, JobStatus};
use onlyvalid_core::job_events::{CompletedEvent, FailedEvent, JobEvent, ProgressEvent};
use onlyvalid_core::types::JobId;

/// The last event applied to a [`JobView`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobState {
    /// Subscribed, nothing received yet.
    #[default]
    Waiting,
    Progress(ProgressEvent),
    Completed(CompletedEvent),
    Failed(FailedEvent),
}

/// Client-side state of one job.
///
/// Each accepted event replaces the state wholesale. Once a terminal event
/// has been applied, progress events are ignored; a later terminal event
/// still replaces the earlier one.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    job_id: JobId,
    state: JobState,
}

impl JobView {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Waiting,
        }
    }

    /// Apply `event` if it belongs to this job. Returns whether the view
    /// changed.
    pub fn apply(&mut self, event: &JobEvent) -> bool {
        if event.job_id() != &self.job_id {
            return false;
        }
        let next = match event {
            JobEvent::Progress(_) if self.is_terminal() => return false,
            JobEvent::Progress(e) => JobState::Progress(e.clone()),
            JobEvent::Completed(e) => JobState::Completed(e.clone()),
            JobEvent::Failed(e) => JobState::Failed(e.clone()),
        };
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// `None` until the first event arrives.
    pub fn status(&self) -> Option<JobStatus> {
        match self.state {
            JobState::Waiting => None,
            JobState::Progress(_) => Some(JobStatus::Processing),
            JobState::Completed(_) => Some(JobStatus::Completed),
            JobState::Failed(_) => Some(JobStatus::Failed),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(JobStatus::is_terminal)
    }

    /// Counters of the last progress or completion event.
    pub fn counters(&self) -> Option<JobCounters> {
        match &self.state {
            JobState::Progress(e) => Some(e.counters),
            JobState::Completed(e) => Some(e.counters),
            JobState::Waiting | JobState::Failed(_) => None,
        }
    }

    /// Percentage as reported by the server.
    pub fn percentage(&self) -> Option<u8> {
        match &self.state {
            JobState::Progress(e) => Some(e.percentage),
            JobState::Completed(e) => Some(e.percentage),
            JobState::Waiting | JobState::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed(e) => Some(&e.error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn counters(processed: i64, total: i64) -> JobCounters {
        JobCounters {
            total,
            processed,
            valid: processed,
            invalid: 0,
            unknown: 0,
        }
    }

    #[test]
    fn starts_waiting() {
        let view = JobView::new("job-1".into());
        assert_eq!(view.state(), &JobState::Waiting);
        assert_eq!(view.status(), None);
        assert!(!view.is_terminal());
    }

    #[test]
    fn progress_then_completion_then_late_progress() {
        let job: JobId = "job-42".into();
        let mut view = JobView::new(job.clone());

        let progress = JobEvent::progress(
            job.clone(),
            JobCounters {
                total: 3,
                processed: 2,
                valid: 2,
                invalid: 0,
                unknown: 1,
            },
        );
        assert!(view.apply(&progress));
        assert_eq!(view.percentage(), Some(67));
        assert_matches!(view.state(), JobState::Progress(p) if JobEvent::Progress(p.clone()) == progress);
        assert_eq!(view.counters().map(|c| c.unknown), Some(1));

        assert!(view.apply(&JobEvent::completed(job.clone(), counters(3, 3))));
        assert_eq!(view.status(), Some(JobStatus::Completed));
        assert!(view.is_terminal());

        assert!(!view.apply(&JobEvent::progress(job, counters(1, 3))));
        assert_eq!(view.percentage(), Some(100));
    }

    #[test]
    fn each_event_replaces_state_wholesale() {
        let job: JobId = "job-1".into();
        let mut view = JobView::new(job.clone());

        view.apply(&JobEvent::progress(job.clone(), counters(8, 10)));
        view.apply(&JobEvent::progress(job.clone(), counters(3, 10)));

        assert_eq!(view.counters().map(|c| c.processed), Some(3));
        assert_eq!(view.percentage(), Some(30));
    }

    #[test]
    fn events_for_other_jobs_are_ignored() {
        let mut view = JobView::new("job-1".into());

        assert!(!view.apply(&JobEvent::progress("job-2".into(), counters(1, 2))));
        assert_eq!(view.state(), &JobState::Waiting);
    }

    #[test]
    fn failure_carries_error() {
        let job: JobId = "job-1".into();
        let mut view = JobView::new(job.clone());

        view.apply(&JobEvent::progress(job.clone(), counters(1, 2)));
        assert!(view.apply(&JobEvent::failed(job, "SMTP pool exhausted")));

        assert_eq!(view.status(), Some(JobStatus::Failed));
        assert_eq!(view.error(), Some("SMTP pool exhausted"));
        assert_eq!(view.counters(), None);
    }
}
