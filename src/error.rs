//! Submission failures.

use thiserror::Error;

use crate::job::JobType;

/// Why the dispatcher refused a submission.
///
/// A refusal never touches the job itself: the handle stays valid and the
/// job can be resubmitted (the stress path retries with a yield between
/// attempts).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// A null handle was submitted; there is nothing to queue.
    #[error("cannot submit a null job handle")]
    NullJob,
    /// The queue for the job's type is at capacity.
    #[error("the {0:?} job queue is full")]
    QueueFull(JobType),
    /// Reserved for failures the dispatcher cannot attribute.
    #[error("job submission failed for an unknown reason")]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable_and_descriptive() {
        assert_eq!(SubmitError::NullJob.to_string(), "cannot submit a null job handle");
        assert_eq!(
            SubmitError::QueueFull(JobType::IO).to_string(),
            "the IO job queue is full"
        );
        assert_eq!(
            SubmitError::Unknown.to_string(),
            "job submission failed for an unknown reason"
        );
    }
}
