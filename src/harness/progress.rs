use std::fmt;

/// Step of a run, reported as soon as it happens
///
/// Sent over the channel given to
/// [`Orchestrator::with_progress`](super::Orchestrator::with_progress), so a
/// caller can show the rounds that completed before a later one failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Wrote { round: usize, message: String },
    Read { round: usize, message: String },
    CancelledDialScope { round: usize },
    RedialRejected,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Wrote { message, .. } => write!(f, "write succeeded: {message}"),
            Progress::Read { message, .. } => write!(f, "read succeeded: {message}"),
            Progress::CancelledDialScope { .. } => write!(f, "cancelled dial scope"),
            Progress::RedialRejected => write!(f, "dial on cancelled scope rejected"),
        }
    }
}
