use std::fmt;

/// Orchestrator progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    SettingUp,
    Dialing,
    Exchanging { round: usize },
    Asserting,
    Done,
    /// Terminal failure, tagged with the stage that failed
    Failed(Stage),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Failed(_))
    }
}

/// Step of a run a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Dial,
    Write { round: usize },
    Read { round: usize },
    Assert { round: usize },
    Redial,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup => write!(f, "set up"),
            Stage::Dial => write!(f, "dial"),
            Stage::Write { round } => write!(f, "write (round {round})"),
            Stage::Read { round } => write!(f, "read (round {round})"),
            Stage::Assert { round } => write!(f, "assert (round {round})"),
            Stage::Redial => write!(f, "redial on cancelled scope"),
        }
    }
}
