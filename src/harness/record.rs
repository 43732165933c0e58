use crate::{HarnessError, Result};

/// Payload sent in a given round
pub fn message_for(round: usize) -> String {
    format!("message {round}")
}

/// One write/read pair of an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRound {
    pub round: usize,
    pub sent: String,
    pub received: String,
}

/// Ordered record of a run's exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeRecord {
    rounds: Vec<ExchangeRound>,
}

impl ExchangeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, round: usize, sent: String, received: String) {
        self.rounds.push(ExchangeRound {
            round,
            sent,
            received,
        });
    }

    pub fn rounds(&self) -> &[ExchangeRound] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Fails with the first round whose echo differs from what was sent
    pub fn verify(&self) -> Result<()> {
        match self.rounds.iter().find(|r| r.sent != r.received) {
            Some(r) => Err(HarnessError::Mismatch {
                round: r.round,
                sent: r.sent.clone(),
                received: r.received.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Provider the run exercised
    pub provider: &'static str,
    pub record: ExchangeRecord,
    /// Round after which the dial scope was cancelled, if it was
    pub cancelled_after: Option<usize>,
    /// Whether a second dial on the cancelled scope was checked to fail
    pub redial_rejected: bool,
}
