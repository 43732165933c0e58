//! Connection-lifetime test orchestration
//!
//! A run moves through `SettingUp → Dialing → Exchanging → Asserting → Done`;
//! any failure ends it in `Failed`, tagged with the stage that failed.

pub mod orchestrator;
pub mod progress;
pub mod record;
pub mod state;


pub use orchestrator::{Orchestrator, run_harness, run_harness_reporting};
pub use progress::Progress;
pub use record::{ExchangeRecord, ExchangeRound, RunReport, message_for};
pub use state::{Stage, State};
