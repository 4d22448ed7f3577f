//! Job status state machine.
//!
//! Interprets backend snapshots as lifecycle transitions and decides which
//! side effects the owning store has to run. The machine itself performs no
//! I/O; effects are returned as data.

pub mod effect;
pub mod state_machine;

pub use effect::JobEffect;
pub use state_machine::{DiscardReason, JobStatusStateMachine, JobTransition};
