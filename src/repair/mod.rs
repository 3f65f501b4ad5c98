//! Repair loop - drives generation, rendering and classification until a
//! request succeeds or the attempt budget runs out.

mod outcome;
mod runner;
mod state;

pub use outcome::{RepairEvent, RepairFailure, RepairOutcome, RepairReport};
pub use runner::{DEFAULT_MAX_ATTEMPTS, RepairConfig, RepairLoop};
pub use state::{IllegalTransition, RepairMachine, RepairState, TransitionRecord};
