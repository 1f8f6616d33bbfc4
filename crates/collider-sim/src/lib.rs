pub mod fault;
pub mod invariants;
pub mod sim;

pub use fault::{is_injected_fault, FaultConfig, FaultStats, FaultyConnector, FAULT_PREFIX};
pub use invariants::{check_run_invariants, Violation};
pub use sim::{Sim, SimOutcome};
