//! Simulation harness used by the console's `simulate` command and tests

pub mod simulator;

pub use simulator::{run_simulator, SeededSimulator, SimulatorConfig, SimulatorReport, Violation};
